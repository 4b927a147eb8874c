use std::{
    collections::VecDeque,
    io::{self, Stdout},
    time::Duration,
};

use crossbeam::channel::Receiver;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::Level;
use rusty_loop::core::{EntryFault, LoopThread, log::LogMessage};
use tui::{
    Frame, Terminal,
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Span, Spans},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};

use crate::command::{Command, Controls, HELP};

/// Lines kept per pane.
const HISTORY: usize = 30;

/// Bounded history of rendered lines.
#[derive(Debug)]
pub struct History<T> {
    lines: VecDeque<T>,
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self {
            lines: VecDeque::with_capacity(HISTORY),
        }
    }
}

impl<T> History<T> {
    pub fn push(&mut self, line: T) {
        if self.lines.len() == HISTORY {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.lines.iter()
    }
}

/// Terminal front end for a loop running on a [`LoopThread`].
pub struct Dashboard {
    controls: Controls,
    log_recv: Receiver<LogMessage>,
    fault_recv: Receiver<EntryFault>,
    logs: History<LogMessage>,
    faults: History<EntryFault>,
    fault_count: usize,
    input: String,
    status: String,
}

impl Dashboard {
    pub fn new(
        controls: Controls,
        log_recv: Receiver<LogMessage>,
        fault_recv: Receiver<EntryFault>,
    ) -> Self {
        Self {
            controls,
            log_recv,
            fault_recv,
            logs: History::default(),
            faults: History::default(),
            fault_count: 0,
            input: String::new(),
            status: HELP.to_owned(),
        }
    }

    /// Run until the user exits or the loop thread finishes. Restores the terminal on return.
    pub fn run(&mut self, loop_thread: &LoopThread) -> anyhow::Result<()> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let mut term = Terminal::new(CrosstermBackend::new(stdout))?;

        let result = self.event_loop(&mut term, loop_thread);

        terminal::disable_raw_mode()?;
        execute!(term.backend_mut(), LeaveAlternateScreen)?;
        term.show_cursor()?;
        result
    }

    fn event_loop(
        &mut self,
        term: &mut Terminal<CrosstermBackend<Stdout>>,
        loop_thread: &LoopThread,
    ) -> anyhow::Result<()> {
        while !self.controls.exit_requested() && !loop_thread.is_finished() {
            self.drain_channels();
            term.draw(|f| self.render(f))?;

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    match key.code {
                        KeyCode::Esc => self.controls.stop(),
                        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                            self.controls.stop()
                        }
                        KeyCode::Enter => self.submit(),
                        KeyCode::Backspace => {
                            self.input.pop();
                        }
                        KeyCode::Char(c) => self.input.push(c),
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }

    /// Run the typed command line.
    pub fn submit(&mut self) {
        let command = Command::parse(&self.input);
        self.input.clear();
        self.status = match self.controls.execute(&command) {
            Ok(status) => status,
            Err(err) => format!("error: {err}"),
        };
    }

    /// Move pending log records and faults into the panes.
    pub fn drain_channels(&mut self) {
        for message in self.log_recv.try_iter() {
            self.logs.push(message);
        }
        for fault in self.fault_recv.try_iter() {
            self.fault_count += 1;
            self.faults.push(fault);
        }
    }

    fn render<B: Backend>(&self, f: &mut Frame<B>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(8),
                Constraint::Length(3),
            ])
            .split(f.size());

        self.render_status(f, chunks[0]);
        self.render_logs(f, chunks[1]);
        self.render_faults(f, chunks[2]);

        let input = Paragraph::new(format!("> {}", self.input))
            .style(Style::default().fg(Color::LightMagenta))
            .block(Block::default().borders(Borders::ALL).title(self.status.as_str()));
        f.render_widget(input, chunks[3]);
        f.set_cursor(chunks[3].x + 3 + self.input.len() as u16, chunks[3].y + 1);
    }

    fn render_status<B: Backend>(&self, f: &mut Frame<B>, area: Rect) {
        let game_loop = self.controls.game_loop();
        let phase = game_loop
            .current_phase()
            .map_or("idle", |phase| phase.name());
        let guard = if self.controls.guard_enabled() { "on" } else { "off" };
        let status = Spans::from(vec![
            Span::styled("tick ", Style::default().fg(Color::Gray)),
            Span::raw(game_loop.simulation_tick_count().to_string()),
            Span::styled("  fixed ", Style::default().fg(Color::Gray)),
            Span::raw(game_loop.fixed_tick_count().to_string()),
            Span::styled("  phase ", Style::default().fg(Color::Gray)),
            Span::raw(phase),
            Span::styled("  quit ", Style::default().fg(Color::Gray)),
            Span::raw(game_loop.quit_state().to_string()),
            Span::styled("  guard ", Style::default().fg(Color::Gray)),
            Span::raw(guard),
        ]);
        let block = Block::default().borders(Borders::ALL).title("Game Loop");
        f.render_widget(Paragraph::new(status).block(block), area);
    }

    fn render_logs<B: Backend>(&self, f: &mut Frame<B>, area: Rect) {
        let items: Vec<ListItem> = self
            .logs
            .iter()
            .rev()
            .map(|message| {
                ListItem::new(Spans::from(vec![
                    Span::styled(
                        format!("{:<5} ", message.level),
                        Style::default().fg(level_color(message.level)),
                    ),
                    Span::raw(message.message.as_str()),
                ]))
            })
            .collect();
        let block = Block::default().borders(Borders::ALL).title("Log");
        f.render_widget(List::new(items).block(block), area);
    }

    fn render_faults<B: Backend>(&self, f: &mut Frame<B>, area: Rect) {
        let items: Vec<ListItem> = self
            .faults
            .iter()
            .rev()
            .map(|fault| ListItem::new(fault.to_string()))
            .collect();
        let title = format!("Faults ({})", self.fault_count);
        let block = Block::default()
            .borders(Borders::ALL)
            .title(Span::styled(title, Style::default().add_modifier(Modifier::BOLD)));
        f.render_widget(List::new(items).block(block), area);
    }
}

fn level_color(level: Level) -> Color {
    match level {
        Level::Error => Color::Red,
        Level::Warn => Color::Yellow,
        Level::Info => Color::Green,
        Level::Debug => Color::Cyan,
        Level::Trace => Color::DarkGray,
    }
}
