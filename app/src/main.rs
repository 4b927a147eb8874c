use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use log::LevelFilter;
use rusty_loop::core::{
    ChannelSink, Config, FrameDriver, GameLoop, LoopThread, global, log::ChannelLogger, runner,
};
use rusty_loop_cli::{Controls, Dashboard};

mod demo;

/// Run the demo game loop with a terminal dashboard.
#[derive(Debug, Parser)]
#[command(name = "rusty", version)]
struct Args {
    /// TOML file with loop settings.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Most verbose log level forwarded to the dashboard.
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// Print logs to stdout instead of opening the dashboard.
    #[arg(long)]
    headless: bool,

    /// Request a quit after this many simulation ticks.
    #[arg(long)]
    quit_after: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let (logger, log_recv) = ChannelLogger::with_receiver(args.log_level);
    logger.install()?;
    let (sink, fault_recv) = ChannelSink::with_receiver();

    let game_loop = Arc::new(GameLoop::builder().fault_sink(Arc::new(sink)).build());
    if global::install(Arc::clone(&game_loop)).is_err() {
        anyhow::bail!("a game loop is already installed");
    }
    demo::install(&game_loop, args.quit_after)?;

    let driver = FrameDriver::new(Arc::clone(&game_loop), &config);
    let controls = Controls::new(&driver);
    controls.attach()?;
    let loop_thread = LoopThread::spawn(driver, runner::looped)?;

    if args.headless {
        while !loop_thread.is_finished() {
            for message in log_recv.try_iter() {
                println!("[{}] {}", message.level, message.message);
            }
            for fault in fault_recv.try_iter() {
                println!("[FAULT] {fault}");
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        for message in log_recv.try_iter() {
            println!("[{}] {}", message.level, message.message);
        }
    } else {
        Dashboard::new(controls, log_recv, fault_recv).run(&loop_thread)?;
        loop_thread.stop();
    }

    println!("Loop {}", loop_thread.join());
    Ok(())
}
