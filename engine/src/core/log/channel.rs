use crossbeam::channel::{Receiver, Sender, unbounded};
use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};

/// A log record forwarded to a front end.
#[derive(Debug, Clone)]
pub struct LogMessage {
    pub level: Level,
    pub target: String,
    pub message: String,
}

/// `log::Log` implementation that forwards records over a channel, so a front end running on
/// another thread can render the loop's logging.
pub struct ChannelLogger {
    sender: Sender<LogMessage>,
    level: LevelFilter,
}

impl log::Log for ChannelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let _ = self.sender.try_send(LogMessage {
                level: record.level(),
                target: record.target().to_owned(),
                message: format!("{}", record.args()),
            });
        }
    }

    fn flush(&self) {}
}

impl ChannelLogger {
    pub fn new(sender: Sender<LogMessage>, level: LevelFilter) -> Self {
        Self { sender, level }
    }

    pub fn with_receiver(level: LevelFilter) -> (Self, Receiver<LogMessage>) {
        let (sender, receiver) = unbounded();
        (Self::new(sender, level), receiver)
    }

    /// Install as the global logger. Fails if a logger is already installed.
    pub fn install(self) -> Result<(), SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use log::Log;

    use super::*;

    #[test]
    fn forwards_enabled_records() {
        let (logger, receiver) = ChannelLogger::with_receiver(LevelFilter::Info);

        logger.log(
            &Record::builder()
                .level(Level::Warn)
                .target("rusty_loop::frame")
                .args(format_args!("fell behind by {} steps", 3))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(Level::Trace)
                .args(format_args!("dropped"))
                .build(),
        );

        let message = receiver.try_recv().unwrap();
        assert_eq!(message.level, Level::Warn);
        assert_eq!(message.target, "rusty_loop::frame");
        assert_eq!(message.message, "fell behind by 3 steps");
        assert!(receiver.try_recv().is_err());
    }
}
