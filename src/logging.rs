use chrono::Local;
use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};

/// Writes `[timestamp][LEVEL] message` lines to stderr
pub struct ConsoleLogger {
    level: Level,
}

impl ConsoleLogger {
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    pub fn init(level: Level) -> Result<(), SetLoggerError> {
        let level_filter = match level {
            Level::Error => LevelFilter::Error,
            Level::Warn => LevelFilter::Warn,
            Level::Info => LevelFilter::Info,
            Level::Debug => LevelFilter::Debug,
            Level::Trace => LevelFilter::Trace,
        };

        log::set_boxed_logger(Box::new(ConsoleLogger::new(level)))
            .map(|()| log::set_max_level(level_filter))
    }

    fn format(&self, record: &Record) -> String {
        format!(
            "[{}][{}] {}",
            Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
            record.level(),
            record.args()
        )
    }
}

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{}", self.format(record));
        }
    }

    fn flush(&self) {}
}
