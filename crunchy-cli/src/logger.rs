use colored::{ColoredString, Colorize};
use log::{Level, LevelFilter, Metadata, Record};
use std::{
    fmt,
    io::Write,
    sync::{Arc, Mutex},
};

/// Output policy of one invocation, installed as the `log` backend.
pub struct Logger {
    debug: bool,
    info: bool,
    error: bool,
    dev: bool,
    buffer: Option<Arc<Mutex<Vec<u8>>>>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(false, true, true)
    }
}

impl Logger {
    pub fn new(debug: bool, info: bool, error: bool) -> Self {
        Self {
            debug,
            info,
            error,
            dev: debug,
            buffer: None,
        }
    }

    pub fn quiet() -> Self {
        Self::new(false, false, false)
    }

    pub fn verbose() -> Self {
        Self::new(true, true, true)
    }

    /// `verbose` wins when both flags are set.
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        if verbose {
            Self::verbose()
        } else if quiet {
            Self::quiet()
        } else {
            Self::default()
        }
    }

    /// Redirect every line into memory instead of stdout / stderr.
    pub fn with_buffer(mut self) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        self.buffer = Some(buffer.clone());
        (self, buffer)
    }

    /// Whether panics are reported together with a stack trace.
    pub fn is_dev(&self) -> bool {
        self.dev
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn is_info(&self) -> bool {
        self.info
    }

    pub fn is_error(&self) -> bool {
        self.error
    }

    pub fn max_level(&self) -> LevelFilter {
        if self.debug {
            LevelFilter::Debug
        } else if self.info {
            LevelFilter::Info
        } else if self.error {
            LevelFilter::Error
        } else {
            LevelFilter::Off
        }
    }

    /// Leaks the logger and registers it with the `log` facade.
    ///
    /// Registration only succeeds once per process. Later calls still return a
    /// usable logger, it just won't receive `log` macro records.
    pub fn install(self) -> &'static Logger {
        let logger: &'static Logger = Box::leak(Box::new(self));

        if log::set_logger(logger).is_ok() {
            log::set_max_level(logger.max_level());
        }

        logger
    }

    /// Emit an error line without going through the global facade.
    pub fn err(&self, args: fmt::Arguments) {
        log::Log::log(
            self,
            &Record::builder()
                .args(args)
                .level(Level::Error)
                .target(env!("CARGO_CRATE_NAME"))
                .build(),
        );
    }

    fn write(&self, level: Level, line: &str) {
        if let Some(buffer) = &self.buffer {
            if let Ok(mut buffer) = buffer.lock() {
                let _ = writeln!(buffer, "{}", line);
            }
            return;
        }

        // stdout may carry downloaded data, only plain info lines go there
        match level {
            Level::Info => println!("{}", line),
            _ => eprintln!("{}", line),
        }
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        match metadata.level() {
            Level::Error => self.error,
            Level::Warn | Level::Info => self.info,
            // dependencies (hyper, reqwest) are far too chatty at this level
            Level::Debug => self.debug && metadata.target().starts_with(env!("CARGO_CRATE_NAME")),
            Level::Trace => false,
        }
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = if self.debug {
            let location = match (record.file(), record.line()) {
                (Some(file), Some(line)) => format!("[{}:{}]", file, line).dimmed(),
                _ => "[unk]".dimmed(),
            };

            format!(
                "{} {} {} {}",
                label(record.level()),
                record.target().dimmed(),
                location,
                record.args()
            )
        } else {
            match record.level() {
                Level::Info => record.args().to_string(),
                _ => format!("{} {}", label(record.level()), record.args()),
            }
        };

        self.write(record.level(), &line);
    }

    fn flush(&self) {}
}

fn label(level: Level) -> ColoredString {
    match level {
        Level::Debug => "[DEBUG]".bold().blue(),
        Level::Error => "[ERROR]".bold().red(),
        Level::Info => "[INFO]".bold().green(),
        Level::Trace => "[TRACE]".bold().purple(),
        Level::Warn => "[WARN]".bold().yellow(),
    }
}
