//! Logging knobs for basket-miner.
//!
//! The library only emits `tracing` events. [`Verbosity`] picks both what the
//! mining adapter reports ([`LogConfig`]) and, for binaries, the subscriber
//! filter installed by [`setup::init_logging`].

use tracing::Level;

/// How much a run reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verbosity {
    /// Warnings from basket-miner, errors from everything else
    Quiet,
    /// Progress summaries from basket-miner
    #[default]
    Normal,
    /// Everything, including each line the mining tool prints
    Verbose,
}

impl Verbosity {
    /// Maps `--quiet` / `--verbose` style flags. Verbose wins if both are set.
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        match (quiet, verbose) {
            (_, true) => Verbosity::Verbose,
            (true, false) => Verbosity::Quiet,
            (false, false) => Verbosity::Normal,
        }
    }

    /// Level for `basket_miner` targets.
    pub fn miner_level(self) -> Level {
        match self {
            Verbosity::Quiet => Level::WARN,
            Verbosity::Normal => Level::INFO,
            Verbosity::Verbose => Level::DEBUG,
        }
    }

    /// Level for every other target.
    pub fn default_level(self) -> Level {
        match self {
            Verbosity::Quiet => Level::ERROR,
            Verbosity::Normal => Level::WARN,
            Verbosity::Verbose => Level::DEBUG,
        }
    }
}

/// What the mining adapter logs beyond its own progress events.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Forward each stdout/stderr line of the mining tool at debug level
    pub forward_process_output: bool,
    /// Log where inline datasets are written
    pub log_dataset_writes: bool,
    /// Longest forwarded tool line, in bytes
    pub max_line_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::for_verbosity(Verbosity::Normal)
    }
}

impl LogConfig {
    pub fn for_verbosity(verbosity: Verbosity) -> Self {
        match verbosity {
            Verbosity::Quiet => Self {
                forward_process_output: false,
                log_dataset_writes: false,
                max_line_length: 256,
            },
            Verbosity::Normal => Self {
                forward_process_output: false,
                log_dataset_writes: true,
                max_line_length: 256,
            },
            Verbosity::Verbose => Self {
                forward_process_output: true,
                log_dataset_writes: true,
                max_line_length: 4096,
            },
        }
    }
}

/// Logs an inline dataset write when the config allows it.
#[macro_export]
macro_rules! log_dataset_write {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_dataset_writes {
            tracing::info!($($arg)*);
        }
    };
}

/// Forwards a mining tool line when the config allows it.
#[macro_export]
macro_rules! log_process_line {
    ($config:expr, $($arg:tt)*) => {
        if $config.forward_process_output {
            tracing::debug!($($arg)*);
        }
    };
}

/// Cuts a tool line to `max_length` bytes without splitting a character.
pub fn truncate_line(line: &str, max_length: usize) -> String {
    if line.len() <= max_length {
        return line.to_string();
    }
    let mut end = max_length;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    format!("{} [{} more bytes]", &line[..end], line.len() - end)
}

/// Subscriber installation for binaries.
pub mod setup {
    use super::Verbosity;
    use crate::error::{MinerError, Result};

    /// Subscriber settings derived from a [`Verbosity`].
    #[derive(Debug, Clone, Default)]
    pub struct SubscriberConfig {
        pub verbosity: Verbosity,
        /// Emit one JSON object per event instead of plain text
        pub json: bool,
    }

    impl SubscriberConfig {
        pub fn new(verbosity: Verbosity) -> Self {
            Self {
                verbosity,
                ..Self::default()
            }
        }

        pub fn with_json(mut self, json: bool) -> Self {
            self.json = json;
            self
        }

        /// `EnvFilter` directives, e.g. `warn,basket_miner=info`.
        pub fn directives(&self) -> String {
            format!(
                "{},basket_miner={}",
                self.verbosity.default_level().as_str().to_lowercase(),
                self.verbosity.miner_level().as_str().to_lowercase()
            )
        }
    }

    /// Installs the global subscriber, writing to stderr. `RUST_LOG` wins over
    /// the configured directives.
    ///
    /// ```rust,no_run
    /// use basket_miner::logging::setup::{init_logging, SubscriberConfig};
    /// use basket_miner::logging::Verbosity;
    ///
    /// init_logging(&SubscriberConfig::new(Verbosity::Verbose).with_json(true))?;
    /// # Ok::<(), basket_miner::error::MinerError>(())
    /// ```
    pub fn init_logging(config: &SubscriberConfig) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.directives()));

        let fmt_layer = if config.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .boxed()
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| MinerError::Configuration(format!("Failed to install log subscriber: {e}")))
    }
}
