#![forbid(unsafe_code)]
//! Runtime configuration for the pending transactions tracker: polling cadence,
//! snapshot buffering and the rolling logfile.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use log::LevelFilter;
use log4rs::{
    append::rolling_file::{
        policy::compound::{
            roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger, CompoundPolicy,
        },
        RollingFileAppender,
    },
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
    Config,
};

/// Period of interval-driven reconciliation
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Snapshots buffered per observer
pub const DEFAULT_SNAPSHOT_CAPACITY: usize = 64;
/// Directory created under the platform data dir
pub const DEFAULT_DATA_DIR_NAME: &str = "pending-tracker";
/// Name of the active logfile
pub const DEFAULT_LOGFILE_NAME: &str = "pending-tracker.debug.log";

/// 5MB as max log file size to roll
const LOGFILE_SIZE_LIMIT: u64 = 5 * 1024 * 1024;
/// log0, log1, log2
const LOGFILE_WINDOW_SIZE: u32 = 3;

/// Errors raised while resolving directories or installing the logger
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Creating the data directory or logfile failed
    #[error("Io error. {0}")]
    Io(#[from] std::io::Error),
    /// The platform has no data directory and none was configured
    #[error("Couldn't determine app data directory!")]
    NoDataDir,
    /// log4rs rejected the appender or roller setup
    #[error("Invalid log configuration. {0}")]
    LogConfig(String),
    /// A global logger is already installed
    #[error("Logger already installed. {0}")]
    SetLogger(#[from] log::SetLoggerError),
    /// `snapshot_capacity` is zero
    #[error("Snapshot capacity must be greater than zero")]
    ZeroSnapshotCapacity,
}

/// Configuration data that is necessary and sufficient for running a pending transactions engine.
#[derive(Clone, Debug)]
pub struct PendingConfig {
    /// How often the reconciliation loop is ticked by [`PendingConfig::poll_interval`] based triggers.
    pub poll_interval: Duration,
    /// How many snapshots a slow observer may fall behind before it skips forward.
    pub snapshot_capacity: usize,
    /// The directory where logfiles will be created. By default, this will be the platform data dir.
    pub data_dir: Option<PathBuf>,
    /// The filename of the logfile. This will be created in the `data_dir`.
    pub logfile_name: PathBuf,
}

impl Default for PendingConfig {
    fn default() -> Self {
        PendingConfig {
            poll_interval: DEFAULT_POLL_INTERVAL,
            snapshot_capacity: DEFAULT_SNAPSHOT_CAPACITY,
            data_dir: None,
            logfile_name: DEFAULT_LOGFILE_NAME.into(),
        }
    }
}

impl PendingConfig {
    /// Sets [`PendingConfig::poll_interval`]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets [`PendingConfig::snapshot_capacity`]
    pub fn with_snapshot_capacity(mut self, snapshot_capacity: usize) -> Self {
        self.snapshot_capacity = snapshot_capacity;
        self
    }

    /// Sets [`PendingConfig::data_dir`]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Rejects values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.snapshot_capacity == 0 {
            return Err(ConfigError::ZeroSnapshotCapacity);
        }
        Ok(())
    }

    /// Resolves the data directory, creating it if it doesn't exist
    pub fn get_data_dir(&self) -> Result<Box<Path>, ConfigError> {
        let data_location = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => {
                let mut dir = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
                dir.push(DEFAULT_DATA_DIR_NAME);
                dir
            }
        };
        std::fs::create_dir_all(&data_location)?;

        Ok(data_location.into_boxed_path())
    }

    /// Path of the active logfile, inside the data directory
    pub fn get_log_path(&self) -> Result<Box<Path>, ConfigError> {
        let mut log_path = self.get_data_dir()?.into_path_buf();
        log_path.push(&self.logfile_name);

        Ok(log_path.into_boxed_path())
    }

    /// Build the Logging config
    pub fn get_log_config(&self) -> Result<Config, ConfigError> {
        let mut roller_pattern = self.get_data_dir()?.into_path_buf();
        roller_pattern.push("pending-tracker-log{}");
        let fixed_window_roller = FixedWindowRoller::builder()
            .build(&roller_pattern.to_string_lossy(), LOGFILE_WINDOW_SIZE)
            .map_err(|e| ConfigError::LogConfig(e.to_string()))?;
        let size_trigger = SizeTrigger::new(LOGFILE_SIZE_LIMIT);
        let compound_policy =
            CompoundPolicy::new(Box::new(size_trigger), Box::new(fixed_window_roller));

        Config::builder()
            .appender(
                Appender::builder()
                    .filter(Box::new(ThresholdFilter::new(LevelFilter::Info)))
                    .build(
                        "logfile",
                        Box::new(
                            RollingFileAppender::builder()
                                .encoder(Box::new(PatternEncoder::new("{d} {l}::{m}{n}")))
                                .build(self.get_log_path()?, Box::new(compound_policy))?,
                        ),
                    ),
            )
            .build(
                Root::builder()
                    .appender("logfile")
                    .build(LevelFilter::Debug),
            )
            .map_err(|e| ConfigError::LogConfig(e.to_string()))
    }

    /// Installs the rolling logfile as the global logger
    pub fn init_logging(&self) -> Result<log4rs::Handle, ConfigError> {
        let config = self.get_log_config()?;
        Ok(log4rs::init_config(config)?)
    }
}
