use log::LevelFilter;
use std::path::PathBuf;

pub const SNAPSHOT_ENV: &str = "FRC_PLAYOFFS_SNAPSHOT";
pub const LOG_ENV: &str = "FRC_PLAYOFFS_LOG";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Used when no snapshot path is given on the command line.
    pub snapshot_path: Option<PathBuf>,
    pub log_level: LevelFilter,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            log_level: LevelFilter::Warn,
        }
    }
}

impl Settings {
    pub fn load() -> Self {
        Self::from_vars(std::env::var(SNAPSHOT_ENV).ok(), std::env::var(LOG_ENV).ok())
    }

    fn from_vars(snapshot: Option<String>, log_level: Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            snapshot_path: snapshot
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            log_level: log_level
                .and_then(|l| l.trim().parse::<LevelFilter>().ok())
                .unwrap_or(defaults.log_level),
        }
    }
}
