//! Runtime configuration
use serde_yaml::{self, Value};
use std::fs::File;

use crate::{
    error::{ErrorCode, RuntimeError},
    recoverable_error,
    zmachine::{version::VersionPolicy, ErrorHandling},
};

#[derive(Clone, Debug, PartialEq)]
/// Runtime configuration data
pub struct Config {
    /// Is logging enabled?
    logging: bool,
    /// Recoverable error handling
    error_handling: ErrorHandling,
    /// What to do with a story for a version other than 3, 5 or 8
    unsupported_version: VersionPolicy,
    /// Screen height reported to the story
    rows: u8,
    /// Screen width reported to the story, also the status line width
    columns: u8,
    /// Default foreground color
    foreground: u8,
    /// Default background color
    background: u8,
    /// Fixed RNG seed
    random_seed: Option<u64>,
    /// Maximum number of undo states kept
    undo_depth: usize,
    /// Directory for save files written by the story
    save_directory: Option<String>,
    /// Save after every command and restore on start
    autosave: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            logging: false,
            error_handling: ErrorHandling::ContinueWarnOnce,
            unsupported_version: VersionPolicy::Reject,
            rows: 24,
            columns: 80,
            foreground: 9, // white text
            background: 2, // on a black background
            random_seed: None,
            undo_depth: 10,
            save_directory: None,
            autosave: false,
        }
    }
}

impl TryFrom<File> for Config {
    type Error = RuntimeError;

    fn try_from(value: File) -> Result<Self, Self::Error> {
        match serde_yaml::from_reader::<File, Value>(value) {
            Ok(data) => Ok(Config::from(&data)),
            Err(e) => recoverable_error!(ErrorCode::ConfigError, "{}", e),
        }
    }
}

impl TryFrom<&str> for Config {
    type Error = RuntimeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match serde_yaml::from_str::<Value>(value) {
            Ok(data) => Ok(Config::from(&data)),
            Err(e) => recoverable_error!(ErrorCode::ConfigError, "{}", e),
        }
    }
}

impl From<&Value> for Config {
    fn from(data: &Value) -> Self {
        let default = Config::default();
        let logging = match data["logging"].as_str() {
            Some(t) => t == "enabled",
            None => false,
        };
        let error_handling = match data["error_handling"].as_str() {
            Some(t) => match t {
                "continue_warn_always" => ErrorHandling::ContinueWarnAlways,
                "continue_warn_once" => ErrorHandling::ContinueWarnOnce,
                "ignore" => ErrorHandling::Ignore,
                "abort" => ErrorHandling::Abort,
                _ => ErrorHandling::ContinueWarnOnce,
            },
            None => ErrorHandling::ContinueWarnOnce,
        };
        let unsupported_version = match data["unsupported_version"].as_str() {
            Some("fallback") => VersionPolicy::Fallback,
            _ => VersionPolicy::Reject,
        };
        let rows = match data["rows"].as_u64() {
            Some(v) => v.clamp(1, 255) as u8,
            None => default.rows,
        };
        let columns = match data["columns"].as_u64() {
            Some(v) => v.clamp(20, 255) as u8,
            None => default.columns,
        };
        let foreground = match data["foreground"].as_u64() {
            Some(v) => v as u8,
            None => default.foreground,
        };
        let background = match data["background"].as_u64() {
            Some(v) => v as u8,
            None => default.background,
        };
        let random_seed = data["random_seed"].as_u64();
        let undo_depth = match data["undo_depth"].as_u64() {
            Some(v) => v as usize,
            None => default.undo_depth,
        };
        let save_directory = data["save_directory"].as_str().map(|s| s.to_string());
        let autosave = data["autosave"].as_bool().unwrap_or(false);

        Config {
            logging,
            error_handling,
            unsupported_version,
            rows,
            columns,
            foreground,
            background,
            random_seed,
            undo_depth,
            save_directory,
            autosave,
        }
    }
}

impl Config {
    /// Get the logging flag
    ///
    /// # Returns
    /// Logging flag
    pub fn logging(&self) -> bool {
        self.logging
    }

    /// Get the recoverable error handling mode
    ///
    /// # Returns
    /// Error handling mode
    pub fn error_handling(&self) -> ErrorHandling {
        self.error_handling
    }

    /// Get the policy for story versions other than 3, 5 or 8
    ///
    /// # Returns
    /// [VersionPolicy]
    pub fn unsupported_version(&self) -> VersionPolicy {
        self.unsupported_version
    }

    pub fn rows(&self) -> u8 {
        self.rows
    }

    pub fn columns(&self) -> u8 {
        self.columns
    }

    pub fn foreground(&self) -> u8 {
        self.foreground
    }

    pub fn background(&self) -> u8 {
        self.background
    }

    /// Get the fixed RNG seed, if any
    ///
    /// # Returns
    /// [Option] with the seed or [None] when the RNG should be seeded from entropy
    pub fn random_seed(&self) -> Option<u64> {
        self.random_seed
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_depth
    }

    pub fn save_directory(&self) -> Option<&str> {
        self.save_directory.as_deref()
    }

    pub fn autosave(&self) -> bool {
        self.autosave
    }

    /// Builder-style override for the error handling mode
    pub fn with_error_handling(mut self, error_handling: ErrorHandling) -> Self {
        self.error_handling = error_handling;
        self
    }

    /// Builder-style override for the unsupported version policy
    pub fn with_unsupported_version(mut self, policy: VersionPolicy) -> Self {
        self.unsupported_version = policy;
        self
    }

    /// Builder-style override for the RNG seed
    pub fn with_random_seed(mut self, seed: Option<u64>) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn with_undo_depth(mut self, depth: usize) -> Self {
        self.undo_depth = depth;
        self
    }

    /// Builder-style override for the save directory
    pub fn with_save_directory(mut self, directory: &str) -> Self {
        self.save_directory = Some(directory.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Seek, SeekFrom, Write};

    use crate::assert_ok;

    use super::*;

    #[test]
    fn test_default() {
        let config = Config::default();
        assert!(!config.logging());
        assert_eq!(config.error_handling(), ErrorHandling::ContinueWarnOnce);
        assert_eq!(config.unsupported_version(), VersionPolicy::Reject);
        assert_eq!(config.rows(), 24);
        assert_eq!(config.columns(), 80);
        assert_eq!(config.foreground(), 9);
        assert_eq!(config.background(), 2);
        assert!(config.random_seed().is_none());
        assert_eq!(config.undo_depth(), 10);
        assert!(config.save_directory().is_none());
        assert!(!config.autosave());
    }

    #[test]
    fn test_try_from_str() {
        let config = assert_ok!(Config::try_from(
            "logging: enabled\nerror_handling: abort\nunsupported_version: fallback\nrows: 40\ncolumns: 100\nrandom_seed: 1234\nundo_depth: 3\nsave_directory: /tmp/saves\nautosave: true\n"
        ));
        assert!(config.logging());
        assert_eq!(config.error_handling(), ErrorHandling::Abort);
        assert_eq!(config.unsupported_version(), VersionPolicy::Fallback);
        assert_eq!(config.rows(), 40);
        assert_eq!(config.columns(), 100);
        assert_eq!(config.random_seed(), Some(1234));
        assert_eq!(config.undo_depth(), 3);
        assert_eq!(config.save_directory(), Some("/tmp/saves"));
        assert!(config.autosave());
    }

    #[test]
    fn test_try_from_str_defaults() {
        let config = assert_ok!(Config::try_from("error_handling: bogus\n"));
        assert_eq!(config.error_handling(), ErrorHandling::ContinueWarnOnce);
        assert_eq!(config.unsupported_version(), VersionPolicy::Reject);
        assert_eq!(config.columns(), 80);
    }

    #[test]
    fn test_try_from_str_invalid() {
        let e = Config::try_from("logging: [enabled").unwrap_err();
        assert_eq!(e.code(), ErrorCode::ConfigError);
        assert!(e.is_recoverable());
    }

    #[test]
    fn test_try_from_file() {
        let mut file = assert_ok!(tempfile::tempfile());
        assert!(file.write_all(b"error_handling: ignore\ncolumns: 64\n").is_ok());
        assert!(file.seek(SeekFrom::Start(0)).is_ok());
        let config = assert_ok!(Config::try_from(file));
        assert_eq!(config.error_handling(), ErrorHandling::Ignore);
        assert_eq!(config.columns(), 64);
    }
}
