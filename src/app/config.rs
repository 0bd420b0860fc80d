//! Run configuration.
//!
//! [`ScanConfig`] is the immutable description of one scan, built from command line flags.
//! [`ScanSettings`] holds the operator defaults that rarely change between runs and are read
//! from an optional TOML file under the platform config directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Role assumed in member accounts when no role name is configured
pub const DEFAULT_ROLE_NAME: &str = "resource-discovery-role";
/// Default audit log file name, relative to the working directory
pub const DEFAULT_OUTPUT: &str = "aws-resource-discovery.csv";
pub const DEFAULT_COUNTER_TIMEOUT_SECS: u64 = 300;

/// What to scan and how to authenticate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanConfig {
    /// Role assumed once at startup to obtain the initial credentials
    pub role_arn: Option<String>,
    /// Present for a single-account scan, absent for an organization scan
    pub account_id: Option<String>,
    /// Restricts the scan to one region; all enabled regions otherwise
    pub region: Option<String>,
    /// Role assumed in each scanned account
    pub role_name: Option<String>,
    /// Print CloudTrail information after the scan
    pub trail: bool,
    pub exclude_accounts: Vec<String>,
}

impl ScanConfig {
    pub fn is_single_account(&self) -> bool {
        self.account_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    pub fn is_excluded(&self, account_id: &str) -> bool {
        self.exclude_accounts.iter().any(|id| id == account_id)
    }

    /// Union the settings-file defaults into flags given on the command line
    pub fn with_settings(mut self, settings: &ScanSettings) -> Self {
        if self.role_name.is_none() {
            self.role_name = settings.default_role_name.clone();
        }
        for id in &settings.exclude_accounts {
            if !self.is_excluded(id) {
                self.exclude_accounts.push(id.clone());
            }
        }
        self
    }
}

/// Split a comma separated account list, dropping blanks
pub fn parse_account_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScanSettings {
    pub default_role_name: Option<String>,
    pub output: PathBuf,
    pub counter_timeout_secs: u64,
    pub exclude_accounts: Vec<String>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            default_role_name: None,
            output: PathBuf::from(DEFAULT_OUTPUT),
            counter_timeout_secs: DEFAULT_COUNTER_TIMEOUT_SECS,
            exclude_accounts: Vec::new(),
        }
    }
}

impl ScanSettings {
    /// `<config dir>/awsscan/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "", "awsscan")
            .map(|proj_dirs| proj_dirs.config_dir().join("config.toml"))
    }

    /// Load settings from an explicit path, or from the default location if it exists.
    ///
    /// A missing default file yields the built-in defaults. An explicit path must exist and
    /// parse.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let settings: ScanSettings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))?;
        if settings.counter_timeout_secs == 0 {
            anyhow::bail!(
                "Invalid settings file {}: counter_timeout_secs must be at least 1",
                path.display()
            );
        }
        trace_debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn counter_timeout(&self) -> Duration {
        Duration::from_secs(self.counter_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_account_list() {
        assert_eq!(
            parse_account_list("111111111111, 222222222222,,"),
            vec!["111111111111".to_string(), "222222222222".to_string()]
        );
        assert!(parse_account_list("").is_empty());
    }

    #[test]
    fn test_single_account_selection() {
        let mut config = ScanConfig::default();
        assert!(!config.is_single_account());
        config.account_id = Some(String::new());
        assert!(!config.is_single_account());
        config.account_id = Some("111111111111".to_string());
        assert!(config.is_single_account());
    }

    #[test]
    fn test_settings_defaults_when_file_empty() {
        let settings: ScanSettings = toml::from_str("").unwrap();
        assert_eq!(settings, ScanSettings::default());
        assert_eq!(settings.counter_timeout(), Duration::from_secs(300));
        assert_eq!(settings.output, PathBuf::from("aws-resource-discovery.csv"));
    }

    #[test]
    fn test_settings_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "default_role_name = \"auditor\"\ncounter_timeout_secs = 30\nexclude_accounts = [\"333333333333\"]"
        )
        .unwrap();

        let settings = ScanSettings::load(Some(file.path())).unwrap();
        assert_eq!(settings.default_role_name.as_deref(), Some("auditor"));
        assert_eq!(settings.counter_timeout_secs, 30);

        let config = ScanConfig {
            exclude_accounts: vec!["222222222222".to_string(), "333333333333".to_string()],
            ..Default::default()
        }
        .with_settings(&settings);
        assert_eq!(config.role_name.as_deref(), Some("auditor"));
        assert_eq!(config.exclude_accounts.len(), 2);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ScanSettings::load(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_zero_counter_timeout_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "counter_timeout_secs = 0").unwrap();

        let err = ScanSettings::load(Some(file.path())).unwrap_err();
        assert!(format!("{:#}", err).contains("counter_timeout_secs must be at least 1"));
    }

    #[test]
    fn test_cli_role_name_wins_over_settings() {
        let settings = ScanSettings {
            default_role_name: Some("auditor".to_string()),
            ..Default::default()
        };
        let config = ScanConfig {
            role_name: Some("scanner".to_string()),
            ..Default::default()
        }
        .with_settings(&settings);
        assert_eq!(config.role_name.as_deref(), Some("scanner"));
    }
}
