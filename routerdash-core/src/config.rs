use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::auth::{Account, default_accounts};
use crate::model::{ChartMode, SortOrder};

/// Seconds an auto-refresh period is clamped to at minimum
pub const MIN_REFRESH_SECS: u64 = 5;

/// Interval choices offered by the dashboard, in seconds
pub const REFRESH_CHOICES: [u64; 5] = [10, 20, 30, 60, 120];

/// Backend connection settings
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Base URL of the telemetry REST API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".into()
}
fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RefreshConfig {
    /// Start with auto-refresh enabled
    #[serde(default)]
    pub auto: bool,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_interval_secs() -> u64 {
    30
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            auto: false,
            interval_secs: default_interval_secs(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TableConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default)]
    pub order: SortOrder,
}

fn default_page_size() -> u32 {
    200
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            order: SortOrder::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChartConfig {
    #[serde(default)]
    pub mode: ChartMode,

    /// Length of the initial date window ending today
    #[serde(default = "default_days")]
    pub default_days: u32,
}

fn default_days() -> u32 {
    7
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            mode: ChartMode::default(),
            default_days: default_days(),
        }
    }
}

/// Root configuration file structure
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DashConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(default)]
    pub table: TableConfig,

    #[serde(default)]
    pub chart: ChartConfig,

    /// Accounts allowed through the login form
    #[serde(default = "default_accounts")]
    pub accounts: Vec<Account>,

    /// JSON file holding the logged-in user
    #[serde(default = "default_session_path")]
    pub session_path: PathBuf,

    /// Directory for the rolling log file
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

fn default_session_path() -> PathBuf {
    PathBuf::from(".routerdash/session.json")
}
fn default_log_dir() -> PathBuf {
    PathBuf::from(".routerdash/logs")
}

impl Default for DashConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            refresh: RefreshConfig::default(),
            table: TableConfig::default(),
            chart: ChartConfig::default(),
            accounts: default_accounts(),
            session_path: default_session_path(),
            log_dir: default_log_dir(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
    EmptyBaseUrl,
    UnsupportedScheme { url: String },
    ZeroPageSize,
    ZeroDefaultDays,
    EmptyAccountId { index: usize },
    NotFound { searched: Vec<PathBuf> },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Yaml(e) => write!(f, "YAML parse error: {}", e),
            Self::EmptyBaseUrl => write!(f, "api.base_url must not be empty"),
            Self::UnsupportedScheme { url } => {
                write!(f, "api.base_url '{}' must start with http:// or https://", url)
            }
            Self::ZeroPageSize => write!(f, "table.page_size must be at least 1"),
            Self::ZeroDefaultDays => write!(f, "chart.default_days must be at least 1"),
            Self::EmptyAccountId { index } => {
                write!(f, "accounts[{}] has an empty id", index)
            }
            Self::NotFound { searched } => {
                write!(f, "no config file found, searched: {:?}", searched)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigError::Yaml(e)
    }
}

impl DashConfig {
    /// Load configuration from a file. Relative paths inside it resolve
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_str(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Parse configuration from a string. Values are not validated here
    /// so command-line overrides can still replace them; call `validate`.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        // An empty file is valid and means "all defaults"
        let config: DashConfig = if content.trim().is_empty() {
            DashConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };
        Ok(config)
    }

    /// Search for config file in standard locations
    pub fn discover(start_dir: &Path) -> Result<(PathBuf, Self), ConfigError> {
        let names = [
            "routerdash.yaml",
            "routerdash.yml",
            ".routerdash.yaml",
            ".routerdash.yml",
        ];
        let mut searched = Vec::new();

        if let Ok(env_path) = std::env::var("ROUTERDASH_CONFIG") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Ok((path.clone(), Self::load(&path)?));
            }
            searched.push(path);
        }

        let mut dir = Some(start_dir);
        while let Some(current) = dir {
            for name in &names {
                let path = current.join(name);
                if path.exists() {
                    return Ok((path.clone(), Self::load(&path)?));
                }
                searched.push(path);
            }
            dir = current.parent();
        }

        Err(ConfigError::NotFound { searched })
    }

    /// Like `discover`, but a missing file yields defaults
    pub fn discover_or_default(start_dir: &Path) -> Result<(Option<PathBuf>, Self), ConfigError> {
        match Self::discover(start_dir) {
            Ok((path, config)) => Ok((Some(path), config)),
            Err(ConfigError::NotFound { .. }) => Ok((None, Self::default())),
            Err(e) => Err(e),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api.base_url.trim();
        if url.is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::UnsupportedScheme {
                url: url.to_string(),
            });
        }
        if self.table.page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        if self.chart.default_days == 0 {
            return Err(ConfigError::ZeroDefaultDays);
        }
        if let Some(index) = self.accounts.iter().position(|a| a.id.trim().is_empty()) {
            return Err(ConfigError::EmptyAccountId { index });
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        if self.session_path.is_relative() {
            self.session_path = base.join(&self.session_path);
        }
        if self.log_dir.is_relative() {
            self.log_dir = base.join(&self.log_dir);
        }
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.api.base_url.trim().trim_end_matches('/')
    }
}

/// Next auto-refresh interval in the fixed choice list
pub fn next_refresh_choice(current: u64) -> u64 {
    REFRESH_CHOICES
        .iter()
        .copied()
        .find(|&c| c > current)
        .unwrap_or(REFRESH_CHOICES[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_defaults() {
        let config = DashConfig::from_str("").unwrap();
        assert_eq!(config.base_url(), "http://127.0.0.1:8000");
        assert_eq!(config.table.page_size, 200);
        assert_eq!(config.table.order, SortOrder::Desc);
        assert_eq!(config.chart.mode, ChartMode::Raw);
        assert_eq!(config.chart.default_days, 7);
        assert!(!config.refresh.auto);
        assert_eq!(config.refresh.interval_secs, 30);
        assert_eq!(config.accounts.len(), 2);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
api:
  base_url: "https://telemetry.example.net/"
  timeout_ms: 2500
refresh:
  auto: true
  interval_secs: 60
table:
  page_size: 50
  order: asc
chart:
  mode: hourly_avg
  default_days: 3
accounts:
  - id: ops
    password: secret
"#;
        let config = DashConfig::from_str(yaml).unwrap();
        assert_eq!(config.base_url(), "https://telemetry.example.net");
        assert_eq!(config.api.timeout_ms, 2500);
        assert!(config.refresh.auto);
        assert_eq!(config.table.order, SortOrder::Asc);
        assert_eq!(config.chart.mode, ChartMode::HourlyAvg);
        assert_eq!(config.accounts, vec![Account::new("ops", "secret")]);
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            ("api:\n  base_url: \"\"\n", "EmptyBaseUrl"),
            ("api:\n  base_url: ftp://x\n", "UnsupportedScheme"),
            ("table:\n  page_size: 0\n", "ZeroPageSize"),
            ("chart:\n  default_days: 0\n", "ZeroDefaultDays"),
            ("accounts:\n  - id: \" \"\n    password: x\n", "EmptyAccountId"),
        ];
        for (yaml, want) in cases {
            let config = DashConfig::from_str(yaml).unwrap();
            let err = config.validate().unwrap_err();
            assert!(format!("{:?}", err).starts_with(want), "{} -> {:?}", want, err);
        }
    }

    #[test]
    fn test_discover_walks_parents_and_resolves_paths() {
        let root = std::env::temp_dir().join(format!("routerdash-config-{}", std::process::id()));
        let nested = root.join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.join(".routerdash.yml"), "session_path: state/session.json\n").unwrap();

        if std::env::var("ROUTERDASH_CONFIG").is_err() {
            let (path, config) = DashConfig::discover(&nested).unwrap();
            assert_eq!(path, root.join(".routerdash.yml"));
            assert_eq!(config.session_path, root.join("state/session.json"));
        }
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_refresh_choices_cycle() {
        assert_eq!(next_refresh_choice(10), 20);
        assert_eq!(next_refresh_choice(30), 60);
        assert_eq!(next_refresh_choice(120), 10);
        assert_eq!(next_refresh_choice(45), 60);
    }
}
