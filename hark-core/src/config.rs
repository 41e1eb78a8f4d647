//! Assistant configuration
//!
//! Built once at startup from defaults, an optional JSON file and the
//! environment, then shared read-only. The only mutable piece is the lazily
//! filled mail credentials, which live in [`crate::mail::CredentialStore`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Search endpoint; the percent-encoded query is appended
pub const DEFAULT_SEARCH_URL: &str = "https://www.google.com/search?q=";

/// How long a single listen step may wait for and record speech
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenBounds {
    /// Seconds to wait for speech to start
    pub timeout_secs: u64,
    /// Seconds of speech to record at most
    pub phrase_limit_secs: u64,
}

impl ListenBounds {
    pub const fn new(timeout_secs: u64, phrase_limit_secs: u64) -> Self {
        Self {
            timeout_secs,
            phrase_limit_secs,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn phrase_limit(&self) -> Duration {
        Duration::from_secs(self.phrase_limit_secs)
    }
}

/// Bounds for each kind of listen step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Main loop command listen
    pub command: ListenBounds,
    /// Listen triggered from the HTTP endpoint
    pub trigger: ListenBounds,
    /// Yes/no answer before dictating a mail body
    pub confirm: ListenBounds,
    /// Mail body dictation
    pub dictation: ListenBounds,
    /// Follow-up when a reminder had no time phrase
    pub reminder_time: ListenBounds,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            command: ListenBounds::new(8, 10),
            trigger: ListenBounds::new(6, 10),
            confirm: ListenBounds::new(4, 4),
            dictation: ListenBounds::new(6, 60),
            reminder_time: ListenBounds::new(8, 6),
        }
    }
}

/// Outbound mail relay (implicit TLS)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 465,
        }
    }
}

/// Trigger endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

/// Process-wide assistant configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base directory for created files and folders
    pub desktop_dir: PathBuf,
    /// App name -> executable path
    pub app_paths: HashMap<String, String>,
    /// Site name -> URL
    pub site_shortcuts: HashMap<String, String>,
    pub search_url: String,
    pub smtp: SmtpConfig,
    pub server: ServerConfig,
    pub listen: ListenConfig,
}

impl Default for Config {
    fn default() -> Self {
        let site_shortcuts = [
            ("youtube", "https://www.youtube.com"),
            ("google", "https://www.google.com"),
            ("gmail", "https://mail.google.com"),
            ("facebook", "https://facebook.com"),
            ("instagram", "https://instagram.com"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            desktop_dir: default_desktop_dir(),
            app_paths: HashMap::new(),
            site_shortcuts,
            search_url: DEFAULT_SEARCH_URL.to_string(),
            smtp: SmtpConfig::default(),
            server: ServerConfig::default(),
            listen: ListenConfig::default(),
        }
    }
}

impl Config {
    /// Load defaults, overlaid with the JSON file at `path` when given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.normalized())
    }

    /// Parse a JSON config file; missing fields keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Config = serde_json::from_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config.normalized())
    }

    /// Lowercase table keys so lookups are case-insensitive
    fn normalized(mut self) -> Self {
        self.app_paths = self
            .app_paths
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v))
            .collect();
        self.site_shortcuts = self
            .site_shortcuts
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v))
            .collect();
        debug!(
            "Config has {} app paths and {} site shortcuts",
            self.app_paths.len(),
            self.site_shortcuts.len()
        );
        self
    }

    /// Look up a site shortcut by exact (normalized) name
    pub fn site_shortcut(&self, name: &str) -> Option<&str> {
        self.site_shortcuts.get(name).map(String::as_str)
    }

    /// Look up an app path, ignoring case
    pub fn app_path(&self, name: &str) -> Option<&str> {
        self.app_paths
            .get(&name.to_lowercase())
            .map(String::as_str)
    }

    /// Address the trigger server binds to
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// `~/Desktop`, or `./Desktop` when the home directory is unknown
pub fn default_desktop_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Desktop")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(
            config.site_shortcut("youtube"),
            Some("https://www.youtube.com")
        );
        assert!(config.app_paths.is_empty());
        assert_eq!(config.smtp.host, "smtp.gmail.com");
        assert_eq!(config.smtp.port, 465);
        assert_eq!(config.server_addr(), "127.0.0.1:5000");
        assert!(config.desktop_dir.ends_with("Desktop"));
        assert_eq!(config.listen.command, ListenBounds::new(8, 10));
    }

    #[test]
    fn test_file_overlay_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "app_paths": {{ "Notepad": "C:\\Windows\\notepad.exe" }},
                "smtp": {{ "host": "smtp.example.com" }}
            }}"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.app_path("NOTEPAD"), Some("C:\\Windows\\notepad.exe"));
        assert_eq!(config.smtp.host, "smtp.example.com");
        assert_eq!(config.smtp.port, 465);
        // untouched sections keep their defaults
        assert_eq!(config.site_shortcut("gmail"), Some("https://mail.google.com"));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = Config::load(Some(Path::new("/nonexistent/hark.json")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_json_is_serialization_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let result = Config::load(Some(file.path()));
        assert!(matches!(result, Err(Error::Serialization(_))));
    }
}
