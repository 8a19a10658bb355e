//! Configuration loader and validator for the admin client.
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Environment variable that overrides `api.base_url`.
pub const BASE_URL_ENV: &str = "ECO_API_BASE_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub api: Api,
    pub media: Media,
    pub session: Session,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    pub request_timeout_secs: u64,
}

/// Backend REST API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Api {
    pub base_url: String,
}

/// Third-party media host settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Media {
    pub base_url: String,
}

/// Session credential settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    /// Lifetime assigned to a stored token; 0 keeps it until logout.
    pub ttl_hours: u64,
}

impl App {
    /// Expand a leading `~/` in `data_dir`.
    pub fn resolved_data_dir(&self) -> String {
        match self.data_dir.strip_prefix("~/") {
            Some(rest) => match std::env::var("HOME") {
                Ok(home) => format!("{}/{}", home.trim_end_matches('/'), rest),
                Err(_) => self.data_dir.clone(),
            },
            None => self.data_dir.clone(),
        }
    }
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(self.app.resolved_data_dir())
    }

    /// Backend base URL, honouring `ECO_API_BASE_URL` when set.
    pub fn api_base_url(&self) -> Result<Url, ConfigError> {
        let raw = std::env::var(BASE_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.api.base_url.clone());
        parse_base(&raw).ok_or(ConfigError::Invalid("api.base_url must be an absolute http(s) URL"))
    }

    pub fn media_base_url(&self) -> Result<Url, ConfigError> {
        parse_base(&self.media.base_url)
            .ok_or(ConfigError::Invalid("media.base_url must be an absolute http(s) URL"))
    }

    /// SQLite URL for the session slot, honouring `DATABASE_URL` when set.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| format!("sqlite://{}/admin.db", self.app.resolved_data_dir()))
    }
}

/// Parse a base URL and make sure it ends with `/` so that `Url::join`
/// appends instead of replacing the last path segment.
fn parse_base(raw: &str) -> Option<Url> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    let url = Url::parse(&with_slash).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.request_timeout_secs == 0 {
        return Err(ConfigError::Invalid("app.request_timeout_secs must be > 0"));
    }
    if cfg.api.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("api.base_url must be non-empty"));
    }
    if parse_base(&cfg.api.base_url).is_none() {
        return Err(ConfigError::Invalid("api.base_url must be an absolute http(s) URL"));
    }
    if parse_base(&cfg.media.base_url).is_none() {
        return Err(ConfigError::Invalid("media.base_url must be an absolute http(s) URL"));
    }
    Ok(())
}

/// Example YAML written by `ecoholiday-admin init`.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  request_timeout_secs: 30

api:
  base_url: "http://localhost:3000/api"

media:
  base_url: "https://api.cloudinary.com"

session:
  ttl_hours: 24
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.session.ttl_hours, 24);
    }

    #[test]
    fn invalid_base_url() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.api.base_url = "".into();
        let err = validate(&cfg).unwrap_err();
        match err { ConfigError::Invalid(msg) => assert!(msg.contains("api.base_url")), _ => panic!("wrong error") }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.api.base_url = "ftp://example.com".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.media.base_url = "not a url".into();
        let err = validate(&cfg).unwrap_err();
        match err { ConfigError::Invalid(msg) => assert!(msg.contains("media.base_url")), _ => panic!("wrong error") }
    }

    #[test]
    fn invalid_app_settings() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = "  ".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.request_timeout_secs = 0;
        let err = validate(&cfg).unwrap_err();
        match err { ConfigError::Invalid(msg) => assert!(msg.contains("request_timeout_secs")), _ => panic!("wrong error") }
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let url = parse_base("http://localhost:3000/api").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/api/");
        assert_eq!(url.join("bookings").unwrap().path(), "/api/bookings");
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.media.base_url, "https://api.cloudinary.com");
    }
}
