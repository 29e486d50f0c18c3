use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api/v1";
pub const DEFAULT_CITY: &str = "London";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 5 * 60;

/// Environment variable that overrides the configured API base URL.
pub const API_URL_ENV: &str = "SKYWATCH_API_URL";

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_url = "https://weather.example.com/api/v1"
/// default_city = "Tokyo"
/// cache_ttl_secs = 120
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the backend, including the versioned prefix.
    pub api_url: Option<String>,

    /// City the dashboard opens with.
    pub default_city: Option<String>,

    /// Per-request timeout; must be at least one second.
    pub timeout_secs: Option<u64>,

    /// Freshness window for cached query results.
    pub cache_ttl_secs: Option<u64>,
}

impl Config {
    /// Effective API base URL: environment first, then file, then default.
    pub fn api_url(&self) -> String {
        self.api_url_with_env(std::env::var(API_URL_ENV).ok())
    }

    pub fn api_url_with_env(&self, env_value: Option<String>) -> String {
        env_value
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn default_city(&self) -> &str {
        self.default_city
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CITY)
    }

    pub fn timeout(&self) -> Duration {
        let secs = self.timeout_secs.filter(|s| *s > 0).unwrap_or(DEFAULT_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs.unwrap_or(DEFAULT_CACHE_TTL_SECS))
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        if cfg.timeout_secs == Some(0) {
            return Err(anyhow!(
                "Invalid config file {}: timeout_secs must be at least 1",
                path.display()
            ));
        }

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Path to the persisted bearer token.
    pub fn token_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.data_dir().join(crate::token::TOKEN_KEY))
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "skywatch", "skywatch")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_empty_config() {
        let cfg = Config::default();

        assert_eq!(cfg.api_url_with_env(None), DEFAULT_API_URL);
        assert_eq!(cfg.default_city(), "London");
        assert_eq!(cfg.timeout(), Duration::from_secs(10));
        assert_eq!(cfg.cache_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn env_overrides_file_api_url() {
        let cfg = Config { api_url: Some("http://file/api/v1".into()), ..Default::default() };

        assert_eq!(cfg.api_url_with_env(None), "http://file/api/v1");
        assert_eq!(cfg.api_url_with_env(Some("http://env/api/v1/".into())), "http://env/api/v1");
        assert_eq!(cfg.api_url_with_env(Some("  ".into())), "http://file/api/v1");
    }

    #[test]
    fn blank_default_city_falls_back() {
        let cfg = Config { default_city: Some("   ".into()), ..Default::default() };
        assert_eq!(cfg.default_city(), DEFAULT_CITY);
    }

    #[test]
    fn missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config {
            api_url: Some("https://weather.example.com/api/v1".into()),
            default_city: Some("Tokyo".into()),
            timeout_secs: None,
            cache_ttl_secs: Some(60),
        };

        cfg.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();

        assert_eq!(loaded, cfg);
        assert_eq!(loaded.cache_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "timeout_secs = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("timeout_secs must be at least 1"));

        let cfg = Config { timeout_secs: Some(0), ..Default::default() };
        assert_eq!(cfg.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        let cfg = Config { timeout_secs: Some(3), ..Default::default() };
        assert_eq!(cfg.timeout(), Duration::from_secs(3));
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_url = [").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
