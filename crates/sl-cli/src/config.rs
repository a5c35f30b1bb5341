//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Default number of days covered by window commands.
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Days covered by `rects` and `recompute` when `--from` is omitted.
    pub window_days: u32,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("window_days", &self.window_days)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("shiftline.db"),
            window_days: DEFAULT_WINDOW_DAYS,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(config_path).extract()
    }

    fn figment(config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (SHIFTLINE_*)
        figment.merge(Env::prefixed("SHIFTLINE_"))
    }
}

/// Returns the platform-specific config directory for shiftline.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("shiftline"))
}

/// Returns the platform-specific data directory for shiftline.
///
/// On Linux: `~/.local/share/shiftline`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("shiftline"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_data_path_ends_with_shiftline() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "shiftline");
    }

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("shiftline.db"));
        assert_eq!(config.window_days, DEFAULT_WINDOW_DAYS);
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let config_file = temp.path().join("config.toml");
        std::fs::write(
            &config_file,
            "database_path = \"/tmp/shifts.db\"\nwindow_days = 14\n",
        )
        .unwrap();

        let config: Config = Config::figment(Some(&config_file)).extract().unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/shifts.db"));
        assert_eq!(config.window_days, 14);
    }

    #[test]
    fn test_partial_config_file_keeps_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let config_file = temp.path().join("config.toml");
        std::fs::write(&config_file, "window_days = 3\n").unwrap();

        let config: Config = Config::figment(Some(&config_file)).extract().unwrap();
        assert_eq!(config.window_days, 3);
        assert_eq!(config.database_path.file_name().unwrap(), "shiftline.db");
    }
}
