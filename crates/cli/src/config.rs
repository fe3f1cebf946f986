//! Wisp CLI configuration (`wisp.toml`), loaded with `toml` +
//! `serde` the way `wisp-compiler`'s `LintConfig::from_toml` parses its own
//! TOML rule file. Absence of the file is not an error — `WispConfig`
//! derives `Default` and every field has a default applied through serde.

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReplConfig {
    pub history_file: PathBuf,
}

impl Default for ReplConfig {
    fn default() -> Self {
        ReplConfig {
            history_file: PathBuf::from("~/.wisp_history"),
        }
    }
}

impl ReplConfig {
    /// Resolves `history_file` to a real, absolute path: a leading `~`
    /// component is replaced with the user's home directory, the way
    /// `home::home_dir()` backs history-file paths elsewhere. Any other
    /// path (relative or already absolute) is returned unchanged, since
    /// `rustyline` itself does no tilde expansion.
    pub fn resolved_history_path(&self) -> PathBuf {
        let mut components = self.history_file.components();
        match components.next() {
            Some(std::path::Component::Normal(first)) if first == "~" => {
                match home::home_dir() {
                    Some(home) => home.join(components.as_path()),
                    None => self.history_file.clone(),
                }
            }
            _ => self.history_file.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub default_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            default_level: "warn".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WispConfig {
    pub repl: ReplConfig,
    pub logging: LoggingConfig,
}

impl WispConfig {
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse wisp.toml: {e}"))
    }

    /// Loads `path` if given, else falls back to `./wisp.toml` if it
    /// exists, else the default configuration.
    pub fn load(path: Option<&Path>) -> Result<Self, String> {
        let candidate = path.map(Path::to_path_buf).or_else(|| {
            let default = PathBuf::from("wisp.toml");
            default.exists().then_some(default)
        });
        match candidate {
            Some(path) => {
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
                Self::from_toml(&text)
            }
            None => Ok(WispConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_applies_with_no_file_present() {
        let config = WispConfig::load(None).unwrap();
        assert_eq!(config.logging.default_level, "warn");
        assert_eq!(config.repl.history_file, PathBuf::from("~/.wisp_history"));
    }

    #[test]
    fn partial_toml_falls_back_to_defaults_for_missing_fields() {
        let config = WispConfig::from_toml("[logging]\ndefault_level = \"debug\"\n").unwrap();
        assert_eq!(config.logging.default_level, "debug");
        assert_eq!(config.repl.history_file, PathBuf::from("~/.wisp_history"));
    }

    #[test]
    fn malformed_toml_is_reported() {
        assert!(WispConfig::from_toml("not = [valid").is_err());
    }

    #[test]
    fn tilde_prefixed_history_path_expands_to_the_home_directory() {
        let config = ReplConfig {
            history_file: PathBuf::from("~/.wisp_history"),
        };
        let resolved = config.resolved_history_path();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with(".wisp_history"));
        assert_ne!(resolved, config.history_file);
    }

    #[test]
    fn non_tilde_history_path_is_left_untouched() {
        let config = ReplConfig {
            history_file: PathBuf::from("/var/log/wisp_history"),
        };
        assert_eq!(
            config.resolved_history_path(),
            PathBuf::from("/var/log/wisp_history")
        );
    }
}
