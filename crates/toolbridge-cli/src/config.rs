//! CLI configuration

use serde::{Deserialize, Serialize};

/// CLI-local settings, loaded from `~/.config/toolbridge/config.toml`.
///
/// Everything the surrounding agent needs is carried here explicitly;
/// nothing mutates the process environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Framework the tool specs default to when `--format` is not given
    #[serde(default)]
    pub default_provider: Option<String>,

    /// Enable colors in output
    #[serde(default = "default_true")]
    pub colors: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            default_provider: None,
            colors: true,
            verbose: false,
        }
    }
}

impl CliConfig {
    /// Load from the user config directory, falling back to defaults.
    pub fn load() -> Self {
        let Some(config_dir) = dirs::config_dir() else {
            return Self::default();
        };

        let path = config_dir.join("toolbridge").join("config.toml");
        std::fs::read_to_string(&path)
            .ok()
            .and_then(|content| toml::from_str(&content).ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = CliConfig::default();
        assert!(config.colors);
        assert!(!config.verbose);
        assert!(config.default_provider.is_none());
    }

    #[test]
    fn parses_partial_config() {
        let config: CliConfig = toml::from_str("default_provider = \"openai\"").unwrap();
        assert_eq!(config.default_provider.as_deref(), Some("openai"));
        assert!(config.colors);
    }
}
