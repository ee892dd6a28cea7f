//! Configuration system for SMIB
//!
//! Configuration is loaded from `~/.smib/config.json`, then environment
//! variables override individual values. The CLI applies its own flags on top.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Environment variable overriding `slack.token`
pub const ENV_SLACK_TOKEN: &str = "SMIB_SLACK_TOKEN";
/// Environment variable overriding `commands.dir`
pub const ENV_COMMANDS_DIR: &str = "SMIB_COMMANDS_DIR";

/// Slack channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackConfig {
    /// Whether Slack is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Bot token (xoxb-...)
    #[serde(default)]
    pub token: String,
    /// Web API base URL
    #[serde(default = "default_slack_api_base")]
    pub api_base: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token: String::new(),
            api_base: default_slack_api_base(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_slack_api_base() -> String {
    "https://slack.com/api".to_string()
}

/// Where commands live and how they are triggered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    /// Directory containing the command executables
    #[serde(default = "default_commands_dir")]
    pub dir: String,
    /// Character that marks a chat message as a command
    #[serde(default = "default_trigger")]
    pub trigger: char,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            dir: default_commands_dir(),
            trigger: default_trigger(),
        }
    }
}

fn default_commands_dir() -> String {
    "~/.smib/commands".to_string()
}

fn default_trigger() -> char {
    '?'
}

/// Root configuration for SMIB
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Slack configuration
    #[serde(default)]
    pub slack: SlackConfig,
    /// Command directory configuration
    #[serde(default)]
    pub commands: CommandsConfig,
}

impl Config {
    /// Get the expanded command directory path
    pub fn commands_path(&self) -> PathBuf {
        expand_tilde(&self.commands.dir)
    }

    /// Get the Slack token if one is configured
    pub fn slack_token(&self) -> Option<&str> {
        (!self.slack.token.is_empty()).then_some(self.slack.token.as_str())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var(ENV_SLACK_TOKEN).ok(),
            std::env::var(ENV_COMMANDS_DIR).ok(),
        );
    }

    /// Override the token and command directory when values are given.
    /// Empty values are ignored.
    pub fn apply_overrides(&mut self, token: Option<String>, commands_dir: Option<String>) {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            tracing::debug!("Slack token overridden");
            self.slack.token = token;
        }
        if let Some(dir) = commands_dir.filter(|d| !d.is_empty()) {
            tracing::debug!("Command directory overridden: {}", dir);
            self.commands.dir = dir;
        }
    }
}

/// Expand tilde in path
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Get the default config directory
pub fn get_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".smib")
}

/// Get the config file path
pub fn get_config_path() -> PathBuf {
    get_config_dir().join("config.json")
}

/// Load configuration from the default path
pub async fn load_config() -> Result<Config> {
    load_config_from(&get_config_path()).await
}

/// Load configuration from a file and apply environment overrides
pub async fn load_config_from(config_path: &Path) -> Result<Config> {
    if !config_path.exists() {
        return Err(ConfigError::NotFound(config_path.to_path_buf()).into());
    }

    let contents = fs::read_to_string(config_path).await?;

    let mut config: Config = serde_json::from_str(&contents)
        .map_err(|e| ConfigError::Parse(format!("Failed to parse config JSON: {}", e)))?;

    config.apply_env_overrides();

    Ok(config)
}

/// Save configuration to the default path
pub async fn save_config(config: &Config) -> Result<()> {
    save_config_to(config, &get_config_path()).await
}

/// Save configuration to a file, creating its directory if needed
pub async fn save_config_to(config: &Config, config_path: &Path) -> Result<()> {
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_string_pretty(config)
        .map_err(|e| ConfigError::Parse(format!("Failed to serialize config: {}", e)))?;

    fs::write(config_path, json).await?;

    Ok(())
}

/// Create a default configuration
pub fn default_config() -> Config {
    Config::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = default_config();
        assert_eq!(config.commands.trigger, '?');
        assert_eq!(config.slack.api_base, "https://slack.com/api");
        assert!(config.slack.enabled);
        assert!(config.slack_token().is_none());
    }

    #[test]
    fn test_commands_path_expansion() {
        let config = Config::default();
        let path = config.commands_path();
        assert!(!path.starts_with("~"));
        assert!(path.ends_with(".smib/commands"));
    }

    #[test]
    fn test_config_paths() {
        let config_dir = get_config_dir();
        let config_path = get_config_path();
        assert!(config_path.starts_with(&config_dir));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"slack": {"token": "xoxb-1"}, "commands": {"trigger": "!"}}"#)
                .unwrap();
        assert_eq!(config.slack_token(), Some("xoxb-1"));
        assert_eq!(config.commands.trigger, '!');
        assert_eq!(config.commands.dir, "~/.smib/commands");
    }

    #[test]
    fn test_overrides_ignore_empty_values() {
        let mut config = Config::default();
        config.apply_overrides(Some("xoxb-2".to_string()), Some(String::new()));
        assert_eq!(config.slack.token, "xoxb-2");
        assert_eq!(config.commands.dir, "~/.smib/commands");

        config.apply_overrides(None, Some("/srv/smib".to_string()));
        assert_eq!(config.slack.token, "xoxb-2");
        assert_eq!(config.commands_path(), PathBuf::from("/srv/smib"));
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.commands.dir = "/opt/commands".to_string();
        save_config_to(&config, &path).await.unwrap();

        let loaded = load_config_from(&path).await.unwrap();
        assert_eq!(loaded.commands.dir, config.commands.dir);
        assert_eq!(loaded.commands.trigger, '?');
    }

    #[tokio::test]
    async fn test_load_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config_from(&dir.path().join("missing.json"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::SmibError::Config(ConfigError::NotFound(_))
        ));
    }
}
