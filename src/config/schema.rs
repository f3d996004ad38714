//! Configuration schema for shopkeep.toml.
//!
//! Credentials follow the original deployment convention of arriving through
//! the environment; file values act as defaults and environment variables
//! override them.

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShopkeepConfig {
    /// Telegram bot token issued by BotFather.
    pub telegram_bot_token: String,

    /// OpenRouter (OpenAI-compatible) API base URL.
    pub openrouter_api_url: String,

    /// OpenRouter API key.
    pub openrouter_api_key: String,

    /// Chat model identifier for both calls of a run.
    pub model: String,

    /// Etsy Open API base URL.
    pub etsy_api_url: String,

    /// Etsy application API key.
    pub etsy_api_key: String,

    /// Numeric shop identifier the client operates on.
    pub etsy_shop_id: String,

    /// OAuth access token for the shop.
    pub etsy_access_token: String,

    /// Maximum tool-call rounds per message before forcing a reply.
    pub max_tool_rounds: u32,

    /// Long-poll timeout passed to getUpdates, in seconds.
    pub poll_timeout_secs: u64,

    /// Pause between poll iterations, in seconds.
    pub poll_interval_secs: u64,

    /// Maximum consecutive poll errors before backing off.
    pub max_consecutive_errors: u32,

    /// Log level (debug, info, warn, error).
    pub log_level: String,

    /// Config version.
    pub version: u32,
}

impl Default for ShopkeepConfig {
    fn default() -> Self {
        Self {
            telegram_bot_token: String::new(),
            openrouter_api_url: "https://openrouter.ai/api/v1".into(),
            openrouter_api_key: String::new(),
            model: "openai/gpt-4o".into(),
            etsy_api_url: "https://openapi.etsy.com/v3/application".into(),
            etsy_api_key: String::new(),
            etsy_shop_id: String::new(),
            etsy_access_token: String::new(),
            max_tool_rounds: 1,
            poll_timeout_secs: 30,
            poll_interval_secs: 2,
            max_consecutive_errors: 5,
            log_level: "info".into(),
            version: 1,
        }
    }
}

/// Environment variable → config field mapping for credentials.
const ENV_OVERRIDES: &[&str] = &[
    "TELEGRAM_BOT_TOKEN",
    "OPENROUTER_API_KEY",
    "ETSY_API_KEY",
    "ETSY_SHOP_ID",
    "ETSY_ACCESS_TOKEN",
];

impl ShopkeepConfig {
    /// Apply credential overrides from `lookup` (normally `std::env::var`).
    ///
    /// Taking a closure keeps this testable without mutating process state.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for &key in ENV_OVERRIDES {
            let Some(value) = lookup(key) else { continue };
            if value.is_empty() {
                continue;
            }
            match key {
                "TELEGRAM_BOT_TOKEN" => self.telegram_bot_token = value,
                "OPENROUTER_API_KEY" => self.openrouter_api_key = value,
                "ETSY_API_KEY" => self.etsy_api_key = value,
                "ETSY_SHOP_ID" => self.etsy_shop_id = value,
                "ETSY_ACCESS_TOKEN" => self.etsy_access_token = value,
                _ => unreachable!(),
            }
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Names of required credentials that are still unset.
    ///
    /// Missing credentials are surfaced as startup warnings, never a silent
    /// no-op; the process keeps running so `doctor` can report them.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.telegram_bot_token.is_empty() {
            missing.push("TELEGRAM_BOT_TOKEN");
        }
        if self.openrouter_api_key.is_empty() {
            missing.push("OPENROUTER_API_KEY");
        }
        if self.etsy_api_key.is_empty() {
            missing.push("ETSY_API_KEY");
        }
        if self.etsy_shop_id.is_empty() {
            missing.push("ETSY_SHOP_ID");
        }
        if self.etsy_access_token.is_empty() {
            missing.push("ETSY_ACCESS_TOKEN");
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_point_at_public_endpoints() {
        let config = ShopkeepConfig::default();
        assert_eq!(config.openrouter_api_url, "https://openrouter.ai/api/v1");
        assert_eq!(config.etsy_api_url, "https://openapi.etsy.com/v3/application");
        assert_eq!(config.max_tool_rounds, 1);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config: ShopkeepConfig = toml::from_str(
            r#"
            model = "openai/gpt-4o-mini"
            etsy_shop_id = "12345678"
            "#,
        )
        .unwrap();

        assert_eq!(config.model, "openai/gpt-4o-mini");
        assert_eq!(config.etsy_shop_id, "12345678");
        assert_eq!(config.poll_timeout_secs, 30);
    }

    #[test]
    fn overrides_replace_file_values_but_not_with_empty() {
        let mut env = HashMap::new();
        env.insert("TELEGRAM_BOT_TOKEN", "123:abc");
        env.insert("ETSY_API_KEY", "");

        let mut config = ShopkeepConfig {
            telegram_bot_token: "from-file".into(),
            etsy_api_key: "file-key".into(),
            ..ShopkeepConfig::default()
        };
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.telegram_bot_token, "123:abc");
        assert_eq!(config.etsy_api_key, "file-key");
    }

    #[test]
    fn missing_credentials_lists_unset_names() {
        let config = ShopkeepConfig::default();
        let missing = config.missing_credentials();
        assert!(missing.contains(&"TELEGRAM_BOT_TOKEN"));
        assert_eq!(missing.len(), 5);

        let mut config = ShopkeepConfig::default();
        config.apply_overrides(|_| Some("set".into()));
        assert!(config.missing_credentials().is_empty());
    }
}
