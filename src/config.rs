use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default = "default_server_config")]
    pub server: ServerConfig,
    #[serde(default = "default_events_config")]
    pub events: EventsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub webhook_url: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Shared secret passed to setWebhook and expected back on every delivery
    #[serde(default)]
    pub secret_token: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl TelegramConfig {
    /// None leaves reqwest's default in place.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// Route for inbound updates. Falls back to the path of `telegram.webhook_url`.
    #[serde(default)]
    pub webhook_path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EventsConfig {
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_event_capacity() -> usize {
    1024
}

fn default_server_config() -> ServerConfig {
    ServerConfig {
        listen_addr: default_listen_addr(),
        webhook_path: None,
    }
}

fn default_events_config() -> EventsConfig {
    EventsConfig {
        capacity: default_event_capacity(),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;

        if config.telegram.bot_token.trim().is_empty() {
            anyhow::bail!("telegram.bot_token must not be empty");
        }
        reqwest::Url::parse(&config.telegram.webhook_url).with_context(|| {
            format!(
                "telegram.webhook_url is not a valid URL: {}",
                config.telegram.webhook_url
            )
        })?;
        reqwest::Url::parse(&config.telegram.api_url).with_context(|| {
            format!(
                "telegram.api_url is not a valid URL: {}",
                config.telegram.api_url
            )
        })?;
        if config.events.capacity == 0 {
            anyhow::bail!("events.capacity must be greater than zero");
        }

        Ok(config)
    }

    /// Effective route for the webhook endpoint.
    pub fn webhook_path(&self) -> String {
        if let Some(path) = &self.server.webhook_path {
            return normalize_path(path);
        }
        // webhook_url was validated in parse()
        reqwest::Url::parse(&self.telegram.webhook_url)
            .map(|url| normalize_path(url.path()))
            .unwrap_or_else(|_| "/".to_string())
    }
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[telegram]
bot_token = "123:abc"
webhook_url = "https://bot.example.com/telegram/hook"
"#;

    #[test]
    fn test_defaults_applied() {
        let config = Config::parse(MINIMAL).unwrap();
        assert_eq!(config.telegram.api_url, "https://api.telegram.org");
        assert!(config.telegram.secret_token.is_none());
        assert!(config.telegram.request_timeout().is_none());
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert_eq!(config.events.capacity, 1024);
    }

    #[test]
    fn test_webhook_path_from_url() {
        let config = Config::parse(MINIMAL).unwrap();
        assert_eq!(config.webhook_path(), "/telegram/hook");
    }

    #[test]
    fn test_webhook_path_override() {
        let content = format!("{MINIMAL}\n[server]\nwebhook_path = \"updates\"\n");
        let config = Config::parse(&content).unwrap();
        assert_eq!(config.webhook_path(), "/updates");
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
[telegram]
bot_token = "123:abc"
webhook_url = "https://bot.example.com/hook"
api_url = "http://localhost:8081"
secret_token = "s3cret"
request_timeout_secs = 15

[server]
listen_addr = "127.0.0.1:9000"

[events]
capacity = 16
"#,
        )
        .unwrap();
        assert_eq!(config.telegram.api_url, "http://localhost:8081");
        assert_eq!(config.telegram.secret_token.as_deref(), Some("s3cret"));
        assert_eq!(
            config.telegram.request_timeout(),
            Some(Duration::from_secs(15))
        );
        assert_eq!(config.server.listen_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.events.capacity, 16);
    }

    #[test]
    fn test_rejects_invalid_webhook_url() {
        let err = Config::parse(
            r#"
[telegram]
bot_token = "123:abc"
webhook_url = "not a url"
"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("webhook_url"));
    }

    #[test]
    fn test_rejects_empty_token() {
        let err = Config::parse(
            r#"
[telegram]
bot_token = "  "
webhook_url = "https://bot.example.com/hook"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("bot_token"));
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let content = format!("{MINIMAL}\n[events]\ncapacity = 0\n");
        assert!(Config::parse(&content).is_err());
    }

    #[test]
    fn test_missing_telegram_section() {
        assert!(Config::parse("[server]\n").is_err());
    }
}
