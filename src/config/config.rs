use serde::Deserialize;

use crate::chat::services::ServiceEntry;

/// Production API used when nothing else is configured.
pub const DEFAULT_API_URL: &str = "https://api.sitedesk.io/api";

/// Per-request timeout used when `api.timeout_secs` is not configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Environment variable that overrides `api.base_url`.
pub const API_URL_ENV: &str = "SITEDESK_API_URL";

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub token_file: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
    /// Local store for chat messages the CLI could not deliver.
    pub outbox_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default)]
    pub api_keys: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    pub page_url: Option<String>,
    pub services: Option<Vec<ServiceEntry>>,
    pub retry: RetryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub chat: ChatConfig,
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();

        let settings = config::Config::builder()
            .set_default("api.base_url", DEFAULT_API_URL)?
            .set_default("api.timeout_secs", DEFAULT_TIMEOUT_SECS)?
            .set_default("api.token_file", ".sitedesk/token")?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.path", "sitedesk.duckdb")?
            .set_default("database.outbox_path", "sitedesk-outbox.duckdb")?
            .set_default("auth.api_keys", Vec::<String>::new())?
            .set_default("chat.retry.max_attempts", 4)?
            .set_default("chat.retry.initial_backoff_ms", 500)?
            .set_default("chat.retry.max_backoff_ms", 8000)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("SITEDESK").separator("__"))
            .set_override_option("api.base_url", std::env::var(API_URL_ENV).ok())?
            .build()?;

        let mut app_config: AppConfig = settings.try_deserialize()?;

        // Expand environment variables if present like ${SITEDESK_ADMIN_KEY}
        app_config.api.base_url = expand_env(&app_config.api.base_url);
        app_config.database.path = expand_env(&app_config.database.path);
        app_config.database.outbox_path = expand_env(&app_config.database.outbox_path);
        app_config.auth.api_keys = app_config
            .auth
            .api_keys
            .iter()
            .map(|key| expand_env(key))
            .filter(|key| !key.is_empty())
            .collect();

        if app_config.api.base_url.trim().is_empty() {
            app_config.api.base_url = DEFAULT_API_URL.to_string();
        }

        Ok(app_config)
    }
}

fn expand_env(val: &str) -> String {
    if val.starts_with("${") && val.ends_with('}') {
        let var_name = &val[2..val.len() - 1];
        std::env::var(var_name).unwrap_or_default()
    } else {
        val.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = AppConfig::load("does-not-exist-sitedesk").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.api.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.chat.retry.max_attempts, 4);
        assert!(config.chat.services.is_none());
        assert!(!config.api.base_url.is_empty());
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "server:\n  port: 9191\ndatabase:\n  path: \":memory:\"\nauth:\n  api_keys: [\"k1\", \"\"]\nchat:\n  page_url: /pricing\n  retry:\n    max_attempts: 2"
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = AppConfig::load(&path).unwrap();

        assert_eq!(config.server.port, 9191);
        assert_eq!(config.database.path, ":memory:");
        assert_eq!(config.auth.api_keys, vec!["k1".to_string()]);
        assert_eq!(config.chat.page_url.as_deref(), Some("/pricing"));
        assert_eq!(config.chat.retry.max_attempts, 2);
        assert_eq!(config.chat.retry.initial_backoff_ms, 500);
    }

    #[test]
    fn expands_braced_variables_only() {
        std::env::set_var("SITEDESK_TEST_EXPAND", "value");
        assert_eq!(expand_env("${SITEDESK_TEST_EXPAND}"), "value");
        assert_eq!(expand_env("${SITEDESK_TEST_UNSET_VAR}"), "");
        assert_eq!(expand_env("plain"), "plain");
    }
}
