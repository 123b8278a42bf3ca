//! Runtime configuration.
//!
//! Defaults are safe for a fresh checkout: simulation mode on, local SQLite
//! file, no external integrations. Environment variables override fields
//! one by one; an unparseable value logs a warning and keeps the default.

use std::time::Duration;
use tracing::warn;

use crate::application::queue::QueueConfig;
use crate::domain::services::trade_executor::ExecutorConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bind address for the control API
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Suppress real order placement
    pub simulation_mode: bool,
    pub default_position_size: f64,
    pub default_leverage: f64,
    /// Minimum confidence for execution, 0.0 to 1.0
    pub confidence_threshold: f64,
    pub gemini_api_key: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub http_requests_per_minute: u32,
    pub queue: QueueConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: "sqlite://data/tradewire.db".to_string(),
            simulation_mode: true,
            default_position_size: 100.0,
            default_leverage: 1.0,
            confidence_threshold: 0.7,
            gemini_api_key: None,
            telegram_bot_token: None,
            telegram_chat_id: None,
            http_requests_per_minute: 100,
            queue: QueueConfig::default(),
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, current: T) -> T
where
    T: std::fmt::Display,
    T::Err: std::fmt::Display,
{
    let Some(raw) = env_string(name) else {
        return current;
    };
    match raw.parse::<T>() {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to parse {} '{}': {}, using default: {}", name, raw, e, current);
            current
        }
    }
}

impl AppConfig {
    /// Load configuration from the environment, after `.env` if present.
    pub fn from_env() -> AppConfig {
        dotenvy::dotenv().ok();

        let mut config = AppConfig::default();

        if let Some(host) = env_string("HOST") {
            config.host = host;
        }
        config.port = env_parse("PORT", config.port);
        if let Some(url) = env_string("DATABASE_URL") {
            config.database_url = url;
        }
        config.simulation_mode = env_parse("SIMULATION_MODE", config.simulation_mode);
        config.default_position_size =
            env_parse("DEFAULT_POSITION_SIZE", config.default_position_size);
        if config.default_position_size <= 0.0 {
            warn!("DEFAULT_POSITION_SIZE must be positive, using 100");
            config.default_position_size = 100.0;
        }
        config.default_leverage = env_parse("DEFAULT_LEVERAGE", config.default_leverage);

        let threshold = env_parse("CONFIDENCE_THRESHOLD", config.confidence_threshold);
        if (0.0..=1.0).contains(&threshold) {
            config.confidence_threshold = threshold;
        } else {
            warn!(
                "CONFIDENCE_THRESHOLD {} outside 0.0..=1.0, using default: {}",
                threshold, config.confidence_threshold
            );
        }

        config.gemini_api_key = env_string("GEMINI_API_KEY");
        config.telegram_bot_token = env_string("TELEGRAM_BOT_TOKEN");
        config.telegram_chat_id = env_string("TELEGRAM_CHAT_ID");
        config.http_requests_per_minute =
            env_parse("HTTP_REQUESTS_PER_MINUTE", config.http_requests_per_minute);

        config.queue.max_attempts = env_parse("QUEUE_MAX_ATTEMPTS", config.queue.max_attempts);
        config.queue.backoff_base = Duration::from_millis(env_parse(
            "QUEUE_BACKOFF_MS",
            config.queue.backoff_base.as_millis() as u64,
        ));
        config.queue.rate_limit_jobs =
            env_parse("QUEUE_RATE_LIMIT_JOBS", config.queue.rate_limit_jobs);
        config.queue.rate_limit_window = Duration::from_secs(env_parse(
            "QUEUE_RATE_LIMIT_WINDOW_SECS",
            config.queue.rate_limit_window.as_secs(),
        ));

        config
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            simulation_mode: self.simulation_mode,
            default_position_size: self.default_position_size,
            default_leverage: self.default_leverage,
            confidence_threshold: self.confidence_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_simulation_safe() {
        let config = AppConfig::default();
        assert!(config.simulation_mode);
        assert_eq!(config.confidence_threshold, 0.7);
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
        assert_eq!(config.queue.max_attempts, 3);
    }

    #[test]
    fn test_executor_config_mirrors_app_config() {
        let config = AppConfig {
            simulation_mode: false,
            default_position_size: 250.0,
            ..AppConfig::default()
        };
        let executor = config.executor_config();
        assert!(!executor.simulation_mode);
        assert_eq!(executor.default_position_size, 250.0);
        assert_eq!(executor.confidence_threshold, 0.7);
    }
}
