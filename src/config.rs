use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::analysis::AnalysisSettings;
use crate::cache::MAX_CACHED_COMMENTS;
use crate::collectors::youtube::OAuthCredentials;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_path: PathBuf,

    // Web Server
    pub web_host: String,
    pub web_port: u16,

    // Outbound HTTP
    pub http_timeout: Duration,

    // Platforms
    pub instagram_api_base: String,
    pub youtube_api_base: String,
    pub youtube_token_url: String,
    pub youtube_client_id: Option<String>,
    pub youtube_client_secret: Option<String>,

    // Classifier / summarizer service
    pub insights_api_url: String,
    pub insights_api_key: Option<String>,

    // Analysis
    pub max_analyzed_comments: usize,
    pub classify_chunk_size: usize,
    pub content_lookback_days: u32,
    pub content_record_limit: u32,

    // Sessions
    pub session_cleanup_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_path: PathBuf::from(env_or_default("DATABASE_PATH", "./data/insights.db")),

            web_host: env_or_default("WEB_HOST", "0.0.0.0"),
            web_port: parse_env_u16("WEB_PORT", 8080)?,

            http_timeout: Duration::from_secs(parse_env_u64("HTTP_TIMEOUT_SECS", 20)?),

            instagram_api_base: env_or_default(
                "INSTAGRAM_API_BASE",
                "https://graph.facebook.com/v19.0",
            ),
            youtube_api_base: env_or_default(
                "YOUTUBE_API_BASE",
                "https://www.googleapis.com/youtube/v3",
            ),
            youtube_token_url: env_or_default(
                "YOUTUBE_TOKEN_URL",
                "https://oauth2.googleapis.com/token",
            ),
            youtube_client_id: optional_env("YOUTUBE_CLIENT_ID"),
            youtube_client_secret: optional_env("YOUTUBE_CLIENT_SECRET"),

            insights_api_url: required_env("INSIGHTS_API_URL")?,
            insights_api_key: optional_env("INSIGHTS_API_KEY"),

            max_analyzed_comments: parse_env_usize("MAX_ANALYZED_COMMENTS", MAX_CACHED_COMMENTS)?,
            classify_chunk_size: parse_env_usize("CLASSIFY_CHUNK_SIZE", 50)?,
            content_lookback_days: parse_env_u32("CONTENT_LOOKBACK_DAYS", 30)?,
            content_record_limit: parse_env_u32("CONTENT_RECORD_LIMIT", 50)?,

            session_cleanup_interval: Duration::from_secs(parse_env_u64(
                "SESSION_CLEANUP_INTERVAL_SECS",
                3600,
            )?),
        })
    }

    /// Defaults suitable for tests: in-memory paths and local endpoints.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            database_path: PathBuf::from(":memory:"),
            web_host: "127.0.0.1".to_string(),
            web_port: 0,
            http_timeout: Duration::from_secs(5),
            instagram_api_base: "http://127.0.0.1:9/instagram".to_string(),
            youtube_api_base: "http://127.0.0.1:9/youtube".to_string(),
            youtube_token_url: "http://127.0.0.1:9/token".to_string(),
            youtube_client_id: None,
            youtube_client_secret: None,
            insights_api_url: "http://127.0.0.1:9/insights".to_string(),
            insights_api_key: None,
            max_analyzed_comments: MAX_CACHED_COMMENTS,
            classify_chunk_size: 50,
            content_lookback_days: 30,
            content_record_limit: 50,
            session_cleanup_interval: Duration::from_secs(3600),
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_analyzed_comments == 0 || self.max_analyzed_comments > MAX_CACHED_COMMENTS {
            return Err(ConfigError::InvalidValue {
                name: "MAX_ANALYZED_COMMENTS".to_string(),
                message: format!("must be between 1 and {MAX_CACHED_COMMENTS}"),
            });
        }
        if self.classify_chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "CLASSIFY_CHUNK_SIZE".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.http_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "HTTP_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        for (name, value) in [
            ("INSIGHTS_API_URL", &self.insights_api_url),
            ("INSTAGRAM_API_BASE", &self.instagram_api_base),
            ("YOUTUBE_API_BASE", &self.youtube_api_base),
            ("YOUTUBE_TOKEN_URL", &self.youtube_token_url),
        ] {
            url::Url::parse(value).map_err(|e| ConfigError::InvalidValue {
                name: name.to_string(),
                message: e.to_string(),
            })?;
        }
        if self.youtube_client_id.is_some() != self.youtube_client_secret.is_some() {
            return Err(ConfigError::InvalidValue {
                name: "YOUTUBE_CLIENT_ID".to_string(),
                message: "YOUTUBE_CLIENT_ID and YOUTUBE_CLIENT_SECRET must be set together"
                    .to_string(),
            });
        }
        Ok(())
    }

    /// OAuth client for YouTube token refresh, when configured.
    #[must_use]
    pub fn youtube_oauth(&self) -> Option<OAuthCredentials> {
        match (&self.youtube_client_id, &self.youtube_client_secret) {
            (Some(client_id), Some(client_secret)) => Some(OAuthCredentials {
                token_url: self.youtube_token_url.clone(),
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
            }),
            _ => None,
        }
    }

    #[must_use]
    pub fn analysis_settings(&self) -> AnalysisSettings {
        AnalysisSettings {
            max_comments: self.max_analyzed_comments,
            content_lookback: chrono::Duration::days(i64::from(self.content_lookback_days)),
            content_limit: i64::from(self.content_record_limit),
        }
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_testing_config_is_valid() {
        Config::for_testing().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_oversized_cap() {
        let mut config = Config::for_testing();
        config.max_analyzed_comments = 151;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { name, .. }) if name == "MAX_ANALYZED_COMMENTS"
        ));
    }

    #[test]
    fn test_validate_requires_oauth_pair() {
        let mut config = Config::for_testing();
        config.youtube_client_id = Some("id".to_string());
        assert!(config.validate().is_err());
        assert!(config.youtube_oauth().is_none());

        config.youtube_client_secret = Some("secret".to_string());
        config.validate().unwrap();
        let oauth = config.youtube_oauth().unwrap();
        assert_eq!(oauth.token_url, "http://127.0.0.1:9/token");
    }

    #[test]
    fn test_analysis_settings() {
        let settings = Config::for_testing().analysis_settings();
        assert_eq!(settings.max_comments, 150);
        assert_eq!(settings.content_lookback, chrono::Duration::days(30));
        assert_eq!(settings.content_limit, 50);
    }

    #[test]
    #[serial]
    fn test_from_env_requires_insights_url() {
        std::env::remove_var("INSIGHTS_API_URL");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::MissingEnvVar(name)) if name == "INSIGHTS_API_URL"
        ));
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        std::env::set_var("INSIGHTS_API_URL", "http://insights.local");
        std::env::set_var("CLASSIFY_CHUNK_SIZE", "25");
        let config = Config::from_env().unwrap();
        std::env::remove_var("INSIGHTS_API_URL");
        std::env::remove_var("CLASSIFY_CHUNK_SIZE");

        assert_eq!(config.classify_chunk_size, 25);
        assert_eq!(config.http_timeout, Duration::from_secs(20));
        assert_eq!(config.youtube_token_url, "https://oauth2.googleapis.com/token");
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_bad_integer() {
        std::env::set_var("INSIGHTS_API_URL", "http://insights.local");
        std::env::set_var("WEB_PORT", "eighty");
        let result = Config::from_env();
        std::env::remove_var("INSIGHTS_API_URL");
        std::env::remove_var("WEB_PORT");

        assert!(matches!(result, Err(ConfigError::ParseInt { name, .. }) if name == "WEB_PORT"));
    }
}
