//! Client configuration.
//!
//! Values come from `TIMECLOCK_*` environment variables with development
//! defaults, or from any serde source (missing fields fall back to the same
//! defaults).

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL every request path is joined to.
    pub api_url: String,
    /// Credential-issuance endpoint. Requests to this path never trigger a
    /// refresh themselves.
    pub refresh_path: String,
    pub login_path: String,
    /// Where the user is sent when the session cannot be renewed.
    pub unauthenticated_route: String,
    /// Persistence key of the bearer token.
    pub credential_key: String,
    /// JSON field carrying the token in login/refresh responses.
    pub token_field: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".to_string(),
            refresh_path: "/auth/refresh".to_string(),
            login_path: "/auth/login".to_string(),
            unauthenticated_route: "/".to_string(),
            credential_key: "access_token".to_string(),
            token_field: "token".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map here).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str, default: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        let config = Self {
            api_url: get("TIMECLOCK_API_URL", defaults.api_url),
            refresh_path: get("TIMECLOCK_REFRESH_PATH", defaults.refresh_path),
            login_path: get("TIMECLOCK_LOGIN_PATH", defaults.login_path),
            unauthenticated_route: get(
                "TIMECLOCK_UNAUTHENTICATED_ROUTE",
                defaults.unauthenticated_route,
            ),
            credential_key: get("TIMECLOCK_CREDENTIAL_KEY", defaults.credential_key),
            token_field: get("TIMECLOCK_TOKEN_FIELD", defaults.token_field),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "api_url must be an http(s) URL, got '{}'",
                self.api_url
            )));
        }
        for (name, path) in [
            ("refresh_path", &self.refresh_path),
            ("login_path", &self.login_path),
            ("unauthenticated_route", &self.unauthenticated_route),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "{name} must start with '/', got '{path}'"
                )));
            }
        }
        if self.credential_key.is_empty()
            || self
                .credential_key
                .contains(|c: char| c == '/' || c == '\\' || c == '.')
        {
            return Err(ConfigError::Invalid(format!(
                "credential_key must be a plain file-safe name, got '{}'",
                self.credential_key
            )));
        }
        if self.token_field.is_empty() {
            return Err(ConfigError::Invalid("token_field must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn env_values_override_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("TIMECLOCK_API_URL", "https://clock.example.com/api"),
            ("TIMECLOCK_REFRESH_PATH", "/session/renew"),
            ("TIMECLOCK_TOKEN_FIELD", " access_token "),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "https://clock.example.com/api");
        assert_eq!(config.refresh_path, "/session/renew");
        assert_eq!(config.token_field, "access_token");
        assert_eq!(config.login_path, "/auth/login");
    }

    #[test]
    fn blank_values_fall_back() {
        let config = ClientConfig::from_lookup(lookup(&[("TIMECLOCK_LOGIN_PATH", "  ")])).unwrap();
        assert_eq!(config.login_path, "/auth/login");
    }

    #[test]
    fn rejects_relative_paths_and_bad_urls() {
        assert!(ClientConfig::from_lookup(lookup(&[("TIMECLOCK_REFRESH_PATH", "auth/refresh")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[("TIMECLOCK_API_URL", "localhost:8080")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[("TIMECLOCK_CREDENTIAL_KEY", "../token")])).is_err());
    }

    #[test]
    fn deserializes_partial_documents() {
        let config: ClientConfig =
            serde_json::from_str(r#"{ "refresh_path": "/token/refresh" }"#).unwrap();
        assert_eq!(config.refresh_path, "/token/refresh");
        assert_eq!(config.api_url, "http://localhost:8080");
    }
}
