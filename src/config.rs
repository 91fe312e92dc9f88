use crate::users::UserRegistry;

use std::path::PathBuf;
use time::Duration;

#[derive(Clone)]
pub struct AppConfig {
    pub app_name: String,
    /// Path of the mutable settings file (API key, enabled lists, cache).
    pub settings_path: PathBuf,
    /// Base URL of the remote list-management service.
    pub service_url: String,
    pub users: UserRegistry,
    pub auth: AuthConfig,
}

#[derive(Clone)]
pub struct AuthConfig {
    /// Base64-encoded HS256 signing key for session and form tokens.
    pub key: String,
    pub token_ttl: Duration,
    pub cookie_name: String,
    pub cookie_secure: bool,
}

#[cfg(test)]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "Listhub".to_string(),
            settings_path: std::env::temp_dir().join("listhub-settings-default.toml"),
            service_url: "http://127.0.0.1:9".to_string(),
            users: UserRegistry::default(),
            auth: AuthConfig::default(),
        }
    }
}

#[cfg(test)]
impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            // "test-secret", URL-safe alphabet without padding
            key: "dGVzdC1zZWNyZXQ".to_string(),
            token_ttl: Duration::days(1),
            cookie_name: "listhub_auth".to_string(),
            cookie_secure: false,
        }
    }
}
