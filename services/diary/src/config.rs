//! Server configuration

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Listener and public URL settings for the diary service
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Public origin of the service, used in confirmation links
    pub site_url: String,
    /// Mark session cookies `Secure`
    pub secure_cookies: bool,
}

impl ServerConfig {
    /// Load from `DIARY_*` environment variables
    ///
    /// # Environment Variables
    /// - `DIARY_HOST` (default: "0.0.0.0")
    /// - `DIARY_PORT` (default: 3000)
    /// - `DIARY_SITE_URL` (default: "http://localhost:3000")
    /// - `DIARY_SECURE_COOKIES` (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 3000_i64)?
            .set_default("site_url", "http://localhost:3000")?
            .set_default("secure_cookies", false)?
            .add_source(Environment::with_prefix("DIARY").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Where the sign-up confirmation mail sends the user back to
    pub fn confirmation_redirect(&self) -> String {
        format!("{}/login", self.site_url.trim_end_matches('/'))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            site_url: "http://localhost:3000".to_string(),
            secure_cookies: false,
        }
    }
}
