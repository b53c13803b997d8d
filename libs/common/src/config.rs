//! Identity provider configuration
//!
//! The provider is reached through two settings: the service URL and the
//! public API key. Both are validated once, before any network call is
//! attempted, so a missing value surfaces as
//! [`ProviderError::ConfigMissing`] rather than an unrelated HTTP failure.

use std::env;

use crate::error::{ProviderError, ProviderResult};

/// Environment variable holding the provider base URL
pub const SUPABASE_URL_VAR: &str = "SUPABASE_URL";
/// Environment variable holding the provider public API key
pub const SUPABASE_ANON_KEY_VAR: &str = "SUPABASE_ANON_KEY";

/// Validated provider configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    /// Base URL of the hosted service, without a trailing slash
    pub url: String,
    /// Public API key sent with every request
    pub anon_key: String,
}

impl SupabaseConfig {
    /// Create a new SupabaseConfig from environment variables
    ///
    /// # Environment Variables
    /// - `SUPABASE_URL`: base URL of the hosted service
    /// - `SUPABASE_ANON_KEY`: public API key
    pub fn from_env() -> ProviderResult<Self> {
        Self::from_values(
            env::var(SUPABASE_URL_VAR).ok(),
            env::var(SUPABASE_ANON_KEY_VAR).ok(),
        )
    }

    /// Validate raw values; blank values count as absent
    pub fn from_values(url: Option<String>, anon_key: Option<String>) -> ProviderResult<Self> {
        let url = url.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let anon_key = anon_key
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        match (url, anon_key) {
            (Some(url), Some(anon_key)) => Ok(Self {
                url: url.trim_end_matches('/').to_string(),
                anon_key,
            }),
            (url, anon_key) => {
                let mut missing = Vec::new();
                if url.is_none() {
                    missing.push(SUPABASE_URL_VAR);
                }
                if anon_key.is_none() {
                    missing.push(SUPABASE_ANON_KEY_VAR);
                }
                Err(ProviderError::ConfigMissing(missing))
            }
        }
    }
}
