//! Custom error types for the common library
//!
//! Every call into the identity provider resolves to a [`ProviderResult`].
//! The error arm is tagged so callers can tell a deployment problem
//! (missing configuration) apart from a runtime one (the backend call
//! failed), and both apart from an absent row.

use thiserror::Error;

/// Error type for identity provider and row storage operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Required provider settings are absent; lists the missing variables
    #[error("Provider configuration missing: {}", .0.join(", "))]
    ConfigMissing(Vec<&'static str>),

    /// The addressed row does not exist
    #[error("Requested row was not found")]
    NotFound,

    /// The backend call failed (network, auth rejection, service error)
    #[error("Backend call failed: {0}")]
    Backend(String),
}

impl ProviderError {
    /// True when the failure is a setup problem rather than a runtime one
    pub fn is_config_missing(&self) -> bool {
        matches!(self, ProviderError::ConfigMissing(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Backend(err.to_string())
    }
}

/// Type alias for Result with ProviderError
pub type ProviderResult<T> = Result<T, ProviderError>;
