//! Application state shared across handlers

use std::sync::Arc;

use common::{IdentityProvider, ProviderError, ProviderResult};
use handlebars::TemplateError;

use crate::{config::ServerConfig, pages::Pages, repositories::EntryRepository};

/// Provider wiring, decided once at start-up
#[derive(Clone)]
pub enum Backend {
    Ready {
        provider: Arc<dyn IdentityProvider>,
        entries: EntryRepository,
    },
    /// Configuration was missing or the client could not be built
    Unconfigured(ProviderError),
}

impl Backend {
    pub fn from_provider(provider: Arc<dyn IdentityProvider>) -> Self {
        let entries = EntryRepository::new(provider.clone());
        Backend::Ready { provider, entries }
    }

    pub fn provider(&self) -> ProviderResult<&Arc<dyn IdentityProvider>> {
        match self {
            Backend::Ready { provider, .. } => Ok(provider),
            Backend::Unconfigured(err) => Err(err.clone()),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub backend: Backend,
    pub pages: Pages,
    pub server: ServerConfig,
}

impl AppState {
    pub fn new(backend: Backend, server: ServerConfig) -> Result<Self, TemplateError> {
        Ok(Self {
            backend,
            pages: Pages::new()?,
            server,
        })
    }
}
