//! Identity provider adapter
//!
//! A thin seam over the hosted authentication and row storage service.
//! Handlers, the session gate and the entry repository only ever talk to
//! `Arc<dyn IdentityProvider>`, so the HTTP client and the in-memory
//! implementation are interchangeable.

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::warn;

use crate::{
    error::{ProviderError, ProviderResult},
    models::{DiaryEntry, EntryId, Session, User},
};

/// Authentication plus the `diary_entries` row operations
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange credentials for a session
    async fn sign_in(&self, email: &str, password: &str) -> ProviderResult<Session>;

    /// Register a new account; the provider mails a confirmation link
    /// pointing at `confirmation_redirect`
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        confirmation_redirect: &str,
    ) -> ProviderResult<()>;

    /// Revoke the session behind `access_token`
    async fn sign_out(&self, access_token: &str) -> ProviderResult<()>;

    /// Exchange a refresh token for a new session; `None` when the
    /// provider rejects the token
    async fn refresh_session(&self, refresh_token: &str) -> ProviderResult<Option<Session>>;

    /// Resolve the user behind `access_token`; `None` when the token is
    /// unknown or expired
    async fn get_current_user(&self, access_token: &str) -> ProviderResult<Option<User>>;

    /// Look up the entry for (session user, date); absence is `Ok(None)`
    async fn find(&self, session: &Session, date: NaiveDate) -> ProviderResult<Option<DiaryEntry>>;

    /// Dates for which the session user has an entry
    async fn list_dates(&self, session: &Session) -> ProviderResult<Vec<NaiveDate>>;

    /// Insert a new row for (session user, date)
    async fn insert(
        &self,
        session: &Session,
        date: NaiveDate,
        content: &str,
    ) -> ProviderResult<DiaryEntry>;

    /// Overwrite the content of the row `id`; `NotFound` if it is gone
    async fn update(
        &self,
        session: &Session,
        id: &EntryId,
        content: &str,
    ) -> ProviderResult<DiaryEntry>;

    /// Update the (user, date) row if present, insert it otherwise
    ///
    /// The read and the write are separate calls with no token between
    /// them: two concurrent saves for the same date race and the last
    /// write wins.
    async fn upsert(
        &self,
        session: &Session,
        date: NaiveDate,
        content: &str,
    ) -> ProviderResult<DiaryEntry> {
        match self.find(session, date).await? {
            Some(existing) => match self.update(session, &existing.id, content).await {
                Err(ProviderError::NotFound) => {
                    warn!(
                        "Entry {} vanished before update, inserting instead",
                        existing.id
                    );
                    self.insert(session, date, content).await
                }
                result => result,
            },
            None => self.insert(session, date, content).await,
        }
    }
}
