//! In-process identity provider
//!
//! Keeps accounts, issued tokens and diary rows in memory. Used by the
//! service tests in place of the hosted backend; [`InMemoryProvider::set_failing`]
//! turns every call into a backend failure so error paths can be driven.
//! Only built with the `test-util` feature.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicI64, Ordering},
    },
};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{ProviderError, ProviderResult},
    models::{DiaryEntry, EntryId, Session, User},
    provider::IdentityProvider,
};

#[derive(Debug)]
struct Account {
    user: User,
    password: String,
}

#[derive(Debug, Default)]
struct Store {
    accounts: HashMap<String, Account>,
    tokens: HashMap<String, Uuid>,
    refresh_tokens: HashMap<String, Uuid>,
    entries: Vec<DiaryEntry>,
}

/// Identity provider backed by in-process maps
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    store: Arc<Mutex<Store>>,
    next_id: Arc<AtomicI64>,
    failing: Arc<AtomicBool>,
    fail_next_find: Arc<AtomicBool>,
}

impl InMemoryProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a backend error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make only the next `find` fail with a backend error
    pub fn fail_next_find(&self) {
        self.fail_next_find.store(true, Ordering::SeqCst);
    }

    /// Expire an access token while keeping its refresh token usable
    pub async fn expire_access_token(&self, access_token: &str) {
        self.store.lock().await.tokens.remove(access_token);
    }

    /// Register a confirmed account and return a live session for it
    pub async fn register(&self, email: &str, password: &str) -> Session {
        let user = User {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
        };
        let mut store = self.store.lock().await;
        store.accounts.insert(
            email.to_string(),
            Account {
                user: user.clone(),
                password: password.to_string(),
            },
        );
        Self::issue(&mut store, user)
    }

    /// Number of stored rows for a user
    pub async fn entry_count(&self, user_id: Uuid) -> usize {
        let store = self.store.lock().await;
        store
            .entries
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .count()
    }

    fn issue(store: &mut Store, user: User) -> Session {
        let access_token = Uuid::new_v4().to_string();
        let refresh_token = Uuid::new_v4().to_string();
        store.tokens.insert(access_token.clone(), user.id);
        store.refresh_tokens.insert(refresh_token.clone(), user.id);
        Session {
            access_token,
            refresh_token: Some(refresh_token),
            user,
        }
    }

    fn check_available(&self) -> ProviderResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Backend(
                "in-memory provider set to fail".to_string(),
            ));
        }
        Ok(())
    }

    /// Reject sessions whose token was never issued or has been revoked
    fn authorize(store: &Store, session: &Session) -> ProviderResult<()> {
        match store.tokens.get(&session.access_token) {
            Some(user_id) if *user_id == session.user_id() => Ok(()),
            _ => Err(ProviderError::Backend("invalid JWT".to_string())),
        }
    }
}

#[async_trait]
impl IdentityProvider for InMemoryProvider {
    async fn sign_in(&self, email: &str, password: &str) -> ProviderResult<Session> {
        self.check_available()?;
        let mut store = self.store.lock().await;

        let user = match store.accounts.get(email) {
            Some(account) if account.password == password => account.user.clone(),
            _ => {
                return Err(ProviderError::Backend(
                    "Invalid login credentials".to_string(),
                ));
            }
        };

        info!("Issued in-memory session for {}", email);
        Ok(Self::issue(&mut store, user))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        _confirmation_redirect: &str,
    ) -> ProviderResult<()> {
        self.check_available()?;
        let mut store = self.store.lock().await;

        if store.accounts.contains_key(email) {
            return Err(ProviderError::Backend(
                "User already registered".to_string(),
            ));
        }

        store.accounts.insert(
            email.to_string(),
            Account {
                user: User {
                    id: Uuid::new_v4(),
                    email: Some(email.to_string()),
                },
                password: password.to_string(),
            },
        );
        Ok(())
    }

    async fn sign_out(&self, access_token: &str) -> ProviderResult<()> {
        self.check_available()?;
        let mut store = self.store.lock().await;
        if let Some(user_id) = store.tokens.remove(access_token) {
            store.refresh_tokens.retain(|_, owner| *owner != user_id);
        }
        Ok(())
    }

    async fn refresh_session(&self, refresh_token: &str) -> ProviderResult<Option<Session>> {
        self.check_available()?;
        let mut store = self.store.lock().await;

        // Refresh tokens are single use
        let Some(user_id) = store.refresh_tokens.remove(refresh_token) else {
            return Ok(None);
        };
        let user = store
            .accounts
            .values()
            .find(|account| account.user.id == user_id)
            .map(|account| account.user.clone());

        Ok(user.map(|user| Self::issue(&mut store, user)))
    }

    async fn get_current_user(&self, access_token: &str) -> ProviderResult<Option<User>> {
        self.check_available()?;
        let store = self.store.lock().await;

        let user = store.tokens.get(access_token).and_then(|user_id| {
            store
                .accounts
                .values()
                .find(|account| account.user.id == *user_id)
                .map(|account| account.user.clone())
        });
        Ok(user)
    }

    async fn find(&self, session: &Session, date: NaiveDate) -> ProviderResult<Option<DiaryEntry>> {
        self.check_available()?;
        if self.fail_next_find.swap(false, Ordering::SeqCst) {
            return Err(ProviderError::Backend("find failed".to_string()));
        }
        let store = self.store.lock().await;
        Self::authorize(&store, session)?;

        Ok(store
            .entries
            .iter()
            .find(|entry| entry.user_id == session.user_id() && entry.date == date)
            .cloned())
    }

    async fn list_dates(&self, session: &Session) -> ProviderResult<Vec<NaiveDate>> {
        self.check_available()?;
        let store = self.store.lock().await;
        Self::authorize(&store, session)?;

        Ok(store
            .entries
            .iter()
            .filter(|entry| entry.user_id == session.user_id())
            .map(|entry| entry.date)
            .collect())
    }

    async fn insert(
        &self,
        session: &Session,
        date: NaiveDate,
        content: &str,
    ) -> ProviderResult<DiaryEntry> {
        self.check_available()?;
        let mut store = self.store.lock().await;
        Self::authorize(&store, session)?;

        let entry = DiaryEntry {
            id: EntryId::Int(self.next_id.fetch_add(1, Ordering::SeqCst) + 1),
            user_id: session.user_id(),
            date,
            content: content.to_string(),
        };
        store.entries.push(entry.clone());
        Ok(entry)
    }

    async fn update(
        &self,
        session: &Session,
        id: &EntryId,
        content: &str,
    ) -> ProviderResult<DiaryEntry> {
        self.check_available()?;
        let mut store = self.store.lock().await;
        Self::authorize(&store, session)?;

        let entry = store
            .entries
            .iter_mut()
            .find(|entry| entry.id == *id && entry.user_id == session.user_id())
            .ok_or(ProviderError::NotFound)?;
        entry.content = content.to_string();
        Ok(entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[tokio::test]
    async fn sign_in_checks_password() {
        let provider = InMemoryProvider::new();
        provider.register("a@example.com", "secret1").await;

        assert!(provider.sign_in("a@example.com", "secret1").await.is_ok());
        let err = provider.sign_in("a@example.com", "nope").await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::Backend("Invalid login credentials".to_string())
        );
    }

    #[tokio::test]
    async fn sign_out_revokes_token() {
        let provider = InMemoryProvider::new();
        let session = provider.register("a@example.com", "secret1").await;

        assert!(
            provider
                .get_current_user(&session.access_token)
                .await
                .unwrap()
                .is_some()
        );
        provider.sign_out(&session.access_token).await.unwrap();
        assert_eq!(
            provider.get_current_user(&session.access_token).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn refresh_rotates_token_pair() {
        let provider = InMemoryProvider::new();
        let session = provider.register("a@example.com", "secret1").await;
        let refresh_token = session.refresh_token.clone().unwrap();
        provider.expire_access_token(&session.access_token).await;

        let renewed = provider.refresh_session(&refresh_token).await.unwrap().unwrap();
        assert_eq!(renewed.user, session.user);
        assert!(
            provider
                .get_current_user(&renewed.access_token)
                .await
                .unwrap()
                .is_some()
        );

        // The old refresh token was consumed
        assert_eq!(provider.refresh_session(&refresh_token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn sign_out_drops_refresh_tokens() {
        let provider = InMemoryProvider::new();
        let session = provider.register("a@example.com", "secret1").await;
        provider.sign_out(&session.access_token).await.unwrap();

        let refresh_token = session.refresh_token.unwrap();
        assert_eq!(provider.refresh_session(&refresh_token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn failing_next_find_fails_once() {
        let provider = InMemoryProvider::new();
        let session = provider.register("a@example.com", "secret1").await;
        provider.fail_next_find();

        assert!(provider.find(&session, day(1)).await.is_err());
        assert!(provider.find(&session, day(1)).await.is_ok());
    }

    #[tokio::test]
    async fn entries_are_scoped_to_their_owner() {
        let provider = InMemoryProvider::new();
        let alice = provider.register("alice@example.com", "secret1").await;
        let bob = provider.register("bob@example.com", "secret1").await;

        provider.upsert(&alice, day(1), "alice's day").await.unwrap();

        assert!(provider.find(&bob, day(1)).await.unwrap().is_none());
        assert!(provider.list_dates(&bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn revoked_session_cannot_read_rows() {
        let provider = InMemoryProvider::new();
        let session = provider.register("a@example.com", "secret1").await;
        provider.sign_out(&session.access_token).await.unwrap();

        let err = provider.find(&session, day(1)).await.unwrap_err();
        assert!(matches!(err, ProviderError::Backend(_)));
    }

    #[tokio::test]
    async fn failing_switch_fails_every_call() {
        let provider = InMemoryProvider::new();
        let session = provider.register("a@example.com", "secret1").await;
        provider.set_failing(true);

        assert!(provider.get_current_user(&session.access_token).await.is_err());
        assert!(provider.find(&session, day(1)).await.is_err());

        provider.set_failing(false);
        assert!(provider.find(&session, day(1)).await.is_ok());
    }
}
