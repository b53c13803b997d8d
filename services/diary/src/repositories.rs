//! Entry repository
//!
//! At most one entry exists per (user, date). The repository enforces that
//! by always addressing rows through the composite key: lookups expect zero
//! or one row, saves go through the provider's lookup-then-branch upsert.

use std::{collections::BTreeSet, sync::Arc};

use chrono::NaiveDate;
use common::{DiaryEntry, IdentityProvider, ProviderResult, Session};
use tracing::info;

/// Diary entry repository
#[derive(Clone)]
pub struct EntryRepository {
    provider: Arc<dyn IdentityProvider>,
}

impl EntryRepository {
    /// Create a new entry repository
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    /// Entry for the given date, `None` when nothing was written that day
    pub async fn get_entry_for_date(
        &self,
        session: &Session,
        date: NaiveDate,
    ) -> ProviderResult<Option<DiaryEntry>> {
        self.provider.find(session, date).await
    }

    /// Every date that has an entry; used for calendar highlighting only
    pub async fn get_dates_with_entries(&self, session: &Session) -> ProviderResult<BTreeSet<NaiveDate>> {
        let dates = self.provider.list_dates(session).await?;
        Ok(dates.into_iter().collect())
    }

    /// Update the entry for the date if it exists, create it otherwise
    ///
    /// Last write wins: there is no conflict detection between devices.
    pub async fn save_entry(
        &self,
        session: &Session,
        date: NaiveDate,
        content: &str,
    ) -> ProviderResult<DiaryEntry> {
        info!("Saving diary entry for user {} on {}", session.user_id(), date);
        self.provider.upsert(session, date, content).await
    }
}
