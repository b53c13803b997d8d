//! Diary view state
//!
//! One calendar date at a time, in one of three states:
//!
//! ```text
//! Loading --load--> Viewing --begin_edit--> Editing
//!    ^                 ^                       |
//!    |                 +---save ok / cancel----+
//!    +--select_date-- (any)
//! ```
//!
//! Nothing is retried. A failed load lands in `Viewing` with no entry and
//! an error notice, and the editor stays closed until the date loads: an
//! empty draft over an entry that could not be read would overwrite it.
//! A failed save stays in `Editing` with the draft kept.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use common::{DiaryEntry, Session};
use serde::Serialize;
use tracing::{error, warn};

use crate::repositories::EntryRepository;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
}

/// Transient, dismissible notification shown above the page
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn success(title: &str, message: &str) -> Self {
        Self {
            kind: NoticeKind::Success,
            title: title.to_string(),
            message: message.to_string(),
        }
    }

    pub fn error(title: &str, message: &str) -> Self {
        Self {
            kind: NoticeKind::Error,
            title: title.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    Loading,
    Viewing {
        entry: Option<DiaryEntry>,
    },
    Editing {
        entry: Option<DiaryEntry>,
        draft: String,
    },
}

/// Read/write view over a single date
#[derive(Debug, Clone)]
pub struct DiaryView {
    date: NaiveDate,
    state: ViewState,
    dates_with_entries: BTreeSet<NaiveDate>,
    notice: Option<Notice>,
    load_failed: bool,
}

impl DiaryView {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            state: ViewState::Loading,
            dates_with_entries: BTreeSet::new(),
            notice: None,
            load_failed: false,
        }
    }

    /// Editor for a submitted draft; the current entry is not fetched
    pub fn editor(date: NaiveDate) -> Self {
        Self {
            state: ViewState::Editing {
                entry: None,
                draft: String::new(),
            },
            ..Self::new(date)
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn dates_with_entries(&self) -> &BTreeSet<NaiveDate> {
        &self.dates_with_entries
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn notify(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }

    /// Move to another date; the view has to be loaded again
    pub fn select_date(&mut self, date: NaiveDate) {
        self.date = date;
        self.state = ViewState::Loading;
        self.load_failed = false;
    }

    /// Fetch the entry and the highlighted dates, then show the entry
    pub async fn load(&mut self, entries: &EntryRepository, session: &Session) {
        if self.state != ViewState::Loading {
            return;
        }

        let entry = match entries.get_entry_for_date(session, self.date).await {
            Ok(entry) => entry,
            Err(e) => {
                error!("Error fetching entry for {}: {}", self.date, e);
                self.notice = Some(Notice::error("Error", "Failed to load diary entry"));
                self.load_failed = true;
                None
            }
        };

        match entries.get_dates_with_entries(session).await {
            Ok(dates) => self.dates_with_entries = dates,
            Err(e) => warn!("Error fetching dates with entries: {}", e),
        }

        self.state = ViewState::Viewing { entry };
    }

    /// Open the editor on the current entry, or on a blank page
    pub fn begin_edit(&mut self) -> bool {
        if self.load_failed {
            return false;
        }

        match std::mem::replace(&mut self.state, ViewState::Loading) {
            ViewState::Viewing { entry } => {
                let draft = entry
                    .as_ref()
                    .map(|entry| entry.content.clone())
                    .unwrap_or_default();
                self.state = ViewState::Editing { entry, draft };
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }

    /// Close the editor and drop the draft
    pub fn cancel_edit(&mut self) -> bool {
        match std::mem::replace(&mut self.state, ViewState::Loading) {
            ViewState::Editing { entry, .. } => {
                self.state = ViewState::Viewing { entry };
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }

    /// Persist `content` for the current date
    pub async fn save(
        &mut self,
        entries: &EntryRepository,
        session: &Session,
        content: String,
    ) -> bool {
        if !matches!(self.state, ViewState::Editing { .. }) {
            return false;
        }

        match entries.save_entry(session, self.date, &content).await {
            Ok(saved) => {
                self.dates_with_entries.insert(saved.date);
                self.state = ViewState::Viewing { entry: Some(saved) };
                self.notice = Some(Notice::success("Success", "Diary entry saved"));
                true
            }
            Err(e) => {
                error!("Error saving entry for {}: {}", self.date, e);
                if let ViewState::Editing { draft, .. } = &mut self.state {
                    *draft = content;
                }
                self.notice = Some(Notice::error("Error", "Failed to save diary entry"));
                false
            }
        }
    }
}
