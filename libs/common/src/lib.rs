//! Common library for the diary application
//!
//! This crate holds the identity provider adapter shared by the diary
//! service: configuration, the tagged provider error, the data model,
//! the `IdentityProvider` trait and its HTTP implementation. The
//! `test-util` feature adds an in-memory implementation for tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use common::{IdentityProvider, SupabaseClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SupabaseClient::from_env()?;
//!     let session = client.sign_in("me@example.com", "secret").await?;
//!     let today = chrono::Local::now().date_naive();
//!     let entry = client.find(&session, today).await?;
//!     println!("Entry for today: {:?}", entry.map(|e| e.content));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod models;
pub mod provider;
pub mod supabase;

pub use config::SupabaseConfig;
pub use error::{ProviderError, ProviderResult};
#[cfg(any(test, feature = "test-util"))]
pub use memory::InMemoryProvider;
pub use models::{DiaryEntry, EntryId, Session, User};
pub use provider::IdentityProvider;
pub use supabase::SupabaseClient;
