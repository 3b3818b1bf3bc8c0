//! SessionStore trait definition.
//!
//! Capability port for the persistent session store. Implementations live
//! in parley-infra (e.g., `SqliteSessionStore`). Uses native async fn in
//! traits (RPITIT, Rust 2024 edition).
//!
//! The store never retries internally: history replacement is not
//! idempotent (replaying a stale update could overwrite newer data), so
//! retry decisions belong to the caller. Failures are classified as
//! transient or permanent via `StoreError`.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use parley_types::content::Message;
use parley_types::error::StoreError;
use parley_types::session::SessionRecord;

/// Partial update applied to an existing session record.
///
/// `None` fields are left untouched. `updated_at` is always written so
/// the durable record reflects the in-memory commit timestamp.
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    pub history: Option<Vec<Message>>,
    pub metadata: Option<Map<String, Value>>,
    pub model_name: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SessionUpdate {
    /// An update that replaces the full history.
    pub fn replace_history(history: Vec<Message>, updated_at: DateTime<Utc>) -> Self {
        Self {
            history: Some(history),
            metadata: None,
            model_name: None,
            updated_at,
        }
    }
}

/// Repository trait for session persistence.
pub trait SessionStore: Send + Sync {
    /// Persist a new session record.
    fn create_session(
        &self,
        record: &SessionRecord,
    ) -> impl std::future::Future<Output = Result<SessionRecord, StoreError>> + Send;

    /// Point read of a session record by id.
    fn get_session(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<SessionRecord>, StoreError>> + Send;

    /// Apply a partial update (full history replacement, metadata, or
    /// model rebinding). Returns `StoreError::NotFound` if no record
    /// exists for the id.
    fn update_session(
        &self,
        id: &Uuid,
        update: &SessionUpdate,
    ) -> impl std::future::Future<Output = Result<SessionRecord, StoreError>> + Send;

    /// Delete a session record. Returns `StoreError::NotFound` if no
    /// record exists for the id.
    fn delete_session(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}
