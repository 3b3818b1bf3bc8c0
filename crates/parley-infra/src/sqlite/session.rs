//! SQLite session store implementation.
//!
//! Implements `SessionStore` from `parley-core` using sqlx with split
//! read/write pools: raw queries, a private Row struct, reader pool for
//! SELECTs and writer pool for mutations.
//!
//! Failure classification per the store contract: connection-level
//! failures are transient (`StoreError::Unavailable`), everything the
//! database itself rejected (constraints, malformed rows) is permanent
//! (`StoreError::Rejected`). No operation retries internally.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use parley_core::store::{SessionStore, SessionUpdate};
use parley_types::content::Message;
use parley_types::error::StoreError;
use parley_types::session::SessionRecord;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `SessionStore`.
pub struct SqliteSessionStore {
    pool: DatabasePool,
}

impl SqliteSessionStore {
    /// Create a new store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row type for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct SessionRow {
    id: String,
    model_name: String,
    history: String,
    created_at: String,
    updated_at: String,
    metadata: String,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            model_name: row.try_get("model_name")?,
            history: row.try_get("history")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            metadata: row.try_get("metadata")?,
        })
    }

    fn into_record(self) -> Result<SessionRecord, StoreError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| StoreError::Rejected(format!("invalid session id: {e}")))?;
        let history: Vec<Message> = serde_json::from_str(&self.history)
            .map_err(|e| StoreError::Rejected(format!("invalid history payload: {e}")))?;
        let metadata = serde_json::from_str(&self.metadata)
            .map_err(|e| StoreError::Rejected(format!("invalid metadata payload: {e}")))?;
        let created_at = parse_datetime(&self.created_at)?;
        let updated_at = parse_datetime(&self.updated_at)?;

        Ok(SessionRecord {
            id,
            model_name: self.model_name,
            history,
            created_at,
            updated_at,
            metadata,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Rejected(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Classify an sqlx failure as transient or permanent.
fn classify(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
        _ => StoreError::Rejected(err.to_string()),
    }
}

fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value)
        .map_err(|e| StoreError::Rejected(format!("serialization failed: {e}")))
}

// ---------------------------------------------------------------------------
// SessionStore implementation
// ---------------------------------------------------------------------------

impl SessionStore for SqliteSessionStore {
    async fn create_session(&self, record: &SessionRecord) -> Result<SessionRecord, StoreError> {
        sqlx::query(
            r#"INSERT INTO chat_sessions (id, model_name, history, created_at, updated_at, metadata)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.id.to_string())
        .bind(&record.model_name)
        .bind(encode_json(&record.history)?)
        .bind(format_datetime(&record.created_at))
        .bind(format_datetime(&record.updated_at))
        .bind(encode_json(&record.metadata)?)
        .execute(&self.pool.writer)
        .await
        .map_err(classify)?;

        Ok(record.clone())
    }

    async fn get_session(&self, id: &Uuid) -> Result<Option<SessionRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM chat_sessions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(classify)?;

        match row {
            Some(row) => {
                let session_row = SessionRow::from_row(&row).map_err(classify)?;
                Ok(Some(session_row.into_record()?))
            }
            None => Ok(None),
        }
    }

    async fn update_session(
        &self,
        id: &Uuid,
        update: &SessionUpdate,
    ) -> Result<SessionRecord, StoreError> {
        let history_json = update.history.as_ref().map(encode_json).transpose()?;
        let metadata_json = update.metadata.as_ref().map(encode_json).transpose()?;

        let mut sql = String::from("UPDATE chat_sessions SET updated_at = ?");
        if history_json.is_some() {
            sql.push_str(", history = ?");
        }
        if metadata_json.is_some() {
            sql.push_str(", metadata = ?");
        }
        if update.model_name.is_some() {
            sql.push_str(", model_name = ?");
        }
        sql.push_str(" WHERE id = ?");

        let mut query = sqlx::query(&sql).bind(format_datetime(&update.updated_at));
        if let Some(history) = &history_json {
            query = query.bind(history);
        }
        if let Some(metadata) = &metadata_json {
            query = query.bind(metadata);
        }
        if let Some(model_name) = &update.model_name {
            query = query.bind(model_name);
        }

        let result = query
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(classify)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        self.get_session(id).await?.ok_or(StoreError::NotFound)
    }

    async fn delete_session(&self, id: &Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM chat_sessions WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(classify)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::content::{InlineData, Part, Role};
    use serde_json::Map;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    fn make_record() -> SessionRecord {
        SessionRecord::new(Uuid::now_v7(), "gemini-2.5-flash", Vec::new(), Map::new())
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let store = SqliteSessionStore::new(test_pool().await);

        let record = make_record();
        let created = store.create_session(&record).await.unwrap();
        assert_eq!(created.id, record.id);

        let found = store.get_session(&record.id).await.unwrap().unwrap();
        assert_eq!(found.id, record.id);
        assert_eq!(found.model_name, "gemini-2.5-flash");
        assert!(found.history.is_empty());
    }

    #[tokio::test]
    async fn test_get_unknown_session_is_none() {
        let store = SqliteSessionStore::new(test_pool().await);
        let found = store.get_session(&Uuid::now_v7()).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_history_roundtrip_preserves_multipart_order() {
        let store = SqliteSessionStore::new(test_pool().await);

        let mut record = make_record();
        record.push_exchange(
            Message::new(
                Role::User,
                vec![
                    Part::text("what is in this image?"),
                    Part::InlineData(InlineData::from_bytes("image/png", b"\x89PNG\r\n\x1a\n")),
                    Part::text("thanks"),
                ],
            ),
            Message::model_text("A PNG signature."),
        );
        store.create_session(&record).await.unwrap();

        let found = store.get_session(&record.id).await.unwrap().unwrap();
        assert_eq!(found.history, record.history);
        assert_eq!(found.history[0].parts.len(), 3);
        assert!(matches!(found.history[0].parts[1], Part::InlineData(_)));
    }

    #[tokio::test]
    async fn test_update_replaces_history() {
        let store = SqliteSessionStore::new(test_pool().await);

        let record = make_record();
        store.create_session(&record).await.unwrap();

        let new_history = vec![Message::user_text("hi"), Message::model_text("hello")];
        let updated_at = Utc::now();
        let updated = store
            .update_session(
                &record.id,
                &SessionUpdate::replace_history(new_history.clone(), updated_at),
            )
            .await
            .unwrap();

        assert_eq!(updated.history, new_history);
        assert_eq!(updated.updated_at.timestamp(), updated_at.timestamp());
        // Untouched columns survive a partial update.
        assert_eq!(updated.model_name, "gemini-2.5-flash");
    }

    #[tokio::test]
    async fn test_update_rebinds_model_and_metadata() {
        let store = SqliteSessionStore::new(test_pool().await);

        let record = make_record();
        store.create_session(&record).await.unwrap();

        let mut metadata = Map::new();
        metadata.insert("origin".into(), "mobile".into());
        let update = SessionUpdate {
            history: None,
            metadata: Some(metadata),
            model_name: Some("gemini-2.5-pro".to_string()),
            updated_at: Utc::now(),
        };
        let updated = store.update_session(&record.id, &update).await.unwrap();

        assert_eq!(updated.model_name, "gemini-2.5-pro");
        assert_eq!(updated.metadata["origin"], "mobile");
        assert!(updated.history.is_empty());
    }

    #[tokio::test]
    async fn test_update_unknown_session_is_not_found() {
        let store = SqliteSessionStore::new(test_pool().await);
        let result = store
            .update_session(
                &Uuid::now_v7(),
                &SessionUpdate::replace_history(Vec::new(), Utc::now()),
            )
            .await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_delete_session() {
        let store = SqliteSessionStore::new(test_pool().await);

        let record = make_record();
        store.create_session(&record).await.unwrap();
        store.delete_session(&record.id).await.unwrap();

        assert!(store.get_session(&record.id).await.unwrap().is_none());
        let second = store.delete_session(&record.id).await;
        assert!(matches!(second, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_duplicate_create_is_rejected() {
        let store = SqliteSessionStore::new(test_pool().await);

        let record = make_record();
        store.create_session(&record).await.unwrap();
        let duplicate = store.create_session(&record).await;
        assert!(matches!(duplicate, Err(StoreError::Rejected(_))));
    }
}
