//! Session manager: orchestrates cache, store, and generation engine.
//!
//! Exposes the session operations consumed by the transport layer: start,
//! send (plain and streaming), get-history, update, and delete, plus
//! one-shot stateless generation for the vision path.
//!
//! Concurrency contract: operations on distinct sessions never block each
//! other. Operations on the same session serialize on the cache entry's
//! `RwLock` -- readers share, writers are exclusive and hold the lock for
//! the full generation-plus-commit window, so committed (user, model)
//! pairs observe the lock acquisition order and are never interleaved.
//!
//! Durability contract: the store is the source of truth at creation time
//! (a failed create fails the start operation and no cache entry is
//! made), but once a turn has been generated the user-visible response
//! wins over strict durability ordering: a failed history write is
//! logged, the entry is marked not-yet-durably-committed, and the next
//! successful write -- always of the full in-memory history -- supersedes
//! it. Nothing is ever appended to a stale store snapshot.
//!
//! Cancellation: neither the record, the engine handle, nor the store is
//! mutated before the commit point of a send. Dropping a streaming
//! response mid-flight therefore aborts the engine call, releases the
//! per-session lock via guard drop, and leaves the handle identical to
//! the last committed history.

use std::sync::Arc;

use chrono::Utc;
use futures_util::StreamExt;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use parley_types::content::{Message, Part, Role};
use parley_types::error::SessionError;
use parley_types::generation::{GenerationChunk, GenerationParams};
use parley_types::session::SessionRecord;

use crate::engine::{GenerationEngine, GenerationRequest};
use crate::store::{SessionStore, SessionUpdate};

use super::assembler::StreamAssembler;
use super::cache::{SessionCache, SessionEntry, SharedEntry};
use super::{SendEvent, SendEventStream};

/// Orchestrator for chat session state.
///
/// Generic over the store and engine ports so the core stays free of
/// infrastructure; `parley-api` pins the concrete implementations.
/// `store` is `None` when the deployment runs without a persistent store:
/// sessions then live only in the cache and reads for uncached ids
/// return an empty history. That mode is an explicit configuration
/// choice, not an error path.
pub struct SessionManager<S, E> {
    store: Option<Arc<S>>,
    engine: Arc<E>,
    cache: Arc<SessionCache>,
}

impl<S, E> SessionManager<S, E>
where
    S: SessionStore + 'static,
    E: GenerationEngine + 'static,
{
    /// Create a manager. Pass `store: None` to run in cache-only mode.
    pub fn new(store: Option<Arc<S>>, engine: Arc<E>) -> Self {
        if store.is_none() {
            warn!("no persistent store configured; session history lives only in process memory");
        }
        Self {
            store,
            engine,
            cache: Arc::new(SessionCache::new()),
        }
    }

    /// The session cache.
    ///
    /// Exposed so an external reaper can `invalidate` idle sessions; the
    /// manager itself never expires entries.
    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    /// Start a new session bound to `model_name`, seeded with
    /// `initial_history`.
    ///
    /// Store write first, then engine handle, then cache insert: a cache
    /// entry never exists without a corresponding durable record.
    pub async fn start_session(
        &self,
        model_name: &str,
        initial_history: Vec<Message>,
        metadata: Map<String, Value>,
    ) -> Result<SessionRecord, SessionError> {
        if model_name.trim().is_empty() {
            return Err(SessionError::InvalidRequest(
                "model name must not be empty".to_string(),
            ));
        }

        let id = Uuid::now_v7();
        let record = SessionRecord::new(id, model_name, initial_history, metadata);

        let record = match &self.store {
            Some(store) => store.create_session(&record).await.map_err(SessionError::from)?,
            None => record,
        };

        let handle = self
            .engine
            .initialize(&record.model_name, record.history.clone())
            .map_err(SessionError::from)?;
        self.cache.insert(id, SessionEntry::new(record.clone(), handle));

        info!(session_id = %id, model = %record.model_name, "Chat session started");
        Ok(record)
    }

    /// Send a user message and return the completed model turn.
    ///
    /// Holds the session's write lock for the full generation-plus-commit
    /// window.
    pub async fn send_message(
        &self,
        id: Uuid,
        message: Message,
        params: GenerationParams,
    ) -> Result<Message, SessionError> {
        validate_user_message(&message)?;

        let entry = self.entry_for(id).await?;
        let mut guard = entry.write().await;

        let request = guard.handle.request_for(&message, params);
        let turn = self.engine.generate(&request).await.map_err(SessionError::from)?;

        guard.record.push_exchange(message.clone(), turn.clone());
        guard.handle.push_exchange(message, turn.clone());
        Self::commit_entry(self.store.as_deref(), &mut guard).await;

        Ok(turn)
    }

    /// Send a user message and deliver the model turn incrementally.
    ///
    /// Pre-stream failures (unknown session, load errors, invalid input)
    /// surface as `Err` before any event is produced. Once the stream is
    /// running, a mid-stream engine failure yields a terminal
    /// `SendEvent::Error` and nothing is committed; on success the full
    /// turn is committed before the terminal `SendEvent::Final`.
    pub async fn send_message_streaming(
        &self,
        id: Uuid,
        message: Message,
        params: GenerationParams,
    ) -> Result<SendEventStream, SessionError> {
        validate_user_message(&message)?;

        let entry = self.entry_for(id).await?;
        // Owned write guard: the lock travels inside the stream and is
        // released when the stream finishes or is dropped.
        let guard = entry.clone().write_owned().await;
        let engine = self.engine.clone();
        let store = self.store.clone();

        let stream = async_stream::stream! {
            let mut guard = guard;
            let request = guard.handle.request_for(&message, params);
            let mut upstream = engine.generate_streaming(request);
            let mut assembler = StreamAssembler::new();
            let mut adapter_turn = None;

            while let Some(item) = upstream.next().await {
                match item {
                    Ok(GenerationChunk::Fragment(part)) => {
                        assembler.absorb(&part);
                        yield SendEvent::Fragment(part);
                    }
                    Ok(GenerationChunk::Final(turn)) => {
                        adapter_turn = Some(turn);
                        break;
                    }
                    Err(err) => {
                        warn!(session_id = %guard.record.id, error = %err, "Generation stream failed; aborting commit");
                        yield SendEvent::Error(err.into());
                        return;
                    }
                }
            }

            let Some(adapter_turn) = adapter_turn else {
                yield SendEvent::Error(SessionError::EngineUnavailable(
                    "generation stream ended without completing the turn".to_string(),
                ));
                return;
            };

            let turn = assembler.into_turn(adapter_turn);
            guard.record.push_exchange(message.clone(), turn.clone());
            guard.handle.push_exchange(message, turn.clone());
            Self::commit_entry(store.as_deref(), &mut guard).await;

            yield SendEvent::Final(turn);
        };

        Ok(Box::pin(stream))
    }

    /// Read the session's committed history.
    ///
    /// Prefers the cache (shared read section of the same lock writers
    /// hold exclusively), falls back to the store, and in cache-only mode
    /// returns an empty history for uncached ids.
    pub async fn get_history(&self, id: Uuid) -> Result<Vec<Message>, SessionError> {
        if let Some(entry) = self.cache.get(&id) {
            let guard = entry.read().await;
            return Ok(guard.record.history.clone());
        }

        match &self.store {
            Some(store) => {
                let record = store
                    .get_session(&id)
                    .await
                    .map_err(SessionError::from)?
                    .ok_or(SessionError::NotFound)?;
                Ok(record.history)
            }
            None => {
                debug!(session_id = %id, "uncached session in cache-only mode; returning empty history");
                Ok(Vec::new())
            }
        }
    }

    /// Rebind the session's model and/or replace its metadata.
    ///
    /// Invalidates the cache entry so the next use reloads the record and
    /// rebuilds the engine handle against the new model.
    pub async fn update_session(
        &self,
        id: Uuid,
        model_name: Option<String>,
        metadata: Option<Map<String, Value>>,
    ) -> Result<SessionRecord, SessionError> {
        if model_name.is_none() && metadata.is_none() {
            return Err(SessionError::InvalidRequest(
                "update must change at least one field".to_string(),
            ));
        }
        if let Some(name) = &model_name
            && name.trim().is_empty()
        {
            return Err(SessionError::InvalidRequest(
                "model name must not be empty".to_string(),
            ));
        }

        match &self.store {
            Some(store) => {
                let update = SessionUpdate {
                    history: None,
                    metadata,
                    model_name,
                    updated_at: Utc::now(),
                };
                let record = store
                    .update_session(&id, &update)
                    .await
                    .map_err(SessionError::from)?;
                // The backing record changed underneath any cached entry.
                self.cache.invalidate(&id);
                info!(session_id = %id, model = %record.model_name, "Session updated");
                Ok(record)
            }
            None => {
                let entry = self.cache.get(&id).ok_or(SessionError::NotFound)?;
                let mut guard = entry.write().await;
                if let Some(name) = model_name {
                    guard.record.model_name = name;
                    guard.handle = self
                        .engine
                        .initialize(&guard.record.model_name, guard.record.history.clone())
                        .map_err(SessionError::from)?;
                }
                if let Some(metadata) = metadata {
                    guard.record.metadata = metadata;
                }
                guard.record.updated_at = Utc::now();
                Ok(guard.record.clone())
            }
        }
    }

    /// Delete a session. Terminal: a deleted id never becomes active again.
    ///
    /// Takes the per-session write lock (waiting out any in-flight send),
    /// evicts the cache entry so no new operation can start against it,
    /// then deletes the durable record. A store `NotFound` after a cache
    /// hit is success (cache-only session); with neither cache entry nor
    /// store record the id is unknown.
    pub async fn delete_session(&self, id: Uuid) -> Result<(), SessionError> {
        let cached = self.cache.get(&id);
        let had_cache_entry = cached.is_some();
        if let Some(entry) = cached {
            let _guard = entry.write().await;
            self.cache.invalidate(&id);
        } else {
            // Clear an in-progress load slot, if any.
            self.cache.invalidate(&id);
        }

        match &self.store {
            Some(store) => match store.delete_session(&id).await {
                Ok(()) => {
                    info!(session_id = %id, "Chat session deleted");
                    Ok(())
                }
                Err(parley_types::error::StoreError::NotFound) if had_cache_entry => {
                    info!(session_id = %id, "Cache-only session deleted");
                    Ok(())
                }
                Err(parley_types::error::StoreError::NotFound) => Err(SessionError::NotFound),
                Err(err) => Err(err.into()),
            },
            None => {
                if had_cache_entry {
                    info!(session_id = %id, "Chat session deleted");
                    Ok(())
                } else {
                    Err(SessionError::NotFound)
                }
            }
        }
    }

    /// One-shot stateless generation (the vision path): no session, no
    /// lock, no store write.
    pub async fn generate_content(
        &self,
        model_name: &str,
        parts: Vec<Part>,
        params: GenerationParams,
    ) -> Result<Message, SessionError> {
        if model_name.trim().is_empty() {
            return Err(SessionError::InvalidRequest(
                "model name must not be empty".to_string(),
            ));
        }
        if parts.is_empty() {
            return Err(SessionError::InvalidRequest(
                "at least one content part is required".to_string(),
            ));
        }

        let request = GenerationRequest {
            model_name: model_name.to_string(),
            contents: vec![Message::new(Role::User, parts)],
            params,
        };
        self.engine.generate(&request).await.map_err(SessionError::from)
    }

    /// Resolve the cache entry for a send, loading it from the store
    /// (and initializing an engine handle) on a miss. Single-flight:
    /// concurrent misses for the same id share one load.
    async fn entry_for(&self, id: Uuid) -> Result<SharedEntry, SessionError> {
        let store = self.store.clone();
        let engine = self.engine.clone();
        self.cache
            .get_or_load(id, move || async move {
                let Some(store) = store else {
                    // Cache-only mode: an uncached id has no session.
                    return Err(SessionError::NotFound);
                };
                let record = store
                    .get_session(&id)
                    .await
                    .map_err(SessionError::from)?
                    .ok_or(SessionError::NotFound)?;
                let handle = engine
                    .initialize(&record.model_name, record.history.clone())
                    .map_err(SessionError::from)?;
                Ok(SessionEntry::new(record, handle))
            })
            .await
    }

    /// Write the entry's full in-memory history to the store.
    ///
    /// Failures are logged, not raised: the caller already has the
    /// generated turn. The entry stays marked dirty until a later commit
    /// succeeds and supersedes the missed write.
    async fn commit_entry(store: Option<&S>, entry: &mut SessionEntry) {
        let Some(store) = store else { return };

        let update =
            SessionUpdate::replace_history(entry.record.history.clone(), entry.record.updated_at);
        match store.update_session(&entry.record.id, &update).await {
            Ok(_) => {
                if entry.dirty {
                    info!(session_id = %entry.record.id, "Deferred history commit caught up");
                }
                entry.dirty = false;
            }
            Err(err) => {
                entry.dirty = true;
                warn!(
                    session_id = %entry.record.id,
                    error = %err,
                    "Turn returned to caller but history not yet durably committed"
                );
            }
        }
    }
}

fn validate_user_message(message: &Message) -> Result<(), SessionError> {
    if message.role != Role::User {
        return Err(SessionError::InvalidRequest(
            "message role must be 'user'".to_string(),
        ));
    }
    if message.parts.is_empty() {
        return Err(SessionError::InvalidRequest(
            "message must contain at least one part".to_string(),
        ));
    }
    Ok(())
}
