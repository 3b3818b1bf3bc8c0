//! Session record: the persisted and cached representation of one
//! conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::content::Message;

/// The aggregate root for one chat session.
///
/// `history` is append-only in normal operation; each append is one
/// (user, model) pair committed as a unit, so a committed history never
/// ends with an unpaired user message. `updated_at` advances on every
/// committed append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    /// Generation model bound to this session; fixed at creation, changed
    /// only through the explicit update operation.
    pub model_name: String,
    pub history: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Caller-supplied annotations; opaque to the gateway.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl SessionRecord {
    /// Create a new session record with the given initial history.
    pub fn new(
        id: Uuid,
        model_name: impl Into<String>,
        history: Vec<Message>,
        metadata: Map<String, Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            model_name: model_name.into(),
            history,
            created_at: now,
            updated_at: now,
            metadata,
        }
    }

    /// Append one committed (user, model) exchange and advance `updated_at`.
    pub fn push_exchange(&mut self, user: Message, model: Message) {
        self.history.push(user);
        self.history.push(model);
        self.updated_at = Utc::now();
    }
}
