//! Engine handle: an initialized conversation context.
//!
//! The generation API is stateless per request, so the "engine-side"
//! context is held client-side: the model binding plus the contents the
//! engine was initialized with. The handle is mutated only when a send
//! commits, which keeps it identical to the last committed history even
//! when a caller abandons a streaming call mid-flight.

use parley_types::content::Message;
use parley_types::generation::GenerationParams;

use super::GenerationRequest;

/// Conversation context bound to a model inside the generation engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    model_name: String,
    contents: Vec<Message>,
}

impl EngineHandle {
    /// Create a handle seeded with the given history.
    pub fn new(model_name: impl Into<String>, history: Vec<Message>) -> Self {
        Self {
            model_name: model_name.into(),
            contents: history,
        }
    }

    /// The model this handle is bound to.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// The conversation contents the engine currently knows about.
    pub fn contents(&self) -> &[Message] {
        &self.contents
    }

    /// Build the request for sending `message` in this context.
    pub fn request_for(&self, message: &Message, params: GenerationParams) -> GenerationRequest {
        let mut contents = self.contents.clone();
        contents.push(message.clone());
        GenerationRequest {
            model_name: self.model_name.clone(),
            contents,
            params,
        }
    }

    /// Record one committed (user, model) exchange into the context.
    pub fn push_exchange(&mut self, user: Message, model: Message) {
        self.contents.push(user);
        self.contents.push(model);
    }
}
