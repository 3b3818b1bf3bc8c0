//! GenerationEngine trait definition.
//!
//! Capability port for the external generation engine. Implementations
//! live in parley-infra (e.g., `GeminiEngine`). Uses RPITIT for
//! `generate` and `Pin<Box<dyn Stream>>` for `generate_streaming`.
//!
//! The engine adapter does not retry. Engine failures propagate as
//! `EngineError` and never corrupt a handle: handles are mutated only by
//! the session manager's commit step, after a call has fully succeeded.

pub mod handle;

pub use handle::EngineHandle;

use std::pin::Pin;

use futures_util::Stream;

use parley_types::content::Message;
use parley_types::error::EngineError;
use parley_types::generation::{GenerationChunk, GenerationParams};

/// One generation call: a model, the full conversation contents, and the
/// caller's tuning parameters.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model_name: String,
    pub contents: Vec<Message>,
    pub params: GenerationParams,
}

/// Trait for generation engine backends.
pub trait GenerationEngine: Send + Sync {
    /// Bind a conversation context to a model, seeded with history.
    ///
    /// The handle is owned exclusively by the session cache entry it is
    /// created for and must be rebuilt whenever the session's history
    /// changes through any path other than the handle's own send.
    fn initialize(
        &self,
        model_name: &str,
        history: Vec<Message>,
    ) -> Result<EngineHandle, EngineError>;

    /// Produce one completed model turn for the request.
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl std::future::Future<Output = Result<Message, EngineError>> + Send;

    /// Produce the turn incrementally: a sequence of fragments terminated
    /// by `GenerationChunk::Final` carrying the fully assembled turn, or
    /// by an error item.
    fn generate_streaming(
        &self,
        request: GenerationRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<GenerationChunk, EngineError>> + Send + 'static>>;
}
