//! Session lifecycle: cache, manager, and stream assembly.

pub mod assembler;
pub mod cache;
pub mod manager;

pub use assembler::StreamAssembler;
pub use cache::{SessionCache, SessionEntry, SharedEntry};
pub use manager::SessionManager;

use std::pin::Pin;

use futures_util::Stream;

use parley_types::content::{Message, Part};
use parley_types::error::SessionError;

/// One event of a streaming send, as delivered to the transport layer.
///
/// A stream is zero or more `Fragment`s followed by exactly one terminal
/// event: `Final` carrying the committed turn, or `Error` when the
/// engine failed mid-stream (in which case nothing was committed).
#[derive(Debug)]
pub enum SendEvent {
    Fragment(Part),
    Final(Message),
    Error(SessionError),
}

/// Stream of send events returned by the streaming send operation.
pub type SendEventStream = Pin<Box<dyn Stream<Item = SendEvent> + Send>>;
