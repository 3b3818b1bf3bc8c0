//! Stream assembler: folds incremental fragments into one committed turn.
//!
//! One-shot accumulator bound to a single streaming send. Fragments are
//! forwarded to the caller by the session manager as they arrive; the
//! assembler's job is only to build the turn that gets committed once the
//! stream completes. Consecutive text fragments concatenate into a single
//! text part; non-text fragments pass through whole, preserving
//! presentation order.

use parley_types::content::{Message, Part, Role};

/// Accumulates fragments from one streaming generation call.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    parts: Vec<Part>,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one fragment into the accumulated turn.
    pub fn absorb(&mut self, fragment: &Part) {
        match fragment {
            Part::Text(delta) => {
                if let Some(Part::Text(acc)) = self.parts.last_mut() {
                    acc.push_str(delta);
                } else {
                    self.parts.push(Part::Text(delta.clone()));
                }
            }
            other => self.parts.push(other.clone()),
        }
    }

    /// Whether any fragment has been absorbed.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// The accumulated parts, in presentation order.
    pub fn into_parts(self) -> Vec<Part> {
        self.parts
    }

    /// Finish assembly into the committed model turn.
    ///
    /// `adapter_turn` is the fully assembled turn from the engine's
    /// terminal marker; it is used only when no fragments were observed
    /// (an engine that answers in a single terminal message).
    pub fn into_turn(self, adapter_turn: Message) -> Message {
        if self.parts.is_empty() {
            adapter_turn
        } else {
            Message::new(Role::Model, self.parts)
        }
    }
}
