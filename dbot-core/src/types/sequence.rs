//! Sequence trait: stateful, multi-turn conversation logic bound to one chat.

use async_trait::async_trait;

use super::event::Event;

/// The context of a conversation. A sequence owns its state and decides how each message fits
/// into the broader conversation; the orchestrator only calls these methods and reacts to the
/// reported success or failure.
///
/// Lifecycle: created by the application (or a default-sequence factory), active once registered
/// for a chat, finished when it deregisters itself or is displaced by a newer registration.
/// Displacement does not call [`Sequence::finish`].
#[async_trait]
pub trait Sequence: Send + Sync {
    /// Initiates the sequence with the event that triggered it.
    async fn start(&self, event: &Event) -> crate::error::Result<()>;

    /// Processes one event as part of the sequence.
    async fn process(&self, event: &Event) -> crate::error::Result<()>;

    /// Wraps up the sequence.
    async fn finish(&self) -> crate::error::Result<()>;

    /// Descriptive, non-unique name.
    fn name(&self) -> &str;
}
