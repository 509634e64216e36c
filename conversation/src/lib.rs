//! # conversation
//!
//! Gives each chat at most one piece of stateful, multi-turn logic. [`ActiveSequenceRegistry`]
//! holds the chat → sequence map; [`ConversationOrchestrator`] intercepts events for chats with an
//! active sequence and otherwise applies a default response or default sequence.

mod orchestrator;
mod registry;

pub use orchestrator::{
    ConversationOrchestrator, ConversationOutcome, DefaultAction, Orchestrator, SequenceFactory,
};
pub use registry::ActiveSequenceRegistry;
