//! Async message bus for decoupled channel-dispatcher communication

pub mod queue;

pub use queue::MessageBus;
pub use crate::messages::{InboundMessage, OutboundMessage};
