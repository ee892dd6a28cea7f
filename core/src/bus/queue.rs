//! Async message queue decoupling chat channels from the dispatcher

use crate::error::{ChannelError, Result};
use crate::messages::InboundMessage;
use tokio::sync::broadcast;
use tracing::warn;

/// Capacity of the inbound feed before slow subscribers start lagging
const INBOUND_CAPACITY: usize = 256;

/// Async message bus that decouples chat channels from the dispatcher
///
/// Channels push messages to the inbound feed in the order the transport
/// delivered them; the dispatcher subscribes and fans each one out to its
/// own task.
#[derive(Clone)]
pub struct MessageBus {
    inbound: broadcast::Sender<InboundMessage>,
}

impl MessageBus {
    /// Create a new message bus
    pub fn new() -> Self {
        let (inbound_tx, _) = broadcast::channel(INBOUND_CAPACITY);

        Self {
            inbound: inbound_tx,
        }
    }

    /// Publish a message from a channel to the dispatcher
    pub async fn publish_inbound(&self, msg: InboundMessage) -> Result<()> {
        match self.inbound.send(msg) {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!("Failed to publish inbound message: {}", e);
                Err(ChannelError::SendFailed(e.to_string()).into())
            }
        }
    }

    /// Subscribe to inbound messages
    pub fn subscribe_inbound(&self) -> broadcast::Receiver<InboundMessage> {
        self.inbound.subscribe()
    }

    /// Get the number of inbound subscribers
    pub fn inbound_subscriber_count(&self) -> usize {
        self.inbound.receiver_count()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}
