//! Message event types for the message bus

use serde::{Deserialize, Serialize};

/// Message received from a chat channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Channel type (slack, console)
    pub channel: String,
    /// User identifier
    pub sender_id: String,
    /// Chat/channel identifier
    pub chat_id: String,
    /// Message text content
    pub content: String,
    /// Thread the message was posted in, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl InboundMessage {
    /// Create a new inbound message
    pub fn new(
        channel: impl Into<String>,
        sender_id: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            sender_id: sender_id.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            thread_id: None,
        }
    }

    /// Set the thread the message belongs to
    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Build a reply addressed to the same chat and thread as this message
    pub fn reply(&self, content: impl Into<String>) -> OutboundMessage {
        let msg = OutboundMessage::new(&self.channel, &self.chat_id, content);
        match &self.thread_id {
            Some(thread_id) => msg.with_thread(thread_id),
            None => msg,
        }
    }
}

/// Message to send to a chat channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Channel type
    pub channel: String,
    /// Chat/channel identifier
    pub chat_id: String,
    /// Message content
    pub content: String,
    /// Thread to post into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl OutboundMessage {
    /// Create a new outbound message
    pub fn new(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            thread_id: None,
        }
    }

    /// Set the thread_id field
    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }
}
