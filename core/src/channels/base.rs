//! Base channel traits

use crate::error::Result;
use crate::messages::OutboundMessage;
use async_trait::async_trait;

/// Base trait for chat channels
///
/// A channel owns the connection to a messaging platform and publishes what
/// it receives to the message bus.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get the name of this channel
    fn name(&self) -> &str;

    /// Start the channel (begin receiving messages)
    async fn start(&self) -> Result<()>;

    /// Stop the channel
    async fn stop(&self) -> Result<()>;

    /// Check if the channel is enabled
    fn is_enabled(&self) -> bool;
}

/// A chat user as seen by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
}

impl UserInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Text that mentions this user in a message
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// A conversation with a resolvable name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
}

impl ChannelInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Operations the dispatcher needs from a chat platform.
///
/// Implementations are shared between concurrently handled messages.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Show a typing indicator in `chat_id`
    async fn send_typing(&self, chat_id: &str) -> Result<()>;

    /// Post a message
    async fn send(&self, msg: &OutboundMessage) -> Result<()>;

    /// Look up a user by id
    async fn user_info(&self, user_id: &str) -> Result<UserInfo>;

    /// Look up a named conversation by id. Fails for conversations without a
    /// name, such as direct messages.
    async fn channel_info(&self, chat_id: &str) -> Result<ChannelInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DummyChannel {
        enabled: bool,
    }

    #[async_trait]
    impl Channel for DummyChannel {
        fn name(&self) -> &str {
            "dummy"
        }

        async fn start(&self) -> Result<()> {
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            Ok(())
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }
    }

    #[tokio::test]
    async fn test_channel_trait() {
        let channel = DummyChannel { enabled: true };
        assert_eq!(channel.name(), "dummy");
        assert!(channel.is_enabled());
        assert!(channel.start().await.is_ok());
    }

    #[test]
    fn test_user_mention() {
        let user = UserInfo::new("U024BE7LH", "spengler");
        assert_eq!(user.mention(), "<@U024BE7LH>");
    }
}
