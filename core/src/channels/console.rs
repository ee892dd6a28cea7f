//! Local console channel for running commands without a chat platform

use super::base::{ChannelInfo, ChatClient, UserInfo};
use crate::error::{ChannelError, Result};
use crate::messages::{InboundMessage, OutboundMessage};
use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;

/// Channel name used for console messages
pub const CONSOLE_CHANNEL: &str = "console";

/// Chat client that writes replies to a local writer (stdout by default)
pub struct ConsoleClient<W = tokio::io::Stdout> {
    user: UserInfo,
    channel: Option<ChannelInfo>,
    out: Mutex<W>,
}

impl ConsoleClient {
    /// Create a console client writing to stdout. Without a channel the
    /// conversation behaves like a direct message.
    pub fn new(user: UserInfo, channel: Option<ChannelInfo>) -> Self {
        Self::with_writer(user, channel, tokio::io::stdout())
    }
}

impl<W> ConsoleClient<W>
where
    W: AsyncWrite + Send + Unpin,
{
    pub fn with_writer(user: UserInfo, channel: Option<ChannelInfo>, out: W) -> Self {
        Self {
            user,
            channel,
            out: Mutex::new(out),
        }
    }

    /// Build the inbound message this client's user would send
    pub fn message(&self, text: impl Into<String>) -> InboundMessage {
        let chat_id = self
            .channel
            .as_ref()
            .map_or_else(|| self.user.id.clone(), |c| c.id.clone());
        InboundMessage::new(CONSOLE_CHANNEL, &self.user.id, chat_id, text)
    }

    pub fn into_writer(self) -> W {
        self.out.into_inner()
    }
}

#[async_trait]
impl<W> ChatClient for ConsoleClient<W>
where
    W: AsyncWrite + Send + Unpin,
{
    async fn send_typing(&self, chat_id: &str) -> Result<()> {
        debug!("Typing in {}", chat_id);
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<()> {
        let mut out = self.out.lock().await;
        out.write_all(msg.content.as_bytes()).await?;
        if !msg.content.ends_with('\n') {
            out.write_all(b"\n").await?;
        }
        out.flush().await?;
        Ok(())
    }

    async fn user_info(&self, user_id: &str) -> Result<UserInfo> {
        if user_id == self.user.id {
            Ok(self.user.clone())
        } else {
            Err(ChannelError::LookupFailed(format!("unknown user {}", user_id)).into())
        }
    }

    async fn channel_info(&self, chat_id: &str) -> Result<ChannelInfo> {
        match &self.channel {
            Some(channel) if channel.id == chat_id => Ok(channel.clone()),
            _ => Err(ChannelError::LookupFailed(format!("no channel {}", chat_id)).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(channel: Option<ChannelInfo>) -> ConsoleClient<Vec<u8>> {
        ConsoleClient::with_writer(UserInfo::new("local", "spengler"), channel, Vec::new())
    }

    #[tokio::test]
    async fn test_send_terminates_lines() {
        let console = client(None);
        let msg = console.message("?countdown");
        console.send(&msg.reply("3\n")).await.unwrap();
        console.send(&msg.reply("Sorry spengler, x is on fire.")).await.unwrap();

        let written = String::from_utf8(console.into_writer()).unwrap();
        assert_eq!(written, "3\nSorry spengler, x is on fire.\n");
    }

    #[tokio::test]
    async fn test_direct_message_lookup_fails() {
        let console = client(None);
        let msg = console.message("?countdown");
        assert_eq!(msg.chat_id, "local");
        assert!(console.channel_info(&msg.chat_id).await.is_err());
        assert_eq!(console.user_info("local").await.unwrap().name, "spengler");
    }

    #[tokio::test]
    async fn test_channel_lookup() {
        let console = client(Some(ChannelInfo::new("general", "general")));
        let msg = console.message("?countdown");
        assert_eq!(msg.chat_id, "general");
        assert_eq!(console.channel_info("general").await.unwrap().name, "general");
        assert!(console.user_info("someone-else").await.is_err());
    }
}
