//! Slack channel implementation using the RTM websocket and the Web API

use super::base::{Channel, ChannelInfo, ChatClient, UserInfo};
use crate::bus::MessageBus;
use crate::config::SlackConfig;
use crate::error::{ChannelError, Result};
use crate::messages::{InboundMessage, OutboundMessage};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

/// Channel name used for Slack messages
pub const SLACK_CHANNEL: &str = "slack";

#[derive(Debug, Deserialize)]
struct RtmConnect {
    url: String,
    #[serde(rename = "self")]
    bot: RtmSelf,
}

#[derive(Debug, Deserialize)]
struct RtmSelf {
    id: String,
}

#[derive(Debug, Deserialize)]
struct UsersInfo {
    user: SlackUser,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ConversationsInfo {
    channel: SlackConversation,
}

#[derive(Debug, Deserialize)]
struct SlackConversation {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    is_im: bool,
}

/// Event received over the RTM websocket
#[derive(Debug, Deserialize)]
struct RtmEvent {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thread_ts: Option<String>,
}

/// Undo Slack's escaping of `&`, `<` and `>` in message text
fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Turn a raw RTM event into an inbound message.
///
/// Only plain user messages qualify: edits, joins and other subtypes, bot
/// messages and the bot's own messages are dropped.
fn parse_event(raw: &str, self_id: Option<&str>) -> Option<InboundMessage> {
    let event: RtmEvent = match serde_json::from_str(raw) {
        Ok(event) => event,
        Err(e) => {
            warn!("Invalid JSON from Slack: {}", e);
            return None;
        }
    };

    if event.kind.as_deref() != Some("message") || event.subtype.is_some() || event.bot_id.is_some()
    {
        return None;
    }

    let user = event.user?;
    if Some(user.as_str()) == self_id {
        return None;
    }
    let chat_id = event.channel?;
    let content = unescape(event.text.as_deref().unwrap_or_default());

    let msg = InboundMessage::new(SLACK_CHANNEL, user, chat_id, content);
    Some(match event.thread_ts {
        Some(thread_ts) => msg.with_thread(thread_ts),
        None => msg,
    })
}

/// Slack channel using the RTM API
///
/// Inbound messages arrive over the RTM websocket and are published to the
/// bus. Replies and lookups go through the Web API; typing indicators go
/// over the websocket.
pub struct SlackChannel {
    config: SlackConfig,
    http: reqwest::Client,
    bus: MessageBus,
    running: Arc<RwLock<bool>>,
    connected: Arc<RwLock<bool>>,
    ws_tx: Arc<RwLock<Option<mpsc::Sender<String>>>>,
    next_event_id: AtomicU64,
}

impl SlackChannel {
    /// Create a new Slack channel
    pub fn new(config: SlackConfig, bus: MessageBus) -> Result<Self> {
        if config.token.is_empty() {
            return Err(ChannelError::NotConfigured("Slack".to_string()).into());
        }

        Ok(Self {
            config,
            http: reqwest::Client::new(),
            bus,
            running: Arc::new(RwLock::new(false)),
            connected: Arc::new(RwLock::new(false)),
            ws_tx: Arc::new(RwLock::new(None)),
            next_event_id: AtomicU64::new(1),
        })
    }

    /// Check if the RTM websocket is connected
    pub async fn is_connected(&self) -> bool {
        *self.connected.read().await
    }

    /// Call a Web API method and decode its payload
    async fn api<T: DeserializeOwned>(&self, method: &str, params: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}/{}", self.config.api_base.trim_end_matches('/'), method);

        let body: Value = self
            .http
            .post(&url)
            .bearer_auth(&self.config.token)
            .form(params)
            .send()
            .await?
            .json()
            .await?;

        if !body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            let error = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            if error == "invalid_auth" || error == "not_authed" {
                return Err(ChannelError::AuthenticationFailed("Slack".to_string()).into());
            }
            return Err(ChannelError::Api {
                method: method.to_string(),
                error,
            }
            .into());
        }

        serde_json::from_value(body).map_err(|e| {
            ChannelError::Api {
                method: method.to_string(),
                error: format!("unexpected response: {}", e),
            }
            .into()
        })
    }

    /// Hold one RTM connection until it drops or the channel stops
    async fn run_connection(&self) -> Result<()> {
        let rtm: RtmConnect = self.api("rtm.connect", &[]).await?;

        let (mut ws_stream, _) = tokio_tungstenite::connect_async(rtm.url.as_str())
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

        let (ws_tx, mut ws_rx) = mpsc::channel::<String>(100);
        *self.ws_tx.write().await = Some(ws_tx);
        *self.connected.write().await = true;
        info!("Connected to Slack as {}", rtm.bot.id);

        let self_id = Some(rtm.bot.id);
        while *self.running.read().await {
            tokio::select! {
                msg = ws_stream.next() => {
                    match msg {
                        Some(Ok(WsMessage::Text(text))) => {
                            self.handle_event(text.as_str(), self_id.as_deref()).await;
                        }
                        Some(Ok(WsMessage::Close(_))) => {
                            info!("Slack connection closed");
                            break;
                        }
                        Some(Err(e)) => {
                            error!("WebSocket error: {}", e);
                            break;
                        }
                        None => {
                            info!("WebSocket stream ended");
                            break;
                        }
                        Some(Ok(_)) => {}
                    }
                }
                Some(msg) = ws_rx.recv() => {
                    if let Err(e) = ws_stream.send(WsMessage::Text(msg.into())).await {
                        error!("Failed to write to Slack websocket: {}", e);
                        break;
                    }
                }
            }
        }

        *self.connected.write().await = false;
        *self.ws_tx.write().await = None;
        Ok(())
    }

    async fn handle_event(&self, raw: &str, self_id: Option<&str>) {
        if let Some(msg) = parse_event(raw, self_id) {
            debug!("Slack message in {} from {}", msg.chat_id, msg.sender_id);
            if let Err(e) = self.bus.publish_inbound(msg).await {
                error!("Failed to publish Slack message: {}", e);
            }
            return;
        }

        if let Ok(data) = serde_json::from_str::<Value>(raw) {
            match data.get("type").and_then(Value::as_str) {
                Some("hello") => info!("Slack RTM session started"),
                Some("goodbye") => info!("Slack asked us to reconnect"),
                Some("error") => warn!("Slack RTM error: {}", data),
                Some(other) => debug!("Ignoring Slack event: {}", other),
                None => {}
            }
        }
    }
}

#[async_trait]
impl Channel for SlackChannel {
    fn name(&self) -> &str {
        SLACK_CHANNEL
    }

    async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            info!("Slack channel disabled");
            return Ok(());
        }

        *self.running.write().await = true;
        info!("Connecting to Slack...");

        while *self.running.read().await {
            match self.run_connection().await {
                Ok(()) => {}
                Err(e @ crate::error::SmibError::Channel(ChannelError::AuthenticationFailed(_))) => {
                    *self.running.write().await = false;
                    return Err(e);
                }
                Err(e) => warn!("Slack connection error: {}", e),
            }

            if *self.running.read().await {
                info!("Reconnecting to Slack in 5 seconds...");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }

        info!("Slack channel stopped");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        *self.running.write().await = false;
        *self.connected.write().await = false;
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

#[async_trait]
impl ChatClient for SlackChannel {
    async fn send_typing(&self, chat_id: &str) -> Result<()> {
        let tx = self.ws_tx.read().await.clone();
        let Some(tx) = tx else {
            return Err(ChannelError::SendFailed("Slack not connected".to_string()).into());
        };

        let event = json!({
            "id": self.next_event_id.fetch_add(1, Ordering::Relaxed),
            "type": "typing",
            "channel": chat_id,
        });
        tx.send(event.to_string())
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<()> {
        let mut params = vec![("channel", msg.chat_id.as_str()), ("text", msg.content.as_str())];
        if let Some(thread_ts) = &msg.thread_id {
            params.push(("thread_ts", thread_ts.as_str()));
        }

        let _: Value = self.api("chat.postMessage", &params).await?;
        Ok(())
    }

    async fn user_info(&self, user_id: &str) -> Result<UserInfo> {
        let info: UsersInfo = self.api("users.info", &[("user", user_id)]).await?;
        Ok(UserInfo::new(info.user.id, info.user.name))
    }

    async fn channel_info(&self, chat_id: &str) -> Result<ChannelInfo> {
        let info: ConversationsInfo = self
            .api("conversations.info", &[("channel", chat_id)])
            .await?;

        match info.channel.name {
            Some(name) if !info.channel.is_im => Ok(ChannelInfo::new(info.channel.id, name)),
            _ => Err(ChannelError::LookupFailed(format!("{} has no channel name", chat_id)).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token: &str) -> SlackConfig {
        SlackConfig {
            token: token.to_string(),
            ..SlackConfig::default()
        }
    }

    #[test]
    fn test_slack_channel_requires_token() {
        assert!(SlackChannel::new(config(""), MessageBus::new()).is_err());
    }

    #[test]
    fn test_slack_channel_name() {
        let channel = SlackChannel::new(config("xoxb-test"), MessageBus::new()).unwrap();
        assert_eq!(channel.name(), "slack");
        assert!(channel.is_enabled());
    }

    #[tokio::test]
    async fn test_typing_requires_connection() {
        let channel = SlackChannel::new(config("xoxb-test"), MessageBus::new()).unwrap();
        assert!(!channel.is_connected().await);
        assert!(channel.send_typing("C1").await.is_err());
    }

    #[test]
    fn test_parse_message_event() {
        let raw = r#"{"type":"message","channel":"C2147483705","user":"U2147483697","text":"?countdown","ts":"1355517523.000005"}"#;
        let msg = parse_event(raw, Some("UBOT")).unwrap();
        assert_eq!(msg.channel, "slack");
        assert_eq!(msg.chat_id, "C2147483705");
        assert_eq!(msg.sender_id, "U2147483697");
        assert_eq!(msg.content, "?countdown");
        assert_eq!(msg.thread_id, None);
    }

    #[test]
    fn test_parse_threaded_message() {
        let raw = r#"{"type":"message","channel":"C1","user":"U1","text":"?countdown","ts":"2.0","thread_ts":"1.0"}"#;
        let msg = parse_event(raw, None).unwrap();
        assert_eq!(msg.thread_id.as_deref(), Some("1.0"));
    }

    #[test]
    fn test_parse_unescapes_text() {
        let raw = r#"{"type":"message","channel":"C1","user":"U1","text":"?say a &lt;b&gt; &amp;amp; c"}"#;
        let msg = parse_event(raw, None).unwrap();
        assert_eq!(msg.content, "?say a <b> &amp; c");
    }

    #[test]
    fn test_parse_skips_other_events() {
        assert!(parse_event(r#"{"type":"hello"}"#, None).is_none());
        assert!(parse_event(r#"{"type":"user_typing","channel":"C1","user":"U1"}"#, None).is_none());
        assert!(parse_event(
            r#"{"type":"message","subtype":"message_changed","channel":"C1"}"#,
            None
        )
        .is_none());
        assert!(parse_event(
            r#"{"type":"message","bot_id":"B1","channel":"C1","user":"U1","text":"?x"}"#,
            None
        )
        .is_none());
        assert!(parse_event("not json", None).is_none());
    }

    #[test]
    fn test_parse_skips_own_messages() {
        let raw = r#"{"type":"message","channel":"C1","user":"UBOT","text":"3"}"#;
        assert!(parse_event(raw, Some("UBOT")).is_none());
        assert!(parse_event(raw, Some("UOTHER")).is_some());
    }
}
