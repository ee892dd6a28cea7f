//! Turning chat messages into command runs
//!
//! The dispatcher subscribes to the inbound feed and handles every message
//! on its own task. Handling a message means: parse the trigger, look up who
//! sent it and where, run the command, and relay its output line by line
//! into the same chat and thread.

use crate::bus::MessageBus;
use crate::channels::ChatClient;
use crate::command::{CallerContext, CommandInvocation, CommandRunner, Destination, OutputHandle};
use crate::error::{ChannelError, DispatchError, Result};
use crate::messages::InboundMessage;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Routes command messages to the command runner and output back to chat
#[derive(Clone)]
pub struct Dispatcher {
    chat: Arc<dyn ChatClient>,
    runner: Arc<dyn CommandRunner>,
    bus: MessageBus,
    trigger: char,
    running: Arc<RwLock<bool>>,
}

impl Dispatcher {
    /// Create a new dispatcher
    pub fn new(
        chat: Arc<dyn ChatClient>,
        runner: Arc<dyn CommandRunner>,
        bus: MessageBus,
        trigger: char,
    ) -> Self {
        Self {
            chat,
            runner,
            bus,
            trigger,
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Receive inbound messages until stopped, handling each one on its own
    /// task. Fails if the inbound feed closes.
    pub async fn run(&self) -> Result<()> {
        *self.running.write().await = true;
        info!("Dispatcher started");

        let mut rx = self.bus.subscribe_inbound();

        while *self.running.read().await {
            match tokio::time::timeout(tokio::time::Duration::from_secs(1), rx.recv()).await {
                Ok(Ok(msg)) => {
                    let dispatcher = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = dispatcher.handle_message(&msg).await {
                            warn!("Failed to handle message: {}", e);
                        }
                    });
                }
                Ok(Err(RecvError::Lagged(n))) => {
                    warn!("Dispatcher lagged, missed {} messages", n);
                }
                Ok(Err(RecvError::Closed)) => {
                    *self.running.write().await = false;
                    return Err(ChannelError::ConnectionFailed(
                        "inbound message feed closed".to_string(),
                    )
                    .into());
                }
                Err(_) => {
                    // Timeout, continue loop
                }
            }
        }

        info!("Dispatcher stopped");
        Ok(())
    }

    /// Stop the receive loop
    pub async fn stop(&self) {
        *self.running.write().await = false;
        info!("Dispatcher stopping");
    }

    /// Handle one chat message.
    ///
    /// Messages that are not commands are ignored. Unknown and ambiguous
    /// commands are answered in chat and return `Ok`. Every other failure is
    /// answered in chat where possible and returned.
    pub async fn handle_message(&self, msg: &InboundMessage) -> std::result::Result<(), DispatchError> {
        let Some(invocation) = CommandInvocation::parse(&msg.content, self.trigger) else {
            return Ok(());
        };

        if let Err(e) = self.chat.send_typing(&msg.chat_id).await {
            debug!("Failed to send typing indicator: {}", e);
        }

        let caller = self.caller_context(msg).await?;
        let user = caller.user_display_name.as_str();
        let cmd = invocation.name.as_str();

        match self.runner.run(&invocation, &caller).await.map_err(DispatchError::from) {
            Ok(output) => self.relay_output(msg, &caller, &invocation, output).await,
            Err(DispatchError::NotFound { .. }) => {
                self.reply(msg, format!("Sorry {}, I don't have a {} command.", user, cmd))
                    .await;
                Ok(())
            }
            Err(DispatchError::NotUnique { candidates }) => {
                self.reply(
                    msg,
                    format!("Sorry {}, that wasn't unique, try one of: {}", user, candidates),
                )
                .await;
                Ok(())
            }
            Err(err @ (DispatchError::Execution(_) | DispatchError::Read(_) | DispatchError::Chat(_))) => {
                self.reply(msg, format!("Sorry {}, {} is on fire.", user, cmd))
                    .await;
                Err(err)
            }
        }
    }

    /// Work out who sent `msg` and where. A chat whose name cannot be looked
    /// up is treated as a direct message.
    async fn caller_context(&self, msg: &InboundMessage) -> std::result::Result<CallerContext, DispatchError> {
        let user = self
            .chat
            .user_info(&msg.sender_id)
            .await
            .map_err(|e| DispatchError::Chat(Box::new(e)))?;

        let destination = match self.chat.channel_info(&msg.chat_id).await {
            Ok(channel) => Destination::Channel(channel.name),
            Err(e) => {
                debug!("No channel info for {}, treating as direct message: {}", msg.chat_id, e);
                Destination::Direct
            }
        };

        Ok(CallerContext {
            user_mention: user.mention(),
            user_display_name: user.name,
            destination,
            thread_id: msg.thread_id.clone(),
        })
    }

    /// Relay each line of `output` as its own message, in order
    async fn relay_output(
        &self,
        msg: &InboundMessage,
        caller: &CallerContext,
        invocation: &CommandInvocation,
        output: OutputHandle,
    ) -> std::result::Result<(), DispatchError> {
        let mut reader = BufReader::new(output);
        let mut line = Vec::new();

        loop {
            line.clear();
            let read = reader.read_until(b'\n', &mut line).await;

            if !line.is_empty() {
                self.reply(msg, String::from_utf8_lossy(&line)).await;
            }

            match read {
                Ok(0) => {
                    reader.into_inner().release();
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => {
                    reader.into_inner().release();
                    self.reply(
                        msg,
                        format!(
                            "Sorry {}, {} exploded or something.",
                            caller.user_display_name, invocation.name
                        ),
                    )
                    .await;
                    return Err(DispatchError::Read(e));
                }
            }
        }
    }

    /// Post into the chat and thread `msg` came from
    async fn reply(&self, msg: &InboundMessage, content: impl Into<String>) {
        if let Err(e) = self.chat.send(&msg.reply(content)).await {
            warn!("Failed to send reply to {}: {}", msg.chat_id, e);
        }
    }
}
