//! Command resolution and process lifecycle
//!
//! A command is any file in the command directory. Chat users name it by its
//! base name (the file name up to the first `.`), or by any prefix of the base
//! name that picks out a single file.

pub mod process;
pub mod resolver;

pub use process::OutputHandle;
pub use resolver::{CommandDirectory, ResolvedCommand};

use crate::error::CommandError;
use async_trait::async_trait;

/// Channel name handed to commands invoked from a direct message
pub const DIRECT_MESSAGE: &str = "direct";

/// The part of a file name before its first `.`
pub fn base_name(file_name: &str) -> &str {
    file_name
        .split_once('.')
        .map_or(file_name, |(base, _)| base)
}

/// A chat message that names a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    /// Message text as received
    pub raw_text: String,
    /// Trigger character the message started with
    pub trigger: char,
    /// Command name, trigger stripped
    pub name: String,
    /// Free-text arguments, possibly empty
    pub args: String,
}

impl CommandInvocation {
    /// Parse a chat message. Returns `None` unless the text starts with
    /// `trigger` immediately followed by a non-empty command name.
    pub fn parse(text: &str, trigger: char) -> Option<Self> {
        let rest = text.strip_prefix(trigger)?;

        let (name, args) = match rest.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim_start()),
            None => (rest, ""),
        };

        if name.is_empty() {
            return None;
        }

        Some(Self {
            raw_text: text.to_string(),
            trigger,
            name: name.to_string(),
            args: args.to_string(),
        })
    }
}

/// Where a command was invoked from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// A named channel
    Channel(String),
    /// A conversation with no resolvable channel identity
    Direct,
}

impl Destination {
    /// Channel name as passed to commands
    pub fn name(&self) -> &str {
        match self {
            Destination::Channel(name) => name,
            Destination::Direct => DIRECT_MESSAGE,
        }
    }
}

/// Who invoked a command, and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    /// Platform mention of the caller (`<@U123>` on Slack)
    pub user_mention: String,
    /// Caller's display name
    pub user_display_name: String,
    pub destination: Destination,
    pub thread_id: Option<String>,
}

impl CallerContext {
    pub fn channel_name(&self) -> &str {
        self.destination.name()
    }

    /// The user mention for direct messages, the channel name otherwise
    pub fn sender(&self) -> &str {
        match &self.destination {
            Destination::Channel(name) => name,
            Destination::Direct => &self.user_mention,
        }
    }
}

/// Resolves and launches commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Find the command named by `invocation` and start it, returning its
    /// output. The handle must be released once the caller is done reading.
    async fn run(
        &self,
        invocation: &CommandInvocation,
        caller: &CallerContext,
    ) -> std::result::Result<OutputHandle, CommandError>;
}
