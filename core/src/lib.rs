//! SMIB Core Library
//!
//! This library contains the core functionality for SMIB, a chat bot that
//! runs executable scripts from a command directory and streams their output
//! back into chat. It includes configuration, the message bus, chat channels,
//! command resolution and process handling, and the dispatcher tying them
//! together.

pub mod bus;
pub mod channels;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod messages;

// Re-exports for convenience
pub use bus::{InboundMessage, MessageBus, OutboundMessage};
pub use channels::{
    Channel, ChannelInfo, ChannelManager, ChatClient, ConsoleClient, SlackChannel, UserInfo,
};
pub use command::{
    CallerContext, CommandDirectory, CommandInvocation, CommandRunner, Destination, OutputHandle,
    ResolvedCommand,
};
pub use config::{
    CommandsConfig, Config, SlackConfig, default_config, get_config_dir, get_config_path,
    load_config, load_config_from, save_config, save_config_to,
};
pub use dispatcher::Dispatcher;
pub use error::*;
