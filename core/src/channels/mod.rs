//! Channel implementations for messaging platforms

pub mod base;
pub mod console;
pub mod manager;
pub mod slack;

pub use base::{Channel, ChannelInfo, ChatClient, UserInfo};
pub use console::ConsoleClient;
pub use manager::ChannelManager;
pub use slack::SlackChannel;
