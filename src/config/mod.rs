//! Configuration module for the relay bot.
//!
//! Handles loading of bot settings from the environment and parsing
//! and validation of the message lists that tasks deliver.

mod messages;
mod settings;

pub use messages::{Message, MessageError, MessageList};
pub use settings::{BotSettings, ConfigError};

/// Maximum length of a single message, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 1000;
