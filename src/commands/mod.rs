//! Bot command handling module.
//!
//! Parses chat commands and drives the task registry on behalf of
//! the bot owner.

mod handler;
mod types;

pub use handler::CommandHandler;
pub use types::{BotCommand, CommandResult, SendArgs, SendFileArgs, SpeedArgs};
