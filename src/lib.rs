//! Relay Bot Library
//!
//! A chat-controlled bot that delivers message lists through automation
//! drivers as independent, controllable send tasks.
//!
//! This crate provides the core functionality for:
//! - Parsing and validating message lists
//! - Running send tasks that can be paused, resumed, re-paced and stopped
//! - Owning and releasing the driver bound to each task
//! - Handling owner commands received as chat messages

pub mod commands;
pub mod config;
pub mod driver;
pub mod tasks;
