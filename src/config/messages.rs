//! Message list parsing and validation.

use std::path::Path;

use thiserror::Error;

use super::MAX_MESSAGE_LENGTH;

/// Errors that can occur while loading or validating a message list.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("Message at line {line} exceeds maximum length: {length} > {max_length}")]
    TooLong {
        line: usize,
        length: usize,
        max_length: usize,
    },

    #[error("No messages found")]
    NoMessages,

    #[error("Only .txt message files are accepted: {0}")]
    NotTextFile(String),

    #[error("Failed to read message file: {0}")]
    Io(#[from] std::io::Error),
}

/// A single message with the source line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// 1-based line number in the source text.
    pub line: usize,

    /// Message text, trimmed.
    pub text: String,
}

impl Message {
    /// Returns the character count of the message text.
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Ordered list of messages a task delivers, one per step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageList {
    messages: Vec<Message>,
}

impl MessageList {
    /// Parses message text: one message per line, blank lines and lines
    /// starting with `#` are skipped.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let messages = text
            .lines()
            .enumerate()
            .filter_map(|(i, raw)| {
                let text = raw.trim();
                if text.is_empty() || text.starts_with('#') {
                    None
                } else {
                    Some(Message {
                        line: i + 1,
                        text: text.to_owned(),
                    })
                }
            })
            .collect();

        Self { messages }
    }

    /// Loads a message list from a `.txt` file.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is not a `.txt` file or cannot be read.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, MessageError> {
        let path = path.as_ref();
        let is_txt = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
        if !is_txt {
            return Err(MessageError::NotTextFile(path.display().to_string()));
        }

        let bytes = std::fs::read(path)?;
        Ok(Self::parse(&String::from_utf8_lossy(&bytes)))
    }

    /// Validates the list.
    ///
    /// # Errors
    ///
    /// Returns the first validation error encountered.
    pub fn validate(&self) -> Result<(), MessageError> {
        self.validate_all().into_iter().find_map(Result::err).map_or(Ok(()), Err)
    }

    /// Returns one validation result per message, or a single
    /// [`MessageError::NoMessages`] for an empty list.
    #[must_use]
    pub fn validate_all(&self) -> Vec<Result<(), MessageError>> {
        if self.messages.is_empty() {
            return vec![Err(MessageError::NoMessages)];
        }

        self.messages
            .iter()
            .map(|msg| {
                let length = msg.char_count();
                if length > MAX_MESSAGE_LENGTH {
                    Err(MessageError::TooLong {
                        line: msg.line,
                        length,
                        max_length: MAX_MESSAGE_LENGTH,
                    })
                } else {
                    Ok(())
                }
            })
            .collect()
    }

    /// Iterates over the parsed messages.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Consumes the list, returning the step payloads in order.
    #[must_use]
    pub fn into_steps(self) -> Vec<String> {
        self.messages.into_iter().map(|m| m.text).collect()
    }

    /// Returns the number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Checks if there are no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
