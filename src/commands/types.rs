//! Command types and definitions.

use std::fmt;
use std::path::PathBuf;

use crate::tasks::TaskId;

/// Arguments for starting a task from inline text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendArgs {
    pub target: String,
    pub body: String,
}

/// Arguments for starting a task from a message file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFileArgs {
    pub target: String,
    pub path: PathBuf,
}

/// Arguments for changing a task's delay.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedArgs {
    pub id: TaskId,
    pub delay_secs: f64,
}

/// Available bot commands.
#[derive(Debug, Clone, PartialEq)]
pub enum BotCommand {
    /// Greeting with a short command overview.
    Start,

    /// Show help information.
    Help,

    /// Save a driver session built from a `sessionid` cookie.
    LoginSession(String),

    /// Start a task delivering the given text, one message per line.
    Send(SendArgs),

    /// Start a task delivering the messages in a `.txt` file.
    SendFile(SendFileArgs),

    /// Pause a task after its current message.
    Pause(TaskId),

    /// Resume a paused task.
    Resume(TaskId),

    /// Stop a task and release its driver.
    Stop(TaskId),

    /// Change a task's delay between messages.
    Speed(SpeedArgs),

    /// List tasks and their progress.
    Tasks,

    /// Forget finished tasks.
    Clear,

    /// A known command with missing or malformed arguments.
    Usage(&'static str),
}

impl BotCommand {
    /// Parses a command from a message text.
    ///
    /// Returns `None` if the message is not a command.
    #[must_use]
    pub fn parse(text: &str, prefix: &str) -> Option<Self> {
        let text = text.trim();

        // Check if message starts with the command prefix
        if !text.starts_with(prefix) {
            return None;
        }

        let after_prefix = text[prefix.len()..].trim_start();

        let (cmd, args) = match after_prefix.split_once(char::is_whitespace) {
            Some((cmd, args)) => (cmd.to_lowercase(), args.trim()),
            None => (after_prefix.to_lowercase(), ""),
        };

        let command = match cmd.as_str() {
            "start" => Self::Start,
            "help" | "h" | "?" => Self::Help,
            "login_session" | "session" => Self::parse_session_id(args)
                .map_or(Self::Usage("login_session <sessionid>"), Self::LoginSession),
            "send" | "attack" => {
                Self::parse_send(args).unwrap_or(Self::Usage("send <target> <message text>"))
            }
            "sendfile" | "file" => {
                Self::parse_send_file(args).unwrap_or(Self::Usage("sendfile <target> <path.txt>"))
            }
            "pause" => Self::parse_id(args).map_or(Self::Usage("pause <task_id>"), Self::Pause),
            "resume" | "continue" => {
                Self::parse_id(args).map_or(Self::Usage("resume <task_id>"), Self::Resume)
            }
            "stop" | "kill" => Self::parse_id(args).map_or(Self::Usage("stop <task_id>"), Self::Stop),
            "speed" | "delay" => {
                Self::parse_speed(args).unwrap_or(Self::Usage("speed <task_id> <seconds>"))
            }
            "tasks" | "list" | "ls" => Self::Tasks,
            "clear" | "prune" => Self::Clear,
            _ => return None,
        };

        Some(command)
    }

    /// Parses send arguments: `<target> <text...>`, text may span lines.
    fn parse_send(args: &str) -> Option<Self> {
        let (target, body) = args.split_once(char::is_whitespace)?;
        let body = body.trim();
        if target.is_empty() || body.is_empty() {
            return None;
        }

        Some(Self::Send(SendArgs {
            target: target.to_owned(),
            body: body.to_owned(),
        }))
    }

    /// Parses sendfile arguments: `<target> <path>`
    fn parse_send_file(args: &str) -> Option<Self> {
        let (target, path) = args.split_once(char::is_whitespace)?;
        let path = path.trim();
        if target.is_empty() || path.is_empty() {
            return None;
        }

        Some(Self::SendFile(SendFileArgs {
            target: target.to_owned(),
            path: PathBuf::from(path),
        }))
    }

    fn parse_session_id(args: &str) -> Option<String> {
        let mut parts = args.split_whitespace();
        let session_id = parts.next()?;
        parts.next().is_none().then(|| session_id.to_owned())
    }

    fn parse_id(args: &str) -> Option<TaskId> {
        let mut parts = args.split_whitespace();
        let id = parts.next()?.parse().ok()?;
        parts.next().is_none().then_some(id)
    }

    /// Parses speed arguments: `<task_id> <seconds>`
    fn parse_speed(args: &str) -> Option<Self> {
        let mut parts = args.split_whitespace();
        let id = parts.next()?.parse().ok()?;
        let delay_secs = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }

        Some(Self::Speed(SpeedArgs { id, delay_secs }))
    }

    /// Returns the command name as it appears in help.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::LoginSession(_) => "login_session",
            Self::Send(_) => "send",
            Self::SendFile(_) => "sendfile",
            Self::Pause(_) => "pause",
            Self::Resume(_) => "resume",
            Self::Stop(_) => "stop",
            Self::Speed(_) => "speed",
            Self::Tasks => "tasks",
            Self::Clear => "clear",
            Self::Usage(_) => "usage",
        }
    }

    /// Whether the command may be used by anyone, not only the owner.
    #[must_use]
    pub const fn is_public(&self) -> bool {
        matches!(self, Self::Start | Self::Help)
    }

    /// Returns all available commands with their aliases and descriptions.
    #[must_use]
    pub fn all_commands() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("login_session <sessionid>", "(session)", "Save a session from a sessionid cookie"),
            ("send <target> <text>", "(attack)", "Start a task, one message per line"),
            ("sendfile <target> <path.txt>", "(file)", "Start a task from a .txt file"),
            ("pause <id>", "", "Pause a task after its current message"),
            ("resume <id>", "", "Resume a paused task"),
            ("stop <id>", "(kill)", "Stop a task and close its driver"),
            ("speed <id> <seconds>", "(delay)", "Change the delay between messages"),
            ("tasks", "(ls)", "List tasks and their progress"),
            ("clear", "", "Forget finished tasks"),
            ("help", "(h, ?)", "Show this help message"),
        ]
    }
}

impl fmt::Display for BotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoginSession(_) => write!(f, "login_session <redacted>"),
            Self::Send(args) => write!(f, "send {} ({} bytes)", args.target, args.body.len()),
            Self::SendFile(args) => write!(f, "sendfile {} {}", args.target, args.path.display()),
            Self::Pause(id) => write!(f, "pause {id}"),
            Self::Resume(id) => write!(f, "resume {id}"),
            Self::Stop(id) => write!(f, "stop {id}"),
            Self::Speed(args) => write!(f, "speed {} {}", args.id, args.delay_secs),
            Self::Usage(usage) => write!(f, "usage: {usage}"),
            _ => write!(f, "{}", self.name()),
        }
    }
}

/// Result of command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Whether the command was successful.
    pub success: bool,

    /// Response message to show the user.
    pub message: String,
}

impl CommandResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// Creates an error result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "/";

    #[test]
    fn test_parse_control_commands() {
        assert_eq!(BotCommand::parse("/pause 3", PREFIX), Some(BotCommand::Pause(TaskId(3))));
        assert_eq!(BotCommand::parse("/resume 3", PREFIX), Some(BotCommand::Resume(TaskId(3))));
        assert_eq!(BotCommand::parse("/stop 12", PREFIX), Some(BotCommand::Stop(TaskId(12))));
        assert_eq!(BotCommand::parse("/tasks", PREFIX), Some(BotCommand::Tasks));
    }

    #[test]
    fn test_parse_speed() {
        assert_eq!(
            BotCommand::parse("/speed 2 0.5", PREFIX),
            Some(BotCommand::Speed(SpeedArgs {
                id: TaskId(2),
                delay_secs: 0.5,
            }))
        );
    }

    #[test]
    fn test_parse_bad_arguments_give_usage() {
        assert!(matches!(BotCommand::parse("/pause", PREFIX), Some(BotCommand::Usage(_))));
        assert!(matches!(BotCommand::parse("/stop abc", PREFIX), Some(BotCommand::Usage(_))));
        assert!(matches!(BotCommand::parse("/speed 1", PREFIX), Some(BotCommand::Usage(_))));
        assert!(matches!(BotCommand::parse("/speed 1 fast", PREFIX), Some(BotCommand::Usage(_))));
        assert!(matches!(BotCommand::parse("/send only-target", PREFIX), Some(BotCommand::Usage(_))));
    }

    #[test]
    fn test_parse_send_multiline() {
        assert_eq!(
            BotCommand::parse("/send thread-9\nfirst line\nsecond line", PREFIX),
            Some(BotCommand::Send(SendArgs {
                target: "thread-9".to_owned(),
                body: "first line\nsecond line".to_owned(),
            }))
        );
    }

    #[test]
    fn test_parse_attack_alias() {
        assert!(matches!(
            BotCommand::parse("/attack t hello", PREFIX),
            Some(BotCommand::Send(_))
        ));
    }

    #[test]
    fn test_parse_send_file() {
        assert_eq!(
            BotCommand::parse("/sendfile t msgs/list.txt", PREFIX),
            Some(BotCommand::SendFile(SendFileArgs {
                target: "t".to_owned(),
                path: PathBuf::from("msgs/list.txt"),
            }))
        );
    }

    #[test]
    fn test_parse_login_session() {
        assert_eq!(
            BotCommand::parse("/login_session abc%3A123", PREFIX),
            Some(BotCommand::LoginSession("abc%3A123".to_owned()))
        );
        assert!(matches!(
            BotCommand::parse("/login_session", PREFIX),
            Some(BotCommand::Usage(_))
        ));
        assert!(matches!(
            BotCommand::parse("/login_session a b", PREFIX),
            Some(BotCommand::Usage(_))
        ));
        assert!(!BotCommand::LoginSession("x".to_owned()).is_public());
        assert_eq!(
            BotCommand::LoginSession("secret".to_owned()).to_string(),
            "login_session <redacted>"
        );
    }

    #[test]
    fn test_parse_not_a_command() {
        assert_eq!(BotCommand::parse("hello there", PREFIX), None);
        assert_eq!(BotCommand::parse("/unknown 1", PREFIX), None);
    }

    #[test]
    fn test_parse_custom_prefix() {
        assert_eq!(BotCommand::parse("!relay tasks", "!relay"), Some(BotCommand::Tasks));
        assert_eq!(BotCommand::parse("/tasks", "!relay"), None);
    }

    #[test]
    fn test_parse_case_insensitive_and_whitespace() {
        assert_eq!(BotCommand::parse("  /TASKS  ", PREFIX), Some(BotCommand::Tasks));
        assert_eq!(BotCommand::parse("/Pause   4 ", PREFIX), Some(BotCommand::Pause(TaskId(4))));
    }

    #[test]
    fn test_public_commands() {
        assert!(BotCommand::Help.is_public());
        assert!(!BotCommand::Tasks.is_public());
    }
}
