//! Command handler implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::types::{BotCommand, CommandResult, SendArgs, SendFileArgs, SpeedArgs};
use crate::config::{BotSettings, MessageList};
use crate::driver::SessionState;
use crate::tasks::{TaskError, TaskId, TaskInfo, TaskRegistry, TaskRequest, TaskStatus};

/// Handles bot commands on behalf of the owner.
pub struct CommandHandler {
    /// Command prefix (e.g., "/").
    prefix: String,

    /// The only sender allowed to run task commands.
    owner_id: i64,

    /// Path of the persisted session handed to new drivers.
    session_path: PathBuf,

    /// Delay for newly created tasks, in seconds.
    default_delay_secs: f64,

    /// Shared task registry.
    registry: Arc<TaskRegistry>,
}

impl CommandHandler {
    /// Creates a new command handler.
    #[must_use]
    pub fn new(settings: &BotSettings, registry: Arc<TaskRegistry>) -> Self {
        Self {
            prefix: settings.command_prefix.clone(),
            owner_id: settings.owner_id,
            session_path: settings.session_path(),
            default_delay_secs: settings.default_delay_secs,
            registry,
        }
    }

    /// Tries to parse and execute a command from a message.
    ///
    /// Returns `None` if the message is not a command.
    pub async fn try_handle(&self, sender_id: i64, message_text: &str) -> Option<CommandResult> {
        let command = BotCommand::parse(message_text, &self.prefix)?;

        if !command.is_public() && sender_id != self.owner_id {
            warn!("Rejected '{}' from unauthorized sender {}", command.name(), sender_id);
            return Some(CommandResult::error("❌ Not authorized"));
        }

        debug!("Handling command: {}", command);
        let result = self.execute(command).await;
        info!("Command result: success={}", result.success);

        Some(result)
    }

    /// Executes a parsed command.
    async fn execute(&self, command: BotCommand) -> CommandResult {
        match command {
            BotCommand::Start => self.handle_start(),
            BotCommand::Help => self.handle_help(),
            BotCommand::LoginSession(session_id) => self.handle_login_session(&session_id),
            BotCommand::Send(args) => self.handle_send(args).await,
            BotCommand::SendFile(args) => self.handle_send_file(args).await,
            BotCommand::Pause(id) => self.handle_pause(id).await,
            BotCommand::Resume(id) => self.handle_resume(id).await,
            BotCommand::Stop(id) => self.handle_stop(id).await,
            BotCommand::Speed(args) => self.handle_speed(args).await,
            BotCommand::Tasks => self.handle_tasks().await,
            BotCommand::Clear => self.handle_clear().await,
            BotCommand::Usage(usage) => {
                CommandResult::error(format!("Usage: {}{usage}", self.prefix))
            }
        }
    }

    fn handle_start(&self) -> CommandResult {
        CommandResult::success(format!(
            "🎧 Relay bot online\nUse {}help to see commands.",
            self.prefix
        ))
    }

    fn handle_help(&self) -> CommandResult {
        let mut lines = vec!["Available commands:".to_owned()];

        for (cmd, alias, desc) in BotCommand::all_commands() {
            let alias_str = if alias.is_empty() {
                String::new()
            } else {
                format!(" {alias}")
            };
            lines.push(format!("  {}{cmd}{alias_str} - {desc}", self.prefix));
        }

        CommandResult::success(lines.join("\n"))
    }

    fn handle_login_session(&self, session_id: &str) -> CommandResult {
        match SessionState::from_session_id(session_id).save(&self.session_path) {
            Ok(()) => {
                info!("Session saved to {}", self.session_path.display());
                CommandResult::success("✅ Session saved")
            }
            Err(e) => {
                warn!("Failed to save session: {}", e);
                CommandResult::error(format!("❌ {e}"))
            }
        }
    }

    async fn handle_send(&self, args: SendArgs) -> CommandResult {
        let messages = MessageList::parse(&args.body);
        self.start_task(args.target, messages).await
    }

    async fn handle_send_file(&self, args: SendFileArgs) -> CommandResult {
        match MessageList::load_from_file(&args.path) {
            Ok(messages) => self.start_task(args.target, messages).await,
            Err(e) => CommandResult::error(format!("❌ {e}")),
        }
    }

    async fn start_task(&self, target: String, messages: MessageList) -> CommandResult {
        if let Err(e) = messages.validate() {
            return CommandResult::error(format!("❌ {e}"));
        }

        let session = match load_session(&self.session_path) {
            Ok(session) => session,
            Err(message) => return CommandResult::error(message),
        };

        let count = messages.len();
        let request = TaskRequest {
            target,
            steps: messages.into_steps(),
            delay_secs: self.default_delay_secs,
        };

        match self.registry.create(request, &session).await {
            Ok(id) => CommandResult::success(format!(
                "🚀 Task started\nTask ID: {id}\nMessages: {count}"
            )),
            Err(e) => task_error(&e),
        }
    }

    async fn handle_pause(&self, id: TaskId) -> CommandResult {
        match self.registry.request_pause(id).await {
            Ok(()) => CommandResult::success(format!("⏸️ Paused: {id}")),
            Err(e) => task_error(&e),
        }
    }

    async fn handle_resume(&self, id: TaskId) -> CommandResult {
        match self.registry.request_resume(id).await {
            Ok(()) => CommandResult::success(format!("▶️ Resumed: {id}")),
            Err(e) => task_error(&e),
        }
    }

    async fn handle_stop(&self, id: TaskId) -> CommandResult {
        match self.registry.request_stop(id).await {
            Ok(info) => CommandResult::success(format!(
                "🛑 Stopped: {id} ({}/{} sent)",
                info.cursor, info.total_steps
            )),
            Err(e) => task_error(&e),
        }
    }

    async fn handle_speed(&self, args: SpeedArgs) -> CommandResult {
        match self.registry.set_delay(args.id, args.delay_secs).await {
            Ok(()) => CommandResult::success(format!("⚡ Speed updated: {}s", args.delay_secs)),
            Err(e) => task_error(&e),
        }
    }

    async fn handle_tasks(&self) -> CommandResult {
        let tasks = self.registry.list().await;
        if tasks.is_empty() {
            return CommandResult::success("No tasks");
        }

        let mut lines = vec!["📋 Tasks:".to_owned()];
        lines.extend(tasks.iter().map(format_task));
        CommandResult::success(lines.join("\n"))
    }

    async fn handle_clear(&self) -> CommandResult {
        let removed = self.registry.prune_finished().await;
        CommandResult::success(format!("🧹 Removed {removed} finished task(s)"))
    }
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler")
            .field("prefix", &self.prefix)
            .field("session_path", &self.session_path)
            .finish_non_exhaustive()
    }
}

/// Loads the persisted session, mapping failure to a user-facing message.
fn load_session(path: &Path) -> Result<SessionState, String> {
    if !path.exists() {
        return Err(format!("❌ Login first (no session at {})", path.display()));
    }
    SessionState::load(path).map_err(|e| format!("❌ {e}"))
}

fn task_error(err: &TaskError) -> CommandResult {
    match err {
        TaskError::NotFound(_) => CommandResult::error("Task not found"),
        _ => CommandResult::error(format!("❌ {err}")),
    }
}

/// Renders one line of the task listing.
fn format_task(info: &TaskInfo) -> String {
    let mut line = format!(
        "- {} | {} | {}/{} | since {}",
        info.id,
        info.status,
        info.cursor,
        info.total_steps,
        info.started_at.format("%H:%M:%S")
    );

    if info.failed_steps > 0 {
        line.push_str(&format!(" | {} failed", info.failed_steps));
    }
    if info.status == TaskStatus::Failed
        && let Some(reason) = &info.last_error
    {
        line.push_str(&format!(" | {reason}"));
    }
    line
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::tasks::ResourceManager;
    use crate::tasks::mock::{Behavior, MockFactory, Recorder};

    const OWNER: i64 = 1000;

    struct Fixture {
        handler: CommandHandler,
        registry: Arc<TaskRegistry>,
        recorder: Recorder,
        dir: tempfile::TempDir,
    }

    fn fixture(with_session: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = BotSettings::new(OWNER);
        settings.sessions_dir = dir.path().to_path_buf();
        settings.default_delay_secs = 0.0;

        if with_session {
            SessionState::new(json!({"cookies": []}))
                .save(settings.session_path())
                .unwrap();
        }

        let recorder = Recorder::new();
        let registry = Arc::new(TaskRegistry::new(ResourceManager::new(Arc::new(
            MockFactory::new(recorder.clone()),
        ))));
        let handler = CommandHandler::new(&settings, Arc::clone(&registry));

        Fixture {
            handler,
            registry,
            recorder,
            dir,
        }
    }

    async fn run(fx: &Fixture, text: &str) -> CommandResult {
        fx.handler
            .try_handle(OWNER, text)
            .await
            .expect("should be a command")
    }

    async fn wait_idle(registry: &TaskRegistry) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while registry.list().await.iter().any(|t| !t.status.is_terminal()) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("tasks should finish");
    }

    #[tokio::test]
    async fn test_non_command_is_ignored() {
        let fx = fixture(true);
        assert!(fx.handler.try_handle(OWNER, "just chatting").await.is_none());
    }

    #[tokio::test]
    async fn test_rejects_other_senders() {
        let fx = fixture(true);
        let result = fx.handler.try_handle(7, "/tasks").await.unwrap();
        assert!(!result.success);
        assert!(result.message.contains("Not authorized"));

        let help = fx.handler.try_handle(7, "/help").await.unwrap();
        assert!(help.success);
    }

    #[tokio::test]
    async fn test_send_requires_session() {
        let fx = fixture(false);
        let result = run(&fx, "/send t hello").await;
        assert!(!result.success);
        assert!(result.message.contains("Login first"));
        assert_eq!(fx.recorder.opens(), 0);
    }

    #[tokio::test]
    async fn test_send_starts_task_and_lists_it() {
        let fx = fixture(true);
        let result = run(&fx, "/send thread-1\nfirst\nsecond").await;
        assert!(result.success, "{}", result.message);
        assert!(result.message.contains("Task ID: 1"));
        assert!(result.message.contains("Messages: 2"));

        wait_idle(&fx.registry).await;
        assert_eq!(fx.recorder.attempts(), vec!["first", "second"]);

        let listing = run(&fx, "/tasks").await;
        assert!(listing.message.contains("- 1 | completed | 2/2"));

        let cleared = run(&fx, "/clear").await;
        assert!(cleared.message.contains("Removed 1"));
        assert_eq!(run(&fx, "/tasks").await.message, "No tasks");
    }

    #[tokio::test]
    async fn test_login_session_enables_send() {
        let fx = fixture(false);
        assert!(!run(&fx, "/send t hello").await.success);

        let saved = run(&fx, "/login_session abc123").await;
        assert!(saved.success, "{}", saved.message);

        let session = SessionState::load(fx.dir.path().join("default_state.json")).unwrap();
        assert_eq!(session.value()["cookies"][0]["name"], "sessionid");
        assert_eq!(session.value()["cookies"][0]["value"], "abc123");

        let started = run(&fx, "/send t hello").await;
        assert!(started.success, "{}", started.message);
        wait_idle(&fx.registry).await;
        assert_eq!(fx.recorder.attempts(), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_login_session_is_owner_only() {
        let fx = fixture(false);
        let result = fx.handler.try_handle(7, "/login_session abc").await.unwrap();
        assert!(!result.success);
        assert!(!fx.dir.path().join("default_state.json").exists());
    }

    #[tokio::test]
    async fn test_send_file() {
        let fx = fixture(true);
        let path = fx.dir.path().join("messages.txt");
        std::fs::write(&path, "one\n# skip\ntwo\nthree\n").unwrap();

        let result = run(&fx, &format!("/sendfile t {}", path.display())).await;
        assert!(result.success, "{}", result.message);
        wait_idle(&fx.registry).await;
        assert_eq!(fx.recorder.attempts(), vec!["one", "two", "three"]);

        let rejected = run(&fx, "/sendfile t list.csv").await;
        assert!(!rejected.success);
    }

    #[tokio::test]
    async fn test_failed_task_shows_reason() {
        let fx = fixture(true);
        fx.recorder.on("boom", Behavior::Fatal);
        run(&fx, "/send t boom").await;
        wait_idle(&fx.registry).await;

        let listing = run(&fx, "/tasks").await;
        assert!(listing.message.contains("failed"));
        assert!(listing.message.contains("session died"));
    }

    #[tokio::test]
    async fn test_control_commands() {
        let fx = fixture(true);
        let gate = Arc::new(tokio::sync::Notify::new());
        fx.recorder.on("a", Behavior::Hold(Arc::clone(&gate)));

        run(&fx, "/send t a\nb\nc").await;
        assert!(run(&fx, "/speed 1 30").await.success);
        assert!(run(&fx, "/pause 1").await.success);

        let listing = run(&fx, "/tasks").await;
        assert!(listing.message.contains("| paused |"));

        assert!(run(&fx, "/resume 1").await.success);
        gate.notify_one();
        let stopped = run(&fx, "/stop 1").await;
        assert!(stopped.success);
        assert!(stopped.message.contains("Stopped: 1"));
        assert_eq!(fx.recorder.closes(), 1);

        let again = run(&fx, "/stop 1").await;
        assert!(!again.success);
        assert_eq!(again.message, "Task not found");
    }

    #[tokio::test]
    async fn test_invalid_speed_and_usage() {
        let fx = fixture(true);
        run(&fx, "/send t a\nb").await;

        let zero = run(&fx, "/speed 1 0").await;
        assert!(!zero.success);
        assert!(zero.message.contains("Invalid argument"));

        let usage = run(&fx, "/pause").await;
        assert!(!usage.success);
        assert_eq!(usage.message, "Usage: /pause <task_id>");

        fx.registry.shutdown().await;
    }
}
