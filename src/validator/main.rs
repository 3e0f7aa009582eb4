//! Standalone validator for message list files.
//!
//! Checks a `.txt` message file the way the bot would before starting
//! a task, and optionally checks that a saved session file is readable.

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;

use relay_bot::config::{MAX_MESSAGE_LENGTH, MessageList};
use relay_bot::driver::SessionState;

/// Message list validator.
#[derive(Parser, Debug)]
#[command(name = "validate_messages")]
#[command(about = "Validates message list files for the relay bot")]
#[command(version)]
struct Args {
    /// Path to the message file to validate.
    #[arg(short, long, default_value = "messages.txt")]
    file: String,

    /// Also check that this session file parses.
    #[arg(short, long)]
    session: Option<String>,

    /// Show every message with its length.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let messages_ok = validate_messages(&args.file, args.verbose);
    let session_ok = args.session.as_deref().is_none_or(validate_session);

    if messages_ok && session_ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn validate_messages(path: &str, verbose: bool) -> bool {
    println!("Validating: {path}\n");

    let list = match MessageList::load_from_file(path) {
        Ok(list) => list,
        Err(e) => {
            eprintln!("✗ Failed to load messages: {e}");
            return false;
        }
    };

    if list.is_empty() {
        println!("✗ No messages found (blank lines and # comments are skipped)");
        return false;
    }

    let mut errors = 0;
    let mut warnings = 0;
    let warn_threshold = MAX_MESSAGE_LENGTH * 90 / 100;

    for (msg, result) in list.iter().zip(list.validate_all()) {
        let char_count = msg.char_count();

        if verbose {
            println!(
                "line {}: \"{}\" ({} chars)",
                msg.line,
                truncate(&msg.text, 40),
                char_count
            );
        }

        match result {
            Ok(()) if char_count > warn_threshold => {
                warnings += 1;
                if verbose {
                    println!(
                        "  ⚠ Warning: {char_count} chars is close to the {MAX_MESSAGE_LENGTH} char limit"
                    );
                }
            }
            Ok(()) => {
                if verbose {
                    println!("  ✓ OK");
                }
            }
            Err(e) => {
                errors += 1;
                println!("  ✗ Error: {e}");
            }
        }
    }

    println!();

    let total = list.len();
    if errors == 0 {
        println!("✓ All {total} messages are valid!");
        if warnings > 0 {
            println!("  ({warnings} warning(s) - messages close to character limit)");
        }
        true
    } else {
        println!("✗ Validation failed: {errors} error(s) in {total} messages");
        println!("  Valid: {}/{total}", total - errors);
        false
    }
}

fn validate_session(path: &str) -> bool {
    match SessionState::load(Path::new(path)) {
        Ok(session) if session.value().is_object() => {
            println!("✓ Session file is readable: {path}");
            true
        }
        Ok(_) => {
            println!("✗ Session file must contain a JSON object: {path}");
            false
        }
        Err(e) => {
            println!("✗ {e}");
            false
        }
    }
}

/// Truncates a string for display.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_owned()
    } else {
        format!("{}...", s.chars().take(max_len).collect::<String>())
    }
}
