//! Interactive chat REPL
//!
//! Renders the transcript, reads prompts and turns `/up`, `/down` and the
//! curation prompt into session events.

use anyhow::Result;
use crossterm::{execute, style::{Color, Print, ResetColor, SetForegroundColor}};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, IsTerminal};
use std::time::Duration;

use super::session::{CurationState, FeedbackAck, Session, WriteStatus};
use crate::memory::Feedback;

/// What one line of input asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Prompt(String),
    Curation(String),
    Feedback { record_id: Option<i64>, positive: bool },
    Skip,
    History,
    Help,
    Exit,
    Unknown(String),
    Empty,
}

/// Classify a line. While curation is pending, plain text is the correction,
/// kept as typed; a `/word` that is not a known command is treated as text too.
pub fn parse_input(line: &str, awaiting_curation: bool) -> ReplCommand {
    let input = line.trim();
    if input.is_empty() {
        return ReplCommand::Empty;
    }

    if let Some(rest) = input.strip_prefix('/') {
        let mut parts = rest.split_whitespace();
        let cmd = parts.next().unwrap_or("").to_lowercase();
        let arg = parts.next();
        let parsed = match cmd.as_str() {
            "up" | "down" => match arg.map(|a| a.trim_start_matches('#').parse::<i64>()) {
                Some(Err(_)) => ReplCommand::Unknown(input.to_string()),
                Some(Ok(id)) => ReplCommand::Feedback { record_id: Some(id), positive: cmd == "up" },
                None => ReplCommand::Feedback { record_id: None, positive: cmd == "up" },
            },
            "skip" => ReplCommand::Skip,
            "history" => ReplCommand::History,
            "help" | "?" => ReplCommand::Help,
            "exit" | "quit" => ReplCommand::Exit,
            _ => ReplCommand::Unknown(input.to_string()),
        };
        return match parsed {
            ReplCommand::Unknown(_) if awaiting_curation => ReplCommand::Curation(line.to_string()),
            other => other,
        };
    }

    if awaiting_curation {
        return ReplCommand::Curation(line.to_string());
    }

    if input == "exit" || input == "quit" {
        ReplCommand::Exit
    } else {
        ReplCommand::Prompt(input.to_string())
    }
}

/// Print colored output
fn print_colored(text: &str, color: Color) {
    let _ = execute!(
        io::stdout(),
        SetForegroundColor(color),
        Print(text),
        ResetColor
    );
}

/// Print a dimmed line
fn print_dim(text: &str) {
    print_colored(text, Color::DarkGrey);
}

/// Print a success message
fn print_success(text: &str) {
    print_colored(text, Color::Green);
}

/// Print an info message
fn print_info(text: &str) {
    print_colored(text, Color::Cyan);
}

/// Print an error message
fn print_error(text: &str) {
    print_colored(text, Color::Red);
}

fn print_banner(model: &str) {
    println!();
    println!("\x1b[1mAI Chat Assistant\x1b[0m  \x1b[36m{}\x1b[0m", model);
    print_dim("  Type a question. /up or /down rates the last answer. /help for more.\n");
    println!();
}

fn print_help() {
    println!();
    println!("  \x1b[36m/up [id]\x1b[0m     Thumbs up (latest answer by default)");
    println!("  \x1b[36m/down [id]\x1b[0m   Thumbs down, then type a better answer");
    println!("  \x1b[36m/skip\x1b[0m        Leave curation without saving");
    println!("               (while curating, any other text is saved as typed)");
    println!("  \x1b[36m/history\x1b[0m     Show this session's transcript");
    println!("  \x1b[36m/exit\x1b[0m        Quit");
    println!();
}

fn print_transcript(session: &Session) {
    println!();
    for entry in session.transcript().entries() {
        match entry.record_id {
            None => print_info(&format!(
                "{} ❯ {}\n",
                entry.timestamp.with_timezone(&chrono::Local).format("%H:%M"),
                entry.content
            )),
            Some(id) => {
                let marker = entry.feedback.map(Feedback::symbol).unwrap_or(" ");
                let reuse_note = if entry.reused_context { "  (used an earlier approved answer)" } else { "" };
                println!("{}", entry.content);
                print_dim(&format!("  #{} {}{}\n", id, marker, reuse_note));
                if let Some(curated) = &entry.curated_response {
                    print_dim(&format!("  curated: {}\n", curated));
                }
            }
        }
    }
    print_dim(&format!("  {}\n", session.transcript().summary()));
    println!();
}

/// Create a spinner shown while the model works
fn create_thinking_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner:.dim} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message("Thinking...");
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

async fn cancellable<F, T>(fut: F) -> Option<T>
where
    F: std::future::Future<Output = T>,
{
    tokio::pin!(fut);
    tokio::select! {
        biased;
        _ = tokio::signal::ctrl_c() => None,
        r = &mut fut => Some(r),
    }
}

fn print_feedback_ack(ack: &FeedbackAck) {
    print_success("Thanks for your feedback!\n");
    if ack.status == WriteStatus::NoSuchRecord {
        print_dim(&format!("  (no stored answer #{})\n", ack.record_id));
    }
}

fn print_curation_prompt(state: &CurationState) {
    if let CurationState::AwaitingCuration { record_id, original_prompt } = state {
        println!();
        print_info(&format!("What should the answer to #{} have been?\n", record_id));
        if !original_prompt.is_empty() {
            print_dim(&format!("  Question: {}\n", original_prompt));
        }
        print_dim("  Type the better answer, or /skip.\n");
    }
}

/// Apply one parsed command. Returns `false` when the loop should stop.
async fn handle_command(cmd: ReplCommand, session: &mut Session) -> bool {
    match cmd {
        ReplCommand::Empty => {}
        ReplCommand::Exit => return false,
        ReplCommand::Help => print_help(),
        ReplCommand::History => print_transcript(session),
        ReplCommand::Unknown(input) => {
            print_error(&format!("Unknown command: {}\n", input));
        }
        ReplCommand::Skip => {
            if session.cancel_curation() {
                print_dim("  Curation skipped.\n");
            }
        }
        ReplCommand::Feedback { record_id, positive } => {
            let target = record_id.or_else(|| session.transcript().last_record_id());
            match target {
                Some(id) => {
                    let ack = session.give_feedback(id, positive);
                    print_feedback_ack(&ack);
                    print_curation_prompt(session.state());
                }
                None => print_dim("  Nothing to rate yet.\n"),
            }
        }
        ReplCommand::Curation(text) => match session.submit_curation(&text) {
            Ok(ack) => {
                print_success(&format!("✓ Saved a better answer for #{}\n", ack.record_id));
                if ack.status == WriteStatus::NoSuchRecord {
                    print_dim(&format!("  (no stored answer #{})\n", ack.record_id));
                }
            }
            Err(e) => print_error(&format!("✗ {}\n", e)),
        },
        ReplCommand::Prompt(prompt) => {
            let spinner = create_thinking_spinner();
            let result = cancellable(session.submit_prompt(&prompt)).await;
            spinner.finish_and_clear();

            match result {
                None => print_dim("\n⚠ Cancelled.\n"),
                Some(Err(e)) => print_error(&format!("✗ Error: {:#}\n", e)),
                Some(Ok(outcome)) => {
                    println!();
                    println!("{}", outcome.response);
                    let reuse_note = if outcome.reused_context.is_some() {
                        "  (used an earlier approved answer)"
                    } else {
                        ""
                    };
                    print_dim(&format!("  #{}  /up  /down{}\n", outcome.record_id, reuse_note));
                    println!();
                }
            }
        }
    }
    true
}

/// Run the interactive chat session
pub async fn run_interactive(mut session: Session) -> Result<()> {
    if !io::stdin().is_terminal() {
        return run_non_interactive(session).await;
    }

    print_banner(session.responder().model_name());

    let config = rustyline::Config::builder()
        .edit_mode(rustyline::EditMode::Emacs)
        .auto_add_history(true)
        .build();
    let mut rl = rustyline::DefaultEditor::with_config(config)?;

    loop {
        let prompt = if session.is_awaiting_curation() {
            "\x1b[33m✎\x1b[0m ".to_string()
        } else {
            "\x1b[32m❯\x1b[0m ".to_string()
        };

        match rl.readline(&prompt) {
            Ok(line) => {
                let cmd = parse_input(&line, session.is_awaiting_curation());
                if !handle_command(cmd, &mut session).await {
                    break;
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(err) => {
                print_error(&format!("Error: {}\n", err));
                break;
            }
        }
    }

    print_dim(&format!("  {}\n", session.transcript().summary()));
    Ok(())
}

/// Non-interactive mode: one command per stdin line, no line editing
async fn run_non_interactive(mut session: Session) -> Result<()> {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let cmd = parse_input(&line, session.is_awaiting_curation());
        if !handle_command(cmd, &mut session).await {
            break;
        }
    }
    Ok(())
}
