//! Interactive chat loop.
//!
//! Plain lines are questions. A line ending in `\` continues on the next
//! line. Lines starting with `/` are commands:
//!
//! | Command      | Effect                                   |
//! |--------------|------------------------------------------|
//! | `/1` .. `/N` | Choose a follow-up                       |
//! | `/speak`     | Read the displayed answer aloud          |
//! | `/reset`     | Start a new case                         |
//! | `/history`   | Print the conversation                   |
//! | `/help`      | List commands                            |
//! | `/quit`      | Leave (also `/exit`, Ctrl-D, Ctrl-C)     |

use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use counsel_core::speech::SpeechPlayer;
use counsel_core::view::ChatView;
use counsel_core::HttpBackend;

use crate::app::{App, CliError};
use crate::render;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Submit(String),
    /// Zero-based follow-up index.
    FollowUp(usize),
    Speak,
    Reset,
    History,
    Help,
    Quit,
    Unknown(String),
}

impl ReplCommand {
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        let Some(command) = trimmed.strip_prefix('/') else {
            return ReplCommand::Submit(input.to_string());
        };

        match command {
            "speak" => ReplCommand::Speak,
            "reset" | "new" => ReplCommand::Reset,
            "history" => ReplCommand::History,
            "help" | "?" => ReplCommand::Help,
            "quit" | "exit" | "q" => ReplCommand::Quit,
            other => match other.parse::<usize>() {
                Ok(n) if n >= 1 => ReplCommand::FollowUp(n - 1),
                _ => ReplCommand::Unknown(trimmed.to_string()),
            },
        }
    }
}

const HELP: &str = "\
  <text>      ask a question (end a line with \\ to continue it)
  /1 .. /N    choose a follow-up
  /speak      read the answer aloud
  /reset      start a new case
  /history    show the conversation
  /quit       leave";

/// Join continuation lines: returns `None` while the input is incomplete.
fn accumulate(buffer: &mut String, line: &str) -> Option<String> {
    match line.strip_suffix('\\') {
        Some(head) => {
            buffer.push_str(head);
            buffer.push('\n');
            None
        }
        None => {
            buffer.push_str(line);
            Some(std::mem::take(buffer))
        }
    }
}

fn prompt(continuing: bool) {
    print!("{}", if continuing { ". " } else { "> " });
    let _ = std::io::stdout().flush();
}

pub async fn run(app: &App) -> Result<(), CliError> {
    let view = app.chat_view();
    let speech = app.speech_player();

    println!("{}", render::TITLE);
    println!("{}", render::INPUT_HINT);
    println!(
        "session {} · {} · /help for commands\n",
        app.session,
        app.backend_url()
    );

    let restored = view.snapshot().turns;
    if !restored.is_empty() {
        print!("{}", render::format_turns(&restored));
        println!();
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut buffer = String::new();

    loop {
        prompt(!buffer.is_empty());

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };
        let Some(input) = accumulate(&mut buffer, &line) else {
            continue;
        };

        match ReplCommand::parse(&input) {
            ReplCommand::Submit(text) => {
                render::submit_and_render(&view, &text).await;
            }
            ReplCommand::FollowUp(index) => {
                render::follow_up_and_render(&view, index).await;
            }
            ReplCommand::Speak => speak(&view, &speech).await,
            ReplCommand::Reset => {
                view.reset();
                println!("{}\n", render::RESET_LABEL);
            }
            ReplCommand::History => print!("{}", render::format_turns(&view.snapshot().turns)),
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Quit => break,
            ReplCommand::Unknown(command) => println!("Unknown command {command}; try /help"),
        }
    }

    if !app.ephemeral && !view.snapshot().turns.is_empty() {
        println!("Resume with: counsel --session {}", app.session);
    }
    Ok(())
}

async fn speak(view: &ChatView<Arc<HttpBackend>>, speech: &SpeechPlayer<Arc<HttpBackend>>) {
    let reply = view.snapshot().reply;
    if reply.trim().is_empty() {
        println!("(nothing to read yet)");
        return;
    }
    // Playback continues in the background
    if let Err(e) = speech.speak(&reply).await {
        log::warn!("Speech playback failed: {}", e);
    }
}
