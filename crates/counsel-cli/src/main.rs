//! `counsel`: terminal client for a legal-advice assistant.

mod app;
mod cli;
mod render;
mod repl;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use counsel_core::storage::{delete_session, list_sessions, FileStorage, HistoryStore};
use counsel_core::view::SubmitOutcome;
use counsel_core::Role;

use crate::app::{App, CliError};
use crate::cli::{Cli, Command};

/// Exit code after Ctrl-C, as a shell reports SIGINT.
const INTERRUPTED: u8 = 130;

/// How long shutdown waits for blocking work, such as a chat request the
/// user stopped waiting for.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level()))
        .format_timestamp_millis()
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let code = match runtime.block_on(run(&cli)) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    };
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    code
}

async fn run(cli: &Cli) -> Result<ExitCode, CliError> {
    let app = App::from_cli(cli)?;

    match cli.command() {
        Command::Chat => {
            repl::run(&app).await?;
        }
        Command::Ask { question } => {
            let view = app.chat_view();
            let Some(outcome) = render::submit_and_render(&view, &question.join(" ")).await else {
                return Ok(ExitCode::from(INTERRUPTED));
            };
            if matches!(outcome, SubmitOutcome::Failed { .. }) {
                return Ok(ExitCode::FAILURE);
            }
            if !app.ephemeral && !app.resumed {
                println!("Continue with: counsel --session {}", app.session);
            }
        }
        Command::Speak { text } => {
            let text = if text.is_empty() {
                last_answer(&app.history())
                    .ok_or("nothing to read: the session has no answer yet")?
            } else {
                text.join(" ")
            };
            let playback = app.speech_player().speak(&text).await?;
            tokio::task::spawn_blocking(move || playback.wait()).await?;
        }
        Command::History => {
            require_session(&app)?;
            print!("{}", render::format_turns(app.history().load().turns()));
        }
        Command::Sessions => {
            for id in list_sessions(&app.data_dir)? {
                let conversation =
                    HistoryStore::new(Arc::new(FileStorage::new(&app.data_dir, &id))).load();
                let title = conversation.first_user_message().unwrap_or("");
                println!("{}  {:>3} turns  {}", id, conversation.len(), preview(title, 40));
            }
        }
        Command::Reset => {
            require_session(&app)?;
            delete_session(&app.data_dir, &app.session)?;
            println!("{} {}", render::RESET_LABEL, app.session);
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Commands that act on stored data need an existing session.
fn require_session(app: &App) -> Result<(), CliError> {
    if app.resumed {
        Ok(())
    } else {
        Err("this command needs --session <id> (see `counsel sessions`)".into())
    }
}

fn last_answer(history: &HistoryStore) -> Option<String> {
    history
        .load()
        .turns()
        .iter()
        .rev()
        .find(|turn| turn.role == Role::Assistant)
        .map(|turn| turn.content.clone())
}

/// First line of `text`, cut to `max` characters.
fn preview(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or("");
    if line.chars().count() > max {
        let cut: String = line.chars().take(max).collect();
        format!("{cut}…")
    } else {
        line.to_string()
    }
}
