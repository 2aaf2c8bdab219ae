//! Terminal rendering of the chat view.

use std::future::Future;
use std::io::{self, Write};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;

use counsel_core::backend::Backend;
use counsel_core::view::{ChatView, FollowUpOutcome, IgnoreReason, SubmitOutcome};
use counsel_core::{FollowUp, Role, Turn, ViewEvent};

pub const TITLE: &str = "⚖️ 법률 상담 도우미";
pub const INPUT_HINT: &str = "자세히 이야기할수록 더 정확한 조언을 받을 수 있어요";
pub const REPLY_LABEL: &str = "🧑‍⚖️ AI 조언";
pub const THINKING: &str = "생각 중...";
pub const SPEAK_LABEL: &str = "🔊 음성 듣기";
pub const RESET_LABEL: &str = "🔄 새 사건 시작하기";

pub fn format_follow_ups(follow_ups: &[FollowUp]) -> String {
    follow_ups
        .iter()
        .enumerate()
        .map(|(i, follow_up)| {
            let suffix = if follow_up.is_link() { "  ↗" } else { "" };
            format!("  /{:<2} {}{}\n", i + 1, follow_up.label, suffix)
        })
        .collect()
}

pub fn format_turns(turns: &[Turn]) -> String {
    if turns.is_empty() {
        return "(no conversation yet)\n".to_string();
    }
    turns
        .iter()
        .map(|turn| {
            let who = match turn.role {
                Role::User => "나",
                Role::Assistant => "AI",
            };
            format!("[{}] {}\n", who, turn.content)
        })
        .collect()
}

fn flush() {
    let _ = io::stdout().flush();
}

pub const STOPPED_WAITING: &str = "(stopped waiting; the answer is saved to the history when it arrives)";

/// Resolve to `work`'s output, or `None` if `interrupt` fires first.
///
/// `work` is polled first, so it has always started by the time an
/// interrupt is noticed.
pub async fn until_interrupted<T>(
    work: impl Future<Output = T>,
    interrupt: impl Future<Output = ()>,
) -> Option<T> {
    tokio::select! {
        biased;
        value = work => Some(value),
        _ = interrupt => None,
    }
}

/// Resolves on Ctrl-C.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Could not listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Submit `input` and print the reply as it is revealed.
///
/// Returns `None` if Ctrl-C stopped the wait. The request itself keeps
/// running and settles the view when it returns.
pub async fn submit_and_render<B: Backend>(
    view: &ChatView<B>,
    input: &str,
) -> Option<SubmitOutcome> {
    let events = view.subscribe();
    if !input.trim().is_empty() && !view.is_busy() {
        println!("{THINKING}");
    }

    let Some(outcome) = until_interrupted(view.submit(input), ctrl_c()).await else {
        println!("{STOPPED_WAITING}");
        return None;
    };
    render_outcome(view, &outcome, events).await;
    Some(outcome)
}

/// Choose a follow-up and print whatever it produced.
///
/// Returns `None` if Ctrl-C stopped the wait for a prompt's answer.
pub async fn follow_up_and_render<B: Backend>(
    view: &ChatView<B>,
    index: usize,
) -> Option<FollowUpOutcome> {
    let events = view.subscribe();
    let is_prompt = view
        .follow_ups()
        .get(index)
        .is_some_and(|follow_up| !follow_up.is_link());
    if is_prompt && !view.is_busy() {
        println!("{THINKING}");
    }

    let Some(outcome) = until_interrupted(view.select_follow_up(index), ctrl_c()).await else {
        println!("{STOPPED_WAITING}");
        return None;
    };
    match &outcome {
        FollowUpOutcome::Submitted(submitted) => render_outcome(view, submitted, events).await,
        FollowUpOutcome::OpenLink(url) => match counsel_core::launcher::open_url(url) {
            Ok(()) => println!("Opened {url}"),
            Err(e) => {
                log::warn!("Could not open link: {}", e);
                println!("{url}");
            }
        },
        FollowUpOutcome::NotFound => println!("No follow-up /{}", index + 1),
    }
    Some(outcome)
}

async fn render_outcome<B: Backend>(
    view: &ChatView<B>,
    outcome: &SubmitOutcome,
    events: Receiver<ViewEvent>,
) {
    match outcome {
        SubmitOutcome::Ignored(IgnoreReason::Blank) | SubmitOutcome::Discarded => {}
        SubmitOutcome::Ignored(IgnoreReason::Busy) => {
            println!("(still waiting for the previous answer)");
        }
        SubmitOutcome::Answered { .. } | SubmitOutcome::Failed { .. } => {
            println!("\n{REPLY_LABEL}");
            stream_reply(view, events).await;
            println!();
            print!("{}", format_follow_ups(view.follow_ups()));
            println!("  /speak {SPEAK_LABEL}");
            println!("  /reset {RESET_LABEL}");
            println!();
        }
    }
}

/// Print reveal events until the reply is complete. Ctrl-C skips ahead.
async fn stream_reply<B: Backend>(view: &ChatView<B>, mut events: Receiver<ViewEvent>) {
    let mut shown = String::new();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ViewEvent::ReplyDelta { text }) => {
                    print!("{text}");
                    flush();
                    shown.push_str(&text);
                }
                Ok(ViewEvent::ReplyComplete { text }) => {
                    match text.strip_prefix(shown.as_str()) {
                        Some(rest) => print!("{rest}"),
                        None => print!("\n{text}"),
                    }
                    println!();
                    break;
                }
                Ok(ViewEvent::RevealCancelled) | Ok(ViewEvent::ConversationReset) => {
                    println!();
                    break;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    log::debug!("Renderer missed {} events", missed);
                }
                Err(RecvError::Closed) => break,
            },
            _ = ctrl_c() => {
                view.finish_reveal();
            }
        }
    }
}
