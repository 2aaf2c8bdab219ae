//! Chat view state machine.
//!
//! # Overview
//!
//! The view owns everything a chat screen shows: the submission status, the
//! displayed reply, the session context and the conversation. It is driven
//! by three operations:
//!
//! - [`ChatView::submit`] sends typed text (or a follow-up prompt)
//! - [`ChatView::select_follow_up`] picks one of the canned follow-ups
//! - [`ChatView::reset`] starts a new case
//!
//! # Status
//!
//! ```text
//! Idle ──submit──▶ Submitting ──reply──▶ Idle
//!   ▲                  │
//!   │                  └──error──▶ Failed ──submit──▶ Submitting
//!   └────reset─────────────────────┘
//! ```
//!
//! Only one request may be in flight. Submissions made while `Submitting`
//! are ignored, including follow-ups.
//!
//! # Context
//!
//! The first non-blank submission becomes the context and is resent with
//! every later request. The request carrying the first question itself goes
//! out with `context: null`. The context is fixed even if that first request
//! fails, and only a reset clears it.
//!
//! # Reveal
//!
//! With the typewriter enabled the reply is revealed one character per
//! interval. A new submission, a reset, or dropping the view cancels it. Each
//! reveal carries a generation number so a tick racing with a cancel never
//! writes into the next reply.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::backend::{Backend, BackendError, ChatRequest};
use crate::conversation::{Conversation, Role, Turn};
use crate::event_bus::{EventBus, ViewEvent};
use crate::prompts::{default_follow_ups, FollowUp, FollowUpAction};
use crate::reveal::{Reveal, DEFAULT_INTERVAL};
use crate::storage::HistoryStore;

/// Shown in place of a reply when the chat request fails for any reason.
pub const FALLBACK_MESSAGE: &str = "문제가 발생했어요.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewStatus {
    /// Ready for a submission.
    Idle,
    /// A chat request is in flight.
    Submitting,
    /// The last request failed; the fallback message is displayed.
    Failed,
}

#[derive(Debug, Clone)]
pub struct ViewSettings {
    pub typewriter: bool,
    pub reveal_interval: Duration,
    pub fallback_message: String,
    pub follow_ups: Vec<FollowUp>,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            typewriter: true,
            reveal_interval: DEFAULT_INTERVAL,
            fallback_message: FALLBACK_MESSAGE.to_string(),
            follow_ups: default_follow_ups(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Input was empty or whitespace.
    Blank,
    /// A request is already in flight.
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The backend replied; the reply is displayed (or being revealed).
    Answered { reply: String },
    /// The request failed; the fallback message is displayed.
    Failed { message: String },
    /// The reply arrived after a reset and was thrown away.
    Discarded,
    /// Nothing was sent.
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUpOutcome {
    Submitted(SubmitOutcome),
    /// The follow-up is a link; the caller opens it.
    OpenLink(String),
    NotFound,
}

/// Point-in-time copy of the view state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSnapshot {
    pub status: ViewStatus,
    pub reply: String,
    pub context: Option<String>,
    pub turns: Vec<Turn>,
    pub revealing: bool,
}

struct ViewState {
    status: ViewStatus,
    reply: String,
    context: Option<String>,
    conversation: Conversation,
    reveal: Reveal,
    reveal_generation: u64,
    /// Bumped on reset; replies to an older epoch are discarded.
    epoch: u64,
}

impl ViewState {
    /// Cancel any running reveal and invalidate its pending ticks.
    fn stop_reveal(&mut self) -> bool {
        self.reveal_generation += 1;
        self.reveal.cancel()
    }
}

struct Shared {
    state: Mutex<ViewState>,
    events: EventBus,
    history: HistoryStore,
    settings: ViewSettings,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn show_reply(self: &Arc<Self>, epoch: u64, input: &str, reply: String) -> SubmitOutcome {
        let mut state = self.lock();
        state.status = ViewStatus::Idle;
        self.events.emit(ViewEvent::StatusChanged {
            status: ViewStatus::Idle,
        });

        if state.epoch != epoch {
            log::debug!("Discarding reply to a conversation that was reset");
            return SubmitOutcome::Discarded;
        }

        state.conversation.push(Turn::user(input));
        state.conversation.push(Turn::assistant(reply.clone()));
        self.persist(&state.conversation);

        state.reply.clear();
        self.events.emit(ViewEvent::ReplyCleared);

        if self.settings.typewriter && !reply.is_empty() {
            state.reveal_generation += 1;
            let generation = state.reveal_generation;
            let shared = Arc::clone(self);

            state.reveal = Reveal::start(
                reply.clone(),
                self.settings.reveal_interval,
                move |ch, last| {
                    let mut state = shared.lock();
                    if state.reveal_generation != generation {
                        return;
                    }
                    state.reply.push(ch);
                    shared.events.emit(ViewEvent::ReplyDelta {
                        text: ch.to_string(),
                    });
                    if last {
                        shared.events.emit(ViewEvent::ReplyComplete {
                            text: state.reply.clone(),
                        });
                    }
                },
            );
        } else {
            state.reply = reply.clone();
            self.events.emit(ViewEvent::ReplyComplete {
                text: reply.clone(),
            });
        }

        SubmitOutcome::Answered { reply }
    }

    fn show_failure(&self, epoch: u64) -> SubmitOutcome {
        let mut state = self.lock();

        if state.epoch != epoch {
            state.status = ViewStatus::Idle;
            self.events.emit(ViewEvent::StatusChanged {
                status: ViewStatus::Idle,
            });
            return SubmitOutcome::Discarded;
        }

        let message = self.settings.fallback_message.clone();
        state.status = ViewStatus::Failed;
        state.reply = message.clone();
        self.events.emit(ViewEvent::StatusChanged {
            status: ViewStatus::Failed,
        });
        self.events.emit(ViewEvent::ReplyComplete {
            text: message.clone(),
        });

        SubmitOutcome::Failed { message }
    }

    fn persist(&self, conversation: &Conversation) {
        if let Err(e) = self.history.save(conversation) {
            log::warn!("Failed to persist conversation: {}", e);
        }
    }
}

pub struct ChatView<B: Backend> {
    backend: Arc<B>,
    shared: Arc<Shared>,
}

impl<B: Backend> ChatView<B> {
    /// Create a view, restoring the conversation stored in `history`.
    ///
    /// The context of a restored conversation is its first user message.
    pub fn new(backend: B, history: HistoryStore, settings: ViewSettings) -> Self {
        let conversation = history.load();
        let context = conversation.first_user_message().map(str::to_string);
        if !conversation.is_empty() {
            log::info!("Restored conversation with {} turns", conversation.len());
        }

        let state = ViewState {
            status: ViewStatus::Idle,
            reply: String::new(),
            context,
            conversation,
            reveal: Reveal::idle(),
            reveal_generation: 0,
            epoch: 0,
        };

        Self {
            backend: Arc::new(backend),
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                events: EventBus::new(),
                history,
                settings,
            }),
        }
    }

    pub fn settings(&self) -> &ViewSettings {
        &self.shared.settings
    }

    pub fn follow_ups(&self) -> &[FollowUp] {
        &self.shared.settings.follow_ups
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.shared.events.subscribe()
    }

    pub fn status(&self) -> ViewStatus {
        self.shared.lock().status
    }

    pub fn is_busy(&self) -> bool {
        self.status() == ViewStatus::Submitting
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let state = self.shared.lock();
        ViewSnapshot {
            status: state.status,
            reply: state.reply.clone(),
            context: state.context.clone(),
            turns: state.conversation.turns().to_vec(),
            revealing: state.reveal.is_running(),
        }
    }

    /// Submit user text.
    ///
    /// Blank input and submissions while a request is in flight are ignored
    /// without touching any state.
    ///
    /// The request runs on its own task. Dropping the returned future stops
    /// waiting for it but not the request, which still settles the view.
    pub async fn submit(&self, input: &str) -> SubmitOutcome {
        if input.trim().is_empty() {
            return SubmitOutcome::Ignored(IgnoreReason::Blank);
        }

        let (request, epoch) = {
            let mut state = self.shared.lock();
            if state.status == ViewStatus::Submitting {
                log::debug!("Ignoring submission while a request is in flight");
                return SubmitOutcome::Ignored(IgnoreReason::Busy);
            }

            if state.stop_reveal() {
                self.shared.events.emit(ViewEvent::RevealCancelled);
            }
            state.status = ViewStatus::Submitting;

            let request = ChatRequest {
                user_input: input.to_string(),
                context: state.context.clone(),
            };
            if state.context.is_none() {
                state.context = Some(input.to_string());
            }
            (request, state.epoch)
        };
        self.shared.events.emit(ViewEvent::StatusChanged {
            status: ViewStatus::Submitting,
        });

        let backend = Arc::clone(&self.backend);
        let shared = Arc::clone(&self.shared);
        let input = input.to_string();
        let settle = tokio::spawn(async move {
            let result = match tokio::task::spawn_blocking(move || backend.chat(&request)).await {
                Ok(result) => result,
                Err(e) => Err(BackendError::Interrupted(e.to_string())),
            };

            match result {
                Ok(response) => shared.show_reply(epoch, &input, response.response),
                Err(e) => {
                    log::warn!("Chat request failed: {}", e);
                    shared.show_failure(epoch)
                }
            }
        });

        match settle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("Chat request task failed: {}", e);
                self.shared.show_failure(epoch)
            }
        }
    }

    /// Choose the follow-up at `index`.
    pub async fn select_follow_up(&self, index: usize) -> FollowUpOutcome {
        let action = match self.shared.settings.follow_ups.get(index) {
            Some(follow_up) => follow_up.action.clone(),
            None => return FollowUpOutcome::NotFound,
        };

        match action {
            FollowUpAction::Link { url } => FollowUpOutcome::OpenLink(url),
            FollowUpAction::Prompt { text } => FollowUpOutcome::Submitted(self.submit(&text).await),
        }
    }

    /// Start a new case: clear the conversation, the context and the
    /// displayed reply, and stop any reveal.
    ///
    /// A request still in flight keeps the view busy until it returns, and
    /// its reply is discarded.
    pub fn reset(&self) {
        let mut state = self.shared.lock();
        if state.stop_reveal() {
            self.shared.events.emit(ViewEvent::RevealCancelled);
        }

        state.epoch += 1;
        state.context = None;
        state.conversation.clear();
        state.reply.clear();
        self.shared.persist(&state.conversation);

        if state.status == ViewStatus::Failed {
            state.status = ViewStatus::Idle;
            self.shared.events.emit(ViewEvent::StatusChanged {
                status: ViewStatus::Idle,
            });
        }
        self.shared.events.emit(ViewEvent::ConversationReset);
    }

    /// Skip the rest of a running reveal and display the whole reply.
    ///
    /// Returns false if no reveal was running.
    pub fn finish_reveal(&self) -> bool {
        let mut state = self.shared.lock();
        if !state.stop_reveal() {
            return false;
        }

        let full = state
            .conversation
            .turns()
            .iter()
            .rev()
            .find(|turn| turn.role == Role::Assistant)
            .map(|turn| turn.content.clone())
            .unwrap_or_default();
        state.reply = full.clone();
        self.shared.events.emit(ViewEvent::ReplyComplete { text: full });
        true
    }
}

impl<B: Backend> Drop for ChatView<B> {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.stop_reveal();
        // A request still in flight settles into a view nobody shows
        state.epoch += 1;
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ChatResponse, SpeechRequest};
    use crate::session::SessionId;
    use crate::storage::FileStorage;
    use std::collections::VecDeque;
    use std::sync::mpsc;
    use tempfile::tempdir;

    #[derive(Default)]
    struct FakeBackend {
        replies: Mutex<VecDeque<Result<String, BackendError>>>,
        requests: Mutex<Vec<ChatRequest>>,
        gate: Option<Mutex<mpsc::Receiver<()>>>,
    }

    impl FakeBackend {
        fn replying(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
                ..Default::default()
            }
        }

        fn failing() -> Self {
            Self {
                replies: Mutex::new(VecDeque::from(vec![Err(BackendError::Transport(
                    "connection refused".to_string(),
                ))])),
                ..Default::default()
            }
        }

        /// Every request blocks until the returned sender releases it.
        fn gated(replies: &[&str]) -> (Self, mpsc::Sender<()>) {
            let (tx, rx) = mpsc::channel();
            let backend = Self {
                gate: Some(Mutex::new(rx)),
                ..Self::replying(replies)
            };
            (backend, tx)
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Backend for FakeBackend {
        fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(gate) = &self.gate {
                let _ = gate.lock().unwrap().recv();
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("default reply".to_string()))
                .map(|response| ChatResponse { response })
        }

        fn synthesize(&self, _request: &SpeechRequest) -> Result<Vec<u8>, BackendError> {
            Ok(Vec::new())
        }
    }

    fn instant_settings() -> ViewSettings {
        ViewSettings {
            typewriter: false,
            ..Default::default()
        }
    }

    fn typewriter_settings() -> ViewSettings {
        ViewSettings {
            typewriter: true,
            reveal_interval: Duration::from_millis(30),
            ..Default::default()
        }
    }

    fn view_with(
        backend: &Arc<FakeBackend>,
        settings: ViewSettings,
    ) -> ChatView<Arc<FakeBackend>> {
        ChatView::new(Arc::clone(backend), HistoryStore::in_memory(), settings)
    }

    async fn wait_until_busy(view: &ChatView<Arc<FakeBackend>>) {
        while !view.is_busy() {
            tokio::task::yield_now().await;
        }
    }

    mod submit {
        use super::*;

        #[tokio::test]
        async fn blank_input_is_ignored() {
            let backend = Arc::new(FakeBackend::replying(&["unused"]));
            let view = view_with(&backend, instant_settings());
            let before = view.snapshot();

            for input in ["", "   ", "\n\t "] {
                assert_eq!(
                    view.submit(input).await,
                    SubmitOutcome::Ignored(IgnoreReason::Blank)
                );
            }

            assert!(backend.requests().is_empty());
            assert_eq!(view.snapshot(), before);
        }

        #[tokio::test]
        async fn reply_is_displayed_and_recorded() {
            let backend = Arc::new(FakeBackend::replying(&["벌금 약 400만 원 예상됩니다."]));
            let view = view_with(&backend, instant_settings());

            let outcome = view.submit("폭행 사건 질문").await;

            assert_eq!(
                outcome,
                SubmitOutcome::Answered {
                    reply: "벌금 약 400만 원 예상됩니다.".to_string()
                }
            );
            let snapshot = view.snapshot();
            assert_eq!(snapshot.status, ViewStatus::Idle);
            assert_eq!(snapshot.reply, "벌금 약 400만 원 예상됩니다.");
            assert_eq!(
                snapshot.turns,
                vec![
                    Turn::user("폭행 사건 질문"),
                    Turn::assistant("벌금 약 400만 원 예상됩니다.")
                ]
            );
        }

        #[tokio::test]
        async fn first_submission_fixes_context() {
            let backend = Arc::new(FakeBackend::replying(&["a1", "a2", "a3"]));
            let view = view_with(&backend, instant_settings());

            view.submit("first question").await;
            view.submit("second").await;
            view.submit("third").await;

            let requests = backend.requests();
            assert_eq!(requests[0].context, None);
            assert_eq!(requests[1].context.as_deref(), Some("first question"));
            assert_eq!(requests[2].context.as_deref(), Some("first question"));
            assert_eq!(view.snapshot().context.as_deref(), Some("first question"));
        }

        #[tokio::test]
        async fn input_is_sent_untrimmed() {
            let backend = Arc::new(FakeBackend::replying(&["ok"]));
            let view = view_with(&backend, instant_settings());

            view.submit("  question \n").await;

            assert_eq!(backend.requests()[0].user_input, "  question \n");
        }

        #[tokio::test]
        async fn failure_shows_fallback_and_returns_to_idle() {
            let backend = Arc::new(FakeBackend::failing());
            let view = view_with(&backend, instant_settings());

            let outcome = view.submit("question").await;

            assert_eq!(
                outcome,
                SubmitOutcome::Failed {
                    message: FALLBACK_MESSAGE.to_string()
                }
            );
            let snapshot = view.snapshot();
            assert_eq!(snapshot.reply, FALLBACK_MESSAGE);
            assert_eq!(snapshot.status, ViewStatus::Failed);
            assert!(!view.is_busy());
            assert!(snapshot.turns.is_empty());
            // The first question is kept even though its request failed
            assert_eq!(snapshot.context.as_deref(), Some("question"));
        }

        #[tokio::test]
        async fn can_submit_again_after_failure() {
            let backend = Arc::new(FakeBackend::failing());
            let view = view_with(&backend, instant_settings());

            view.submit("question").await;
            let outcome = view.submit("retry").await;

            assert!(matches!(outcome, SubmitOutcome::Answered { .. }));
            assert_eq!(view.status(), ViewStatus::Idle);
            assert_eq!(backend.requests()[1].context.as_deref(), Some("question"));
        }

        #[tokio::test]
        async fn custom_fallback_message() {
            let backend = Arc::new(FakeBackend::failing());
            let view = view_with(
                &backend,
                ViewSettings {
                    fallback_message: "Something went wrong.".to_string(),
                    ..instant_settings()
                },
            );

            view.submit("question").await;

            assert_eq!(view.snapshot().reply, "Something went wrong.");
        }

        #[tokio::test]
        async fn events_follow_a_submission() {
            let backend = Arc::new(FakeBackend::replying(&["answer"]));
            let view = view_with(&backend, instant_settings());
            let mut rx = view.subscribe();

            view.submit("question").await;

            let mut events = Vec::new();
            while let Ok(event) = rx.try_recv() {
                events.push(event);
            }
            assert_eq!(
                events,
                vec![
                    ViewEvent::StatusChanged {
                        status: ViewStatus::Submitting
                    },
                    ViewEvent::StatusChanged {
                        status: ViewStatus::Idle
                    },
                    ViewEvent::ReplyCleared,
                    ViewEvent::ReplyComplete {
                        text: "answer".to_string()
                    },
                ]
            );
        }
    }

    mod in_flight_guard {
        use super::*;

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn submissions_while_busy_are_ignored() {
            let (backend, release) = FakeBackend::gated(&["first answer"]);
            let backend = Arc::new(backend);
            let view = Arc::new(view_with(&backend, instant_settings()));

            let first = {
                let view = Arc::clone(&view);
                tokio::spawn(async move { view.submit("first").await })
            };
            wait_until_busy(&view).await;

            assert_eq!(
                view.submit("typed while busy").await,
                SubmitOutcome::Ignored(IgnoreReason::Busy)
            );
            assert_eq!(
                view.select_follow_up(0).await,
                FollowUpOutcome::Submitted(SubmitOutcome::Ignored(IgnoreReason::Busy))
            );

            release.send(()).unwrap();
            let outcome = first.await.unwrap();

            assert!(matches!(outcome, SubmitOutcome::Answered { .. }));
            assert_eq!(backend.requests().len(), 1);
            assert_eq!(view.snapshot().turns.len(), 2);
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn link_follow_up_works_while_busy() {
            let (backend, release) = FakeBackend::gated(&["answer"]);
            let backend = Arc::new(backend);
            let view = Arc::new(view_with(&backend, instant_settings()));

            let first = {
                let view = Arc::clone(&view);
                tokio::spawn(async move { view.submit("first").await })
            };
            wait_until_busy(&view).await;

            let link_index = view.follow_ups().iter().position(|f| f.is_link()).unwrap();
            assert!(matches!(
                view.select_follow_up(link_index).await,
                FollowUpOutcome::OpenLink(_)
            ));

            release.send(()).unwrap();
            first.await.unwrap();
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn reply_after_reset_is_discarded() {
            let (backend, release) = FakeBackend::gated(&["stale answer"]);
            let backend = Arc::new(backend);
            let view = Arc::new(view_with(&backend, instant_settings()));

            let first = {
                let view = Arc::clone(&view);
                tokio::spawn(async move { view.submit("old case").await })
            };
            wait_until_busy(&view).await;

            view.reset();
            // Still busy until the request returns
            assert!(view.is_busy());

            release.send(()).unwrap();
            assert_eq!(first.await.unwrap(), SubmitOutcome::Discarded);

            let snapshot = view.snapshot();
            assert_eq!(snapshot.status, ViewStatus::Idle);
            assert!(snapshot.turns.is_empty());
            assert_eq!(snapshot.reply, "");
            assert_eq!(snapshot.context, None);
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn abandoned_submission_still_settles() {
            let (backend, release) = FakeBackend::gated(&["late answer", "next answer"]);
            let backend = Arc::new(backend);
            let view = view_with(&backend, instant_settings());

            let waited =
                tokio::time::timeout(Duration::from_millis(50), view.submit("first")).await;
            assert!(waited.is_err());
            assert!(view.is_busy());

            release.send(()).unwrap();
            while view.is_busy() {
                tokio::task::yield_now().await;
            }

            let snapshot = view.snapshot();
            assert_eq!(snapshot.status, ViewStatus::Idle);
            assert_eq!(snapshot.reply, "late answer");
            assert_eq!(
                snapshot.turns,
                vec![Turn::user("first"), Turn::assistant("late answer")]
            );

            release.send(()).unwrap();
            assert_eq!(
                view.submit("second").await,
                SubmitOutcome::Answered {
                    reply: "next answer".to_string()
                }
            );
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn reply_after_drop_is_not_saved() {
            let (backend, release) = FakeBackend::gated(&["late answer"]);
            let backend = Arc::new(backend);
            let history = HistoryStore::in_memory();
            let view = ChatView::new(Arc::clone(&backend), history.clone(), instant_settings());

            let waited =
                tokio::time::timeout(Duration::from_millis(50), view.submit("first")).await;
            assert!(waited.is_err());
            drop(view);

            release.send(()).unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;

            assert_eq!(backend.requests().len(), 1);
            assert!(history.load().is_empty());
        }
    }

    mod follow_ups {
        use super::*;

        #[tokio::test]
        async fn prompt_follow_up_submits_its_text() {
            let backend = Arc::new(FakeBackend::replying(&["a1", "a2"]));
            let view = view_with(&backend, instant_settings());

            view.submit("my case").await;
            let outcome = view.select_follow_up(1).await;

            assert!(matches!(
                outcome,
                FollowUpOutcome::Submitted(SubmitOutcome::Answered { .. })
            ));
            let requests = backend.requests();
            assert_eq!(requests[1].user_input, "비슷한 사건의 실제 판례를 3개 더 알려줘.");
            assert_eq!(requests[1].context.as_deref(), Some("my case"));
        }

        #[tokio::test]
        async fn link_follow_up_sends_nothing() {
            let backend = Arc::new(FakeBackend::replying(&[]));
            let view = view_with(&backend, instant_settings());

            let outcome = view.select_follow_up(2).await;

            assert_eq!(
                outcome,
                FollowUpOutcome::OpenLink(crate::prompts::LAWYER_DIRECTORY_URL.to_string())
            );
            assert!(backend.requests().is_empty());
        }

        #[tokio::test]
        async fn out_of_range_is_not_found() {
            let backend = Arc::new(FakeBackend::replying(&[]));
            let view = view_with(&backend, instant_settings());

            assert_eq!(view.select_follow_up(42).await, FollowUpOutcome::NotFound);
        }
    }

    mod reset {
        use super::*;

        #[tokio::test]
        async fn clears_context_conversation_and_reply() {
            let backend = Arc::new(FakeBackend::replying(&["a1", "a2", "a3"]));
            let view = view_with(&backend, instant_settings());

            view.submit("first case").await;
            view.submit("more").await;
            view.reset();

            let snapshot = view.snapshot();
            assert_eq!(snapshot.context, None);
            assert!(snapshot.turns.is_empty());
            assert_eq!(snapshot.reply, "");

            view.submit("second case").await;
            view.submit("follow").await;
            let requests = backend.requests();
            assert_eq!(requests[2].context, None);
            assert_eq!(requests[3].context.as_deref(), Some("second case"));
        }

        #[tokio::test]
        async fn clears_failed_status() {
            let backend = Arc::new(FakeBackend::failing());
            let view = view_with(&backend, instant_settings());

            view.submit("question").await;
            view.reset();

            assert_eq!(view.status(), ViewStatus::Idle);
            assert_eq!(view.snapshot().reply, "");
        }

        #[tokio::test]
        async fn persists_empty_conversation() {
            let dir = tempdir().unwrap();
            let id = SessionId("reset".to_string());
            let history = HistoryStore::new(Arc::new(FileStorage::new(dir.path(), &id)));
            let backend = Arc::new(FakeBackend::replying(&["a1"]));
            let view = ChatView::new(Arc::clone(&backend), history.clone(), instant_settings());

            view.submit("question").await;
            assert_eq!(history.load().len(), 2);

            view.reset();
            assert!(history.load().is_empty());
        }
    }

    mod typewriter {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn reveals_reply_incrementally() {
            let backend = Arc::new(FakeBackend::replying(&["abc"]));
            let view = view_with(&backend, typewriter_settings());

            let outcome = view.submit("q").await;
            assert_eq!(
                outcome,
                SubmitOutcome::Answered {
                    reply: "abc".to_string()
                }
            );
            let snapshot = view.snapshot();
            assert_eq!(snapshot.reply, "");
            assert!(snapshot.revealing);
            // The conversation records the whole reply right away
            assert_eq!(snapshot.turns[1], Turn::assistant("abc"));

            tokio::time::sleep(Duration::from_millis(35)).await;
            assert_eq!(view.snapshot().reply, "a");

            tokio::time::sleep(Duration::from_millis(70)).await;
            let snapshot = view.snapshot();
            assert_eq!(snapshot.reply, "abc");
            assert!(!snapshot.revealing);
        }

        #[tokio::test(start_paused = true)]
        async fn reset_disarms_reveal() {
            let backend = Arc::new(FakeBackend::replying(&["abcdef"]));
            let view = view_with(&backend, typewriter_settings());

            view.submit("q").await;
            tokio::time::sleep(Duration::from_millis(35)).await;
            assert_eq!(view.snapshot().reply, "a");

            view.reset();
            assert!(!view.snapshot().revealing);

            tokio::time::sleep(Duration::from_millis(500)).await;
            assert_eq!(view.snapshot().reply, "");
        }

        #[tokio::test(start_paused = true)]
        async fn new_submission_restarts_reveal_cleanly() {
            let backend = Arc::new(FakeBackend::replying(&["abcdef", "xyz"]));
            let view = view_with(&backend, typewriter_settings());

            view.submit("q1").await;
            tokio::time::sleep(Duration::from_millis(65)).await;
            assert_eq!(view.snapshot().reply, "ab");

            view.submit("q2").await;
            assert_eq!(view.snapshot().reply, "");

            tokio::time::sleep(Duration::from_millis(500)).await;
            assert_eq!(view.snapshot().reply, "xyz");
        }

        #[tokio::test(start_paused = true)]
        async fn finish_reveal_shows_whole_reply() {
            let backend = Arc::new(FakeBackend::replying(&["abcdef"]));
            let view = view_with(&backend, typewriter_settings());

            view.submit("q").await;
            tokio::time::sleep(Duration::from_millis(35)).await;

            assert!(view.finish_reveal());
            assert_eq!(view.snapshot().reply, "abcdef");

            tokio::time::sleep(Duration::from_millis(500)).await;
            assert_eq!(view.snapshot().reply, "abcdef");
            assert!(!view.finish_reveal());
        }

        #[tokio::test(start_paused = true)]
        async fn dropping_view_stops_reveal() {
            let backend = Arc::new(FakeBackend::replying(&["abcdef"]));
            let view = view_with(&backend, typewriter_settings());
            let mut rx = view.subscribe();

            view.submit("q").await;
            drop(view);
            tokio::time::sleep(Duration::from_millis(500)).await;

            let mut deltas = 0;
            while let Ok(event) = rx.try_recv() {
                if matches!(event, ViewEvent::ReplyDelta { .. }) {
                    deltas += 1;
                }
            }
            assert_eq!(deltas, 0);
        }
    }

    mod persistence {
        use super::*;

        #[tokio::test]
        async fn conversation_survives_reload_in_order() {
            let dir = tempdir().unwrap();
            let id = SessionId("tab-1".to_string());
            let store = || HistoryStore::new(Arc::new(FileStorage::new(dir.path(), &id)));

            let backend = Arc::new(FakeBackend::replying(&["a1", "a2", "a3"]));
            {
                let view = ChatView::new(Arc::clone(&backend), store(), instant_settings());
                view.submit("q1").await;
                view.submit("q2").await;
            }

            let reloaded = ChatView::new(Arc::clone(&backend), store(), instant_settings());
            let snapshot = reloaded.snapshot();
            assert_eq!(
                snapshot.turns,
                vec![
                    Turn::user("q1"),
                    Turn::assistant("a1"),
                    Turn::user("q2"),
                    Turn::assistant("a2"),
                ]
            );
            assert_eq!(snapshot.context.as_deref(), Some("q1"));
            assert_eq!(snapshot.reply, "");

            reloaded.submit("q3").await;
            assert_eq!(backend.requests()[2].context.as_deref(), Some("q1"));
        }

        #[tokio::test]
        async fn failed_request_does_not_touch_storage() {
            let history = HistoryStore::in_memory();
            let backend = Arc::new(FakeBackend::failing());
            let view = ChatView::new(Arc::clone(&backend), history.clone(), instant_settings());

            view.submit("q").await;

            assert!(history.load().is_empty());
        }
    }
}
