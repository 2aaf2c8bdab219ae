//! Typewriter reveal.
//!
//! A reply is revealed one character per tick instead of all at once. The
//! reveal runs as a spawned task and is cancelled by aborting it; dropping a
//! [`Reveal`] cancels it too, so a reveal can never outlive its owner.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Default delay between revealed characters.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(30);

/// Handle to a running (or finished, or never started) reveal.
#[derive(Debug, Default)]
pub struct Reveal {
    task: Option<JoinHandle<()>>,
}

impl Reveal {
    /// A reveal that is not running.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Start revealing `text`.
    ///
    /// `on_char` is called once per character, the first one interval after
    /// the start. Its second argument is true for the last character. Empty
    /// text starts nothing.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F>(text: String, interval: Duration, mut on_char: F) -> Self
    where
        F: FnMut(char, bool) + Send + 'static,
    {
        if text.is_empty() {
            return Self::idle();
        }

        // A zero period would make the ticker panic
        let interval = interval.max(Duration::from_millis(1));
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut chars = text.chars().peekable();
            while let Some(ch) = chars.next() {
                ticker.tick().await;
                on_char(ch, chars.peek().is_none());
            }
        });

        Self { task: Some(task) }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the reveal. Returns true if it was still running.
    pub fn cancel(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                let was_running = !task.is_finished();
                task.abort();
                was_running
            }
            None => false,
        }
    }
}

impl Drop for Reveal {
    fn drop(&mut self) {
        self.cancel();
    }
}
