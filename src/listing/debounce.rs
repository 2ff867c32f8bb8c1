//! Timer-reset debounce primitive.
//!
//! Every input restarts the delay; a value is committed to the watch
//! channel only after the input has stayed unchanged for the full delay.
//! Stale timers recognize they lost by comparing generations.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub struct Debouncer {
    delay: Duration,
    generation: Arc<Mutex<u64>>,
    tx: watch::Sender<String>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        let (tx, _) = watch::channel(String::new());
        Self {
            delay,
            generation: Arc::new(Mutex::new(0)),
            tx,
        }
    }

    /// Feed a new raw input, restarting the quiescence timer.
    pub fn input(&self, text: impl Into<String>) {
        let text = text.into();
        let generation = {
            let mut current = self.generation.lock();
            *current += 1;
            *current
        };

        let latest = self.generation.clone();
        let tx = self.tx.clone();
        // The quiet period is measured from the keystroke, not from when
        // the timer task first runs.
        let deadline = tokio::time::Instant::now() + self.delay;
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            // Another keystroke arrived while we slept; drop this commit.
            if *latest.lock() != generation {
                return;
            }
            tx.send_replace(text);
        });
    }

    /// Commit a value immediately, cancelling any pending timer.
    pub fn commit_now(&self, text: impl Into<String>) {
        *self.generation.lock() += 1;
        self.tx.send_replace(text.into());
    }

    /// The last committed value.
    pub fn current(&self) -> String {
        self.tx.borrow().clone()
    }

    /// Observe commits as they land.
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.tx.subscribe()
    }
}
