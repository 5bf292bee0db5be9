use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::watch;

/// Cancellation gate for the relay loops: an atomic flag for cheap
/// polling between reads, backed by a watch channel for the waiters.
pub struct Control {
    done: AtomicBool,
    channel: Mutex<(watch::Sender<bool>, watch::Receiver<bool>)>,
}

impl Control {
    /// `done` picks the initial state; a relay starts out "done" so the
    /// first `start` can arm it.
    pub fn new(done: bool) -> Self {
        Control {
            done: AtomicBool::new(done),
            channel: Mutex::new(watch::channel(done)),
        }
    }

    /// Re-arm after a cancel: back to "in progress".
    pub fn restart(&self) {
        let mut channel = self.channel.lock().expect("control lock");
        *channel = watch::channel(false);
        self.done.store(false, Ordering::Release);
    }

    pub fn cancel(&self) {
        self.done.store(true, Ordering::Release);
        let channel = self.channel.lock().expect("control lock");
        let _ = channel.0.send(true);
    }

    /// Non-blocking probe.
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Wait until cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.channel.lock().expect("control lock").1.clone();

        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
        // The sender was replaced by a restart; the epoch this waiter
        // belongs to is over.
    }
}
