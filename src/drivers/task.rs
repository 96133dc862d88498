//! Named worker threads and cooperative cancellation.
//!
//! Every long-lived execution unit (queue consumer, one driver per PWM
//! channel) and every transient buzzer sequence runs on its own named OS
//! thread.  Workers sleep through [`CancelToken::sleep`] so a cancel request
//! wakes them immediately instead of after the full sleep.

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::debug;

use crate::error::{Error, Result};

/// Default stack for alert workers; they hold no large buffers.
pub const WORKER_STACK_KB: usize = 64;

/// Spawn a named worker thread.
pub fn spawn_worker<T: Send + 'static>(
    name: impl Into<String>,
    stack_kb: usize,
    f: impl FnOnce() -> T + Send + 'static,
) -> Result<JoinHandle<T>> {
    let name = name.into();
    debug!("Spawning '{}' (stack={}KB)", name, stack_kb);

    std::thread::Builder::new()
        .name(name)
        .stack_size(stack_kb * 1024)
        .spawn(f)
        .map_err(|_| Error::Spawn)
}

/// Cloneable cancellation flag whose sleeps end early on cancel.
///
/// Cancelling drops the shared sender, which disconnects every clone's
/// receiver at once.
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    tx: Arc<Mutex<Option<Sender<()>>>>,
    rx: Receiver<()>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            tx: Arc::new(Mutex::new(Some(tx))),
            rx,
        }
    }

    /// Request cancellation.  Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns `true` if the full duration elapsed, `false` on cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        match self.rx.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => !self.is_cancelled(),
            // Nothing is ever sent; any wake-up means the sender is gone.
            Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Sleep until `deadline` unless cancelled first.  A deadline already in
    /// the past returns at once.
    pub fn sleep_until(&self, deadline: Instant) -> bool {
        self.sleep(deadline.saturating_duration_since(Instant::now()))
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
