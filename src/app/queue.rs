//! Alert queue.
//!
//! Many producers, one consumer.  `enqueue` is constant-time and never
//! waits on the pattern engine; the single consumer pops in arrival order
//! and renders each alert to completion before popping the next, which is
//! what keeps two alerts from ever driving the hardware at once.
//!
//! Growth is unbounded: alerts are small commands, and the depth is exposed
//! for observability rather than used for load shedding.

use std::sync::RwLock;

use crossbeam_channel::{Receiver, Sender};

use super::commands::{AlertId, AlertRequest, QueuedAlert};
use crate::error::{Error, Result};

/// Receipt for an accepted alert.
#[derive(Debug, Clone)]
pub struct Enqueued {
    pub alert: QueuedAlert,
    /// Queue depth right after this alert was appended.
    pub depth: usize,
}

impl Enqueued {
    pub fn id(&self) -> &AlertId {
        &self.alert.id
    }
}

pub struct AlertQueue {
    /// `None` once closed.
    tx: RwLock<Option<Sender<QueuedAlert>>>,
    rx: Receiver<QueuedAlert>,
}

impl Default for AlertQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertQueue {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            tx: RwLock::new(Some(tx)),
            rx,
        }
    }

    /// Assign `request` a fresh identifier and append it.
    ///
    /// Fails with [`Error::QueueClosed`] once [`close`](Self::close) has run.
    pub fn enqueue(&self, request: AlertRequest) -> Result<Enqueued> {
        let guard = match self.tx.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let tx = guard.as_ref().ok_or(Error::QueueClosed)?;
        let alert = QueuedAlert::new(request);
        tx.send(alert.clone()).map_err(|_| Error::QueueClosed)?;
        Ok(Enqueued {
            alert,
            depth: self.rx.len(),
        })
    }

    /// Stop accepting alerts.  Returns `true` on the first call only.
    ///
    /// Alerts already queued stay poppable; the consumer's receiver ends
    /// once they are gone.
    pub fn close(&self) -> bool {
        let mut guard = match self.tx.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.take().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.read().map_or(true, |guard| guard.is_none())
    }

    /// Alerts waiting to be rendered (excludes the one in flight).
    pub fn depth(&self) -> usize {
        self.rx.len()
    }

    /// Consumer end.  Only one consumer should pop from it.
    pub fn receiver(&self) -> Receiver<QueuedAlert> {
        self.rx.clone()
    }
}
