//! Cooperative cancellation for long-running operations.
//!
//! A [`Context`] carries an optional deadline and an optional cancel
//! channel. Every network and disk operation checks it before blocking, and
//! queue waiters select over it so cancellation interrupts a park.

use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, never, Receiver, Sender};
use thiserror::Error;

/// Why an operation stopped before completing.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum ContextError {
    #[error("context cancelled")]
    Cancelled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// A cancellation token threaded through retrieval operations.
#[derive(Debug, Clone)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: Option<Receiver<()>>,
}

/// Cancels its [`Context`] when triggered or dropped.
#[derive(Debug)]
pub struct CancelHandle {
    tx: Sender<()>,
}

impl CancelHandle {
    /// Cancels the associated context.
    pub fn cancel(self) {
        let _ = self.tx.send(());
    }
}

impl Context {
    /// A context that is never cancelled.
    pub fn background() -> Context {
        Context {
            deadline: None,
            cancel: None,
        }
    }

    /// A cancellable context. Dropping the handle also cancels.
    pub fn with_cancel() -> (Context, CancelHandle) {
        let (tx, rx) = bounded(1);
        (
            Context {
                deadline: None,
                cancel: Some(rx),
            },
            CancelHandle { tx },
        )
    }

    /// A context that expires after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Context {
        Context {
            deadline: Some(Instant::now() + timeout),
            cancel: None,
        }
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// A receiver that becomes ready (or disconnects) on cancellation.
    /// Never ready for a background context.
    pub fn cancelled(&self) -> Receiver<()> {
        self.cancel.clone().unwrap_or_else(never)
    }

    /// Returns an error if the context is cancelled or past its deadline.
    pub fn err_if_done(&self) -> Result<(), ContextError> {
        if let Some(d) = self.deadline {
            if Instant::now() >= d {
                return Err(ContextError::DeadlineExceeded);
            }
        }
        if let Some(rx) = &self.cancel {
            match rx.try_recv() {
                Ok(()) => return Err(ContextError::Cancelled),
                Err(crossbeam_channel::TryRecvError::Disconnected) => {
                    return Err(ContextError::Cancelled)
                }
                Err(crossbeam_channel::TryRecvError::Empty) => {}
            }
        }
        Ok(())
    }
}
