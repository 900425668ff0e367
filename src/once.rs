//! Per-key serialization of in-flight repository work.
//!
//! The first caller to [`Once::register`] a key holds the slot and proceeds;
//! concurrent callers receive a wait channel and park until the holder
//! calls [`Once::unregister`]. Released waiters observe the holder's effects
//! through the shared cache and re-run the entry logic rather than repeating
//! the work.
//!
//! Wait channels have capacity 1, so releasing never blocks: a waiter that
//! gave up on cancellation simply leaves its channel to be dropped.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use crossbeam_channel::{at, bounded, never, select, Receiver, Sender};

use crate::context::{Context, ContextError};

/// A per-key admission queue.
///
/// At any time at most one caller holds the slot for a given key.
#[derive(Debug, Default)]
pub struct Once {
    queue: Mutex<HashMap<String, Vec<Sender<()>>>>,
}

impl Once {
    pub fn new() -> Once {
        Once::default()
    }

    /// Claims the slot for `key`.
    ///
    /// Returns `None` when the caller now holds the slot and must proceed
    /// (and later [`Once::unregister`]). Returns a receiver when another
    /// caller holds the slot; block on it with [`Once::wait`].
    pub fn register(&self, key: &str) -> Option<Receiver<()>> {
        let mut queue = self.queue.lock().expect("once queue poisoned");
        match queue.get_mut(key) {
            Some(waiters) => {
                let (tx, rx) = bounded(1);
                waiters.push(tx);
                Some(rx)
            }
            None => {
                queue.insert(key.to_string(), Vec::new());
                None
            }
        }
    }

    /// Releases the slot for `key`, waking every parked waiter.
    pub fn unregister(&self, key: &str) {
        let mut queue = self.queue.lock().expect("once queue poisoned");
        if let Some(waiters) = queue.remove(key) {
            for tx in waiters {
                // Capacity-1 send; a receiver abandoned by cancellation has
                // been dropped and the send result is irrelevant.
                let _ = tx.send(());
            }
        }
    }

    /// Blocks until this caller holds the slot for `key`.
    ///
    /// Released waiters re-enter the queue, so the slot is handed to exactly
    /// one caller at a time. The guard releases the slot when dropped.
    pub fn acquire<'a>(&'a self, ctx: &Context, key: &str) -> Result<SlotGuard<'a>, ContextError> {
        loop {
            match self.register(key) {
                None => {
                    return Ok(SlotGuard {
                        once: self,
                        key: key.to_string(),
                    })
                }
                Some(rx) => Once::wait(ctx, rx)?,
            }
        }
    }

    /// Parks on a wait channel obtained from [`Once::register`], honouring
    /// the context's cancellation and deadline.
    pub fn wait(ctx: &Context, rx: Receiver<()>) -> Result<(), ContextError> {
        let cancelled = ctx.cancelled();
        let deadline = ctx
            .deadline()
            .map(at)
            .unwrap_or_else(|| never::<Instant>());
        select! {
            recv(rx) -> _ => ctx.err_if_done(),
            recv(cancelled) -> _ => Err(ContextError::Cancelled),
            recv(deadline) -> _ => Err(ContextError::DeadlineExceeded),
        }
    }
}

/// Holds the once-slot for a key; releases it on drop.
#[derive(Debug)]
pub struct SlotGuard<'a> {
    once: &'a Once,
    key: String,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.once.unregister(&self.key);
    }
}
