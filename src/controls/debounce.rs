//! Deferred release scheduling
//!
//! Key auto-repeat shows up as release/press pairs arriving faster than any
//! operator could produce them. A release is therefore not acted on at once:
//! it is parked here and only runs once the input burst it arrived in has
//! been fully processed (and `delay` has passed). A press arriving first
//! cancels it.
//!
//! The scheduler is single-threaded and only ever driven from the foreground
//! task. It holds at most one pending action per control.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error};

use super::ControlId;

/// Identifies one scheduled action. Handles are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DebounceHandle(u64);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DebounceError {
    #[error("Control {0:?} already has a pending release")]
    AlreadyPending(ControlId),
}

#[derive(Clone, Debug)]
struct Scheduled {
    handle: DebounceHandle,
    control: ControlId,
    deadline: Instant,
}

#[derive(Debug)]
pub struct DebounceScheduler {
    delay: Duration,
    next_handle: u64,
    pending: Vec<Scheduled>,
}

impl DebounceScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_handle: 0,
            pending: Vec::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Queues a release for `control`, due at `now + delay`.
    pub fn schedule(&mut self, control: ControlId, now: Instant) -> Result<DebounceHandle, DebounceError> {
        if self.pending.iter().any(|s| s.control == control) {
            error!("Refusing second pending release for {:?}", control);
            return Err(DebounceError::AlreadyPending(control));
        }

        let handle = DebounceHandle(self.next_handle);
        self.next_handle += 1;
        self.pending.push(Scheduled {
            handle,
            control,
            deadline: now + self.delay,
        });
        debug!("Scheduled release {:?} for {:?}", handle, control);
        Ok(handle)
    }

    /// Drops the action behind `handle`. Returns false if it already ran or
    /// was cancelled before.
    pub fn cancel(&mut self, handle: DebounceHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|s| s.handle != handle);
        let removed = self.pending.len() != before;
        if removed {
            debug!("Cancelled release {:?}", handle);
        }
        removed
    }

    /// Removes and returns every action whose deadline is not after `now`,
    /// oldest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<(ControlId, DebounceHandle)> {
        let mut due = Vec::new();
        self.pending.retain(|s| {
            if s.deadline <= now {
                due.push((s.control, s.handle));
                false
            } else {
                true
            }
        });
        due
    }

    /// Removes and returns everything still pending, due or not.
    pub fn take_all(&mut self) -> Vec<(ControlId, DebounceHandle)> {
        self.pending.drain(..).map(|s| (s.control, s.handle)).collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|s| s.deadline).min()
    }

    pub fn is_pending(&self, handle: DebounceHandle) -> bool {
        self.pending.iter().any(|s| s.handle == handle)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
