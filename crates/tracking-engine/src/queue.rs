//! Calls made before initialization, replayed once the engine is ready.

use std::collections::VecDeque;
use tracing::{debug, warn};
use tracking_core::Extensions;

pub const PRE_INIT_CAPACITY: usize = 100;
pub const PRE_INIT_MAX_AGE_MS: i64 = 30_000;

/// Options for a page view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageOptions {
    pub path: Option<String>,
    pub title: Option<String>,
    pub value: Option<f64>,
}

impl PageOptions {
    pub fn path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }
}

/// Options for a funnel step.
#[derive(Debug, Clone, PartialEq)]
pub struct FunnelOptions {
    pub step_number: i64,
    pub value: Option<f64>,
    pub properties: Option<Extensions>,
}

impl FunnelOptions {
    pub fn step(step_number: i64) -> Self {
        Self {
            step_number,
            value: None,
            properties: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PendingCall {
    Page(PageOptions),
    Funnel { step: String, options: FunnelOptions },
    Track { name: String, properties: Option<Extensions> },
}

#[derive(Debug)]
struct QueuedCall {
    call: PendingCall,
    queued_at: i64,
}

/// Bounded FIFO of pending calls; entries older than
/// [`PRE_INIT_MAX_AGE_MS`] are dropped on access.
#[derive(Debug)]
pub struct PreInitQueue {
    entries: VecDeque<QueuedCall>,
    capacity: usize,
    max_age_ms: i64,
}

impl Default for PreInitQueue {
    fn default() -> Self {
        Self::new(PRE_INIT_CAPACITY, PRE_INIT_MAX_AGE_MS)
    }
}

impl PreInitQueue {
    pub fn new(capacity: usize, max_age_ms: i64) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
            max_age_ms,
        }
    }

    pub fn push(&mut self, call: PendingCall, now_ms: i64) {
        self.purge_expired(now_ms);
        if self.entries.len() >= self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                warn!(call = ?evicted.call, "Pre-init queue full, dropping oldest call");
            }
        }
        self.entries.push_back(QueuedCall {
            call,
            queued_at: now_ms,
        });
    }

    /// Remove stale entries, returning how many were dropped.
    pub fn purge_expired(&mut self, now_ms: i64) -> usize {
        let before = self.entries.len();
        let max_age = self.max_age_ms;
        self.entries.retain(|entry| now_ms - entry.queued_at < max_age);
        let dropped = before - self.entries.len();
        if dropped > 0 {
            debug!(dropped, "Expired pre-init calls");
        }
        dropped
    }

    /// Take every live call in arrival order.
    pub fn drain(&mut self, now_ms: i64) -> Vec<PendingCall> {
        self.purge_expired(now_ms);
        self.entries.drain(..).map(|entry| entry.call).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
