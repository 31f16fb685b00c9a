//! Bounded, deduplicated touchpoint history.

use tracking_core::{AttributionTtlConfig, DEFAULT_MAX_JOURNEY_SIZE};

use crate::store::is_expired;
use crate::{Attribution, JourneyEntry};

/// Applies the journey append rules: dedup against the last entry, FIFO size
/// cap, then TTL filtering.
#[derive(Debug, Clone, Copy)]
pub struct JourneyManager {
    ttl_ms: i64,
    max_size: usize,
}

impl Default for JourneyManager {
    fn default() -> Self {
        Self::new(AttributionTtlConfig::default().journey_ms(), DEFAULT_MAX_JOURNEY_SIZE)
    }
}

impl JourneyManager {
    pub fn new(ttl_ms: i64, max_size: usize) -> Self {
        Self {
            ttl_ms,
            max_size: max_size.max(1),
        }
    }

    pub fn ttl_ms(&self) -> i64 {
        self.ttl_ms
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// A touchpoint is appended unless source, medium and campaign all match
    /// the last entry. Elapsed time never re-admits a duplicate.
    pub fn should_append(&self, current: &Attribution, last: Option<&JourneyEntry>) -> bool {
        match last {
            None => true,
            Some(last) => {
                current.source != last.source
                    || current.medium != last.medium
                    || current.campaign != last.campaign
            }
        }
    }

    /// Append a trimmed entry for `attribution`, evicting the oldest entries
    /// past the size cap and dropping entries older than the TTL.
    pub fn append(
        &self,
        mut journey: Vec<JourneyEntry>,
        attribution: &Attribution,
        now_ms: i64,
    ) -> Vec<JourneyEntry> {
        journey.push(JourneyEntry::from(attribution));
        if journey.len() > self.max_size {
            let excess = journey.len() - self.max_size;
            journey.drain(..excess);
        }
        journey.retain(|entry| !is_expired(entry.timestamp, self.ttl_ms, now_ms));
        journey
    }

    /// Drop entries older than the TTL.
    pub fn retain_unexpired(&self, journey: &mut Vec<JourneyEntry>, now_ms: i64) {
        journey.retain(|entry| !is_expired(entry.timestamp, self.ttl_ms, now_ms));
    }
}
