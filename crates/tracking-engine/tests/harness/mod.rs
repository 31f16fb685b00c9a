//! Test harness for tracker integration tests.
//!
//! Provides:
//! - RecordingTransport: a transport that records beacons and POSTs and
//!   answers POSTs from a script
//! - RecordingReporter: an error reporter that keeps what it was given
//! - TestHarness: a tracker wired to in-memory stores, a manual clock and a
//!   static environment

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tracking_core::{ManualClock, TrackingConfig};
use tracking_delivery::{SendFailure, Transport};
use tracking_engine::{ErrorContext, ErrorReporter, StaticEnvironment, Tracker, TrackerParts};
use tracking_storage::{CookieJar, MemoryRecordStore, MemoryStore};

pub const NOW: i64 = 1_700_000_000_000;
pub const ENDPOINT: &str = "https://collect.test/events";
pub const HOME: &str = "https://shop.test/";

#[derive(Default)]
pub struct RecordingTransport {
    beacon_accepts: bool,
    beacons: Mutex<Vec<String>>,
    posts: Mutex<Vec<String>>,
    responses: Mutex<VecDeque<Result<(), SendFailure>>>,
}

impl RecordingTransport {
    pub fn beacon() -> Arc<Self> {
        Arc::new(Self {
            beacon_accepts: true,
            ..Default::default()
        })
    }

    pub fn fetch_only() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Responses for upcoming POSTs; once exhausted every POST succeeds.
    pub fn script(&self, responses: Vec<Result<(), SendFailure>>) {
        self.responses.lock().extend(responses);
    }

    pub fn beacon_events(&self) -> Vec<Value> {
        decode(&self.beacons.lock())
    }

    pub fn posted_events(&self) -> Vec<Value> {
        decode(&self.posts.lock())
    }

    /// Every payload that left the engine, beacons first.
    pub fn sent_events(&self) -> Vec<Value> {
        let mut events = self.beacon_events();
        events.extend(self.posted_events());
        events
    }

    pub fn post_count(&self) -> usize {
        self.posts.lock().len()
    }
}

fn decode(payloads: &[String]) -> Vec<Value> {
    payloads
        .iter()
        .map(|p| serde_json::from_str(p).unwrap())
        .collect()
}

#[async_trait]
impl Transport for RecordingTransport {
    fn beacon(&self, _endpoint: &str, payload: &str) -> bool {
        if self.beacon_accepts {
            self.beacons.lock().push(payload.to_string());
        }
        self.beacon_accepts
    }

    async fn post_json(&self, _endpoint: &str, payload: &str) -> Result<(), SendFailure> {
        self.posts.lock().push(payload.to_string());
        self.responses.lock().pop_front().unwrap_or(Ok(()))
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    pub reports: Mutex<Vec<(String, ErrorContext)>>,
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, error: &(dyn std::error::Error + 'static), context: &ErrorContext) {
        self.reports.lock().push((error.to_string(), context.clone()));
    }
}

pub struct TestHarness {
    pub tracker: Tracker,
    pub env: Arc<StaticEnvironment>,
    pub clock: Arc<ManualClock>,
    pub transport: Arc<RecordingTransport>,
    pub reporter: Arc<RecordingReporter>,
    pub local: Arc<MemoryStore>,
    pub cookie_store: Arc<MemoryStore>,
    pub records: Arc<MemoryRecordStore>,
}

impl TestHarness {
    pub fn new(url: &str) -> Self {
        Self::with_transport(url, RecordingTransport::beacon())
    }

    pub fn with_transport(url: &str, transport: Arc<RecordingTransport>) -> Self {
        let env = Arc::new(StaticEnvironment::new(url));
        let clock = Arc::new(ManualClock::new(NOW));
        let reporter = Arc::new(RecordingReporter::default());
        let local = Arc::new(MemoryStore::new());
        let cookie_store = Arc::new(MemoryStore::new());
        let records = Arc::new(MemoryRecordStore::new());

        let tracker = Tracker::new(TrackerParts {
            local: local.clone(),
            cookies: Arc::new(CookieJar::new(cookie_store.clone(), clock.clone())),
            records: records.clone(),
            transport: transport.clone(),
            environment: env.clone(),
            clock: clock.clone(),
            error_reporter: Some(reporter.clone()),
        });

        Self {
            tracker,
            env,
            clock,
            transport,
            reporter,
            local,
            cookie_store,
            records,
        }
    }

    /// Config delivering to [`ENDPOINT`] with the debug log on.
    pub fn config() -> TrackingConfig {
        TrackingConfig {
            api_endpoint: Some(ENDPOINT.to_string()),
            debug: true,
            ..Default::default()
        }
    }

    pub async fn start(url: &str) -> Self {
        let harness = Self::new(url);
        assert!(harness.tracker.initialize(Self::config()).await);
        harness
    }
}
