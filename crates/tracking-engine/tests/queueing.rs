//! Calls made before initialization.

mod harness;

use harness::{RecordingTransport, TestHarness, HOME};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracking_core::ManualClock;
use tracking_delivery::SendFailure;
use tracking_engine::{
    DeliveryOutcome, Environment, FunnelOptions, PageOptions, StaticEnvironment, TrackOutcome,
    Tracker, TrackerParts, PRE_INIT_MAX_AGE_MS,
};
use tracking_events::DeviceInfo;
use tracking_storage::{CookieJar, MemoryRecordStore, MemoryStore};

#[tokio::test]
async fn test_pre_init_calls_replayed_in_order_once() {
    let h = TestHarness::new(HOME);

    for i in 0..5 {
        let outcome = h.tracker.track_custom_event(&format!("event_{i}"), None).await;
        assert_eq!(outcome, TrackOutcome::Queued);
    }
    assert!(h.transport.sent_events().is_empty());

    assert!(h.tracker.initialize(TestHarness::config()).await);
    assert_eq!(h.tracker.wait_for_replay().await.len(), 5);

    let names: Vec<String> = h
        .transport
        .sent_events()
        .iter()
        .map(|e| e["event"]["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["event_0", "event_1", "event_2", "event_3", "event_4"]);
    assert_eq!(h.tracker.health().await.queue_size, 0);
}

#[tokio::test]
async fn test_mixed_calls_replay_through_their_own_paths() {
    let h = TestHarness::new(HOME);
    h.tracker.track_page(PageOptions::path("/pricing")).await;
    h.tracker
        .track_funnel("signup", FunnelOptions::step(1))
        .await;
    h.tracker.identify("user-1", None).await;

    assert!(h.tracker.initialize(TestHarness::config()).await);
    // funnel history is recorded while replayed calls are prepared
    assert_eq!(h.tracker.funnel_steps().len(), 1);
    h.tracker.wait_for_replay().await;

    let types: Vec<String> = h
        .transport
        .sent_events()
        .iter()
        .map(|e| e["event"]["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(types, ["pageview", "funnel", "event"]);
    assert_eq!(h.tracker.funnel_steps().len(), 1);
}

#[tokio::test]
async fn test_stale_pre_init_calls_dropped() {
    let h = TestHarness::new(HOME);
    h.tracker.track_custom_event("too_old", None).await;
    h.clock.advance(PRE_INIT_MAX_AGE_MS);
    h.tracker.track_custom_event("fresh", None).await;

    assert!(h.tracker.initialize(TestHarness::config()).await);
    h.tracker.wait_for_replay().await;

    let sent = h.transport.sent_events();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["event"]["name"], "fresh");
}

#[tokio::test(start_paused = true)]
async fn test_initialize_does_not_wait_for_replayed_delivery() {
    let h = TestHarness::with_transport(HOME, RecordingTransport::fetch_only());
    h.transport.script(vec![Err(SendFailure::Status(500)); 15]);
    for i in 0..5 {
        h.tracker.track_custom_event(&format!("event_{i}"), None).await;
    }

    let started = tokio::time::Instant::now();
    assert!(h.tracker.initialize(TestHarness::config()).await);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(h.tracker.is_initialized());
    assert_eq!(h.transport.post_count(), 0);

    let outcomes = h.tracker.wait_for_replay().await;
    assert_eq!(outcomes, vec![DeliveryOutcome::Queued; 5]);
    assert_eq!(h.tracker.offline_queue_len().await, 5);
    assert_eq!(h.transport.post_count(), 15);
    assert!(h.tracker.wait_for_replay().await.is_empty());
}

#[tokio::test]
async fn test_health_reports_pending_calls() {
    let h = TestHarness::new(HOME);
    h.tracker.track_custom_event("waiting", None).await;

    let health = h.tracker.health().await;
    assert!(!health.initialized);
    assert_eq!(health.queue_size, 1);
    assert!(health.storage.available);
}

#[tokio::test]
async fn test_second_initialize_rejected() {
    let h = TestHarness::start(HOME).await;
    assert!(h.tracker.is_initialized());
    assert!(!h.tracker.initialize(TestHarness::config()).await);
}

#[tokio::test]
async fn test_invalid_config_leaves_tracker_inactive() {
    let h = TestHarness::new(HOME);
    let config = tracking_core::TrackingConfig {
        sampling_rate: 2.0,
        ..TestHarness::config()
    };

    assert!(!h.tracker.initialize(config).await);
    assert!(!h.tracker.is_initialized());
    assert_eq!(h.reporter.reports.lock().len(), 1);
}

/// Environment whose URL lookup is slow and counted.
struct SlowUrlEnvironment {
    inner: StaticEnvironment,
    url_reads: AtomicUsize,
}

impl Environment for SlowUrlEnvironment {
    fn current_url(&self) -> String {
        self.url_reads.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(50));
        self.inner.current_url()
    }

    fn referrer(&self) -> Option<String> {
        self.inner.referrer()
    }

    fn is_reload(&self) -> bool {
        self.inner.is_reload()
    }

    fn is_online(&self) -> bool {
        self.inner.is_online()
    }

    fn device_info(&self) -> DeviceInfo {
        self.inner.device_info()
    }

    fn page_title(&self) -> Option<String> {
        self.inner.page_title()
    }
}

#[test]
fn test_concurrent_initialize_captures_once() {
    let env = Arc::new(SlowUrlEnvironment {
        inner: StaticEnvironment::new("https://shop.test/?utm_source=ads&utm_medium=cpc"),
        url_reads: AtomicUsize::new(0),
    });
    let clock = Arc::new(ManualClock::new(harness::NOW));
    let tracker = Tracker::new(TrackerParts {
        local: Arc::new(MemoryStore::new()),
        cookies: Arc::new(CookieJar::new(Arc::new(MemoryStore::new()), clock.clone())),
        records: Arc::new(MemoryRecordStore::new()),
        transport: RecordingTransport::beacon(),
        environment: env.clone(),
        clock,
        error_reporter: None,
    });

    let results: Vec<bool> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                scope.spawn(|| {
                    tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                        .unwrap()
                        .block_on(tracker.initialize(TestHarness::config()))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|ok| **ok).count(), 1);
    assert_eq!(env.url_reads.load(Ordering::SeqCst), 1);
    assert!(tracker.is_initialized());
    assert_eq!(tracker.journey().len(), 1);
}
