//! Validation, sampling and enrichment of tracked events.

mod harness;

use harness::{TestHarness, HOME};
use std::collections::HashMap;
use tracking_core::{Extensions, PageOverride, TrackingConfig};
use tracking_engine::{FunnelOptions, PageOptions, TrackOutcome, ValidationError};

async fn start_with(config: TrackingConfig) -> TestHarness {
    let h = TestHarness::new(HOME);
    assert!(h.tracker.initialize(config).await);
    h
}

#[tokio::test]
async fn test_invalid_event_name_never_sent() {
    let h = TestHarness::start(HOME).await;

    let outcome = h.tracker.track_custom_event("Invalid-Name", None).await;
    assert!(matches!(
        outcome,
        TrackOutcome::Invalid(ValidationError::EventNameFormat(_))
    ));
    assert!(h.transport.sent_events().is_empty());
    assert!(h.tracker.debug_events().await.is_empty());
}

#[tokio::test]
async fn test_enriched_payload_shape() {
    let h = TestHarness::start("https://shop.test/?utm_source=google&utm_medium=cpc").await;

    let mut properties = Extensions::new();
    properties.insert("plan".into(), "pro".into());
    h.tracker.track_custom_event("signup", Some(properties)).await;

    let sent = h.transport.sent_events();
    assert_eq!(sent.len(), 1);
    let event = &sent[0];
    assert_eq!(event["schemaVersion"], 1);
    assert_eq!(event["event"]["type"], "event");
    assert_eq!(event["event"]["properties"]["plan"], "pro");
    assert_eq!(event["attribution"]["firstTouch"]["source"], "google");
    assert_eq!(event["attribution"]["journey"].as_array().unwrap().len(), 1);
    assert_eq!(
        event["context"]["sessionId"].as_str(),
        h.tracker.session_id().as_deref()
    );
}

#[tokio::test]
async fn test_page_value_out_of_range_rejected() {
    let h = TestHarness::start(HOME).await;

    let outcome = h
        .tracker
        .track_page(PageOptions {
            value: Some(150.0),
            ..PageOptions::path("/pricing")
        })
        .await;
    assert_eq!(outcome, TrackOutcome::Invalid(ValidationError::ValueOutOfRange(150.0)));
    assert!(h.transport.sent_events().is_empty());
}

#[tokio::test]
async fn test_page_value_from_config_rounded() {
    let h = start_with(TrackingConfig {
        page_values: HashMap::from([("/pricing".to_string(), 42.6)]),
        ..TestHarness::config()
    })
    .await;
    h.env.set_title(Some("Pricing".into()));

    h.tracker.track_page(PageOptions::path("/pricing")).await;

    let event = &h.transport.sent_events()[0]["event"];
    assert_eq!(event["type"], "pageview");
    assert_eq!(event["value"], 43.0);
    assert_eq!(event["title"], "Pricing");
}

#[tokio::test]
async fn test_page_overrides() {
    let h = start_with(TrackingConfig {
        page_overrides: HashMap::from([
            (
                "/admin".to_string(),
                PageOverride {
                    disable: true,
                    ..Default::default()
                },
            ),
            (
                "/checkout".to_string(),
                PageOverride {
                    disable_auto_page_view: true,
                    ..Default::default()
                },
            ),
        ]),
        ..TestHarness::config()
    })
    .await;

    assert_eq!(
        h.tracker.track_page(PageOptions::path("/admin")).await,
        TrackOutcome::Disabled
    );
    assert_eq!(
        h.tracker.route_changed(PageOptions::path("/checkout")).await,
        TrackOutcome::Disabled
    );
    assert!(matches!(
        h.tracker.track_page(PageOptions::path("/checkout")).await,
        TrackOutcome::Dispatched(_)
    ));
    assert_eq!(h.transport.sent_events().len(), 1);
}

#[tokio::test]
async fn test_funnel_warnings_do_not_block() {
    let h = TestHarness::start(HOME).await;

    h.tracker.track_funnel("cart", FunnelOptions::step(1)).await;
    let skipped = h.tracker.track_funnel("payment", FunnelOptions::step(3)).await;
    assert!(matches!(skipped, TrackOutcome::Dispatched(_)));

    let steps = h.tracker.funnel_steps();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[1].step_number, 3);
    assert_eq!(h.transport.sent_events()[1]["event"]["stepNumber"], 3);
}

#[tokio::test]
async fn test_funnel_step_number_must_be_positive() {
    let h = TestHarness::start(HOME).await;

    let outcome = h.tracker.track_funnel("cart", FunnelOptions::step(0)).await;
    assert_eq!(outcome, TrackOutcome::Invalid(ValidationError::InvalidStepNumber(0)));
    assert!(h.tracker.funnel_steps().is_empty());
}

#[tokio::test]
async fn test_zero_sampling_rate_drops_everything() {
    let h = start_with(TrackingConfig {
        sampling_rate: 0.0,
        ..TestHarness::config()
    })
    .await;

    assert_eq!(
        h.tracker.track_custom_event("signup", None).await,
        TrackOutcome::Sampled
    );
    assert_eq!(
        h.tracker.track_page(PageOptions::path("/")).await,
        TrackOutcome::Sampled
    );
    assert!(h.transport.sent_events().is_empty());
}

#[tokio::test]
async fn test_global_context_merged_into_events() {
    let h = TestHarness::start(HOME).await;

    let mut global = Extensions::new();
    global.insert("appVersion".into(), "2.1.0".into());
    global.insert("language".into(), "fr".into());
    h.tracker.set_global_context(global);

    h.tracker.track_custom_event("signup", None).await;

    let context = &h.transport.sent_events()[0]["context"];
    assert_eq!(context["appVersion"], "2.1.0");
    assert_eq!(context["language"], "fr");
}

#[tokio::test]
async fn test_identify_carries_user_id_and_traits() {
    let h = TestHarness::start(HOME).await;

    let mut traits = Extensions::new();
    traits.insert("plan".into(), "team".into());
    h.tracker.identify("user-42", Some(traits)).await;

    let event = &h.transport.sent_events()[0]["event"];
    assert_eq!(event["name"], "identify");
    assert_eq!(event["properties"]["userId"], "user-42");
    assert_eq!(event["properties"]["plan"], "team");
}
