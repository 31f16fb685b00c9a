//! Command handlers.

use std::path::Path;
use std::sync::Arc;

use tracing::info;
use tracking_core::{json_to_ext, Extensions, Paths, SystemClock, TrackingConfig};
use tracking_delivery::HttpTransport;
use tracking_engine::{
    FunnelOptions, PageOptions, StaticEnvironment, TrackOutcome, Tracker, TrackerParts,
};
use tracking_storage::{CookieJar, FileStore, SqliteRecordStore};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Page the CLI pretends to be running on.
#[derive(Debug, Clone)]
pub struct PageLoad {
    pub url: String,
    pub referrer: Option<String>,
    pub title: Option<String>,
    pub is_reload: bool,
    pub online: bool,
}

pub fn write_config(paths: &Paths, endpoint: Option<String>, debug: bool) -> CliResult<()> {
    let config = TrackingConfig {
        api_endpoint: endpoint,
        debug,
        ..Default::default()
    };
    config.validate()?;
    config.save(paths)?;
    println!("Wrote {}", paths.config_file().display());
    Ok(())
}

/// Explicit config file if given, otherwise the one under the base dir.
pub fn load_config(paths: &Paths, explicit: Option<&Path>) -> CliResult<TrackingConfig> {
    let config = match explicit {
        Some(path) => {
            let config = TrackingConfig::load_from_file(path)?;
            config.validate()?;
            config
        }
        None => TrackingConfig::load(paths)?,
    };
    Ok(config)
}

pub async fn build_tracker(
    paths: &Paths,
    config: &TrackingConfig,
    page: &PageLoad,
) -> CliResult<Tracker> {
    let clock = Arc::new(SystemClock);
    let local = Arc::new(FileStore::open(paths.local_storage_file())?);
    let cookies = Arc::new(CookieJar::new(
        Arc::new(FileStore::open(paths.cookie_file())?),
        clock.clone(),
    ));
    let records = Arc::new(SqliteRecordStore::open(&paths.records_database()).await?);

    // the process exits right after a command, so POSTs are awaited
    let transport = Arc::new(HttpTransport::new(config.delivery.timeout_secs)?.without_beacon());

    let mut env = StaticEnvironment::new(page.url.clone());
    if let Some(referrer) = &page.referrer {
        env = env.with_referrer(referrer.clone());
    }
    env.set_reload(page.is_reload);
    env.set_online(page.online);
    env.set_title(page.title.clone());

    Ok(Tracker::with_config(
        TrackerParts {
            local,
            cookies,
            records,
            transport,
            environment: Arc::new(env),
            clock,
            error_reporter: None,
        },
        config.clone(),
    ))
}

async fn start(tracker: &Tracker, config: TrackingConfig) -> CliResult<()> {
    if !tracker.initialize(config).await {
        return Err("tracker failed to initialize".into());
    }
    tracker.wait_for_replay().await;
    Ok(())
}

/// Decode a JSON object argument into event properties.
pub fn parse_properties(raw: Option<&str>) -> CliResult<Option<Extensions>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value: serde_json::Value = serde_json::from_str(raw)?;
    match json_to_ext(value) {
        Some(tracking_core::ExtValue::Map(map)) => Ok(Some(map)),
        _ => Err("properties must be a JSON object of strings, numbers, booleans or objects".into()),
    }
}

fn finish(outcome: TrackOutcome) -> CliResult<()> {
    match outcome {
        TrackOutcome::Invalid(e) => Err(e.into()),
        outcome => {
            info!(outcome = ?outcome, "Command finished");
            println!("{outcome:?}");
            Ok(())
        }
    }
}

pub async fn visit(tracker: &Tracker, config: TrackingConfig, value: Option<f64>) -> CliResult<()> {
    start(tracker, config).await?;
    let outcome = tracker
        .route_changed(PageOptions {
            value,
            ..Default::default()
        })
        .await;
    finish(outcome)
}

pub async fn track(
    tracker: &Tracker,
    config: TrackingConfig,
    name: &str,
    props: Option<&str>,
) -> CliResult<()> {
    let properties = parse_properties(props)?;
    start(tracker, config).await?;
    finish(tracker.track_custom_event(name, properties).await)
}

pub async fn funnel(
    tracker: &Tracker,
    config: TrackingConfig,
    step: &str,
    number: i64,
    value: Option<f64>,
    props: Option<&str>,
) -> CliResult<()> {
    let properties = parse_properties(props)?;
    start(tracker, config).await?;
    let options = FunnelOptions {
        step_number: number,
        value,
        properties,
    };
    finish(tracker.track_funnel(step, options).await)
}

pub async fn identify(
    tracker: &Tracker,
    config: TrackingConfig,
    user_id: &str,
    traits: Option<&str>,
) -> CliResult<()> {
    let traits = parse_properties(traits)?;
    start(tracker, config).await?;
    finish(tracker.identify(user_id, traits).await)
}

pub async fn resync(tracker: &Tracker) {
    let synced = tracker.resync_offline_events().await;
    let remaining = tracker.offline_queue_len().await;
    println!("Resynced {synced} events, {remaining} still queued");
}

pub async fn clear(tracker: &Tracker, after_conversion: bool) -> CliResult<()> {
    let cleared = if after_conversion {
        tracker.clear_after_conversion()
    } else {
        tracker.clear_all_tracking_data().await
    };
    if !cleared {
        return Err("failed to clear tracking data".into());
    }
    println!("Cleared");
    Ok(())
}
