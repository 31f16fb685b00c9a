//! The tracking engine.

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tracking_attribution::{
    capture_attribution, has_utm_parameters, Attribution, AttributionData, AttributionStore,
    CaptureInput, CaptureOutcome, JourneyEntry,
};
use tracking_core::{Clock, Extensions, TrackingConfig};
use tracking_delivery::{DebugSummary, DeliveryEngine, DeliveryOutcome, DeliverySettings, Transport};
use tracking_events::{
    enrich_event, validate_event_name, validate_funnel_step, validate_page_value, Context,
    CustomEvent, EnrichedEvent, FunnelStepEvent, FunnelStepRecord, PageViewEvent, TrackingEvent,
    ValidationError,
};
use tracking_storage::{KeyValueStore, RecordStore};
use url::Url;

use crate::{
    ConfigSnapshot, Environment, ErrorContext, ErrorReporter, FunnelOptions, HealthReport,
    PageOptions, PendingCall, PreInitQueue, SessionManager, StorageHealth, TrackingExport,
};

const STORAGE_PROBE_KEY: &str = "__storage_test__";

/// Capabilities the engine is built from.
#[derive(Clone)]
pub struct TrackerParts {
    /// Local storage; also holds the journey and the session
    pub local: Arc<dyn KeyValueStore>,
    pub cookies: Arc<dyn KeyValueStore>,
    /// Offline queue and debug log
    pub records: Arc<dyn RecordStore>,
    pub transport: Arc<dyn Transport>,
    pub environment: Arc<dyn Environment>,
    pub clock: Arc<dyn Clock>,
    pub error_reporter: Option<Arc<dyn ErrorReporter>>,
}

/// Result of a tracking call.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackOutcome {
    /// Held until initialization
    Queued,
    Invalid(ValidationError),
    /// Page tracking disabled by an override
    Disabled,
    /// Dropped by the sampling rate
    Sampled,
    Dispatched(DeliveryOutcome),
}

/// Components bound to one configuration.
struct Core {
    config: TrackingConfig,
    attribution: AttributionStore,
    delivery: DeliveryEngine,
    sessions: SessionManager,
}

impl Core {
    fn build(parts: &TrackerParts, config: TrackingConfig) -> Self {
        let attribution = AttributionStore::new(
            parts.local.clone(),
            parts.cookies.clone(),
            &config,
            parts.clock.clone(),
        );
        let delivery = DeliveryEngine::new(
            DeliverySettings::from(&config),
            parts.transport.clone(),
            parts.records.clone(),
            parts.clock.clone(),
        );
        let sessions = SessionManager::new(parts.local.clone(), parts.clock.clone());
        Self {
            config,
            attribution,
            delivery,
            sessions,
        }
    }
}

struct TrackerState {
    core: Arc<Core>,
    /// Set once initialized
    context: Option<Context>,
    pending: PreInitQueue,
    funnel_steps: Vec<FunnelStepRecord>,
    global_context: Extensions,
    /// An initialize call is between its checks and binding the context
    initializing: bool,
    /// Background delivery of calls replayed by initialize
    replay: Option<JoinHandle<Vec<DeliveryOutcome>>>,
}

/// A tracking call after validation and enrichment.
enum Prepared {
    Ready(EnrichedEvent),
    Done(TrackOutcome),
}

/// Attribution and event tracking for one host.
///
/// Tracking calls made before [`Tracker::initialize`] are queued and replayed
/// in order. Storage accessors work before initialization against the
/// construction-time configuration.
pub struct Tracker {
    parts: TrackerParts,
    state: Mutex<TrackerState>,
}

impl Tracker {
    pub fn new(parts: TrackerParts) -> Self {
        Self::with_config(parts, TrackingConfig::default())
    }

    /// Tracker whose storage accessors use `config` before initialization.
    pub fn with_config(parts: TrackerParts, config: TrackingConfig) -> Self {
        let core = Arc::new(Core::build(&parts, config));
        Self {
            parts,
            state: Mutex::new(TrackerState {
                core,
                context: None,
                pending: PreInitQueue::default(),
                funnel_steps: Vec::new(),
                global_context: Extensions::new(),
                initializing: false,
                replay: None,
            }),
        }
    }

    pub fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn core(&self) -> Arc<Core> {
        self.state.lock().core.clone()
    }

    fn now_ms(&self) -> i64 {
        self.parts.clock.now_ms()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().context.is_some()
    }

    pub fn config(&self) -> TrackingConfig {
        self.core().config.clone()
    }

    /// Bind the configuration, capture attribution for the current page and
    /// replay queued calls.
    ///
    /// Replayed calls are enriched in order before this returns; their
    /// delivery runs in the background, see [`Tracker::wait_for_replay`].
    /// Returns false when already initialized or initializing, when there is
    /// no browsing context, or when the configuration is invalid.
    pub async fn initialize(&self, config: TrackingConfig) -> bool {
        {
            let mut state = self.state.lock();
            if state.context.is_some() || state.initializing {
                warn!("Tracker already initialized");
                return false;
            }
            state.initializing = true;
        }

        let env = self.parts.environment.clone();
        if !env.has_browsing_context() {
            debug!("No browsing context, tracker stays inactive");
            self.state.lock().initializing = false;
            return false;
        }

        if let Err(e) = config.validate() {
            self.report_error("initialize", &e, &config);
            self.state.lock().initializing = false;
            return false;
        }

        let core = Arc::new(Core::build(&self.parts, config));
        let now = self.now_ms();
        let url = env.current_url();
        let referrer = env.referrer();
        let session_id = core.sessions.get_or_create();
        let context = Context::collect(
            &env.device_info(),
            &url,
            referrer.as_deref(),
            session_id,
            now,
        );

        let input = CaptureInput {
            url: &url,
            referrer: referrer.as_deref(),
            is_reload: env.is_reload(),
            custom_utm: core.config.custom_utm.as_ref(),
        };
        match capture_attribution(&core.attribution, &input) {
            Ok(CaptureOutcome::Skipped) => {}
            Ok(_) => debug!(url = %url, "Initial attribution stored"),
            Err(e) => self.report_error("initialize", &e, &core.config),
        }

        let pending = {
            let mut state = self.state.lock();
            state.core = core.clone();
            state.context = Some(context);
            state.initializing = false;
            state.pending.drain(now)
        };

        info!(
            url = %url,
            replayed = pending.len(),
            version = Self::version(),
            "Tracker initialized"
        );

        let events: Vec<EnrichedEvent> = pending
            .into_iter()
            .filter_map(|call| match self.prepare_call(&core, call) {
                Prepared::Ready(event) => Some(event),
                Prepared::Done(outcome) => {
                    debug!(outcome = ?outcome, "Replayed call not sent");
                    None
                }
            })
            .collect();
        self.deliver_replayed(core, events).await;
        true
    }

    fn prepare_call(&self, core: &Core, call: PendingCall) -> Prepared {
        match call {
            PendingCall::Page(options) => self.prepare_page(core, options),
            PendingCall::Funnel { step, options } => self.prepare_funnel(core, &step, options),
            PendingCall::Track { name, properties } => {
                self.prepare_custom_event(core, &name, properties)
            }
        }
    }

    /// Send replayed events in order on a background task; inline when no
    /// runtime is available.
    async fn deliver_replayed(&self, core: Arc<Core>, events: Vec<EnrichedEvent>) {
        if events.is_empty() {
            return;
        }
        let online = self.parts.environment.is_online();
        let deliver_all = async move {
            let mut outcomes = Vec::with_capacity(events.len());
            for event in &events {
                let outcome = core.delivery.deliver(event, online).await;
                debug!(outcome = ?outcome, "Replayed queued call");
                outcomes.push(outcome);
            }
            outcomes
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn(deliver_all);
                self.state.lock().replay = Some(task);
            }
            Err(_) => {
                let outcomes = deliver_all.await;
                debug!(delivered = outcomes.len(), "Replayed calls delivered inline");
            }
        }
    }

    /// Wait for delivery of the calls replayed by [`Tracker::initialize`].
    ///
    /// Returns their outcomes in replay order; empty when nothing is pending.
    pub async fn wait_for_replay(&self) -> Vec<DeliveryOutcome> {
        let task = self.state.lock().replay.take();
        let Some(task) = task else {
            return Vec::new();
        };
        match task.await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                error!(error = %e, "Replay delivery task failed");
                Vec::new()
            }
        }
    }

    /// Queue `call` if not yet initialized; otherwise hand back the core.
    fn active_core(&self, call: impl FnOnce() -> PendingCall) -> Option<Arc<Core>> {
        let mut state = self.state.lock();
        if state.context.is_none() {
            let call = call();
            debug!(call = ?call, "Tracker not initialized, call queued");
            let now = self.now_ms();
            state.pending.push(call, now);
            return None;
        }
        Some(state.core.clone())
    }

    /// Path of the current page: environment URL first, then load context.
    fn current_path(&self) -> String {
        let url = self.parts.environment.current_url();
        match Url::parse(&url) {
            Ok(url) => url.path().to_string(),
            Err(_) => self
                .state
                .lock()
                .context
                .as_ref()
                .map(|c| c.path.clone())
                .unwrap_or_else(|| "/".to_string()),
        }
    }

    pub async fn track_page(&self, options: PageOptions) -> TrackOutcome {
        let Some(core) = self.active_core(|| PendingCall::Page(options.clone())) else {
            return TrackOutcome::Queued;
        };
        let prepared = self.prepare_page(&core, options);
        self.send(&core, prepared).await
    }

    fn prepare_page(&self, core: &Core, options: PageOptions) -> Prepared {
        let path = options.path.unwrap_or_else(|| self.current_path());
        if core.config.page_override(&path).is_some_and(|o| o.disable) {
            debug!(path = %path, "Page tracking disabled for path");
            return Prepared::Done(TrackOutcome::Disabled);
        }

        let title = options.title.or_else(|| self.parts.environment.page_title());
        let value = options
            .value
            .or_else(|| core.config.page_value(&path))
            .unwrap_or(0.0);
        let value = match validate_page_value(Some(value), &path) {
            Ok(value) => value,
            Err(e) => {
                warn!(path = %path, error = %e, "Invalid page view");
                return Prepared::Done(TrackOutcome::Invalid(e));
            }
        };

        self.recapture_if_tagged(core);

        if sampled_out(core.config.sampling_rate) {
            debug!(path = %path, "Page view sampled out");
            return Prepared::Done(TrackOutcome::Sampled);
        }

        let event = TrackingEvent::PageView(PageViewEvent {
            path,
            title,
            value,
            timestamp: self.now_ms(),
        });
        self.enrich(core, event)
    }

    /// Page view triggered by client-side navigation.
    ///
    /// Honors `disable_auto_page_view` overrides; explicit
    /// [`Tracker::track_page`] calls do not.
    pub async fn route_changed(&self, options: PageOptions) -> TrackOutcome {
        if self.is_initialized() {
            let path = options.path.clone().unwrap_or_else(|| self.current_path());
            let core = self.core();
            if core
                .config
                .page_override(&path)
                .is_some_and(|o| o.disable_auto_page_view)
            {
                debug!(path = %path, "Automatic page view disabled for path");
                return TrackOutcome::Disabled;
            }
        }
        self.track_page(options).await
    }

    /// New marketing parameters on the current URL produce a fresh touchpoint.
    fn recapture_if_tagged(&self, core: &Core) {
        let env = &self.parts.environment;
        let url = env.current_url();
        let custom_utm = core.config.custom_utm.as_ref();
        let tagged = Url::parse(&url)
            .map(|u| has_utm_parameters(&u, custom_utm))
            .unwrap_or(false);
        if !tagged {
            return;
        }

        let referrer = env.referrer();
        let input = CaptureInput {
            url: &url,
            referrer: referrer.as_deref(),
            is_reload: false,
            custom_utm,
        };
        if let Err(e) = capture_attribution(&core.attribution, &input) {
            self.report_error("track_page", &e, &core.config);
        }
    }

    pub async fn track_funnel(&self, step: &str, options: FunnelOptions) -> TrackOutcome {
        let Some(core) = self.active_core(|| PendingCall::Funnel {
            step: step.to_string(),
            options: options.clone(),
        }) else {
            return TrackOutcome::Queued;
        };
        let prepared = self.prepare_funnel(&core, step, options);
        self.send(&core, prepared).await
    }

    fn prepare_funnel(&self, core: &Core, step: &str, options: FunnelOptions) -> Prepared {
        let history = self.state.lock().funnel_steps.clone();
        let (step_number, value, warning) =
            match validate_funnel_step(step, options.step_number, options.value, &history) {
                Ok(validated) => validated,
                Err(e) => {
                    warn!(step = %step, error = %e, "Invalid funnel step");
                    return Prepared::Done(TrackOutcome::Invalid(e));
                }
            };
        if let Some(warning) = warning {
            warn!(step = %step, step_number, "{}", warning);
        }

        if sampled_out(core.config.sampling_rate) {
            debug!(step = %step, "Funnel step sampled out");
            return Prepared::Done(TrackOutcome::Sampled);
        }

        let timestamp = self.now_ms();
        self.state.lock().funnel_steps.push(FunnelStepRecord {
            step_name: step.to_string(),
            step_number,
            value,
            timestamp,
        });

        let event = TrackingEvent::FunnelStep(FunnelStepEvent {
            step: step.to_string(),
            step_number,
            value,
            properties: options.properties,
            timestamp,
        });
        self.enrich(core, event)
    }

    pub async fn track_custom_event(
        &self,
        name: &str,
        properties: Option<Extensions>,
    ) -> TrackOutcome {
        let Some(core) = self.active_core(|| PendingCall::Track {
            name: name.to_string(),
            properties: properties.clone(),
        }) else {
            return TrackOutcome::Queued;
        };
        let prepared = self.prepare_custom_event(&core, name, properties);
        self.send(&core, prepared).await
    }

    fn prepare_custom_event(
        &self,
        core: &Core,
        name: &str,
        properties: Option<Extensions>,
    ) -> Prepared {
        if let Err(e) = validate_event_name(name) {
            warn!(name = %name, error = %e, "Invalid event name");
            return Prepared::Done(TrackOutcome::Invalid(e));
        }

        if sampled_out(core.config.sampling_rate) {
            debug!(name = %name, "Event sampled out");
            return Prepared::Done(TrackOutcome::Sampled);
        }

        let event = TrackingEvent::Custom(CustomEvent {
            name: name.to_string(),
            properties,
            timestamp: self.now_ms(),
        });
        self.enrich(core, event)
    }

    /// Custom `identify` event carrying `userId` merged with `traits`.
    pub async fn identify(&self, user_id: &str, traits: Option<Extensions>) -> TrackOutcome {
        let mut properties = Extensions::new();
        properties.insert("userId".into(), user_id.into());
        properties.extend(traits.unwrap_or_default());
        self.track_custom_event("identify", Some(properties)).await
    }

    /// Merge `context` into the global context; later keys win.
    pub fn set_global_context(&self, context: Extensions) {
        self.state.lock().global_context.extend(context);
    }

    pub fn global_context(&self) -> Extensions {
        self.state.lock().global_context.clone()
    }

    /// Funnel steps sent this engine lifetime, oldest first.
    pub fn funnel_steps(&self) -> Vec<FunnelStepRecord> {
        self.state.lock().funnel_steps.clone()
    }

    /// Attach attribution, the refreshed session and the global context.
    fn enrich(&self, core: &Core, event: TrackingEvent) -> Prepared {
        let session_id = core.sessions.get_or_create();
        let (context, global) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let Some(context) = state.context.as_mut() else {
                return Prepared::Done(TrackOutcome::Queued);
            };
            context.session_id = session_id;
            (context.clone(), state.global_context.clone())
        };
        Prepared::Ready(enrich_event(
            event,
            core.attribution.snapshot(),
            &context,
            &global,
        ))
    }

    async fn send(&self, core: &Core, prepared: Prepared) -> TrackOutcome {
        match prepared {
            Prepared::Ready(event) => {
                let online = self.parts.environment.is_online();
                TrackOutcome::Dispatched(core.delivery.deliver(&event, online).await)
            }
            Prepared::Done(outcome) => outcome,
        }
    }

    pub fn first_touch(&self) -> Option<Attribution> {
        self.core().attribution.first_touch()
    }

    pub fn last_touch(&self) -> Option<Attribution> {
        self.core().attribution.last_touch()
    }

    pub fn journey(&self) -> Vec<JourneyEntry> {
        self.core().attribution.journey()
    }

    pub fn attribution_data(&self) -> AttributionData {
        self.core().attribution.snapshot()
    }

    pub fn session_id(&self) -> Option<String> {
        self.core().sessions.current().map(|s| s.id)
    }

    pub fn set_first_touch(&self, attribution: &Attribution) -> bool {
        if !is_valid_touch(&attribution.source, &attribution.medium) {
            warn!("Rejected first touch without source or medium");
            return false;
        }
        let core = self.core();
        self.succeeded(
            "set_first_touch",
            core.attribution.set_first_touch(attribution),
            &core.config,
        )
    }

    pub fn set_last_touch(&self, attribution: &Attribution) -> bool {
        if !is_valid_touch(&attribution.source, &attribution.medium) {
            warn!("Rejected last touch without source or medium");
            return false;
        }
        let core = self.core();
        self.succeeded(
            "set_last_touch",
            core.attribution.set_last_touch(attribution),
            &core.config,
        )
    }

    pub fn set_journey(&self, journey: &[JourneyEntry]) -> bool {
        if !journey.iter().all(|e| is_valid_touch(&e.source, &e.medium)) {
            warn!("Rejected journey with invalid entries");
            return false;
        }
        let core = self.core();
        self.succeeded("set_journey", core.attribution.set_journey(journey), &core.config)
    }

    pub fn clear_first_touch(&self) -> bool {
        let core = self.core();
        self.succeeded("clear_first_touch", core.attribution.clear_first_touch(), &core.config)
    }

    pub fn clear_last_touch(&self) -> bool {
        let core = self.core();
        self.succeeded("clear_last_touch", core.attribution.clear_last_touch(), &core.config)
    }

    pub fn clear_journey(&self) -> bool {
        let core = self.core();
        self.succeeded("clear_journey", core.attribution.clear_journey(), &core.config)
    }

    /// Remove first touch, last touch and journey.
    pub fn clear_all_attribution(&self) -> bool {
        let core = self.core();
        self.succeeded("clear_all_attribution", core.attribution.clear_all(), &core.config)
    }

    /// Remove last touch and journey, keeping the first touch.
    pub fn clear_after_conversion(&self) -> bool {
        let core = self.core();
        self.succeeded(
            "clear_after_conversion",
            core.attribution.clear_after_conversion(),
            &core.config,
        )
    }

    pub fn clear_session(&self) -> bool {
        self.core().sessions.clear()
    }

    pub async fn debug_events(&self) -> Vec<EnrichedEvent> {
        match self.core().delivery.debug_log().events().await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "Failed to read debug events");
                Vec::new()
            }
        }
    }

    pub async fn debug_summary(&self) -> DebugSummary {
        match self.core().delivery.debug_log().summary().await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "Failed to summarize debug events");
                DebugSummary::default()
            }
        }
    }

    pub async fn clear_debug_events(&self) -> bool {
        let core = self.core();
        let result = core.delivery.debug_log().clear().await;
        self.succeeded("clear_debug_events", result, &core.config)
    }

    /// Remove attribution, the session and the debug log.
    pub async fn clear_all_tracking_data(&self) -> bool {
        let attribution = self.clear_all_attribution();
        let session = self.clear_session();
        let debug_events = self.clear_debug_events().await;
        attribution && session && debug_events
    }

    pub async fn export_tracking_data(&self) -> TrackingExport {
        let now = self.now_ms();
        let core = self.core();
        TrackingExport {
            timestamp: DateTime::<Utc>::from_timestamp_millis(now)
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
                .unwrap_or_default(),
            session_id: core.sessions.current().map(|s| s.id),
            attribution: core.attribution.snapshot(),
            debug_events: self.debug_events().await,
        }
    }

    pub async fn export_tracking_json(&self) -> String {
        let export = self.export_tracking_data().await;
        match serde_json::to_string_pretty(&export) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "Failed to serialize tracking export");
                "{}".to_string()
            }
        }
    }

    pub async fn health(&self) -> HealthReport {
        let now = self.now_ms();
        let (initialized, queue_size) = {
            let mut state = self.state.lock();
            state.pending.purge_expired(now);
            (state.context.is_some(), state.pending.len())
        };

        let last_event_time = self
            .debug_events()
            .await
            .first()
            .map(|event| event.event.timestamp());

        let local = &self.parts.local;
        let available = local
            .set(STORAGE_PROBE_KEY, STORAGE_PROBE_KEY)
            .and_then(|_| local.remove(STORAGE_PROBE_KEY))
            .is_ok();
        let usage = local.usage_bytes().unwrap_or(0);

        HealthReport {
            initialized,
            queue_size,
            last_event_time,
            storage: StorageHealth { available, usage },
        }
    }

    /// Resend persisted offline events; returns how many were delivered.
    pub async fn resync_offline_events(&self) -> usize {
        let online = self.parts.environment.is_online();
        self.core().delivery.resync(online).await
    }

    pub async fn offline_queue_len(&self) -> usize {
        match self.core().delivery.offline_queue().pending_count().await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Failed to count offline events");
                0
            }
        }
    }

    fn succeeded<E>(&self, operation: &'static str, result: Result<(), E>, config: &TrackingConfig) -> bool
    where
        E: std::error::Error + 'static,
    {
        match result {
            Ok(()) => true,
            Err(e) => {
                self.report_error(operation, &e, config);
                false
            }
        }
    }

    fn report_error(
        &self,
        operation: &'static str,
        error: &(dyn std::error::Error + 'static),
        config: &TrackingConfig,
    ) {
        error!(operation, error = %error, "Tracking operation failed");

        let Some(reporter) = self.parts.error_reporter.as_ref() else {
            return;
        };
        let env = &self.parts.environment;
        let context = ErrorContext {
            function: operation,
            url: env.current_url(),
            referrer: env.referrer(),
            config: ConfigSnapshot::from(config),
            timestamp: self.now_ms(),
        };
        reporter.report(error, &context);
    }
}

fn is_valid_touch(source: &str, medium: &str) -> bool {
    !source.trim().is_empty() && !medium.trim().is_empty()
}

fn sampled_out(rate: f64) -> bool {
    rate < 1.0 && rand::thread_rng().gen::<f64>() >= rate
}
