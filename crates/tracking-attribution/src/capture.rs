//! Capture decision for a navigation.

use tracing::{debug, info};
use tracking_core::CustomUtmConfig;
use url::Url;

use crate::codec::{has_utm_parameters, is_external_referrer, parse_attribution_from_url};
use crate::{Attribution, AttributionResult, AttributionStore};

/// Navigation facts needed to decide on a capture.
#[derive(Debug, Clone, Copy)]
pub struct CaptureInput<'a> {
    pub url: &'a str,
    pub referrer: Option<&'a str>,
    pub is_reload: bool,
    pub custom_utm: Option<&'a CustomUtmConfig>,
}

/// What a capture run did.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// Marketing parameters, an external referrer or a first direct visit
    Captured(Attribution),
    /// Nothing qualified but no first touch existed yet
    DefaultCaptured(Attribution),
    /// Internal navigation or reload with attribution already present
    Skipped,
}

/// Whether this navigation should produce a new touchpoint.
pub fn should_capture_attribution(
    url: &Url,
    referrer: Option<&str>,
    existing_first_touch: Option<&Attribution>,
    is_reload: bool,
    custom_utm: Option<&CustomUtmConfig>,
) -> bool {
    if has_utm_parameters(url, custom_utm) {
        return true;
    }

    let host = url.host_str().unwrap_or_default();
    if let Some(referrer) = referrer {
        if is_external_referrer(referrer, host) {
            return true;
        }
    }

    existing_first_touch.is_none() && referrer.is_none() && !is_reload
}

/// Run the capture procedure against `store`.
///
/// Writes last touch, first touch when none exists, and extends the journey.
pub fn capture_attribution(
    store: &AttributionStore,
    input: &CaptureInput<'_>,
) -> AttributionResult<CaptureOutcome> {
    let url = Url::parse(input.url)?;
    let referrer = input.referrer.filter(|r| !r.is_empty());
    let first_touch = store.first_touch();

    let should_capture = should_capture_attribution(
        &url,
        referrer,
        first_touch.as_ref(),
        input.is_reload,
        input.custom_utm,
    );

    if !should_capture && first_touch.is_some() {
        debug!(url = input.url, "Attribution capture skipped");
        return Ok(CaptureOutcome::Skipped);
    }

    let attribution =
        parse_attribution_from_url(input.url, referrer, input.custom_utm, store.now_ms())?;

    store.set_last_touch(&attribution)?;
    if first_touch.is_none() {
        store.set_first_touch(&attribution)?;
    }

    let journey = store.journey();
    let manager = store.journey_manager();
    if manager.should_append(&attribution, journey.last()) {
        let updated = manager.append(journey, &attribution, store.now_ms());
        store.set_journey(&updated)?;
    }

    info!(
        source = %attribution.source,
        medium = %attribution.medium,
        campaign = attribution.campaign.as_deref().unwrap_or(""),
        is_default = !should_capture,
        "Attribution captured"
    );

    Ok(if should_capture {
        CaptureOutcome::Captured(attribution)
    } else {
        CaptureOutcome::DefaultCaptured(attribution)
    })
}
