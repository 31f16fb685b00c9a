//! Execution context attached to every event.

use serde::{Deserialize, Serialize};
use tracking_core::{ExtValue, Extensions};
use url::Url;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Device facts reported by the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub user_agent: String,
    pub screen: Dimensions,
    pub viewport: Dimensions,
    pub language: String,
    pub timezone: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            user_agent: String::new(),
            screen: Dimensions::default(),
            viewport: Dimensions::default(),
            language: "en".into(),
            timezone: "UTC".into(),
        }
    }
}

/// Wire names of the dedicated [`Context`] fields.
const CONTEXT_FIELDS: [&str; 10] = [
    "userAgent",
    "screen",
    "viewport",
    "language",
    "timezone",
    "timestamp",
    "url",
    "path",
    "referrer",
    "sessionId",
];

/// Per-engine context snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    pub user_agent: String,
    pub screen: Dimensions,
    pub viewport: Dimensions,
    pub language: String,
    pub timezone: String,
    /// Load time, Unix milliseconds
    pub timestamp: i64,
    pub url: String,
    pub path: String,
    pub referrer: Option<String>,
    pub session_id: String,
    #[serde(flatten)]
    pub extensions: Extensions,
}

impl Context {
    /// Build the load-time context for `url`.
    pub fn collect(
        device: &DeviceInfo,
        url: &str,
        referrer: Option<&str>,
        session_id: impl Into<String>,
        now_ms: i64,
    ) -> Self {
        let path = Url::parse(url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| "/".to_string());

        Self {
            user_agent: device.user_agent.clone(),
            screen: device.screen,
            viewport: device.viewport,
            language: device.language.clone(),
            timezone: device.timezone.clone(),
            timestamp: now_ms,
            url: url.to_string(),
            path,
            referrer: referrer.filter(|r| !r.is_empty()).map(str::to_string),
            session_id: session_id.into(),
            extensions: Extensions::new(),
        }
    }

    /// Copy of this context with `global` merged in; global keys win.
    ///
    /// A global key naming a context field replaces that field when the value
    /// has the field's type and is dropped otherwise. Every other key lands in
    /// the extensions.
    pub fn merged_with(&self, global: &Extensions) -> Context {
        let mut merged = self.clone();
        for (key, value) in global {
            if !CONTEXT_FIELDS.contains(&key.as_str()) {
                merged.extensions.insert(key.clone(), value.clone());
                continue;
            }
            match (key.as_str(), value) {
                ("userAgent", ExtValue::String(s)) => merged.user_agent = s.clone(),
                ("language", ExtValue::String(s)) => merged.language = s.clone(),
                ("timezone", ExtValue::String(s)) => merged.timezone = s.clone(),
                ("url", ExtValue::String(s)) => merged.url = s.clone(),
                ("path", ExtValue::String(s)) => merged.path = s.clone(),
                ("sessionId", ExtValue::String(s)) => merged.session_id = s.clone(),
                ("referrer", ExtValue::String(s)) => merged.referrer = Some(s.clone()),
                ("timestamp", ExtValue::Number(n)) if n.is_finite() => {
                    merged.timestamp = *n as i64
                }
                _ => {}
            }
        }
        merged
    }
}
