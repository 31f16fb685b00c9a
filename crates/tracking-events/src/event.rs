//! Application event types.

use serde::{Deserialize, Serialize};
use tracking_core::Extensions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageViewEvent {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub value: f64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelStepEvent {
    pub step: String,
    pub step_number: u32,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Extensions>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomEvent {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Extensions>,
    pub timestamp: i64,
}

/// Event payload, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TrackingEvent {
    #[serde(rename = "pageview")]
    PageView(PageViewEvent),
    #[serde(rename = "funnel")]
    FunnelStep(FunnelStepEvent),
    #[serde(rename = "event")]
    Custom(CustomEvent),
}

impl TrackingEvent {
    /// Wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            TrackingEvent::PageView(_) => "pageview",
            TrackingEvent::FunnelStep(_) => "funnel",
            TrackingEvent::Custom(_) => "event",
        }
    }

    /// Path, step or event name.
    pub fn label(&self) -> &str {
        match self {
            TrackingEvent::PageView(e) => &e.path,
            TrackingEvent::FunnelStep(e) => &e.step,
            TrackingEvent::Custom(e) => &e.name,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            TrackingEvent::PageView(e) => e.timestamp,
            TrackingEvent::FunnelStep(e) => e.timestamp,
            TrackingEvent::Custom(e) => e.timestamp,
        }
    }
}

/// A funnel step already sent in this session.
#[derive(Debug, Clone, PartialEq)]
pub struct FunnelStepRecord {
    pub step_name: String,
    pub step_number: u32,
    pub value: f64,
    pub timestamp: i64,
}
