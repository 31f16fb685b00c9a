use serde::{Deserialize, Serialize};
use tracking_attribution::AttributionData;
use tracking_core::Extensions;

use crate::{Context, TrackingEvent};

/// Wire format version carried by every enriched event.
pub const SCHEMA_VERSION: u32 = 1;

/// Unit of delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedEvent {
    pub schema_version: u32,
    pub event: TrackingEvent,
    pub attribution: AttributionData,
    pub context: Context,
}

/// Bundle an event with an attribution snapshot and the merged context.
pub fn enrich_event(
    event: TrackingEvent,
    attribution: AttributionData,
    context: &Context,
    global: &Extensions,
) -> EnrichedEvent {
    EnrichedEvent {
        schema_version: SCHEMA_VERSION,
        event,
        attribution,
        context: context.merged_with(global),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CustomEvent, DeviceInfo};
    use tracking_attribution::Attribution;

    #[test]
    fn test_enriched_event_wire_shape() {
        let context = Context::collect(&DeviceInfo::default(), "https://shop.test/", None, "s", 1);
        let attribution = AttributionData {
            first_touch: Some(Attribution::direct(1)),
            last_touch: None,
            journey: Vec::new(),
        };
        let mut global = Extensions::new();
        global.insert("plan".into(), "pro".into());

        let event = TrackingEvent::Custom(CustomEvent {
            name: "signup".into(),
            properties: None,
            timestamp: 2,
        });
        let enriched = enrich_event(event, attribution, &context, &global);

        let json = serde_json::to_value(&enriched).unwrap();
        assert_eq!(json["schemaVersion"], 1);
        assert_eq!(json["event"]["type"], "event");
        assert_eq!(json["attribution"]["firstTouch"]["source"], "direct");
        assert!(json["attribution"]["lastTouch"].is_null());
        assert_eq!(json["context"]["plan"], "pro");
        assert_eq!(json["context"]["sessionId"], "s");

        let back: EnrichedEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, enriched);
    }
}
