//! Attribution records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracking_core::{json_to_ext, Extensions};

use crate::{AttributionError, AttributionResult};

/// Fields with dedicated struct members; everything else is an extension.
const CORE_FIELDS: [&str; 7] = [
    "source", "medium", "campaign", "term", "content", "referrer", "timestamp",
];

/// Whether `key` names a dedicated field and can never be an extension.
pub(crate) fn is_core_field(key: &str) -> bool {
    CORE_FIELDS.contains(&key)
}

/// A touchpoint describing how a visitor arrived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribution {
    pub source: String,
    pub medium: String,
    pub campaign: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
    /// Capture time, Unix milliseconds
    pub timestamp: i64,
    #[serde(flatten)]
    pub extensions: Extensions,
}

impl Attribution {
    /// Direct visit with no marketing data.
    pub fn direct(timestamp: i64) -> Self {
        Self {
            source: "direct".into(),
            medium: "none".into(),
            campaign: None,
            term: None,
            content: None,
            referrer: None,
            timestamp,
            extensions: Extensions::new(),
        }
    }

    /// Parse a persisted record.
    ///
    /// `source` and `medium` must be strings, `timestamp` a number and
    /// `campaign` present as a string or `null`. Extension values that cannot
    /// be represented are dropped.
    pub fn from_value(value: &Value) -> AttributionResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| AttributionError::InvalidRecord("not an object".into()))?;

        let campaign = match obj.get("campaign") {
            Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            _ => return Err(AttributionError::InvalidRecord("campaign".into())),
        };

        Ok(Self {
            source: required_str(obj, "source")?,
            medium: required_str(obj, "medium")?,
            campaign,
            term: optional_str(obj, "term"),
            content: optional_str(obj, "content"),
            referrer: optional_str(obj, "referrer"),
            timestamp: required_timestamp(obj)?,
            extensions: extensions_of(obj),
        })
    }
}

/// A journey step: an [`Attribution`] without the referrer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyEntry {
    pub source: String,
    pub medium: String,
    pub campaign: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub timestamp: i64,
    #[serde(flatten)]
    pub extensions: Extensions,
}

impl JourneyEntry {
    /// Parse a persisted journey entry; same rules as [`Attribution::from_value`].
    pub fn from_value(value: &Value) -> AttributionResult<Self> {
        let attribution = Attribution::from_value(value)?;
        Ok(Self::from(&attribution))
    }
}

impl From<&Attribution> for JourneyEntry {
    fn from(attribution: &Attribution) -> Self {
        Self {
            source: attribution.source.clone(),
            medium: attribution.medium.clone(),
            campaign: attribution.campaign.clone(),
            term: attribution.term.clone(),
            content: attribution.content.clone(),
            timestamp: attribution.timestamp,
            extensions: attribution.extensions.clone(),
        }
    }
}

/// Attribution snapshot attached to every enriched event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionData {
    pub first_touch: Option<Attribution>,
    pub last_touch: Option<Attribution>,
    pub journey: Vec<JourneyEntry>,
}

fn required_str(obj: &Map<String, Value>, field: &str) -> AttributionResult<String> {
    obj.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AttributionError::InvalidRecord(field.to_string()))
}

fn optional_str(obj: &Map<String, Value>, field: &str) -> Option<String> {
    obj.get(field).and_then(Value::as_str).map(str::to_string)
}

fn required_timestamp(obj: &Map<String, Value>) -> AttributionResult<i64> {
    let value = obj
        .get("timestamp")
        .ok_or_else(|| AttributionError::InvalidRecord("timestamp".into()))?;
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .ok_or_else(|| AttributionError::InvalidRecord("timestamp".into()))
}

fn extensions_of(obj: &Map<String, Value>) -> Extensions {
    obj.iter()
        .filter(|(key, _)| !is_core_field(key))
        .filter_map(|(key, value)| json_to_ext(value.clone()).map(|ext| (key.clone(), ext)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tracking_core::ExtValue;

    #[test]
    fn test_from_value_accepts_valid_record() {
        let value = json!({
            "source": "google",
            "medium": "cpc",
            "campaign": null,
            "referrer": null,
            "timestamp": 1_700_000_000_000_i64,
            "utm_id": "abc"
        });

        let attribution = Attribution::from_value(&value).unwrap();
        assert_eq!(attribution.source, "google");
        assert_eq!(attribution.campaign, None);
        assert_eq!(
            attribution.extensions.get("utm_id"),
            Some(&ExtValue::String("abc".into()))
        );
    }

    #[test]
    fn test_from_value_rejects_missing_campaign() {
        let value = json!({"source": "google", "medium": "cpc", "timestamp": 1});
        assert!(Attribution::from_value(&value).is_err());
    }

    #[test]
    fn test_from_value_rejects_wrong_types() {
        assert!(Attribution::from_value(&json!([])).is_err());
        assert!(Attribution::from_value(
            &json!({"source": 1, "medium": "cpc", "campaign": null, "timestamp": 1})
        )
        .is_err());
        assert!(Attribution::from_value(
            &json!({"source": "a", "medium": "b", "campaign": null, "timestamp": "now"})
        )
        .is_err());
    }

    #[test]
    fn test_serialization_flattens_extensions() {
        let mut attribution = Attribution::direct(42);
        attribution
            .extensions
            .insert("utm_id".into(), ExtValue::String("x".into()));

        let value = serde_json::to_value(&attribution).unwrap();
        assert_eq!(
            value,
            json!({
                "source": "direct",
                "medium": "none",
                "campaign": null,
                "referrer": null,
                "timestamp": 42,
                "utm_id": "x"
            })
        );
        assert_eq!(Attribution::from_value(&value).unwrap(), attribution);
    }

    #[test]
    fn test_journey_entry_drops_referrer() {
        let mut attribution = Attribution::direct(7);
        attribution.referrer = Some("https://example.com".into());
        let entry = JourneyEntry::from(&attribution);

        let value = serde_json::to_value(&entry).unwrap();
        assert!(value.get("referrer").is_none());
        assert_eq!(entry.timestamp, 7);
    }
}
