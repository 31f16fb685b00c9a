//! Tracking configuration.

use crate::{CoreError, CoreResult, Paths, DAY_MS};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use url::Url;

/// Default first-touch lifetime.
pub const DEFAULT_FIRST_TOUCH_TTL_DAYS: u32 = 90;
/// Default last-touch lifetime.
pub const DEFAULT_LAST_TOUCH_TTL_DAYS: u32 = 30;
/// Default journey entry lifetime.
pub const DEFAULT_JOURNEY_TTL_DAYS: u32 = 30;
/// Default journey length cap.
pub const DEFAULT_MAX_JOURNEY_SIZE: usize = 50;
/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Where first/last-touch records are persisted.
///
/// The journey and the session always live in local storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageBackend {
    #[default]
    Cookie,
    LocalStorage,
}

/// Attribution record lifetimes, in days.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionTtlConfig {
    pub first_touch_days: Option<u32>,
    pub last_touch_days: Option<u32>,
    pub journey_days: Option<u32>,
}

impl AttributionTtlConfig {
    pub fn first_touch_days(&self) -> u32 {
        self.first_touch_days.unwrap_or(DEFAULT_FIRST_TOUCH_TTL_DAYS)
    }

    pub fn last_touch_days(&self) -> u32 {
        self.last_touch_days.unwrap_or(DEFAULT_LAST_TOUCH_TTL_DAYS)
    }

    pub fn journey_days(&self) -> u32 {
        self.journey_days.unwrap_or(DEFAULT_JOURNEY_TTL_DAYS)
    }

    pub fn first_touch_ms(&self) -> i64 {
        i64::from(self.first_touch_days()) * DAY_MS
    }

    pub fn last_touch_ms(&self) -> i64 {
        i64::from(self.last_touch_days()) * DAY_MS
    }

    pub fn journey_ms(&self) -> i64 {
        i64::from(self.journey_days()) * DAY_MS
    }
}

/// Custom parameters captured under a namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomParamsConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Explicit keys to capture; all non-marketing keys when absent.
    pub keys: Option<Vec<String>>,
    #[serde(default = "default_true", rename = "parseJSON")]
    pub parse_json: bool,
    /// Namespace key; an empty string copies values flat.
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for CustomParamsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            keys: None,
            parse_json: true,
            namespace: default_namespace(),
        }
    }
}

/// Custom UTM parameter handling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomUtmConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Prefix for generic copying (`utm_` when absent).
    pub prefix: Option<String>,
    pub allowed_keys: Option<Vec<String>>,
    /// Field name (`source`, `medium`, ...) to query key.
    #[serde(default)]
    pub key_mapping: HashMap<String, String>,
    #[serde(default)]
    pub custom_params: Option<CustomParamsConfig>,
}

impl CustomUtmConfig {
    /// Mapped query key for a field, only when custom UTM is enabled.
    pub fn mapped_key(&self, field: &str) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.key_mapping
            .get(field)
            .map(String::as_str)
            .filter(|key| !key.is_empty())
    }

    /// True when `key` is one of the mapped query keys.
    pub fn is_mapped_key(&self, key: &str) -> bool {
        self.key_mapping.values().any(|mapped| mapped == key)
    }
}

/// Per-path page tracking overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageOverride {
    #[serde(default)]
    pub disable: bool,
    pub value: Option<f64>,
    #[serde(default)]
    pub disable_auto_page_view: bool,
}

/// Delivery pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryConfig {
    /// Total POST attempts in the retry tier.
    pub max_attempts: u32,
    /// Base backoff delay in milliseconds, doubled per attempt.
    pub retry_base_delay_ms: u64,
    /// Upper bound of random jitter added to each backoff delay.
    pub max_jitter_ms: u64,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Persist events while offline or after transient exhaustion.
    pub offline_queue: bool,
    /// Resync attempts before an offline event is dropped.
    pub offline_max_retries: u32,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_base_delay_ms: 1000,
            max_jitter_ms: 1000,
            timeout_secs: 10,
            offline_queue: true,
            offline_max_retries: 3,
        }
    }
}

/// Main tracking configuration, accepted as camelCase JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackingConfig {
    pub api_endpoint: Option<String>,
    pub storage: StorageBackend,
    pub debug: bool,
    #[serde(rename = "attributionTTL")]
    pub attribution_ttl: AttributionTtlConfig,
    #[serde(rename = "customUTM")]
    pub custom_utm: Option<CustomUtmConfig>,
    pub disable_api: bool,
    pub max_journey_size: Option<usize>,
    pub sampling_rate: f64,
    pub page_values: HashMap<String, f64>,
    pub page_overrides: HashMap<String, PageOverride>,
    pub use_fetch_instead_of_beacon: bool,
    pub delivery: DeliveryConfig,
    pub log_level: String,
}

fn default_true() -> bool {
    true
}

fn default_namespace() -> String {
    "custom".to_string()
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            api_endpoint: None,
            storage: StorageBackend::default(),
            debug: false,
            attribution_ttl: AttributionTtlConfig::default(),
            custom_utm: None,
            disable_api: false,
            max_journey_size: None,
            sampling_rate: 1.0,
            page_values: HashMap::new(),
            page_overrides: HashMap::new(),
            use_fetch_instead_of_beacon: false,
            delivery: DeliveryConfig::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl TrackingConfig {
    /// Create a config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the default config file, falling back to defaults.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse configuration from a JSON document.
    pub fn from_json(content: &str) -> CoreResult<Self> {
        let config: TrackingConfig = serde_json::from_str(content)?;
        Ok(config)
    }

    /// Save configuration to the default config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        if let Some(endpoint) = env_non_empty("TRACKING_API_ENDPOINT") {
            self.api_endpoint = Some(endpoint);
        }
        if let Some(debug) = env_non_empty("TRACKING_DEBUG") {
            self.debug = matches!(debug.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(level) = env_non_empty("TRACKING_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(rate) = env_non_empty("TRACKING_SAMPLING_RATE").and_then(|r| r.parse().ok()) {
            self.sampling_rate = rate;
        }
    }

    /// Check value ranges and the endpoint syntax.
    pub fn validate(&self) -> CoreResult<()> {
        if let Some(endpoint) = &self.api_endpoint {
            Url::parse(endpoint)?;
        }
        if !(0.0..=1.0).contains(&self.sampling_rate) {
            return Err(CoreError::Config(format!(
                "samplingRate must be within [0, 1], got {}",
                self.sampling_rate
            )));
        }
        if self.max_journey_size == Some(0) {
            return Err(CoreError::Config("maxJourneySize must be positive".to_string()));
        }
        if self.delivery.max_attempts == 0 {
            return Err(CoreError::Config(
                "delivery.maxAttempts must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn max_journey_size(&self) -> usize {
        self.max_journey_size.unwrap_or(DEFAULT_MAX_JOURNEY_SIZE)
    }

    /// Configured endpoint, unless delivery is administratively disabled.
    pub fn delivery_endpoint(&self) -> Option<&str> {
        if self.disable_api {
            return None;
        }
        self.api_endpoint.as_deref().filter(|e| !e.is_empty())
    }

    /// Override for a page path, if any.
    pub fn page_override(&self, path: &str) -> Option<&PageOverride> {
        self.page_overrides.get(path)
    }

    /// Fixed value for a page path: override first, then configured page values.
    pub fn page_value(&self, path: &str) -> Option<f64> {
        self.page_override(path)
            .and_then(|o| o.value)
            .or_else(|| self.page_values.get(path).copied())
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|v| !v.is_empty())
}
