//! URL and referrer parsing into [`Attribution`] records.

use std::collections::HashMap;
use tracking_core::{json_to_ext, CustomUtmConfig, ExtValue, Extensions};
use url::Url;

use crate::model::is_core_field;
use crate::{Attribution, AttributionResult};

/// Standard UTM parameter names, in field order.
pub const STANDARD_UTM_PARAMS: [&str; 5] = [
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
];

const SEARCH_ENGINES: [&str; 7] = [
    "google",
    "bing",
    "yahoo",
    "duckduckgo",
    "baidu",
    "yandex",
    "ecosia",
];

const SOCIAL_NETWORKS: [&str; 7] = [
    "facebook",
    "twitter",
    "linkedin",
    "instagram",
    "pinterest",
    "reddit",
    "tiktok",
];

/// Query parameters in order, first occurrence of each key kept.
struct QueryParams {
    ordered: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl QueryParams {
    fn from_url(url: &Url) -> Self {
        let mut ordered = Vec::new();
        let mut index = HashMap::new();
        for (key, value) in url.query_pairs() {
            if !index.contains_key(key.as_ref()) {
                index.insert(key.to_string(), ordered.len());
                ordered.push((key.into_owned(), value.into_owned()));
            }
        }
        Self { ordered, index }
    }

    fn has(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Value for `key`; empty values count as absent.
    fn get(&self, key: &str) -> Option<&str> {
        self.index
            .get(key)
            .map(|&i| self.ordered[i].1.as_str())
            .filter(|v| !v.is_empty())
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.ordered.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn is_standard_param(key: &str) -> bool {
    STANDARD_UTM_PARAMS.contains(&key)
}

/// Whether the URL carries any standard or custom-mapped marketing parameter.
pub fn has_utm_parameters(url: &Url, custom: Option<&CustomUtmConfig>) -> bool {
    let params = QueryParams::from_url(url);
    if STANDARD_UTM_PARAMS.iter().any(|p| params.has(p)) {
        return true;
    }

    match custom {
        Some(cfg) if cfg.enabled => cfg
            .key_mapping
            .values()
            .filter(|key| !key.is_empty())
            .any(|key| params.has(key)),
        _ => false,
    }
}

/// Whether `referrer` points at a different host than `current_host`.
///
/// Unparseable referrers are treated as internal.
pub fn is_external_referrer(referrer: &str, current_host: &str) -> bool {
    match Url::parse(referrer) {
        Ok(url) => url.host_str().unwrap_or_default() != current_host,
        Err(_) => false,
    }
}

fn referrer_host(referrer: Option<&str>) -> Option<String> {
    let url = Url::parse(referrer?).ok()?;
    url.host_str().map(str::to_lowercase)
}

/// Derive `(source, medium)` from a referrer.
///
/// Returns `None` when there is no usable referrer.
pub fn source_medium_from_referrer(referrer: Option<&str>) -> Option<(String, &'static str)> {
    let host = referrer_host(referrer)?;

    if let Some(engine) = SEARCH_ENGINES.iter().find(|e| host.contains(*e)) {
        return Some((engine.to_string(), "organic"));
    }
    if let Some(network) = SOCIAL_NETWORKS.iter().find(|n| host.contains(*n)) {
        return Some((network.to_string(), "social"));
    }

    let source = host.strip_prefix("www.").unwrap_or(&host).to_string();
    Some((source, "referral"))
}

/// Parse a touchpoint from the page URL and referrer.
///
/// Query parameters win over referrer heuristics; with neither, the visit is
/// `direct` / `none`.
pub fn parse_attribution_from_url(
    url: &str,
    referrer: Option<&str>,
    custom: Option<&CustomUtmConfig>,
    now_ms: i64,
) -> AttributionResult<Attribution> {
    let url = Url::parse(url)?;
    let params = QueryParams::from_url(&url);
    let custom = custom.filter(|cfg| cfg.enabled);

    let field = |name: &str| -> Option<String> {
        let standard = format!("utm_{name}");
        custom
            .and_then(|cfg| cfg.mapped_key(name))
            .and_then(|key| params.get(key))
            .or_else(|| params.get(&standard))
            .map(str::to_string)
    };

    let source = field("source");
    let medium = field("medium");
    let from_referrer = source_medium_from_referrer(referrer);

    let mut attribution = Attribution {
        source: source
            .or_else(|| from_referrer.as_ref().map(|(s, _)| s.clone()))
            .unwrap_or_else(|| "direct".into()),
        medium: medium
            .or_else(|| from_referrer.as_ref().map(|(_, m)| m.to_string()))
            .unwrap_or_else(|| "none".into()),
        campaign: field("campaign"),
        term: field("term"),
        content: field("content"),
        referrer: referrer.map(str::to_string),
        timestamp: now_ms,
        extensions: Extensions::new(),
    };

    if let Some(cfg) = custom {
        copy_prefixed_params(&params, cfg, &mut attribution.extensions);
        copy_custom_params(&params, cfg, &mut attribution.extensions);
    }

    Ok(attribution)
}

fn copy_prefixed_params(params: &QueryParams, cfg: &CustomUtmConfig, out: &mut Extensions) {
    let prefix = cfg.prefix.as_deref().filter(|p| !p.is_empty()).unwrap_or("utm_");
    let allowed = cfg.allowed_keys.as_deref();
    let is_allowed = |key: &str| allowed.map_or(false, |keys| keys.iter().any(|k| k == key));

    for (key, value) in params.iter() {
        if is_standard_param(key) || cfg.is_mapped_key(key) || is_core_field(key) {
            continue;
        }
        let copy = if key.starts_with(prefix) {
            allowed.is_none() || is_allowed(key)
        } else {
            is_allowed(key)
        };
        if copy {
            out.insert(key.to_string(), ExtValue::String(value.to_string()));
        }
    }
}

fn copy_custom_params(params: &QueryParams, cfg: &CustomUtmConfig, out: &mut Extensions) {
    let Some(custom_params) = cfg.custom_params.as_ref().filter(|c| c.enabled) else {
        return;
    };
    let prefix = cfg.prefix.as_deref().filter(|p| !p.is_empty());
    let flat = custom_params.namespace.is_empty();
    if is_core_field(&custom_params.namespace) {
        return;
    }

    let mut captured = Extensions::new();
    for (key, value) in params.iter() {
        if is_standard_param(key)
            || cfg.is_mapped_key(key)
            || prefix.map_or(false, |p| key.starts_with(p))
            || (flat && is_core_field(key))
        {
            continue;
        }
        if let Some(keys) = &custom_params.keys {
            if !keys.iter().any(|k| k == key) {
                continue;
            }
        }

        let parsed = custom_params
            .parse_json
            .then(|| serde_json::from_str(value).ok().and_then(json_to_ext))
            .flatten()
            .unwrap_or_else(|| ExtValue::String(value.to_string()));
        captured.insert(key.to_string(), parsed);
    }

    if captured.is_empty() {
        return;
    }
    if flat {
        out.extend(captured);
    } else {
        match out.get_mut(&custom_params.namespace) {
            Some(ExtValue::Map(existing)) => existing.extend(captured),
            _ => {
                out.insert(custom_params.namespace.clone(), ExtValue::Map(captured));
            }
        }
    }
}
