//! Storage key constants.

/// Storage keys and record collections used by the tracking engine.
pub struct StorageKeys;

impl StorageKeys {
    /// Prefix shared by every key-value entry.
    pub const PREFIX: &'static str = "_utm_tracking_";

    /// First-touch attribution (JSON)
    pub const FIRST_TOUCH: &'static str = "_utm_tracking_ft";

    /// Last-touch attribution (JSON)
    pub const LAST_TOUCH: &'static str = "_utm_tracking_lt";

    /// Journey entries (JSON array)
    pub const JOURNEY: &'static str = "_utm_tracking_journey";

    /// Session id with last activity (JSON)
    pub const SESSION: &'static str = "_utm_tracking_session_id";

    /// Record collection for events awaiting resync
    pub const OFFLINE_EVENTS: &'static str = "offline_events";

    /// Record collection for the debug event log
    pub const DEBUG_EVENTS: &'static str = "debug_events";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_keys_share_prefix() {
        for key in [
            StorageKeys::FIRST_TOUCH,
            StorageKeys::LAST_TOUCH,
            StorageKeys::JOURNEY,
            StorageKeys::SESSION,
        ] {
            assert!(key.starts_with(StorageKeys::PREFIX), "{key}");
        }

        let keys = [
            StorageKeys::FIRST_TOUCH,
            StorageKeys::LAST_TOUCH,
            StorageKeys::JOURNEY,
            StorageKeys::SESSION,
        ];
        let unique: std::collections::HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len(), "Storage keys must be unique");
    }
}
