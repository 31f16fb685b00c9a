//! Host environment capability.

use parking_lot::RwLock;
use tracking_events::DeviceInfo;

/// What the engine needs to know about where it runs.
pub trait Environment: Send + Sync {
    /// Whether there is a page to attribute at all.
    fn has_browsing_context(&self) -> bool {
        true
    }

    fn current_url(&self) -> String;

    fn referrer(&self) -> Option<String>;

    /// Whether the current load is a reload rather than a navigation.
    fn is_reload(&self) -> bool;

    fn is_online(&self) -> bool;

    fn device_info(&self) -> DeviceInfo;

    fn page_title(&self) -> Option<String>;
}

#[derive(Debug, Clone)]
struct EnvState {
    url: String,
    referrer: Option<String>,
    is_reload: bool,
    online: bool,
    title: Option<String>,
    device: DeviceInfo,
}

/// Environment driven by explicit setters.
///
/// Used by hosts without a browser (the CLI) and by tests.
#[derive(Debug)]
pub struct StaticEnvironment {
    state: RwLock<EnvState>,
}

impl StaticEnvironment {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(EnvState {
                url: url.into(),
                referrer: None,
                is_reload: false,
                online: true,
                title: None,
                device: DeviceInfo::default(),
            }),
        }
    }

    pub fn with_referrer(self, referrer: impl Into<String>) -> Self {
        self.state.write().referrer = Some(referrer.into());
        self
    }

    pub fn with_device(self, device: DeviceInfo) -> Self {
        self.state.write().device = device;
        self
    }

    /// Simulate a navigation: new URL and referrer, not a reload.
    pub fn navigate(&self, url: impl Into<String>, referrer: Option<String>) {
        let mut state = self.state.write();
        state.url = url.into();
        state.referrer = referrer;
        state.is_reload = false;
    }

    pub fn set_reload(&self, is_reload: bool) {
        self.state.write().is_reload = is_reload;
    }

    pub fn set_online(&self, online: bool) {
        self.state.write().online = online;
    }

    pub fn set_title(&self, title: Option<String>) {
        self.state.write().title = title;
    }
}

impl Environment for StaticEnvironment {
    fn current_url(&self) -> String {
        self.state.read().url.clone()
    }

    fn referrer(&self) -> Option<String> {
        self.state.read().referrer.clone()
    }

    fn is_reload(&self) -> bool {
        self.state.read().is_reload
    }

    fn is_online(&self) -> bool {
        self.state.read().online
    }

    fn device_info(&self) -> DeviceInfo {
        self.state.read().device.clone()
    }

    fn page_title(&self) -> Option<String> {
        self.state.read().title.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_environment_navigation() {
        let env = StaticEnvironment::new("https://shop.test/").with_referrer("https://google.com/");
        env.set_reload(true);
        assert!(env.is_reload());
        assert_eq!(env.referrer().as_deref(), Some("https://google.com/"));

        env.navigate("https://shop.test/cart", None);
        assert_eq!(env.current_url(), "https://shop.test/cart");
        assert!(env.referrer().is_none());
        assert!(!env.is_reload());
        assert!(env.is_online());
    }
}
