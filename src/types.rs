use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Which Chromium-family binary to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    Chrome,
    Chromium,
}

impl BrowserKind {
    /// Explicit binary path for the engine, `None` lets headless_chrome
    /// auto-detect an installed Chrome.
    pub fn binary_path(&self) -> Option<PathBuf> {
        match self {
            BrowserKind::Chrome => None,
            BrowserKind::Chromium => ["/usr/bin/chromium", "/usr/bin/chromium-browser"]
                .iter()
                .map(PathBuf::from)
                .find(|p| p.exists()),
        }
    }
}

impl Default for BrowserKind {
    fn default() -> Self {
        BrowserKind::Chrome
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport: Viewport,
    pub kind: BrowserKind,
    /// Overrides the randomized user agent when set.
    pub user_agent: Option<String>,
    /// Fixed wait applied to element and URL waits, in milliseconds.
    pub wait_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: Viewport {
                width: 1280,
                height: 720,
            },
            kind: BrowserKind::Chrome,
            user_agent: None,
            wait_timeout_ms: 15_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_headless_with_fifteen_second_waits() {
        let config = BrowserConfig::default();
        assert!(config.headless);
        assert_eq!(config.wait_timeout_ms, 15_000);
        assert_eq!(config.kind, BrowserKind::Chrome);
    }

    #[test]
    fn browser_kind_round_trips_through_serde() {
        let json = serde_json::to_string(&BrowserKind::Chromium).unwrap();
        assert_eq!(json, "\"chromium\"");
        let back: BrowserKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, BrowserKind::Chromium);
    }
}
