use crate::browser::random_user_agent;
use crate::cookies::CookieRecord;
use crate::errors::{ApplierError, Result};
use crate::types::BrowserConfig;
use headless_chrome::protocol::cdp::Network::CookieParam;
use headless_chrome::protocol::cdp::DOM::SetFileInputFiles;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// A configured browser handle: one `headless_chrome` process plus the main
/// tab everything in this run happens on. Workers own their session
/// end-to-end; dropping it tears the browser process down.
pub struct BrowserSession {
    browser: Browser,
    tab: Arc<Tab>,
    config: BrowserConfig,
}

impl BrowserSession {
    pub fn launch(config: BrowserConfig) -> Result<Self> {
        let window_size_arg = format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        );
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| random_user_agent().to_string());
        let user_agent_arg = format!("--user-agent={user_agent}");

        let args = vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new(&window_size_arg),
            OsStr::new(&user_agent_arg),
        ];

        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .path(config.kind.binary_path())
            .args(args)
            // Long-running apply sessions must outlive the default idle cutoff.
            .idle_browser_timeout(Duration::from_secs(3600))
            .build()
            .map_err(|e| ApplierError::LaunchFailed(e.to_string()))?;

        let browser =
            Browser::new(launch_options).map_err(|e| ApplierError::LaunchFailed(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| ApplierError::LaunchFailed(e.to_string()))?;

        debug!(%user_agent, headless = config.headless, "Browser launched");

        Ok(Self {
            browser,
            tab,
            config,
        })
    }

    fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.config.wait_timeout_ms)
    }

    pub fn navigate(&self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url.trim())
            .map_err(|e| ApplierError::NavigationFailed(e.to_string()))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| ApplierError::NavigationFailed(e.to_string()))?;
        debug!("Navigated to {url}");
        Ok(())
    }

    pub fn current_url(&self) -> String {
        self.tab.get_url()
    }

    /// Clicks the first element matching the selector, waiting up to the
    /// configured timeout for it to appear.
    pub fn click(&self, css_selector: &str) -> Result<()> {
        self.tab
            .wait_for_element_with_custom_timeout(css_selector, self.wait_timeout())
            .map_err(|e| ApplierError::ElementNotFound(e.to_string()))?
            .click()
            .map_err(|e| ApplierError::JavaScriptFailed(e.to_string()))?;
        debug!("Clicked element with selector: {css_selector}");
        Ok(())
    }

    pub fn type_into(&self, css_selector: &str, text: &str) -> Result<()> {
        let element = self
            .tab
            .wait_for_element_with_custom_timeout(css_selector, self.wait_timeout())
            .map_err(|e| ApplierError::ElementNotFound(e.to_string()))?;
        element
            .click()
            .map_err(|e| ApplierError::JavaScriptFailed(e.to_string()))?;
        element
            .type_into(text)
            .map_err(|e| ApplierError::JavaScriptFailed(e.to_string()))?;
        Ok(())
    }

    /// Best-effort JavaScript click on every element matching the selector.
    /// Returns how many clicks succeeded; individual failures are swallowed
    /// inside the page.
    pub fn click_all(&self, css_selector: &str) -> Result<u64> {
        let js_code = format!(
            r#"
            (function() {{
                let clicked = 0;
                document.querySelectorAll('{}').forEach((el) => {{
                    try {{ el.click(); clicked += 1; }} catch (e) {{}}
                }});
                return clicked;
            }})()
        "#,
            escape_js(css_selector)
        );

        let result = self
            .tab
            .evaluate(&js_code, false)
            .map_err(|e| ApplierError::JavaScriptFailed(e.to_string()))?;

        Ok(result.value.and_then(|v| v.as_u64()).unwrap_or(0))
    }

    pub fn page_source(&self) -> Result<String> {
        let js_result = self
            .tab
            .evaluate("document.documentElement.outerHTML", false)
            .map_err(|e| ApplierError::JavaScriptFailed(e.to_string()))?;

        js_result
            .value
            .and_then(|v| v.as_str().map(|s| s.to_string()))
            .ok_or_else(|| ApplierError::JavaScriptFailed("Failed to get page source".to_string()))
    }

    /// Polls the main tab's URL until the predicate holds or the configured
    /// timeout elapses.
    pub async fn wait_for_url(&self, what: &str, pred: impl Fn(&str) -> bool) -> Result<()> {
        let deadline = Instant::now() + self.wait_timeout();
        loop {
            if pred(&self.tab.get_url()) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ApplierError::TimedOut(what.to_string()));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    /// Waits until the main tab's URL differs from `initial`, with a caller
    /// supplied timeout (used by the interactive filter capture).
    pub async fn wait_for_url_change(&self, initial: &str, timeout: Duration) -> Result<String> {
        let deadline = Instant::now() + timeout;
        loop {
            let current = self.tab.get_url();
            if current != initial {
                return Ok(current);
            }
            if Instant::now() >= deadline {
                return Err(ApplierError::TimedOut("URL change".to_string()));
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    pub fn cookies(&self) -> Result<Vec<CookieRecord>> {
        let cookies = self
            .tab
            .get_cookies()
            .map_err(|e| ApplierError::BrowserError(e.to_string()))?;

        Ok(cookies
            .into_iter()
            .map(|c| CookieRecord {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: Some(c.path),
                expires: Some(c.expires),
                secure: c.secure,
                http_only: c.http_only,
            })
            .collect())
    }

    pub fn set_cookie(&self, cookie: &CookieRecord) -> Result<()> {
        let param = CookieParam {
            name: cookie.name.clone(),
            value: cookie.value.clone(),
            url: None,
            domain: Some(cookie.domain.clone()),
            path: cookie.path.clone(),
            secure: Some(cookie.secure),
            http_only: Some(cookie.http_only),
            same_site: None,
            expires: cookie.expires,
            priority: None,
            same_party: None,
            source_scheme: None,
            source_port: None,
            partition_key: None,
        };
        self.tab
            .set_cookies(vec![param])
            .map_err(|e| ApplierError::BrowserError(e.to_string()))?;
        Ok(())
    }

    /// Waits for a second tab to open (an external application form) and for
    /// its URL to settle on a secure scheme.
    pub async fn wait_for_external_tab(&self) -> Result<Arc<Tab>> {
        let main_target = self.tab.get_target_id().clone();
        let deadline = Instant::now() + self.wait_timeout();
        loop {
            let external = {
                let tabs = self
                    .browser
                    .get_tabs()
                    .lock()
                    .map_err(|_| ApplierError::BrowserError("tab list poisoned".to_string()))?;
                tabs.iter()
                    .find(|t| *t.get_target_id() != main_target && t.get_url().starts_with("https://"))
                    .cloned()
            };
            if let Some(tab) = external {
                return Ok(tab);
            }
            if Instant::now() >= deadline {
                return Err(ApplierError::TimedOut("second browser tab".to_string()));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    /// Closes an auxiliary tab and refocuses the main one. Failures here are
    /// not worth aborting an offer for, so they are returned for the caller
    /// to log.
    pub fn close_tab_and_refocus(&self, tab: &Arc<Tab>) -> Result<()> {
        tab.close(true)
            .map_err(|e| ApplierError::BrowserError(e.to_string()))?;
        self.tab
            .activate()
            .map_err(|e| ApplierError::BrowserError(e.to_string()))?;
        Ok(())
    }

    /// Attaches a local file to a file input resolved by CSS selector.
    pub fn set_file_input(&self, css_selector: &str, file: &Path) -> Result<()> {
        let element = self
            .tab
            .wait_for_element_with_custom_timeout(css_selector, self.wait_timeout())
            .map_err(|e| ApplierError::ElementNotFound(e.to_string()))?;

        self.tab
            .call_method(SetFileInputFiles {
                files: vec![file.display().to_string()],
                node_id: None,
                backend_node_id: None,
                object_id: Some(element.remote_object_id.clone()),
            })
            .map_err(|e| ApplierError::BrowserError(e.to_string()))?;
        Ok(())
    }
}

fn escape_js(input: &str) -> String {
    input.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_js_handles_quotes_and_backslashes() {
        assert_eq!(escape_js("a[href='x']"), "a[href=\\'x\\']");
        assert_eq!(escape_js(r"path\to"), r"path\\to");
    }
}
