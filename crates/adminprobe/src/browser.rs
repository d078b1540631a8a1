//! Browser control over the Chrome `DevTools` Protocol.
//!
//! With the `browser` feature, [`CdpDriver`] launches Chromium through
//! chromiumoxide and implements [`AdminDriver`](crate::driver::AdminDriver) by
//! evaluating small scripts in the page. Without the feature, `launch` reports
//! that browser support was not compiled in.

use std::time::Duration;

use crate::wait::DEFAULT_NAVIGATION_TIMEOUT_MS;

/// Browser configuration
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// Base URL of the application under test
    pub base_url: String,
    /// Prefix between the base URL and an admin route
    pub route_prefix: String,
    /// Timeout for page loads and route changes
    pub navigation_timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 1024,
            chromium_path: None,
            sandbox: true,
            base_url: "http://127.0.0.1:8082".to_string(),
            route_prefix: "#/".to_string(),
            navigation_timeout: Duration::from_millis(DEFAULT_NAVIGATION_TIMEOUT_MS),
        }
    }
}

impl BrowserConfig {
    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Set the application base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the route prefix (`#/` for hash routing)
    #[must_use]
    pub fn with_route_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.route_prefix = prefix.into();
        self
    }

    /// Set navigation timeout
    #[must_use]
    pub const fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    /// Full URL of an admin route
    #[must_use]
    pub fn route_url(&self, path: &str) -> String {
        format!(
            "{}/{}{}",
            self.base_url.trim_end_matches('/'),
            self.route_prefix,
            path.trim_start_matches('/')
        )
    }
}

/// Scripts evaluated in the page.
///
/// Each script is a self-contained expression returning JSON: element
/// actions yield `null` when the locator matched nothing.
pub mod scripts {
    use crate::locator::{js_string, Selector};

    /// Whether the document and Angular's `$http` have nothing in flight
    pub const IS_IDLE: &str = "(() => { \
        if (document.readyState !== 'complete') return false; \
        const ng = window.angular; \
        if (!ng) return true; \
        const root = document.querySelector('[ng-app], [data-ng-app]') || document.body; \
        try { return ng.element(root).injector().get('$http').pendingRequests.length === 0; } \
        catch (e) { return true; } \
    })()";

    /// Current route with the hash prefix stripped
    pub const CURRENT_ROUTE: &str = "window.location.hash.replace(/^#\\/?/, '')";

    fn with_element(selector: &Selector, body: &str) -> String {
        format!(
            "(() => {{ const el = {}; if (!el) return null; {body} }})()",
            selector.to_query()
        )
    }

    /// Click the element
    #[must_use]
    pub fn click(selector: &Selector) -> String {
        with_element(selector, "el.click(); return true;")
    }

    /// The element's `value` (text content for non-inputs)
    #[must_use]
    pub fn read_value(selector: &Selector) -> String {
        with_element(
            selector,
            "return String(el.value !== undefined ? el.value : (el.textContent || ''));",
        )
    }

    /// The element's checked state
    #[must_use]
    pub fn is_selected(selector: &Selector) -> String {
        with_element(selector, "return !!(el.checked || el.selected);")
    }

    /// Empty the element and notify model bindings
    #[must_use]
    pub fn clear(selector: &Selector) -> String {
        with_element(
            selector,
            "el.focus(); el.value = ''; \
             el.dispatchEvent(new Event('input', { bubbles: true })); \
             el.dispatchEvent(new Event('change', { bubbles: true })); \
             return true;",
        )
    }

    /// Append text to the element's value and notify model bindings
    #[must_use]
    pub fn type_text(selector: &Selector, text: &str) -> String {
        with_element(
            selector,
            &format!(
                "el.focus(); el.value = el.value + {}; \
                 el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
                 el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
                 return true;",
                js_string(text)
            ),
        )
    }

    /// Switch the hash route without reloading the document
    #[must_use]
    pub fn set_route(prefix: &str, path: &str) -> String {
        format!(
            "(() => {{ window.location.hash = {}; return true; }})()",
            js_string(&format!("{prefix}{path}"))
        )
    }
}

// ============================================================================
// Real CDP Implementation (when `browser` feature is enabled)
// ============================================================================

#[cfg(feature = "browser")]
#[allow(clippy::significant_drop_tightening, clippy::missing_errors_doc)]
mod cdp {
    use super::{scripts, BrowserConfig};
    use crate::driver::{not_found, AdminDriver};
    use crate::locator::Locator;
    use crate::result::{ProbeError, ProbeResult};
    use crate::wait::{poll_until, WaitOptions};
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::page::Page as CdpPage;
    use futures::StreamExt;
    use serde::de::DeserializeOwned;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// Chromium-backed admin driver
    #[derive(Debug)]
    pub struct CdpDriver {
        config: BrowserConfig,
        browser: Arc<Mutex<CdpBrowser>>,
        page: Arc<Mutex<CdpPage>>,
        handle: tokio::task::JoinHandle<()>,
        document_loaded: bool,
    }

    impl CdpDriver {
        /// Launch Chromium and open a blank page
        ///
        /// # Errors
        ///
        /// Returns error if the browser cannot be launched
        pub async fn launch(config: BrowserConfig) -> ProbeResult<Self> {
            let mut builder = CdpConfig::builder()
                .window_size(config.viewport_width, config.viewport_height)
                .request_timeout(config.navigation_timeout);

            if !config.headless {
                builder = builder.with_head();
            }

            if !config.sandbox {
                builder = builder.no_sandbox();
            }

            if let Some(ref path) = config.chromium_path {
                builder = builder.chrome_executable(path);
            }

            let cdp_config = builder
                .build()
                .map_err(|message| ProbeError::BrowserLaunch { message })?;

            let (browser, mut handler) = CdpBrowser::launch(cdp_config).await.map_err(|e| {
                ProbeError::BrowserLaunch {
                    message: e.to_string(),
                }
            })?;

            // Spawn handler task
            let handle = tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });

            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| ProbeError::BrowserLaunch {
                    message: e.to_string(),
                })?;

            tracing::info!(headless = config.headless, base_url = %config.base_url, "browser launched");
            Ok(Self {
                config,
                browser: Arc::new(Mutex::new(browser)),
                page: Arc::new(Mutex::new(page)),
                handle,
                document_loaded: false,
            })
        }

        /// Get the browser configuration
        #[must_use]
        pub const fn config(&self) -> &BrowserConfig {
            &self.config
        }

        async fn eval<T: DeserializeOwned>(&self, expression: String) -> ProbeResult<T> {
            let page = self.page.lock().await;
            let result = page
                .evaluate(expression)
                .await
                .map_err(|e| ProbeError::script(e.to_string()))?;
            result
                .into_value()
                .map_err(|e| ProbeError::script(e.to_string()))
        }

        async fn on_element<T: DeserializeOwned>(
            &self,
            locator: &Locator,
            expression: String,
        ) -> ProbeResult<T> {
            self.eval::<Option<T>>(expression)
                .await?
                .ok_or_else(|| not_found(locator))
        }

        async fn settle(&self, url: &str) -> ProbeResult<()> {
            let options = WaitOptions::navigation()
                .with_timeout(u64::try_from(self.config.navigation_timeout.as_millis()).unwrap_or(u64::MAX));
            // The execution context is torn down while a document loads
            let settled = poll_until(&options, url, || async {
                Ok::<_, ProbeError>(self.is_idle().await.unwrap_or(false))
            })
            .await?;
            if settled.success {
                Ok(())
            } else {
                Err(ProbeError::Navigation {
                    url: url.to_string(),
                    message: format!("page did not settle within {}ms", options.timeout_ms),
                })
            }
        }
    }

    #[async_trait]
    impl AdminDriver for CdpDriver {
        async fn navigate(&mut self, path: &str) -> ProbeResult<()> {
            let url = self.config.route_url(path);
            if self.document_loaded {
                let _: bool = self
                    .eval(scripts::set_route(&self.config.route_prefix, path))
                    .await?;
            } else {
                let page = self.page.lock().await;
                page.goto(url.as_str())
                    .await
                    .map_err(|e| ProbeError::Navigation {
                        url: url.clone(),
                        message: e.to_string(),
                    })?;
                drop(page);
                self.document_loaded = true;
            }
            tracing::debug!(%url, "navigated");
            self.settle(&url).await
        }

        async fn count(&self, locator: &Locator) -> ProbeResult<usize> {
            self.eval(locator.selector().to_count_query()).await
        }

        async fn click(&mut self, locator: &Locator) -> ProbeResult<()> {
            let _: bool = self
                .on_element(locator, scripts::click(locator.selector()))
                .await?;
            Ok(())
        }

        async fn read_value(&self, locator: &Locator) -> ProbeResult<String> {
            self.on_element(locator, scripts::read_value(locator.selector()))
                .await
        }

        async fn is_selected(&self, locator: &Locator) -> ProbeResult<bool> {
            self.on_element(locator, scripts::is_selected(locator.selector()))
                .await
        }

        async fn clear(&mut self, locator: &Locator) -> ProbeResult<()> {
            let _: bool = self
                .on_element(locator, scripts::clear(locator.selector()))
                .await?;
            Ok(())
        }

        async fn type_text(&mut self, locator: &Locator, text: &str) -> ProbeResult<()> {
            let _: bool = self
                .on_element(locator, scripts::type_text(locator.selector(), text))
                .await?;
            Ok(())
        }

        async fn is_idle(&self) -> ProbeResult<bool> {
            self.eval(scripts::IS_IDLE.to_string()).await
        }

        async fn reload(&mut self) -> ProbeResult<()> {
            let url = self.current_path().await?;
            let page = self.page.lock().await;
            page.reload().await.map_err(|e| ProbeError::Navigation {
                url: url.clone(),
                message: e.to_string(),
            })?;
            drop(page);
            tracing::debug!(route = %url, "reloaded");
            self.settle(&url).await
        }

        async fn current_path(&self) -> ProbeResult<String> {
            self.eval(scripts::CURRENT_ROUTE.to_string()).await
        }

        async fn close(&mut self) -> ProbeResult<()> {
            let mut browser = self.browser.lock().await;
            browser
                .close()
                .await
                .map_err(|e| ProbeError::BrowserLaunch {
                    message: e.to_string(),
                })?;
            self.handle.abort();
            Ok(())
        }
    }
}

// ============================================================================
// Fallback (when `browser` feature is NOT enabled)
// ============================================================================

#[cfg(not(feature = "browser"))]
mod unavailable {
    use super::BrowserConfig;
    use crate::driver::AdminDriver;
    use crate::locator::Locator;
    use crate::result::{ProbeError, ProbeResult};
    use async_trait::async_trait;

    fn disabled() -> ProbeError {
        ProbeError::BrowserLaunch {
            message: "Browser feature not enabled. Enable 'browser' feature for real CDP support."
                .to_string(),
        }
    }

    /// Chromium-backed admin driver (not compiled in)
    #[derive(Debug)]
    pub struct CdpDriver {
        config: BrowserConfig,
    }

    impl CdpDriver {
        /// Always fails: browser support needs the `browser` feature
        ///
        /// # Errors
        ///
        /// Always returns `BrowserLaunch`
        pub async fn launch(config: BrowserConfig) -> ProbeResult<Self> {
            let _ = config;
            Err(disabled())
        }

        /// Get the browser configuration
        #[must_use]
        pub const fn config(&self) -> &BrowserConfig {
            &self.config
        }
    }

    #[async_trait]
    impl AdminDriver for CdpDriver {
        async fn navigate(&mut self, _path: &str) -> ProbeResult<()> {
            Err(disabled())
        }

        async fn count(&self, _locator: &Locator) -> ProbeResult<usize> {
            Err(disabled())
        }

        async fn click(&mut self, _locator: &Locator) -> ProbeResult<()> {
            Err(disabled())
        }

        async fn read_value(&self, _locator: &Locator) -> ProbeResult<String> {
            Err(disabled())
        }

        async fn is_selected(&self, _locator: &Locator) -> ProbeResult<bool> {
            Err(disabled())
        }

        async fn clear(&mut self, _locator: &Locator) -> ProbeResult<()> {
            Err(disabled())
        }

        async fn type_text(&mut self, _locator: &Locator, _text: &str) -> ProbeResult<()> {
            Err(disabled())
        }

        async fn is_idle(&self) -> ProbeResult<bool> {
            Err(disabled())
        }

        async fn reload(&mut self) -> ProbeResult<()> {
            Err(disabled())
        }

        async fn current_path(&self) -> ProbeResult<String> {
            Err(disabled())
        }
    }
}

// Re-export based on feature
#[cfg(feature = "browser")]
pub use cdp::CdpDriver;

#[cfg(not(feature = "browser"))]
pub use unavailable::CdpDriver;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::locator::Selector;

    mod config_tests {
        use super::*;

        #[test]
        fn test_config_defaults() {
            let config = BrowserConfig::default();
            assert!(config.headless);
            assert!(config.sandbox);
            assert_eq!(config.route_prefix, "#/");
            assert_eq!(config.navigation_timeout, Duration::from_secs(30));
        }

        #[test]
        fn test_config_builder() {
            let config = BrowserConfig::default()
                .with_headless(false)
                .with_viewport(800, 600)
                .with_chromium_path("/usr/bin/chromium")
                .with_no_sandbox()
                .with_navigation_timeout(Duration::from_secs(5));
            assert!(!config.headless);
            assert!(!config.sandbox);
            assert_eq!(config.viewport_width, 800);
            assert_eq!(config.chromium_path.as_deref(), Some("/usr/bin/chromium"));
            assert_eq!(config.navigation_timeout, Duration::from_secs(5));
        }

        #[test]
        fn test_route_url_joins_cleanly() {
            let config = BrowserConfig::default().with_base_url("https://gl.example.org/");
            assert_eq!(
                config.route_url("/admin/mail"),
                "https://gl.example.org/#/admin/mail"
            );
            let html5 = config.with_route_prefix("");
            assert_eq!(html5.route_url("admin/mail"), "https://gl.example.org/admin/mail");
        }
    }

    mod script_tests {
        use super::*;

        #[test]
        fn test_element_scripts_guard_missing_element() {
            let selector = Selector::model("admin.node.maximum_textsize");
            for script in [
                scripts::click(&selector),
                scripts::read_value(&selector),
                scripts::is_selected(&selector),
                scripts::clear(&selector),
                scripts::type_text(&selector, "1337"),
            ] {
                assert!(script.starts_with("(() => { const el = document.querySelector("));
                assert!(script.contains("if (!el) return null;"));
                assert!(script.ends_with("})()"));
            }
        }

        #[test]
        fn test_type_text_escapes_input() {
            let script = scripts::type_text(&Selector::css("input"), "a\"b'c");
            assert!(script.contains("el.value + \"a\\\"b'c\""));
            assert!(script.contains("new Event('input'"));
        }

        #[test]
        fn test_set_route() {
            assert_eq!(
                scripts::set_route("#/", "admin/landing"),
                "(() => { window.location.hash = \"#/admin/landing\"; return true; })()"
            );
        }

        #[test]
        fn test_idle_script_checks_angular_http() {
            assert!(scripts::IS_IDLE.contains("pendingRequests.length === 0"));
            assert!(scripts::IS_IDLE.contains("document.readyState"));
        }
    }

    #[cfg(not(feature = "browser"))]
    mod unavailable_tests {
        use super::*;

        #[tokio::test]
        async fn test_launch_reports_missing_feature() {
            let err = CdpDriver::launch(BrowserConfig::default()).await.unwrap_err();
            assert!(err.to_string().contains("Browser feature not enabled"));
        }
    }
}
