//! `AdminDriver` - the seam between the verifier and a browser.
//!
//! Drivers expose the handful of primitives the admin screens need: route
//! navigation, element lookup by [`Locator`], value reads, clicks, typing and
//! a "requests settled" probe. Missing elements are reported immediately as
//! [`ProbeError::LocatorNotFound`] with a zero timeout; waiting is layered on
//! top by [`AdminSession`], so every driver gets the same auto-wait semantics.
//!
//! # Implementations
//!
//! - `CdpDriver` - real Chromium over CDP (`browser` feature)
//! - [`SimulatedAdmin`](crate::simulated::SimulatedAdmin) - in-memory admin application
//! - [`MockDriver`] - scripted values and call history for unit tests

use async_trait::async_trait;
use std::collections::HashMap;

use crate::locator::Locator;
use crate::result::{ProbeError, ProbeResult};
use crate::settings::{FieldKind, FieldRef, FieldValue, NavigationTarget, ReloadStrategy, SaveControl};
use crate::wait::{poll_until, WaitOptions, WaitResult};

/// Abstract driver trait for admin screen automation
#[async_trait]
pub trait AdminDriver: Send + Sync {
    /// Navigate to an admin route such as `admin/mail`
    async fn navigate(&mut self, path: &str) -> ProbeResult<()>;

    /// Number of elements the locator currently matches
    async fn count(&self, locator: &Locator) -> ProbeResult<usize>;

    /// Click the first matching element
    async fn click(&mut self, locator: &Locator) -> ProbeResult<()>;

    /// Read the `value` of the first matching element
    async fn read_value(&self, locator: &Locator) -> ProbeResult<String>;

    /// Whether the first matching element is selected (checkboxes)
    async fn is_selected(&self, locator: &Locator) -> ProbeResult<bool>;

    /// Clear the value of the first matching element
    async fn clear(&mut self, locator: &Locator) -> ProbeResult<()>;

    /// Type text into the first matching element, appending to its value
    async fn type_text(&mut self, locator: &Locator, text: &str) -> ProbeResult<()>;

    /// Whether the page has no outstanding requests
    async fn is_idle(&self) -> ProbeResult<bool>;

    /// Reload the whole page, discarding in-memory UI state
    async fn reload(&mut self) -> ProbeResult<()>;

    /// Route currently displayed
    async fn current_path(&self) -> ProbeResult<String>;

    /// Poll [`is_idle`](Self::is_idle) until it holds or the timeout elapses
    async fn wait_idle(&self, options: &WaitOptions) -> ProbeResult<WaitResult> {
        poll_until(options, "outstanding requests to settle", || self.is_idle()).await
    }

    /// Release browser resources
    async fn close(&mut self) -> ProbeResult<()> {
        Ok(())
    }
}

/// Error for a locator that matched nothing on a single lookup
#[must_use]
pub fn not_found(locator: &Locator) -> ProbeError {
    ProbeError::LocatorNotFound {
        locator: locator.to_string(),
        timeout_ms: 0,
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Auto-waiting, field-aware operations over any [`AdminDriver`]
///
/// Every lookup polls until the locator resolves; typed reads and writes map
/// [`FieldRef`]s onto the right primitive for their [`FieldKind`].
pub struct AdminSession<'a, D: AdminDriver + ?Sized> {
    driver: &'a mut D,
    action: WaitOptions,
}

impl<'a, D: AdminDriver + ?Sized> AdminSession<'a, D> {
    /// Wrap a driver with the given action wait policy
    pub fn new(driver: &'a mut D, action: WaitOptions) -> Self {
        Self { driver, action }
    }

    /// Action wait policy
    #[must_use]
    pub const fn action_options(&self) -> &WaitOptions {
        &self.action
    }

    /// Apply the session wait policy to a locator
    #[must_use]
    pub fn bind(&self, locator: Locator) -> Locator {
        locator
            .with_timeout(self.action.timeout())
            .with_poll_interval(self.action.poll_interval())
    }

    /// Wait until the locator resolves
    ///
    /// # Errors
    ///
    /// Returns `LocatorNotFound` if nothing matched before the locator's timeout
    pub async fn wait_for(&self, locator: &Locator) -> ProbeResult<()> {
        let options = WaitOptions {
            timeout_ms: duration_ms(locator.options().timeout),
            poll_interval_ms: duration_ms(locator.options().poll_interval),
        };
        let driver = &*self.driver;
        let waited_for = locator.to_string();
        let result = poll_until(&options, &waited_for, || async move {
            let matches = driver.count(locator).await?;
            Ok::<_, ProbeError>(matches > 0)
        })
        .await?;

        if result.success {
            Ok(())
        } else {
            Err(ProbeError::LocatorNotFound {
                locator: waited_for,
                timeout_ms: options.timeout_ms,
            })
        }
    }

    /// Navigate to a screen
    ///
    /// # Errors
    ///
    /// Returns error if the route cannot be loaded
    pub async fn navigate(&mut self, path: &str) -> ProbeResult<()> {
        self.driver.navigate(path).await
    }

    /// Click through to the target's tab, if it has one
    ///
    /// # Errors
    ///
    /// Returns `LocatorNotFound` if the tab never appears
    pub async fn open_tab(&mut self, target: &NavigationTarget) -> ProbeResult<()> {
        if let Some(tab) = target.tab_locator() {
            let tab = self.bind(tab);
            self.wait_for(&tab).await?;
            self.driver.click(&tab).await?;
            tracing::debug!(tab = %tab, "opened tab");
        }
        Ok(())
    }

    /// Navigate to the target screen and click through to its tab
    ///
    /// # Errors
    ///
    /// Returns error if navigation fails or the tab never appears
    pub async fn open(&mut self, target: &NavigationTarget) -> ProbeResult<()> {
        self.navigate(&target.path).await?;
        self.open_tab(target).await
    }

    /// Read the value a field currently displays
    ///
    /// # Errors
    ///
    /// Returns error if the field cannot be located
    pub async fn read_field(&self, field: &FieldRef) -> ProbeResult<FieldValue> {
        let locator = self.bind(field.locator());
        self.wait_for(&locator).await?;
        match field.kind() {
            FieldKind::Text => Ok(FieldValue::Text(self.driver.read_value(&locator).await?)),
            FieldKind::Checkbox => Ok(FieldValue::Checked(
                self.driver.is_selected(&locator).await?,
            )),
        }
    }

    /// Make a field display `value`
    ///
    /// Text fields are cleared and typed into; checkboxes are clicked only
    /// when their state differs.
    ///
    /// # Errors
    ///
    /// Returns error if the field cannot be located or the value does not fit it
    pub async fn write_field(&mut self, field: &FieldRef, value: &FieldValue) -> ProbeResult<()> {
        let locator = self.bind(field.locator());
        self.wait_for(&locator).await?;
        match (field.kind(), value) {
            (FieldKind::Text, FieldValue::Text(text)) => {
                self.driver.clear(&locator).await?;
                self.driver.type_text(&locator, text).await
            }
            (FieldKind::Checkbox, FieldValue::Checked(wanted)) => {
                if self.driver.is_selected(&locator).await? != *wanted {
                    self.driver.click(&locator).await?;
                }
                Ok(())
            }
            (kind, value) => Err(ProbeError::InvalidScenario {
                name: field.path().to_string(),
                message: format!("cannot write {value} into a {kind} field"),
            }),
        }
    }

    /// Click the save control and wait for the request to settle
    ///
    /// # Errors
    ///
    /// Returns `LocatorNotFound` if the control is missing, `Timeout` if the
    /// page never settles
    pub async fn persist(&mut self, save: &SaveControl) -> ProbeResult<()> {
        let locator = self.bind(save.locator());
        self.wait_for(&locator).await?;
        self.driver.click(&locator).await?;

        let settled = self.driver.wait_idle(&self.action).await?;
        if settled.success {
            tracing::debug!(
                save = save.expression(),
                attempts = settled.attempts,
                "persist settled"
            );
            Ok(())
        } else {
            Err(ProbeError::Timeout {
                action: format!("persist via {}", save.expression()),
                ms: self.action.timeout_ms,
            })
        }
    }

    /// Discard UI state and bring the target screen back up
    ///
    /// # Errors
    ///
    /// Returns error if reloading or navigating fails
    pub async fn refresh(
        &mut self,
        strategy: &ReloadStrategy,
        target: &NavigationTarget,
    ) -> ProbeResult<()> {
        match strategy {
            ReloadStrategy::FullReload => {
                self.driver.reload().await?;
                let current = self.driver.current_path().await?;
                if current != target.path {
                    self.driver.navigate(&target.path).await?;
                }
                self.open_tab(target).await
            }
            ReloadStrategy::Renavigate { via } => {
                self.driver.navigate(via).await?;
                self.open(target).await
            }
        }
    }
}

impl<D: AdminDriver + ?Sized> std::fmt::Debug for AdminSession<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSession")
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}

fn duration_ms(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// =============================================================================
// MOCK DRIVER
// =============================================================================

/// Element state scripted into a [`MockDriver`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockElement {
    /// Displayed value
    pub value: String,
    /// Selection state
    pub selected: bool,
}

/// Mock driver for unit testing
///
/// Elements are keyed by the locator's display form; clicking toggles
/// selection, typing appends to the value.
#[derive(Debug, Default)]
pub struct MockDriver {
    /// Current route
    pub current_path: String,
    /// Scripted elements
    pub elements: HashMap<String, MockElement>,
    /// Whether `is_idle` reports settled
    pub busy: bool,
    /// Call history for verification
    pub call_history: Vec<String>,
}

impl MockDriver {
    /// Create new mock driver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script an element for a locator
    pub fn add_element(&mut self, locator: &Locator, element: MockElement) {
        self.elements.insert(locator.to_string(), element);
    }

    /// Element scripted for a locator
    #[must_use]
    pub fn element(&self, locator: &Locator) -> Option<&MockElement> {
        self.elements.get(&locator.to_string())
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.call_history
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.call_history.iter().any(|c| c.starts_with(method))
    }

    fn element_mut(&mut self, locator: &Locator) -> ProbeResult<&mut MockElement> {
        self.elements
            .get_mut(&locator.to_string())
            .ok_or_else(|| not_found(locator))
    }
}

#[async_trait]
impl AdminDriver for MockDriver {
    async fn navigate(&mut self, path: &str) -> ProbeResult<()> {
        self.call_history.push(format!("navigate:{path}"));
        self.current_path = path.to_string();
        Ok(())
    }

    async fn count(&self, locator: &Locator) -> ProbeResult<usize> {
        Ok(usize::from(self.element(locator).is_some()))
    }

    async fn click(&mut self, locator: &Locator) -> ProbeResult<()> {
        self.call_history.push(format!("click:{locator}"));
        let element = self.element_mut(locator)?;
        element.selected = !element.selected;
        Ok(())
    }

    async fn read_value(&self, locator: &Locator) -> ProbeResult<String> {
        self.element(locator)
            .map(|e| e.value.clone())
            .ok_or_else(|| not_found(locator))
    }

    async fn is_selected(&self, locator: &Locator) -> ProbeResult<bool> {
        self.element(locator)
            .map(|e| e.selected)
            .ok_or_else(|| not_found(locator))
    }

    async fn clear(&mut self, locator: &Locator) -> ProbeResult<()> {
        self.call_history.push(format!("clear:{locator}"));
        self.element_mut(locator)?.value.clear();
        Ok(())
    }

    async fn type_text(&mut self, locator: &Locator, text: &str) -> ProbeResult<()> {
        self.call_history.push(format!("type:{locator}:{text}"));
        self.element_mut(locator)?.value.push_str(text);
        Ok(())
    }

    async fn is_idle(&self) -> ProbeResult<bool> {
        Ok(!self.busy)
    }

    async fn reload(&mut self) -> ProbeResult<()> {
        self.call_history.push("reload".to_string());
        Ok(())
    }

    async fn current_path(&self) -> ProbeResult<String> {
        Ok(self.current_path.clone())
    }

    async fn close(&mut self) -> ProbeResult<()> {
        self.call_history.push("close".to_string());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::settings::ModelPath;

    fn fast() -> WaitOptions {
        WaitOptions::new().with_timeout(30).with_poll_interval(5)
    }

    fn text_field() -> FieldRef {
        FieldRef::text(
            ModelPath::parse("admin.node.maximum_textsize").unwrap(),
            "4096",
            "1337",
        )
    }

    fn checkbox_field() -> FieldRef {
        FieldRef::checkbox(
            ModelPath::parse("admin.node.tor2web_whistleblower").unwrap(),
            false,
        )
    }

    mod mock_driver_tests {
        use super::*;

        #[test]
        fn test_mock_driver_creation() {
            let driver = MockDriver::new();
            assert!(driver.elements.is_empty());
            assert!(driver.history().is_empty());
            assert!(!driver.was_called("navigate"));
        }

        #[tokio::test]
        async fn test_mock_driver_navigate_and_reload() {
            let mut driver = MockDriver::new();
            driver.navigate("admin/mail").await.unwrap();
            driver.reload().await.unwrap();
            driver.close().await.unwrap();
            assert_eq!(driver.current_path().await.unwrap(), "admin/mail");
            assert!(driver.was_called("navigate:admin/mail"));
            assert!(driver.was_called("reload"));
            assert!(driver.was_called("close"));
        }

        #[tokio::test]
        async fn test_missing_element_is_immediate_not_found() {
            let driver = MockDriver::new();
            let err = driver
                .read_value(&Locator::model("admin.node.x"))
                .await
                .unwrap_err();
            match err {
                ProbeError::LocatorNotFound { timeout_ms, .. } => assert_eq!(timeout_ms, 0),
                other => panic!("unexpected error {other:?}"),
            }
        }
    }

    mod session_tests {
        use super::*;

        #[tokio::test]
        async fn test_wait_for_times_out_with_locator_error() {
            let mut driver = MockDriver::new();
            let session = AdminSession::new(&mut driver, fast());
            let locator = session.bind(Locator::model("admin.node.missing"));
            let err = session.wait_for(&locator).await.unwrap_err();
            match err {
                ProbeError::LocatorNotFound { locator, timeout_ms } => {
                    assert!(locator.contains("admin.node.missing"));
                    assert_eq!(timeout_ms, 30);
                }
                other => panic!("unexpected error {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_write_text_clears_then_types() {
            let field = text_field();
            let mut driver = MockDriver::new();
            driver.add_element(
                &field.locator(),
                MockElement {
                    value: "4096".to_string(),
                    selected: false,
                },
            );

            let mut session = AdminSession::new(&mut driver, fast());
            assert_eq!(session.read_field(&field).await.unwrap(), FieldValue::text("4096"));
            session
                .write_field(&field, field.input_after())
                .await
                .unwrap();
            assert_eq!(session.read_field(&field).await.unwrap(), FieldValue::text("1337"));

            let history = driver.history().join("\n");
            let clear = history.find("clear:").unwrap();
            let typed = history.find("type:").unwrap();
            assert!(clear < typed);
        }

        #[tokio::test]
        async fn test_write_checkbox_only_clicks_on_change() {
            let field = checkbox_field();
            let mut driver = MockDriver::new();
            driver.add_element(&field.locator(), MockElement::default());

            let mut session = AdminSession::new(&mut driver, fast());
            session
                .write_field(&field, &FieldValue::Checked(true))
                .await
                .unwrap();
            session
                .write_field(&field, &FieldValue::Checked(true))
                .await
                .unwrap();
            assert_eq!(
                session.read_field(&field).await.unwrap(),
                FieldValue::Checked(true)
            );
            let clicks = driver
                .history()
                .iter()
                .filter(|c| c.starts_with("click:"))
                .count();
            assert_eq!(clicks, 1);
        }

        #[tokio::test]
        async fn test_write_rejects_wrong_value_kind() {
            let field = text_field();
            let mut driver = MockDriver::new();
            driver.add_element(&field.locator(), MockElement::default());
            let mut session = AdminSession::new(&mut driver, fast());
            let err = session
                .write_field(&field, &FieldValue::Checked(true))
                .await
                .unwrap_err();
            assert!(matches!(err, ProbeError::InvalidScenario { .. }));
        }

        #[tokio::test]
        async fn test_persist_times_out_when_busy() {
            let save = SaveControl::new("updateNode(admin.node)");
            let mut driver = MockDriver::new();
            driver.add_element(&save.locator(), MockElement::default());
            driver.busy = true;

            let mut session = AdminSession::new(&mut driver, fast());
            let err = session.persist(&save).await.unwrap_err();
            match err {
                ProbeError::Timeout { action, ms } => {
                    assert!(action.contains("updateNode(admin.node)"));
                    assert_eq!(ms, 30);
                }
                other => panic!("unexpected error {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_open_clicks_tab() {
            let target = NavigationTarget::screen("admin/advanced_settings").with_tab("HTTPS settings");
            let mut driver = MockDriver::new();
            driver.add_element(&Locator::link_text("HTTPS settings"), MockElement::default());

            let mut session = AdminSession::new(&mut driver, fast());
            session.open(&target).await.unwrap();
            assert!(driver.was_called("navigate:admin/advanced_settings"));
            assert!(driver.was_called("click:by.cssContainingText(\"a\", \"HTTPS settings\")"));
        }

        #[tokio::test]
        async fn test_refresh_renavigate_goes_via_other_screen() {
            let target = NavigationTarget::screen("admin/mail");
            let mut driver = MockDriver::new();
            let mut session = AdminSession::new(&mut driver, fast());
            session
                .refresh(
                    &ReloadStrategy::Renavigate {
                        via: "admin/landing".to_string(),
                    },
                    &target,
                )
                .await
                .unwrap();
            assert_eq!(
                driver.history(),
                &["navigate:admin/landing".to_string(), "navigate:admin/mail".to_string()]
            );
        }

        #[tokio::test]
        async fn test_refresh_full_reload_stays_on_route() {
            let target = NavigationTarget::screen("admin/mail");
            let mut driver = MockDriver::new();
            driver.current_path = "admin/mail".to_string();
            let mut session = AdminSession::new(&mut driver, fast());
            session
                .refresh(&ReloadStrategy::FullReload, &target)
                .await
                .unwrap();
            assert_eq!(driver.history(), &["reload".to_string()]);
        }
    }
}
