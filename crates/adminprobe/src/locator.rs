//! Locator abstraction for finding admin form controls.
//!
//! Admin screens are Angular templates, so the stable handle on a form field
//! is its model binding (`data-ng-model="admin.node.maximum_textsize"`), and
//! the stable handle on a tab is the link text. Locators render themselves to
//! JavaScript query expressions; drivers that do not run JavaScript match on
//! the [`Selector`] directly.

use std::fmt;
use std::time::Duration;

use crate::wait::{DEFAULT_ACTION_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS};

/// Attribute spellings Angular accepts for a model binding
pub const MODEL_ATTRIBUTES: [&str; 3] = ["ng-model", "data-ng-model", "x-ng-model"];

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Angular model binding (e.g., "admin.notification.tip_expiration_threshold")
    Model(String),
    /// CSS selector (e.g., `[data-ng-click="updateNode(admin.node)"]`)
    Css(String),
    /// CSS selector filtered by contained text
    CssWithText {
        /// Base CSS selector
        css: String,
        /// Text content to match
        text: String,
    },
    /// Any element containing the text
    Text(String),
}

impl Selector {
    /// Create a model-binding selector
    #[must_use]
    pub fn model(path: impl Into<String>) -> Self {
        Self::Model(path.into())
    }

    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// CSS selector list matching every spelling of a model binding
    #[must_use]
    pub fn model_css(path: &str) -> String {
        let value = css_attr_escape(path);
        MODEL_ATTRIBUTES
            .iter()
            .map(|attr| format!("[{attr}=\"{value}\"]"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Convert to a JavaScript expression yielding the first match or `null`
    #[must_use]
    pub fn to_query(&self) -> String {
        match self {
            Self::Model(path) => {
                format!("document.querySelector({})", js_string(&Self::model_css(path)))
            }
            Self::Css(s) => format!("document.querySelector({})", js_string(s)),
            Self::CssWithText { css, text } => format!(
                "(Array.from(document.querySelectorAll({})).find(el => el.textContent.includes({})) || null)",
                js_string(css),
                js_string(text)
            ),
            Self::Text(t) => format!(
                "(Array.from(document.querySelectorAll('body *')).find(el => el.children.length === 0 && el.textContent.includes({})) || null)",
                js_string(t)
            ),
        }
    }

    /// Convert to a JavaScript expression counting matches
    #[must_use]
    pub fn to_count_query(&self) -> String {
        match self {
            Self::Model(path) => format!(
                "document.querySelectorAll({}).length",
                js_string(&Self::model_css(path))
            ),
            Self::Css(s) => format!("document.querySelectorAll({}).length", js_string(s)),
            Self::CssWithText { css, text } => format!(
                "Array.from(document.querySelectorAll({})).filter(el => el.textContent.includes({})).length",
                js_string(css),
                js_string(text)
            ),
            Self::Text(t) => format!(
                "Array.from(document.querySelectorAll('body *')).filter(el => el.children.length === 0 && el.textContent.includes({})).length",
                js_string(t)
            ),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model(path) => write!(f, "by.model({path:?})"),
            Self::Css(css) => write!(f, "by.css({css:?})"),
            Self::CssWithText { css, text } => write!(f, "by.cssContainingText({css:?}, {text:?})"),
            Self::Text(text) => write!(f, "by.text({text:?})"),
        }
    }
}

/// Render a Rust string as a JavaScript string literal.
///
/// JSON string syntax is a subset of JavaScript string syntax.
#[must_use]
pub fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_owned()).to_string()
}

/// Escape a value for use inside a double-quoted CSS attribute selector
#[must_use]
pub fn css_attr_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Locator options for customizing auto-wait behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatorOptions {
    /// Timeout for auto-waiting
    pub timeout: Duration,
    /// Polling interval for auto-waiting
    pub poll_interval: Duration,
}

impl Default for LocatorOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_ACTION_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

/// A locator for finding a single admin control
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    selector: Selector,
    options: LocatorOptions,
}

impl Locator {
    /// Create a locator from a selector
    #[must_use]
    pub fn from_selector(selector: Selector) -> Self {
        Self {
            selector,
            options: LocatorOptions::default(),
        }
    }

    /// Locate a form control by its model binding
    #[must_use]
    pub fn model(path: impl Into<String>) -> Self {
        Self::from_selector(Selector::model(path))
    }

    /// Locate by CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::from_selector(Selector::css(selector))
    }

    /// Locate a link (tab header) by its text
    #[must_use]
    pub fn link_text(text: impl Into<String>) -> Self {
        Self::from_selector(Selector::CssWithText {
            css: "a".to_string(),
            text: text.into(),
        })
    }

    /// Locate a control by its `data-ng-click` expression
    #[must_use]
    pub fn ng_click(expression: &str) -> Self {
        Self::css(format!("[data-ng-click=\"{}\"]", css_attr_escape(expression)))
    }

    /// Filter by text content
    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        let selector = match self.selector {
            Selector::Css(css) | Selector::CssWithText { css, .. } => Selector::CssWithText {
                css,
                text: text.into(),
            },
            other => other,
        };
        Self {
            selector,
            options: self.options,
        }
    }

    /// Set a custom auto-wait timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    /// Set a custom polling interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.options.poll_interval = interval;
        self
    }

    /// Get the selector
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Get the options
    #[must_use]
    pub const fn options(&self) -> &LocatorOptions {
        &self.options
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.selector.fmt(f)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod selector_tests {
        use super::*;

        #[test]
        fn test_model_css_covers_all_spellings() {
            let css = Selector::model_css("admin.node.maximum_textsize");
            assert_eq!(
                css,
                "[ng-model=\"admin.node.maximum_textsize\"], \
                 [data-ng-model=\"admin.node.maximum_textsize\"], \
                 [x-ng-model=\"admin.node.maximum_textsize\"]"
            );
        }

        #[test]
        fn test_model_query() {
            let query = Selector::model("admin.node.maximum_textsize").to_query();
            assert!(query.starts_with("document.querySelector(\"[ng-model="));
            assert!(query.contains("data-ng-model=\\\"admin.node.maximum_textsize\\\""));
        }

        #[test]
        fn test_css_with_text_query() {
            let selector = Selector::CssWithText {
                css: "a".to_string(),
                text: "HTTPS settings".to_string(),
            };
            let query = selector.to_query();
            assert!(query.contains("querySelectorAll(\"a\")"));
            assert!(query.contains("includes(\"HTTPS settings\")"));
            assert!(query.ends_with("|| null)"));
        }

        #[test]
        fn test_count_queries() {
            assert_eq!(
                Selector::css("button").to_count_query(),
                "document.querySelectorAll(\"button\").length"
            );
            assert!(Selector::text("Save")
                .to_count_query()
                .contains("filter(el => el.children.length === 0"));
        }

        #[test]
        fn test_display_mirrors_locator_strategy() {
            assert_eq!(
                Selector::model("admin.node.x").to_string(),
                "by.model(\"admin.node.x\")"
            );
            let with_text = Selector::CssWithText {
                css: "a".to_string(),
                text: "Main configuration".to_string(),
            };
            assert_eq!(
                with_text.to_string(),
                "by.cssContainingText(\"a\", \"Main configuration\")"
            );
        }

        #[test]
        fn test_special_char_escaping() {
            let query = Selector::css("[title=\"it's \\\"quoted\\\"\"]").to_query();
            // The literal stays a single well-formed JS string
            assert!(query.starts_with("document.querySelector(\""));
            assert!(query.ends_with("\")"));
            assert!(query.contains("it's"));
        }
    }

    mod locator_tests {
        use super::*;

        #[test]
        fn test_ng_click_locator() {
            let locator = Locator::ng_click("updateNode(admin.node)");
            assert_eq!(
                locator.selector(),
                &Selector::Css("[data-ng-click=\"updateNode(admin.node)\"]".to_string())
            );
        }

        #[test]
        fn test_link_text_locator() {
            let locator = Locator::link_text("Anomaly detection thresholds");
            match locator.selector() {
                Selector::CssWithText { css, text } => {
                    assert_eq!(css, "a");
                    assert_eq!(text, "Anomaly detection thresholds");
                }
                other => panic!("unexpected selector {other:?}"),
            }
        }

        #[test]
        fn test_with_text_on_css() {
            let locator = Locator::css("button").with_text("Save");
            assert!(matches!(locator.selector(), Selector::CssWithText { .. }));
        }

        #[test]
        fn test_with_text_keeps_model_selector() {
            let locator = Locator::model("admin.node.x").with_text("ignored");
            assert_eq!(locator.selector(), &Selector::model("admin.node.x"));
        }

        #[test]
        fn test_default_options() {
            let options = LocatorOptions::default();
            assert_eq!(options.timeout, Duration::from_millis(5000));
            assert_eq!(options.poll_interval, Duration::from_millis(50));
        }

        #[test]
        fn test_custom_timeout() {
            let locator = Locator::model("a.b.c")
                .with_timeout(Duration::from_millis(250))
                .with_poll_interval(Duration::from_millis(5));
            assert_eq!(locator.options().timeout, Duration::from_millis(250));
            assert_eq!(locator.options().poll_interval, Duration::from_millis(5));
        }
    }

    mod escaping_props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn js_string_roundtrips_through_json(s in ".*") {
                let literal = js_string(&s);
                let back: String = serde_json::from_str(&literal).unwrap();
                prop_assert_eq!(back, s);
            }

            #[test]
            fn css_escape_leaves_no_bare_quote(s in ".*") {
                let escaped = css_attr_escape(&s);
                let mut prev_backslashes = 0usize;
                for c in escaped.chars() {
                    if c == '"' {
                        prop_assert!(prev_backslashes % 2 == 1);
                    }
                    prev_backslashes = if c == '\\' { prev_backslashes + 1 } else { 0 };
                }
            }
        }
    }
}
