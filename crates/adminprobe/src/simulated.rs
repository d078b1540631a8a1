//! In-memory admin application implementing [`AdminDriver`].
//!
//! `SimulatedAdmin` renders the admin screens as a flat list of elements
//! (tab links, model-bound inputs, save buttons) over a [`MemoryConfigStore`].
//! Edits change an in-page draft; saving writes the draft section to the
//! store; navigation and reload throw the drafts away and re-read the store.
//! That is the behaviour the round trip depends on, so the verifier, runner
//! and CLI can all be exercised without a browser.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::driver::{not_found, AdminDriver};
use crate::locator::{Locator, Selector, MODEL_ATTRIBUTES};
use crate::result::{ProbeError, ProbeResult};
use crate::settings::{FieldKind, FieldValue, ModelPath};
use crate::store::{assign, lookup, MemoryConfigStore};

// =============================================================================
// SCREEN CATALOGUE
// =============================================================================

/// A model-bound form control
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Model binding, e.g. `admin.node.maximum_textsize`
    pub model: String,
    /// Control kind
    pub kind: FieldKind,
}

impl FieldSpec {
    /// Text input bound to `model`
    #[must_use]
    pub fn text(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            kind: FieldKind::Text,
        }
    }

    /// Checkbox bound to `model`
    #[must_use]
    pub fn checkbox(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            kind: FieldKind::Checkbox,
        }
    }
}

/// A group of fields, shown behind a tab when it has a label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneSpec {
    /// Tab label
    pub label: Option<String>,
    /// Fields on the pane
    pub fields: Vec<FieldSpec>,
}

/// Save button and the section it persists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSpec {
    /// `data-ng-click` expression
    pub expression: String,
    /// Configuration section written on click
    pub section: String,
}

/// An admin screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenSpec {
    /// Route, e.g. `admin/mail`
    pub path: String,
    /// Panes; the first one is open after loading
    pub panes: Vec<PaneSpec>,
    /// Save control
    pub save: Option<SaveSpec>,
}

impl ScreenSpec {
    /// Empty screen at `path`
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            panes: Vec::new(),
            save: None,
        }
    }

    /// Add a pane
    #[must_use]
    pub fn with_pane(mut self, label: Option<&str>, fields: Vec<FieldSpec>) -> Self {
        self.panes.push(PaneSpec {
            label: label.map(str::to_string),
            fields,
        });
        self
    }

    /// Add a save control persisting `section`
    #[must_use]
    pub fn with_save(mut self, expression: impl Into<String>, section: impl Into<String>) -> Self {
        self.save = Some(SaveSpec {
            expression: expression.into(),
            section: section.into(),
        });
        self
    }

    fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.panes.iter().flat_map(|p| p.fields.iter())
    }
}

/// The admin screens the built-in scenarios exercise
#[must_use]
pub fn admin_screens() -> Vec<ScreenSpec> {
    vec![
        ScreenSpec::new("admin/landing"),
        ScreenSpec::new("admin/advanced_settings")
            .with_pane(
                Some("Main configuration"),
                vec![
                    FieldSpec::text("admin.node.maximum_namesize"),
                    FieldSpec::text("admin.node.maximum_textsize"),
                    FieldSpec::text("admin.node.maximum_filesize"),
                ],
            )
            .with_pane(
                Some("HTTPS settings"),
                vec![
                    FieldSpec::checkbox("admin.node.tor2web_admin"),
                    FieldSpec::checkbox("admin.node.tor2web_whistleblower"),
                    FieldSpec::checkbox("admin.node.tor2web_custodian"),
                    FieldSpec::checkbox("admin.node.tor2web_receiver"),
                    FieldSpec::checkbox("admin.node.tor2web_unauth"),
                ],
            )
            .with_pane(
                Some("Anomaly detection thresholds"),
                vec![
                    FieldSpec::text("admin.node.threshold_free_disk_megabytes_high"),
                    FieldSpec::text("admin.node.threshold_free_disk_megabytes_medium"),
                    FieldSpec::text("admin.node.threshold_free_disk_megabytes_low"),
                    FieldSpec::text("admin.node.threshold_free_disk_percentage_high"),
                    FieldSpec::text("admin.node.threshold_free_disk_percentage_medium"),
                    FieldSpec::text("admin.node.threshold_free_disk_percentage_low"),
                ],
            )
            .with_save("updateNode(admin.node)", "node"),
        ScreenSpec::new("admin/mail")
            .with_pane(
                None,
                vec![
                    FieldSpec::text("admin.notification.server"),
                    FieldSpec::text("admin.notification.port"),
                    FieldSpec::text("admin.notification.source_email"),
                    FieldSpec::text("admin.notification.tip_expiration_threshold"),
                    FieldSpec::text("admin.notification.notification_threshold_per_hour"),
                    FieldSpec::checkbox("admin.notification.disable_admin_notification_emails"),
                ],
            )
            .with_save("Utils.update(admin.notification)", "notification"),
    ]
}

// =============================================================================
// ELEMENTS AND SELECTOR MATCHING
// =============================================================================

#[derive(Debug, Clone)]
enum Role {
    Tab(usize),
    Field { model: String, kind: FieldKind },
    Save,
}

#[derive(Debug, Clone)]
struct SimElement {
    tag: &'static str,
    text: String,
    attrs: Vec<(&'static str, String)>,
    role: Role,
}

impl SimElement {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// One compound selector: optional tag plus attribute filters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl Compound {
    fn matches(&self, el: &SimElement) -> bool {
        if self.tag.as_deref().is_some_and(|t| t != el.tag) {
            return false;
        }
        self.attrs.iter().all(|(name, value)| match value {
            Some(v) => el.attr(name) == Some(v.as_str()),
            None => el.attr(name).is_some(),
        })
    }
}

/// Parse the selector subset the locators produce: `tag`, `[attr]`,
/// `[attr="value"]` and comma-separated lists of those.
fn parse_selector_list(css: &str) -> ProbeResult<Vec<Compound>> {
    let unsupported =
        |why: &str| ProbeError::script(format!("unsupported selector {css:?}: {why}"));
    let mut list = Vec::new();
    let mut chars = css.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }

        let mut tag = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_alphanumeric() || c == '-' || c == '*' {
                tag.push(c);
                chars.next();
            } else {
                break;
            }
        }
        let universal = tag == "*";
        let mut compound = Compound {
            tag: (!tag.is_empty() && !universal).then(|| tag.to_ascii_lowercase()),
            attrs: Vec::new(),
        };

        while chars.peek() == Some(&'[') {
            chars.next();
            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c == '=' || c == ']' {
                    break;
                }
                name.push(c);
                chars.next();
            }
            let value = match chars.next() {
                Some(']') => None,
                Some('=') => {
                    if chars.next() != Some('"') {
                        return Err(unsupported("attribute values must be double-quoted"));
                    }
                    let mut value = String::new();
                    loop {
                        match chars.next() {
                            Some('\\') => {
                                if let Some(c) = chars.next() {
                                    value.push(c);
                                }
                            }
                            Some('"') => break,
                            Some(c) => value.push(c),
                            None => return Err(unsupported("unterminated string")),
                        }
                    }
                    if chars.next() != Some(']') {
                        return Err(unsupported("expected ']'"));
                    }
                    Some(value)
                }
                _ => return Err(unsupported("unterminated attribute")),
            };
            compound.attrs.push((name.trim().to_string(), value));
        }

        if compound.tag.is_none() && compound.attrs.is_empty() && !universal {
            return Err(unsupported("empty selector"));
        }
        list.push(compound);

        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            None => return Ok(list),
            Some(',') => {}
            Some(c) => return Err(unsupported(&format!("unexpected '{c}'"))),
        }
    }
}

fn selector_matches(selector: &Selector, el: &SimElement) -> ProbeResult<bool> {
    Ok(match selector {
        Selector::Model(path) => MODEL_ATTRIBUTES
            .iter()
            .any(|attr| el.attr(attr) == Some(path.as_str())),
        Selector::Css(css) => parse_selector_list(css)?.iter().any(|c| c.matches(el)),
        Selector::CssWithText { css, text } => {
            el.text.contains(text.as_str())
                && parse_selector_list(css)?.iter().any(|c| c.matches(el))
        }
        Selector::Text(text) => el.text.contains(text.as_str()),
    })
}

/// Give a typed draft value the JSON type of the persisted one
fn coerce_like(draft: &Value, stored: Option<&Value>) -> Value {
    match (draft, stored) {
        (Value::Object(fields), stored) => {
            let mut out = Map::new();
            for (key, value) in fields {
                let stored_child = stored.and_then(|s| s.get(key));
                out.insert(key.clone(), coerce_like(value, stored_child));
            }
            Value::Object(out)
        }
        (Value::String(s), Some(Value::Number(_))) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| s.trim().parse::<f64>().map(Value::from))
            .unwrap_or_else(|_| draft.clone()),
        _ => draft.clone(),
    }
}

// =============================================================================
// SIMULATED ADMIN
// =============================================================================

#[derive(Debug, Clone)]
struct PageState {
    screen: usize,
    pane: usize,
    drafts: BTreeMap<String, Value>,
}

/// Faults injected into the simulated application
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulatedFaults {
    /// Save clicks are accepted but nothing is persisted
    pub drop_saves: bool,
    /// Model paths whose controls never render
    pub hidden_fields: BTreeSet<String>,
    /// Number of idle polls a save keeps the page busy for
    pub save_latency_polls: u32,
}

/// In-memory admin application
#[derive(Debug)]
pub struct SimulatedAdmin {
    store: MemoryConfigStore,
    screens: Vec<ScreenSpec>,
    faults: SimulatedFaults,
    page: Option<PageState>,
    pending_polls: AtomicU32,
    history: Vec<String>,
}

impl SimulatedAdmin {
    /// Serve the built-in admin screens over `store`
    #[must_use]
    pub fn new(store: MemoryConfigStore) -> Self {
        Self {
            store,
            screens: admin_screens(),
            faults: SimulatedFaults::default(),
            page: None,
            pending_polls: AtomicU32::new(0),
            history: Vec::new(),
        }
    }

    /// Add or replace a screen
    #[must_use]
    pub fn with_screen(mut self, screen: ScreenSpec) -> Self {
        self.screens.retain(|s| s.path != screen.path);
        self.screens.push(screen);
        self
    }

    /// Accept save clicks without persisting
    #[must_use]
    pub fn with_dropped_saves(mut self) -> Self {
        self.faults.drop_saves = true;
        self
    }

    /// Never render the control bound to `model`
    #[must_use]
    pub fn with_hidden_field(mut self, model: impl Into<String>) -> Self {
        self.faults.hidden_fields.insert(model.into());
        self
    }

    /// Keep the page busy for `polls` idle checks after each save
    #[must_use]
    pub fn with_save_latency(mut self, polls: u32) -> Self {
        self.faults.save_latency_polls = polls;
        self
    }

    /// Replace all injected faults
    #[must_use]
    pub fn with_faults(mut self, faults: SimulatedFaults) -> Self {
        self.faults = faults;
        self
    }

    /// Backing store
    #[must_use]
    pub const fn store(&self) -> &MemoryConfigStore {
        &self.store
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Check if an action was performed
    #[must_use]
    pub fn was_called(&self, action: &str) -> bool {
        self.history.iter().any(|c| c.starts_with(action))
    }

    fn load(&self, screen: usize) -> ProbeResult<PageState> {
        let mut drafts = BTreeMap::new();
        let spec = &self.screens[screen];
        let sections = spec
            .fields()
            .map(|f| ModelPath::parse(&f.model).map(|p| p.section().to_string()))
            .chain(spec.save.iter().map(|s| Ok(s.section.clone())));
        for section in sections {
            let section = section?;
            let body = self
                .store
                .section(&section)
                .unwrap_or_else(|| Value::Object(Map::new()));
            drafts.insert(section, body);
        }
        Ok(PageState {
            screen,
            pane: 0,
            drafts,
        })
    }

    fn elements(&self) -> Vec<SimElement> {
        let Some(page) = &self.page else {
            return Vec::new();
        };
        let screen = &self.screens[page.screen];
        let mut elements = Vec::new();

        for (index, pane) in screen.panes.iter().enumerate() {
            if let Some(label) = &pane.label {
                elements.push(SimElement {
                    tag: "a",
                    text: label.clone(),
                    attrs: vec![("href", String::new())],
                    role: Role::Tab(index),
                });
            }
        }
        if let Some(pane) = screen.panes.get(page.pane) {
            for field in &pane.fields {
                if self.faults.hidden_fields.contains(&field.model) {
                    continue;
                }
                let input_type = match field.kind {
                    FieldKind::Text => "text",
                    FieldKind::Checkbox => "checkbox",
                };
                elements.push(SimElement {
                    tag: "input",
                    text: String::new(),
                    attrs: vec![
                        ("data-ng-model", field.model.clone()),
                        ("type", input_type.to_string()),
                    ],
                    role: Role::Field {
                        model: field.model.clone(),
                        kind: field.kind,
                    },
                });
            }
        }
        if let Some(save) = &screen.save {
            elements.push(SimElement {
                tag: "button",
                text: "Update".to_string(),
                attrs: vec![
                    ("data-ng-click", save.expression.clone()),
                    ("type", "submit".to_string()),
                ],
                role: Role::Save,
            });
        }
        elements
    }

    fn find(&self, locator: &Locator) -> ProbeResult<SimElement> {
        for el in self.elements() {
            if selector_matches(locator.selector(), &el)? {
                return Ok(el);
            }
        }
        Err(not_found(locator))
    }

    fn page_mut(&mut self) -> ProbeResult<&mut PageState> {
        self.page
            .as_mut()
            .ok_or_else(|| ProbeError::script("no page loaded"))
    }

    fn draft(&self, model: &str) -> ProbeResult<Value> {
        let path = ModelPath::parse(model)?;
        Ok(self
            .page
            .as_ref()
            .and_then(|p| p.drafts.get(path.section()))
            .and_then(|body| lookup(body, path.attribute()))
            .cloned()
            .unwrap_or(Value::Null))
    }

    fn set_draft(&mut self, model: &str, value: Value) -> ProbeResult<()> {
        let path = ModelPath::parse(model)?;
        let page = self.page_mut()?;
        let body = page
            .drafts
            .entry(path.section().to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        assign(body, path.attribute(), value)
    }

    fn save(&mut self, locator: &Locator) -> ProbeResult<()> {
        let screen = self.page_mut()?.screen;
        let Some(save) = self.screens[screen].save.clone() else {
            return Err(not_found(locator));
        };

        self.pending_polls
            .store(self.faults.save_latency_polls, Ordering::SeqCst);
        if self.faults.drop_saves {
            tracing::debug!(section = %save.section, "simulated save dropped");
            return Ok(());
        }

        let draft = self
            .page
            .as_ref()
            .and_then(|p| p.drafts.get(&save.section))
            .cloned()
            .unwrap_or(Value::Null);
        let stored = self.store.section(&save.section);
        let body = coerce_like(&draft, stored.as_ref());
        self.store.set_section(&save.section, body);
        tracing::debug!(section = %save.section, "simulated save persisted");
        Ok(())
    }

    fn text_field(el: &SimElement) -> ProbeResult<&str> {
        match &el.role {
            Role::Field {
                model,
                kind: FieldKind::Text,
            } => Ok(model.as_str()),
            _ => Err(ProbeError::script(format!(
                "<{}> is not an editable text field",
                el.tag
            ))),
        }
    }
}

#[async_trait]
impl AdminDriver for SimulatedAdmin {
    async fn navigate(&mut self, path: &str) -> ProbeResult<()> {
        self.history.push(format!("navigate:{path}"));
        let screen = self
            .screens
            .iter()
            .position(|s| s.path == path)
            .ok_or_else(|| ProbeError::Navigation {
                url: path.to_string(),
                message: "no admin screen at this route".to_string(),
            })?;
        self.page = Some(self.load(screen)?);
        Ok(())
    }

    async fn count(&self, locator: &Locator) -> ProbeResult<usize> {
        let mut count = 0;
        for el in self.elements() {
            if selector_matches(locator.selector(), &el)? {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn click(&mut self, locator: &Locator) -> ProbeResult<()> {
        self.history.push(format!("click:{locator}"));
        let el = self.find(locator)?;
        match el.role {
            Role::Tab(index) => self.page_mut()?.pane = index,
            Role::Field {
                model,
                kind: FieldKind::Checkbox,
            } => {
                let checked = self.draft(&model)?.as_bool().unwrap_or(false);
                self.set_draft(&model, Value::Bool(!checked))?;
            }
            Role::Field { .. } => {}
            Role::Save => self.save(locator)?,
        }
        Ok(())
    }

    async fn read_value(&self, locator: &Locator) -> ProbeResult<String> {
        let el = self.find(locator)?;
        match &el.role {
            Role::Field {
                model,
                kind: FieldKind::Text,
            } => match FieldValue::from_json(FieldKind::Text, &self.draft(model)?) {
                FieldValue::Text(text) => Ok(text),
                FieldValue::Checked(_) => Ok(String::new()),
            },
            Role::Field { .. } => Ok("on".to_string()),
            Role::Tab(_) | Role::Save => Ok(el.text.clone()),
        }
    }

    async fn is_selected(&self, locator: &Locator) -> ProbeResult<bool> {
        let el = self.find(locator)?;
        match &el.role {
            Role::Field {
                model,
                kind: FieldKind::Checkbox,
            } => Ok(self.draft(model)?.as_bool().unwrap_or(false)),
            _ => Ok(false),
        }
    }

    async fn clear(&mut self, locator: &Locator) -> ProbeResult<()> {
        self.history.push(format!("clear:{locator}"));
        let el = self.find(locator)?;
        let model = Self::text_field(&el)?.to_string();
        self.set_draft(&model, Value::String(String::new()))
    }

    async fn type_text(&mut self, locator: &Locator, text: &str) -> ProbeResult<()> {
        self.history.push(format!("type:{locator}:{text}"));
        let el = self.find(locator)?;
        let model = Self::text_field(&el)?.to_string();
        let mut current = match FieldValue::from_json(FieldKind::Text, &self.draft(&model)?) {
            FieldValue::Text(text) => text,
            FieldValue::Checked(_) => String::new(),
        };
        current.push_str(text);
        self.set_draft(&model, Value::String(current))
    }

    async fn is_idle(&self) -> ProbeResult<bool> {
        let busy = self
            .pending_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        Ok(!busy)
    }

    async fn reload(&mut self) -> ProbeResult<()> {
        self.history.push("reload".to_string());
        let screen = self
            .page
            .as_ref()
            .map(|p| p.screen)
            .ok_or_else(|| ProbeError::Navigation {
                url: String::new(),
                message: "nothing loaded to reload".to_string(),
            })?;
        self.page = Some(self.load(screen)?);
        Ok(())
    }

    async fn current_path(&self) -> ProbeResult<String> {
        Ok(self
            .page
            .as_ref()
            .map(|p| self.screens[p.screen].path.clone())
            .unwrap_or_default())
    }
}
