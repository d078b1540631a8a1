//! Persisted configuration access for snapshot and restore.
//!
//! The admin API stores configuration in sections (`node`, `notification`),
//! each a JSON document. Stores treat section bodies as opaque values: a
//! snapshot is whatever `fetch` returned and a restore writes it back verbatim.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::result::{ProbeError, ProbeResult};
use crate::settings::ModelPath;

/// Captured configuration sections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// Section name to section body
    pub sections: BTreeMap<String, Value>,
    /// When the snapshot was taken
    pub taken_at: DateTime<Utc>,
}

impl ConfigSnapshot {
    /// Create an empty snapshot stamped now
    #[must_use]
    pub fn new() -> Self {
        Self {
            sections: BTreeMap::new(),
            taken_at: Utc::now(),
        }
    }

    /// Names of the captured sections
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Whether nothing was captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Read/write access to persisted configuration sections
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Fetch the current body of a section
    async fn fetch(&self, section: &str) -> ProbeResult<Value>;

    /// Replace the body of a section
    async fn put(&self, section: &str, body: &Value) -> ProbeResult<()>;

    /// Capture the given sections
    async fn snapshot(&self, sections: &[String]) -> ProbeResult<ConfigSnapshot> {
        let mut snapshot = ConfigSnapshot::new();
        for section in sections {
            let body = self.fetch(section).await?;
            snapshot.sections.insert(section.clone(), body);
        }
        Ok(snapshot)
    }

    /// Write every captured section back
    async fn restore(&self, snapshot: &ConfigSnapshot) -> ProbeResult<()> {
        for (section, body) in &snapshot.sections {
            self.put(section, body).await?;
        }
        Ok(())
    }
}

// =============================================================================
// DOTTED ATTRIBUTE ACCESS
// =============================================================================

/// Look up a dotted attribute inside a section body
#[must_use]
pub fn lookup<'v>(body: &'v Value, attribute: &str) -> Option<&'v Value> {
    attribute
        .split('.')
        .try_fold(body, |value, key| value.as_object()?.get(key))
}

/// Set a dotted attribute inside a section body, creating objects on the way
///
/// # Errors
///
/// Returns error if an intermediate value exists and is not an object
pub fn assign(body: &mut Value, attribute: &str, new_value: Value) -> ProbeResult<()> {
    let mut current = body;
    let mut keys = attribute.split('.').peekable();
    while let Some(key) = keys.next() {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        let object = current
            .as_object_mut()
            .ok_or_else(|| ProbeError::store(format!("'{attribute}' crosses a non-object at '{key}'")))?;
        if keys.peek().is_none() {
            object.insert(key.to_string(), new_value);
            return Ok(());
        }
        current = object.entry(key.to_string()).or_insert(Value::Null);
    }
    Ok(())
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// Shared in-memory configuration document
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    sections: Arc<Mutex<BTreeMap<String, Value>>>,
}

impl MemoryConfigStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding fresh-install defaults
    #[must_use]
    pub fn with_defaults() -> Self {
        let store = Self::new();
        {
            let mut sections = store.lock();
            sections.insert(
                "node".to_string(),
                json!({
                    "name": "Admin Probe Test Node",
                    "maximum_namesize": 128,
                    "maximum_textsize": 4096,
                    "maximum_filesize": 30,
                    "tor2web_admin": true,
                    "tor2web_whistleblower": false,
                    "tor2web_custodian": false,
                    "tor2web_receiver": false,
                    "tor2web_unauth": true,
                    "threshold_free_disk_megabytes_high": 200,
                    "threshold_free_disk_megabytes_medium": 500,
                    "threshold_free_disk_megabytes_low": 1000,
                    "threshold_free_disk_percentage_high": 3,
                    "threshold_free_disk_percentage_medium": 5,
                    "threshold_free_disk_percentage_low": 10
                }),
            );
            sections.insert(
                "notification".to_string(),
                json!({
                    "server": "mail.example.org",
                    "port": 587,
                    "security": "TLS",
                    "source_email": "notification@example.org",
                    "tip_expiration_threshold": 72,
                    "notification_threshold_per_hour": 20,
                    "disable_admin_notification_emails": false
                }),
            );
        }
        store
    }

    /// Create a store from explicit sections
    #[must_use]
    pub fn from_sections(sections: BTreeMap<String, Value>) -> Self {
        Self {
            sections: Arc::new(Mutex::new(sections)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Value>> {
        self.sections.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read a section synchronously
    #[must_use]
    pub fn section(&self, section: &str) -> Option<Value> {
        self.lock().get(section).cloned()
    }

    /// Replace a section synchronously
    pub fn set_section(&self, section: &str, body: Value) {
        self.lock().insert(section.to_string(), body);
    }

    /// Persisted value of a field
    #[must_use]
    pub fn attribute(&self, path: &ModelPath) -> Option<Value> {
        let sections = self.lock();
        let body = sections.get(path.section())?;
        lookup(body, path.attribute()).cloned()
    }

    /// Overwrite the persisted value of a field
    ///
    /// # Errors
    ///
    /// Returns error if the attribute path crosses a non-object value
    pub fn set_attribute(&self, path: &ModelPath, value: Value) -> ProbeResult<()> {
        let mut sections = self.lock();
        let body = sections
            .entry(path.section().to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        assign(body, path.attribute(), value)
    }

    /// Names of the stored sections
    #[must_use]
    pub fn section_names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn fetch(&self, section: &str) -> ProbeResult<Value> {
        self.section(section)
            .ok_or_else(|| ProbeError::store(format!("unknown section '{section}'")))
    }

    async fn put(&self, section: &str, body: &Value) -> ProbeResult<()> {
        self.set_section(section, body.clone());
        Ok(())
    }
}

// =============================================================================
// HTTP STORE
// =============================================================================

#[cfg(feature = "http")]
mod http {
    use super::{async_trait, ConfigStore, ProbeError, ProbeResult, Value};
    use std::time::Duration;

    /// Header carrying the admin API token
    pub const API_TOKEN_HEADER: &str = "x-api-token";

    /// Configuration store backed by the admin REST API
    #[derive(Debug, Clone)]
    pub struct HttpConfigStore {
        base_url: String,
        api_token: Option<String>,
        client: reqwest::Client,
    }

    impl HttpConfigStore {
        /// Create a store for the application at `base_url`
        ///
        /// # Errors
        ///
        /// Returns error if the HTTP client cannot be built
        pub fn new(base_url: impl Into<String>) -> ProbeResult<Self> {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .map_err(|e| ProbeError::store(format!("failed to build HTTP client: {e}")))?;
            Ok(Self::with_client(base_url, client))
        }

        /// Create a store that sends requests through `client`
        pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
            Self {
                base_url: base_url.into().trim_end_matches('/').to_string(),
                api_token: None,
                client,
            }
        }

        /// Authenticate requests with an admin API token
        #[must_use]
        pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
            self.api_token = Some(token.into());
            self
        }

        /// Returns the base URL.
        pub fn base_url(&self) -> &str {
            &self.base_url
        }

        /// Endpoint of a section
        #[must_use]
        pub fn section_url(&self, section: &str) -> String {
            format!("{}/api/admin/{section}", self.base_url)
        }

        fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
            match &self.api_token {
                Some(token) => request.header(API_TOKEN_HEADER, token),
                None => request,
            }
        }

        async fn check(response: reqwest::Response, url: &str) -> ProbeResult<reqwest::Response> {
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }
            let body = response.text().await.unwrap_or_default();
            Err(ProbeError::store(format!(
                "{url} returned {}: {body}",
                status.as_u16()
            )))
        }
    }

    #[async_trait]
    impl ConfigStore for HttpConfigStore {
        async fn fetch(&self, section: &str) -> ProbeResult<Value> {
            let url = self.section_url(section);
            let response = self
                .authorize(self.client.get(&url))
                .send()
                .await
                .map_err(|e| ProbeError::store(e.to_string()))?;
            let response = Self::check(response, &url).await?;
            response
                .json()
                .await
                .map_err(|e| ProbeError::store(e.to_string()))
        }

        async fn put(&self, section: &str, body: &Value) -> ProbeResult<()> {
            let url = self.section_url(section);
            let response = self
                .authorize(self.client.put(&url).json(body))
                .send()
                .await
                .map_err(|e| ProbeError::store(e.to_string()))?;
            Self::check(response, &url).await?;
            tracing::debug!(section, "restored section over HTTP");
            Ok(())
        }
    }
}

#[cfg(feature = "http")]
pub use http::{HttpConfigStore, API_TOKEN_HEADER};
