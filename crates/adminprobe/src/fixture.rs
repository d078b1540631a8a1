//! Configuration fixture: snapshot before a scenario, restore after it.
//!
//! Each scenario mutates persisted settings, so a suite is only repeatable if
//! every scenario leaves the configuration the way it found it. The fixture
//! captures the sections a scenario touches on setup and writes them back on
//! teardown, whatever the scenario's outcome.

use std::sync::Arc;

use crate::result::{ProbeError, ProbeResult};
use crate::store::{ConfigSnapshot, ConfigStore};

/// State of a configuration fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureState {
    /// Nothing captured yet.
    Idle,
    /// Sections captured; teardown pending.
    Captured,
    /// Captured sections written back.
    Restored,
    /// Capture or restore failed.
    Failed,
}

/// Scoped snapshot/restore of configuration sections.
pub struct ConfigFixture {
    store: Arc<dyn ConfigStore>,
    sections: Vec<String>,
    snapshot: Option<ConfigSnapshot>,
    state: FixtureState,
}

impl std::fmt::Debug for ConfigFixture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigFixture")
            .field("sections", &self.sections)
            .field("state", &self.state)
            .finish()
    }
}

impl ConfigFixture {
    /// Create a fixture over the given sections.
    pub fn new(store: Arc<dyn ConfigStore>, sections: Vec<String>) -> Self {
        Self {
            store,
            sections,
            snapshot: None,
            state: FixtureState::Idle,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> FixtureState {
        self.state
    }

    /// Sections this fixture guards.
    #[must_use]
    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    /// Snapshot taken during setup.
    #[must_use]
    pub const fn snapshot(&self) -> Option<&ConfigSnapshot> {
        self.snapshot.as_ref()
    }

    /// Capture the guarded sections.
    ///
    /// # Errors
    ///
    /// Returns an error if the fixture was already set up or the store fails.
    pub async fn setup(&mut self) -> ProbeResult<()> {
        if self.state != FixtureState::Idle {
            return Err(ProbeError::Fixture {
                message: format!("cannot capture from state {:?}", self.state),
            });
        }
        match self.store.snapshot(&self.sections).await {
            Ok(snapshot) => {
                tracing::debug!(sections = ?self.sections, "configuration captured");
                self.snapshot = Some(snapshot);
                self.state = FixtureState::Captured;
                Ok(())
            }
            Err(e) => {
                self.state = FixtureState::Failed;
                Err(ProbeError::Fixture {
                    message: format!("snapshot failed: {e}"),
                })
            }
        }
    }

    /// Write the captured sections back.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing was captured or the store fails.
    pub async fn teardown(&mut self) -> ProbeResult<()> {
        let Some(snapshot) = self.snapshot.as_ref() else {
            return Err(ProbeError::Fixture {
                message: "nothing captured to restore".to_string(),
            });
        };
        if self.state != FixtureState::Captured {
            return Err(ProbeError::Fixture {
                message: format!("cannot restore from state {:?}", self.state),
            });
        }
        match self.store.restore(snapshot).await {
            Ok(()) => {
                tracing::debug!(sections = ?self.sections, "configuration restored");
                self.state = FixtureState::Restored;
                Ok(())
            }
            Err(e) => {
                self.state = FixtureState::Failed;
                Err(ProbeError::Fixture {
                    message: format!("restore failed: {e}"),
                })
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::settings::ModelPath;
    use crate::store::MemoryConfigStore;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    /// Store whose writes always fail.
    struct ReadOnlyStore(MemoryConfigStore);

    #[async_trait]
    impl ConfigStore for ReadOnlyStore {
        async fn fetch(&self, section: &str) -> ProbeResult<Value> {
            self.0.fetch(section).await
        }

        async fn put(&self, _section: &str, _body: &Value) -> ProbeResult<()> {
            Err(ProbeError::store("read-only"))
        }
    }

    fn sections() -> Vec<String> {
        vec!["node".to_string()]
    }

    mod lifecycle_tests {
        use super::*;

        #[tokio::test]
        async fn test_setup_then_teardown_restores() {
            let store = MemoryConfigStore::with_defaults();
            let path = ModelPath::parse("admin.node.maximum_textsize").unwrap();
            let mut fixture = ConfigFixture::new(Arc::new(store.clone()), sections());
            assert_eq!(fixture.state(), FixtureState::Idle);

            fixture.setup().await.unwrap();
            assert_eq!(fixture.state(), FixtureState::Captured);
            assert!(fixture.snapshot().is_some());

            store.set_attribute(&path, json!(1337)).unwrap();
            fixture.teardown().await.unwrap();
            assert_eq!(fixture.state(), FixtureState::Restored);
            assert_eq!(store.attribute(&path), Some(json!(4096)));
        }

        #[tokio::test]
        async fn test_teardown_without_setup_fails() {
            let mut fixture =
                ConfigFixture::new(Arc::new(MemoryConfigStore::with_defaults()), sections());
            let err = fixture.teardown().await.unwrap_err();
            assert!(err.to_string().contains("nothing captured"));
            assert_eq!(fixture.state(), FixtureState::Idle);
        }

        #[tokio::test]
        async fn test_double_setup_rejected() {
            let mut fixture =
                ConfigFixture::new(Arc::new(MemoryConfigStore::with_defaults()), sections());
            fixture.setup().await.unwrap();
            assert!(fixture.setup().await.is_err());
        }

        #[tokio::test]
        async fn test_snapshot_failure_marks_failed() {
            let mut fixture = ConfigFixture::new(Arc::new(MemoryConfigStore::new()), sections());
            let err = fixture.setup().await.unwrap_err();
            assert!(matches!(err, ProbeError::Fixture { .. }));
            assert_eq!(fixture.state(), FixtureState::Failed);
        }

        #[tokio::test]
        async fn test_restore_failure_marks_failed() {
            let store = ReadOnlyStore(MemoryConfigStore::with_defaults());
            let mut fixture = ConfigFixture::new(Arc::new(store), sections());
            fixture.setup().await.unwrap();
            let err = fixture.teardown().await.unwrap_err();
            assert!(err.to_string().contains("restore failed"));
            assert_eq!(fixture.state(), FixtureState::Failed);
        }
    }
}
