//! Name to action lookup
//!
//! Registration is an explicit insert that refuses to replace anything
//! already present. Every attempt, accepted or not, is kept as a
//! [`RegistrationEvent`] so the front end can report what happened.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{builtin_actions, Action};
use crate::error::{AdbwError, Result};

pub const BUILTIN_SOURCE: &str = "builtin";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Registered,
    Conflict,
    Failed,
}

/// Outcome of one registration attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationEvent {
    /// Action name, empty when a whole plugin failed to load
    pub name: String,
    /// Where the action came from (`builtin` or a manifest path)
    pub source: String,
    pub status: RegistrationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Listing entry for one registered action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionInfo {
    pub name: String,
    pub description: String,
    pub source: String,
}

struct Entry {
    action: Arc<dyn Action>,
    source: String,
}

#[derive(Default)]
pub struct ActionRegistry {
    actions: BTreeMap<String, Entry>,
    events: Vec<RegistrationEvent>,
}

impl ActionRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in action
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for action in builtin_actions() {
            // names are distinct, nothing to conflict with
            let _ = registry.register(action, BUILTIN_SOURCE);
        }
        registry
    }

    /// Add `action` under its own name. A name that is already taken is a
    /// `RegistrationConflict`; the existing action stays in place.
    pub fn register(&mut self, action: Arc<dyn Action>, source: &str) -> Result<()> {
        let name = action.name().to_string();

        if let Some(existing) = self.actions.get(&name) {
            let message = format!("'{}' is already provided by {}", name, existing.source);
            tracing::warn!(source, "rejected action registration: {}", message);
            self.events.push(RegistrationEvent {
                name: name.clone(),
                source: source.to_string(),
                status: RegistrationStatus::Conflict,
                message: Some(message),
            });
            return Err(AdbwError::RegistrationConflict(name));
        }

        tracing::debug!(action = %name, source, "registered action");
        self.events.push(RegistrationEvent {
            name: name.clone(),
            source: source.to_string(),
            status: RegistrationStatus::Registered,
            message: None,
        });
        self.actions.insert(
            name,
            Entry {
                action,
                source: source.to_string(),
            },
        );
        Ok(())
    }

    /// Record a source that could not produce any action
    pub fn record_failure(&mut self, source: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(source, "plugin failed to load: {}", message);
        self.events.push(RegistrationEvent {
            name: String::new(),
            source: source.to_string(),
            status: RegistrationStatus::Failed,
            message: Some(message),
        });
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Action>> {
        self.actions
            .get(name)
            .map(|entry| entry.action.clone())
            .ok_or_else(|| AdbwError::UnknownAction(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Registered actions sorted by name
    pub fn list(&self) -> Vec<ActionInfo> {
        self.actions
            .iter()
            .map(|(name, entry)| ActionInfo {
                name: name.clone(),
                description: entry.action.description().to_string(),
                source: entry.source.clone(),
            })
            .collect()
    }

    pub fn events(&self) -> &[RegistrationEvent] {
        &self.events
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("events", &self.events.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionContext, ActionOutput, StepParams};
    use crate::adb::Device;
    use async_trait::async_trait;

    struct Named(&'static str);

    #[async_trait]
    impl Action for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn execute(
            &self,
            _ctx: &ActionContext,
            _device: &Device,
            _params: &StepParams,
        ) -> Result<ActionOutput> {
            Ok(ActionOutput::Streaming {
                command: "fake".to_string(),
            })
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = ActionRegistry::with_builtins();
        for name in [
            "install_apk",
            "clear_data",
            "launch_app",
            "tail_filtered_logcat",
            "run_shell",
        ] {
            assert!(registry.contains(name), "missing {name}");
        }
        assert!(registry
            .events()
            .iter()
            .all(|e| e.status == RegistrationStatus::Registered));
    }

    #[test]
    fn test_conflict_keeps_builtin() {
        let mut registry = ActionRegistry::with_builtins();
        let err = registry
            .register(Arc::new(Named("install_apk")), "plugins/evil.toml")
            .unwrap_err();
        assert!(matches!(err, AdbwError::RegistrationConflict(ref n) if n == "install_apk"));

        let info = registry
            .list()
            .into_iter()
            .find(|i| i.name == "install_apk")
            .unwrap();
        assert_eq!(info.source, BUILTIN_SOURCE);

        let last = registry.events().last().unwrap();
        assert_eq!(last.status, RegistrationStatus::Conflict);
        assert_eq!(last.source, "plugins/evil.toml");
    }

    #[test]
    fn test_unknown_action() {
        let registry = ActionRegistry::with_builtins();
        assert!(matches!(
            registry.resolve("reboot_into_space"),
            Err(AdbwError::UnknownAction(ref n)) if n == "reboot_into_space"
        ));
    }

    #[test]
    fn test_record_failure_is_reported() {
        let mut registry = ActionRegistry::new();
        registry.record_failure("plugins/broken.toml", "expected `=`");
        assert_eq!(registry.events()[0].status, RegistrationStatus::Failed);
        assert!(registry.list().is_empty());
    }
}
