//! JSON-file stores for workflows, profiles, device aliases and the
//! remembered device
//!
//! A missing file reads as empty. Writes go to a uniquely named sibling
//! temp file that is then renamed over the target, so a crash never leaves
//! half a file.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::config::Settings;
use crate::error::{AdbwError, Result};
use crate::workflow::{Profile, Workflow};

#[derive(Debug, Clone)]
struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load<T: DeserializeOwned + Default>(&self) -> Result<T> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(self.error(e)),
        };
        if content.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&content).map_err(|e| self.error(e))
    }

    fn save<T: Serialize>(&self, value: &T) -> Result<()> {
        let parent = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                std::fs::create_dir_all(parent).map_err(|e| self.error(e))?;
                parent
            }
            None => Path::new("."),
        };
        let mut json = serde_json::to_string_pretty(value).map_err(|e| self.error(e))?;
        json.push('\n');

        // unique per writer, so concurrent saves never share a temp file
        let mut tmp = NamedTempFile::new_in(parent).map_err(|e| self.error(e))?;
        tmp.write_all(json.as_bytes()).map_err(|e| self.error(e))?;
        tmp.persist(&self.path).map_err(|e| self.error(e.error))?;
        Ok(())
    }

    fn error(&self, e: impl std::fmt::Display) -> AdbwError {
        AdbwError::Store(format!("{}: {}", self.path.display(), e))
    }
}

// ============================================================================
// Workflows
// ============================================================================

/// Workflows kept as a JSON list, unique by name
#[derive(Debug, Clone)]
pub struct WorkflowStore {
    file: JsonFile,
}

impl WorkflowStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
        }
    }

    pub fn list(&self) -> Result<Vec<Workflow>> {
        self.file.load()
    }

    pub fn get(&self, name: &str) -> Result<Option<Workflow>> {
        Ok(self.list()?.into_iter().find(|w| w.name == name))
    }

    /// Insert, or replace the workflow with the same name
    pub fn save(&self, workflow: Workflow) -> Result<()> {
        if workflow.name.trim().is_empty() {
            return Err(AdbwError::invalid("name", "workflow name must not be empty"));
        }
        let mut workflows = self.list()?;
        workflows.retain(|w| w.name != workflow.name);
        workflows.push(workflow);
        self.file.save(&workflows)
    }

    /// Returns whether anything was removed
    pub fn delete(&self, name: &str) -> Result<bool> {
        let mut workflows = self.list()?;
        let before = workflows.len();
        workflows.retain(|w| w.name != name);
        if workflows.len() == before {
            return Ok(false);
        }
        self.file.save(&workflows)?;
        Ok(true)
    }
}

// ============================================================================
// Profiles
// ============================================================================

#[derive(Debug, Clone)]
pub struct ProfileStore {
    file: JsonFile,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
        }
    }

    pub fn list(&self) -> Result<BTreeMap<String, Profile>> {
        self.file.load()
    }

    pub fn get(&self, name: &str) -> Result<Option<Profile>> {
        Ok(self.list()?.remove(name))
    }

    pub fn save(&self, name: &str, profile: Profile) -> Result<()> {
        if name.trim().is_empty() {
            return Err(AdbwError::invalid("name", "profile name must not be empty"));
        }
        let mut profiles = self.list()?;
        profiles.insert(name.to_string(), profile);
        self.file.save(&profiles)
    }

    pub fn delete(&self, name: &str) -> Result<bool> {
        let mut profiles = self.list()?;
        if profiles.remove(name).is_none() {
            return Ok(false);
        }
        self.file.save(&profiles)?;
        Ok(true)
    }
}

// ============================================================================
// Aliases
// ============================================================================

/// Friendly names for device serials
#[derive(Debug, Clone)]
pub struct AliasStore {
    file: JsonFile,
}

impl AliasStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
        }
    }

    pub fn list(&self) -> Result<BTreeMap<String, String>> {
        self.file.load()
    }

    pub fn set(&self, alias: &str, serial: &str) -> Result<()> {
        if alias.trim().is_empty() || serial.trim().is_empty() {
            return Err(AdbwError::invalid("alias", "alias and serial must not be empty"));
        }
        let mut aliases = self.list()?;
        aliases.insert(alias.trim().to_string(), serial.trim().to_string());
        self.file.save(&aliases)
    }

    pub fn remove(&self, alias: &str) -> Result<bool> {
        let mut aliases = self.list()?;
        if aliases.remove(alias).is_none() {
            return Ok(false);
        }
        self.file.save(&aliases)?;
        Ok(true)
    }

    /// The serial behind `name`, or `name` itself when it is not an alias
    pub fn resolve(&self, name: &str) -> Result<String> {
        Ok(self
            .list()?
            .remove(name)
            .unwrap_or_else(|| name.to_string()))
    }
}

// ============================================================================
// Remembered device
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliState {
    #[serde(default)]
    pub last_serial: Option<String>,
}

/// Small state file remembering the last selected device between runs
#[derive(Debug, Clone)]
pub struct StateStore {
    file: JsonFile,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
        }
    }

    pub fn load(&self) -> Result<CliState> {
        self.file.load()
    }

    pub fn remembered_serial(&self) -> Option<String> {
        match self.load() {
            Ok(state) => state.last_serial,
            Err(e) => {
                tracing::warn!("ignoring unreadable state file: {}", e);
                None
            }
        }
    }

    pub fn remember(&self, serial: &str) -> Result<()> {
        let mut state = self.load().unwrap_or_default();
        if state.last_serial.as_deref() == Some(serial) {
            return Ok(());
        }
        state.last_serial = Some(serial.to_string());
        self.file.save(&state)
    }
}

/// All stores at the locations named in `[paths]`
#[derive(Debug, Clone)]
pub struct Stores {
    pub workflows: WorkflowStore,
    pub profiles: ProfileStore,
    pub aliases: AliasStore,
    pub state: StateStore,
}

impl Stores {
    pub fn from_settings(settings: &Settings) -> Self {
        Self::under(Path::new(""), settings)
    }

    /// Stores with relative paths resolved against `root`
    pub fn under(root: &Path, settings: &Settings) -> Self {
        let paths = &settings.paths;
        Self {
            workflows: WorkflowStore::new(root.join(&paths.workflows)),
            profiles: ProfileStore::new(root.join(&paths.profiles)),
            aliases: AliasStore::new(root.join(&paths.aliases)),
            state: StateStore::new(root.join(&paths.state)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::StepDefinition;

    #[test]
    fn test_missing_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let stores = Stores::under(dir.path(), &Settings::default());
        assert!(stores.workflows.list().unwrap().is_empty());
        assert!(stores.profiles.list().unwrap().is_empty());
        assert!(stores.aliases.list().unwrap().is_empty());
        assert_eq!(stores.state.remembered_serial(), None);
    }

    #[test]
    fn test_workflow_save_replaces_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkflowStore::new(dir.path().join("wf.json"));

        store
            .save(Workflow::new("smoke").with_step(StepDefinition::new("install_apk")))
            .unwrap();
        store.save(Workflow::new("other")).unwrap();
        store
            .save(Workflow::new("smoke").with_step(StepDefinition::new("launch_app")))
            .unwrap();

        let workflows = store.list().unwrap();
        assert_eq!(workflows.len(), 2);
        let smoke = store.get("smoke").unwrap().unwrap();
        assert_eq!(smoke.steps[0].action, "launch_app");

        assert!(store.delete("other").unwrap());
        assert!(!store.delete("other").unwrap());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_reads_hand_written_workflow_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wf.json");
        std::fs::write(
            &path,
            r#"[{"name": "loop", "steps": [{"action": "clear_data", "package": "com.a"}, {"action": "tail_filtered_logcat", "tag": "A", "priority": "W"}]}]"#,
        )
        .unwrap();

        let workflow = WorkflowStore::new(&path).get("loop").unwrap().unwrap();
        assert_eq!(workflow.steps.len(), 2);
        assert_eq!(workflow.steps[1].params["priority"], "W");
    }

    #[test]
    fn test_corrupt_file_is_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ProfileStore::new(&path).list(),
            Err(AdbwError::Store(_))
        ));
    }

    #[test]
    fn test_alias_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let aliases = AliasStore::new(dir.path().join("aliases.json"));
        aliases.set("pixel", "R58M123").unwrap();

        assert_eq!(aliases.resolve("pixel").unwrap(), "R58M123");
        assert_eq!(aliases.resolve("emulator-5554").unwrap(), "emulator-5554");
        assert!(aliases.remove("pixel").unwrap());
        assert_eq!(aliases.resolve("pixel").unwrap(), "pixel");
    }

    #[test]
    fn test_remember_serial() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateStore::new(dir.path().join("nested").join("state.json"));
        state.remember("emulator-5554").unwrap();
        assert_eq!(state.remembered_serial().as_deref(), Some("emulator-5554"));
    }

    #[test]
    fn test_profiles_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path().join("profiles.json"));
        store
            .save(
                "app",
                Profile {
                    package_name: "com.example".into(),
                    ..Default::default()
                },
            )
            .unwrap();

        let raw = std::fs::read_to_string(dir.path().join("profiles.json")).unwrap();
        assert!(raw.contains("\"package_name\": \"com.example\""));
        assert!(!raw.contains("activity"));
        assert!(store.delete("app").unwrap());
        assert!(store.get("app").unwrap().is_none());
    }

    #[test]
    fn test_concurrent_saves_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let serials: Vec<String> = (0..16).map(|i| format!("emulator-{}", 5554 + 2 * i)).collect();

        std::thread::scope(|scope| {
            for serial in &serials {
                let state = StateStore::new(&path);
                scope.spawn(move || state.remember(serial).unwrap());
            }
        });

        let last = StateStore::new(&path).load().unwrap().last_serial.unwrap();
        assert!(serials.contains(&last));
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path() != path)
            .collect();
        assert!(leftovers.is_empty());
    }
}
