//! Manifest-declared plugin actions
//!
//! A manifest is a TOML file in the plugins directory:
//!
//! ```toml
//! [[actions]]
//! name = "grant_camera"
//! description = "Grant the camera permission"
//! args = ["shell", "pm", "grant", "{package_name}", "android.permission.CAMERA"]
//! ```
//!
//! `args` is passed to `adb -s <serial>`. Every `{param}` placeholder is a
//! required step parameter; `{serial}` is filled from the target device.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{
    canonical_param, param, Action, ActionContext, ActionOutput, ActionRegistry, StepParams,
};
use crate::adb::Device;
use crate::error::{AdbwError, Result};

const SERIAL_PLACEHOLDER: &str = "serial";

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("Invalid placeholder regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    #[serde(default)]
    pub actions: Vec<PluginActionDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginActionDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub args: Vec<String>,
}

impl PluginManifest {
    pub fn from_toml(content: &str) -> Result<Self> {
        let manifest: Self =
            toml::from_str(content).map_err(|e| AdbwError::Plugin(e.to_string()))?;
        for def in &manifest.actions {
            def.validate()?;
        }
        Ok(manifest)
    }
}

impl PluginActionDef {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() || self.name.contains(char::is_whitespace) {
            return Err(AdbwError::Plugin(format!(
                "invalid action name '{}'",
                self.name
            )));
        }
        if self.args.is_empty() {
            return Err(AdbwError::Plugin(format!(
                "action '{}' has no args",
                self.name
            )));
        }
        Ok(())
    }
}

// ============================================================================
// TemplateAction
// ============================================================================

/// Runs an adb argument template with step parameters substituted
#[derive(Debug, Clone)]
pub struct TemplateAction {
    def: PluginActionDef,
}

impl TemplateAction {
    pub fn new(def: PluginActionDef) -> Self {
        Self { def }
    }

    /// Parameters the template needs, in first-use order
    pub fn required_params(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut params = Vec::new();
        for arg in &self.def.args {
            for cap in PLACEHOLDER_RE.captures_iter(arg) {
                let name = &cap[1];
                if name != SERIAL_PLACEHOLDER && seen.insert(name.to_string()) {
                    params.push(name.to_string());
                }
            }
        }
        params
    }

    /// Substitute placeholders; a missing value is `MissingParameter`
    pub fn render(&self, serial: &str, params: &StepParams) -> Result<Vec<String>> {
        self.def
            .args
            .iter()
            .map(|arg| {
                let mut missing = None;
                let rendered = PLACEHOLDER_RE.replace_all(arg, |cap: &regex::Captures| {
                    let name = &cap[1];
                    if name == SERIAL_PLACEHOLDER {
                        return serial.to_string();
                    }
                    match param(params, &[name, canonical_param(name)]) {
                        Some(value) => value.to_string(),
                        None => {
                            missing.get_or_insert_with(|| name.to_string());
                            String::new()
                        }
                    }
                });
                match missing {
                    Some(param) => Err(AdbwError::missing(&self.def.name, param)),
                    None => Ok(rendered.into_owned()),
                }
            })
            .collect()
    }
}

#[async_trait]
impl Action for TemplateAction {
    fn name(&self) -> &str {
        &self.def.name
    }

    fn description(&self) -> &str {
        &self.def.description
    }

    async fn execute(
        &self,
        ctx: &ActionContext,
        device: &Device,
        params: &StepParams,
    ) -> Result<ActionOutput> {
        let args = self.render(&device.serial, params)?;
        let result = ctx.adb().run(Some(&device.serial), args).await;
        Ok(ActionOutput::Command(result))
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Everything found in a plugins directory
#[derive(Debug, Default)]
pub struct PluginLoad {
    /// (manifest path, action)
    pub actions: Vec<(String, TemplateAction)>,
    /// (manifest path, reason)
    pub failures: Vec<(String, String)>,
}

impl PluginLoad {
    /// Register every loaded action and record failures. Conflicts are
    /// recorded by the registry and do not stop the remaining actions.
    pub fn register_into(self, registry: &mut ActionRegistry) {
        for (source, reason) in self.failures {
            registry.record_failure(&source, reason);
        }
        for (source, action) in self.actions {
            let _ = registry.register(Arc::new(action), &source);
        }
    }
}

/// Read every `*.toml` manifest in `dir` (sorted by file name, `_`-prefixed
/// files ignored). A missing directory yields nothing.
pub fn load_plugins(dir: &Path) -> PluginLoad {
    let mut load = PluginLoad::default();
    if !dir.is_dir() {
        return load;
    }

    let mut paths: Vec<_> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| !n.starts_with('_'))
            })
            .collect(),
        Err(e) => {
            load.failures
                .push((dir.display().to_string(), e.to_string()));
            return load;
        }
    };
    paths.sort();

    for path in paths {
        let source = path.display().to_string();
        let parsed = std::fs::read_to_string(&path)
            .map_err(AdbwError::from)
            .and_then(|content| PluginManifest::from_toml(&content));
        match parsed {
            Ok(manifest) => {
                tracing::debug!(source = %source, count = manifest.actions.len(), "loaded plugin manifest");
                load.actions.extend(
                    manifest
                        .actions
                        .into_iter()
                        .map(|def| (source.clone(), TemplateAction::new(def))),
                );
            }
            Err(e) => load.failures.push((source, e.to_string())),
        }
    }

    load
}
