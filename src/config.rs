// Relay configuration: which compute modules exist, which one is the default, canvas fallback size.
// Loaded from a JSON file; every field has a default so an empty `{}` is valid.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::compute::loader::{builtin_reference, BUILTIN_MODULES};
use crate::error::{Error, Result};
use crate::types::{ComputeParams, Size};

/// Canvas size used when the host cannot measure its layout.
pub const DEFAULT_CANVAS: Size = Size::new(800, 600);
pub const DEFAULT_MODULE: &str = "game_of_life";
pub const DEFAULT_MAILBOX_CAPACITY: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub default_module: String,
    /// Module name → module reference (`scheme:name`).
    pub modules: BTreeMap<String, String>,
    pub canvas: Size,
    pub mailbox_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        let modules = BUILTIN_MODULES
            .iter()
            .map(|name| (name.to_string(), builtin_reference(name)))
            .collect();
        Self {
            default_module: DEFAULT_MODULE.to_string(),
            modules,
            canvas: DEFAULT_CANVAS,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }
}

impl RelayConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: RelayConfig = serde_json::from_str(&text)?;
        config.validate()?;
        debug!(path = %path.display(), modules = config.modules.len(), "config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.modules.contains_key(&self.default_module) {
            return Err(Error::Config(format!(
                "default module `{}` is not in the module list",
                self.default_module
            )));
        }
        if self.mailbox_capacity == 0 {
            return Err(Error::Config("mailbox_capacity must be at least 1".into()));
        }
        if self.canvas.is_empty() {
            return Err(Error::Config("canvas must have a non-zero size".into()));
        }
        Ok(())
    }

    /// Module reference for `name`; unknown or missing names fall back to the default module.
    pub fn module_reference(&self, name: Option<&str>) -> String {
        if let Some(name) = name {
            if let Some(reference) = self.modules.get(name) {
                return reference.clone();
            }
            warn!(name, fallback = %self.default_module, "unknown module name");
        }
        self.modules
            .get(&self.default_module)
            .cloned()
            .unwrap_or_else(|| builtin_reference(&self.default_module))
    }

    /// Build start parameters. `measured` is the host's layout size, if it has one.
    pub fn resolve(&self, name: Option<&str>, measured: Option<Size>) -> ComputeParams {
        let size = measured.filter(|s| !s.is_empty()).unwrap_or(self.canvas);
        ComputeParams::new(self.module_reference(name), size.width, size.height)
    }
}
