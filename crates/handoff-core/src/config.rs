// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Hand-off configuration and its JSON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{HandoffError, Result};

/// File name of the persisted configuration inside the config directory.
pub const CONFIG_FILE: &str = "handoff.json";

/// Settings shared by the intake pipeline and the delivery channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandoffConfig {
    /// Symbolic name of the channel the App listens on.
    pub channel_name: String,
    /// Reserved backup extension, without the leading dot.
    pub backup_extension: String,
    /// Subdirectory of the cache root that receives staged files.
    pub staging_dir_name: String,
    /// Name used when neither the OS nor the reference yields one.
    pub fallback_name: String,
    /// Overrides the platform cache root (tests, desktop harness).
    pub cache_root: Option<PathBuf>,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            channel_name: "com.rocwei.password/file_intent".into(),
            backup_extension: "passbackup".into(),
            staging_dir_name: "received_backups".into(),
            fallback_name: "received_backup.passbackup".into(),
            cache_root: None,
        }
    }
}

impl HandoffConfig {
    /// Load `<dir>/handoff.json`, falling back to defaults when the file is
    /// missing or cannot be parsed.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(CONFIG_FILE);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no config file, using defaults");
                return Self::default();
            }
        };
        match serde_json::from_str(&data) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config file unreadable, using defaults");
                Self::default()
            }
        }
    }

    /// Write the configuration to `<dir>/handoff.json`.
    pub fn persist(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join(CONFIG_FILE), json)?;
        Ok(())
    }

    /// Check the invariants the intake pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        let ext = &self.backup_extension;
        if ext.is_empty() || ext.contains('.') {
            return Err(HandoffError::Config(format!(
                "backup_extension must be a bare extension, got '{ext}'"
            )));
        }
        let dir = &self.staging_dir_name;
        if !is_single_component(dir) {
            return Err(HandoffError::Config(format!(
                "staging_dir_name must be a single path component, got '{dir}'"
            )));
        }
        if !is_single_component(&self.fallback_name) {
            return Err(HandoffError::Config(format!(
                "fallback_name must be a single path component, got '{}'",
                self.fallback_name
            )));
        }
        let suffix = format!(".{}", ext.to_lowercase());
        let fallback = self.fallback_name.to_lowercase();
        if fallback.len() <= suffix.len() || !fallback.ends_with(&suffix) {
            return Err(HandoffError::Config(format!(
                "fallback_name '{}' must end in .{ext}",
                self.fallback_name
            )));
        }
        if self.channel_name.trim().is_empty() {
            return Err(HandoffError::Config("channel_name must not be empty".into()));
        }
        Ok(())
    }
}

fn is_single_component(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != ".."
}
