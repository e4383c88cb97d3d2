// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Desktop/CI bridge. References are `file://` URLs or absolute paths, read
// straight from the filesystem; there is no display-name attribute and no
// scoped access to acquire.

use std::fs::File;
use std::path::PathBuf;

use handoff_core::{FileReference, HandoffError, Result};

use crate::traits::*;

/// Directory created under the user cache dir.
const APP_CACHE_DIR: &str = "handoff";

/// Filesystem-backed bridge used on non-mobile platforms.
#[derive(Debug, Default)]
pub struct DesktopBridge {
    cache_root: Option<PathBuf>,
}

impl DesktopBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `root` instead of the user cache directory.
    pub fn with_cache_root(root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: Some(root.into()),
        }
    }
}

impl PlatformBridge for DesktopBridge {
    fn platform_name(&self) -> &str {
        "Desktop"
    }
}

impl SourceOpener for DesktopBridge {
    fn open_source(&self, reference: &FileReference) -> Result<OpenedSource> {
        let path = reference.to_local_path().ok_or_else(|| {
            HandoffError::UnreadableSource(format!("not a local file reference: {reference}"))
        })?;

        let unreadable = |e: std::io::Error| {
            HandoffError::UnreadableSource(format!("{}: {e}", path.display()))
        };
        let metadata = std::fs::metadata(&path).map_err(unreadable)?;
        if !metadata.is_file() {
            return Err(HandoffError::UnreadableSource(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        let file = File::open(&path).map_err(unreadable)?;

        tracing::debug!(path = %path.display(), bytes = metadata.len(), "Desktop: opened source");
        Ok(OpenedSource::new(file))
    }
}

impl CacheLocator for DesktopBridge {
    fn cache_root(&self) -> Result<PathBuf> {
        if let Some(root) = &self.cache_root {
            return Ok(root.clone());
        }
        // XDG cache dir, then the system temp dir as a last resort.
        let base = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
        Ok(base.join(APP_CACHE_DIR))
    }
}
