// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// File-name validation — the only wire-level rule the bridge enforces.

use std::path::Path;

use handoff_core::{HandoffError, Result};

/// Accepts names carrying the reserved backup extension.
#[derive(Debug, Clone)]
pub struct BackupValidator {
    extension: String,
}

impl BackupValidator {
    /// `extension` is given without the leading dot.
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Case-insensitive extension match. Dotfiles such as `.passbackup`
    /// have no stem and are rejected.
    pub fn validate(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }

    /// [`validate`](Self::validate) as a `Result`.
    pub fn check(&self, name: &str) -> Result<()> {
        if self.validate(name) {
            Ok(())
        } else {
            Err(HandoffError::ValidationRejected {
                name: name.to_owned(),
                extension: self.extension.clone(),
            })
        }
    }
}
