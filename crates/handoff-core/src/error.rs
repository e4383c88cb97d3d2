// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for the hand-off bridge.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for all hand-off operations.
#[derive(Debug, Error)]
pub enum HandoffError {
    // -- Intake pipeline --
    #[error("source could not be opened: {0}")]
    UnreadableSource(String),

    #[error("rejected '{name}': not a .{extension} file")]
    ValidationRejected { name: String, extension: String },

    #[error("relocation to {} failed: {source}", path.display())]
    RelocationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // -- Delivery channel --
    #[error("method not implemented: {0}")]
    NotImplemented(String),

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    Config(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Platform bridge --
    #[error("platform bridge error: {0}")]
    Bridge(String),
}

impl HandoffError {
    /// Wrap an I/O failure that happened while staging `path`.
    pub fn relocation(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::RelocationFailed {
            path: path.into(),
            source,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HandoffError>;
