// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the hand-off bridge.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Method the App polls for a path buffered before it was ready.
pub const METHOD_GET_INITIAL_FILE_PATH: &str = "getInitialFilePath";

/// Method pushed to the App when a file arrives while it is listening.
pub const METHOD_ON_NEW_FILE_INTENT: &str = "onNewFileIntent";

/// Unique identifier for one delivery, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryId(pub Uuid);

impl DeliveryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DeliveryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque file reference handed over by the OS.
///
/// In practice one of `content://…` (Android provider), `file://…`
/// (iOS open-url, desktop) or a bare absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileReference(String);

impl FileReference {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URL scheme, lowercased. `None` for bare paths.
    pub fn scheme(&self) -> Option<String> {
        self.as_url().map(|u| u.scheme().to_owned())
    }

    /// Local filesystem path for `file://` URLs and bare absolute paths.
    pub fn to_local_path(&self) -> Option<PathBuf> {
        match self.as_url() {
            Some(url) if url.scheme() == "file" => url.to_file_path().ok(),
            Some(_) => None,
            None => {
                let path = Path::new(&self.0);
                path.is_absolute().then(|| path.to_path_buf())
            }
        }
    }

    /// Trailing non-empty path segment, percent-decoded. Query and fragment
    /// are ignored.
    pub fn last_path_segment(&self) -> Option<String> {
        match self.as_url() {
            Some(url) => url
                .path_segments()?
                .filter(|s| !s.is_empty())
                .next_back()
                .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned()),
            None => Path::new(&self.0)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
        }
    }

    // Bare paths fail to parse as absolute URLs; single-letter schemes are
    // Windows drive letters, not URLs.
    fn as_url(&self) -> Option<Url> {
        Url::parse(&self.0).ok().filter(|u| u.scheme().len() > 1)
    }
}

impl std::fmt::Display for FileReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileReference {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for FileReference {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Whether the delivery reached the process before or after the App wired
/// up its channel, as observed by the platform glue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arrival {
    /// Delivered with the launch of the process.
    Cold,
    /// Delivered to an already running process.
    Warm,
}

/// Physical OS channel a delivery came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeAction {
    /// Generic view/open action (Android `ACTION_VIEW`, iOS open-url).
    View,
    /// Share action carrying an attachment stream (Android `EXTRA_STREAM`).
    Send,
}

/// One OS hand-off, alive only for the duration of one intake run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryEvent {
    pub id: DeliveryId,
    pub reference: FileReference,
    pub arrival: Arrival,
    pub action: IntakeAction,
    pub received_at: DateTime<Utc>,
}

impl DeliveryEvent {
    pub fn new(reference: impl Into<FileReference>, arrival: Arrival, action: IntakeAction) -> Self {
        Self {
            id: DeliveryId::new(),
            reference: reference.into(),
            arrival,
            action,
            received_at: Utc::now(),
        }
    }

    /// A view/open delivery that launched the process.
    pub fn cold(reference: impl Into<FileReference>) -> Self {
        Self::new(reference, Arrival::Cold, IntakeAction::View)
    }

    /// A view/open delivery to a running process.
    pub fn warm(reference: impl Into<FileReference>) -> Self {
        Self::new(reference, Arrival::Warm, IntakeAction::View)
    }
}

/// A backup copied into application-private storage.
///
/// Never mutated and never deleted by the bridge; the App reads it from
/// `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedFile {
    /// Absolute path inside the staging directory.
    pub path: PathBuf,
    /// Resolved file name the path ends in.
    pub name: String,
    /// Number of bytes copied.
    pub size: u64,
    /// Lowercase hex SHA-256 of the copied bytes.
    pub sha256: String,
    pub staged_at: DateTime<Utc>,
}

/// Whether the App has registered its consumption channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelReadiness {
    #[default]
    NotReady,
    Ready,
}

/// A call made across the delivery channel, in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            arguments: serde_json::Value::Null,
        }
    }

    pub fn with_arguments(method: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// Answer to a [`MethodCall`] made by the App.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum MethodResponse {
    Success(serde_json::Value),
    NotImplemented,
}
