// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Delivery channel — the named, two-operation surface the App talks to.
//
// Inbound, the App calls `getInitialFilePath` to collect a path that arrived
// before it was listening. Outbound, `onNewFileIntent` is pushed to the
// registered listener for every path staged afterwards. Any other method
// name is answered with `NotImplemented`.

use std::path::PathBuf;
use std::sync::Arc;

use handoff_core::{
    HandoffError, METHOD_GET_INITIAL_FILE_PATH, MethodCall, MethodResponse, Result,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::delivery::{DeliveryContext, FileIntentListener};

/// App-facing adapter over a shared [`DeliveryContext`].
#[derive(Debug, Clone)]
pub struct DeliveryChannel {
    name: String,
    context: DeliveryContext,
}

impl DeliveryChannel {
    pub fn new(name: impl Into<String>, context: DeliveryContext) -> Self {
        Self {
            name: name.into(),
            context,
        }
    }

    /// Symbolic channel name shared with the App.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wire up the App's listener. This is the event that makes the channel
    /// ready; returns `false` if it was already registered.
    pub fn register(&self, listener: impl FileIntentListener + 'static) -> bool {
        self.context.register(Arc::new(listener))
    }

    pub fn is_ready(&self) -> bool {
        self.context.is_ready()
    }

    /// `getInitialFilePath`: the buffered path, cleared as it is read.
    /// A second call without an intervening delivery returns `None`.
    pub fn get_initial_file_path(&self) -> Option<PathBuf> {
        let path = self.context.take_pending();
        debug!(channel = %self.name, found = path.is_some(), "initial file path polled");
        path
    }

    /// Dispatch a call by method name.
    pub fn invoke(&self, call: &MethodCall) -> Result<Value> {
        match call.method.as_str() {
            METHOD_GET_INITIAL_FILE_PATH => Ok(self
                .get_initial_file_path()
                .map(|p| Value::String(p.to_string_lossy().into_owned()))
                .unwrap_or(Value::Null)),
            other => Err(HandoffError::NotImplemented(other.to_owned())),
        }
    }

    /// [`invoke`](Self::invoke) folded into the wire response the App sees.
    pub fn handle(&self, call: &MethodCall) -> MethodResponse {
        match self.invoke(call) {
            Ok(value) => MethodResponse::Success(value),
            Err(e) => {
                warn!(channel = %self.name, error = %e, "unsupported channel call");
                MethodResponse::NotImplemented
            }
        }
    }
}
