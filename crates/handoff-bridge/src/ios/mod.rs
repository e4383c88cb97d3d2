// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// iOS platform bridge via objc2.
//
// Requires compilation with the iOS SDK (Xcode). Files shared through "Open
// in…" reach `application:openURL:options:` as `file://` URLs that usually
// point outside the app sandbox (the sender's Inbox or a File Provider). Such
// URLs are security-scoped: access must be started before reading and
// stopped afterwards, which [`ScopedAccess`] guarantees on every exit path.
//
// ## ABI Safety
//
// Unsafe code in this module is limited to `msg_send!` calls to well-known
// Foundation selectors on `NSURL` and `NSFileManager`. None of them touch
// UIKit, so no main-thread marker is required.

#![cfg(target_os = "ios")]

use std::fs::File;
use std::path::PathBuf;

use objc2::msg_send;
use objc2::rc::Retained;
use objc2_foundation::{NSArray, NSFileManager, NSString, NSURL};

use handoff_core::{Arrival, DeliveryEvent, FileReference, HandoffError, IntakeAction, Result};

use crate::traits::*;

/// `NSCachesDirectory` from `NSSearchPathDirectory`.
const NS_CACHES_DIRECTORY: usize = 13;
/// `NSUserDomainMask` from `NSSearchPathDomainMask`.
const NS_USER_DOMAIN_MASK: usize = 1;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build an `NSURL` for a reference: URL strings as-is, bare paths as file URLs.
fn ns_url(reference: &FileReference) -> Result<Retained<NSURL>> {
    let raw = NSString::from_str(reference.as_str());
    let url = if reference.scheme().is_some() {
        NSURL::URLWithString(&raw)
    } else {
        Some(NSURL::fileURLWithPath(&raw))
    };
    url.ok_or_else(|| HandoffError::UnreadableSource(format!("malformed URL: {reference}")))
}

/// Start security-scoped access to `url`.
///
/// Returns a guard that stops access on drop, or `None` when the URL is not
/// security-scoped (e.g. already inside the sandbox).
fn start_scoped_access(url: &Retained<NSURL>) -> Option<ScopedAccess> {
    // SAFETY: `startAccessingSecurityScopedResource` is a plain BOOL-returning
    // NSURL selector with no preconditions.
    let accessing: bool = unsafe { msg_send![&**url, startAccessingSecurityScopedResource] };
    if !accessing {
        return None;
    }
    let url = url.clone();
    Some(ScopedAccess::new(move || {
        // SAFETY: balanced with the successful start above.
        let _: () = unsafe { msg_send![&*url, stopAccessingSecurityScopedResource] };
        tracing::debug!("iOS: stopped security-scoped access");
    }))
}

fn url_path(url: &NSURL) -> Option<String> {
    // SAFETY: `path` returns a nullable autoreleased NSString.
    let path: Option<Retained<NSString>> = unsafe { msg_send![url, path] };
    path.map(|p| p.to_string())
}

fn last_path_component(url: &NSURL) -> Option<String> {
    // SAFETY: `lastPathComponent` returns a nullable autoreleased NSString.
    let name: Option<Retained<NSString>> = unsafe { msg_send![url, lastPathComponent] };
    name.map(|n| n.to_string()).filter(|n| !n.is_empty() && n != "/")
}

/// Convert the URL passed to `application:openURL:options:` into a reference
/// the intake pipeline accepts.
pub fn reference_from_url(url: &NSURL) -> Option<FileReference> {
    // SAFETY: `absoluteString` returns a nullable autoreleased NSString.
    let text: Option<Retained<NSString>> = unsafe { msg_send![url, absoluteString] };
    text.map(|t| FileReference::new(t.to_string()))
}

/// Build the intake event for a URL handed to the app delegate.
///
/// `Arrival::Cold` when the URL came with the launch options,
/// `Arrival::Warm` from `application:openURL:options:` on a running app.
pub fn event_from_url(url: &NSURL, arrival: Arrival) -> Option<DeliveryEvent> {
    reference_from_url(url).map(|reference| DeliveryEvent::new(reference, arrival, IntakeAction::View))
}

// ---------------------------------------------------------------------------
// Bridge struct
// ---------------------------------------------------------------------------

/// iOS implementation of the platform bridge.
pub struct IosBridge;

impl IosBridge {
    pub fn new() -> Self {
        Self
    }
}

impl Default for IosBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformBridge for IosBridge {
    fn platform_name(&self) -> &str {
        "iOS"
    }
}

impl SourceOpener for IosBridge {
    /// Open a (possibly security-scoped) file URL.
    ///
    /// Access is started before the file is opened and held by the returned
    /// source; if opening fails the guard is dropped here and access stops
    /// immediately.
    fn open_source(&self, reference: &FileReference) -> Result<OpenedSource> {
        let url = ns_url(reference)?;
        tracing::info!(url = %reference, "iOS: opening shared URL");

        let access = start_scoped_access(&url);
        let path = url_path(&url).ok_or_else(|| {
            HandoffError::UnreadableSource(format!("URL has no file path: {reference}"))
        })?;
        let file = File::open(&path)
            .map_err(|e| HandoffError::UnreadableSource(format!("{path}: {e}")))?;

        let mut source = OpenedSource::new(file).with_display_name(last_path_component(&url));
        if let Some(access) = access {
            source = source.with_scoped_access(access);
        }
        Ok(source)
    }
}

impl CacheLocator for IosBridge {
    /// `NSCachesDirectory` in the user domain.
    fn cache_root(&self) -> Result<PathBuf> {
        let manager = NSFileManager::defaultManager();
        // SAFETY: `URLsForDirectory:inDomains:` takes two NSUInteger enums and
        // returns a non-null NSArray<NSURL>.
        let urls: Retained<NSArray<NSURL>> = unsafe {
            msg_send![
                &*manager,
                URLsForDirectory: NS_CACHES_DIRECTORY,
                inDomains: NS_USER_DOMAIN_MASK
            ]
        };
        let first = urls
            .firstObject()
            .ok_or_else(|| HandoffError::Bridge("no caches directory in user domain".into()))?;
        url_path(&first)
            .map(PathBuf::from)
            .ok_or_else(|| HandoffError::Bridge("caches directory URL has no path".into()))
    }
}
