// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Hand-off bridge — native platform adapters.
//!
//! This crate defines the capability traits the intake pipeline is written
//! against and one adapter per target OS: Android (ContentResolver over JNI),
//! iOS (security-scoped `NSURL` via objc2) and a filesystem adapter for
//! desktop and CI builds.
//!
//! Host glue turns what the OS hands over into a `DeliveryEvent` with
//! `android::event_from_intent` or `ios::event_from_url` and passes it to the
//! intake component. Glue that cannot tell cold from warm calls
//! `IntakeComponent::receive` with the bare reference instead.

pub mod traits;

#[cfg(target_os = "ios")]
pub mod ios;

#[cfg(target_os = "android")]
pub mod android;

#[cfg(not(any(target_os = "ios", target_os = "android")))]
pub mod desktop;

pub use traits::{CacheLocator, OpenedSource, PlatformBridge, ScopedAccess, SourceOpener};

/// Retrieves the bridge implementation for the target operating system.
pub fn platform_bridge() -> Box<dyn PlatformBridge> {
    #[cfg(target_os = "ios")]
    {
        Box::new(ios::IosBridge::new())
    }
    #[cfg(target_os = "android")]
    {
        Box::new(android::AndroidBridge::new())
    }
    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    {
        Box::new(desktop::DesktopBridge::new())
    }
}
