// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Hand-off intake — takes a file reference the OS delivered, resolves and
// validates it, stages a private copy, and hands the staged path to the App
// either on its first poll (cold start) or as a push (warm start).

pub mod channel;
pub mod delivery;
pub mod intake;
pub mod relocate;
pub mod resolver;
pub mod validate;

pub use channel::DeliveryChannel;
pub use delivery::{DeliveryContext, FileIntentListener, Routing};
pub use intake::{IntakeComponent, IntakeOutcome};
pub use relocate::Relocator;
pub use validate::BackupValidator;
