// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Intake component — runs one OS delivery through resolve, validate,
// relocate and route.
//
// Failures never leave this component: an unreadable source, a rejected
// name or a failed copy all end the run with nothing delivered, which the
// App cannot tell apart from nothing having been shared at all.

use std::path::Path;

use handoff_bridge::{CacheLocator, PlatformBridge, SourceOpener};
use handoff_core::{
    Arrival, ChannelReadiness, DeliveryEvent, FileReference, HandoffConfig, IntakeAction, Result,
    StagedFile,
};
use tracing::{debug, error, info, instrument, warn};

use crate::channel::DeliveryChannel;
use crate::delivery::{DeliveryContext, Routing};
use crate::relocate::Relocator;
use crate::resolver::{self, ResolvedSource};
use crate::validate::BackupValidator;

/// How one delivery ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// Staged and held for the App's poll.
    Buffered(StagedFile),
    /// Staged and pushed to the listening App.
    Pushed(StagedFile),
    /// The OS reference could not be opened.
    Unreadable,
    /// The resolved name lacks the backup extension.
    Rejected { name: String },
    /// Copying into the staging directory failed.
    RelocationFailed,
}

impl IntakeOutcome {
    /// The staged file, for outcomes that produced one.
    pub fn staged(&self) -> Option<&StagedFile> {
        match self {
            Self::Buffered(staged) | Self::Pushed(staged) => Some(staged),
            _ => None,
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.staged().is_some()
    }
}

/// Receives delivery events and owns the delivery state.
pub struct IntakeComponent<O> {
    opener: O,
    validator: BackupValidator,
    relocator: Relocator,
    context: DeliveryContext,
    channel_name: String,
    fallback_name: String,
}

impl<O: SourceOpener> IntakeComponent<O> {
    /// Build an intake that stages under `<cache_root>/<staging_dir_name>`.
    pub fn new(opener: O, cache_root: impl AsRef<Path>, config: &HandoffConfig) -> Result<Self> {
        config.validate()?;
        let relocator = Relocator::new(cache_root, &config.staging_dir_name)?;
        info!(
            staging_dir = %relocator.staging_dir().display(),
            extension = %config.backup_extension,
            "intake component ready"
        );
        Ok(Self {
            opener,
            validator: BackupValidator::new(config.backup_extension.clone()),
            relocator,
            context: DeliveryContext::new(),
            channel_name: config.channel_name.clone(),
            fallback_name: config.fallback_name.clone(),
        })
    }

    /// The App-facing channel, sharing this component's delivery state.
    pub fn channel(&self) -> DeliveryChannel {
        DeliveryChannel::new(self.channel_name.clone(), self.context.clone())
    }

    pub fn staging_dir(&self) -> &Path {
        self.relocator.staging_dir()
    }

    pub fn readiness(&self) -> ChannelReadiness {
        self.context.readiness()
    }

    /// Entry point for host glue that only knows the reference and the OS
    /// action. The arrival is taken from the channel's current readiness.
    pub fn receive(&self, reference: FileReference, action: IntakeAction) -> IntakeOutcome {
        let arrival = match self.context.readiness() {
            ChannelReadiness::NotReady => Arrival::Cold,
            ChannelReadiness::Ready => Arrival::Warm,
        };
        self.process(&DeliveryEvent::new(reference, arrival, action))
    }

    /// Run one delivery to completion.
    #[instrument(skip_all, fields(delivery = %event.id, arrival = ?event.arrival, action = ?event.action))]
    pub fn process(&self, event: &DeliveryEvent) -> IntakeOutcome {
        let ResolvedSource { mut source, name } =
            match resolver::resolve(&self.opener, &event.reference, &self.fallback_name) {
                Ok(resolved) => resolved,
                Err(e) => {
                    warn!(reference = %event.reference, error = %e, "shared file could not be opened");
                    return IntakeOutcome::Unreadable;
                }
            };

        if let Err(e) = self.validator.check(&name) {
            // Dropping `source` closes the stream and ends any scoped access.
            debug!(error = %e, "ignoring shared file");
            return IntakeOutcome::Rejected { name };
        }

        let relocated = self.relocator.relocate(&mut source, &name);
        drop(source);
        let staged = match relocated {
            Ok(staged) => staged,
            Err(e) => {
                error!(error = %e, "failed to stage shared backup");
                return IntakeOutcome::RelocationFailed;
            }
        };

        let expected = match event.arrival {
            Arrival::Cold => ChannelReadiness::NotReady,
            Arrival::Warm => ChannelReadiness::Ready,
        };
        let readiness = self.context.readiness();
        if readiness != expected {
            debug!(?readiness, "arrival flag disagrees with channel readiness; routing by readiness");
        }

        debug!(
            latency_ms = (staged.staged_at - event.received_at).num_milliseconds(),
            "delivery staged"
        );

        match self.context.deliver(&staged.path) {
            Routing::Buffered { .. } => IntakeOutcome::Buffered(staged),
            Routing::Pushed => IntakeOutcome::Pushed(staged),
        }
    }
}

impl IntakeComponent<Box<dyn PlatformBridge>> {
    /// Build an intake over the given platform bridge. The config's
    /// `cache_root` wins over the platform cache directory.
    pub fn for_platform(bridge: Box<dyn PlatformBridge>, config: &HandoffConfig) -> Result<Self> {
        let cache_root = match &config.cache_root {
            Some(root) => root.clone(),
            None => bridge.cache_root()?,
        };
        info!(platform = bridge.platform_name(), "creating intake component");
        Self::new(bridge, cache_root, config)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::io::{self, Cursor, Read};
    use std::path::PathBuf;
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};

    use handoff_bridge::{OpenedSource, ScopedAccess};
    use handoff_core::{HandoffError, METHOD_GET_INITIAL_FILE_PATH, MethodCall};
    use tempfile::TempDir;

    use super::*;

    /// A shared file as a fake platform reports it.
    #[derive(Clone)]
    struct FakeFile {
        bytes: Vec<u8>,
        display_name: Option<String>,
        fail_midway: bool,
    }

    /// In-memory bridge: known references open, everything else is denied.
    /// Counts how many scoped-access grants are currently outstanding.
    #[derive(Default)]
    struct FakeOpener {
        files: HashMap<String, FakeFile>,
        opened: Cell<usize>,
        held: Rc<Cell<isize>>,
    }

    impl FakeOpener {
        fn with(mut self, reference: &str, bytes: &[u8], display_name: Option<&str>) -> Self {
            self.files.insert(
                reference.to_owned(),
                FakeFile {
                    bytes: bytes.to_vec(),
                    display_name: display_name.map(str::to_owned),
                    fail_midway: false,
                },
            );
            self
        }

        fn with_broken(mut self, reference: &str, display_name: &str) -> Self {
            self.files.insert(
                reference.to_owned(),
                FakeFile {
                    bytes: b"partial".to_vec(),
                    display_name: Some(display_name.to_owned()),
                    fail_midway: true,
                },
            );
            self
        }
    }

    struct BrokenStream(Cursor<Vec<u8>>);

    impl Read for BrokenStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.read(buf)? {
                0 => Err(io::Error::other("stream reset by provider")),
                n => Ok(n),
            }
        }
    }

    impl SourceOpener for FakeOpener {
        fn open_source(&self, reference: &FileReference) -> Result<OpenedSource> {
            let file = self.files.get(reference.as_str()).cloned().ok_or_else(|| {
                HandoffError::UnreadableSource(format!("permission denied: {reference}"))
            })?;
            self.opened.set(self.opened.get() + 1);

            let held = Rc::clone(&self.held);
            held.set(held.get() + 1);
            let access = ScopedAccess::new(move || held.set(held.get() - 1));

            let cursor = Cursor::new(file.bytes);
            let source = if file.fail_midway {
                OpenedSource::new(BrokenStream(cursor))
            } else {
                OpenedSource::new(cursor)
            };
            Ok(source
                .with_display_name(file.display_name)
                .with_scoped_access(access))
        }
    }

    fn intake(opener: FakeOpener) -> (TempDir, IntakeComponent<FakeOpener>) {
        let cache = tempfile::tempdir().expect("tempdir");
        let intake =
            IntakeComponent::new(opener, cache.path(), &HandoffConfig::default()).expect("intake");
        (cache, intake)
    }

    fn recorder(intake: &IntakeComponent<FakeOpener>) -> Arc<Mutex<Vec<PathBuf>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        intake.channel().register(move |path: &Path| {
            sink.lock().expect("sink lock").push(path.to_path_buf());
        });
        seen
    }

    fn staging_entries(intake: &IntakeComponent<FakeOpener>) -> usize {
        std::fs::read_dir(intake.staging_dir())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    const WECHAT_1: &str = "content://com.tencent.mm.external.fileprovider/attachment/backup1.passbackup";
    const WECHAT_2: &str = "content://com.tencent.mm.external.fileprovider/attachment/backup2.passbackup";
    const NOTES: &str = "content://com.tencent.mm.external.fileprovider/attachment/notes.txt";

    #[test]
    fn cold_delivery_then_poll_once() {
        let (_cache, intake) = intake(FakeOpener::default().with(WECHAT_1, b"vault-1", None));

        let outcome = intake.process(&DeliveryEvent::cold(WECHAT_1));
        let staged = outcome.staged().cloned().expect("staged");
        assert!(matches!(outcome, IntakeOutcome::Buffered(_)));
        assert_eq!(staged.path, intake.staging_dir().join("backup1.passbackup"));

        let channel = intake.channel();
        channel.register(|_: &Path| {});
        assert_eq!(channel.get_initial_file_path(), Some(staged.path.clone()));
        assert_eq!(channel.get_initial_file_path(), None);
        assert_eq!(std::fs::read(&staged.path).expect("read"), b"vault-1");
    }

    #[test]
    fn warm_delivery_pushes_exactly_once() {
        let (_cache, intake) = intake(FakeOpener::default().with(WECHAT_2, b"vault-2", None));
        let seen = recorder(&intake);

        let outcome = intake.process(&DeliveryEvent::warm(WECHAT_2));

        assert!(matches!(outcome, IntakeOutcome::Pushed(_)));
        let expected = intake.staging_dir().join("backup2.passbackup");
        assert!(expected.ends_with("received_backups/backup2.passbackup"));
        assert_eq!(*seen.lock().expect("seen"), vec![expected]);
        assert_eq!(intake.channel().get_initial_file_path(), None);
    }

    #[test]
    fn wrong_extension_is_dropped_silently() {
        let opener = FakeOpener::default().with(NOTES, b"shopping list", None);
        let held = Rc::clone(&opener.held);
        let (_cache, intake) = intake(opener);
        let seen = recorder(&intake);

        let outcome = intake.process(&DeliveryEvent::warm(NOTES));

        assert_eq!(outcome, IntakeOutcome::Rejected { name: "notes.txt".into() });
        assert!(seen.lock().expect("seen").is_empty());
        assert_eq!(staging_entries(&intake), 0);
        assert_eq!(held.get(), 0, "scoped access must be released on rejection");
    }

    #[test]
    fn rejection_while_not_ready_leaves_state_untouched() {
        let (_cache, intake) = intake(FakeOpener::default().with(NOTES, b"x", None));
        assert!(matches!(intake.process(&DeliveryEvent::cold(NOTES)), IntakeOutcome::Rejected { .. }));
        assert_eq!(intake.readiness(), ChannelReadiness::NotReady);
        assert_eq!(intake.channel().get_initial_file_path(), None);
        assert_eq!(staging_entries(&intake), 0);
    }

    #[test]
    fn display_name_overrides_uri_segment() {
        let reference = "content://com.android.providers.downloads.documents/document/42";
        let (_cache, intake) = intake(
            FakeOpener::default().with(reference, b"v", Some("Family Vault.PASSBACKUP")),
        );
        let outcome = intake.process(&DeliveryEvent::cold(reference));
        assert_eq!(
            outcome.staged().map(|s| s.name.as_str()),
            Some("Family Vault.PASSBACKUP")
        );
    }

    #[test]
    fn display_name_without_extension_is_rejected_even_if_uri_has_one() {
        let (_cache, intake) =
            intake(FakeOpener::default().with(WECHAT_1, b"v", Some("attachment.bin")));
        assert_eq!(
            intake.process(&DeliveryEvent::cold(WECHAT_1)),
            IntakeOutcome::Rejected { name: "attachment.bin".into() }
        );
    }

    #[test]
    fn nameless_reference_uses_fallback_name() {
        let reference = "content://com.example.provider";
        let (_cache, intake) = intake(FakeOpener::default().with(reference, b"v", None));
        let outcome = intake.process(&DeliveryEvent::cold(reference));
        assert_eq!(
            outcome.staged().map(|s| s.name.as_str()),
            Some("received_backup.passbackup")
        );
    }

    #[test]
    fn unreadable_source_delivers_nothing() {
        let (_cache, intake) = intake(FakeOpener::default());
        let seen = recorder(&intake);
        assert_eq!(intake.process(&DeliveryEvent::warm(WECHAT_1)), IntakeOutcome::Unreadable);
        assert!(seen.lock().expect("seen").is_empty());
        assert_eq!(staging_entries(&intake), 0);
    }

    #[test]
    fn relocation_failure_delivers_nothing_and_releases_access() {
        let opener = FakeOpener::default().with_broken(WECHAT_1, "backup1.passbackup");
        let held = Rc::clone(&opener.held);
        let (_cache, intake) = intake(opener);

        assert_eq!(
            intake.process(&DeliveryEvent::cold(WECHAT_1)),
            IntakeOutcome::RelocationFailed
        );
        assert_eq!(intake.channel().get_initial_file_path(), None);
        assert!(!intake.staging_dir().join("backup1.passbackup").exists());
        assert_eq!(held.get(), 0);
    }

    #[test]
    fn second_cold_delivery_wins() {
        let (_cache, intake) = intake(
            FakeOpener::default()
                .with(WECHAT_1, b"one", None)
                .with(WECHAT_2, b"two", None),
        );
        intake.process(&DeliveryEvent::cold(WECHAT_1));
        intake.process(&DeliveryEvent::cold(WECHAT_2));

        let channel = intake.channel();
        assert_eq!(
            channel.get_initial_file_path(),
            Some(intake.staging_dir().join("backup2.passbackup"))
        );
        assert_eq!(channel.get_initial_file_path(), None);
    }

    #[test]
    fn same_name_redelivery_replaces_bytes() {
        let other = "file:///var/mobile/Inbox/backup1.passbackup";
        let (_cache, intake) = intake(
            FakeOpener::default()
                .with(WECHAT_1, b"first payload", None)
                .with(other, b"second", None),
        );
        let first = intake.process(&DeliveryEvent::cold(WECHAT_1));
        let second = intake.process(&DeliveryEvent::cold(other));

        let path = second.staged().expect("staged").path.clone();
        assert_eq!(first.staged().map(|s| &s.path), Some(&path));
        assert_eq!(std::fs::read(&path).expect("read"), b"second");
    }

    #[test]
    fn failed_redelivery_keeps_buffered_file() {
        let good = "content://com.example.provider/attachment/1";
        let broken = "content://com.example.provider/attachment/2";
        let (_cache, intake) = intake(
            FakeOpener::default()
                .with(good, b"first payload", Some("x.passbackup"))
                .with_broken(broken, "x.passbackup"),
        );

        assert!(matches!(intake.process(&DeliveryEvent::cold(good)), IntakeOutcome::Buffered(_)));
        assert_eq!(
            intake.process(&DeliveryEvent::cold(broken)),
            IntakeOutcome::RelocationFailed
        );

        let polled = intake.channel().get_initial_file_path().expect("pending path");
        assert_eq!(std::fs::read(&polled).expect("still on disk"), b"first payload");
        assert_eq!(staging_entries(&intake), 1);
    }

    #[test]
    fn staged_after_received() {
        let (_cache, intake) = intake(FakeOpener::default().with(WECHAT_1, b"v", None));
        let event = DeliveryEvent::cold(WECHAT_1);
        let outcome = intake.process(&event);
        assert!(outcome.staged().expect("staged").staged_at >= event.received_at);
    }

    #[test]
    fn receive_derives_arrival_from_readiness() {
        let (_cache, intake) = intake(
            FakeOpener::default()
                .with(WECHAT_1, b"one", None)
                .with(WECHAT_2, b"two", None),
        );
        let before = intake.receive(FileReference::new(WECHAT_1), IntakeAction::Send);
        assert!(matches!(before, IntakeOutcome::Buffered(_)));

        let seen = recorder(&intake);
        let after = intake.receive(FileReference::new(WECHAT_2), IntakeAction::View);
        assert!(matches!(after, IntakeOutcome::Pushed(_)));
        assert_eq!(seen.lock().expect("seen").len(), 1);
    }

    #[test]
    fn cold_flag_after_registration_is_pushed() {
        let (_cache, intake) = intake(FakeOpener::default().with(WECHAT_1, b"v", None));
        let seen = recorder(&intake);
        let outcome = intake.process(&DeliveryEvent::cold(WECHAT_1));
        assert!(matches!(outcome, IntakeOutcome::Pushed(_)));
        assert_eq!(seen.lock().expect("seen").len(), 1);
    }

    #[test]
    fn method_channel_round_trip() {
        let (_cache, intake) = intake(FakeOpener::default().with(WECHAT_1, b"v", None));
        intake.process(&DeliveryEvent::cold(WECHAT_1));
        let channel = intake.channel();

        let response = channel.handle(&MethodCall::new(METHOD_GET_INITIAL_FILE_PATH));
        let expected = intake.staging_dir().join("backup1.passbackup");
        assert_eq!(
            response,
            handoff_core::MethodResponse::Success(serde_json::Value::String(
                expected.to_string_lossy().into_owned()
            ))
        );
    }

    #[test]
    fn every_source_is_released() {
        let opener = FakeOpener::default()
            .with(WECHAT_1, b"a", None)
            .with(NOTES, b"b", None)
            .with_broken(WECHAT_2, "backup2.passbackup");
        let held = Rc::clone(&opener.held);
        let (_cache, intake) = intake(opener);

        for reference in [WECHAT_1, NOTES, WECHAT_2, "content://unknown/x.passbackup"] {
            intake.process(&DeliveryEvent::warm(reference));
        }
        assert_eq!(intake.opener.opened.get(), 3);
        assert_eq!(held.get(), 0);
    }

    #[test]
    fn invalid_config_is_refused() {
        let cache = tempfile::tempdir().expect("tempdir");
        let config = HandoffConfig {
            backup_extension: String::new(),
            ..HandoffConfig::default()
        };
        let result = IntakeComponent::new(FakeOpener::default(), cache.path(), &config);
        assert!(matches!(result, Err(HandoffError::Config(_))));
    }

    #[test]
    fn nested_fallback_name_is_refused() {
        let cache = tempfile::tempdir().expect("tempdir");
        let config = HandoffConfig {
            fallback_name: "sub/received.passbackup".into(),
            ..HandoffConfig::default()
        };
        let result = IntakeComponent::new(FakeOpener::default(), cache.path(), &config);
        assert!(matches!(result, Err(HandoffError::Config(_))));
    }

    #[test]
    fn outcome_accessors() {
        assert!(!IntakeOutcome::Unreadable.is_delivered());
        assert!(IntakeOutcome::Rejected { name: "x".into() }.staged().is_none());
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn rejection_changes_nothing(
                name in "[A-Za-z0-9_-][A-Za-z0-9 _-]{0,15}\\.(txt|zip|pdf|passbackupx|bak)",
                register_first in any::<bool>(),
            ) {
                let reference = "content://com.example.provider/attachment/7";
                let opener = FakeOpener::default().with(reference, b"payload", Some(name.as_str()));
                let held = Rc::clone(&opener.held);
                let (_cache, intake) = intake(opener);
                let seen = register_first.then(|| recorder(&intake));

                let outcome = intake.process(&DeliveryEvent::cold(reference));

                prop_assert_eq!(outcome, IntakeOutcome::Rejected { name });
                prop_assert_eq!(intake.context.pending(), None);
                prop_assert_eq!(intake.context.is_ready(), register_first);
                prop_assert_eq!(staging_entries(&intake), 0);
                prop_assert_eq!(held.get(), 0);
                if let Some(seen) = seen {
                    prop_assert!(seen.lock().expect("seen").is_empty());
                }
            }
        }
    }
}
