// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic capability traits for receiving shared files.
//
// The intake pipeline is written once against these traits; each platform
// module supplies the adapter that knows how to turn an OS file reference
// into bytes.

use std::fmt;
use std::io::{self, Read};
use std::path::PathBuf;

use handoff_core::{FileReference, Result};

/// Unified bridge that groups the native capabilities the intake needs.
pub trait PlatformBridge: SourceOpener + CacheLocator {
    /// Human-readable platform name (e.g. "iOS", "Android").
    fn platform_name(&self) -> &str;
}

/// Open an OS file reference for reading.
pub trait SourceOpener {
    /// Open a readable stream for `reference` plus whatever display name the
    /// OS reports for it.
    ///
    /// Fails with `HandoffError::UnreadableSource` when the OS denies access
    /// or the reference cannot be opened.
    fn open_source(&self, reference: &FileReference) -> Result<OpenedSource>;
}

impl<T: SourceOpener + ?Sized> SourceOpener for Box<T> {
    fn open_source(&self, reference: &FileReference) -> Result<OpenedSource> {
        (**self).open_source(reference)
    }
}

/// Locate the application-private cache directory.
pub trait CacheLocator {
    fn cache_root(&self) -> Result<PathBuf>;
}

/// Temporary elevated access to a reference, released when dropped.
///
/// Used for iOS security-scoped URLs. The release runs exactly once on every
/// exit path, including unwinding.
pub struct ScopedAccess {
    release: Option<Box<dyn FnOnce()>>,
}

impl ScopedAccess {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for ScopedAccess {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for ScopedAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedAccess")
            .field("held", &self.release.is_some())
            .finish()
    }
}

/// A readable source produced by a [`SourceOpener`].
///
/// Dropping it closes the stream and then gives up any scoped access.
pub struct OpenedSource {
    // Field order is drop order: the stream closes before access is released.
    reader: Box<dyn Read>,
    display_name: Option<String>,
    access: Option<ScopedAccess>,
}

impl OpenedSource {
    pub fn new(reader: impl Read + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            display_name: None,
            access: None,
        }
    }

    /// Attach the OS-reported display name, if any.
    pub fn with_display_name(mut self, name: Option<String>) -> Self {
        self.display_name = name;
        self
    }

    /// Tie a scoped-access guard to the lifetime of this source.
    pub fn with_scoped_access(mut self, access: ScopedAccess) -> Self {
        self.access = Some(access);
        self
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn holds_scoped_access(&self) -> bool {
        self.access.is_some()
    }
}

impl Read for OpenedSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl fmt::Debug for OpenedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenedSource")
            .field("display_name", &self.display_name)
            .field("access", &self.access)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn scoped_access_releases_once_on_drop() {
        let released = Rc::new(Cell::new(0));
        let counter = Rc::clone(&released);
        let access = ScopedAccess::new(move || counter.set(counter.get() + 1));
        assert_eq!(released.get(), 0);
        drop(access);
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn opened_source_releases_access_when_dropped() {
        let released = Rc::new(Cell::new(false));
        let flag = Rc::clone(&released);
        let mut source = OpenedSource::new(io::Cursor::new(b"payload".to_vec()))
            .with_display_name(Some("a.passbackup".into()))
            .with_scoped_access(ScopedAccess::new(move || flag.set(true)));

        let mut buf = Vec::new();
        source.read_to_end(&mut buf).expect("read");
        assert_eq!(buf, b"payload");
        assert_eq!(source.display_name(), Some("a.passbackup"));
        assert!(source.holds_scoped_access());
        assert!(!released.get());

        drop(source);
        assert!(released.get());
    }
}
