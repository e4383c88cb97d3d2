// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Relocation into the private staging directory.
//
// Shared sources are often transient (a provider stream, a security-scoped
// URL that stops working once access ends), so the bytes are copied into
// `<cache-root>/<staging-dir>/<name>` before the App ever sees a path. The
// copy is streamed through a SHA-256 hasher so the staged file can be
// fingerprinted in logs without reading it twice.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use handoff_core::{HandoffError, Result, StagedFile};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};

/// Copies validated sources into the staging directory.
#[derive(Debug, Clone)]
pub struct Relocator {
    staging_dir: PathBuf,
}

impl Relocator {
    /// Stage under `<cache_root>/<staging_dir_name>`.
    ///
    /// A relative `cache_root` is resolved against the current directory so
    /// staged paths are always absolute. The directory itself is created
    /// lazily on the first relocation.
    pub fn new(cache_root: impl AsRef<Path>, staging_dir_name: &str) -> Result<Self> {
        let root = std::path::absolute(cache_root.as_ref())?;
        Ok(Self {
            staging_dir: root.join(staging_dir_name),
        })
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Copy `source` to `<staging_dir>/<name>`, replacing any file already
    /// there.
    ///
    /// Fails with `HandoffError::RelocationFailed` on any I/O error. On
    /// failure the destination is left as it was and no partial file remains.
    #[instrument(skip_all, fields(name = %name))]
    pub fn relocate(&self, source: &mut dyn Read, name: &str) -> Result<StagedFile> {
        let dest = self.staging_dir.join(name);
        if !is_single_component(name) {
            return Err(HandoffError::relocation(
                dest,
                io::Error::new(io::ErrorKind::InvalidInput, "name is not a single path component"),
            ));
        }

        fs::create_dir_all(&self.staging_dir)
            .map_err(|e| HandoffError::relocation(&self.staging_dir, e))?;

        // The destination is only touched by the final rename.
        let mut temp = NamedTempFile::new_in(&self.staging_dir)
            .map_err(|e| HandoffError::relocation(&dest, e))?;
        let (size, sha256) = copy_hashed(source, temp.as_file_mut())
            .map_err(|e| HandoffError::relocation(&dest, e))?;
        let replacing = dest.exists();
        temp.persist(&dest)
            .map_err(|e| HandoffError::relocation(&dest, e.error))?;
        if replacing {
            debug!(path = %dest.display(), "replaced previously staged file");
        }

        info!(path = %dest.display(), size, sha256 = %sha256, "backup staged");
        Ok(StagedFile {
            path: dest,
            name: name.to_owned(),
            size,
            sha256,
            staged_at: Utc::now(),
        })
    }
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Stream `source` into `file`, returning the byte count and the hex SHA-256
/// of what was written. The file is synced before returning.
fn copy_hashed(source: &mut dyn Read, file: &mut File) -> io::Result<(u64, String)> {
    let mut writer = HashingWriter::new(BufWriter::new(&mut *file));
    let size = io::copy(source, &mut writer)?;
    let (buffered, digest) = writer.finish();
    buffered.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok((size, digest))
}

/// Writer adapter that hashes everything passing through it.
struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    fn finish(self) -> (W, String) {
        (self.inner, hex::encode(self.hasher.finalize()))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
