// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Source resolution — opens the OS reference through the platform bridge and
// settles on the name the file will be staged under.

use handoff_bridge::{OpenedSource, SourceOpener};
use handoff_core::{FileReference, Result};

/// An opened source together with its resolved file name.
#[derive(Debug)]
pub struct ResolvedSource {
    pub source: OpenedSource,
    pub name: String,
}

/// Open `reference` and resolve its name.
///
/// Fails with `HandoffError::UnreadableSource` when the bridge cannot open it.
pub fn resolve<O>(opener: &O, reference: &FileReference, fallback: &str) -> Result<ResolvedSource>
where
    O: SourceOpener + ?Sized,
{
    let source = opener.open_source(reference)?;
    let name = resolve_name(source.display_name(), reference, fallback);
    Ok(ResolvedSource { source, name })
}

/// Pick the staging name: the OS display name, then the reference's trailing
/// path segment, then `fallback`.
///
/// Every candidate is cut down to its final path component; candidates that
/// come out empty (or as `.`/`..`) are skipped.
pub fn resolve_name(display_name: Option<&str>, reference: &FileReference, fallback: &str) -> String {
    display_name
        .and_then(final_component)
        .or_else(|| reference.last_path_segment().as_deref().and_then(final_component))
        .unwrap_or_else(|| fallback.to_owned())
}

fn final_component(candidate: &str) -> Option<String> {
    candidate
        .rsplit(|c: char| c == '/' || c == '\\')
        .map(str::trim)
        .find(|part| !part.is_empty())
        .filter(|part| *part != "." && *part != "..")
        .map(str::to_owned)
}
