//! Garbage collection of the `summaries/` directory.
//!
//! Runs after all new writes have landed, so a crash mid-collection leaves
//! a valid (merely over-full) repository. Keep rules:
//!
//! - `{digest}.gz`: referenced by the current index, as a current digest or
//!   a history entry.
//! - `{from}-{to}.delta`: `to` was generated this run. Diffs onto strictly
//!   historical targets serve no future client.
//! - `{digest}.idx.sig`: signature of the current or the immediately
//!   previous index (clients may still be fetching the prior one).
//! - anything else: kept, with a warning.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::{debug, warn};

use super::index::parse_index_entries;
use crate::cancel::CancelToken;
use crate::checksum::{Checksum, is_hex_digest};
use crate::error::{Result, SummaryError};
use crate::layout;
use crate::variant::Variant;

pub struct GcInputs<'a> {
    /// The freshly installed index.
    pub index: &'a Variant,
    /// Digest hexes of sub-summaries generated (or regenerated) this run.
    pub generated: &'a BTreeSet<String>,
    pub index_digest: &'a Checksum,
    /// Digest of the index this run replaced, if any.
    pub prior_index_digest: Option<&'a Checksum>,
}

/// Delete stale files under `summaries/`. Returns the number removed.
pub fn collect_garbage(root: &Path, inputs: &GcInputs<'_>, cancel: &CancelToken) -> Result<usize> {
    let dir = layout::summaries_dir(root);
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(SummaryError::io_path(&dir, e)),
    };

    let mut referenced: BTreeSet<String> = BTreeSet::new();
    for entry in parse_index_entries(inputs.index)?.values() {
        referenced.insert(entry.current.to_hex());
        for pred in &entry.history {
            referenced.insert(pred.to_hex());
        }
    }
    let index_hex = inputs.index_digest.to_hex();
    let prior_index_hex = inputs.prior_index_digest.map(Checksum::to_hex);

    let mut removed = 0;
    for entry in entries {
        cancel.check()?;
        let entry = entry.map_err(|e| SummaryError::io_path(&dir, e))?;
        let path = entry.path();
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            warn!(path = %path.display(), "unrecognized file in summaries dir, keeping");
            continue;
        };

        let keep = if let Some(stem) = name.strip_suffix(".gz") {
            if !is_hex_digest(stem) {
                None
            } else {
                Some(referenced.contains(stem))
            }
        } else if let Some(stem) = name.strip_suffix(".delta") {
            match stem.split_once('-') {
                Some((from, to)) if is_hex_digest(from) && is_hex_digest(to) => {
                    Some(inputs.generated.contains(to))
                }
                _ => None,
            }
        } else if let Some(stem) = name.strip_suffix(".idx.sig") {
            if !is_hex_digest(stem) {
                None
            } else {
                Some(stem == index_hex || prior_index_hex.as_deref() == Some(stem))
            }
        } else {
            None
        };

        match keep {
            Some(true) => {}
            Some(false) => {
                std::fs::remove_file(&path).map_err(|e| SummaryError::io_path(&path, e))?;
                debug!(file = %name, "collected stale summary file");
                removed += 1;
            }
            None => warn!(file = %name, "unrecognized file in summaries dir, keeping"),
        }
    }
    Ok(removed)
}
