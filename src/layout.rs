//! On-disk layout of summary files inside the repository root.
//!
//! Legacy files live at the root (`summary`, `summary.idx`, their
//! signatures); digested sub-summaries, summary diffs, and per-index
//! detached signatures live under `summaries/`.

use std::path::{Path, PathBuf};

use crate::checksum::Checksum;

pub const SUMMARY_FILE: &str = "summary";
pub const SUMMARY_SIG_FILE: &str = "summary.sig";
pub const SUMMARY_INDEX_FILE: &str = "summary.idx";
pub const SUMMARY_INDEX_SIG_FILE: &str = "summary.idx.sig";
pub const SUMMARIES_DIR: &str = "summaries";

pub fn summaries_dir(root: &Path) -> PathBuf {
    root.join(SUMMARIES_DIR)
}

/// `summaries/{digest}.gz` — gzipped sub-summary named by the digest of its
/// uncompressed bytes.
pub fn subsummary_path(root: &Path, digest: &Checksum) -> PathBuf {
    summaries_dir(root).join(format!("{}.gz", digest.to_hex()))
}

/// `summaries/{from}-{to}.delta` — diff turning sub-summary `from` into `to`.
pub fn summary_delta_path(root: &Path, from: &Checksum, to: &Checksum) -> PathBuf {
    summaries_dir(root).join(format!("{}-{}.delta", from.to_hex(), to.to_hex()))
}

/// `summaries/{digest}.idx.sig` — detached signature for one index digest.
pub fn index_sig_path(root: &Path, digest: &Checksum) -> PathBuf {
    summaries_dir(root).join(format!("{}.idx.sig", digest.to_hex()))
}
