//! Summary index generation.
//!
//! The index aggregates the digests of every sub-summary generated this run
//! and, per sub-summary, a bounded history of predecessor digests. For each
//! predecessor a diff file `summaries/{pred}-{current}.delta` is (re)written
//! so clients on any recent revision can patch forward instead of
//! re-downloading.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use super::diff;
use crate::cancel::CancelToken;
use crate::checksum::Checksum;
use crate::config::RepoConfig;
use crate::error::{Result, SummaryError};
use crate::variant::Variant;
use crate::{fsutil, layout};

/// Sub-summaries produced by one run: name → digest, digest → serialized
/// bytes. Distinct names may share a digest (identical filtered views).
#[derive(Debug, Default)]
pub struct GeneratedSummaries {
    pub by_name: BTreeMap<String, Checksum>,
    pub bytes: BTreeMap<String, Vec<u8>>,
}

impl GeneratedSummaries {
    pub fn insert(&mut self, name: String, digest: Checksum, bytes: Vec<u8>) {
        self.by_name.insert(name, digest);
        self.bytes.insert(digest.to_hex(), bytes);
    }
}

/// One parsed entry of a summary index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub current: Checksum,
    pub history: Vec<Checksum>,
}

/// Parse the sub-summary map out of a framed index value.
pub fn parse_index_entries(index: &Variant) -> Result<BTreeMap<String, IndexEntry>> {
    let bad = |reason: &str| SummaryError::invalid("summary index", reason.to_string());
    let elems = index
        .as_tuple()
        .filter(|t| t.len() == 2)
        .ok_or_else(|| bad("not a two-element tuple"))?;
    let map = elems[0].as_map().ok_or_else(|| bad("sub-summary map missing"))?;

    let mut entries = BTreeMap::new();
    for (name, value) in map {
        let elems = value
            .as_tuple()
            .filter(|t| t.len() == 3)
            .ok_or_else(|| bad("malformed sub-summary entry"))?;
        let current = Checksum::from_bytes(elems[0].as_bytes().unwrap_or_default())?;
        let history = elems[1]
            .as_array()
            .ok_or_else(|| bad("malformed history array"))?
            .iter()
            .map(|v| Checksum::from_bytes(v.as_bytes().unwrap_or_default()))
            .collect::<Result<Vec<_>>>()?;
        entries.insert(name.clone(), IndexEntry { current, history });
    }
    Ok(entries)
}

/// Build the new index value and write the delta files backing its history.
///
/// For every sub-summary whose digest changed, the prior digest and then the
/// prior history chain become the new history, each with a freshly written
/// diff to the current digest, until the configured bound is reached.
/// Predecessor files already collected by an earlier GC are skipped without
/// aborting.
pub fn build_index(
    root: &Path,
    generated: &GeneratedSummaries,
    prior: Option<&Variant>,
    config: &RepoConfig,
    last_modified: u64,
    fsync: bool,
    cancel: &CancelToken,
) -> Result<Variant> {
    let prior_entries = match prior {
        Some(index) => parse_index_entries(index)?,
        None => BTreeMap::new(),
    };
    let max_history = config.history_length();

    let mut sub_map = Variant::map();
    for (name, digest) in &generated.by_name {
        cancel.check()?;
        let history = match prior_entries.get(name) {
            None => Vec::new(),
            Some(prior_entry) if prior_entry.current == *digest => {
                // Unchanged view: carry the history forward. Its delta
                // files still target a digest generated this run, so GC
                // keeps them alive.
                prior_entry.history.iter().take(max_history).copied().collect()
            }
            Some(prior_entry) => {
                let new_bytes = &generated.bytes[&digest.to_hex()];
                let mut history = Vec::new();
                let chain = std::iter::once(&prior_entry.current).chain(&prior_entry.history);
                for pred in chain {
                    if history.len() >= max_history {
                        break;
                    }
                    let pred_path = layout::subsummary_path(root, pred);
                    let Some(old_bytes) = fsutil::load_gz_file(&pred_path)? else {
                        debug!(subsummary = %name, pred = %pred, "predecessor collected, skipping history entry");
                        continue;
                    };
                    let patch = diff::generate(&old_bytes, new_bytes)?;
                    fsutil::atomic_replace(
                        &layout::summary_delta_path(root, pred, digest),
                        &patch,
                        fsync,
                    )?;
                    history.push(*pred);
                }
                history
            }
        };

        let history_value = Variant::Array(
            history
                .iter()
                .map(|c| Variant::Bytes(c.as_bytes().to_vec()))
                .collect(),
        );
        sub_map.insert(
            name.clone(),
            Variant::tuple(vec![
                Variant::Bytes(digest.as_bytes().to_vec()),
                history_value,
                Variant::Map(Variant::map()),
            ]),
        );
    }

    let metadata = super::repo_metadata(config, last_modified);

    Ok(Variant::tuple(vec![
        Variant::Map(sub_map),
        Variant::Map(metadata),
    ]))
}
