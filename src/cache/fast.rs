//! Fast cache population from the previous summary index.
//!
//! Restores every commit's cache entry from the sub-summaries the last run
//! wrote, bypassing the object store entirely. The path is all-or-nothing:
//! a version mismatch or any structural damage aborts it and the caller
//! falls back to the slow path for the whole run.

use std::path::Path;

use tracing::debug;

use super::{CommitCache, CommitData};
use crate::checksum::Checksum;
use crate::error::{Result, SummaryError};
use crate::keys;
use crate::layout;
use crate::{fsutil, refs};
use crate::variant::Variant;

/// The subset a sub-summary name encodes: `SUBSET-ARCH` or plain `ARCH`.
pub(crate) fn subsummary_subset(name: &str) -> &str {
    match name.split_once('-') {
        Some((subset, _)) => subset,
        None => "",
    }
}

/// Rebuild `cache` from a parsed prior index.
///
/// Any error return means the cache may be partially filled and must be
/// discarded by the caller before taking the slow path.
pub fn populate_from_prior_index(
    cache: &mut CommitCache,
    root: &Path,
    index: &Variant,
) -> Result<()> {
    let elems = index
        .as_tuple()
        .filter(|t| t.len() == 2)
        .ok_or_else(|| SummaryError::invalid("summary index", "not a two-element tuple"))?;
    let subsummaries = elems[0]
        .as_map()
        .ok_or_else(|| SummaryError::invalid("summary index", "sub-summary map missing"))?;
    let meta = &elems[1];

    match meta.lookup(keys::XA_CACHE_VERSION).and_then(Variant::as_u32) {
        Some(version) if version >= keys::CACHE_VERSION => {}
        found => {
            return Err(SummaryError::invalid(
                "summary index",
                format!(
                    "cache version {:?} below expected {}",
                    found,
                    keys::CACHE_VERSION
                ),
            ));
        }
    }

    for (name, entry) in subsummaries {
        let entry = entry
            .as_tuple()
            .filter(|t| t.len() == 3)
            .ok_or_else(|| SummaryError::invalid("summary index", "malformed sub-summary entry"))?;
        let digest = Checksum::from_bytes(entry[0].as_bytes().unwrap_or_default())?;

        let path = layout::subsummary_path(root, &digest);
        let bytes = fsutil::load_gz_file(&path)?.ok_or_else(|| {
            SummaryError::invalid("summary index", format!("sub-summary {} missing", digest))
        })?;
        let summary = Variant::from_bytes(&bytes)
            .map_err(|e| SummaryError::invalid(format!("sub-summary {}", digest), e.to_string()))?;

        harvest_summary(cache, &summary, subsummary_subset(name))?;
        debug!(subsummary = %name, "cache entries restored from index");
    }
    Ok(())
}

/// Pull cache entries out of one parsed sub-summary.
fn harvest_summary(cache: &mut CommitCache, summary: &Variant, subset: &str) -> Result<()> {
    let bad = |reason: String| SummaryError::invalid("sub-summary", reason);
    let elems = summary
        .as_tuple()
        .filter(|t| t.len() == 2)
        .ok_or_else(|| bad("not a two-element tuple".into()))?;
    let ref_map = elems[0]
        .as_map()
        .ok_or_else(|| bad("ref map missing".into()))?;

    for (ref_name, entry) in ref_map {
        if !refs::carries_cache_data(ref_name) {
            continue;
        }
        let elems = entry
            .as_tuple()
            .filter(|t| t.len() == 3)
            .ok_or_else(|| bad(format!("ref '{}' entry malformed", ref_name)))?;
        let commit_size = elems[0]
            .as_u64()
            .ok_or_else(|| bad(format!("ref '{}' commit size malformed", ref_name)))?;
        let digest = elems[1].as_bytes().unwrap_or_default();
        if digest.len() != 32 {
            return Err(bad(format!(
                "ref '{}' digest is {} bytes, expected 32",
                ref_name,
                digest.len()
            )));
        }
        let ref_meta = elems[2]
            .as_map()
            .ok_or_else(|| bad(format!("ref '{}' metadata malformed", ref_name)))?;

        // Without a well-formed xa.data tuple the whole cache is suspect.
        let data = ref_meta
            .get(keys::XA_DATA)
            .and_then(Variant::as_tuple)
            .filter(|t| t.len() == 3)
            .ok_or_else(|| bad(format!("ref '{}' has no usable xa.data", ref_name)))?;
        let (Some(installed_size), Some(download_size), Some(metadata_text)) = (
            data[0].as_u64_be(),
            data[1].as_u64_be(),
            data[2].as_str(),
        ) else {
            return Err(bad(format!("ref '{}' xa.data fields malformed", ref_name)));
        };

        let commit_timestamp = ref_meta
            .get(keys::OSTREE_COMMIT_TIMESTAMP2)
            .and_then(Variant::as_u64_be)
            .unwrap_or(0);

        let mut sparse = std::collections::BTreeMap::new();
        for (key, value) in ref_meta {
            if key == keys::XA_DATA {
                continue;
            }
            if keys::RESERVED_KEY_PREFIXES
                .iter()
                .any(|prefix| key.starts_with(prefix))
            {
                continue;
            }
            sparse.insert(key.clone(), value.clone());
        }

        let commit_hex = hex::encode(digest);
        cache.insert_if_absent(
            commit_hex.clone(),
            CommitData {
                installed_size,
                download_size,
                metadata_text: metadata_text.to_string(),
                commit_size,
                commit_timestamp,
                subsets: Default::default(),
                sparse,
            },
        );
        cache.add_subset(&commit_hex, subset);
    }
    Ok(())
}
