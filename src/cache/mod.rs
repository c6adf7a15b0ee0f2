//! Per-commit metadata cache.
//!
//! Maps commit digest → sizes, metadata text, timestamp, and sparse fields.
//! Identical commits referenced by multiple refs share one entry; subsets
//! are additive across the refs that point at the same commit.
//!
//! Population is two-path: [`fast::populate_from_prior_index`] rebuilds the
//! cache from the previous summary index without touching the object store;
//! [`compute_commit_data`] is the slow path that loads the commit and walks
//! its tree.

mod fast;

use std::collections::{BTreeMap, BTreeSet};

pub use fast::populate_from_prior_index;

use crate::checksum::Checksum;
use crate::error::{Result, SummaryError};
use crate::keys;
use crate::store::{ObjectStore, Tree};
use crate::variant::Variant;

/// Cached metadata for one commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitData {
    pub installed_size: u64,
    pub download_size: u64,
    /// Content of the commit's `/metadata` file (or the `xa.metadata`
    /// override), empty when neither exists.
    pub metadata_text: String,
    /// On-disk encoded size of the commit object.
    pub commit_size: u64,
    pub commit_timestamp: u64,
    /// Subset tags this commit belongs to. Order-insensitive.
    pub subsets: BTreeSet<String>,
    /// Optional out-of-band fields (`eol`, `eolr`, `tt`, `eds`, …).
    pub sparse: BTreeMap<String, Variant>,
}

/// The cache table for one update run, keyed by commit digest hex.
#[derive(Debug, Default)]
pub struct CommitCache {
    entries: BTreeMap<String, CommitData>,
}

impl CommitCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, commit_hex: &str) -> Option<&CommitData> {
        self.entries.get(commit_hex)
    }

    pub fn contains(&self, commit_hex: &str) -> bool {
        self.entries.contains_key(commit_hex)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert an entry, keeping an existing one (first writer wins: entries
    /// restored from the index or an earlier ref are authoritative).
    pub fn insert_if_absent(&mut self, commit_hex: String, data: CommitData) {
        self.entries.entry(commit_hex).or_insert(data);
    }

    /// Tag the commit's entry with a subset, if the entry exists.
    pub fn add_subset(&mut self, commit_hex: &str, subset: &str) {
        if let Some(entry) = self.entries.get_mut(commit_hex) {
            if !subset.is_empty() {
                entry.subsets.insert(subset.to_string());
            }
        }
    }

    /// Union of all subset tags across cached commits.
    pub fn all_subsets(&self) -> BTreeSet<String> {
        self.entries
            .values()
            .flat_map(|e| e.subsets.iter().cloned())
            .collect()
    }

    /// Look up the entry for `checksum`, computing it through the object
    /// store when missing.
    pub fn ensure(&mut self, store: &dyn ObjectStore, checksum: &Checksum) -> Result<&CommitData> {
        let hex = checksum.to_hex();
        if !self.entries.contains_key(&hex) {
            let data = compute_commit_data(store, checksum)?;
            self.entries.insert(hex.clone(), data);
        }
        Ok(&self.entries[&hex])
    }
}

// ─── Slow path ──────────────────────────────────────────────────────

/// Pad a file size up to the next 512-byte boundary, the unit installed
/// sizes are accounted in.
fn align512(size: u64) -> u64 {
    size.div_ceil(512) * 512
}

/// Read a u64 commit-metadata value; these are big-endian on the wire but
/// tolerated in native framing too.
fn metadata_u64(meta: &Variant, key: &str) -> Option<u64> {
    let v = meta.lookup(key)?;
    v.as_u64_be().or_else(|| v.as_u64())
}

/// Compute a commit's cache entry from the object store.
pub fn compute_commit_data(store: &dyn ObjectStore, checksum: &Checksum) -> Result<CommitData> {
    let commit = store.load_commit(checksum)?;
    let meta = &commit.metadata;

    let known_installed = metadata_u64(meta, keys::COMMIT_XA_INSTALLED_SIZE);
    let known_download = metadata_u64(meta, keys::COMMIT_XA_DOWNLOAD_SIZE);
    let known_metadata = meta
        .lookup(keys::COMMIT_XA_METADATA)
        .and_then(|v| v.as_str().map(str::to_string));

    let need_walk =
        known_installed.is_none() || known_download.is_none() || known_metadata.is_none();
    let root = if need_walk {
        Some(store.load_tree(&commit.root_tree)?)
    } else {
        None
    };

    let (installed_size, download_size) = match (known_installed, known_download) {
        (Some(i), Some(d)) => (i, d),
        _ => {
            let mut installed = 0u64;
            let mut download = 0u64;
            walk_sizes(store, root.as_ref().unwrap(), &mut installed, &mut download)?;
            (
                known_installed.unwrap_or(installed),
                known_download.unwrap_or(download),
            )
        }
    };

    let metadata_text = match known_metadata {
        Some(text) => text,
        None => read_metadata_file(store, root.as_ref().unwrap())?,
    };

    let subsets: BTreeSet<String> = meta
        .lookup(keys::COMMIT_XA_SUBSETS)
        .and_then(Variant::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let mut sparse = BTreeMap::new();
    if let Some(eol) = meta.lookup(keys::COMMIT_OSTREE_ENDOFLIFE).and_then(Variant::as_str) {
        sparse.insert(keys::SPARSE_EOL.to_string(), Variant::string(eol));
    }
    if let Some(eolr) = meta
        .lookup(keys::COMMIT_OSTREE_ENDOFLIFE_REBASE)
        .and_then(Variant::as_str)
    {
        sparse.insert(keys::SPARSE_EOL_REBASE.to_string(), Variant::string(eolr));
    }
    if let Some(tt) = meta.lookup(keys::COMMIT_XA_TOKEN_TYPE).and_then(Variant::as_i32) {
        sparse.insert(keys::SPARSE_TOKEN_TYPE.to_string(), Variant::I32(tt));
    }

    let mut download_size = download_size;
    if let Some(sources) = meta.lookup(keys::COMMIT_XA_EXTRA_DATA_SOURCES) {
        let (count, extra_bytes) = sum_extra_data(checksum, sources)?;
        if count > 0 {
            download_size += extra_bytes;
            sparse.insert(
                keys::SPARSE_EXTRA_DATA_SIZE.to_string(),
                Variant::tuple(vec![Variant::U32(count), Variant::U64(extra_bytes)]),
            );
        }
    }

    Ok(CommitData {
        installed_size,
        download_size,
        metadata_text,
        commit_size: commit.object_size,
        commit_timestamp: commit.timestamp,
        subsets,
        sparse,
    })
}

fn walk_sizes(
    store: &dyn ObjectStore,
    tree: &Tree,
    installed: &mut u64,
    download: &mut u64,
) -> Result<()> {
    for file in &tree.files {
        *installed += align512(file.size);
        *download += file.storage_size;
    }
    for dir in &tree.subdirs {
        let sub = store.load_tree(&dir.tree)?;
        walk_sizes(store, &sub, installed, download)?;
    }
    Ok(())
}

fn read_metadata_file(store: &dyn ObjectStore, root: &Tree) -> Result<String> {
    let Some(file) = root.files.iter().find(|f| f.name == "metadata") else {
        return Ok(String::new());
    };
    let bytes = store.load_file(&file.object)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Validate the extra-data source array and total its download sizes.
/// Each source is `(name, download_size BE, installed_size BE, sha256, uri)`.
fn sum_extra_data(commit: &Checksum, sources: &Variant) -> Result<(u32, u64)> {
    let bad = |reason: &str| {
        SummaryError::invalid(
            format!("extra-data sources of commit {}", commit),
            reason.to_string(),
        )
    };
    let arr = sources.as_array().ok_or_else(|| bad("not an array"))?;
    let mut total = 0u64;
    for source in arr {
        let elems = source.as_tuple().ok_or_else(|| bad("source is not a tuple"))?;
        if elems.len() != 5 {
            return Err(bad("source tuple arity is not 5"));
        }
        elems[0].as_str().ok_or_else(|| bad("name is not a string"))?;
        let download = elems[1]
            .as_u64_be()
            .ok_or_else(|| bad("download size is not a big-endian u64"))?;
        elems[2]
            .as_u64_be()
            .ok_or_else(|| bad("installed size is not a big-endian u64"))?;
        match elems[3].as_bytes() {
            Some(sha) if sha.len() == 32 => {}
            _ => return Err(bad("checksum is not 32 bytes")),
        }
        elems[4].as_str().ok_or_else(|| bad("uri is not a string"))?;
        total = total
            .checked_add(download)
            .ok_or_else(|| bad("download sizes overflow"))?;
    }
    let count = u32::try_from(arr.len()).map_err(|_| bad("too many sources"))?;
    Ok((count, total))
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
