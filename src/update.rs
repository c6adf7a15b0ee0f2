//! The update orchestrator: one call that regenerates everything a client
//! can fetch.
//!
//! Sequence: cache population → compat summary → per-(subset, arch)
//! sub-summaries → summary index → static-delta reindex → signing → atomic
//! install → GC. Every write before install goes to a unique digest-named
//! file, so a failure at any step leaves the previously published state
//! byte-for-byte intact; orphans are swept by the next successful run.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use crate::cache::{self, CommitCache};
use crate::cancel::CancelToken;
use crate::checksum::Checksum;
use crate::config::RepoConfig;
use crate::error::{Phase, Result};
use crate::layout;
use crate::refs::ref_arch;
use crate::sign::Signer;
use crate::store::ObjectStore;
use crate::summary::gc::{GcInputs, collect_garbage};
use crate::summary::index::{GeneratedSummaries, build_index};
use crate::summary::{GeneratorOptions, build_summary};
use crate::variant::Variant;
use crate::fsutil;

/// Flags for one update run.
#[derive(Clone, Debug)]
pub struct UpdateOptions {
    /// Generate only the compat summary: skip sub-summaries, the index,
    /// signing, and GC.
    pub disable_index: bool,
    /// Fixed `last-modified` value instead of the wall clock. Tests use
    /// this to make output bytes fully reproducible.
    pub last_modified: Option<u64>,
    /// fdatasync files before renaming them into place.
    pub fsync: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        UpdateOptions {
            disable_index: false,
            last_modified: None,
            fsync: true,
        }
    }
}

/// What an update produced, mostly of interest to callers that publish or
/// log the result.
#[derive(Clone, Debug, Default)]
pub struct UpdateOutcome {
    /// Digest of the installed index, absent when indexing is disabled.
    pub index_digest: Option<Checksum>,
    /// Sub-summary name → digest generated this run.
    pub subsummaries: BTreeMap<String, Checksum>,
}

/// Regenerate and atomically install the repository's summary files.
///
/// The caller holds the repository's exclusive write lock; concurrent
/// readers are safe at any point because files are only ever replaced by
/// rename.
pub fn update_repo(
    root: &Path,
    store: &dyn ObjectStore,
    config: &RepoConfig,
    signer: Option<&dyn Signer>,
    opts: &UpdateOptions,
    cancel: &CancelToken,
) -> Result<UpdateOutcome> {
    let last_modified = opts.last_modified.unwrap_or_else(now_secs);

    // Refs first: everything else is derived from them.
    let refs = store.list_refs().map_err(|e| e.in_phase(Phase::Cache))?;

    // The prior index is mapped, not read: it can be large and is replaced
    // by rename later, which keeps this map valid until dropped.
    let index_path = root.join(layout::SUMMARY_INDEX_FILE);
    let prior_map = fsutil::map_file(&index_path).map_err(|e| e.in_phase(Phase::Cache))?;
    let prior_digest = prior_map.as_ref().map(|m| Checksum::digest(&m[..]));
    let prior_value = prior_map.as_ref().and_then(|m| match Variant::from_bytes(&m[..]) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "prior summary index unreadable, ignoring");
            None
        }
    });

    let mut commit_cache = CommitCache::new();
    if let Some(index) = &prior_value {
        match cache::populate_from_prior_index(&mut commit_cache, root, index) {
            Ok(()) => {
                info!(entries = commit_cache.len(), "commit cache restored from prior index");
            }
            Err(e) => {
                warn!(error = %e, "fast cache path aborted, falling back to object store");
                commit_cache = CommitCache::new();
            }
        }
    }

    let delta_superblocks =
        resolve_delta_superblocks(store).map_err(|e| e.in_phase(Phase::Generate))?;

    // Slow path for anything the prior index did not cover, collecting the
    // arch and subset universe as we go.
    let mut arches: BTreeSet<String> = BTreeSet::new();
    let mut subsets: BTreeSet<String> = BTreeSet::from([String::new()]);
    for (name, checksum) in &refs {
        cancel.check()?;
        let data = commit_cache
            .ensure(store, checksum)
            .map_err(|e| e.in_phase(Phase::Cache))?;
        subsets.extend(data.subsets.iter().cloned());
        if let Some(arch) = ref_arch(name) {
            arches.insert(arch.to_string());
        }
    }

    // Compat summary, always generated.
    let legacy_bytes = build_summary(
        &refs,
        &commit_cache,
        &delta_superblocks,
        config,
        &GeneratorOptions {
            subset: "",
            arch_filter: config.summary_arches.as_deref(),
            legacy: true,
            last_modified,
        },
        cancel,
    )
    .and_then(|v| v.to_bytes())
    .map_err(|e| e.in_phase(Phase::Generate))?;

    // Modern sub-summaries, one per (subset, arch).
    let mut generated = GeneratedSummaries::default();
    if !opts.disable_index {
        let summaries_dir = layout::summaries_dir(root);
        std::fs::create_dir_all(&summaries_dir)
            .map_err(|e| crate::error::SummaryError::io_path(&summaries_dir, e).in_phase(Phase::Generate))?;
        for subset in &subsets {
            for arch in &arches {
                cancel.check()?;
                let value = build_summary(
                    &refs,
                    &commit_cache,
                    &delta_superblocks,
                    config,
                    &GeneratorOptions {
                        subset: subset.as_str(),
                        arch_filter: Some(std::slice::from_ref(arch)),
                        legacy: false,
                        last_modified,
                    },
                    cancel,
                )
                .map_err(|e| e.in_phase(Phase::Generate))?;
                let bytes = value.to_bytes().map_err(|e| e.in_phase(Phase::Generate))?;
                let digest = Checksum::digest(&bytes);

                let path = layout::subsummary_path(root, &digest);
                let already_present =
                    std::fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);
                if !already_present {
                    let packed =
                        fsutil::gz_compress(&bytes).map_err(|e| e.in_phase(Phase::Generate))?;
                    fsutil::atomic_replace(&path, &packed, opts.fsync)
                        .map_err(|e| e.in_phase(Phase::Generate))?;
                }

                let name = if subset.is_empty() {
                    arch.clone()
                } else {
                    format!("{}-{}", subset, arch)
                };
                generated.insert(name, digest, bytes);
            }
        }
    }

    // Index over everything generated, with per-name delta history.
    let index = if opts.disable_index {
        None
    } else {
        let value = build_index(
            root,
            &generated,
            prior_value.as_ref(),
            config,
            last_modified,
            opts.fsync,
            cancel,
        )
        .map_err(|e| e.in_phase(Phase::Index))?;
        let bytes = value.to_bytes().map_err(|e| e.in_phase(Phase::Index))?;
        Some((value, bytes))
    };

    store
        .reindex_static_deltas()
        .map_err(|e| e.in_phase(Phase::Index))?;

    let index_sig = match (&index, signer) {
        (Some((_, bytes)), Some(signer)) => {
            Some(signer.sign(bytes).map_err(|e| e.in_phase(Phase::Sign))?)
        }
        _ => None,
    };

    // Install. The prior index map must be released first: replacement
    // renames over the file, and some filesystems refuse that while a map
    // is held.
    drop(prior_map);

    let mut outcome = UpdateOutcome {
        index_digest: None,
        subsummaries: generated.by_name.clone(),
    };

    if let Some((_, bytes)) = &index {
        let index_digest = Checksum::digest(bytes);
        fsutil::atomic_replace(&index_path, bytes, opts.fsync)
            .map_err(|e| e.in_phase(Phase::Install))?;
        let compat_sig_path = root.join(layout::SUMMARY_INDEX_SIG_FILE);
        match &index_sig {
            Some(sig) => {
                fsutil::atomic_replace(&layout::index_sig_path(root, &index_digest), sig, opts.fsync)
                    .map_err(|e| e.in_phase(Phase::Install))?;
                // Obsolete duplicate, still written for old clients.
                fsutil::atomic_replace(&compat_sig_path, sig, opts.fsync)
                    .map_err(|e| e.in_phase(Phase::Install))?;
            }
            None => {
                fsutil::remove_if_exists(&compat_sig_path)
                    .map_err(|e| e.in_phase(Phase::Install))?;
            }
        }
        outcome.index_digest = Some(index_digest);
    }

    fsutil::atomic_replace(&root.join(layout::SUMMARY_FILE), &legacy_bytes, opts.fsync)
        .map_err(|e| e.in_phase(Phase::Install))?;
    // The detached summary signature is stale from this instant; the
    // signing provider regenerates it out of band.
    fsutil::remove_if_exists(&root.join(layout::SUMMARY_SIG_FILE))
        .map_err(|e| e.in_phase(Phase::Install))?;

    if let (Some((value, _)), Some(index_digest)) = (&index, &outcome.index_digest) {
        let generated_hexes: BTreeSet<String> = generated.bytes.keys().cloned().collect();
        let removed = collect_garbage(
            root,
            &GcInputs {
                index: value,
                generated: &generated_hexes,
                index_digest,
                prior_index_digest: prior_digest.as_ref(),
            },
            cancel,
        )
        .map_err(|e| e.in_phase(Phase::Gc))?;
        info!(
            subsummaries = generated.by_name.len(),
            collected = removed,
            "summary update installed"
        );
    } else {
        info!("compat summary installed, indexing disabled");
    }

    Ok(outcome)
}

fn resolve_delta_superblocks(store: &dyn ObjectStore) -> Result<BTreeMap<String, Checksum>> {
    let mut superblocks = BTreeMap::new();
    for name in store.static_delta_names()? {
        match store.static_delta_superblock(&name)? {
            Some(bytes) => {
                superblocks.insert(name, Checksum::digest(&bytes));
            }
            None => warn!(delta = %name, "static delta has no superblock, not advertising"),
        }
    }
    Ok(superblocks)
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
#[path = "update_tests.rs"]
mod tests;
