//! Summary generation: the framed ref list a repository publishes.
//!
//! One generator covers both output shapes. The legacy shape embeds the
//! whole per-commit cache in two repo-level metadata keys (`xa.cache`,
//! `xa.sparse-cache`); the modern shape inlines each commit's data into its
//! ref entry and is emitted per (subset, arch) pair as a sub-summary.

pub mod diff;
pub mod gc;
pub mod index;

use std::collections::{BTreeMap, BTreeSet};

use crate::cache::CommitCache;
use crate::cancel::CancelToken;
use crate::checksum::{Checksum, delta_target};
use crate::config::RepoConfig;
use crate::error::Result;
use crate::keys;
use crate::refs::{RefKind, parse_ref, ref_arch};
use crate::variant::Variant;

/// Inputs that vary per generated summary.
#[derive(Clone, Copy, Debug)]
pub struct GeneratorOptions<'a> {
    /// Subset filter; empty string is the default subset.
    pub subset: &'a str,
    /// Arches to include; `None` means all.
    pub arch_filter: Option<&'a [String]>,
    /// Legacy shape (whole-repo cache in metadata) vs modern (per-ref data).
    pub legacy: bool,
    /// Wall-clock seconds captured once per run; the only non-determinism
    /// allowed into the framed bytes.
    pub last_modified: u64,
}

/// Generate one summary value.
///
/// `delta_superblocks` maps static-delta names to their superblock digests;
/// only deltas whose target commit survives filtering are advertised.
pub fn build_summary(
    refs: &BTreeMap<String, Checksum>,
    cache: &CommitCache,
    delta_superblocks: &BTreeMap<String, Checksum>,
    config: &RepoConfig,
    opts: &GeneratorOptions<'_>,
    cancel: &CancelToken,
) -> Result<Variant> {
    let mut surviving: Vec<(&str, &Checksum)> = Vec::new();
    let mut surviving_commits: BTreeSet<String> = BTreeSet::new();

    for (name, checksum) in refs {
        cancel.check()?;
        if !arch_matches(name, opts.arch_filter) {
            continue;
        }
        if !subset_matches(name, checksum, cache, opts.subset) {
            continue;
        }
        surviving_commits.insert(checksum.to_hex());
        surviving.push((name.as_str(), checksum));
    }

    let mut ref_map = Variant::map();
    for (name, checksum) in &surviving {
        ref_map.insert(
            name.to_string(),
            build_ref_entry(name, checksum, cache, opts),
        );
    }

    let metadata = build_metadata(
        &surviving,
        &surviving_commits,
        cache,
        delta_superblocks,
        config,
        opts,
    );

    Ok(Variant::tuple(vec![
        Variant::Map(ref_map),
        Variant::Map(metadata),
    ]))
}

// ─── Filtering ──────────────────────────────────────────────────────

fn arch_matches(name: &str, filter: Option<&[String]>) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    match ref_arch(name) {
        // Arch-less refs (e.g. ostree-metadata) are never filtered out.
        None => true,
        Some(arch) => filter.iter().any(|a| a == arch),
    }
}

fn subset_matches(name: &str, checksum: &Checksum, cache: &CommitCache, subset: &str) -> bool {
    let kind = parse_ref(name);
    if subset.is_empty() {
        // Default subset: everything except subset-tagged appstream refs.
        !matches!(kind, RefKind::Appstream { subset: s, .. } if !s.is_empty())
    } else {
        match kind {
            // Only the modern appstream shape exists in subset views.
            RefKind::Appstream { v2, subset: s, .. } => v2 && s == subset,
            RefKind::App { .. } | RefKind::Runtime { .. } => cache
                .get(&checksum.to_hex())
                .is_some_and(|entry| entry.subsets.contains(subset)),
            RefKind::Other => false,
        }
    }
}

// ─── Ref entries ────────────────────────────────────────────────────

fn build_ref_entry(
    name: &str,
    checksum: &Checksum,
    cache: &CommitCache,
    opts: &GeneratorOptions<'_>,
) -> Variant {
    let entry = cache.get(&checksum.to_hex());
    let mut meta = Variant::map();

    if let Some(data) = entry {
        let timestamp_key = if opts.legacy {
            keys::OSTREE_COMMIT_TIMESTAMP
        } else {
            keys::OSTREE_COMMIT_TIMESTAMP2
        };
        meta.insert(timestamp_key.to_string(), Variant::u64_be(data.commit_timestamp));

        if !opts.legacy && crate::refs::carries_cache_data(name) {
            meta.insert(
                keys::XA_DATA.to_string(),
                Variant::tuple(vec![
                    Variant::u64_be(data.installed_size),
                    Variant::u64_be(data.download_size),
                    Variant::string(data.metadata_text.clone()),
                ]),
            );
            for (key, value) in &data.sparse {
                meta.insert(key.clone(), value.clone());
            }
        }
    }

    Variant::tuple(vec![
        Variant::U64(entry.map_or(0, |d| d.commit_size)),
        Variant::Bytes(checksum.as_bytes().to_vec()),
        Variant::Map(meta),
    ])
}

// ─── Repo-level metadata ────────────────────────────────────────────

fn build_metadata(
    surviving: &[(&str, &Checksum)],
    surviving_commits: &BTreeSet<String>,
    cache: &CommitCache,
    delta_superblocks: &BTreeMap<String, Checksum>,
    config: &RepoConfig,
    opts: &GeneratorOptions<'_>,
) -> BTreeMap<String, Variant> {
    let mut meta = repo_metadata(config, opts.last_modified);

    let deltas: BTreeMap<String, Variant> = delta_superblocks
        .iter()
        .filter(|(name, _)| surviving_commits.contains(delta_target(name)))
        .map(|(name, digest)| (name.clone(), Variant::Bytes(digest.as_bytes().to_vec())))
        .collect();
    if !deltas.is_empty() {
        meta.insert(keys::OSTREE_STATIC_DELTAS.to_string(), Variant::Map(deltas));
    }

    if opts.legacy {
        let mut dense = Variant::map();
        let mut sparse_cache = Variant::map();
        for (name, checksum) in surviving {
            if !crate::refs::carries_cache_data(name) {
                continue;
            }
            let Some(data) = cache.get(&checksum.to_hex()) else {
                continue;
            };
            dense.insert(
                name.to_string(),
                Variant::tuple(vec![
                    Variant::u64_be(data.installed_size),
                    Variant::u64_be(data.download_size),
                    Variant::string(data.metadata_text.clone()),
                ]),
            );
            if !data.sparse.is_empty() {
                sparse_cache.insert(name.to_string(), Variant::Map(data.sparse.clone()));
            }
        }
        meta.insert(keys::XA_CACHE.to_string(), Variant::Map(dense));
        if !sparse_cache.is_empty() {
            meta.insert(keys::XA_SPARSE_CACHE.to_string(), Variant::Map(sparse_cache));
        }
    } else {
        meta.insert(
            keys::XA_SUMMARY_VERSION.to_string(),
            Variant::U32(keys::SUMMARY_VERSION),
        );
    }

    meta
}

/// Metadata keys shared by summaries and the summary index.
pub(crate) fn repo_metadata(config: &RepoConfig, last_modified: u64) -> BTreeMap<String, Variant> {
    let mut meta = Variant::map();

    if let Some(mode) = &config.mode {
        meta.insert(keys::OSTREE_SUMMARY_MODE.to_string(), Variant::string(mode.clone()));
    }
    meta.insert(
        keys::OSTREE_SUMMARY_TOMBSTONE_COMMITS.to_string(),
        Variant::Bool(config.tombstone_commits),
    );
    meta.insert(
        keys::OSTREE_SUMMARY_INDEXED_DELTAS.to_string(),
        Variant::Bool(true),
    );
    meta.insert(
        keys::OSTREE_SUMMARY_LAST_MODIFIED.to_string(),
        Variant::u64_be(last_modified),
    );

    if let Some(collection_id) = &config.collection_id {
        meta.insert(
            keys::OSTREE_SUMMARY_COLLECTION_ID.to_string(),
            Variant::string(collection_id.clone()),
        );
        if config.deploy_collection_id {
            meta.insert(
                keys::OSTREE_DEPLOY_COLLECTION_ID.to_string(),
                Variant::string(collection_id.clone()),
            );
        } else if config.deploy_sideload_collection_id {
            meta.insert(
                keys::XA_DEPLOY_COLLECTION_ID.to_string(),
                Variant::string(collection_id.clone()),
            );
        }
    }

    let strings = [
        (keys::XA_TITLE, &config.title),
        (keys::XA_COMMENT, &config.comment),
        (keys::XA_DESCRIPTION, &config.description),
        (keys::XA_HOMEPAGE, &config.homepage),
        (keys::XA_ICON, &config.icon),
        (keys::XA_REDIRECT_URL, &config.redirect_url),
        (keys::XA_DEFAULT_BRANCH, &config.default_branch),
        (keys::XA_AUTHENTICATOR_NAME, &config.authenticator_name),
    ];
    for (key, value) in strings {
        if let Some(value) = value {
            meta.insert(key.to_string(), Variant::string(value.clone()));
        }
    }

    if let Some(install) = config.authenticator_install {
        meta.insert(
            keys::XA_AUTHENTICATOR_INSTALL.to_string(),
            Variant::Bool(install),
        );
    }
    for (suffix, value) in &config.authenticator_options {
        meta.insert(
            format!("{}{}", keys::XA_AUTHENTICATOR_OPTIONS_PREFIX, suffix),
            Variant::string(value.clone()),
        );
    }

    if let Some(gpg_keys) = &config.gpg_keys {
        meta.insert(keys::XA_GPG_KEYS.to_string(), Variant::Bytes(gpg_keys.clone()));
    }

    meta.insert(
        keys::XA_CACHE_VERSION.to_string(),
        Variant::U32(keys::CACHE_VERSION),
    );

    meta
}

#[cfg(test)]
#[path = "summary_tests.rs"]
mod tests;
