//! Metadata key names and format versions used across summaries, indexes,
//! and commits.

/// Version stamped into modern summaries as `xa.summary-version`.
pub const SUMMARY_VERSION: u32 = 1;

/// Version of the per-commit cache layout. The fast cache path refuses to
/// read indexes whose `xa.cache-version` is below this.
pub const CACHE_VERSION: u32 = 2;

// ─── Repo-level summary metadata ────────────────────────────────────

pub const OSTREE_SUMMARY_MODE: &str = "ostree.summary.mode";
pub const OSTREE_SUMMARY_TOMBSTONE_COMMITS: &str = "ostree.summary.tombstone-commits";
pub const OSTREE_SUMMARY_INDEXED_DELTAS: &str = "ostree.summary.indexed-deltas";
pub const OSTREE_SUMMARY_LAST_MODIFIED: &str = "ostree.summary.last-modified";
pub const OSTREE_SUMMARY_COLLECTION_ID: &str = "ostree.summary.collection-id";
pub const OSTREE_STATIC_DELTAS: &str = "ostree.static-deltas";
pub const OSTREE_DEPLOY_COLLECTION_ID: &str = "ostree.deploy-collection-id";

pub const XA_TITLE: &str = "xa.title";
pub const XA_COMMENT: &str = "xa.comment";
pub const XA_DESCRIPTION: &str = "xa.description";
pub const XA_HOMEPAGE: &str = "xa.homepage";
pub const XA_ICON: &str = "xa.icon";
pub const XA_REDIRECT_URL: &str = "xa.redirect-url";
pub const XA_DEFAULT_BRANCH: &str = "xa.default-branch";
pub const XA_DEPLOY_COLLECTION_ID: &str = "xa.deploy-collection-id";
pub const XA_AUTHENTICATOR_NAME: &str = "xa.authenticator-name";
pub const XA_AUTHENTICATOR_INSTALL: &str = "xa.authenticator-install";
pub const XA_AUTHENTICATOR_OPTIONS_PREFIX: &str = "xa.authenticator-options.";
pub const XA_GPG_KEYS: &str = "xa.gpg-keys";
pub const XA_CACHE: &str = "xa.cache";
pub const XA_SPARSE_CACHE: &str = "xa.sparse-cache";
pub const XA_CACHE_VERSION: &str = "xa.cache-version";
pub const XA_SUMMARY_VERSION: &str = "xa.summary-version";

// ─── Per-ref metadata ───────────────────────────────────────────────

/// Dense cache tuple `(installed_size BE, download_size BE, metadata)`.
pub const XA_DATA: &str = "xa.data";
/// Commit timestamp, big-endian. The `2` suffix distinguishes the modern
/// key from the legacy summary's `ostree.commit.timestamp`.
pub const OSTREE_COMMIT_TIMESTAMP2: &str = "ostree.commit.timestamp2";
pub const OSTREE_COMMIT_TIMESTAMP: &str = "ostree.commit.timestamp";

/// Per-ref keys with these prefixes belong to the transport layer and are
/// never harvested into the sparse cache.
pub const RESERVED_KEY_PREFIXES: [&str; 2] = ["ot.", "ostree."];

// ─── Sparse cache keys ──────────────────────────────────────────────

pub const SPARSE_EOL: &str = "eol";
pub const SPARSE_EOL_REBASE: &str = "eolr";
pub const SPARSE_TOKEN_TYPE: &str = "tt";
pub const SPARSE_EXTRA_DATA_SIZE: &str = "eds";

// ─── Commit object metadata ─────────────────────────────────────────

pub const COMMIT_XA_METADATA: &str = "xa.metadata";
pub const COMMIT_XA_INSTALLED_SIZE: &str = "xa.installed-size";
pub const COMMIT_XA_DOWNLOAD_SIZE: &str = "xa.download-size";
pub const COMMIT_XA_SUBSETS: &str = "xa.subsets";
pub const COMMIT_XA_TOKEN_TYPE: &str = "xa.token-type";
pub const COMMIT_XA_EXTRA_DATA_SOURCES: &str = "xa.extra-data-sources";
pub const COMMIT_OSTREE_ENDOFLIFE: &str = "ostree.endoflife";
pub const COMMIT_OSTREE_ENDOFLIFE_REBASE: &str = "ostree.endoflife-rebase";
