//! Interface to the commit object database.
//!
//! The object store itself (commit/tree/file/delta storage) is an external
//! collaborator; the summary subsystem only reads through this trait. The
//! slow cache path walks commits and trees here, and the generator asks for
//! static-delta names and superblocks.

use std::collections::BTreeMap;

use crate::checksum::Checksum;
use crate::error::Result;
use crate::variant::Variant;

/// A loaded commit object.
#[derive(Clone, Debug)]
pub struct CommitObject {
    /// The commit metadata map (`xa.installed-size`, `xa.metadata`, …).
    pub metadata: Variant,
    pub root_tree: Checksum,
    /// Commit timestamp, seconds since the epoch.
    pub timestamp: u64,
    /// On-disk encoded size of the commit object itself.
    pub object_size: u64,
}

/// A regular file entry of one tree level.
#[derive(Clone, Debug)]
pub struct TreeFile {
    pub name: String,
    /// Apparent content size.
    pub size: u64,
    /// On-disk object size, i.e. what a client downloads.
    pub storage_size: u64,
    pub object: Checksum,
}

/// A subdirectory entry of one tree level.
#[derive(Clone, Debug)]
pub struct TreeDir {
    pub name: String,
    pub tree: Checksum,
}

/// One level of a commit's file tree.
#[derive(Clone, Debug, Default)]
pub struct Tree {
    pub files: Vec<TreeFile>,
    pub subdirs: Vec<TreeDir>,
}

/// Read access to the object database backing the repository.
pub trait ObjectStore {
    /// The repository's own refs with their commit digests. Remote-tracking
    /// and mirror refs are not listed.
    fn list_refs(&self) -> Result<BTreeMap<String, Checksum>>;

    fn load_commit(&self, checksum: &Checksum) -> Result<CommitObject>;

    fn load_tree(&self, checksum: &Checksum) -> Result<Tree>;

    /// Raw content of a file object.
    fn load_file(&self, checksum: &Checksum) -> Result<Vec<u8>>;

    /// Names of all static deltas, shaped `[FROM-]TO` in digest hex.
    fn static_delta_names(&self) -> Result<Vec<String>>;

    /// Raw superblock bytes for a static delta, `None` if absent.
    ///
    /// Disk-backed stores resolve `name` through
    /// [`delta_superblock_path`](crate::checksum::delta_superblock_path).
    fn static_delta_superblock(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Rebuild the store's own static-delta index after a summary update.
    fn reindex_static_deltas(&self) -> Result<()>;
}
