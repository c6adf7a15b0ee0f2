//! In-memory object store and fixtures shared across test modules.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::checksum::Checksum;
use crate::error::{Result, SummaryError};
use crate::sign::Signer;
use crate::store::{CommitObject, ObjectStore, Tree, TreeDir, TreeFile};
use crate::variant::Variant;

/// Object store backed by hash maps, counting every object read so tests
/// can assert the fast cache path never touches it.
#[derive(Default)]
pub struct MemoryObjectStore {
    pub refs: BTreeMap<String, Checksum>,
    commits: HashMap<String, CommitObject>,
    trees: HashMap<String, Tree>,
    files: HashMap<String, Vec<u8>>,
    /// Static-delta name → superblock bytes.
    pub delta_superblocks: BTreeMap<String, Vec<u8>>,
    pub reads: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn add_file(&mut self, content: &[u8]) -> Checksum {
        let checksum = Checksum::digest(content);
        self.files.insert(checksum.to_hex(), content.to_vec());
        checksum
    }

    pub fn add_tree(&mut self, label: &str, tree: Tree) -> Checksum {
        let checksum = Checksum::digest(format!("tree:{}", label).as_bytes());
        self.trees.insert(checksum.to_hex(), tree);
        checksum
    }

    /// Insert a commit whose tree holds a `metadata` file plus `extra_files`
    /// of given apparent/storage sizes. Returns the commit digest.
    pub fn insert_commit(
        &mut self,
        label: &str,
        metadata: BTreeMap<String, Variant>,
        metadata_text: &str,
        extra_files: &[(&str, u64, u64)],
        timestamp: u64,
    ) -> Checksum {
        let metadata_object = self.add_file(metadata_text.as_bytes());
        let mut files = vec![TreeFile {
            name: "metadata".to_string(),
            size: metadata_text.len() as u64,
            storage_size: metadata_text.len() as u64 + 16,
            object: metadata_object,
        }];
        for (name, size, storage_size) in extra_files {
            let object = self.add_file(format!("{}:{}", label, name).as_bytes());
            files.push(TreeFile {
                name: name.to_string(),
                size: *size,
                storage_size: *storage_size,
                object,
            });
        }
        let root_tree = self.add_tree(label, Tree {
            files,
            subdirs: Vec::new(),
        });

        let checksum = Checksum::digest(format!("commit:{}", label).as_bytes());
        self.commits.insert(checksum.to_hex(), CommitObject {
            metadata: Variant::Map(metadata),
            root_tree,
            timestamp,
            object_size: 128 + label.len() as u64,
        });
        checksum
    }

    /// Insert a commit and bind a ref to it.
    pub fn insert_ref(
        &mut self,
        ref_name: &str,
        label: &str,
        metadata: BTreeMap<String, Variant>,
        metadata_text: &str,
        timestamp: u64,
    ) -> Checksum {
        let checksum = self.insert_commit(
            label,
            metadata,
            metadata_text,
            &[("contents", 4096, 1000)],
            timestamp,
        );
        self.refs.insert(ref_name.to_string(), checksum);
        checksum
    }

    pub fn add_subtree(&mut self, parent: &Checksum, name: &str, tree: Tree) {
        let label = format!("{}:{}", parent, name);
        let child = self.add_tree(&label, tree);
        self.trees
            .get_mut(&parent.to_hex())
            .expect("parent tree exists")
            .subdirs
            .push(TreeDir {
                name: name.to_string(),
                tree: child,
            });
    }
}

/// Commit metadata carrying subset tags.
pub fn subset_metadata(subsets: &[&str]) -> BTreeMap<String, Variant> {
    let mut meta = Variant::map();
    meta.insert(
        crate::keys::COMMIT_XA_SUBSETS.to_string(),
        Variant::Array(subsets.iter().map(|s| Variant::string(*s)).collect()),
    );
    meta
}

impl ObjectStore for MemoryObjectStore {
    fn list_refs(&self) -> Result<BTreeMap<String, Checksum>> {
        Ok(self.refs.clone())
    }

    fn load_commit(&self, checksum: &Checksum) -> Result<CommitObject> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.commits
            .get(&checksum.to_hex())
            .cloned()
            .ok_or_else(|| SummaryError::MissingObject {
                checksum: checksum.to_hex(),
            })
    }

    fn load_tree(&self, checksum: &Checksum) -> Result<Tree> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.trees
            .get(&checksum.to_hex())
            .cloned()
            .ok_or_else(|| SummaryError::MissingObject {
                checksum: checksum.to_hex(),
            })
    }

    fn load_file(&self, checksum: &Checksum) -> Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.files
            .get(&checksum.to_hex())
            .cloned()
            .ok_or_else(|| SummaryError::MissingObject {
                checksum: checksum.to_hex(),
            })
    }

    fn static_delta_names(&self) -> Result<Vec<String>> {
        Ok(self.delta_superblocks.keys().cloned().collect())
    }

    fn static_delta_superblock(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.delta_superblocks.get(name).cloned())
    }

    fn reindex_static_deltas(&self) -> Result<()> {
        Ok(())
    }
}

/// Signer producing a recognizable fake signature.
pub struct TestSigner;

impl Signer for TestSigner {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut sig = b"sig:".to_vec();
        sig.extend_from_slice(Checksum::digest(data).to_hex().as_bytes());
        Ok(sig)
    }
}

/// Signer that always fails, for abort-path tests.
pub struct RefusingSigner;

impl Signer for RefusingSigner {
    fn sign(&self, _data: &[u8]) -> Result<Vec<u8>> {
        Err(SummaryError::Signing("key unavailable".to_string()))
    }
}
