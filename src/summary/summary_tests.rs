use std::collections::BTreeMap;

use super::*;
use crate::cache::CommitData;
use crate::variant::ref_entry_spans;

fn entry(installed: u64, download: u64, text: &str, subsets: &[&str]) -> CommitData {
    CommitData {
        installed_size: installed,
        download_size: download,
        metadata_text: text.to_string(),
        commit_size: 300,
        commit_timestamp: 1_600_000_000,
        subsets: subsets.iter().map(|s| s.to_string()).collect(),
        sparse: BTreeMap::new(),
    }
}

struct Fixture {
    refs: BTreeMap<String, Checksum>,
    cache: CommitCache,
    deltas: BTreeMap<String, Checksum>,
    config: RepoConfig,
}

impl Fixture {
    fn new() -> Self {
        Fixture {
            refs: BTreeMap::new(),
            cache: CommitCache::new(),
            deltas: BTreeMap::new(),
            config: RepoConfig::default(),
        }
    }

    fn add(&mut self, name: &str, label: &str, data: CommitData) -> Checksum {
        let checksum = Checksum::digest(label.as_bytes());
        self.refs.insert(name.to_string(), checksum);
        self.cache.insert_if_absent(checksum.to_hex(), data);
        checksum
    }

    fn build(&self, subset: &str, arch_filter: Option<&[String]>, legacy: bool) -> Variant {
        build_summary(
            &self.refs,
            &self.cache,
            &self.deltas,
            &self.config,
            &GeneratorOptions {
                subset,
                arch_filter,
                legacy,
                last_modified: 1_700_000_000,
            },
            &CancelToken::new(),
        )
        .unwrap()
    }
}

fn ref_names(summary: &Variant) -> Vec<String> {
    summary.as_tuple().unwrap()[0]
        .as_map()
        .unwrap()
        .keys()
        .cloned()
        .collect()
}

fn ref_entry<'a>(summary: &'a Variant, name: &str) -> &'a Variant {
    summary.as_tuple().unwrap()[0].as_map().unwrap().get(name).unwrap()
}

fn metadata(summary: &Variant) -> &BTreeMap<String, Variant> {
    summary.as_tuple().unwrap()[1].as_map().unwrap()
}

// ─── Shapes ─────────────────────────────────────────────────────────

#[test]
fn test_modern_shape_inlines_xa_data() {
    let mut fx = Fixture::new();
    let checksum = fx.add("app/org.a/x86_64/stable", "c1", entry(4096, 1024, "name=A\n", &[]));
    let summary = fx.build("", None, false);

    let elems = ref_entry(&summary, "app/org.a/x86_64/stable").as_tuple().unwrap();
    assert_eq!(elems[0].as_u64(), Some(300));
    assert_eq!(elems[1].as_bytes(), Some(&checksum.as_bytes()[..]));
    let meta = elems[2].as_map().unwrap();

    let data = meta[keys::XA_DATA].as_tuple().unwrap();
    // Sizes are big-endian on the wire; pin the exact bytes.
    assert_eq!(data[0].as_bytes(), Some(&4096u64.to_be_bytes()[..]));
    assert_eq!(data[1].as_bytes(), Some(&1024u64.to_be_bytes()[..]));
    assert_eq!(data[2].as_str(), Some("name=A\n"));

    assert_eq!(
        meta[keys::OSTREE_COMMIT_TIMESTAMP2].as_u64_be(),
        Some(1_600_000_000)
    );
    assert!(!meta.contains_key(keys::OSTREE_COMMIT_TIMESTAMP));

    let repo_meta = metadata(&summary);
    assert_eq!(repo_meta[keys::XA_SUMMARY_VERSION].as_u32(), Some(keys::SUMMARY_VERSION));
    assert!(!repo_meta.contains_key(keys::XA_CACHE));
}

#[test]
fn test_legacy_shape_embeds_cache() {
    let mut fx = Fixture::new();
    let mut data = entry(4096, 1024, "name=A\n", &[]);
    data.sparse.insert(keys::SPARSE_EOL.to_string(), Variant::string("gone"));
    fx.add("app/org.a/x86_64/stable", "c1", data);
    let summary = fx.build("", None, true);

    let meta = ref_entry(&summary, "app/org.a/x86_64/stable").as_tuple().unwrap()[2]
        .as_map()
        .unwrap()
        .clone();
    // Legacy ref entries carry the old timestamp key and no inline data.
    assert!(meta.contains_key(keys::OSTREE_COMMIT_TIMESTAMP));
    assert!(!meta.contains_key(keys::XA_DATA));

    let repo_meta = metadata(&summary);
    let cache_map = repo_meta[keys::XA_CACHE].as_map().unwrap();
    assert_eq!(cache_map.len(), 1);
    let cached = cache_map["app/org.a/x86_64/stable"].as_tuple().unwrap();
    assert_eq!(cached[0].as_u64_be(), Some(4096));
    assert_eq!(cached[1].as_u64_be(), Some(1024));
    assert_eq!(cached[2].as_str(), Some("name=A\n"));

    let sparse_map = repo_meta[keys::XA_SPARSE_CACHE].as_map().unwrap();
    assert_eq!(
        sparse_map["app/org.a/x86_64/stable"].lookup(keys::SPARSE_EOL).and_then(Variant::as_str),
        Some("gone")
    );
    assert!(!repo_meta.contains_key(keys::XA_SUMMARY_VERSION));
}

#[test]
fn test_sparse_cache_omitted_when_empty() {
    let mut fx = Fixture::new();
    fx.add("app/org.a/x86_64/stable", "c1", entry(1, 1, "", &[]));
    let summary = fx.build("", None, true);
    assert!(!metadata(&summary).contains_key(keys::XA_SPARSE_CACHE));
}

#[test]
fn test_determinism() {
    let mut fx = Fixture::new();
    fx.add("app/org.b/x86_64/stable", "c2", entry(2, 2, "b", &[]));
    fx.add("app/org.a/x86_64/stable", "c1", entry(1, 1, "a", &[]));
    let one = fx.build("", None, false).to_bytes().unwrap();
    let two = fx.build("", None, false).to_bytes().unwrap();
    assert_eq!(one, two);
}

#[test]
fn test_empty_ref_list_still_frames() {
    let fx = Fixture::new();
    let summary = fx.build("", None, false);
    let bytes = summary.to_bytes().unwrap();
    assert_eq!(Variant::from_bytes(&bytes).unwrap(), summary);
    assert!(ref_entry_spans(&bytes).unwrap().is_empty());
    assert!(ref_names(&summary).is_empty());
}

// ─── Arch filtering ─────────────────────────────────────────────────

#[test]
fn test_arch_filter_drops_other_arches() {
    let mut fx = Fixture::new();
    fx.add("app/org.a/x86_64/stable", "c1", entry(1, 1, "", &[]));
    fx.add("app/org.a/aarch64/stable", "c2", entry(1, 1, "", &[]));
    fx.add("ostree-metadata", "m", entry(1, 1, "", &[]));

    let filter = vec!["x86_64".to_string()];
    let summary = fx.build("", Some(&filter), false);
    assert_eq!(
        ref_names(&summary),
        vec!["app/org.a/x86_64/stable".to_string(), "ostree-metadata".to_string()]
    );
}

#[test]
fn test_arch_filter_prunes_static_deltas() {
    let mut fx = Fixture::new();
    let kept = fx.add("app/org.a/x86_64/stable", "c1", entry(1, 1, "", &[]));
    let dropped = fx.add("app/org.a/aarch64/stable", "c2", entry(1, 1, "", &[]));
    fx.deltas.insert(kept.to_hex(), Checksum::digest(b"sb1"));
    fx.deltas.insert(dropped.to_hex(), Checksum::digest(b"sb2"));
    fx.deltas.insert(
        format!("{}-{}", Checksum::digest(b"old").to_hex(), kept.to_hex()),
        Checksum::digest(b"sb3"),
    );

    let filter = vec!["x86_64".to_string()];
    let summary = fx.build("", Some(&filter), true);
    let deltas = metadata(&summary)[keys::OSTREE_STATIC_DELTAS].as_map().unwrap();
    assert_eq!(deltas.len(), 2);
    assert!(deltas.contains_key(&kept.to_hex()));
    assert!(!deltas.contains_key(&dropped.to_hex()));
    // Superblock digests ride along as raw bytes.
    assert_eq!(
        deltas[&kept.to_hex()].as_bytes(),
        Some(&Checksum::digest(b"sb1").as_bytes()[..])
    );
}

#[test]
fn test_no_deltas_key_when_none_survive() {
    let mut fx = Fixture::new();
    fx.add("app/org.a/x86_64/stable", "c1", entry(1, 1, "", &[]));
    fx.deltas.insert(Checksum::digest(b"unrelated").to_hex(), Checksum::digest(b"sb"));
    let summary = fx.build("", None, false);
    assert!(!metadata(&summary).contains_key(keys::OSTREE_STATIC_DELTAS));
}

// ─── Subset filtering ───────────────────────────────────────────────

fn subset_fixture() -> Fixture {
    let mut fx = Fixture::new();
    fx.add("app/org.a/x86_64/stable", "c1", entry(1, 1, "", &["flathub"]));
    fx.add("app/org.b/x86_64/stable", "c2", entry(1, 1, "", &[]));
    fx.add("appstream/x86_64", "as1", entry(1, 1, "", &[]));
    fx.add("appstream2/x86_64", "as2", entry(1, 1, "", &[]));
    fx.add("appstream2/flathub-x86_64", "as3", entry(1, 1, "", &[]));
    fx.add("ostree-metadata", "m", entry(1, 1, "", &[]));
    fx
}

#[test]
fn test_default_subset_hides_subset_appstream() {
    let summary = subset_fixture().build("", None, false);
    let names = ref_names(&summary);
    assert!(names.contains(&"app/org.a/x86_64/stable".to_string()));
    assert!(names.contains(&"app/org.b/x86_64/stable".to_string()));
    assert!(names.contains(&"appstream/x86_64".to_string()));
    assert!(names.contains(&"appstream2/x86_64".to_string()));
    assert!(names.contains(&"ostree-metadata".to_string()));
    assert!(!names.contains(&"appstream2/flathub-x86_64".to_string()));
}

#[test]
fn test_subset_view_is_isolated() {
    let summary = subset_fixture().build("flathub", None, false);
    assert_eq!(
        ref_names(&summary),
        vec![
            "app/org.a/x86_64/stable".to_string(),
            "appstream2/flathub-x86_64".to_string(),
        ]
    );
}

#[test]
fn test_unknown_subset_is_empty() {
    let summary = subset_fixture().build("nightly", None, false);
    assert!(ref_names(&summary).is_empty());
}

// ─── Repo metadata ──────────────────────────────────────────────────

#[test]
fn test_repo_metadata_keys() {
    let mut fx = Fixture::new();
    fx.config.title = Some("Example".into());
    fx.config.default_branch = Some("stable".into());
    fx.config.collection_id = Some("org.example.Apps".into());
    fx.config.deploy_collection_id = true;
    fx.config.gpg_keys = Some(vec![1, 2, 3]);
    fx.config.authenticator_name = Some("org.example.Auth".into());
    fx.config.authenticator_install = Some(true);
    fx.config
        .authenticator_options
        .insert("url".into(), "https://auth.example.com".into());
    fx.config.mode = Some("archive-z2".into());
    fx.config.tombstone_commits = true;

    let meta = metadata(&fx.build("", None, false)).clone();
    assert_eq!(meta[keys::XA_TITLE].as_str(), Some("Example"));
    assert_eq!(meta[keys::XA_DEFAULT_BRANCH].as_str(), Some("stable"));
    assert_eq!(meta[keys::OSTREE_SUMMARY_COLLECTION_ID].as_str(), Some("org.example.Apps"));
    assert_eq!(meta[keys::OSTREE_DEPLOY_COLLECTION_ID].as_str(), Some("org.example.Apps"));
    assert!(!meta.contains_key(keys::XA_DEPLOY_COLLECTION_ID));
    assert_eq!(meta[keys::XA_GPG_KEYS].as_bytes(), Some(&[1u8, 2, 3][..]));
    assert_eq!(meta[keys::XA_AUTHENTICATOR_NAME].as_str(), Some("org.example.Auth"));
    assert_eq!(meta[keys::XA_AUTHENTICATOR_INSTALL].as_bool(), Some(true));
    assert_eq!(
        meta["xa.authenticator-options.url"].as_str(),
        Some("https://auth.example.com")
    );
    assert_eq!(meta[keys::OSTREE_SUMMARY_MODE].as_str(), Some("archive-z2"));
    assert_eq!(meta[keys::OSTREE_SUMMARY_TOMBSTONE_COMMITS].as_bool(), Some(true));
    assert_eq!(meta[keys::OSTREE_SUMMARY_INDEXED_DELTAS].as_bool(), Some(true));
    assert_eq!(meta[keys::OSTREE_SUMMARY_LAST_MODIFIED].as_u64_be(), Some(1_700_000_000));
    assert_eq!(meta[keys::XA_CACHE_VERSION].as_u32(), Some(keys::CACHE_VERSION));
}

#[test]
fn test_sideload_collection_key() {
    let mut fx = Fixture::new();
    fx.config.collection_id = Some("org.example.Apps".into());
    fx.config.deploy_sideload_collection_id = true;
    let meta = metadata(&fx.build("", None, false)).clone();
    assert_eq!(meta[keys::XA_DEPLOY_COLLECTION_ID].as_str(), Some("org.example.Apps"));
    assert!(!meta.contains_key(keys::OSTREE_DEPLOY_COLLECTION_ID));
}

#[test]
fn test_cancellation_stops_generation() {
    let mut fx = Fixture::new();
    fx.add("app/org.a/x86_64/stable", "c1", entry(1, 1, "", &[]));
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = build_summary(
        &fx.refs,
        &fx.cache,
        &fx.deltas,
        &fx.config,
        &GeneratorOptions {
            subset: "",
            arch_filter: None,
            legacy: false,
            last_modified: 0,
        },
        &cancel,
    )
    .unwrap_err();
    assert!(err.is_cancelled());
}
