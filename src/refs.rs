//! Ref name parsing.
//!
//! Three shapes matter to the generator: `app/ID/ARCH/BRANCH`,
//! `runtime/ID/ARCH/BRANCH`, and `appstream[2]/[SUBSET-]ARCH`. Anything
//! else (`ostree-metadata`, malformed names) is carried through verbatim
//! with no arch and no cache data. Refs compare byte-wise.

/// A classified ref name, borrowing from the original string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefKind<'a> {
    App {
        id: &'a str,
        arch: &'a str,
        branch: &'a str,
    },
    Runtime {
        id: &'a str,
        arch: &'a str,
        branch: &'a str,
    },
    /// `appstream/…` (legacy) or `appstream2/…`, with an optional
    /// `SUBSET-` prefix on the arch segment.
    Appstream {
        v2: bool,
        subset: &'a str,
        arch: &'a str,
    },
    Other,
}

pub fn parse_ref(name: &str) -> RefKind<'_> {
    let mut parts = name.split('/');
    let kind = parts.next().unwrap_or("");
    match kind {
        "app" | "runtime" => {
            let (Some(id), Some(arch), Some(branch), None) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                return RefKind::Other;
            };
            if id.is_empty() || arch.is_empty() || branch.is_empty() {
                return RefKind::Other;
            }
            if kind == "app" {
                RefKind::App { id, arch, branch }
            } else {
                RefKind::Runtime { id, arch, branch }
            }
        }
        "appstream" | "appstream2" => {
            let (Some(segment), None) = (parts.next(), parts.next()) else {
                return RefKind::Other;
            };
            if segment.is_empty() {
                return RefKind::Other;
            }
            // Subset prefix ends at the first '-'; arches never contain one.
            let (subset, arch) = match segment.split_once('-') {
                Some((subset, arch)) if !subset.is_empty() && !arch.is_empty() => (subset, arch),
                _ => ("", segment),
            };
            RefKind::Appstream {
                v2: kind == "appstream2",
                subset,
                arch,
            }
        }
        _ => RefKind::Other,
    }
}

/// The arch segment of a ref, `None` for arch-less refs.
pub fn ref_arch(name: &str) -> Option<&str> {
    match parse_ref(name) {
        RefKind::App { arch, .. } | RefKind::Runtime { arch, .. } => Some(arch),
        RefKind::Appstream { arch, .. } => Some(arch),
        RefKind::Other => None,
    }
}

/// Whether this ref carries per-commit cache data in summaries
/// (apps, runtimes, and appstream payloads do; metadata refs do not).
pub fn carries_cache_data(name: &str) -> bool {
    !matches!(parse_ref(name), RefKind::Other)
}
