//! Repository configuration consumed by the generators.
//!
//! Parsing the repository config file is an external concern; this module
//! only defines the typed view of the recognized keys and a constructor over
//! a `(group, key) -> value` lookup so any keyfile backend can feed it.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{Result, SummaryError};

/// History entries kept per sub-summary when the config does not say
/// otherwise (or says something non-positive).
pub const DEFAULT_HISTORY_LENGTH: usize = 16;

/// Typed view of the repository configuration keys the summary subsystem
/// recognizes. All fields are optional; `Default` is a valid bare repo.
#[derive(Clone, Debug, Default)]
pub struct RepoConfig {
    pub title: Option<String>,
    pub comment: Option<String>,
    pub description: Option<String>,
    pub homepage: Option<String>,
    pub icon: Option<String>,
    pub redirect_url: Option<String>,
    pub default_branch: Option<String>,
    pub collection_id: Option<String>,
    pub deploy_collection_id: bool,
    pub deploy_sideload_collection_id: bool,
    /// Decoded from the base64 `flatpak.gpg-keys` blob.
    pub gpg_keys: Option<Vec<u8>>,
    pub authenticator_name: Option<String>,
    pub authenticator_install: Option<bool>,
    /// `flatpak.authenticator-options.X` keys, by suffix.
    pub authenticator_options: BTreeMap<String, String>,
    /// `flatpak.summary-arches`; `None` means all arches.
    pub summary_arches: Option<Vec<String>>,
    pub summary_history_length: Option<u32>,
    pub mode: Option<String>,
    pub tombstone_commits: bool,
}

impl RepoConfig {
    /// Build from a `(group, key)` lookup over the repository config file.
    ///
    /// `keys` must yield every key name present in a group, so the
    /// `authenticator-options.*` family can be collected.
    pub fn from_lookup(
        get: &dyn Fn(&str, &str) -> Option<String>,
        keys: &dyn Fn(&str) -> Vec<String>,
    ) -> Result<Self> {
        let gpg_keys = match get("flatpak", "gpg-keys") {
            Some(blob) => {
                let packed: String = blob.split_whitespace().collect();
                let decoded = STANDARD.decode(packed.as_bytes()).map_err(|e| {
                    SummaryError::invalid("config", format!("flatpak.gpg-keys: {}", e))
                })?;
                Some(decoded)
            }
            None => None,
        };

        // The writer has always used the correct spelling, but old repos may
        // carry the historical misspelling; accept both when reading.
        let history = match get("flatpak", "summary-history-length")
            .or_else(|| get("flatpak", "sumary-history-length"))
        {
            Some(raw) => Some(raw.trim().parse::<u32>().map_err(|e| {
                SummaryError::invalid("config", format!("summary-history-length '{}': {}", raw, e))
            })?),
            None => None,
        };

        let mut authenticator_options = BTreeMap::new();
        for key in keys("flatpak") {
            if let Some(suffix) = key.strip_prefix("authenticator-options.") {
                if let Some(value) = get("flatpak", &key) {
                    authenticator_options.insert(suffix.to_string(), value);
                }
            }
        }

        Ok(RepoConfig {
            title: get("flatpak", "title"),
            comment: get("flatpak", "comment"),
            description: get("flatpak", "description"),
            homepage: get("flatpak", "homepage"),
            icon: get("flatpak", "icon"),
            redirect_url: get("flatpak", "redirect-url"),
            default_branch: get("flatpak", "default-branch"),
            collection_id: get("core", "collection-id"),
            deploy_collection_id: get_bool(get, "flatpak", "deploy-collection-id")?,
            deploy_sideload_collection_id: get_bool(
                get,
                "flatpak",
                "deploy-sideload-collection-id",
            )?,
            gpg_keys,
            authenticator_name: get("flatpak", "authenticator-name"),
            authenticator_install: get_opt_bool(get, "flatpak", "authenticator-install")?,
            authenticator_options,
            summary_arches: get("flatpak", "summary-arches").map(|raw| {
                raw.split(';')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            }),
            summary_history_length: history,
            mode: get("core", "mode"),
            tombstone_commits: get_bool(get, "core", "tombstone-commits")?,
        })
    }

    /// Effective per-sub-summary history bound.
    pub fn history_length(&self) -> usize {
        match self.summary_history_length {
            Some(n) if n > 0 => n as usize,
            _ => DEFAULT_HISTORY_LENGTH,
        }
    }
}

fn get_opt_bool(
    get: &dyn Fn(&str, &str) -> Option<String>,
    group: &str,
    key: &str,
) -> Result<Option<bool>> {
    match get(group, key) {
        None => Ok(None),
        Some(raw) => match raw.trim() {
            "true" | "1" => Ok(Some(true)),
            "false" | "0" => Ok(Some(false)),
            other => Err(SummaryError::invalid(
                "config",
                format!("{}.{}: expected boolean, got '{}'", group, key, other),
            )),
        },
    }
}

fn get_bool(
    get: &dyn Fn(&str, &str) -> Option<String>,
    group: &str,
    key: &str,
) -> Result<bool> {
    Ok(get_opt_bool(get, group, key)?.unwrap_or(false))
}
