//! # repo-summary — repository summary & summary-index generation
//!
//! Maintains the client-facing metadata of a content-addressed app/runtime
//! repository: the compat summary, per-(subset, arch) sub-summaries, a
//! signed summary index with bounded per-sub-summary delta history, and the
//! garbage collection that keeps the `summaries/` directory tight.
//!
//! The object database, signing primitives, and transport are external;
//! they plug in through the [`store::ObjectStore`] and [`sign::Signer`]
//! traits. The single entry point is [`update_repo`].

pub mod cache;
pub mod cancel;
pub mod checksum;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod keys;
pub mod layout;
pub mod refs;
pub mod sign;
pub mod store;
pub mod summary;
pub mod update;
pub mod variant;

pub use cache::{CommitCache, CommitData};
pub use cancel::CancelToken;
pub use checksum::Checksum;
pub use config::RepoConfig;
pub use error::{Phase, Result, SummaryError};
pub use sign::Signer;
pub use store::ObjectStore;
pub use summary::{GeneratorOptions, build_summary};
pub use update::{UpdateOptions, UpdateOutcome, update_repo};
pub use variant::Variant;

#[cfg(test)]
pub(crate) mod testutil;
