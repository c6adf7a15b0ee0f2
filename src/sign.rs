//! Detached-signature provider interface.
//!
//! GPG/ed25519 machinery lives outside this crate; the orchestrator hands
//! the serialized index bytes to a provider and installs whatever detached
//! signature comes back. A provider failure aborts the run before install.

use crate::error::Result;

/// Produces detached signatures over serialized summary-index bytes.
pub trait Signer {
    /// Sign `data`, returning the detached signature bytes.
    ///
    /// Implementations should fail with
    /// [`SummaryError::Signing`](crate::error::SummaryError::Signing) so the
    /// orchestrator reports the phase correctly.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>>;
}
