//! SHA-256 digests and their three renderings.
//!
//! A digest appears as 32 raw bytes inside framed values, as 64-char
//! lowercase hex in file names and ref bindings, and as 43-char URL-safe
//! base64 in static-delta object paths.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use crate::error::{Result, SummaryError};

/// A SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Checksum([u8; 32]);

impl Checksum {
    /// Digest a byte buffer.
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Checksum(hasher.finalize().into())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            SummaryError::invalid("checksum", format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Checksum(arr))
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| SummaryError::invalid("checksum", format!("bad hex '{}': {}", s, e)))?;
        Self::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// 64-char lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// 43-char URL-safe base64 (RFC 4648 §5: `-` and `_` in place of `+`
    /// and `/`), no padding. Safe inside a single path segment.
    pub fn to_base64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Checksum({})", self.to_hex())
    }
}

/// True for a 64-char lowercase hex digest name.
pub fn is_hex_digest(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

// ─── Static-delta object paths ──────────────────────────────────────

/// The `TO` digest of a static-delta name `[FROM-]TO` (hex form).
pub fn delta_target(name: &str) -> &str {
    match name.rsplit_once('-') {
        Some((_, to)) => to,
        None => name,
    }
}

/// Relative path of a static-delta superblock inside the repository.
///
/// Each digest is rendered in URL-safe base64 and split after two chars:
/// `deltas/{to2}/{to41}/superblock` for a full delta,
/// `deltas/{from2}/{from41}-{to2}/{to41}/superblock` for an update delta.
pub fn delta_superblock_path(name: &str) -> Result<String> {
    let dir = match name.rsplit_once('-') {
        Some((from, to)) => {
            let from = Checksum::from_hex(from)?.to_base64();
            let to = Checksum::from_hex(to)?.to_base64();
            format!("{}/{}-{}/{}", &from[..2], &from[2..], &to[..2], &to[2..])
        }
        None => {
            let to = Checksum::from_hex(name)?.to_base64();
            format!("{}/{}", &to[..2], &to[2..])
        }
    };
    Ok(format!("deltas/{}/superblock", dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_known_vector() {
        // sha256("") — the canonical empty-input vector.
        let c = Checksum::digest(b"");
        assert_eq!(
            c.to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hex_roundtrip() {
        let c = Checksum::digest(b"app/org.example.App/x86_64/stable");
        let back = Checksum::from_hex(&c.to_hex()).unwrap();
        assert_eq!(c, back);
    }

    #[test]
    fn test_from_bytes_rejects_wrong_length() {
        assert!(Checksum::from_bytes(&[0u8; 31]).is_err());
        assert!(Checksum::from_bytes(&[0u8; 33]).is_err());
        assert!(Checksum::from_bytes(&[0u8; 32]).is_ok());
    }

    #[test]
    fn test_base64_shape() {
        let c = Checksum::digest(b"some commit");
        let m = c.to_base64();
        assert_eq!(m.len(), 43);
        assert!(!m.contains('+'));
        assert!(!m.contains('/'));
        assert!(!m.contains('='));
    }

    #[test]
    fn test_base64_uses_url_safe_alphabet() {
        // All-ones bytes put index 63 in every full group: '_' not '/'.
        let c = Checksum::from_bytes(&[0xffu8; 32]).unwrap();
        let m = c.to_base64();
        assert!(m.contains('_'));
        assert!(!m.contains('/'));
        // 0xfb starts with bit group 0b111110 = index 62: '-' not '+'.
        let c = Checksum::from_bytes(&[0xfbu8; 32]).unwrap();
        let m = c.to_base64();
        assert!(m.starts_with('-'));
        assert!(!m.contains('+'));
    }

    #[test]
    fn test_is_hex_digest() {
        let c = Checksum::digest(b"x").to_hex();
        assert!(is_hex_digest(&c));
        assert!(!is_hex_digest("abc"));
        assert!(!is_hex_digest(&c.to_uppercase()));
        assert!(!is_hex_digest(&format!("{}0", c)));
    }

    #[test]
    fn test_delta_target() {
        assert_eq!(delta_target("aa-bb"), "bb");
        assert_eq!(delta_target("bb"), "bb");
    }

    #[test]
    fn test_superblock_path_full_delta() {
        let to = Checksum::digest(b"to").to_hex();
        let path = delta_superblock_path(&to).unwrap();
        let m = Checksum::from_hex(&to).unwrap().to_base64();
        assert_eq!(path, format!("deltas/{}/{}/superblock", &m[..2], &m[2..]));
    }

    #[test]
    fn test_superblock_path_update_delta() {
        let from = Checksum::digest(b"from").to_hex();
        let to = Checksum::digest(b"to").to_hex();
        let path = delta_superblock_path(&format!("{}-{}", from, to)).unwrap();
        assert!(path.starts_with("deltas/"));
        assert!(path.ends_with("/superblock"));
        assert!(path.contains('-'));
    }

    #[test]
    fn test_superblock_path_rejects_garbage() {
        assert!(delta_superblock_path("not-hex").is_err());
    }
}
