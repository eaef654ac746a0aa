//! Lineage fingerprints
//!
//! Provides [`Fingerprint`], a 32-byte Blake3 digest, and [`fingerprint`],
//! the hasher that chains a stage's serialized content with the
//! fingerprints of its parents.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Byte written between the content and the parent entries.
///
/// Content is canonical JSON text, which never carries a raw NUL.
pub const CONTENT_SEPARATOR: u8 = 0x00;

/// Byte written between two `key:value` parent entries.
pub const ENTRY_DELIMITER: u8 = b'\n';

/// Parent fingerprints keyed by parent stage id, sorted by key.
pub type ParentFingerprints = BTreeMap<String, Fingerprint>;

/// A 32-byte lineage digest (Blake3)
///
/// Immutable and cheap to clone (Copy). Serializes as lowercase hex in
/// human-readable formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Create a fingerprint from raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get reference to the underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create fingerprint from byte slice
    ///
    /// # Errors
    /// Returns error if slice length is not exactly 32 bytes
    #[inline]
    pub fn from_slice(bytes: &[u8]) -> Result<Self, FingerprintError> {
        if bytes.len() != 32 {
            return Err(FingerprintError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Blake3 digest of arbitrary data
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self::new(*blake3::hash(data).as_bytes())
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }

    /// Lowercase hex form
    #[inline]
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Chain `content` with its parents' fingerprints.
///
/// The digest covers `content`, [`CONTENT_SEPARATOR`], then every parent
/// entry as `key:value` (value in hex) joined by [`ENTRY_DELIMITER`], with
/// entries sorted by key. Iteration order of `parents` never affects the
/// result; a repeated key keeps its last value.
#[must_use]
pub fn fingerprint<'a, I, K>(content: &str, parents: I) -> Fingerprint
where
    I: IntoIterator<Item = (K, &'a Fingerprint)>,
    K: AsRef<str>,
{
    let sorted: BTreeMap<String, Fingerprint> = parents
        .into_iter()
        .map(|(key, value)| (key.as_ref().to_string(), *value))
        .collect();
    fingerprint_sorted(content, &sorted)
}

/// [`fingerprint`] over an already-sorted parent map
#[must_use]
pub fn fingerprint_sorted(content: &str, parents: &ParentFingerprints) -> Fingerprint {
    let mut hasher = blake3::Hasher::new();
    hasher.update(content.as_bytes());
    hasher.update(&[CONTENT_SEPARATOR]);
    for (i, (key, value)) in parents.iter().enumerate() {
        if i > 0 {
            hasher.update(&[ENTRY_DELIMITER]);
        }
        hasher.update(key.as_bytes());
        hasher.update(b":");
        hasher.update(value.to_hex().as_bytes());
    }
    Fingerprint::new(*hasher.finalize().as_bytes())
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

impl AsRef<[u8; 32]> for Fingerprint {
    fn as_ref(&self) -> &[u8; 32] {
        &self.0
    }
}

impl serde::Serialize for Fingerprint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> serde::Deserialize<'de> for Fingerprint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct FingerprintVisitor;

        impl serde::de::Visitor<'_> for FingerprintVisitor {
            type Value = Fingerprint;

            fn expecting(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
                formatter.write_str("a 32-byte fingerprint as hex string or bytes")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                value.parse().map_err(serde::de::Error::custom)
            }

            fn visit_bytes<E>(self, value: &[u8]) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Fingerprint::from_slice(value).map_err(serde::de::Error::custom)
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_str(FingerprintVisitor)
        } else {
            deserializer.deserialize_bytes(FingerprintVisitor)
        }
    }
}

/// Errors that can occur when decoding fingerprints
#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    /// Invalid digest length
    #[error("invalid fingerprint length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Hex decoding error
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn fp(tag: &str) -> Fingerprint {
        Fingerprint::compute(tag.as_bytes())
    }

    #[test]
    fn fingerprint_without_parents_is_deterministic() {
        let empty: [(&str, &Fingerprint); 0] = [];
        let a = fingerprint("{\"q\":\"rust\"}", empty);
        let b = fingerprint("{\"q\":\"rust\"}", empty);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_ignores_parent_insertion_order() {
        let (g, r) = (fp("gather"), fp("rename"));
        let forward = fingerprint("x", [("gather", &g), ("rename", &r)]);
        let reverse = fingerprint("x", [("rename", &r), ("gather", &g)]);

        let mut map = HashMap::new();
        map.insert("rename".to_string(), r);
        map.insert("gather".to_string(), g);
        let from_map = fingerprint("x", map.iter());

        assert_eq!(forward, reverse);
        assert_eq!(forward, from_map);
    }

    #[test]
    fn fingerprint_changes_with_parent_value() {
        let a = fingerprint("x", [("search", &fp("v1"))]);
        let b = fingerprint("x", [("search", &fp("v2"))]);
        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_changes_with_content() {
        let parent = fp("p");
        assert_ne!(
            fingerprint("a", [("p", &parent)]),
            fingerprint("b", [("p", &parent)])
        );
    }

    #[test]
    fn parents_are_not_confused_with_content() {
        let parent = fp("p");
        let with_parent = fingerprint("c", [("p", &parent)]);
        let empty: [(&str, &Fingerprint); 0] = [];
        let inlined = fingerprint(&format!("cp:{parent}"), empty);
        assert_ne!(with_parent, inlined);
    }

    #[test]
    fn sorted_and_unsorted_entry_points_agree() {
        let mut parents = ParentFingerprints::new();
        parents.insert("b".into(), fp("b"));
        parents.insert("a".into(), fp("a"));
        assert_eq!(
            fingerprint_sorted("c", &parents),
            fingerprint("c", parents.iter())
        );
    }

    #[test]
    fn display_and_parse() {
        let f = fp("test");
        let parsed: Fingerprint = f.to_string().parse().unwrap();
        assert_eq!(f, parsed);
        assert_eq!(f.to_string().len(), 64);
        assert!(f.to_string().starts_with(&f.short()));
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        let result = Fingerprint::from_slice(&[1u8; 31]);
        assert!(matches!(
            result,
            Err(FingerprintError::InvalidLength { expected: 32, actual: 31 })
        ));
    }

    #[test]
    fn parse_rejects_bad_hex() {
        assert!(matches!(
            "zz".parse::<Fingerprint>(),
            Err(FingerprintError::HexDecode(_))
        ));
    }

    #[test]
    fn serde_json_uses_hex_string() {
        let f = fp("test");
        let json = serde_json::to_string(&f).unwrap();
        assert_eq!(json, format!("\"{f}\""));
        let decoded: Fingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(f, decoded);
    }
}
