//! Persisted store records and load-time validation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{
    validate_candidate_ratio, validate_kdf, KdfParams, SALT_LENGTH, STORE_FORMAT_VERSION,
};
use crate::crypto::FieldElement;
use crate::error::{StoreError, StoreResult};
use crate::layout::IdLayout;

/// Serde helper for the base64-encoded store salt.
pub mod serde_salt {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::config::SALT_LENGTH;

    pub fn serialize<S>(value: &[u8; SALT_LENGTH], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; SALT_LENGTH], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = STANDARD
            .decode(s.as_bytes())
            .map_err(|e| serde::de::Error::custom(format!("salt is not base64: {e}")))?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom(format!("expected {SALT_LENGTH} bytes of salt")))
    }
}

/// One point of one chunk's sharing polynomial (or garbage posing as one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Share {
    /// Which chunk of the document row this share belongs to.
    pub chunk_index: u32,
    /// The x-coordinate, in `1..=id_space_size`.
    pub share_id: u32,
    /// The y-coordinate.
    pub value: FieldElement,
}

/// Everything about a store that is not a share.
///
/// Nothing in here says which identifiers belong to which partition.
/// `chunk_counts` is keyed by opaque tags, one per role, whether or not a
/// partition actually occupies that role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreMetadata {
    /// Layout version of the persisted JSON.
    pub format_version: u16,
    /// Store-wide Argon2id salt.
    #[serde(with = "serde_salt")]
    pub salt: [u8; SALT_LENGTH],
    /// Shares needed to rebuild one chunk.
    pub threshold: u32,
    /// `N`, the number of identifiers.
    pub id_space_size: u32,
    /// Per-role pool fractions.
    pub partition_ratios: Vec<f64>,
    /// Fraction of a pool kept by Stage 1.
    pub candidate_ratio: f64,
    /// Argon2id cost parameters.
    pub kdf: KdfParams,
    /// Number of share rows. Every chunk index below this holds `N` shares.
    pub chunk_total: u32,
    /// Chunk count per role tag (hex).
    pub chunk_counts: BTreeMap<String, u32>,
    /// When the store was first created.
    pub created_at: DateTime<Utc>,
}

impl StoreMetadata {
    /// The identifier layout these parameters describe.
    pub fn layout(&self) -> StoreResult<IdLayout> {
        IdLayout::new(self.id_space_size, &self.partition_ratios)
    }

    fn validate(&self) -> StoreResult<IdLayout> {
        if self.format_version != STORE_FORMAT_VERSION {
            return Err(StoreError::StoreFormat(format!(
                "unsupported format version {} (expected {STORE_FORMAT_VERSION})",
                self.format_version
            )));
        }
        if self.threshold < 1 {
            return Err(StoreError::StoreFormat("threshold must be >= 1".into()));
        }
        let layout = self.layout().map_err(as_format_error)?;
        validate_candidate_ratio(self.candidate_ratio).map_err(as_format_error)?;
        validate_kdf(&self.kdf).map_err(as_format_error)?;

        if self.chunk_counts.len() != layout.role_count() {
            return Err(StoreError::StoreFormat(format!(
                "{} chunk count entries for {} roles",
                self.chunk_counts.len(),
                layout.role_count()
            )));
        }
        for (tag, &count) in &self.chunk_counts {
            if tag.len() != 64 || hex::decode(tag).is_err() {
                return Err(StoreError::StoreFormat("malformed partition tag".into()));
            }
            if count > self.chunk_total {
                return Err(StoreError::StoreFormat(format!(
                    "chunk count {count} exceeds chunk total {}",
                    self.chunk_total
                )));
            }
        }
        Ok(layout)
    }
}

fn as_format_error(e: StoreError) -> StoreError {
    StoreError::StoreFormat(e.to_string())
}

/// A complete store: metadata plus the shuffled share collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncryptedStore {
    /// Public parameters and partition tags.
    pub metadata: StoreMetadata,
    /// Exactly `chunk_total × id_space_size` shares, in random order.
    pub shares: Vec<Share>,
}

impl EncryptedStore {
    /// Check every structural invariant of a store.
    ///
    /// # Errors
    ///
    /// [`StoreError::StoreFormat`] describing the first violation found.
    pub fn validate(&self) -> StoreResult<()> {
        let meta = &self.metadata;
        meta.validate()?;

        let n = meta.id_space_size as u64;
        let expected = meta.chunk_total as u64 * n;
        if self.shares.len() as u64 != expected {
            return Err(StoreError::StoreFormat(format!(
                "expected {expected} shares, found {}",
                self.shares.len()
            )));
        }

        // Right count and no duplicates means every (chunk, id) slot is filled
        // exactly once.
        let mut seen = vec![false; self.shares.len()];
        for share in &self.shares {
            if share.chunk_index >= meta.chunk_total {
                return Err(StoreError::StoreFormat(format!(
                    "share chunk index {} out of range",
                    share.chunk_index
                )));
            }
            if share.share_id == 0 || share.share_id > meta.id_space_size {
                return Err(StoreError::StoreFormat(format!(
                    "share identifier {} out of range",
                    share.share_id
                )));
            }
            let slot = (share.chunk_index as u64 * n + (share.share_id as u64 - 1)) as usize;
            if std::mem::replace(&mut seen[slot], true) {
                return Err(StoreError::StoreFormat(
                    "duplicate share for the same chunk and identifier".into(),
                ));
            }
        }
        Ok(())
    }

    /// Parse and validate a store from JSON.
    pub fn from_json(json: &str) -> StoreResult<Self> {
        let store: Self = serde_json::from_str(json)?;
        store.validate()?;
        Ok(store)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> StoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::partition_tag;

    fn tiny_store() -> EncryptedStore {
        let salt = [3u8; SALT_LENGTH];
        let mut chunk_counts = BTreeMap::new();
        chunk_counts.insert(partition_tag(b"k", 0, &salt), 1);
        chunk_counts.insert(hex::encode([1u8; 32]), 0);

        let shares = (1..=4)
            .map(|id| Share {
                chunk_index: 0,
                share_id: id,
                value: FieldElement::from_u64(id as u64 * 10),
            })
            .collect();

        EncryptedStore {
            metadata: StoreMetadata {
                format_version: STORE_FORMAT_VERSION,
                salt,
                threshold: 1,
                id_space_size: 4,
                partition_ratios: vec![0.5, 0.5],
                candidate_ratio: 1.0,
                kdf: KdfParams::insecure_fast(),
                chunk_total: 1,
                chunk_counts,
                created_at: Utc::now(),
            },
            shares,
        }
    }

    #[test]
    fn test_valid_store_round_trips_through_json() {
        let store = tiny_store();
        store.validate().unwrap();
        let json = store.to_json().unwrap();
        let back = EncryptedStore::from_json(&json).unwrap();
        assert_eq!(back, store);
    }

    #[test]
    fn test_salt_is_base64() {
        let json = tiny_store().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["metadata"]["salt"].is_string());
        assert!(value["shares"][0]["value"].is_string());
    }

    #[test]
    fn test_missing_share_rejected() {
        let mut store = tiny_store();
        store.shares.pop();
        assert!(matches!(store.validate(), Err(StoreError::StoreFormat(_))));
    }

    #[test]
    fn test_duplicate_share_rejected() {
        let mut store = tiny_store();
        store.shares[1].share_id = 1;
        assert!(matches!(store.validate(), Err(StoreError::StoreFormat(_))));
    }

    #[test]
    fn test_out_of_range_identifier_rejected() {
        let mut store = tiny_store();
        store.shares[3].share_id = 5;
        assert!(matches!(store.validate(), Err(StoreError::StoreFormat(_))));
    }

    #[test]
    fn test_count_above_total_rejected() {
        let mut store = tiny_store();
        for count in store.metadata.chunk_counts.values_mut() {
            *count = 2;
        }
        assert!(matches!(store.validate(), Err(StoreError::StoreFormat(_))));
    }

    #[test]
    fn test_wrong_version_rejected() {
        let mut store = tiny_store();
        store.metadata.format_version = 99;
        assert!(matches!(store.validate(), Err(StoreError::StoreFormat(_))));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let json = tiny_store().to_json().unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["metadata"]["partition_map"] = serde_json::json!({"alice": [1, 2]});
        let tampered = serde_json::to_string(&value).unwrap();
        assert!(matches!(
            EncryptedStore::from_json(&tampered),
            Err(StoreError::StoreFormat(_))
        ));
    }

    #[test]
    fn test_missing_field_rejected() {
        let json = tiny_store().to_json().unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["metadata"]
            .as_object_mut()
            .unwrap()
            .remove("candidate_ratio");
        let tampered = serde_json::to_string(&value).unwrap();
        assert!(EncryptedStore::from_json(&tampered).is_err());
    }

    #[test]
    fn test_value_above_modulus_rejected() {
        let json = tiny_store().to_json().unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["shares"][0]["value"] =
            serde_json::Value::String(crate::crypto::modulus().to_str_radix(10));
        let tampered = serde_json::to_string(&value).unwrap();
        assert!(matches!(
            EncryptedStore::from_json(&tampered),
            Err(StoreError::StoreFormat(_))
        ));
    }

    #[test]
    fn test_short_salt_rejected() {
        let json = tiny_store().to_json().unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["metadata"]["salt"] = serde_json::Value::String("AAAA".into());
        let tampered = serde_json::to_string(&value).unwrap();
        assert!(matches!(
            EncryptedStore::from_json(&tampered),
            Err(StoreError::StoreFormat(_))
        ));
    }

    #[test]
    fn test_truncated_json_rejected() {
        let json = tiny_store().to_json().unwrap();
        let truncated = &json[..json.len() / 2];
        assert!(matches!(
            EncryptedStore::from_json(truncated),
            Err(StoreError::StoreFormat(_))
        ));
    }
}
