//! # Record Module
//!
//! The persisted fingerprint of one image.
//!
//! Besides the three whole hashes, the pHash is stored again as sixteen
//! 4-character slices. The slices are a pure decomposition of `phash`
//! (`block[i] = phash[i*4 .. i*4+4]`), kept in their own columns so a
//! store can index them and pre-filter candidate matches cheaply.

use crate::core::hasher::bits::{validate_hex, HASH_HEX_LEN};
use crate::error::HashError;
use serde::{Deserialize, Serialize};

/// Identifier of an image row
pub type ImageId = i64;

/// Number of pHash block slices
pub const PHASH_BLOCK_COUNT: usize = 16;

/// Hex characters per pHash block slice (16 bits)
pub const BLOCK_HEX_LEN: usize = HASH_HEX_LEN / PHASH_BLOCK_COUNT;

/// The sixteen ordered slices of a pHash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhashBlocks([String; PHASH_BLOCK_COUNT]);

impl PhashBlocks {
    /// Slice a 64-character pHash into its blocks
    pub fn decompose(phash: &str) -> Result<Self, HashError> {
        validate_hex(phash, HASH_HEX_LEN)?;

        let blocks = std::array::from_fn(|i| {
            phash[i * BLOCK_HEX_LEN..(i + 1) * BLOCK_HEX_LEN].to_ascii_lowercase()
        });
        Ok(Self(blocks))
    }

    /// Rebuild from stored slices, checking each one
    pub fn from_slices(blocks: [String; PHASH_BLOCK_COUNT]) -> Result<Self, HashError> {
        for block in &blocks {
            validate_hex(block, BLOCK_HEX_LEN)?;
        }
        Ok(Self(blocks.map(|b| b.to_ascii_lowercase())))
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Concatenate the slices back into the full pHash
    pub fn concat(&self) -> String {
        self.0.concat()
    }
}

/// The hashes derived from one image's pixels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageHashes {
    pub ahash: String,
    pub dhash: String,
    pub phash: String,
    pub phash_blocks: PhashBlocks,
}

impl ImageHashes {
    /// Validate the three hashes and decompose the pHash
    pub fn new(ahash: String, dhash: String, phash: String) -> Result<Self, HashError> {
        validate_hex(&ahash, HASH_HEX_LEN)?;
        validate_hex(&dhash, HASH_HEX_LEN)?;
        let phash_blocks = PhashBlocks::decompose(&phash)?;

        Ok(Self {
            ahash: ahash.to_ascii_lowercase(),
            dhash: dhash.to_ascii_lowercase(),
            phash: phash.to_ascii_lowercase(),
            phash_blocks,
        })
    }

    /// Rebuild from stored columns, rejecting blocks that disagree with `phash`
    pub fn from_stored(
        ahash: String,
        dhash: String,
        phash: String,
        blocks: [String; PHASH_BLOCK_COUNT],
    ) -> Result<Self, HashError> {
        let hashes = Self::new(ahash, dhash, phash)?;
        let stored = PhashBlocks::from_slices(blocks)?;

        if stored != hashes.phash_blocks {
            return Err(HashError::InvalidHex {
                value: stored.concat(),
                reason: format!("block slices do not reproduce phash {}", hashes.phash),
            });
        }
        Ok(hashes)
    }

    /// Attach the hashes to an image
    pub fn into_record(self, image_id: ImageId) -> ImageHashRecord {
        ImageHashRecord {
            image_id,
            hashes: self,
        }
    }
}

/// One row of persisted hashes, keyed by image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageHashRecord {
    pub image_id: ImageId,
    #[serde(flatten)]
    pub hashes: ImageHashes,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_phash() -> String {
        "0123456789abcdef".repeat(4)
    }

    #[test]
    fn blocks_are_fixed_position_slices() {
        let blocks = PhashBlocks::decompose(&sample_phash()).unwrap();

        assert_eq!(blocks.get(0), Some("0123"));
        assert_eq!(blocks.get(1), Some("4567"));
        assert_eq!(blocks.get(15), Some("cdef"));
        assert_eq!(blocks.get(16), None);
    }

    #[test]
    fn blocks_concatenate_to_phash() {
        let phash = sample_phash();
        let blocks = PhashBlocks::decompose(&phash).unwrap();

        assert_eq!(blocks.concat(), phash);
        assert_eq!(blocks.iter().count(), PHASH_BLOCK_COUNT);
    }

    #[test]
    fn decompose_rejects_short_hash() {
        assert!(PhashBlocks::decompose("abcd").is_err());
    }

    #[test]
    fn hashes_are_normalised_to_lowercase() {
        let hashes = ImageHashes::new(
            "AB".repeat(32),
            "cd".repeat(32),
            sample_phash().to_uppercase(),
        )
        .unwrap();

        assert_eq!(hashes.ahash, "ab".repeat(32));
        assert_eq!(hashes.phash, sample_phash());
        assert_eq!(hashes.phash_blocks.concat(), hashes.phash);
    }

    #[test]
    fn stored_blocks_must_match_phash() {
        let mut blocks = PhashBlocks::decompose(&sample_phash()).unwrap().0;
        blocks[3] = "ffff".to_string();

        let result = ImageHashes::from_stored(
            "00".repeat(32),
            "00".repeat(32),
            sample_phash(),
            blocks,
        );
        assert!(result.is_err());
    }

    #[test]
    fn record_serializes_flat() {
        let record = ImageHashes::new("00".repeat(32), "11".repeat(32), sample_phash())
            .unwrap()
            .into_record(7);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["image_id"], 7);
        assert_eq!(json["ahash"], "00".repeat(32));
        assert_eq!(json["phash_blocks"][0], "0123");
    }
}
