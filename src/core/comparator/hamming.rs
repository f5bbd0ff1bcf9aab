//! Hamming distance between hex-encoded hashes.

use crate::core::hasher::bits::HASH_HEX_LEN;
use crate::error::HashError;

/// Count the differing bits between two hex hashes.
///
/// Both inputs are validated first: non-empty, even length, at most
/// 64 characters, hex digits only. The shorter byte sequence is
/// left-padded with zero bytes before the byte-wise XOR, so the result is
/// a metric over the padded bit vectors.
pub fn hamming_distance(hex_a: &str, hex_b: &str) -> Result<u32, HashError> {
    let a = decode_hash(hex_a)?;
    let b = decode_hash(hex_b)?;

    let len = a.len().max(b.len());
    let distance = left_padded(&a, len)
        .zip(left_padded(&b, len))
        .map(|(x, y)| (x ^ y).count_ones())
        .sum();

    Ok(distance)
}

fn left_padded(bytes: &[u8], len: usize) -> impl Iterator<Item = u8> + '_ {
    std::iter::repeat(0u8)
        .take(len - bytes.len())
        .chain(bytes.iter().copied())
}

fn decode_hash(value: &str) -> Result<Vec<u8>, HashError> {
    let invalid = |reason: &str| HashError::InvalidHex {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    if value.is_empty() {
        return Err(invalid("empty hash"));
    }
    if value.len() > HASH_HEX_LEN {
        return Err(invalid("longer than 64 characters"));
    }
    if value.len() % 2 != 0 {
        return Err(invalid("odd number of hex digits"));
    }

    hex::decode(value).map_err(|e| invalid(&e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        let hash = "0123456789abcdef".repeat(4);
        assert_eq!(hamming_distance(&hash, &hash).unwrap(), 0);
        assert_eq!(hamming_distance("beef", "beef").unwrap(), 0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = "f0".repeat(32);
        let b = "3c".repeat(32);
        assert_eq!(
            hamming_distance(&a, &b).unwrap(),
            hamming_distance(&b, &a).unwrap()
        );
    }

    #[test]
    fn distance_counts_differing_bits() {
        assert_eq!(hamming_distance("ff", "00").unwrap(), 8);
        assert_eq!(hamming_distance("0f0f", "0f0e").unwrap(), 1);
        assert_eq!(hamming_distance(&"f".repeat(64), &"0".repeat(64)).unwrap(), 256);
    }

    #[test]
    fn case_does_not_matter() {
        assert_eq!(hamming_distance("ABCD", "abcd").unwrap(), 0);
    }

    #[test]
    fn shorter_input_is_left_padded() {
        // "ff" is treated as "00ff"
        assert_eq!(hamming_distance("ff", "00ff").unwrap(), 0);
        assert_eq!(hamming_distance("ff", "ffff").unwrap(), 8);
    }

    #[test]
    fn satisfies_triangle_inequality() {
        let a = "a5a5";
        let b = "0ff0";
        let c = "ffff";
        let ab = hamming_distance(a, b).unwrap();
        let bc = hamming_distance(b, c).unwrap();
        let ac = hamming_distance(a, c).unwrap();
        assert!(ac <= ab + bc);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(hamming_distance("", "00").is_err());
        assert!(hamming_distance("abc", "abc").is_err());
        assert!(hamming_distance("zz", "00").is_err());
        assert!(hamming_distance(&"0".repeat(66), "00").is_err());
    }
}
