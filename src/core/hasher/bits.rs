//! Bit and hex packing for stored hashes.
//!
//! Encoding right-pads (bits to a nibble boundary, hex to 64 characters)
//! while decoding left-pads to the requested bit length. Both directions
//! keep that asymmetry so values written by earlier releases still
//! decode bit-for-bit.

use crate::error::HashError;

/// Number of bits in every persisted hash
pub const HASH_BITS: usize = 256;

/// Number of hex characters in every persisted hash
pub const HASH_HEX_LEN: usize = HASH_BITS / 4;

/// Fit a bit string to exactly [`HASH_BITS`].
///
/// Short inputs are repeated end-to-end, long inputs are truncated.
pub fn fit_to_hash_length(bits: Vec<bool>) -> Result<Vec<bool>, HashError> {
    if bits.is_empty() {
        return Err(HashError::EmptyMatrix);
    }
    if bits.len() == HASH_BITS {
        return Ok(bits);
    }

    Ok(bits.iter().copied().cycle().take(HASH_BITS).collect())
}

/// Pack a bit string into lowercase hex.
///
/// The bits are zero-padded on the right to a multiple of four, then the
/// hex string is zero-padded on the right to [`HASH_HEX_LEN`] characters.
/// Inputs longer than [`HASH_BITS`] produce a longer string; callers fit
/// their bits first.
pub fn bits_to_hex(bits: &[bool]) -> String {
    let mut hex: String = bits
        .chunks(4)
        .map(|nibble| {
            let value = (0..4).fold(0u32, |acc, i| {
                (acc << 1) | u32::from(nibble.get(i).copied().unwrap_or(false))
            });
            // value < 16, always a valid digit
            char::from_digit(value, 16).unwrap_or('0')
        })
        .collect();

    while hex.len() < HASH_HEX_LEN {
        hex.push('0');
    }
    hex
}

/// Expand hex into bits, left-padding with zeros to `bit_length`.
pub fn hex_to_bits(hex: &str, bit_length: usize) -> Result<Vec<bool>, HashError> {
    let mut bits = Vec::with_capacity(bit_length.max(hex.len() * 4));

    for c in hex.chars() {
        let value = c.to_digit(16).ok_or_else(|| HashError::InvalidHex {
            value: hex.to_string(),
            reason: format!("{:?} is not a hex digit", c),
        })?;
        bits.extend((0..4).rev().map(|shift| (value >> shift) & 1 == 1));
    }

    if bits.len() < bit_length {
        let mut padded = vec![false; bit_length - bits.len()];
        padded.extend(bits);
        bits = padded;
    }

    Ok(bits)
}

/// Check that a value is a hex string of exactly `expected_len` characters.
pub fn validate_hex(value: &str, expected_len: usize) -> Result<(), HashError> {
    if value.len() != expected_len {
        return Err(HashError::InvalidHex {
            value: value.to_string(),
            reason: format!("expected {} characters, got {}", expected_len, value.len()),
        });
    }
    if let Some(c) = value.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(HashError::InvalidHex {
            value: value.to_string(),
            reason: format!("{:?} is not a hex digit", c),
        });
    }
    Ok(())
}
