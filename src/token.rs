//! Ring token computation.
//!
//! Tokens place slots on the consistent-hash ring. The computation is a pure
//! function of `(slot_index, ring_size, rack)`: slots of one rack are spaced
//! evenly across the 64-bit hash space, then shifted by a stable hash of the
//! rack name so that independently numbered clusters in different regions do
//! not land on identical ring positions.

use crate::error::{Result, WardenError};
use sha2::{Digest, Sha256};

/// Size of the token space. Tokens are values in `[0, 2^64)`.
const TOKEN_SPAN: u128 = 1 << 64;

/// Stable hash of a rack/region name, used as an additive offset on slot
/// indices for multi-region uniqueness.
pub fn region_offset(rack: &str) -> u32 {
    let digest = Sha256::digest(rack.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Compute the ring token for a slot.
///
/// Deterministic: identical inputs always produce identical tokens, and for
/// any `ring_size > 0` the tokens of `slot_index in [0, ring_size)` are
/// pairwise distinct.
///
/// # Errors
///
/// Returns [`WardenError::InvalidArgument`] when `ring_size <= 0` or
/// `slot_index < 0`. No silent clamping.
pub fn create_token(slot_index: i64, ring_size: i64, rack: &str) -> Result<String> {
    if ring_size <= 0 {
        return Err(WardenError::InvalidArgument(format!(
            "ring size must be positive, got {}",
            ring_size
        )));
    }
    if slot_index < 0 {
        return Err(WardenError::InvalidArgument(format!(
            "slot index must be non-negative, got {}",
            slot_index
        )));
    }

    let spacing = TOKEN_SPAN / ring_size as u128;
    let token =
        (spacing * slot_index as u128 + region_offset(rack) as u128) % TOKEN_SPAN;
    Ok(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn deterministic() {
        let a = create_token(3, 12, "us-east-1a").unwrap();
        let b = create_token(3, 12, "us-east-1a").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn tokens_distinct_within_ring() {
        for ring_size in [1i64, 2, 3, 7, 16, 100] {
            let tokens: HashSet<String> = (0..ring_size)
                .map(|i| create_token(i, ring_size, "us-east-1a").unwrap())
                .collect();
            assert_eq!(tokens.len(), ring_size as usize, "ring_size={}", ring_size);
        }
    }

    #[test]
    fn rack_changes_token() {
        let a = create_token(0, 4, "us-east-1a").unwrap();
        let b = create_token(0, 4, "us-west-2a").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn even_spacing_within_rack() {
        let ring_size = 8i64;
        let spacing = (1u128 << 64) / ring_size as u128;
        let t0: u128 = create_token(0, ring_size, "us-east-1a").unwrap().parse().unwrap();
        let t1: u128 = create_token(1, ring_size, "us-east-1a").unwrap().parse().unwrap();
        assert_eq!(t1 - t0, spacing);
    }

    #[test]
    fn region_offset_is_stable() {
        assert_eq!(region_offset("us-east-1a"), region_offset("us-east-1a"));
        assert_ne!(region_offset("us-east-1a"), region_offset("eu-west-1b"));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(matches!(
            create_token(0, 0, "us-east-1a"),
            Err(WardenError::InvalidArgument(_))
        ));
        assert!(matches!(
            create_token(-1, 4, "us-east-1a"),
            Err(WardenError::InvalidArgument(_))
        ));
    }
}
