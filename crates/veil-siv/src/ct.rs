//! Constant-time comparisons.
//!
//! Execution time depends only on input length, never on content; tag
//! verification must not leak which byte differed.

use subtle::ConstantTimeEq;

/// Constant-time comparison of byte slices.
///
/// Returns `true` if the slices are equal, `false` otherwise.
#[must_use]
pub(crate) fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.ct_eq(b).into()
}

/// Timing-safe 16-byte tag comparison.
#[must_use]
#[inline(never)]
pub(crate) fn verify_16(a: &[u8; 16], b: &[u8; 16]) -> bool {
    ct_eq(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ct_eq_same() {
        assert!(ct_eq(&[1u8; 32], &[1u8; 32]));
    }

    #[test]
    fn test_ct_eq_different() {
        assert!(!ct_eq(&[1u8; 32], &[2u8; 32]));
    }

    #[test]
    fn test_ct_eq_different_lengths() {
        assert!(!ct_eq(&[1u8; 32], &[1u8; 16]));
    }

    #[test]
    fn test_verify_16() {
        let a = [0x42u8; 16];
        let b = [0x42u8; 16];
        let mut c = [0x42u8; 16];
        c[15] ^= 0x01;

        assert!(verify_16(&a, &b));
        assert!(!verify_16(&a, &c));
    }
}
