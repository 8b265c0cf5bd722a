//! Hardware-accelerated engine for x86-64.
//!
//! Every function in this module requires the AES-NI, PCLMULQDQ, and SSSE3
//! instruction sets. Callers check [`is_available`] once at construction
//! time; after that the `unsafe` calls into this module are sound.

pub(crate) mod aes;
pub(crate) mod polyval;

use core::arch::x86_64::*;

use crate::BLOCK_SIZE;

/// Runtime capability query for the accelerated engine.
pub(crate) fn is_available() -> bool {
    std::arch::is_x86_feature_detected!("aes")
        && std::arch::is_x86_feature_detected!("pclmulqdq")
        && std::arch::is_x86_feature_detected!("ssse3")
}

/// Unaligned load of the `block`-th 16-byte block of `bytes`.
///
/// # Safety
///
/// `bytes` must hold at least `(block + 1) * 16` bytes.
#[inline]
pub(crate) unsafe fn load_block(bytes: &[u8], block: usize) -> __m128i {
    debug_assert!(bytes.len() >= (block + 1) * BLOCK_SIZE);
    unsafe { _mm_loadu_si128(bytes.as_ptr().add(block * BLOCK_SIZE) as *const __m128i) }
}

/// Unaligned store to the `block`-th 16-byte block of `bytes`.
///
/// # Safety
///
/// `bytes` must hold at least `(block + 1) * 16` bytes.
#[inline]
pub(crate) unsafe fn store_block(bytes: &mut [u8], block: usize, v: __m128i) {
    debug_assert!(bytes.len() >= (block + 1) * BLOCK_SIZE);
    unsafe { _mm_storeu_si128(bytes.as_mut_ptr().add(block * BLOCK_SIZE) as *mut __m128i, v) }
}
