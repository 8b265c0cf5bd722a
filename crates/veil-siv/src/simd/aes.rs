//! AES-256 on the AES-NI instruction set.
//!
//! The key schedule derives each round key with `aesenclast` against a
//! shuffled copy of the previous key, so no S-box tables live in memory.
//! The counter-mode routines pipeline 4 or 8 independent blocks through
//! the round loop to cover the `aesenc` latency.

use core::arch::x86_64::*;

use super::{load_block, store_block};
use crate::{BLOCK_SIZE, ROUND_KEYS_SIZE};

#[inline]
fn nonce_words(nonce: &[u8; 12]) -> (i32, i32, i32) {
    (
        i32::from_le_bytes([nonce[0], nonce[1], nonce[2], nonce[3]]),
        i32::from_le_bytes([nonce[4], nonce[5], nonce[6], nonce[7]]),
        i32::from_le_bytes([nonce[8], nonce[9], nonce[10], nonce[11]]),
    )
}

/// Expands the AES-256 key into 15 round keys.
///
/// # Safety
///
/// The CPU must support AES-NI and SSSE3.
#[target_feature(enable = "aes,ssse3")]
pub(crate) unsafe fn key_schedule(key: &[u8; 32], ks: &mut [u8; ROUND_KEYS_SIZE]) {
    unsafe {
        let mask = _mm_set_epi32(0x0c0f_0e0d, 0x0c0f_0e0d, 0x0c0f_0e0d, 0x0c0f_0e0d);
        let mut con1 = _mm_set_epi32(1, 1, 1, 1);
        let con3 = _mm_set_epi8(7, 6, 5, 4, 7, 6, 5, 4, -1, -1, -1, -1, -1, -1, -1, -1);
        let zero = _mm_setzero_si128();

        let mut xmm1 = _mm_loadu_si128(key.as_ptr() as *const __m128i);
        let mut xmm3 = _mm_loadu_si128(key.as_ptr().add(BLOCK_SIZE) as *const __m128i);
        store_block(ks, 0, xmm1);
        store_block(ks, 1, xmm3);

        for i in 0..6 {
            let mut xmm2 = _mm_shuffle_epi8(xmm3, mask);
            xmm2 = _mm_aesenclast_si128(xmm2, con1);
            con1 = _mm_slli_epi64::<1>(con1);
            let mut xmm4 = _mm_slli_epi64::<32>(xmm1);
            xmm1 = _mm_xor_si128(xmm1, xmm4);
            xmm4 = _mm_shuffle_epi8(xmm1, con3);
            xmm1 = _mm_xor_si128(xmm1, xmm4);
            xmm1 = _mm_xor_si128(xmm1, xmm2);
            store_block(ks, (i + 1) * 2, xmm1);

            let mut xmm2 = _mm_shuffle_epi32::<0xff>(xmm1);
            xmm2 = _mm_aesenclast_si128(xmm2, zero);
            let mut xmm4 = _mm_slli_epi64::<32>(xmm3);
            xmm3 = _mm_xor_si128(xmm4, xmm3);
            xmm4 = _mm_shuffle_epi8(xmm3, con3);
            xmm3 = _mm_xor_si128(xmm4, xmm3);
            xmm3 = _mm_xor_si128(xmm2, xmm3);
            store_block(ks, (i + 1) * 2 + 1, xmm3);
        }

        let mut xmm2 = _mm_shuffle_epi8(xmm3, mask);
        xmm2 = _mm_aesenclast_si128(xmm2, con1);
        let mut xmm4 = _mm_slli_epi64::<32>(xmm1);
        xmm1 = _mm_xor_si128(xmm1, xmm4);
        xmm4 = _mm_shuffle_epi8(xmm1, con3);
        xmm1 = _mm_xor_si128(xmm1, xmm4);
        xmm1 = _mm_xor_si128(xmm1, xmm2);
        store_block(ks, 14, xmm1);
    }
}

/// Runs the per-nonce KDF: six counter blocks are encrypted under the
/// expanded record key and the low half of each becomes key material.
/// Blocks 0-1 form the 16-byte POLYVAL key, blocks 2-5 the 32-byte
/// encryption key.
///
/// # Safety
///
/// The CPU must support AES-NI and SSSE3.
#[target_feature(enable = "aes,ssse3")]
pub(crate) unsafe fn derive_keys(
    nonce: &[u8; 12],
    ks: &[u8; ROUND_KEYS_SIZE],
    hash_key: &mut [u8; 16],
    enc_key: &mut [u8; 32],
) {
    unsafe {
        let (n0, n1, n2) = nonce_words(nonce);
        let one = _mm_set_epi32(0, 0, 0, 1);

        let mut b1 = _mm_set_epi32(n2, n1, n0, 0);
        let mut b2 = _mm_add_epi32(b1, one);
        let mut b3 = _mm_add_epi32(b2, one);
        let mut b4 = _mm_add_epi32(b3, one);
        let mut b5 = _mm_add_epi32(b4, one);
        let mut b6 = _mm_add_epi32(b5, one);

        let mut xmm1 = load_block(ks, 0);
        let mut xmm3 = load_block(ks, 1);

        b1 = _mm_xor_si128(b1, xmm1);
        b2 = _mm_xor_si128(b2, xmm1);
        b3 = _mm_xor_si128(b3, xmm1);
        b4 = _mm_xor_si128(b4, xmm1);
        b5 = _mm_xor_si128(b5, xmm1);
        b6 = _mm_xor_si128(b6, xmm1);

        b1 = _mm_aesenc_si128(b1, xmm3);
        b2 = _mm_aesenc_si128(b2, xmm3);
        b3 = _mm_aesenc_si128(b3, xmm3);
        b4 = _mm_aesenc_si128(b4, xmm3);
        b5 = _mm_aesenc_si128(b5, xmm3);
        b6 = _mm_aesenc_si128(b6, xmm3);

        for i in 1..=6 {
            xmm1 = load_block(ks, 2 * i);
            xmm3 = load_block(ks, 2 * i + 1);

            b1 = _mm_aesenc_si128(b1, xmm1);
            b2 = _mm_aesenc_si128(b2, xmm1);
            b3 = _mm_aesenc_si128(b3, xmm1);
            b4 = _mm_aesenc_si128(b4, xmm1);
            b5 = _mm_aesenc_si128(b5, xmm1);
            b6 = _mm_aesenc_si128(b6, xmm1);

            b1 = _mm_aesenc_si128(b1, xmm3);
            b2 = _mm_aesenc_si128(b2, xmm3);
            b3 = _mm_aesenc_si128(b3, xmm3);
            b4 = _mm_aesenc_si128(b4, xmm3);
            b5 = _mm_aesenc_si128(b5, xmm3);
            b6 = _mm_aesenc_si128(b6, xmm3);
        }

        xmm1 = load_block(ks, 14);

        b1 = _mm_aesenclast_si128(b1, xmm1);
        b2 = _mm_aesenclast_si128(b2, xmm1);
        b3 = _mm_aesenclast_si128(b3, xmm1);
        b4 = _mm_aesenclast_si128(b4, xmm1);
        b5 = _mm_aesenclast_si128(b5, xmm1);
        b6 = _mm_aesenclast_si128(b6, xmm1);

        _mm_storel_epi64(hash_key.as_mut_ptr() as *mut __m128i, b1);
        _mm_storel_epi64(hash_key.as_mut_ptr().add(8) as *mut __m128i, b2);

        _mm_storel_epi64(enc_key.as_mut_ptr() as *mut __m128i, b3);
        _mm_storel_epi64(enc_key.as_mut_ptr().add(8) as *mut __m128i, b4);
        _mm_storel_epi64(enc_key.as_mut_ptr().add(16) as *mut __m128i, b5);
        _mm_storel_epi64(enc_key.as_mut_ptr().add(24) as *mut __m128i, b6);
    }
}

/// Expands `key` into `ks` while simultaneously encrypting the single
/// block in `pt` to `ct`. The schedule and the block encryption share the
/// round-key pipeline, which saves a full pass on the encrypt path where
/// the tag is the first block ever encrypted under the derived key.
///
/// # Safety
///
/// The CPU must support AES-NI and SSSE3.
#[target_feature(enable = "aes,ssse3")]
pub(crate) unsafe fn encrypt_tag(
    pt: &[u8; 16],
    ct: &mut [u8; 16],
    key: &[u8; 32],
    ks: &mut [u8; ROUND_KEYS_SIZE],
) {
    unsafe {
        let mask = _mm_set_epi32(0x0c0f_0e0d, 0x0c0f_0e0d, 0x0c0f_0e0d, 0x0c0f_0e0d);
        let mut con1 = _mm_set_epi32(1, 1, 1, 1);
        let con3 = _mm_set_epi8(7, 6, 5, 4, 7, 6, 5, 4, -1, -1, -1, -1, -1, -1, -1, -1);
        let zero = _mm_setzero_si128();

        let mut xmm1 = _mm_loadu_si128(key.as_ptr() as *const __m128i);
        let mut xmm3 = _mm_loadu_si128(key.as_ptr().add(BLOCK_SIZE) as *const __m128i);
        store_block(ks, 0, xmm1);
        let mut b1 = _mm_loadu_si128(pt.as_ptr() as *const __m128i);
        b1 = _mm_xor_si128(b1, xmm1);
        b1 = _mm_aesenc_si128(b1, xmm3);
        store_block(ks, 1, xmm3);

        for i in 0..6 {
            let mut xmm2 = _mm_shuffle_epi8(xmm3, mask);
            xmm2 = _mm_aesenclast_si128(xmm2, con1);
            con1 = _mm_slli_epi64::<1>(con1);
            let mut xmm4 = _mm_slli_epi64::<32>(xmm1);
            xmm1 = _mm_xor_si128(xmm1, xmm4);
            xmm4 = _mm_shuffle_epi8(xmm1, con3);
            xmm1 = _mm_xor_si128(xmm1, xmm4);
            xmm1 = _mm_xor_si128(xmm1, xmm2);
            store_block(ks, (i + 1) * 2, xmm1);
            b1 = _mm_aesenc_si128(b1, xmm1);

            let mut xmm2 = _mm_shuffle_epi32::<0xff>(xmm1);
            xmm2 = _mm_aesenclast_si128(xmm2, zero);
            let mut xmm4 = _mm_slli_epi64::<32>(xmm3);
            xmm3 = _mm_xor_si128(xmm4, xmm3);
            xmm4 = _mm_shuffle_epi8(xmm3, con3);
            xmm3 = _mm_xor_si128(xmm4, xmm3);
            xmm3 = _mm_xor_si128(xmm2, xmm3);
            store_block(ks, (i + 1) * 2 + 1, xmm3);
            b1 = _mm_aesenc_si128(b1, xmm3);
        }

        let mut xmm2 = _mm_shuffle_epi8(xmm3, mask);
        xmm2 = _mm_aesenclast_si128(xmm2, con1);
        let mut xmm4 = _mm_slli_epi64::<32>(xmm1);
        xmm1 = _mm_xor_si128(xmm1, xmm4);
        xmm4 = _mm_shuffle_epi8(xmm1, con3);
        xmm1 = _mm_xor_si128(xmm1, xmm4);
        xmm1 = _mm_xor_si128(xmm1, xmm2);
        store_block(ks, 14, xmm1);
        b1 = _mm_aesenclast_si128(b1, xmm1);
        _mm_storeu_si128(ct.as_mut_ptr() as *mut __m128i, b1);
    }
}

/// Encrypts a single block with the expanded key in `ks`.
///
/// # Safety
///
/// The CPU must support AES-NI.
#[target_feature(enable = "aes")]
pub(crate) unsafe fn encrypt_block(pt: &[u8; 16], ct: &mut [u8; 16], ks: &[u8; ROUND_KEYS_SIZE]) {
    unsafe {
        let mut block = _mm_loadu_si128(pt.as_ptr() as *const __m128i);
        block = _mm_xor_si128(block, load_block(ks, 0));

        for i in 1..14 {
            block = _mm_aesenc_si128(block, load_block(ks, i));
        }

        block = _mm_aesenclast_si128(block, load_block(ks, 14));
        _mm_storeu_si128(ct.as_mut_ptr() as *mut __m128i, block);
    }
}

#[inline]
#[target_feature(enable = "aes")]
pub(super) unsafe fn encrypt_one(block: __m128i, ks: &[u8; ROUND_KEYS_SIZE]) -> __m128i {
    unsafe {
        let mut tmp = _mm_xor_si128(block, load_block(ks, 0));

        for i in 1..14 {
            tmp = _mm_aesenc_si128(tmp, load_block(ks, i));
        }

        _mm_aesenclast_si128(tmp, load_block(ks, 14))
    }
}

#[inline]
#[target_feature(enable = "aes")]
unsafe fn ctr_tail(
    pt: &[u8],
    ct: &mut [u8],
    tail_pos: usize,
    ctr: __m128i,
    ks: &[u8; ROUND_KEYS_SIZE],
) {
    unsafe {
        let remainder = pt.len() - tail_pos;
        if remainder == 0 {
            return;
        }

        let mut b = [0u8; BLOCK_SIZE];
        b[..remainder].copy_from_slice(&pt[tail_pos..]);

        let stream = encrypt_one(ctr, ks);
        let block = _mm_loadu_si128(b.as_ptr() as *const __m128i);
        _mm_storeu_si128(b.as_mut_ptr() as *mut __m128i, _mm_xor_si128(stream, block));

        ct[tail_pos..].copy_from_slice(&b[..remainder]);
    }
}

/// Counter-mode encryption of `pt` into `ct`, 4 blocks at a time. The
/// initial counter is the tag with the top bit of the last byte set; only
/// the low 32-bit lane increments, wrapping modulo 2^32.
///
/// # Safety
///
/// The CPU must support AES-NI. `pt` and `ct` must be the same length.
#[target_feature(enable = "aes")]
pub(crate) unsafe fn ctr_encrypt4(pt: &[u8], ct: &mut [u8], tag: &[u8; 16], ks: &[u8; ROUND_KEYS_SIZE]) {
    debug_assert_eq!(pt.len(), ct.len());

    if pt.is_empty() {
        return;
    }

    unsafe {
        let blocks = pt.len() / BLOCK_SIZE;
        let wide_blocks = blocks - blocks % 4;

        let or_mask = _mm_set_epi32(0x8000_0000_u32 as i32, 0, 0, 0);
        let mut ctr = _mm_or_si128(_mm_loadu_si128(tag.as_ptr() as *const __m128i), or_mask);

        let one = _mm_set_epi32(0, 0, 0, 1);
        let two = _mm_set_epi32(0, 0, 0, 2);

        let mut i = 0;
        while i < wide_blocks {
            let mut tmp0 = ctr;
            let mut tmp1 = _mm_add_epi32(ctr, one);
            let mut tmp2 = _mm_add_epi32(ctr, two);
            let mut tmp3 = _mm_add_epi32(tmp2, one);
            ctr = _mm_add_epi32(tmp2, two);

            let mut key = load_block(ks, 0);
            tmp0 = _mm_xor_si128(tmp0, key);
            tmp1 = _mm_xor_si128(tmp1, key);
            tmp2 = _mm_xor_si128(tmp2, key);
            tmp3 = _mm_xor_si128(tmp3, key);

            for j in 1..14 {
                key = load_block(ks, j);
                tmp0 = _mm_aesenc_si128(tmp0, key);
                tmp1 = _mm_aesenc_si128(tmp1, key);
                tmp2 = _mm_aesenc_si128(tmp2, key);
                tmp3 = _mm_aesenc_si128(tmp3, key);
            }

            key = load_block(ks, 14);
            tmp0 = _mm_aesenclast_si128(tmp0, key);
            tmp1 = _mm_aesenclast_si128(tmp1, key);
            tmp2 = _mm_aesenclast_si128(tmp2, key);
            tmp3 = _mm_aesenclast_si128(tmp3, key);

            tmp0 = _mm_xor_si128(tmp0, load_block(pt, i));
            tmp1 = _mm_xor_si128(tmp1, load_block(pt, i + 1));
            tmp2 = _mm_xor_si128(tmp2, load_block(pt, i + 2));
            tmp3 = _mm_xor_si128(tmp3, load_block(pt, i + 3));

            store_block(ct, i, tmp0);
            store_block(ct, i + 1, tmp1);
            store_block(ct, i + 2, tmp2);
            store_block(ct, i + 3, tmp3);

            i += 4;
        }

        for i in wide_blocks..blocks {
            let tmp = ctr;
            ctr = _mm_add_epi32(ctr, one);
            let out = _mm_xor_si128(encrypt_one(tmp, ks), load_block(pt, i));
            store_block(ct, i, out);
        }

        ctr_tail(pt, ct, blocks * BLOCK_SIZE, ctr, ks);
    }
}

/// Counter-mode encryption of `pt` into `ct`, 8 blocks at a time.
///
/// # Safety
///
/// The CPU must support AES-NI. `pt` and `ct` must be the same length.
#[target_feature(enable = "aes")]
pub(crate) unsafe fn ctr_encrypt8(pt: &[u8], ct: &mut [u8], tag: &[u8; 16], ks: &[u8; ROUND_KEYS_SIZE]) {
    debug_assert_eq!(pt.len(), ct.len());

    if pt.is_empty() {
        return;
    }

    unsafe {
        let blocks = pt.len() / BLOCK_SIZE;
        let wide_blocks = blocks - blocks % 8;

        let or_mask = _mm_set_epi32(0x8000_0000_u32 as i32, 0, 0, 0);
        let mut ctr = _mm_or_si128(_mm_loadu_si128(tag.as_ptr() as *const __m128i), or_mask);

        let one = _mm_set_epi32(0, 0, 0, 1);
        let two = _mm_set_epi32(0, 0, 0, 2);

        let mut i = 0;
        while i < wide_blocks {
            let mut tmp0 = ctr;
            let mut tmp1 = _mm_add_epi32(ctr, one);
            let mut tmp2 = _mm_add_epi32(ctr, two);
            let mut tmp3 = _mm_add_epi32(tmp2, one);
            let mut tmp4 = _mm_add_epi32(tmp2, two);
            let mut tmp5 = _mm_add_epi32(tmp4, one);
            let mut tmp6 = _mm_add_epi32(tmp4, two);
            let mut tmp7 = _mm_add_epi32(tmp6, one);
            ctr = _mm_add_epi32(tmp6, two);

            let mut key = load_block(ks, 0);
            tmp0 = _mm_xor_si128(tmp0, key);
            tmp1 = _mm_xor_si128(tmp1, key);
            tmp2 = _mm_xor_si128(tmp2, key);
            tmp3 = _mm_xor_si128(tmp3, key);
            tmp4 = _mm_xor_si128(tmp4, key);
            tmp5 = _mm_xor_si128(tmp5, key);
            tmp6 = _mm_xor_si128(tmp6, key);
            tmp7 = _mm_xor_si128(tmp7, key);

            for j in 1..14 {
                key = load_block(ks, j);
                tmp0 = _mm_aesenc_si128(tmp0, key);
                tmp1 = _mm_aesenc_si128(tmp1, key);
                tmp2 = _mm_aesenc_si128(tmp2, key);
                tmp3 = _mm_aesenc_si128(tmp3, key);
                tmp4 = _mm_aesenc_si128(tmp4, key);
                tmp5 = _mm_aesenc_si128(tmp5, key);
                tmp6 = _mm_aesenc_si128(tmp6, key);
                tmp7 = _mm_aesenc_si128(tmp7, key);
            }

            key = load_block(ks, 14);
            tmp0 = _mm_aesenclast_si128(tmp0, key);
            tmp1 = _mm_aesenclast_si128(tmp1, key);
            tmp2 = _mm_aesenclast_si128(tmp2, key);
            tmp3 = _mm_aesenclast_si128(tmp3, key);
            tmp4 = _mm_aesenclast_si128(tmp4, key);
            tmp5 = _mm_aesenclast_si128(tmp5, key);
            tmp6 = _mm_aesenclast_si128(tmp6, key);
            tmp7 = _mm_aesenclast_si128(tmp7, key);

            tmp0 = _mm_xor_si128(tmp0, load_block(pt, i));
            tmp1 = _mm_xor_si128(tmp1, load_block(pt, i + 1));
            tmp2 = _mm_xor_si128(tmp2, load_block(pt, i + 2));
            tmp3 = _mm_xor_si128(tmp3, load_block(pt, i + 3));
            tmp4 = _mm_xor_si128(tmp4, load_block(pt, i + 4));
            tmp5 = _mm_xor_si128(tmp5, load_block(pt, i + 5));
            tmp6 = _mm_xor_si128(tmp6, load_block(pt, i + 6));
            tmp7 = _mm_xor_si128(tmp7, load_block(pt, i + 7));

            store_block(ct, i, tmp0);
            store_block(ct, i + 1, tmp1);
            store_block(ct, i + 2, tmp2);
            store_block(ct, i + 3, tmp3);
            store_block(ct, i + 4, tmp4);
            store_block(ct, i + 5, tmp5);
            store_block(ct, i + 6, tmp6);
            store_block(ct, i + 7, tmp7);

            i += 8;
        }

        for i in wide_blocks..blocks {
            let tmp = ctr;
            ctr = _mm_add_epi32(ctr, one);
            let out = _mm_xor_si128(encrypt_one(tmp, ks), load_block(pt, i));
            store_block(ct, i, out);
        }

        ctr_tail(pt, ct, blocks * BLOCK_SIZE, ctr, ks);
    }
}
