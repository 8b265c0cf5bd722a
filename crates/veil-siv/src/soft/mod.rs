//! Portable software engine.
//!
//! Serial AES-256 and POLYVAL with no instruction-set requirements. The
//! batched hashing strategies only pay off with a hardware carry-less
//! multiplier, so this backend hashes serially regardless of input size.

pub(crate) mod aes;
pub(crate) mod polyval;

pub(crate) use aes::Aes256;
pub(crate) use polyval::Polyval;

use zeroize::Zeroizing;

use crate::NONCE_SIZE;

/// Per-nonce KDF: six counter-prefixed nonce blocks encrypted under the
/// record key, keeping the low 8 bytes of each. Blocks 0-1 form the
/// POLYVAL key, blocks 2-5 the 32-byte encryption key.
pub(crate) fn derive_keys(record: &Aes256, nonce: &[u8; NONCE_SIZE]) -> ([u8; 16], [u8; 32]) {
    let mut hash_key = [0u8; 16];
    let mut enc_key = [0u8; 32];

    let mut block = Zeroizing::new([0u8; 16]);
    block[4..].copy_from_slice(nonce);

    for i in 0u32..6 {
        block[..4].copy_from_slice(&i.to_le_bytes());
        let out = Zeroizing::new(record.encrypt_block(&block));

        match i {
            0 | 1 => hash_key[i as usize * 8..][..8].copy_from_slice(&out[..8]),
            _ => enc_key[(i as usize - 2) * 8..][..8].copy_from_slice(&out[..8]),
        }
    }

    (hash_key, enc_key)
}
