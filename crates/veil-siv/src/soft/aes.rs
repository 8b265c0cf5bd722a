//! Portable table-driven AES-256.
//!
//! The classic four-table formulation with little-endian state words. The
//! round tables are generated at compile time from the S-box, so the
//! binary carries only the 256-byte S-box as source data. Lookups are
//! data-dependent; this backend trades cache-timing resistance for
//! portability and is only selected where the hardware engine is not.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::BLOCK_SIZE;

const SBOX: [u8; 256] = [
    0x63, 0x7c, 0x77, 0x7b, 0xf2, 0x6b, 0x6f, 0xc5, 0x30, 0x01, 0x67, 0x2b, 0xfe, 0xd7, 0xab, 0x76,
    0xca, 0x82, 0xc9, 0x7d, 0xfa, 0x59, 0x47, 0xf0, 0xad, 0xd4, 0xa2, 0xaf, 0x9c, 0xa4, 0x72, 0xc0,
    0xb7, 0xfd, 0x93, 0x26, 0x36, 0x3f, 0xf7, 0xcc, 0x34, 0xa5, 0xe5, 0xf1, 0x71, 0xd8, 0x31, 0x15,
    0x04, 0xc7, 0x23, 0xc3, 0x18, 0x96, 0x05, 0x9a, 0x07, 0x12, 0x80, 0xe2, 0xeb, 0x27, 0xb2, 0x75,
    0x09, 0x83, 0x2c, 0x1a, 0x1b, 0x6e, 0x5a, 0xa0, 0x52, 0x3b, 0xd6, 0xb3, 0x29, 0xe3, 0x2f, 0x84,
    0x53, 0xd1, 0x00, 0xed, 0x20, 0xfc, 0xb1, 0x5b, 0x6a, 0xcb, 0xbe, 0x39, 0x4a, 0x4c, 0x58, 0xcf,
    0xd0, 0xef, 0xaa, 0xfb, 0x43, 0x4d, 0x33, 0x85, 0x45, 0xf9, 0x02, 0x7f, 0x50, 0x3c, 0x9f, 0xa8,
    0x51, 0xa3, 0x40, 0x8f, 0x92, 0x9d, 0x38, 0xf5, 0xbc, 0xb6, 0xda, 0x21, 0x10, 0xff, 0xf3, 0xd2,
    0xcd, 0x0c, 0x13, 0xec, 0x5f, 0x97, 0x44, 0x17, 0xc4, 0xa7, 0x7e, 0x3d, 0x64, 0x5d, 0x19, 0x73,
    0x60, 0x81, 0x4f, 0xdc, 0x22, 0x2a, 0x90, 0x88, 0x46, 0xee, 0xb8, 0x14, 0xde, 0x5e, 0x0b, 0xdb,
    0xe0, 0x32, 0x3a, 0x0a, 0x49, 0x06, 0x24, 0x5c, 0xc2, 0xd3, 0xac, 0x62, 0x91, 0x95, 0xe4, 0x79,
    0xe7, 0xc8, 0x37, 0x6d, 0x8d, 0xd5, 0x4e, 0xa9, 0x6c, 0x56, 0xf4, 0xea, 0x65, 0x7a, 0xae, 0x08,
    0xba, 0x78, 0x25, 0x2e, 0x1c, 0xa6, 0xb4, 0xc6, 0xe8, 0xdd, 0x74, 0x1f, 0x4b, 0xbd, 0x8b, 0x8a,
    0x70, 0x3e, 0xb5, 0x66, 0x48, 0x03, 0xf6, 0x0e, 0x61, 0x35, 0x57, 0xb9, 0x86, 0xc1, 0x1d, 0x9e,
    0xe1, 0xf8, 0x98, 0x11, 0x69, 0xd9, 0x8e, 0x94, 0x9b, 0x1e, 0x87, 0xe9, 0xce, 0x55, 0x28, 0xdf,
    0x8c, 0xa1, 0x89, 0x0d, 0xbf, 0xe6, 0x42, 0x68, 0x41, 0x99, 0x2d, 0x0f, 0xb0, 0x54, 0xbb, 0x16,
];

// Only 7 round constants are consumed by the 256-bit expansion.
const RCON: [u32; 7] = [0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40];

const fn xtime(x: u8) -> u8 {
    let v = (x as u32) << 1;
    if x & 0x80 != 0 {
        (v ^ 0x1b) as u8
    } else {
        v as u8
    }
}

const fn forward_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let x = SBOX[i];
        let y = xtime(x);
        let z = y ^ x;
        table[i] = (y as u32) | ((x as u32) << 8) | ((x as u32) << 16) | ((z as u32) << 24);
        i += 1;
    }
    table
}

const fn rotated(src: [u32; 256], n: u32) -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = src[i].rotate_left(n);
        i += 1;
    }
    table
}

const FT_BASE: [u32; 256] = forward_table();

static FT0: [u32; 256] = FT_BASE;
static FT1: [u32; 256] = rotated(FT_BASE, 8);
static FT2: [u32; 256] = rotated(FT_BASE, 16);
static FT3: [u32; 256] = rotated(FT_BASE, 24);

#[inline]
fn sub_word(w: u32) -> u32 {
    (SBOX[(w & 0xff) as usize] as u32)
        | ((SBOX[((w >> 8) & 0xff) as usize] as u32) << 8)
        | ((SBOX[((w >> 16) & 0xff) as usize] as u32) << 16)
        | ((SBOX[(w >> 24) as usize] as u32) << 24)
}

/// AES-256 with the key schedule held in 60 expanded words.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct Aes256 {
    rk: [u32; 60],
}

impl Aes256 {
    pub(crate) fn new(key: &[u8; 32]) -> Self {
        let mut rk = [0u32; 60];

        for (i, word) in key.chunks_exact(4).enumerate() {
            rk[i] = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        }

        for i in 8..60 {
            let temp = rk[i - 1];
            rk[i] = rk[i - 8]
                ^ match i % 8 {
                    // In the little-endian word layout RotWord is a right
                    // rotation by 8.
                    0 => sub_word(temp.rotate_right(8)) ^ RCON[i / 8 - 1],
                    4 => sub_word(temp),
                    _ => temp,
                };
        }

        Self { rk }
    }

    pub(crate) fn encrypt_block(&self, plain: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
        let rk = &self.rk;

        let mut x = [
            u32::from_le_bytes([plain[0], plain[1], plain[2], plain[3]]) ^ rk[0],
            u32::from_le_bytes([plain[4], plain[5], plain[6], plain[7]]) ^ rk[1],
            u32::from_le_bytes([plain[8], plain[9], plain[10], plain[11]]) ^ rk[2],
            u32::from_le_bytes([plain[12], plain[13], plain[14], plain[15]]) ^ rk[3],
        ];

        let mut k = 4;
        for _ in 1..14 {
            x = [
                rk[k]
                    ^ FT0[(x[0] & 0xff) as usize]
                    ^ FT1[((x[1] >> 8) & 0xff) as usize]
                    ^ FT2[((x[2] >> 16) & 0xff) as usize]
                    ^ FT3[(x[3] >> 24) as usize],
                rk[k + 1]
                    ^ FT0[(x[1] & 0xff) as usize]
                    ^ FT1[((x[2] >> 8) & 0xff) as usize]
                    ^ FT2[((x[3] >> 16) & 0xff) as usize]
                    ^ FT3[(x[0] >> 24) as usize],
                rk[k + 2]
                    ^ FT0[(x[2] & 0xff) as usize]
                    ^ FT1[((x[3] >> 8) & 0xff) as usize]
                    ^ FT2[((x[0] >> 16) & 0xff) as usize]
                    ^ FT3[(x[1] >> 24) as usize],
                rk[k + 3]
                    ^ FT0[(x[3] & 0xff) as usize]
                    ^ FT1[((x[0] >> 8) & 0xff) as usize]
                    ^ FT2[((x[1] >> 16) & 0xff) as usize]
                    ^ FT3[(x[2] >> 24) as usize],
            ];
            k += 4;
        }

        // Final round substitutes without MixColumns.
        let y = [
            rk[k] ^ sub_shift(x[0], x[1], x[2], x[3]),
            rk[k + 1] ^ sub_shift(x[1], x[2], x[3], x[0]),
            rk[k + 2] ^ sub_shift(x[2], x[3], x[0], x[1]),
            rk[k + 3] ^ sub_shift(x[3], x[0], x[1], x[2]),
        ];

        let mut cipher = [0u8; BLOCK_SIZE];
        cipher[0..4].copy_from_slice(&y[0].to_le_bytes());
        cipher[4..8].copy_from_slice(&y[1].to_le_bytes());
        cipher[8..12].copy_from_slice(&y[2].to_le_bytes());
        cipher[12..16].copy_from_slice(&y[3].to_le_bytes());
        cipher
    }

    /// Counter-mode keystream xor. Only the low 32-bit little-endian lane
    /// of `counter_block` increments, wrapping modulo 2^32.
    pub(crate) fn ctr(&self, counter_block: &[u8; BLOCK_SIZE], input: &[u8], output: &mut [u8]) {
        debug_assert_eq!(input.len(), output.len());

        let mut block = *counter_block;
        let mut counter = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);

        for (src, dst) in input
            .chunks(BLOCK_SIZE)
            .zip(output.chunks_mut(BLOCK_SIZE))
        {
            let stream = self.encrypt_block(&block);
            counter = counter.wrapping_add(1);
            block[0..4].copy_from_slice(&counter.to_le_bytes());

            for (i, b) in dst.iter_mut().enumerate() {
                *b = src[i] ^ stream[i];
            }
        }
    }
}

#[inline]
fn sub_shift(y0: u32, y1: u32, y2: u32, y3: u32) -> u32 {
    (SBOX[(y0 & 0xff) as usize] as u32)
        | ((SBOX[((y1 >> 8) & 0xff) as usize] as u32) << 8)
        | ((SBOX[((y2 >> 16) & 0xff) as usize] as u32) << 16)
        | ((SBOX[(y3 >> 24) as usize] as u32) << 24)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fips_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        for (i, b) in key.iter_mut().enumerate() {
            *b = i as u8;
        }
        key
    }

    #[test]
    fn test_key_expansion_fips_197() {
        let aes = Aes256::new(&fips_key());

        let expected = [
            "000102030405060708090a0b0c0d0e0f",
            "101112131415161718191a1b1c1d1e1f",
            "a573c29fa176c498a97fce93a572c09c",
            "1651a8cd0244beda1a5da4c10640bade",
            "ae87dff00ff11b68a68ed5fb03fc1567",
            "6de1f1486fa54f9275f8eb5373b8518d",
            "c656827fc9a799176f294cec6cd5598b",
            "3de23a75524775e727bf9eb45407cf39",
            "0bdc905fc27b0948ad5245a4c1871c2f",
            "45f5a66017b2d387300d4d33640a820a",
            "7ccff71cbeb4fe5413e6bbf0d261a7df",
            "f01afafee7a82979d7a5644ab3afe640",
            "2541fe719bf500258813bbd55a721c0a",
            "4e5a6699a9f24fe07e572baacdf8cdea",
            "24fc79ccbf0979e9371ac23c6d68de36",
        ];

        for (round, hex) in expected.iter().enumerate() {
            let want = hex::decode(hex).unwrap();
            let mut got = [0u8; 16];
            for w in 0..4 {
                // Round keys are stored as little-endian words of the
                // big-endian FIPS-197 byte sequence.
                let bytes = aes.rk[round * 4 + w].to_le_bytes();
                got[w * 4..w * 4 + 4].copy_from_slice(&bytes);
            }
            assert_eq!(got.as_slice(), want.as_slice(), "round {round}");
        }
    }

    #[test]
    fn test_encrypt_block_fips_197() {
        let aes = Aes256::new(&fips_key());

        let plain = hex::decode("00112233445566778899aabbccddeeff").unwrap();
        let cipher = aes.encrypt_block(&plain.try_into().unwrap());

        assert_eq!(hex::encode(cipher), "8ea2b7ca516745bfeafc49904b496089");
    }

    #[test]
    fn test_ctr_wraps_low_lane() {
        let aes = Aes256::new(&fips_key());

        let mut block = [0u8; 16];
        block[0..4].copy_from_slice(&u32::MAX.to_le_bytes());

        let input = [0u8; 48];
        let mut output = [0u8; 48];
        aes.ctr(&block, &input, &mut output);

        // The second block must come from the counter wrapped to zero, not
        // from a carry into the upper bytes.
        let mut wrapped = [0u8; 16];
        wrapped[0..4].copy_from_slice(&0u32.to_le_bytes());
        assert_eq!(output[16..32], aes.encrypt_block(&wrapped));
    }
}
