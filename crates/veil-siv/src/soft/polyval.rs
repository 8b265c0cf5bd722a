//! Portable constant-time POLYVAL.
//!
//! The 64-bit carry-less multiplier is a branch-free shift-and-mask loop,
//! and the 128-bit multiply plus reduction mirrors the hardware engine's
//! schoolbook-and-fold sequence step for step, so both backends compute
//! identical intermediate values.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::BLOCK_SIZE;

/// A 128-bit value as two little-endian 64-bit limbs.
#[derive(Clone, Copy, Default, Zeroize)]
struct X128 {
    lo: u64,
    hi: u64,
}

impl X128 {
    fn from_bytes(bytes: &[u8; 16]) -> Self {
        Self {
            lo: u64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]),
            hi: u64::from_le_bytes([
                bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14],
                bytes[15],
            ]),
        }
    }

    fn to_bytes(self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&self.lo.to_le_bytes());
        out[8..].copy_from_slice(&self.hi.to_le_bytes());
        out
    }
}

/// 64x64 carry-less multiply. Each bit of `b` selects a shifted copy of
/// `a` through an all-ones or all-zeros mask, so the running time does not
/// depend on the operand values.
fn clmul64(a: u64, b: u64) -> X128 {
    let mut lo = 0u64;
    let mut hi = 0u64;

    for i in 0..64 {
        let mask = ((b >> i) & 1).wrapping_neg();
        lo ^= (a << i) & mask;
        if i != 0 {
            hi ^= (a >> (64 - i)) & mask;
        }
    }

    X128 { lo, hi }
}

// High limb of the reduction constant vector.
const POLY_HI: u64 = 0xc200_0000_0000_0000;

/// Multiplies two field elements and reduces modulo
/// x^128 + x^127 + x^126 + x^121 + 1, following the same schoolbook
/// accumulation and two-step fold as the carry-less-multiply engine.
fn gf_mul(a: X128, b: X128) -> X128 {
    let mut lo = clmul64(a.lo, b.lo);
    let mut hi = clmul64(a.hi, b.hi);

    let m1 = clmul64(a.lo, b.hi);
    let m2 = clmul64(a.hi, b.lo);
    let mid = X128 {
        lo: m1.lo ^ m2.lo,
        hi: m1.hi ^ m2.hi,
    };

    lo.hi ^= mid.lo;
    hi.lo ^= mid.hi;

    for _ in 0..2 {
        let r = clmul64(lo.lo, POLY_HI);
        lo = X128 {
            lo: lo.hi ^ r.lo,
            hi: lo.lo ^ r.hi,
        };
    }

    X128 {
        lo: hi.lo ^ lo.lo,
        hi: hi.hi ^ lo.hi,
    }
}

/// Incremental POLYVAL accumulator over a fixed hash key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct Polyval {
    h: X128,
    s: X128,
}

impl Polyval {
    pub(crate) fn new(hash_key: &[u8; 16]) -> Self {
        Self {
            h: X128::from_bytes(hash_key),
            s: X128::default(),
        }
    }

    /// Absorbs `data`, zero-padding a trailing partial block.
    pub(crate) fn update(&mut self, data: &[u8]) {
        for chunk in data.chunks(BLOCK_SIZE) {
            let mut block = [0u8; BLOCK_SIZE];
            block[..chunk.len()].copy_from_slice(chunk);

            let d = X128::from_bytes(&block);
            self.s.lo ^= d.lo;
            self.s.hi ^= d.hi;
            self.s = gf_mul(self.s, self.h);
        }
    }

    /// Returns the current hash value without consuming the accumulator.
    pub(crate) fn value(&self) -> [u8; 16] {
        self.s.to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(key_hex: &str, data: &[u8]) -> String {
        let key: [u8; 16] = hex::decode(key_hex).unwrap().try_into().unwrap();
        let mut p = Polyval::new(&key);
        p.update(data);
        hex::encode(p.value())
    }

    #[test]
    fn test_rfc_8452_worked_example() {
        let data = hex::decode(
            "4f4f95668c83dfb6401762bb2d01a262d1a24ddd2721d006bbe45f20d3c9f362",
        )
        .unwrap();

        assert_eq!(
            hash("25629347589242761d31f826ba4b757b", &data),
            "f7a3b47b846119fae5b7866cf5e5b77e"
        );
    }

    #[test]
    fn test_clmul64_simple() {
        // (x + 1)(x + 1) = x^2 + 1 in GF(2)[x]
        let r = clmul64(0b11, 0b11);
        assert_eq!(r.lo, 0b101);
        assert_eq!(r.hi, 0);

        // Top bits spill into the high limb.
        let r = clmul64(1 << 63, 0b10);
        assert_eq!(r.lo, 0);
        assert_eq!(r.hi, 1);
    }

    #[test]
    fn test_partial_blocks_zero_padded() {
        let key = [0x42u8; 16];
        let data = [7u8; 20];

        let mut padded = [0u8; 32];
        padded[..20].copy_from_slice(&data);

        let mut a = Polyval::new(&key);
        a.update(&data);
        let mut b = Polyval::new(&key);
        b.update(&padded);

        assert_eq!(a.value(), b.value());
    }

    #[test]
    fn test_known_values() {
        let key = "000102030405060708090a0b0c0d0e0f";
        let data: Vec<u8> = (0..129u32).map(|i| ((i * 17 + 3) & 0xff) as u8).collect();

        assert_eq!(hash(key, &data[..1]), "468ece1e579fdf3f64acec3c75bdfd1d");
        assert_eq!(hash(key, &data[..16]), "c6f1bceb80b0cd819841e25b5e50e725");
        assert_eq!(hash(key, &data[..17]), "775fc5f7654fa768438641b58030f36d");
        assert_eq!(hash(key, &data[..48]), "20a109bfe4e3ac69c3fda22537e74d98");
        assert_eq!(hash(key, &data[..129]), "571e68bf85c692c2ce9a30cfd8afdfab");
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let key = [0x11u8; 16];
        let data: Vec<u8> = (0..64u8).collect();

        let mut one = Polyval::new(&key);
        one.update(&data);

        let mut two = Polyval::new(&key);
        two.update(&data[..32]);
        two.update(&data[32..]);

        assert_eq!(one.value(), two.value());
    }
}
