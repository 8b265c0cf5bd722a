//! AES-256-GCM-SIV authenticated encryption.

use core::fmt;

use zeroize::{Zeroize, Zeroizing};

use crate::ct;
use crate::error::SivError;
use crate::soft::{self, Aes256, Polyval};
use crate::{BLOCK_SIZE, KEY_SIZE, NONCE_SIZE, POLYVAL_THRESHOLD, ROUND_KEYS_SIZE, TAG_SIZE};

#[cfg(target_arch = "x86_64")]
use crate::simd;

#[derive(Zeroize)]
enum Engine {
    #[cfg(target_arch = "x86_64")]
    Simd { ks: [u8; ROUND_KEYS_SIZE] },
    Soft { aes: Aes256 },
}

/// An AES-256-GCM-SIV instance bound to one 32-byte key.
///
/// The instance is cheap to keep around: the AES-256 key schedule is
/// expanded once at construction and every call derives fresh per-nonce
/// keys from it. Instances are safe to share across threads.
///
/// Construction picks the hardware engine when the CPU supports it and
/// falls back to a portable software engine otherwise; use
/// [`AesGcmSiv::new_accelerated`] to fail instead of falling back.
///
/// ```ignore
/// let mut siv = AesGcmSiv::new(&key)?;
/// let sealed = siv.seal(&nonce, plaintext, aad)?;
/// let opened = siv.open(&nonce, &sealed, aad)?;
/// siv.dispose();
/// ```
pub struct AesGcmSiv {
    engine: Engine,
    threshold: usize,
    disposed: bool,
}

impl AesGcmSiv {
    /// Creates an instance from a 32-byte key, selecting the best
    /// available engine.
    pub fn new(key: &[u8]) -> Result<Self, SivError> {
        #[cfg(target_arch = "x86_64")]
        {
            if simd::is_available() {
                return Self::new_accelerated(key);
            }
        }

        Self::new_portable(key)
    }

    /// Creates an instance on the hardware engine, or fails with
    /// [`SivError::AcceleratedModeUnsupported`] if the CPU lacks the
    /// required instruction sets.
    pub fn new_accelerated(key: &[u8]) -> Result<Self, SivError> {
        #[cfg(target_arch = "x86_64")]
        {
            if !simd::is_available() {
                return Err(SivError::AcceleratedModeUnsupported);
            }

            let key = check_key(key)?;
            let mut ks = [0u8; ROUND_KEYS_SIZE];
            // Support was checked above.
            unsafe { simd::aes::key_schedule(&key, &mut ks) };

            Ok(Self {
                engine: Engine::Simd { ks },
                threshold: POLYVAL_THRESHOLD,
                disposed: false,
            })
        }

        #[cfg(not(target_arch = "x86_64"))]
        {
            let _ = key;
            Err(SivError::AcceleratedModeUnsupported)
        }
    }

    /// Creates an instance on the portable software engine.
    pub fn new_portable(key: &[u8]) -> Result<Self, SivError> {
        let key = check_key(key)?;

        Ok(Self {
            engine: Engine::Soft {
                aes: Aes256::new(&key),
            },
            threshold: POLYVAL_THRESHOLD,
            disposed: false,
        })
    }

    /// Overrides the input size (AAD plus message, in bytes) above which
    /// the hardware engine switches from serial hashing to the batched
    /// powers-table strategy. Purely a performance knob; every setting
    /// produces identical output.
    #[must_use]
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    /// Returns true if this instance runs on the hardware engine.
    pub fn is_accelerated(&self) -> bool {
        match self.engine {
            #[cfg(target_arch = "x86_64")]
            Engine::Simd { .. } => true,
            Engine::Soft { .. } => false,
        }
    }

    /// Encrypts and authenticates `plaintext` together with the optional
    /// `associated_data`, writing the ciphertext and the 16-byte
    /// authentication tag to the caller's buffers.
    ///
    /// `ciphertext` must be exactly as long as `plaintext`. Nonces do not
    /// have to be unique for safety, but repeating a (nonce, AAD,
    /// plaintext) triple produces identical output.
    pub fn encrypt(
        &self,
        nonce: &[u8],
        plaintext: &[u8],
        ciphertext: &mut [u8],
        tag: &mut [u8],
        associated_data: &[u8],
    ) -> Result<(), SivError> {
        self.check_disposed()?;
        check_parameters(plaintext, ciphertext, nonce, tag)?;

        let mut n = [0u8; NONCE_SIZE];
        n.copy_from_slice(nonce);
        let mut tag_out = [0u8; TAG_SIZE];

        match &self.engine {
            #[cfg(target_arch = "x86_64")]
            Engine::Simd { ks } => encrypt_simd(
                ks,
                self.threshold,
                &n,
                plaintext,
                ciphertext,
                &mut tag_out,
                associated_data,
            ),
            Engine::Soft { aes } => {
                encrypt_soft(aes, &n, plaintext, ciphertext, &mut tag_out, associated_data)
            }
        }

        tag.copy_from_slice(&tag_out);
        Ok(())
    }

    /// Decrypts `ciphertext` and verifies the authentication tag over the
    /// decrypted plaintext and the optional `associated_data`.
    ///
    /// On verification failure the plaintext buffer is zeroed and
    /// [`SivError::AuthenticationFailed`] is returned; no plaintext is
    /// ever released to the caller unauthenticated.
    pub fn decrypt(
        &self,
        nonce: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
        plaintext: &mut [u8],
        associated_data: &[u8],
    ) -> Result<(), SivError> {
        self.check_disposed()?;
        check_parameters(plaintext, ciphertext, nonce, tag)?;

        let mut n = [0u8; NONCE_SIZE];
        n.copy_from_slice(nonce);
        let mut t = [0u8; TAG_SIZE];
        t.copy_from_slice(tag);

        match &self.engine {
            #[cfg(target_arch = "x86_64")]
            Engine::Simd { ks } => decrypt_simd(
                ks,
                self.threshold,
                &n,
                ciphertext,
                &t,
                plaintext,
                associated_data,
            ),
            Engine::Soft { aes } => {
                decrypt_soft(aes, &n, ciphertext, &t, plaintext, associated_data)
            }
        }
    }

    /// Encrypts `plaintext` and returns the ciphertext with the 16-byte
    /// tag appended.
    pub fn seal(
        &self,
        nonce: &[u8],
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, SivError> {
        let mut sealed = vec![0u8; plaintext.len() + TAG_SIZE];
        let (ciphertext, tag) = sealed.split_at_mut(plaintext.len());

        self.encrypt(nonce, plaintext, ciphertext, tag, associated_data)?;
        Ok(sealed)
    }

    /// Opens a sealed message produced by [`AesGcmSiv::seal`] and returns
    /// the plaintext.
    pub fn open(
        &self,
        nonce: &[u8],
        sealed: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, SivError> {
        if sealed.len() < TAG_SIZE {
            return Err(SivError::InvalidTagLength {
                expected: TAG_SIZE,
                actual: sealed.len(),
            });
        }

        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_SIZE);
        let mut plaintext = vec![0u8; ciphertext.len()];

        self.decrypt(nonce, ciphertext, tag, &mut plaintext, associated_data)?;
        Ok(plaintext)
    }

    /// Wipes all key material. Every operation afterwards fails with
    /// [`SivError::InstanceDisposed`]. Dropping the instance wipes the
    /// key material as well; `dispose` exists for callers that want the
    /// key gone before the instance goes out of scope.
    pub fn dispose(&mut self) {
        if !self.disposed {
            self.engine.zeroize();
            self.disposed = true;
        }
    }

    fn check_disposed(&self) -> Result<(), SivError> {
        if self.disposed {
            return Err(SivError::InstanceDisposed);
        }
        Ok(())
    }
}

impl Drop for AesGcmSiv {
    fn drop(&mut self) {
        self.engine.zeroize();
    }
}

// Manual impl so no key material can end up in debug output.
impl fmt::Debug for AesGcmSiv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesGcmSiv")
            .field(
                "engine",
                if self.is_accelerated() {
                    &"accelerated"
                } else {
                    &"portable"
                },
            )
            .field("threshold", &self.threshold)
            .field("disposed", &self.disposed)
            .finish()
    }
}

fn check_key(key: &[u8]) -> Result<Zeroizing<[u8; KEY_SIZE]>, SivError> {
    if key.len() != KEY_SIZE {
        return Err(SivError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: key.len(),
        });
    }

    let mut out = Zeroizing::new([0u8; KEY_SIZE]);
    out.copy_from_slice(key);
    Ok(out)
}

fn check_parameters(
    plaintext: &[u8],
    ciphertext: &[u8],
    nonce: &[u8],
    tag: &[u8],
) -> Result<(), SivError> {
    if plaintext.len() != ciphertext.len() {
        return Err(SivError::LengthMismatch {
            plaintext: plaintext.len(),
            ciphertext: ciphertext.len(),
        });
    }

    if nonce.len() != NONCE_SIZE {
        return Err(SivError::InvalidNonceLength {
            expected: NONCE_SIZE,
            actual: nonce.len(),
        });
    }

    if tag.len() != TAG_SIZE {
        return Err(SivError::InvalidTagLength {
            expected: TAG_SIZE,
            actual: tag.len(),
        });
    }

    Ok(())
}

/// The final POLYVAL block: bit lengths of the AAD and the message, as
/// two little-endian 64-bit values.
fn length_block(aad_len: usize, msg_len: usize) -> [u8; BLOCK_SIZE] {
    let mut block = [0u8; BLOCK_SIZE];
    block[..8].copy_from_slice(&((aad_len as u64) * 8).to_le_bytes());
    block[8..].copy_from_slice(&((msg_len as u64) * 8).to_le_bytes());
    block
}

/// Turns a POLYVAL result into the tag-input block: xor in the nonce and
/// clear the top bit of the last byte.
fn mask_tag_input(polyval: &mut [u8; 16], nonce: &[u8; NONCE_SIZE]) {
    for (b, n) in polyval.iter_mut().zip(nonce.iter()) {
        *b ^= n;
    }
    polyval[15] &= 0x7f;
}

#[cfg(target_arch = "x86_64")]
fn encrypt_simd(
    ks: &[u8; ROUND_KEYS_SIZE],
    threshold: usize,
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
    ciphertext: &mut [u8],
    tag: &mut [u8; TAG_SIZE],
    aad: &[u8],
) {
    let mut hash_key = Zeroizing::new([0u8; BLOCK_SIZE]);
    let mut enc_key = Zeroizing::new([0u8; KEY_SIZE]);
    let mut enc_ks = Zeroizing::new([0u8; ROUND_KEYS_SIZE]);

    let mut polyval = [0u8; BLOCK_SIZE];
    let length_block = length_block(aad.len(), plaintext.len());

    // CPU support was verified at construction.
    unsafe {
        simd::aes::derive_keys(nonce, ks, &mut hash_key, &mut enc_key);

        if plaintext.len() + aad.len() <= threshold {
            simd::polyval::polyval_horner(&mut polyval, &hash_key, aad);
            simd::polyval::polyval_horner(&mut polyval, &hash_key, plaintext);
            simd::polyval::polyval_horner(&mut polyval, &hash_key, &length_block);

            mask_tag_input(&mut polyval, nonce);

            simd::aes::encrypt_tag(&polyval, tag, &enc_key, &mut enc_ks);
            simd::aes::ctr_encrypt4(plaintext, ciphertext, tag, &enc_ks);
        } else {
            let mut htbl = Zeroizing::new([0u8; 8 * BLOCK_SIZE]);
            simd::polyval::init_powers_table(&mut htbl[..], &hash_key);

            simd::polyval::polyval_powers_table(&mut polyval, &htbl[..], aad);
            simd::polyval::polyval_powers_table(&mut polyval, &htbl[..], plaintext);
            simd::polyval::polyval_powers_table(&mut polyval, &htbl[..], &length_block);

            mask_tag_input(&mut polyval, nonce);

            simd::aes::encrypt_tag(&polyval, tag, &enc_key, &mut enc_ks);
            simd::aes::ctr_encrypt8(plaintext, ciphertext, tag, &enc_ks);
        }
    }
}

#[cfg(target_arch = "x86_64")]
fn decrypt_simd(
    ks: &[u8; ROUND_KEYS_SIZE],
    threshold: usize,
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
    tag: &[u8; TAG_SIZE],
    plaintext: &mut [u8],
    aad: &[u8],
) -> Result<(), SivError> {
    let mut hash_key = Zeroizing::new([0u8; BLOCK_SIZE]);
    let mut enc_key = Zeroizing::new([0u8; KEY_SIZE]);
    let mut enc_ks = Zeroizing::new([0u8; ROUND_KEYS_SIZE]);

    let mut polyval = [0u8; BLOCK_SIZE];
    let length_block = length_block(aad.len(), ciphertext.len());

    // CPU support was verified at construction.
    unsafe {
        simd::aes::derive_keys(nonce, ks, &mut hash_key, &mut enc_key);
        simd::aes::key_schedule(&enc_key, &mut enc_ks);

        if ciphertext.len() + aad.len() <= threshold {
            simd::aes::ctr_encrypt4(ciphertext, plaintext, tag, &enc_ks);

            simd::polyval::polyval_horner(&mut polyval, &hash_key, aad);
            simd::polyval::polyval_horner(&mut polyval, &hash_key, plaintext);
            simd::polyval::polyval_horner(&mut polyval, &hash_key, &length_block);
        } else {
            let mut htbl = Zeroizing::new([0u8; 6 * BLOCK_SIZE]);
            simd::polyval::init_powers_table(&mut htbl[..], &hash_key);

            simd::polyval::polyval_horner(&mut polyval, &hash_key, aad);
            simd::polyval::decrypt_ctr_polyval(
                ciphertext,
                plaintext,
                &mut polyval,
                &htbl[..],
                tag,
                &enc_ks,
            );
            simd::polyval::polyval_horner(&mut polyval, &hash_key, &length_block);
        }

        mask_tag_input(&mut polyval, nonce);

        let mut computed = [0u8; TAG_SIZE];
        simd::aes::encrypt_block(&polyval, &mut computed, &enc_ks);

        if !ct::verify_16(tag, &computed) {
            plaintext.fill(0);
            return Err(SivError::AuthenticationFailed);
        }
    }

    Ok(())
}

fn encrypt_soft(
    record: &Aes256,
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
    ciphertext: &mut [u8],
    tag: &mut [u8; TAG_SIZE],
    aad: &[u8],
) {
    let (hash_key, enc_key) = soft::derive_keys(record, nonce);
    let hash_key = Zeroizing::new(hash_key);
    let enc_key = Zeroizing::new(enc_key);
    let message_key = Aes256::new(&enc_key);

    let mut polyval = Polyval::new(&hash_key);
    polyval.update(aad);
    polyval.update(plaintext);
    polyval.update(&length_block(aad.len(), plaintext.len()));

    let mut s = Zeroizing::new(polyval.value());
    mask_tag_input(&mut s, nonce);

    *tag = message_key.encrypt_block(&s);

    let mut counter_block = *tag;
    counter_block[15] |= 0x80;
    message_key.ctr(&counter_block, plaintext, ciphertext);
}

fn decrypt_soft(
    record: &Aes256,
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
    tag: &[u8; TAG_SIZE],
    plaintext: &mut [u8],
    aad: &[u8],
) -> Result<(), SivError> {
    let (hash_key, enc_key) = soft::derive_keys(record, nonce);
    let hash_key = Zeroizing::new(hash_key);
    let enc_key = Zeroizing::new(enc_key);
    let message_key = Aes256::new(&enc_key);

    let mut counter_block = *tag;
    counter_block[15] |= 0x80;
    message_key.ctr(&counter_block, ciphertext, plaintext);

    let mut polyval = Polyval::new(&hash_key);
    polyval.update(aad);
    polyval.update(plaintext);
    polyval.update(&length_block(aad.len(), ciphertext.len()));

    let mut s = Zeroizing::new(polyval.value());
    mask_tag_input(&mut s, nonce);

    let computed = message_key.encrypt_block(&s);

    if !ct::verify_16(tag, &computed) {
        plaintext.fill(0);
        return Err(SivError::AuthenticationFailed);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rfc_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        key[0] = 0x01;
        key
    }

    fn rfc_nonce() -> [u8; 12] {
        let mut nonce = [0u8; 12];
        nonce[0] = 0x03;
        nonce
    }

    fn test_bytes(len: usize, seed: u64) -> Vec<u8> {
        let mut state = seed.wrapping_mul(0x9e37_79b9_7f4a_7c15) | 1;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 32) as u8
            })
            .collect()
    }

    /// Every engine that can run on this machine.
    fn engines(key: &[u8]) -> Vec<AesGcmSiv> {
        let mut out = vec![AesGcmSiv::new_portable(key).unwrap()];
        if let Ok(siv) = AesGcmSiv::new_accelerated(key) {
            out.push(siv);
        }
        out
    }

    fn seal_hex(siv: &AesGcmSiv, nonce: &[u8], pt: &[u8], aad: &[u8]) -> String {
        hex::encode(siv.seal(nonce, pt, aad).unwrap())
    }

    #[test]
    fn test_rfc_8452_empty_plaintext() {
        for siv in engines(&rfc_key()) {
            assert_eq!(
                seal_hex(&siv, &rfc_nonce(), b"", b""),
                "07f5f4169bbf55a8400cd47ea6fd400f"
            );
        }
    }

    #[test]
    fn test_rfc_8452_8_byte_plaintext() {
        let pt = hex::decode("0100000000000000").unwrap();
        for siv in engines(&rfc_key()) {
            assert_eq!(
                seal_hex(&siv, &rfc_nonce(), &pt, b""),
                "c2ef328e5c71c83b843122130f7364b761e0b97427e3df28"
            );
        }
    }

    #[test]
    fn test_rfc_8452_12_byte_plaintext() {
        let pt = hex::decode("010000000000000000000000").unwrap();
        for siv in engines(&rfc_key()) {
            assert_eq!(
                seal_hex(&siv, &rfc_nonce(), &pt, b""),
                "9aab2aeb3faa0a34aea8e2b18ca50da9ae6559e48fd10f6e5c9ca17e"
            );
        }
    }

    #[test]
    fn test_roundtrip_all_engines_and_thresholds() {
        let key = test_bytes(32, 1);
        let nonce = test_bytes(12, 2);

        for &len in &[0usize, 1, 15, 16, 17, 47, 48, 64, 95, 96, 127, 128, 129, 256, 1000] {
            let pt = test_bytes(len, len as u64 + 3);
            let aad = test_bytes(len % 37, len as u64 + 4);

            let mut outputs = Vec::new();
            for threshold in [0, POLYVAL_THRESHOLD, usize::MAX] {
                for siv in engines(&key) {
                    let siv = siv.with_threshold(threshold);
                    let sealed = siv.seal(&nonce, &pt, &aad).unwrap();
                    assert_eq!(siv.open(&nonce, &sealed, &aad).unwrap(), pt);
                    outputs.push(sealed);
                }
            }

            for sealed in &outputs {
                assert_eq!(sealed, &outputs[0], "engines disagree at len {len}");
            }
        }
    }

    #[test]
    fn test_threshold_does_not_change_output() {
        let key = test_bytes(32, 10);
        let nonce = test_bytes(12, 11);
        let pt = test_bytes(300, 12);
        let aad = test_bytes(40, 13);

        let baseline = AesGcmSiv::new(&key)
            .unwrap()
            .seal(&nonce, &pt, &aad)
            .unwrap();

        for threshold in [0, 1, 128, 4096, usize::MAX] {
            let siv = AesGcmSiv::new(&key).unwrap().with_threshold(threshold);
            assert_eq!(siv.seal(&nonce, &pt, &aad).unwrap(), baseline);

            let mut opened = vec![0u8; pt.len()];
            let (ct, tag) = baseline.split_at(pt.len());
            siv.decrypt(&nonce, ct, tag, &mut opened, &aad).unwrap();
            assert_eq!(opened, pt);
        }
    }

    #[test]
    fn test_nonce_reuse_is_deterministic() {
        let key = test_bytes(32, 20);
        let nonce = test_bytes(12, 21);
        let pt = test_bytes(64, 22);

        for siv in engines(&key) {
            let a = siv.seal(&nonce, &pt, b"aad").unwrap();
            let b = siv.seal(&nonce, &pt, b"aad").unwrap();
            assert_eq!(a, b);

            // A different plaintext under the same nonce must still look
            // unrelated.
            let c = siv.seal(&nonce, &test_bytes(64, 23), b"aad").unwrap();
            assert_ne!(a, c);
        }
    }

    #[test]
    fn test_tampered_ciphertext_is_rejected_and_zeroed() {
        let key = test_bytes(32, 30);
        let nonce = test_bytes(12, 31);
        let pt = test_bytes(200, 32);

        for siv in engines(&key) {
            let sealed = siv.seal(&nonce, &pt, b"header").unwrap();

            for pos in [0, 1, 99, sealed.len() - 17, sealed.len() - 16, sealed.len() - 1] {
                let mut broken = sealed.clone();
                broken[pos] ^= 0x01;

                let (ct, tag) = broken.split_at(pt.len());
                let mut opened = test_bytes(pt.len(), 33);
                let err = siv
                    .decrypt(&nonce, ct, tag, &mut opened, b"header")
                    .unwrap_err();

                assert_eq!(err, SivError::AuthenticationFailed);
                assert!(opened.iter().all(|&b| b == 0), "plaintext not wiped");
            }
        }
    }

    #[test]
    fn test_wrong_aad_is_rejected() {
        let key = test_bytes(32, 40);
        let nonce = test_bytes(12, 41);

        for siv in engines(&key) {
            let sealed = siv.seal(&nonce, b"payload", b"right").unwrap();
            assert_eq!(
                siv.open(&nonce, &sealed, b"wrong").unwrap_err(),
                SivError::AuthenticationFailed
            );
        }
    }

    #[test]
    fn test_parameter_validation() {
        let siv = AesGcmSiv::new(&[0u8; 32]).unwrap();
        let mut ct = [0u8; 8];
        let mut tag = [0u8; 16];

        assert_eq!(
            AesGcmSiv::new(&[0u8; 31]).unwrap_err(),
            SivError::InvalidKeyLength {
                expected: 32,
                actual: 31
            }
        );
        assert_eq!(
            siv.encrypt(&[0u8; 11], &[0u8; 8], &mut ct, &mut tag, b"")
                .unwrap_err(),
            SivError::InvalidNonceLength {
                expected: 12,
                actual: 11
            }
        );
        assert_eq!(
            siv.encrypt(&[0u8; 12], &[0u8; 8], &mut ct, &mut tag[..15], b"")
                .unwrap_err(),
            SivError::InvalidTagLength {
                expected: 16,
                actual: 15
            }
        );
        assert_eq!(
            siv.encrypt(&[0u8; 12], &[0u8; 9], &mut ct, &mut tag, b"")
                .unwrap_err(),
            SivError::LengthMismatch {
                plaintext: 9,
                ciphertext: 8
            }
        );
    }

    #[test]
    fn test_open_rejects_short_input() {
        let siv = AesGcmSiv::new(&[0u8; 32]).unwrap();
        assert!(matches!(
            siv.open(&[0u8; 12], &[0u8; 15], b"").unwrap_err(),
            SivError::InvalidTagLength { .. }
        ));
    }

    #[test]
    fn test_disposed_instance_refuses_work() {
        let mut siv = AesGcmSiv::new(&[7u8; 32]).unwrap();
        siv.dispose();
        siv.dispose();

        assert_eq!(
            siv.seal(&[0u8; 12], b"data", b"").unwrap_err(),
            SivError::InstanceDisposed
        );
        assert_eq!(
            siv.open(&[0u8; 12], &[0u8; 16], b"").unwrap_err(),
            SivError::InstanceDisposed
        );
    }

    #[test]
    fn test_debug_output_has_no_key_material() {
        let key = test_bytes(32, 70);
        let siv = AesGcmSiv::new(&key).unwrap();
        let rendered = format!("{siv:?}");

        assert!(rendered.contains("AesGcmSiv"));
        assert!(rendered.contains("accelerated") || rendered.contains("portable"));
        assert!(!rendered.contains(&hex::encode(&key)));
        assert!(!rendered.contains(&format!("{key:?}")));

        // Debug must also be usable on the error side of a construction
        // result.
        assert!(AesGcmSiv::new(&key[..31]).is_err());
        AesGcmSiv::new(&key[..31]).unwrap_err();
    }

    #[test]
    fn test_dispose_wipes_round_keys() {
        let mut siv = AesGcmSiv::new(&test_bytes(32, 60)).unwrap();
        siv.dispose();

        #[cfg(target_arch = "x86_64")]
        if let Engine::Simd { ks } = &siv.engine {
            assert!(ks.iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_engines_agree_on_large_inputs() {
        let key = test_bytes(32, 50);
        let nonce = test_bytes(12, 51);

        let engines = engines(&key);
        if engines.len() < 2 {
            return;
        }

        for &len in &[96, 97, 191, 192, 500, 4096, 65 * 1024] {
            let pt = test_bytes(len, len as u64);
            let aad = test_bytes(129, len as u64 + 1);

            let sealed: Vec<_> = engines
                .iter()
                .map(|e| e.seal(&nonce, &pt, &aad).unwrap())
                .collect();
            assert_eq!(sealed[0], sealed[1], "engines disagree at len {len}");

            for e in &engines {
                assert_eq!(e.open(&nonce, &sealed[0], &aad).unwrap(), pt);
            }
        }
    }
}
