//! Property-based tests.
//!
//! Uses proptest to verify AEAD invariants across large input spaces.

use proptest::prelude::*;

use veil_siv::{AesGcmSiv, SivError, TAG_SIZE};

proptest! {
    /// Seal then open recovers the plaintext on every engine and with the
    /// hashing strategy forced each way.
    #[test]
    fn seal_open_roundtrip(
        key in any::<[u8; 32]>(),
        nonce in any::<[u8; 12]>(),
        plaintext in prop::collection::vec(any::<u8>(), 0..2048),
        aad in prop::collection::vec(any::<u8>(), 0..256),
        threshold in prop_oneof![Just(0usize), Just(128), Just(usize::MAX)],
    ) {
        let siv = AesGcmSiv::new_portable(&key).unwrap().with_threshold(threshold);
        let sealed = siv.seal(&nonce, &plaintext, &aad).unwrap();

        prop_assert_eq!(sealed.len(), plaintext.len() + TAG_SIZE);
        prop_assert_eq!(siv.open(&nonce, &sealed, &aad).unwrap(), plaintext.clone());

        if let Ok(hw) = AesGcmSiv::new_accelerated(&key) {
            let hw = hw.with_threshold(threshold);
            prop_assert_eq!(hw.seal(&nonce, &plaintext, &aad).unwrap(), sealed.clone());
            prop_assert_eq!(hw.open(&nonce, &sealed, &aad).unwrap(), plaintext);
        }
    }

    /// Any single corrupted byte in the sealed message is rejected and
    /// leaves the output buffer zeroed.
    #[test]
    fn corruption_is_rejected(
        key in any::<[u8; 32]>(),
        nonce in any::<[u8; 12]>(),
        plaintext in prop::collection::vec(any::<u8>(), 0..512),
        position in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let siv = AesGcmSiv::new(&key).unwrap();
        let mut sealed = siv.seal(&nonce, &plaintext, b"").unwrap();
        let position = position.index(sealed.len());
        sealed[position] ^= flip;

        let (ciphertext, tag) = sealed.split_at(plaintext.len());
        let mut opened = vec![0xa5u8; plaintext.len()];
        let err = siv.decrypt(&nonce, ciphertext, tag, &mut opened, b"").unwrap_err();

        prop_assert_eq!(err, SivError::AuthenticationFailed);
        prop_assert!(opened.iter().all(|&b| b == 0));
    }

    /// Encryption is a deterministic function of (key, nonce, AAD,
    /// plaintext); distinct plaintexts never collide.
    #[test]
    fn encryption_is_deterministic(
        key in any::<[u8; 32]>(),
        nonce in any::<[u8; 12]>(),
        a in prop::collection::vec(any::<u8>(), 0..256),
        b in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        let siv = AesGcmSiv::new(&key).unwrap();

        let sealed_a = siv.seal(&nonce, &a, b"").unwrap();
        prop_assert_eq!(&siv.seal(&nonce, &a, b"").unwrap(), &sealed_a);

        if a != b {
            prop_assert_ne!(siv.seal(&nonce, &b, b"").unwrap(), sealed_a);
        }
    }
}
