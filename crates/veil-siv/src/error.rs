//! AEAD error types.

use thiserror::Error;

/// Errors produced by the AES-256-GCM-SIV engine.
///
/// Every variant except [`SivError::AuthenticationFailed`] is a pure
/// precondition failure: it is raised before any cryptographic work and
/// leaves no partial side effects. `AuthenticationFailed` is the only
/// data-dependent failure; it zeroes the plaintext output buffer before
/// returning and must be treated as a hard failure by callers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SivError {
    /// The CPU lacks the AES / carry-less-multiply / byte-shuffle
    /// primitives required for the accelerated engine.
    #[error("accelerated mode requires AES, carry-less multiply, and byte-shuffle support")]
    AcceleratedModeUnsupported,

    /// Key is not 32 bytes.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Nonce is not 12 bytes.
    #[error("invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonceLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Tag buffer is not 16 bytes.
    #[error("invalid tag length: expected {expected}, got {actual}")]
    InvalidTagLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Plaintext and ciphertext buffers differ in length.
    #[error("plaintext and ciphertext must have the same length ({plaintext} != {ciphertext})")]
    LengthMismatch {
        /// Plaintext buffer length
        plaintext: usize,
        /// Ciphertext buffer length
        ciphertext: usize,
    },

    /// Operation invoked after `dispose()`.
    #[error("instance has been disposed")]
    InstanceDisposed,

    /// The computed authentication tag did not match the supplied tag.
    #[error("authentication tag verification failed")]
    AuthenticationFailed,
}
