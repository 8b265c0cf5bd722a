//! # VEIL SIV
//!
//! AES-256-GCM-SIV nonce-misuse-resistant authenticated encryption,
//! defined in [RFC 8452](https://www.rfc-editor.org/rfc/rfc8452).
//!
//! This crate provides:
//! - Detached-tag `encrypt`/`decrypt` over caller-owned buffers
//! - Combined `seal`/`open` conveniences (ciphertext with appended tag)
//! - A SIMD engine (AES + carry-less multiply + byte shuffle) selected by a
//!   one-time capability query, with 4-/8-wide counter pipelining and a
//!   fused 6-wide decrypt-and-authenticate pass
//! - A portable constant-time software fallback for targets without the
//!   required vector primitives
//! - Deterministic zeroization of all key-bearing memory
//!
//! ## Security Properties
//!
//! - Confidentiality and integrity: AES-256-GCM-SIV with 128-bit tags
//! - Nonce misuse: repeating a nonce only reveals whether the same
//!   (associated data, plaintext) pair was encrypted twice
//! - Tag verification is constant-time; failed decryption zeroes the
//!   plaintext output buffer before returning
//!
//! ## Usage
//!
//! ```ignore
//! use veil_siv::AesGcmSiv;
//!
//! let siv = AesGcmSiv::new(&key)?;
//! let sealed = siv.seal(&nonce, b"attack at dawn", b"header")?;
//! let plain = siv.open(&nonce, &sealed, b"header")?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

mod aead;
mod ct;
mod error;
pub(crate) mod soft;

#[cfg(target_arch = "x86_64")]
pub(crate) mod simd;

pub use aead::AesGcmSiv;
pub use error::SivError;

/// Secret key size (32 bytes / 256 bits).
pub const KEY_SIZE: usize = 32;

/// Nonce size (12 bytes / 96 bits).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (16 bytes / 128 bits).
pub const TAG_SIZE: usize = 16;

/// AES block size (16 bytes / 128 bits).
pub const BLOCK_SIZE: usize = 16;

/// Expanded AES-256 key schedule size (15 round keys of 16 bytes).
pub const ROUND_KEYS_SIZE: usize = 15 * BLOCK_SIZE;

/// Default input-size threshold (in bytes of AAD + message) at or below
/// which the serial Horner POLYVAL strategy is used instead of the batched
/// powers-table strategy. A tuning knob, not a correctness boundary.
pub const POLYVAL_THRESHOLD: usize = 128;
