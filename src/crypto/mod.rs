//! Cryptographic primitives for secure-drop
//!
//! This module provides:
//! - AES-256-CBC payload encryption with explicit padding
//! - RSA-2048 key pairs and RSA-OAEP wrapping of the per-transfer key
//! - Zeroize-on-drop containers for key material

mod aes_cbc;
mod keys;
mod secure_bytes;

pub use aes_cbc::{decrypt_payload, encrypt_payload, pad, unpad};
pub use keys::{
    generate_keypair, parse_private_key, parse_public_key, public_key_fingerprint, unwrap_key,
    unwrap_with, wrap_key, KeyPair, RSA_BITS,
};
pub use secure_bytes::{generate_symmetric_key, SecureBytes, SymmetricKey};

/// AES block size, also the IV length
pub const BLOCK_SIZE: usize = 16;

/// AES-256 key length
pub const KEY_LEN: usize = 32;
