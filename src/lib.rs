//! secure-drop - single-file hybrid-encryption transfer
//!
//! A client encrypts a file with a fresh AES-256 key, wraps that key with the
//! server's RSA public key, and sends filename, wrapped key and ciphertext in
//! one length-prefixed frame over TCP. The server unwraps the key, decrypts
//! and writes the file into its save directory.
//!
//! The protocol is the only confidentiality layer: there is no TLS, no client
//! authentication and no acknowledgment.

pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod sink;
pub mod transfer;

pub use error::{FrameError, Result, TransferError};
