//! Configuration management for secure-drop
//!
//! Handles:
//! - Runtime settings (addresses, paths, limits)
//! - Server key pair artifacts

mod keystore;
mod settings;

pub use keystore::{
    ensure_keypair, generate_keypair_files, load_keypair, read_public_key, save_keypair, KeyPaths,
    KeySource, PRIVATE_KEY_FILE, PUBLIC_KEY_FILE,
};
pub use settings::{Settings, DEFAULT_PORT, DEFAULT_SAVE_DIR};
