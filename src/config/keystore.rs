//! Key pair artifacts on disk
//!
//! Two PEM files:
//! - private key (PKCS#1), mode 0600 on Unix, never leaves the server
//! - public key (SPKI), copied to every client

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::crypto::KeyPair;
use crate::error::{Result, TransferError};

pub const PRIVATE_KEY_FILE: &str = "server_private.pem";
pub const PUBLIC_KEY_FILE: &str = "server_public.pem";

/// Where the two key artifacts live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPaths {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
}

impl KeyPaths {
    pub fn new(private_key: impl Into<PathBuf>, public_key: impl Into<PathBuf>) -> Self {
        Self {
            private_key: private_key.into(),
            public_key: public_key.into(),
        }
    }

    /// Default file names inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join(PRIVATE_KEY_FILE), dir.join(PUBLIC_KEY_FILE))
    }

    /// Both artifacts present
    pub fn exist(&self) -> bool {
        self.private_key.exists() && self.public_key.exists()
    }

    fn any_exist(&self) -> bool {
        self.private_key.exists() || self.public_key.exists()
    }
}

/// How `ensure_keypair` obtained the pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Generated,
    Loaded,
    /// Private key loaded, missing public key rewritten from it
    Restored,
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Write both halves, private key first with restrictive permissions
pub fn save_keypair(paths: &KeyPaths, keypair: &KeyPair) -> Result<()> {
    ensure_parent(&paths.private_key)?;
    ensure_parent(&paths.public_key)?;

    let mut file = File::create(&paths.private_key)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&paths.private_key, fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(keypair.private_key_pem())?;
    file.sync_all()?;

    save_public_key(paths, keypair)
}

fn save_public_key(paths: &KeyPaths, keypair: &KeyPair) -> Result<()> {
    ensure_parent(&paths.public_key)?;
    let mut file = File::create(&paths.public_key)?;
    file.write_all(keypair.public_key_pem())?;
    file.sync_all()?;
    Ok(())
}

/// Load the pair from the private key artifact
pub fn load_keypair(paths: &KeyPaths) -> Result<KeyPair> {
    let private_pem = crate::crypto::SecureBytes::new(fs::read(&paths.private_key)?);
    KeyPair::from_private_pem(&private_pem)
}

/// Load the pair, creating whatever is missing.
///
/// - both artifacts present: `Loaded`
/// - only the private key present: the public key is derived from it and
///   written back, `Restored`. Clients holding the old public key keep working.
/// - no private key: a new pair is generated and persisted, replacing any
///   stale public key, `Generated`
pub fn ensure_keypair(paths: &KeyPaths) -> Result<(KeyPair, KeySource)> {
    if paths.private_key.exists() {
        let keypair = load_keypair(paths)?;
        if paths.public_key.exists() {
            return Ok((keypair, KeySource::Loaded));
        }
        save_public_key(paths, &keypair)?;
        return Ok((keypair, KeySource::Restored));
    }

    let keypair = KeyPair::generate()?;
    save_keypair(paths, &keypair)?;
    Ok((keypair, KeySource::Generated))
}

/// Explicit key generation; refuses to replace existing artifacts unless forced
pub fn generate_keypair_files(paths: &KeyPaths, force: bool) -> Result<KeyPair> {
    if paths.any_exist() && !force {
        return Err(TransferError::KeysExist(paths.private_key.clone()));
    }

    let keypair = KeyPair::generate()?;
    save_keypair(paths, &keypair)?;
    Ok(keypair)
}

/// Read the client-facing public key artifact
pub fn read_public_key(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(TransferError::PublicKeyMissing(path.to_path_buf()));
    }
    Ok(fs::read(path)?)
}
