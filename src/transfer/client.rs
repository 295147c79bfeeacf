//! Outbound transfer: encrypt one file and push it to the server

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use crate::config::{read_public_key, Settings};
use crate::crypto::{self, SymmetricKey};
use crate::error::{Result, TransferError};
use crate::sink::LogSink;

use super::framing::write_frame;

/// What a completed send put on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    pub filename: String,
    pub plaintext_len: u64,
    pub payload_len: u64,
}

/// Sends files to one server. Cheap to clone; every send uses its own
/// connection and its own symmetric key.
#[derive(Clone)]
pub struct TransferClient {
    server_addr: String,
    server_public_key: Arc<Vec<u8>>,
    sink: Arc<dyn LogSink>,
}

impl TransferClient {
    pub fn new(
        server_addr: impl Into<String>,
        server_public_key: Vec<u8>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            server_addr: server_addr.into(),
            server_public_key: Arc::new(server_public_key),
            sink,
        }
    }

    /// Build from settings, reading the server public key artifact
    ///
    /// # Errors
    /// `PublicKeyMissing` if the key file is absent.
    pub fn from_settings(settings: &Settings, sink: Arc<dyn LogSink>) -> Result<Self> {
        let public_key = match read_public_key(&settings.public_key_path) {
            Ok(key) => key,
            Err(e) => {
                sink.error(&format!("Cannot send files: {}", e));
                return Err(e);
            }
        };
        Ok(Self::new(settings.server_addr(), public_key, sink))
    }

    pub fn server_addr(&self) -> &str {
        &self.server_addr
    }

    /// Encrypt `file_path` and deliver it in a single frame.
    ///
    /// Completes once the frame is flushed to the transport; the server sends
    /// no acknowledgment.
    pub async fn send_file(&self, file_path: impl AsRef<Path>) -> Result<SendReport> {
        let file_path = file_path.as_ref();
        let result = self.try_send(file_path).await;
        match &result {
            Ok(report) => self.sink.success(&format!(
                "File '{}' sent to {} ({} bytes encrypted)",
                report.filename, self.server_addr, report.payload_len
            )),
            Err(e) => self
                .sink
                .error(&format!("Sending '{}' failed: {}", file_path.display(), e)),
        }
        result
    }

    /// Run `send_file` on a background task
    pub fn spawn_send(&self, file_path: impl Into<PathBuf>) -> JoinHandle<Result<SendReport>> {
        let client = self.clone();
        let file_path = file_path.into();
        tokio::spawn(async move { client.send_file(file_path).await })
    }

    async fn try_send(&self, file_path: &Path) -> Result<SendReport> {
        if !file_path.is_file() {
            return Err(TransferError::FileNotFound(file_path.to_path_buf()));
        }

        let filename = file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| TransferError::FileNotFound(file_path.to_path_buf()))?;

        let contents = tokio::fs::read(file_path).await?;
        log::debug!("Read {} bytes from {}", contents.len(), file_path.display());

        let key = crypto::generate_symmetric_key();
        let (payload, wrapped_key) = seal(&contents, &key, &self.server_public_key)?;
        drop(key);

        let mut stream = TcpStream::connect(&self.server_addr)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::ConnectionRefused => {
                    TransferError::ConnectionRefused(self.server_addr.clone())
                }
                _ => TransferError::Io(e),
            })?;
        self.sink
            .info(&format!("Connected to server at {}", self.server_addr));

        write_frame(&mut stream, &filename, &wrapped_key, &payload).await?;
        stream.shutdown().await?;

        Ok(SendReport {
            filename,
            plaintext_len: contents.len() as u64,
            payload_len: payload.len() as u64,
        })
    }
}

/// Encrypt the contents and wrap the key; returns (payload, wrapped key)
fn seal(contents: &[u8], key: &SymmetricKey, public_key: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let payload = crypto::encrypt_payload(contents, key)?;
    let wrapped_key = crypto::wrap_key(key, public_key)?;
    Ok((payload, wrapped_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MemorySink, Severity};

    #[tokio::test]
    async fn test_missing_file_reported() {
        let sink = MemorySink::new();
        let client = TransferClient::new("127.0.0.1:1", b"unused".to_vec(), Arc::new(sink.clone()));

        let result = client.send_file("/definitely/not/here.txt").await;

        assert!(matches!(result, Err(TransferError::FileNotFound(_))));
        assert!(sink.contains(Severity::Error, "File not found"));
    }

    #[tokio::test]
    async fn test_invalid_public_key_fails_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("note.txt");
        std::fs::write(&file, b"data").unwrap();

        let client = TransferClient::new(
            "127.0.0.1:1",
            b"not a key".to_vec(),
            Arc::new(MemorySink::new()),
        );
        let result = client.send_file(&file).await;

        assert!(matches!(result, Err(TransferError::InvalidKey(_))));
    }

    #[test]
    fn test_from_settings_without_public_key() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            public_key_path: dir.path().join("server_public.pem"),
            ..Settings::default()
        };
        let sink = MemorySink::new();

        let result = TransferClient::from_settings(&settings, Arc::new(sink.clone()));
        assert!(matches!(result, Err(TransferError::PublicKeyMissing(_))));
        assert!(sink.contains(Severity::Error, "Cannot send files"));
    }
}
