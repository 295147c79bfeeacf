//! Receiving side: accept one connection at a time, decrypt, persist
//!
//! State machine:
//! - `Stopped`: no listener bound
//! - `start`: bind; on failure remain `Stopped` and report the error
//! - `Running`: a background task accepts, handles each connection to
//!   completion, then accepts the next one
//! - `stop`: cancel the task's token, wait for it to exit and drop the
//!   listener, back to `Stopped`
//!
//! A failed connection (bad frame, wrong key, disk error) is reported through
//! the sink and never ends the accept loop.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rsa::RsaPrivateKey;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{ensure_keypair, KeySource, Settings};
use crate::crypto::{self, KeyPair};
use crate::error::{Result, TransferError};
use crate::sink::LogSink;

use super::framing::{read_frame, FrameLimits, TransferFrame};

/// Fixed per-instance parameters
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub bind_addr: String,
    pub default_save_dir: PathBuf,
    pub limits: FrameLimits,
    pub connection_timeout: Duration,
}

impl From<&Settings> for ServerOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            bind_addr: settings.bind_addr(),
            default_save_dir: settings.save_dir.clone(),
            limits: settings.limits,
            connection_timeout: settings.connection_timeout(),
        }
    }
}

enum RunState {
    Stopped,
    Running {
        cancel: CancellationToken,
        worker: JoinHandle<()>,
        local_addr: SocketAddr,
    },
}

/// Everything the accept loop needs, shared with the background task
struct Receiver {
    private_key: RsaPrivateKey,
    limits: FrameLimits,
    connection_timeout: Duration,
    sink: Arc<dyn LogSink>,
}

pub struct TransferServer {
    options: ServerOptions,
    receiver: Arc<Receiver>,
    state: Mutex<RunState>,
}

impl TransferServer {
    /// Create a server around an already loaded key pair
    pub fn new(options: ServerOptions, keypair: &KeyPair, sink: Arc<dyn LogSink>) -> Result<Self> {
        let private_key = crypto::parse_private_key(keypair.private_key_pem())?;
        Ok(Self {
            receiver: Arc::new(Receiver {
                private_key,
                limits: options.limits,
                connection_timeout: options.connection_timeout,
                sink,
            }),
            options,
            state: Mutex::new(RunState::Stopped),
        })
    }

    /// Load the key pair named by `settings`, generating and persisting one
    /// on first use, then build the server.
    pub fn bootstrap(settings: &Settings, sink: Arc<dyn LogSink>) -> Result<Self> {
        let paths = settings.key_paths();
        let (keypair, source) = match ensure_keypair(&paths) {
            Ok(found) => found,
            Err(e) => {
                sink.error(&format!("Server key setup failed: {}", e));
                return Err(e);
            }
        };
        match source {
            KeySource::Generated => sink.info(&format!(
                "Generated new key pair; public key written to {}",
                paths.public_key.display()
            )),
            KeySource::Loaded => sink.info(&format!(
                "Loaded server key from {}",
                paths.private_key.display()
            )),
            KeySource::Restored => sink.warning(&format!(
                "Public key was missing; rewrote {} from the existing private key",
                paths.public_key.display()
            )),
        }
        Self::new(ServerOptions::from(settings), &keypair, sink)
    }

    /// Bind and start accepting in the background. Returns the bound address.
    ///
    /// `save_dir` of `None` uses the configured default directory.
    ///
    /// # Errors
    /// `AlreadyRunning` if started twice; `Bind` if the address cannot be
    /// bound, in which case the server stays stopped.
    pub async fn start(&self, save_dir: Option<PathBuf>) -> Result<SocketAddr> {
        let sink = &self.receiver.sink;
        let mut state = self.state.lock().await;
        if matches!(*state, RunState::Running { .. }) {
            sink.warning("Server is already running.");
            return Err(TransferError::AlreadyRunning);
        }

        sink.info(&format!("Starting server on {}...", self.options.bind_addr));
        let listener = match TcpListener::bind(&self.options.bind_addr).await {
            Ok(listener) => listener,
            Err(source) => {
                let err = TransferError::Bind {
                    addr: self.options.bind_addr.clone(),
                    source,
                };
                sink.error(&format!("Server startup error: {}", err));
                return Err(err);
            }
        };
        let local_addr = listener.local_addr()?;
        sink.info(&format!("Server listening on {}", local_addr));

        let save_dir = save_dir.unwrap_or_else(|| self.options.default_save_dir.clone());
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(accept_loop(
            listener,
            save_dir,
            Arc::clone(&self.receiver),
            cancel.clone(),
        ));

        *state = RunState::Running {
            cancel,
            worker,
            local_addr,
        };
        Ok(local_addr)
    }

    /// Request a stop and wait until the listener is released.
    ///
    /// Returns `false` (and reports it) when the server was not running. A
    /// transfer in progress finishes before the loop exits.
    pub async fn stop(&self) -> bool {
        let mut state = self.state.lock().await;
        let RunState::Running { cancel, worker, .. } =
            std::mem::replace(&mut *state, RunState::Stopped)
        else {
            self.receiver.sink.warning("Server is not running.");
            return false;
        };

        self.receiver.sink.info("Stopping server...");
        cancel.cancel();
        if let Err(e) = worker.await {
            self.receiver
                .sink
                .error(&format!("Server task ended abnormally: {}", e));
        }
        self.receiver.sink.info("Server socket closed.");
        true
    }

    pub async fn is_running(&self) -> bool {
        matches!(*self.state.lock().await, RunState::Running { .. })
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        match *self.state.lock().await {
            RunState::Running { local_addr, .. } => Some(local_addr),
            RunState::Stopped => None,
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    save_dir: PathBuf,
    receiver: Arc<Receiver>,
    cancel: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                receiver.sink.info(&format!("Connected by {}", peer));
                match receiver.handle_connection(stream, &save_dir).await {
                    Ok(path) => receiver
                        .sink
                        .success(&format!("File decrypted and saved as '{}'", path.display())),
                    Err(e) => {
                        receiver
                            .sink
                            .error(&format!("Error during file transfer from {}: {}", peer, e));
                        receiver
                            .sink
                            .warning("Server encountered an error, but will continue listening.");
                    }
                }
            }
            Err(e) => {
                // Usually transient (e.g. EMFILE); back off briefly instead of spinning
                receiver.sink.error(&format!("Accept failed: {}", e));
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_millis(100)) => {}
                }
            }
        }
    }

    drop(listener);
    receiver.sink.info("Server stopped listening.");
}

impl Receiver {
    /// Read one frame from `stream`, decrypt it and write it into `save_dir`.
    /// Returns the path of the written file.
    async fn handle_connection(
        self: &Arc<Self>,
        mut stream: TcpStream,
        save_dir: &Path,
    ) -> Result<PathBuf> {
        let frame = tokio::time::timeout(
            self.connection_timeout,
            read_frame(&mut stream, &self.limits),
        )
        .await
        .map_err(|_| TransferError::Timeout(self.connection_timeout.as_secs()))??;

        self.sink.info(&format!(
            "Receiving file '{}' ({} encrypted bytes)",
            frame.filename,
            frame.payload.len()
        ));

        let (filename, plaintext) = self.open(frame).await?;

        tokio::fs::create_dir_all(save_dir).await?;
        let save_path = save_dir.join(&filename);
        tokio::fs::write(&save_path, &plaintext).await?;
        Ok(save_path)
    }

    /// Unwrap the symmetric key, then decrypt the payload with it.
    ///
    /// Runs on the blocking pool so a multi-gigabyte payload does not stall
    /// the runtime. Returns the filename with the plaintext.
    async fn open(self: &Arc<Self>, frame: TransferFrame) -> Result<(String, Vec<u8>)> {
        let receiver = Arc::clone(self);
        tokio::task::spawn_blocking(move || -> Result<(String, Vec<u8>)> {
            let key = crypto::unwrap_with(&frame.wrapped_key, &receiver.private_key)?;
            log::debug!("Symmetric key unwrapped for '{}'", frame.filename);
            let plaintext = crypto::decrypt_payload(&frame.payload, &key)?;
            Ok((frame.filename, plaintext))
        })
        .await
        .map_err(|e| TransferError::Io(std::io::Error::other(e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MemorySink, Severity};

    fn options(save_dir: PathBuf) -> ServerOptions {
        ServerOptions {
            bind_addr: "127.0.0.1:0".to_string(),
            default_save_dir: save_dir,
            limits: FrameLimits::default(),
            connection_timeout: Duration::from_secs(5),
        }
    }

    fn receiver(keypair: &KeyPair, sink: &MemorySink) -> Arc<Receiver> {
        Arc::new(Receiver {
            private_key: crypto::parse_private_key(keypair.private_key_pem()).unwrap(),
            limits: FrameLimits::default(),
            connection_timeout: Duration::from_secs(5),
            sink: Arc::new(sink.clone()),
        })
    }

    fn sealed_frame(keypair: &KeyPair, filename: &str, contents: &[u8]) -> TransferFrame {
        let key = crypto::generate_symmetric_key();
        TransferFrame {
            filename: filename.to_string(),
            wrapped_key: crypto::wrap_key(&key, keypair.public_key_pem()).unwrap(),
            payload: crypto::encrypt_payload(contents, &key).unwrap(),
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_open_leaves_runtime_free() {
        use std::sync::atomic::{AtomicU64, Ordering};

        let keypair = KeyPair::generate().unwrap();
        let receiver = receiver(&keypair, &MemorySink::new());
        let contents = vec![0x42u8; 1024 * 1024];
        let frame = sealed_frame(&keypair, "big.bin", &contents);

        let ticks = Arc::new(AtomicU64::new(0));
        let ticker = {
            let ticks = Arc::clone(&ticks);
            tokio::spawn(async move {
                loop {
                    ticks.fetch_add(1, Ordering::Relaxed);
                    tokio::task::yield_now().await;
                }
            })
        };

        let (filename, plaintext) = receiver.open(frame).await.unwrap();
        ticker.abort();

        assert_eq!(filename, "big.bin");
        assert!(plaintext == contents);
        // Single-threaded runtime: the ticker only ran if `open` yielded
        assert!(ticks.load(Ordering::Relaxed) > 0);
    }

    #[tokio::test]
    async fn test_open_rejects_tampered_key() {
        let keypair = KeyPair::generate().unwrap();
        let receiver = receiver(&keypair, &MemorySink::new());
        let mut frame = sealed_frame(&keypair, "x.txt", b"data");
        frame.wrapped_key[10] ^= 0x80;

        assert!(matches!(receiver.open(frame).await, Err(TransferError::Decryption)));
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::new();
        let keypair = KeyPair::generate().unwrap();
        let server =
            TransferServer::new(options(dir.path().to_path_buf()), &keypair, Arc::new(sink.clone()))
                .unwrap();

        assert!(!server.stop().await);
        assert!(sink.contains(Severity::Warning, "not running"));
    }

    #[tokio::test]
    async fn test_start_twice_and_restart() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::new();
        let keypair = KeyPair::generate().unwrap();
        let server =
            TransferServer::new(options(dir.path().to_path_buf()), &keypair, Arc::new(sink.clone()))
                .unwrap();

        let addr = server.start(None).await.unwrap();
        assert!(server.is_running().await);
        assert_eq!(server.local_addr().await, Some(addr));
        assert!(matches!(server.start(None).await, Err(TransferError::AlreadyRunning)));

        assert!(server.stop().await);
        assert!(!server.is_running().await);
        assert!(sink.contains(Severity::Info, "Server stopped listening"));

        // Listener was released, so a fresh start works
        server.start(None).await.unwrap();
        assert!(server.stop().await);
    }

    #[tokio::test]
    async fn test_bind_conflict_leaves_server_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut opts = options(dir.path().to_path_buf());
        opts.bind_addr = occupied.local_addr().unwrap().to_string();

        let sink = MemorySink::new();
        let keypair = KeyPair::generate().unwrap();
        let server = TransferServer::new(opts, &keypair, Arc::new(sink.clone())).unwrap();

        assert!(matches!(server.start(None).await, Err(TransferError::Bind { .. })));
        assert!(!server.is_running().await);
        assert!(sink.contains(Severity::Error, "startup error"));
    }
}
