//! Transfer frame encoding over an ordered byte stream.
//!
//! One frame per connection, client to server, no terminator and no version
//! field. Length prefixes are authoritative.
//!
//! # Frame Format
//!
//! ```text
//! +----------------------+
//! | filename_len (4)     |  u32 big-endian
//! +----------------------+
//! | filename             |  UTF-8, filename_len bytes
//! +----------------------+
//! | wrapped_key_len (4)  |  u32 big-endian
//! +----------------------+
//! | wrapped_key          |  RSA-OAEP ciphertext
//! +----------------------+
//! | payload_len (8)      |  u64 big-endian
//! +----------------------+
//! | payload              |  IV ‖ AES-256-CBC ciphertext
//! +----------------------+
//! ```

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::FrameError;

/// Upper bounds applied to each length prefix before anything is allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameLimits {
    pub max_filename_len: u32,
    pub max_wrapped_key_len: u32,
    pub max_payload_len: u64,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            max_filename_len: 4096,
            max_wrapped_key_len: 4096,
            max_payload_len: 4 * 1024 * 1024 * 1024,
        }
    }
}

/// A decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferFrame {
    pub filename: String,
    pub wrapped_key: Vec<u8>,
    /// IV ‖ ciphertext
    pub payload: Vec<u8>,
}

/// Write one frame: filename, wrapped key, payload, each length-prefixed.
///
/// The payload goes through `write_all`, so arbitrarily large payloads are
/// written across as many transport writes as needed. The stream is flushed
/// before returning.
pub async fn write_frame<W>(
    stream: &mut W,
    filename: &str,
    wrapped_key: &[u8],
    payload: &[u8],
) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let filename_len = u32::try_from(filename.len()).map_err(|_| FrameError::FieldTooLarge {
        field: "filename",
        len: filename.len() as u64,
        max: u32::MAX as u64,
    })?;
    let wrapped_key_len =
        u32::try_from(wrapped_key.len()).map_err(|_| FrameError::FieldTooLarge {
            field: "wrapped key",
            len: wrapped_key.len() as u64,
            max: u32::MAX as u64,
        })?;

    stream.write_all(&filename_len.to_be_bytes()).await?;
    stream.write_all(filename.as_bytes()).await?;

    stream.write_all(&wrapped_key_len.to_be_bytes()).await?;
    stream.write_all(wrapped_key).await?;

    stream.write_all(&(payload.len() as u64).to_be_bytes()).await?;
    stream.write_all(payload).await?;

    stream.flush().await?;
    Ok(())
}

/// Read one frame, field by field, in the fixed order.
///
/// # Errors
/// - `Truncated` if the stream ends inside any prefix or field
/// - `FieldTooLarge` if a prefix exceeds `limits`
/// - `InvalidFilename` if the filename is not UTF-8 or is not a bare file name
pub async fn read_frame<R>(stream: &mut R, limits: &FrameLimits) -> Result<TransferFrame, FrameError>
where
    R: AsyncRead + Unpin,
{
    let filename_len = read_prefix::<_, 4>(stream, "filename length").await?;
    let filename_len = u32::from_be_bytes(filename_len) as u64;
    check_limit("filename", filename_len, limits.max_filename_len as u64)?;
    let filename_bytes = read_field(stream, "filename", filename_len).await?;
    let filename = validate_filename(filename_bytes)?;

    let wrapped_key_len = read_prefix::<_, 4>(stream, "wrapped key length").await?;
    let wrapped_key_len = u32::from_be_bytes(wrapped_key_len) as u64;
    check_limit("wrapped key", wrapped_key_len, limits.max_wrapped_key_len as u64)?;
    let wrapped_key = read_field(stream, "wrapped key", wrapped_key_len).await?;

    let payload_len = read_prefix::<_, 8>(stream, "payload length").await?;
    let payload_len = u64::from_be_bytes(payload_len);
    check_limit("payload", payload_len, limits.max_payload_len)?;
    let payload = read_field(stream, "payload", payload_len).await?;

    Ok(TransferFrame {
        filename,
        wrapped_key,
        payload,
    })
}

fn check_limit(field: &'static str, len: u64, max: u64) -> Result<(), FrameError> {
    if len > max {
        return Err(FrameError::FieldTooLarge { field, len, max });
    }
    Ok(())
}

async fn read_prefix<R, const N: usize>(
    stream: &mut R,
    field: &'static str,
) -> Result<[u8; N], FrameError>
where
    R: AsyncRead + Unpin,
{
    let bytes = read_field(stream, field, N as u64).await?;
    let mut prefix = [0u8; N];
    prefix.copy_from_slice(&bytes);
    Ok(prefix)
}

/// Read exactly `len` bytes, growing the buffer as data arrives rather than
/// trusting the prefix for an up-front allocation.
async fn read_field<R>(stream: &mut R, field: &'static str, len: u64) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    const INITIAL_CAPACITY: u64 = 64 * 1024;

    let mut buf = Vec::with_capacity(len.min(INITIAL_CAPACITY) as usize);
    let received = (&mut *stream).take(len).read_to_end(&mut buf).await? as u64;
    if received < len {
        return Err(FrameError::Truncated {
            field,
            expected: len,
            received,
        });
    }
    Ok(buf)
}

/// Separators of the platform the file will be written on. A backslash is an
/// ordinary character in Unix file names.
fn is_separator(c: char) -> bool {
    c == '/' || c == '\0' || (cfg!(windows) && c == '\\')
}

/// Accept only a single normal path component so the name cannot escape the
/// save directory.
fn validate_filename(bytes: Vec<u8>) -> Result<String, FrameError> {
    let filename = String::from_utf8(bytes)
        .map_err(|_| FrameError::InvalidFilename("not valid UTF-8".into()))?;

    if filename.is_empty() {
        return Err(FrameError::InvalidFilename("empty".into()));
    }
    if filename.contains(is_separator) {
        return Err(FrameError::InvalidFilename(format!(
            "'{}' contains a path separator",
            filename
        )));
    }

    let mut components = Path::new(&filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(filename),
        _ => Err(FrameError::InvalidFilename(format!(
            "'{}' is not a plain file name",
            filename
        ))),
    }
}
