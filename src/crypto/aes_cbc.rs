//! AES-256-CBC payload encryption
//!
//! Payload layout: [16 bytes: IV][N * 16 bytes: ciphertext]
//!
//! Padding is the PKCS#7 shape (`n` bytes of value `n`), applied and removed
//! here rather than by the cipher crate. `unpad` trusts the final byte and
//! performs no validation: a wrong key or a corrupted last block yields
//! truncated garbage instead of an error. CBC carries no authentication tag,
//! so tampering is not detected either. Changing either behavior breaks wire
//! compatibility with existing peers.

use aes::Aes256;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;

use super::{SymmetricKey, BLOCK_SIZE};
use crate::error::{Result, TransferError};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Append `n` bytes of value `n`, where `n` is in `1..=BLOCK_SIZE`.
///
/// Block-aligned input still gains a full block of padding.
pub fn pad(data: &[u8]) -> Vec<u8> {
    let n = BLOCK_SIZE - data.len() % BLOCK_SIZE;
    let mut padded = Vec::with_capacity(data.len() + n);
    padded.extend_from_slice(data);
    padded.resize(data.len() + n, n as u8);
    padded
}

/// Drop the last `n` bytes, where `n` is the value of the final byte.
///
/// No check is made that the removed bytes are valid padding. Empty input,
/// `n == 0` and `n >= len` all produce an empty result.
pub fn unpad(padded: &[u8]) -> &[u8] {
    let Some(&last) = padded.last() else {
        return padded;
    };
    let n = last as usize;
    if n == 0 || n >= padded.len() {
        return &padded[..0];
    }
    &padded[..padded.len() - n]
}

/// Encrypt a file's contents with AES-256-CBC
///
/// # Arguments
/// * `plaintext` - Whole file contents, any length
/// * `key` - Per-transfer symmetric key
///
/// # Returns
/// IV ‖ ciphertext, always `16 + 16 * k` bytes with `k >= 1`
///
/// # Security Notes
/// - Uses a fresh random IV for each encryption
/// - No authentication tag: tampering is not detected
/// - The key must not be reused across transfers
pub fn encrypt_payload(plaintext: &[u8], key: &SymmetricKey) -> Result<Vec<u8>> {
    let mut iv = [0u8; BLOCK_SIZE];
    OsRng.fill_bytes(&mut iv);

    let cipher = Aes256CbcEnc::new_from_slices(key.as_bytes(), &iv)
        .map_err(|e| TransferError::Encryption(e.to_string()))?;

    let mut buf = pad(plaintext);
    let len = buf.len();
    cipher
        .encrypt_padded_mut::<NoPadding>(&mut buf, len)
        .map_err(|_| TransferError::Encryption("plaintext is not block aligned".into()))?;

    let mut payload = Vec::with_capacity(BLOCK_SIZE + len);
    payload.extend_from_slice(&iv);
    payload.extend_from_slice(&buf);
    Ok(payload)
}

/// Decrypt a payload produced by `encrypt_payload`
///
/// # Arguments
/// * `iv_and_ciphertext` - IV followed by block-aligned ciphertext
/// * `key` - The symmetric key recovered by unwrapping
///
/// # Returns
/// The plaintext with padding removed
///
/// # Errors
/// `Decryption` if the payload is shorter than one IV plus one block or the
/// ciphertext is not block aligned.
///
/// # Security Notes
/// - A wrong key or corrupted ciphertext yields garbage, not an error
/// - Padding is removed without validation
pub fn decrypt_payload(iv_and_ciphertext: &[u8], key: &SymmetricKey) -> Result<Vec<u8>> {
    if iv_and_ciphertext.len() < 2 * BLOCK_SIZE {
        return Err(TransferError::Decryption);
    }
    let (iv, ciphertext) = iv_and_ciphertext.split_at(BLOCK_SIZE);
    if ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(TransferError::Decryption);
    }

    let cipher =
        Aes256CbcDec::new_from_slices(key.as_bytes(), iv).map_err(|_| TransferError::Decryption)?;

    let mut buf = ciphertext.to_vec();
    let decrypted = cipher
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|_| TransferError::Decryption)?;

    Ok(unpad(decrypted).to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_lengths() {
        assert_eq!(pad(b"").len(), BLOCK_SIZE);
        assert_eq!(pad(&[0u8; 15]).len(), BLOCK_SIZE);
        assert_eq!(pad(&[0u8; 16]).len(), 2 * BLOCK_SIZE);
        assert_eq!(pad(&[0u8; 17]).len(), 2 * BLOCK_SIZE);

        let padded = pad(b"abc");
        assert!(padded[3..].iter().all(|&b| b == 13));
    }

    #[test]
    fn test_unpad_inverts_pad() {
        for len in 0..=48 {
            let data: Vec<u8> = (0..len as u8).collect();
            assert_eq!(unpad(&pad(&data)), &data[..]);
        }
    }

    #[test]
    fn test_unpad_trusts_last_byte() {
        // A corrupted pad byte silently truncates instead of failing
        let mut padded = pad(b"hello world");
        let last = padded.len() - 1;
        padded[last] = 3;
        assert_eq!(unpad(&padded), &padded[..padded.len() - 3]);

        assert_eq!(unpad(&[]), &[] as &[u8]);
        assert_eq!(unpad(&[1, 2, 0]), &[] as &[u8]);
        assert_eq!(unpad(&[1, 2, 200]), &[] as &[u8]);
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = SymmetricKey::generate();
        let cases: [&[u8]; 4] = [b"", b"x", &[0x5A; 16], &[0xA5; 1000]];
        for plaintext in cases {
            let payload = encrypt_payload(plaintext, &key).unwrap();
            assert_eq!((payload.len() - BLOCK_SIZE) % BLOCK_SIZE, 0);
            assert_eq!(decrypt_payload(&payload, &key).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_same_plaintext_gives_different_payloads() {
        let key = SymmetricKey::generate();
        let plaintext = b"Same message";

        let first = encrypt_payload(plaintext, &key).unwrap();
        let second = encrypt_payload(plaintext, &key).unwrap();

        assert_ne!(first[..BLOCK_SIZE], second[..BLOCK_SIZE]);
        assert_ne!(first, second);
    }

    #[test]
    fn test_wrong_key_is_not_detected() {
        let key = SymmetricKey::generate();
        let other = SymmetricKey::generate();
        let plaintext = b"Secret message that spans more than one block";

        let payload = encrypt_payload(plaintext, &key).unwrap();
        // Either garbage or, if the garbage ends in 1..=16, a decode; never the plaintext
        if let Ok(decrypted) = decrypt_payload(&payload, &other) {
            assert_ne!(decrypted, plaintext);
        }
    }

    #[test]
    fn test_malformed_payload_rejected() {
        let key = SymmetricKey::generate();

        assert!(matches!(decrypt_payload(&[], &key), Err(TransferError::Decryption)));
        assert!(matches!(
            decrypt_payload(&[0u8; BLOCK_SIZE], &key),
            Err(TransferError::Decryption)
        ));
        assert!(matches!(
            decrypt_payload(&[0u8; BLOCK_SIZE * 2 + 3], &key),
            Err(TransferError::Decryption)
        ));
    }
}
