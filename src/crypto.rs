//! Sealing for the offline snapshot file.
//!
//! A sealed snapshot is
//! `salt(32) || nonce(12) || AES-256-GCM(b"CHARM_V1" || snapshot JSON)`,
//! keyed by Argon2id over the user's passphrase. Each save draws a fresh salt
//! and nonce.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const HEADER_LEN: usize = SALT_LEN + NONCE_LEN;

/// Argon2id cost: 64 MiB, 3 passes, 1 lane.
const KDF_MEMORY_KIB: u32 = 65536;
const KDF_PASSES: u32 = 3;

/// Version tag for the snapshot plaintext. `open` rejects payloads that lack
/// it, so a snapshot written under another layout never reaches the JSON parser.
const MAGIC: &[u8] = b"CHARM_V1";

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("key derivation failed")]
    KeyDerivation,
    #[error("encryption failed")]
    Encryption,
    #[error("decryption failed: wrong passphrase or corrupted snapshot")]
    Decryption,
    #[error("snapshot is too short to be sealed data")]
    Truncated,
}

fn cipher_for(passphrase: &str, salt: &[u8]) -> Result<Aes256Gcm, CryptoError> {
    let params = Params::new(KDF_MEMORY_KIB, KDF_PASSES, 1, Some(KEY_LEN))
        .map_err(|_| CryptoError::KeyDerivation)?;
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(passphrase.as_bytes(), salt, &mut *key)
        .map_err(|_| CryptoError::KeyDerivation)?;
    Aes256Gcm::new_from_slice(key.as_slice()).map_err(|_| CryptoError::KeyDerivation)
}

/// Seal serialized snapshot bytes under `passphrase`.
pub fn seal(passphrase: &str, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut header = [0u8; HEADER_LEN];
    rand::thread_rng().fill_bytes(&mut header);
    let (salt, nonce) = header.split_at(SALT_LEN);

    let cipher = cipher_for(passphrase, salt)?;
    let payload = Zeroizing::new([MAGIC, plaintext].concat());
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(nonce), payload.as_slice())
        .map_err(|_| CryptoError::Encryption)?;

    let mut sealed = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    sealed.extend_from_slice(&header);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Recover the snapshot bytes from a file written by [`seal`].
pub fn open(passphrase: &str, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < HEADER_LEN + MAGIC.len() {
        return Err(CryptoError::Truncated);
    }
    let (header, ciphertext) = sealed.split_at(HEADER_LEN);
    let (salt, nonce) = header.split_at(SALT_LEN);

    let cipher = cipher_for(passphrase, salt)?;
    let mut payload = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Decryption)?;

    let plaintext = payload.strip_prefix(MAGIC).map(<[u8]>::to_vec);
    payload.zeroize();
    plaintext.ok_or(CryptoError::Decryption)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_data_opens_with_same_passphrase() {
        let sealed = seal("correct horse", b"{\"profile\":null}").unwrap();
        assert_eq!(open("correct horse", &sealed).unwrap(), b"{\"profile\":null}");
    }

    #[test]
    fn wrong_passphrase_fails() {
        let sealed = seal("correct", b"cycle data").unwrap();
        assert!(matches!(
            open("wrong", &sealed),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let mut sealed = seal("pass", b"cycle data").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(open("pass", &sealed).is_err());
    }

    #[test]
    fn sealed_layout_carries_fresh_salt_and_nonce() {
        let a = seal("pass", b"{}").unwrap();
        let b = seal("pass", b"{}").unwrap();
        // tag is 16 bytes
        assert_eq!(a.len(), HEADER_LEN + MAGIC.len() + 2 + 16);
        assert_ne!(a[..HEADER_LEN], b[..HEADER_LEN]);
    }

    #[test]
    fn short_input_is_truncated() {
        assert!(matches!(open("any", &[0u8; 10]), Err(CryptoError::Truncated)));
    }
}
