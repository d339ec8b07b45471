//! Genome Vault - Field Encryption
//!
//! AES-256-CBC with PKCS7 padding. Blob layout (base64, standard
//! alphabet): `base64(iv || ciphertext)`, 16-byte random IV per call.

use aes::Aes256;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::crypto::keys::{generate_iv, RecordKey, IV_LEN};
use crate::error::{VaultError, VaultResult};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES block size; ciphertext length is always a multiple of this
const BLOCK_LEN: usize = 16;

/// Encrypt text under a key. Each call uses a fresh IV, so two
/// encryptions of the same plaintext produce different blobs.
pub fn encrypt_with_key(plaintext: &str, key: &RecordKey) -> VaultResult<String> {
    let iv = generate_iv();

    let cipher = Aes256CbcEnc::new_from_slices(key.expose(), &iv)
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    let mut raw = Vec::with_capacity(IV_LEN + ciphertext.len());
    raw.extend_from_slice(&iv);
    raw.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(raw))
}

/// Decrypt a blob produced by [`encrypt_with_key`].
///
/// Fails closed: bad base64, truncated blob, invalid padding (wrong key
/// or corruption) and non-UTF8 plaintext all surface as
/// `DecryptionFailed`, never partial plaintext.
pub fn decrypt_with_key(blob: &str, key: &RecordKey) -> VaultResult<String> {
    let raw = BASE64
        .decode(blob)
        .map_err(|_| VaultError::DecryptionFailed("invalid base64".into()))?;

    if raw.len() < IV_LEN + BLOCK_LEN || (raw.len() - IV_LEN) % BLOCK_LEN != 0 {
        return Err(VaultError::DecryptionFailed("blob too short".into()));
    }

    let (iv, ciphertext) = raw.split_at(IV_LEN);

    let cipher = Aes256CbcDec::new_from_slices(key.expose(), iv)
        .map_err(|e| VaultError::DecryptionFailed(e.to_string()))?;

    let plaintext = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| VaultError::DecryptionFailed("invalid padding or wrong key".into()))?;

    String::from_utf8(plaintext)
        .map_err(|_| VaultError::DecryptionFailed("plaintext is not UTF-8".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let key = RecordKey::generate();
        let blob = encrypt_with_key("John Doe, 123 Main St", &key).unwrap();
        let plain = decrypt_with_key(&blob, &key).unwrap();
        assert_eq!(plain, "John Doe, 123 Main St");
    }

    #[test]
    fn test_empty_plaintext_roundtrip() {
        let key = RecordKey::generate();
        let blob = encrypt_with_key("", &key).unwrap();
        assert_eq!(decrypt_with_key(&blob, &key).unwrap(), "");
    }

    #[test]
    fn test_iv_freshness() {
        let key = RecordKey::generate();
        let b1 = encrypt_with_key("same plaintext", &key).unwrap();
        let b2 = encrypt_with_key("same plaintext", &key).unwrap();
        assert_ne!(b1, b2);
        assert_eq!(decrypt_with_key(&b1, &key).unwrap(), "same plaintext");
        assert_eq!(decrypt_with_key(&b2, &key).unwrap(), "same plaintext");
    }

    #[test]
    fn test_wrong_key_fails() {
        let blob = encrypt_with_key("secret", &RecordKey::generate()).unwrap();
        let result = decrypt_with_key(&blob, &RecordKey::generate());
        assert!(matches!(result, Err(VaultError::DecryptionFailed(_))));
    }

    #[test]
    fn test_garbage_blob_fails() {
        let key = RecordKey::generate();
        assert!(decrypt_with_key("not base64 !!!", &key).is_err());
        assert!(decrypt_with_key("QUJD", &key).is_err()); // too short
    }
}
