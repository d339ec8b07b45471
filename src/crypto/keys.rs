//! Genome Vault - Key Material
//!
//! Record keys wrapped for zeroization, plus the fixed master key
//! protecting stored DNA sequences.

use rand::RngCore;
use secrecy::{ExposeSecret, Secret};
use zeroize::ZeroizeOnDrop;

/// Key length for AES-256
pub const KEY_LEN: usize = 32;

/// IV length for AES-CBC
pub const IV_LEN: usize = 16;

/// Fixed master key for DNA sequence encryption.
///
/// Inherited from the deployed data format; rotating it requires
/// re-encrypting every stored DNA ciphertext.
pub const MASTER_KEY: &[u8; KEY_LEN] = b"kJ7@p9$Z1wQx%V8nE4mT&h2!Lr3Yf6#B";

/// Secure key wrapper with automatic zeroization
#[derive(Clone, ZeroizeOnDrop)]
pub struct RecordKey {
    #[zeroize(skip)]
    inner: Secret<[u8; KEY_LEN]>,
}

impl RecordKey {
    /// Create a new record key from bytes
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            inner: Secret::new(bytes),
        }
    }

    /// The master key protecting DNA ciphertexts
    pub fn master() -> Self {
        Self::new(*MASTER_KEY)
    }

    /// Expose the key bytes (use with caution)
    pub fn expose(&self) -> &[u8; KEY_LEN] {
        self.inner.expose_secret()
    }

    /// Generate a random key
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::new(bytes)
    }
}

/// Generate a random IV for AES-CBC
pub fn generate_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    iv
}
