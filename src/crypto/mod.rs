//! Genome Vault - Crypto Module
//!
//! - `keys`: zeroized key wrapper + fixed master key
//! - `kdf`: PBKDF2 per-record key derivation from DNA sequences
//! - `cbc`: AES-256-CBC field encryption (base64 iv||ct blobs)

pub mod cbc;
pub mod kdf;
pub mod keys;

pub use cbc::{decrypt_with_key, encrypt_with_key};
pub use kdf::{derive_record_key, KDF_ITERATIONS, KDF_SALT};
pub use keys::{generate_iv, RecordKey, IV_LEN, KEY_LEN, MASTER_KEY};
