//! Genome Vault - Per-Record Key Derivation
//!
//! PBKDF2-HMAC-SHA256 turning a DNA sequence into the key that protects
//! the record's personal fields. The sequence itself is protected
//! separately by the master key (envelope within an envelope).

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use crate::crypto::keys::{RecordKey, KEY_LEN};
use crate::error::{VaultError, VaultResult};

/// KDF salt, shared by every record. Identical DNA sequences across
/// records therefore derive identical field keys - a known weakness of
/// the inherited data format, kept for ciphertext compatibility.
pub const KDF_SALT: &[u8] = b"static_salt_123";

/// PBKDF2 iteration count
pub const KDF_ITERATIONS: u32 = 100_000;

/// Derive the per-record field key from a plaintext DNA sequence.
///
/// Deterministic: the same sequence always yields the same key.
pub fn derive_record_key(dna_sequence: &str) -> VaultResult<RecordKey> {
    if dna_sequence.is_empty() {
        return Err(VaultError::KeyDerivationFailed(
            "DNA sequence must not be empty".into(),
        ));
    }

    let mut okm = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(dna_sequence.as_bytes(), KDF_SALT, KDF_ITERATIONS, &mut okm);

    Ok(RecordKey::new(okm))
}
