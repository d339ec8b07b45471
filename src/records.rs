//! Genome Vault - Encrypted Patient Records
//!
//! Two-tier envelope: the DNA sequence is encrypted under the fixed
//! master key, and every personal field is encrypted under a key
//! derived from the plaintext sequence. Neither the sequence nor the
//! derived key is ever persisted.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Local;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::crypto::{decrypt_with_key, derive_record_key, encrypt_with_key, RecordKey};
use crate::error::{VaultError, VaultResult};

/// Timestamp format for record metadata
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A record row as persisted: opaque ciphertext blobs plus metadata
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub fields: BTreeMap<String, String>,
    pub dna_ciphertext: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A fully decrypted record
#[derive(Debug, Clone)]
pub struct DecryptedRecord {
    pub record_id: String,
    pub fields: BTreeMap<String, String>,
    pub dna_sequence: String,
    pub created_at: String,
    pub updated_at: String,
}

/// SQLite-backed persistence for record envelopes.
///
/// Three linked tables keyed by record id: metadata, per-field
/// ciphertexts and the DNA ciphertext. All mutations run inside one
/// transaction, so readers observe pre- or post-mutation state only.
pub struct RecordStore {
    conn: Mutex<Connection>,
}

impl RecordStore {
    /// Open (creating if needed) the record database
    pub fn open<P: AsRef<Path>>(path: P) -> VaultResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path.as_ref())?;
        Self::from_connection(conn)
    }

    /// In-memory store for tests
    pub fn open_in_memory() -> VaultResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> VaultResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                record_id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS record_fields (
                record_id TEXT NOT NULL,
                name TEXT NOT NULL,
                ciphertext TEXT NOT NULL,
                PRIMARY KEY (record_id, name),
                FOREIGN KEY (record_id) REFERENCES records(record_id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS dna_sequence (
                record_id TEXT PRIMARY KEY,
                ciphertext TEXT NOT NULL,
                FOREIGN KEY (record_id) REFERENCES records(record_id) ON DELETE CASCADE
            );
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Check whether a record id is taken
    pub fn exists(&self, record_id: &str) -> VaultResult<bool> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE record_id = ?1",
            params![record_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Insert a complete envelope. Rejects duplicates; on any failure
    /// nothing is committed.
    pub fn put(
        &self,
        record_id: &str,
        fields: &BTreeMap<String, String>,
        dna_ciphertext: &str,
        now: &str,
    ) -> VaultResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM records WHERE record_id = ?1",
            params![record_id],
            |row| row.get(0),
        )?;
        if count > 0 {
            return Err(VaultError::DuplicateId(record_id.to_string()));
        }

        tx.execute(
            "INSERT INTO records (record_id, created_at, updated_at) VALUES (?1, ?2, ?3)",
            params![record_id, now, now],
        )?;

        for (name, ciphertext) in fields {
            tx.execute(
                "INSERT INTO record_fields (record_id, name, ciphertext) VALUES (?1, ?2, ?3)",
                params![record_id, name, ciphertext],
            )?;
        }

        tx.execute(
            "INSERT INTO dna_sequence (record_id, ciphertext) VALUES (?1, ?2)",
            params![record_id, dna_ciphertext],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Fetch a complete envelope, or `None` for an unknown id
    pub fn get(&self, record_id: &str) -> VaultResult<Option<StoredRecord>> {
        let conn = self.conn.lock();

        let meta: Option<(String, String)> = conn
            .query_row(
                "SELECT created_at, updated_at FROM records WHERE record_id = ?1",
                params![record_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (created_at, updated_at) = match meta {
            Some(m) => m,
            None => return Ok(None),
        };

        let dna_ciphertext: String = conn.query_row(
            "SELECT ciphertext FROM dna_sequence WHERE record_id = ?1",
            params![record_id],
            |row| row.get(0),
        )?;

        let mut stmt =
            conn.prepare("SELECT name, ciphertext FROM record_fields WHERE record_id = ?1")?;
        let rows = stmt.query_map(params![record_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut fields = BTreeMap::new();
        for row in rows {
            let (name, ciphertext) = row?;
            fields.insert(name, ciphertext);
        }

        Ok(Some(StoredRecord {
            fields,
            dna_ciphertext,
            created_at,
            updated_at,
        }))
    }

    /// Remove the envelope. Returns `false` for an unknown id; no
    /// partial deletion state is observable.
    pub fn delete(&self, record_id: &str) -> VaultResult<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM records WHERE record_id = ?1",
            params![record_id],
            |row| row.get(0),
        )?;
        if count == 0 {
            return Ok(false);
        }

        tx.execute(
            "DELETE FROM record_fields WHERE record_id = ?1",
            params![record_id],
        )?;
        tx.execute(
            "DELETE FROM dna_sequence WHERE record_id = ?1",
            params![record_id],
        )?;
        tx.execute(
            "DELETE FROM records WHERE record_id = ?1",
            params![record_id],
        )?;

        tx.commit()?;
        Ok(true)
    }
}

/// Two-tier envelope encryption over a [`RecordStore`]
pub struct RecordVault {
    store: RecordStore,
    master: RecordKey,
}

impl RecordVault {
    /// Open the vault over a database file, using the fixed master key
    pub fn open<P: AsRef<Path>>(path: P) -> VaultResult<Self> {
        Ok(Self {
            store: RecordStore::open(path)?,
            master: RecordKey::master(),
        })
    }

    /// Vault over an explicit store and master key
    pub fn with_master_key(store: RecordStore, master: RecordKey) -> Self {
        Self { store, master }
    }

    /// Encrypt and persist a record.
    ///
    /// Every personal field is encrypted independently (its own IV)
    /// under the sequence-derived key; the sequence is encrypted under
    /// the master key. All-or-nothing.
    pub fn store(
        &self,
        record_id: &str,
        fields: &BTreeMap<String, String>,
        dna_sequence: &str,
    ) -> VaultResult<()> {
        if record_id.is_empty() {
            return Err(VaultError::InvalidInput("record id must not be empty".into()));
        }

        let dna_ciphertext = encrypt_with_key(dna_sequence, &self.master)?;
        let key = derive_record_key(dna_sequence)?;

        let mut encrypted = BTreeMap::new();
        for (name, value) in fields {
            encrypted.insert(name.clone(), encrypt_with_key(value, &key)?);
        }

        let now = Local::now().format(TIMESTAMP_FORMAT).to_string();
        self.store.put(record_id, &encrypted, &dna_ciphertext, &now)
    }

    /// Decrypt a record.
    ///
    /// Fail-closed: a single field that fails to decrypt aborts the
    /// whole retrieval.
    pub fn retrieve(&self, record_id: &str) -> VaultResult<DecryptedRecord> {
        let stored = self
            .store
            .get(record_id)?
            .ok_or_else(|| VaultError::RecordNotFound(record_id.to_string()))?;

        let dna_sequence = decrypt_with_key(&stored.dna_ciphertext, &self.master)?;
        let key = derive_record_key(&dna_sequence)?;

        let mut fields = BTreeMap::new();
        for (name, ciphertext) in &stored.fields {
            fields.insert(name.clone(), decrypt_with_key(ciphertext, &key)?);
        }

        Ok(DecryptedRecord {
            record_id: record_id.to_string(),
            fields,
            dna_sequence,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }

    /// Permanently delete a record; `false` when it did not exist
    pub fn delete(&self, record_id: &str) -> VaultResult<bool> {
        self.store.delete(record_id)
    }

    pub fn exists(&self, record_id: &str) -> VaultResult<bool> {
        self.store.exists(record_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert("full_name".into(), "Jane Roe".into());
        fields.insert("email".into(), "jane@x.com".into());
        fields.insert("contact_number".into(), "5551234567".into());
        fields.insert("address".into(), "42 Helix Way".into());
        fields
    }

    fn vault() -> RecordVault {
        RecordVault::with_master_key(RecordStore::open_in_memory().unwrap(), RecordKey::master())
    }

    #[test]
    fn test_store_retrieve_roundtrip() {
        let vault = vault();
        vault.store("1001", &sample_fields(), "ACGTACGTAAGG").unwrap();

        let record = vault.retrieve("1001").unwrap();
        assert_eq!(record.fields, sample_fields());
        assert_eq!(record.dna_sequence, "ACGTACGTAAGG");
        assert!(!record.created_at.is_empty());
    }

    #[test]
    fn test_duplicate_id_rejected_first_record_intact() {
        let vault = vault();
        vault.store("1001", &sample_fields(), "ACGTACGT").unwrap();

        let mut other = BTreeMap::new();
        other.insert("full_name".into(), "Impostor".into());
        let result = vault.store("1001", &other, "TTTTTTTT");
        assert!(matches!(result, Err(VaultError::DuplicateId(_))));

        let record = vault.retrieve("1001").unwrap();
        assert_eq!(record.fields["full_name"], "Jane Roe");
        assert_eq!(record.dna_sequence, "ACGTACGT");
    }

    #[test]
    fn test_store_delete_retrieve_not_found() {
        let vault = vault();
        vault.store("P1", &sample_fields(), "ACGTTGCA").unwrap();

        assert!(vault.delete("P1").unwrap());
        assert!(!vault.exists("P1").unwrap());
        assert!(matches!(
            vault.retrieve("P1"),
            Err(VaultError::RecordNotFound(_))
        ));
    }

    #[test]
    fn test_delete_unknown_id_returns_false() {
        let vault = vault();
        assert!(!vault.delete("ghost").unwrap());
    }

    #[test]
    fn test_wrong_master_key_fails_closed() {
        let store = RecordStore::open_in_memory().unwrap();
        let vault = RecordVault::with_master_key(store, RecordKey::master());
        vault.store("1001", &sample_fields(), "ACGTACGT").unwrap();

        // Re-open the same rows under a different master key
        let stored = vault.store.get("1001").unwrap().unwrap();
        let other = RecordVault::with_master_key(RecordStore::open_in_memory().unwrap(), RecordKey::generate());
        other
            .store
            .put("1001", &stored.fields, &stored.dna_ciphertext, &stored.created_at)
            .unwrap();

        assert!(matches!(
            other.retrieve("1001"),
            Err(VaultError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_corrupted_field_aborts_retrieval() {
        let vault = vault();
        vault.store("1001", &sample_fields(), "ACGTACGT").unwrap();

        {
            let conn = vault.store.conn.lock();
            conn.execute(
                "UPDATE record_fields SET ciphertext = 'AAAA' WHERE name = 'email'",
                [],
            )
            .unwrap();
        }

        assert!(matches!(
            vault.retrieve("1001"),
            Err(VaultError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_empty_dna_rejected() {
        let vault = vault();
        let result = vault.store("1001", &sample_fields(), "");
        assert!(matches!(result, Err(VaultError::KeyDerivationFailed(_))));
        assert!(!vault.exists("1001").unwrap());
    }
}
