//! Genome Vault - Configuration

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::VaultResult;

/// Vault configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// SQLite database holding encrypted records
    pub records_db: PathBuf,
    /// Directory holding per-admin gallery artifacts
    pub gallery_dir: PathBuf,
    /// Authentication attempt log
    pub audit_log: PathBuf,
    /// Cosine similarity threshold for a face match
    pub match_threshold: f32,
    /// Camera warm-up frames discarded per capture
    pub warmup_frames: usize,
    /// Fallback address for OTP dispatch with no identity context
    pub master_contact: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self::rooted(Path::new("./vault_data"))
    }
}

impl VaultConfig {
    /// Standard layout under a single data directory
    pub fn rooted(root: &Path) -> Self {
        Self {
            records_db: root.join("records.db"),
            gallery_dir: root.join("admin_data"),
            audit_log: root.join("face_logs.csv"),
            match_threshold: 0.5,
            warmup_frames: crate::capture::WARMUP_FRAMES,
            master_contact: "master-admin@example.com".into(),
        }
    }

    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> VaultResult<Self> {
        let data = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Save configuration as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> VaultResult<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path.as_ref(), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
