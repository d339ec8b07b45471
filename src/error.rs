//! Genome Vault - Error Types

use thiserror::Error;

/// Result type for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

/// Vault error types
#[derive(Error, Debug)]
pub enum VaultError {
    // ═══════════════════════════════════════════════════════════════
    // CRYPTO ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    // ═══════════════════════════════════════════════════════════════
    // RECORD ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Record ID already exists: {0}")]
    DuplicateId(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    // ═══════════════════════════════════════════════════════════════
    // BIOMETRIC ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("No face detected in frame")]
    NoFaceDetected,

    #[error("No registered admins in gallery")]
    EmptyGallery,

    #[error("No matching admin (best similarity: {best_similarity:.4})")]
    NoMatch { best_similarity: f32 },

    #[error("Face model not installed")]
    ModelNotLoaded,

    #[error("Camera error: {0}")]
    CameraError(String),

    #[error("Invalid embedding: expected {expected} dims, got {actual}")]
    InvalidEmbedding { expected: usize, actual: usize },

    // ═══════════════════════════════════════════════════════════════
    // AUTH GATE ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Invalid OTP")]
    InvalidOtp,

    #[error("Admin authentication required")]
    NotAuthenticated,

    #[error("Authentication stage violation: {0}")]
    StageViolation(&'static str),

    // ═══════════════════════════════════════════════════════════════
    // TRANSPORT ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Mail dispatch failed: {0}")]
    MailError(String),

    // ═══════════════════════════════════════════════════════════════
    // IO / SERIALIZATION ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Gallery entry invalid: {0}")]
    GalleryCorrupted(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    ImageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl VaultError {
    /// Check if this is an authentication failure surfaced to the user
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            VaultError::NoFaceDetected
                | VaultError::EmptyGallery
                | VaultError::NoMatch { .. }
                | VaultError::CameraError(_)
                | VaultError::InvalidOtp
        )
    }

    /// Check if this is a security-critical error
    pub fn is_security_critical(&self) -> bool {
        matches!(
            self,
            VaultError::DecryptionFailed(_) | VaultError::NotAuthenticated
        )
    }
}

impl From<rusqlite::Error> for VaultError {
    fn from(e: rusqlite::Error) -> Self {
        VaultError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::SerializationError(e.to_string())
    }
}

impl From<image::ImageError> for VaultError {
    fn from(e: image::ImageError) -> Self {
        VaultError::ImageError(e.to_string())
    }
}
