//! Genome Vault
//!
//! Encrypted patient-record vault keyed on DNA sequences, with a
//! two-factor admin gate (face recognition + emailed OTP) in front of
//! every read or delete.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       VaultApi                          │
//! │   (session gating: store free, read/delete gated)       │
//! └───────┬──────────────┬──────────────┬───────────────────┘
//!         │              │              │
//!   ┌─────▼─────┐  ┌─────▼─────┐  ┌─────▼─────┐
//!   │RecordVault│  │FaceMatcher│  │  MfaGate  │
//!   │  (crypto  │  │ (gallery, │  │(OTP state │
//!   │ envelope) │  │  cosine)  │  │ machine)  │
//!   └─────┬─────┘  └─────┬─────┘  └─────┬─────┘
//!         │              │              │
//!   ┌─────▼─────┐  ┌─────▼─────┐  ┌─────▼─────┐
//!   │  SQLite   │  │AttemptLog │  │  Mailer   │
//!   │  (blobs)  │  │  (CSV)    │  │ (trait)   │
//!   └───────────┘  └───────────┘  └───────────┘
//! ```
//!
//! The envelope is two-tier: the DNA sequence is encrypted under a
//! fixed master key, and every personal field under a key derived from
//! the plaintext sequence (PBKDF2-SHA256). Decrypting a record means
//! unwrapping the sequence first, so the sequence doubles as the
//! record's key material and never touches disk in the clear.
//!
//! Face detection sits behind the [`matcher::FaceModel`] trait and mail
//! behind [`mail::Mailer`], so real camera models and SMTP transports
//! plug in without touching the core.

pub mod api;
pub mod audit;
pub mod capture;
pub mod config;
pub mod crypto;
pub mod error;
pub mod gallery;
pub mod mail;
pub mod matcher;
pub mod mfa;
pub mod records;

pub use api::VaultApi;
pub use config::VaultConfig;
pub use error::{VaultError, VaultResult};
pub use gallery::{FaceGallery, GalleryIndex, EMBEDDING_DIM};
pub use matcher::{FaceMatch, FaceMatcher, FaceModel, GridEmbedder, DEFAULT_THRESHOLD};
pub use mfa::{AuthSession, AuthStage, MfaGate};
pub use records::{DecryptedRecord, RecordVault};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
