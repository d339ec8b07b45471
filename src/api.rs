//! Genome Vault - Vault Facade
//!
//! One object wiring storage, the face matcher, the MFA gate and the
//! attempt log together, enforcing which operations are free and which
//! require a fully authenticated session.
//!
//! Storing a record is deliberately ungated: intake happens at the
//! front desk. Retrieval, deletion and admin registration require an
//! `Authenticated` session.

use std::collections::BTreeMap;
use std::sync::Arc;

use image::RgbImage;

use crate::audit::{AttemptEntry, AttemptLog};
use crate::capture::{FrameSource, WarmedCapture};
use crate::config::VaultConfig;
use crate::error::{VaultError, VaultResult};
use crate::gallery::FaceGallery;
use crate::mail::Mailer;
use crate::matcher::{FaceMatch, FaceMatcher, FaceModel};
use crate::mfa::{AuthSession, MatchedAdmin, MfaGate};
use crate::records::{DecryptedRecord, RecordVault};

/// The assembled vault
pub struct VaultApi {
    config: VaultConfig,
    records: RecordVault,
    gallery: FaceGallery,
    matcher: FaceMatcher,
    gate: MfaGate,
    audit: AttemptLog,
}

impl VaultApi {
    /// Assemble the vault from a config, a face model and a mail
    /// transport. Creates the data directories and database on first
    /// use.
    pub fn open(
        config: VaultConfig,
        model: Arc<dyn FaceModel>,
        mailer: Arc<dyn Mailer>,
    ) -> VaultResult<Self> {
        let records = RecordVault::open(&config.records_db)?;
        let gallery = FaceGallery::open(&config.gallery_dir, &config.master_contact)?;
        let matcher = FaceMatcher::new(model, config.match_threshold);
        let gate = MfaGate::new(mailer, &config.master_contact);
        let audit = AttemptLog::new(&config.audit_log);

        Ok(Self {
            config,
            records,
            gallery,
            matcher,
            gate,
            audit,
        })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn gallery(&self) -> &FaceGallery {
        &self.gallery
    }

    pub fn audit_log(&self) -> &AttemptLog {
        &self.audit
    }

    /// Start a fresh authentication session
    pub fn begin_session(&self) -> AuthSession {
        self.gate.begin()
    }

    /// Grab one frame from a source, discarding warm-up frames first.
    ///
    /// A capture failure is an authentication attempt that never got a
    /// face, so it is recorded in the attempt log before surfacing.
    pub fn capture_frame<S: FrameSource>(&self, source: S) -> VaultResult<RgbImage> {
        let mut capture = WarmedCapture::with_warmup(source, self.config.warmup_frames);
        match capture.capture() {
            Ok(frame) => Ok(frame),
            Err(e) => {
                self.audit.append(&AttemptEntry::unknown(0.0))?;
                Err(e)
            }
        }
    }

    /// Load one frame from a still image on disk. No warm-up, same
    /// attempt-log rule as a live capture.
    pub fn capture_file<P: AsRef<std::path::Path>>(&self, path: P) -> VaultResult<RgbImage> {
        let mut capture =
            WarmedCapture::with_warmup(crate::capture::FileFrameSource::new(path), 0);
        match capture.capture() {
            Ok(frame) => Ok(frame),
            Err(e) => {
                self.audit.append(&AttemptEntry::unknown(0.0))?;
                Err(e)
            }
        }
    }

    /// First factor: match a frame against the gallery and, on
    /// success, dispatch an OTP to the matched admin.
    pub fn verify_face(
        &self,
        session: &mut AuthSession,
        frame: &RgbImage,
    ) -> VaultResult<FaceMatch> {
        let index = self.gallery.load(self.matcher.model())?;
        let matched = self.matcher.match_frame(frame, &index, &self.audit)?;

        self.gate.on_face_verified(
            session,
            MatchedAdmin {
                name: matched.name.clone(),
                contact: matched.contact.clone(),
            },
        )?;
        Ok(matched)
    }

    /// Out-of-band path to the second factor: OTP to the master
    /// contact, no face required. Used to bootstrap admin registration.
    pub fn begin_master_approval(&self, session: &mut AuthSession) -> VaultResult<()> {
        self.gate.begin_master_approval(session)
    }

    /// Second factor: verify the submitted OTP
    pub fn verify_otp(&self, session: &mut AuthSession, code: &str) -> VaultResult<()> {
        self.gate.submit_otp(session, code)
    }

    /// Register a new admin face. Requires an authenticated session.
    pub fn register_admin(
        &self,
        session: &AuthSession,
        frame: &RgbImage,
        name: &str,
        contact: &str,
    ) -> VaultResult<()> {
        self.ensure_authenticated(session)?;
        self.matcher.register(&self.gallery, frame, name, contact)?;
        log::info!("admin {} registered", name);
        Ok(())
    }

    /// Encrypt and store a new record. Intake is ungated.
    pub fn store_record(
        &self,
        record_id: &str,
        fields: &BTreeMap<String, String>,
        dna_sequence: &str,
    ) -> VaultResult<()> {
        self.records.store(record_id, fields, dna_sequence)
    }

    /// Decrypt a record. Requires an authenticated session.
    pub fn retrieve_record(
        &self,
        session: &AuthSession,
        record_id: &str,
    ) -> VaultResult<DecryptedRecord> {
        self.ensure_authenticated(session)?;
        self.records.retrieve(record_id)
    }

    /// Permanently delete a record. Requires an authenticated session.
    /// Returns `false` when the id was unknown.
    pub fn delete_record(&self, session: &AuthSession, record_id: &str) -> VaultResult<bool> {
        self.ensure_authenticated(session)?;
        self.records.delete(record_id)
    }

    fn ensure_authenticated(&self, session: &AuthSession) -> VaultResult<()> {
        if session.is_authenticated() {
            Ok(())
        } else {
            Err(VaultError::NotAuthenticated)
        }
    }
}
