//! Genome Vault - Multi-Factor Admin Gate
//!
//! Two sequential proofs before record access: a face match, then a
//! one-time passcode delivered to the matched admin's contact address.
//! All match context lives on the session, never in process globals.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{VaultError, VaultResult};
use crate::mail::{otp_body, Mailer, OTP_SUBJECT};

/// Authentication stages, strictly ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    Unauthenticated,
    FaceVerified,
    Authenticated,
}

/// Identity context carried from the face stage to the OTP stage
#[derive(Debug, Clone)]
pub struct MatchedAdmin {
    pub name: String,
    pub contact: String,
}

/// Per-session authentication state.
///
/// The pending code exists only here; it is never persisted and dies
/// with the session.
#[derive(Debug)]
pub struct AuthSession {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    stage: AuthStage,
    pending_otp: Option<String>,
    matched: Option<MatchedAdmin>,
}

impl AuthSession {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            stage: AuthStage::Unauthenticated,
            pending_otp: None,
            matched: None,
        }
    }

    pub fn stage(&self) -> AuthStage {
        self.stage
    }

    pub fn is_authenticated(&self) -> bool {
        self.stage == AuthStage::Authenticated
    }

    /// Who the face stage matched, if anyone (absent for the master
    /// approval flow)
    pub fn matched(&self) -> Option<&MatchedAdmin> {
        self.matched.as_ref()
    }

    /// Abort back to `Unauthenticated`, discarding the pending code
    pub fn reset(&mut self) {
        self.stage = AuthStage::Unauthenticated;
        self.pending_otp = None;
        self.matched = None;
    }
}

/// Generate a fresh 6-digit one-time passcode
pub fn generate_otp() -> String {
    use rand::Rng;
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// The authentication gate
pub struct MfaGate {
    mailer: Arc<dyn Mailer>,
    master_contact: String,
}

impl MfaGate {
    pub fn new(mailer: Arc<dyn Mailer>, master_contact: &str) -> Self {
        Self {
            mailer,
            master_contact: master_contact.to_string(),
        }
    }

    /// Start a fresh session at `Unauthenticated`
    pub fn begin(&self) -> AuthSession {
        AuthSession::new()
    }

    /// Advance after a successful face match: dispatch a fresh OTP to
    /// the matched admin's contact and enter `FaceVerified`.
    ///
    /// The session is only mutated once the dispatch succeeds.
    pub fn on_face_verified(
        &self,
        session: &mut AuthSession,
        matched: MatchedAdmin,
    ) -> VaultResult<()> {
        if session.stage != AuthStage::Unauthenticated {
            return Err(VaultError::StageViolation(
                "face verification only starts a fresh session",
            ));
        }

        let to = if matched.contact.is_empty() {
            self.master_contact.clone()
        } else {
            matched.contact.clone()
        };

        let otp = generate_otp();
        self.mailer.send(&to, OTP_SUBJECT, &otp_body(&otp))?;
        log::info!("OTP dispatched to {}", to);

        session.pending_otp = Some(otp);
        session.matched = Some(matched);
        session.stage = AuthStage::FaceVerified;
        Ok(())
    }

    /// Out-of-band master approval: OTP to the master address with no
    /// identity context (used for admin registration).
    pub fn begin_master_approval(&self, session: &mut AuthSession) -> VaultResult<()> {
        if session.stage != AuthStage::Unauthenticated {
            return Err(VaultError::StageViolation(
                "master approval only starts a fresh session",
            ));
        }

        let otp = generate_otp();
        self.mailer
            .send(&self.master_contact, OTP_SUBJECT, &otp_body(&otp))?;
        log::info!("master OTP dispatched to {}", self.master_contact);

        session.pending_otp = Some(otp);
        session.matched = None;
        session.stage = AuthStage::FaceVerified;
        Ok(())
    }

    /// Verify a submitted code against the session's pending OTP.
    ///
    /// Exact, case-sensitive string equality. On mismatch the session
    /// stays in `FaceVerified` and resubmission is allowed; on success
    /// the code is consumed and the session is `Authenticated`.
    pub fn submit_otp(&self, session: &mut AuthSession, code: &str) -> VaultResult<()> {
        if session.stage != AuthStage::FaceVerified {
            return Err(VaultError::StageViolation(
                "OTP verification requires face verification first",
            ));
        }

        match session.pending_otp.as_deref() {
            Some(pending) if pending == code => {
                session.pending_otp = None;
                session.stage = AuthStage::Authenticated;
                Ok(())
            }
            _ => Err(VaultError::InvalidOtp),
        }
    }
}
