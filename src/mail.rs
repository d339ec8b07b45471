//! Genome Vault - Mail Dispatch Seam
//!
//! The gate only depends on the `send(to, subject, body)` contract; the
//! authenticated SMTP transport lives behind the trait.

use parking_lot::Mutex;

use crate::error::VaultResult;

/// Subject line for OTP deliveries
pub const OTP_SUBJECT: &str = "Admin Verification OTP";

/// Body text for OTP deliveries
pub fn otp_body(code: &str) -> String {
    format!("Your OTP for admin verification is: {}", code)
}

/// Outbound mail transport
pub trait Mailer: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str) -> VaultResult<()>;
}

/// Transport that logs deliveries instead of speaking SMTP.
///
/// Used by the CLI; a production deployment plugs its SMTP client in
/// behind [`Mailer`] instead.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, to: &str, subject: &str, body: &str) -> VaultResult<()> {
        log::info!("mail to {}: {}", to, subject);
        log::info!("mail body: {}", body);
        Ok(())
    }
}

/// A delivered message, as captured by [`MemoryMailer`]
#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// In-memory mailbox for tests
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<SentMail>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered so far, oldest first
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().clone()
    }

    /// The most recent delivery
    pub fn last(&self) -> Option<SentMail> {
        self.sent.lock().last().cloned()
    }
}

impl Mailer for MemoryMailer {
    fn send(&self, to: &str, subject: &str, body: &str) -> VaultResult<()> {
        self.sent.lock().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
