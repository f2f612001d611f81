use crate::error::DeliveryError;
use crate::io::{self, sanitize_file_name};
use crate::render::RenderedArtifact;
use anyhow::Context;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

// ---------------------------------------------------------------------------
// Address check
// ---------------------------------------------------------------------------

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_re() -> &'static Regex {
    EMAIL_RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap())
}

/// `local@domain.tld` with no whitespace anywhere.
pub fn is_valid_email(address: &str) -> bool {
    email_re().is_match(address)
}

// ---------------------------------------------------------------------------
// Mailer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

/// The mail-delivery service.
pub trait Mailer: Send + Sync {
    fn send(&self, mail: &OutgoingMail) -> anyhow::Result<()>;
}

/// Envelope written next to each outbox attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEnvelope {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<String>,
    pub queued_at: DateTime<Utc>,
}

pub const ENVELOPE_FILE: &str = "message.yaml";

/// A [`Mailer`] that drops each message into `<outbox>/<uuid>/`.
#[derive(Debug, Clone)]
pub struct OutboxMailer {
    outbox: PathBuf,
}

impl OutboxMailer {
    pub fn new(outbox: impl Into<PathBuf>) -> Self {
        Self {
            outbox: outbox.into(),
        }
    }

    pub fn outbox(&self) -> &Path {
        &self.outbox
    }

    /// Queued envelopes, oldest first.
    pub fn messages(&self) -> crate::Result<Vec<OutboxEnvelope>> {
        let mut out = Vec::new();
        if !self.outbox.is_dir() {
            return Ok(out);
        }
        for entry in std::fs::read_dir(&self.outbox)? {
            let path = entry?.path().join(ENVELOPE_FILE);
            if path.is_file() {
                out.push(io::read_yaml::<OutboxEnvelope>(&path)?);
            }
        }
        out.sort_by_key(|m| m.queued_at);
        Ok(out)
    }
}

impl Mailer for OutboxMailer {
    fn send(&self, mail: &OutgoingMail) -> anyhow::Result<()> {
        let dir = self.outbox.join(uuid::Uuid::new_v4().to_string());
        io::ensure_dir(&dir).context("failed to create outbox entry")?;

        let mut names = Vec::with_capacity(mail.attachments.len());
        for a in &mail.attachments {
            let name = sanitize_file_name(&a.file_name);
            io::atomic_write(&dir.join(&name), &a.bytes)
                .with_context(|| format!("failed to write attachment {name}"))?;
            names.push(name);
        }

        let envelope = OutboxEnvelope {
            to: mail.to.clone(),
            subject: mail.subject.clone(),
            body: mail.body.clone(),
            attachments: names,
            queued_at: Utc::now(),
        };
        io::write_yaml(&dir.join(ENVELOPE_FILE), &envelope).context("failed to write envelope")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DeliveryService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryReceipt {
    pub to: String,
    pub attachment: String,
}

/// Sends a rendered receipt to the donor with a fixed subject and body.
pub struct DeliveryService {
    mailer: Arc<dyn Mailer>,
    subject: String,
    body: String,
}

impl DeliveryService {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            mailer,
            subject: subject.into(),
            body: body.into(),
        }
    }

    pub fn deliver(
        &self,
        email: &str,
        artifact: &RenderedArtifact,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let to = email.trim();
        if !is_valid_email(to) {
            return Err(DeliveryError::InvalidEmail(email.to_string()));
        }

        let mail = OutgoingMail {
            to: to.to_string(),
            subject: self.subject.clone(),
            body: self.body.clone(),
            attachments: vec![Attachment {
                file_name: artifact.file_name.clone(),
                mime: artifact.mime.to_string(),
                bytes: artifact.bytes.clone(),
            }],
        };
        self.mailer
            .send(&mail)
            .map_err(|e| DeliveryError::Transport(format!("{e:#}")))?;

        tracing::info!(to, attachment = %artifact.file_name, "receipt sent");
        Ok(DeliveryReceipt {
            to: mail.to,
            attachment: artifact.file_name.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<OutgoingMail>>,
    }

    impl Mailer for Recording {
        fn send(&self, mail: &OutgoingMail) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(mail.clone());
            Ok(())
        }
    }

    struct Down;

    impl Mailer for Down {
        fn send(&self, _mail: &OutgoingMail) -> anyhow::Result<()> {
            anyhow::bail!("connection refused")
        }
    }

    fn artifact() -> RenderedArtifact {
        RenderedArtifact {
            file_name: "receipt_Kim_1.pdf".to_string(),
            mime: "application/pdf",
            bytes: b"%PDF-1.4".to_vec(),
            strategy: "conversion".to_string(),
        }
    }

    #[test]
    fn accepts_well_formed_addresses() {
        for ok in ["user@domain.tld", "kim@example.com", "a.b+c@mail.example.org"] {
            assert!(is_valid_email(ok), "{ok}");
        }
    }

    #[test]
    fn rejects_malformed_addresses_without_sending() {
        let mailer = Arc::new(Recording::default());
        let service = DeliveryService::new(mailer.clone(), "s", "b");
        for bad in ["no-at-sign", "user@", "user domain.com", "", "bad-email", "a@b"] {
            let err = service.deliver(bad, &artifact()).unwrap_err();
            assert!(matches!(err, DeliveryError::InvalidEmail(_)), "{bad}");
            assert_eq!(err.to_string(), "Invalid email");
        }
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn sends_single_attachment() {
        let mailer = Arc::new(Recording::default());
        let service = DeliveryService::new(mailer.clone(), "Your receipt", "Thanks");
        let receipt = service.deliver("kim@example.com", &artifact()).unwrap();
        assert_eq!(receipt.to, "kim@example.com");

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Your receipt");
        assert_eq!(sent[0].attachments.len(), 1);
        assert_eq!(sent[0].attachments[0].file_name, "receipt_Kim_1.pdf");
    }

    #[test]
    fn transport_failure_is_reported() {
        let service = DeliveryService::new(Arc::new(Down), "s", "b");
        let err = service.deliver("kim@example.com", &artifact()).unwrap_err();
        assert_eq!(err.to_string(), "send failed: connection refused");
    }

    #[test]
    fn outbox_writes_envelope_and_attachment() {
        let dir = TempDir::new().unwrap();
        let mailer = OutboxMailer::new(dir.path().join("outbox"));
        let service = DeliveryService::new(Arc::new(mailer.clone()), "Your receipt", "Thanks");
        service.deliver("kim@example.com", &artifact()).unwrap();

        let messages = mailer.messages().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].to, "kim@example.com");
        assert_eq!(messages[0].attachments, vec!["receipt_Kim_1.pdf".to_string()]);
    }
}
