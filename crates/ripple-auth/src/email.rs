//! Outbound email seam.
//!
//! Delivery mechanics live outside this crate. Services only need
//! [`EmailSender::send`]; a failed send is logged by the caller and never
//! rolls back token state.

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("email delivery failed: {0}")]
    Delivery(String),
}

pub trait EmailSender: Send + Sync {
    fn send(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> impl Future<Output = Result<(), EmailError>> + Send;
}

/// Sender that only records the send in the log. Bodies are not logged
/// because they carry raw tokens.
#[derive(Debug, Clone, Default)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    async fn send(&self, to: &str, subject: &str, _html_body: &str) -> Result<(), EmailError> {
        info!(to, subject, "email handed to log sender");
        Ok(())
    }
}

/// A message captured by [`MemoryEmailSender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Sender that keeps every message in memory. Can be switched to fail
/// every send.
#[derive(Debug, Clone, Default)]
pub struct MemoryEmailSender {
    outbox: Arc<Mutex<Vec<SentEmail>>>,
    failing: bool,
}

impl MemoryEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sender whose every send fails.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }

    /// Most recent message addressed to `to`.
    pub fn last_to(&self, to: &str) -> Option<SentEmail> {
        self.sent().into_iter().rev().find(|m| m.to == to)
    }
}

impl EmailSender for MemoryEmailSender {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), EmailError> {
        if self.failing {
            return Err(EmailError::Delivery("sender configured to fail".into()));
        }
        let mut outbox = self
            .outbox
            .lock()
            .map_err(|_| EmailError::Delivery("outbox lock poisoned".into()))?;
        outbox.push(SentEmail {
            to: to.into(),
            subject: subject.into(),
            html_body: html_body.into(),
        });
        Ok(())
    }
}

/// Escape text interpolated into an HTML email body.
pub(crate) fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
