use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Lifecycle of an outreach email. Transitions only move forward; a record
/// never regresses from `Sent`, and `Rejected`/`Sent` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    Draft,
    PendingApproval,
    Approved,
    Rejected,
    Sent,
}

impl EmailStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, EmailStatus::Rejected | EmailStatus::Sent)
    }

    /// Subject and content stay mutable until the email is resolved or sent.
    pub fn is_editable(self) -> bool {
        matches!(
            self,
            EmailStatus::Draft | EmailStatus::PendingApproval | EmailStatus::Approved
        )
    }
}

impl std::fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EmailStatus::Draft => "draft",
            EmailStatus::PendingApproval => "pending_approval",
            EmailStatus::Approved => "approved",
            EmailStatus::Rejected => "rejected",
            EmailStatus::Sent => "sent",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Sent,
    Received,
}

/// One message in the conversation thread attached to a sent email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub sender: String,
    pub recipient: String,
    pub timestamp: DateTime<Utc>,
    pub content: String,
    #[serde(rename = "type")]
    pub direction: Direction,
}

/// The unit of work: one outreach email from creation to delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailRecord {
    pub id: String,
    pub to: String,
    pub subject: String,
    pub content: String,
    /// Candidate and job facts, passed through to the queue UI and the mail
    /// relay untouched. Never inspected for transitions.
    #[serde(default)]
    pub metadata: Value,
    pub status: EmailStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thread: Vec<ThreadMessage>,
}

impl EmailRecord {
    pub fn new(to: String, subject: String, content: String, metadata: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            to,
            subject,
            content,
            metadata,
            status: EmailStatus::Draft,
            created_at: Utc::now(),
            thread: Vec::new(),
        }
    }

    /// Merges a freshly fetched full thread into the record. The thread is
    /// append-only: messages already held are kept as-is and only the new
    /// suffix is appended, preserving non-decreasing timestamp order.
    pub fn extend_thread(&mut self, full: Vec<ThreadMessage>) -> usize {
        if full.len() <= self.thread.len() {
            return 0;
        }
        let appended = full.len() - self.thread.len();
        self.thread
            .extend(full.into_iter().skip(self.thread.len()));
        appended
    }
}

/// Minimal recipient sanity check: one `@` with a non-empty local part and
/// a dotted domain. Full RFC validation belongs to the mail relay.
pub fn is_valid_email(addr: &str) -> bool {
    match addr.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}
