//! Adapters for the external recruiter backend: draft generation, the
//! approval store, the mail relay, and the résumé pipeline. Each collaborator
//! is a trait seam so the lifecycle manager stays testable headlessly; the
//! single `HttpBackend` implements all of them against one base URL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::lifecycle::record::{EmailRecord, EmailStatus, ThreadMessage};

pub mod http;
pub mod stream;

pub use http::HttpBackend;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("improvement stream reported: {0}")]
    Stream(String),

    #[error("improvement stream ended before completion")]
    StreamTruncated,
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

/// Candidate and job facts handed to the draft generation service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateEmailRequest {
    pub candidate_name: String,
    pub candidate_email: String,
    #[serde(default)]
    pub current_company: String,
    #[serde(default)]
    pub current_position: String,
    #[serde(default)]
    pub skills: Vec<String>,
    pub job_title: String,
    pub job_company: String,
    #[serde(default)]
    pub job_requirements: Vec<String>,
    #[serde(default)]
    pub job_benefits: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedDraft {
    pub email_content: String,
    /// The service may omit the subject; the caller falls back to a default.
    #[serde(default)]
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImproveRequest {
    pub email_content: String,
    pub improvement_request: String,
    pub context: Value,
}

/// The send contract of the mail relay: `{to, subject, message, sender}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendRequest {
    pub to: String,
    pub subject: String,
    pub message: String,
    pub sender: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendReceipt {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    pub status: String,
}

/// A pending record as the approval store lists it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingEmail {
    pub id: String,
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub metadata: Value,
    /// The store emits ISO timestamps with or without an offset; parsed
    /// leniently and defaulted to now when absent or unreadable.
    #[serde(default)]
    pub created_at: Option<String>,
}

impl PendingEmail {
    pub fn into_record(self) -> EmailRecord {
        let created_at = self
            .created_at
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);
        EmailRecord {
            id: self.id,
            to: self.to,
            subject: self.subject,
            content: self.content,
            metadata: self.metadata,
            status: EmailStatus::PendingApproval,
            created_at,
            thread: Vec::new(),
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Naive ISO timestamps (no offset) are treated as UTC.
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisReport {
    #[serde(default)]
    pub applicant_details: Value,
    #[serde(default)]
    pub job_details: Value,
}

// ────────────────────────────────────────────────────────────────────────────
// Collaborator seams
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait DraftService: Send + Sync {
    async fn generate(&self, request: &GenerateEmailRequest)
        -> Result<GeneratedDraft, BackendError>;

    async fn improve(&self, request: &ImproveRequest) -> Result<String, BackendError>;

    /// Streaming variant of `improve`: content deltas are forwarded to `tx`
    /// as they arrive and the accumulated result is returned. Same contract,
    /// alternate transport; implementations without a streaming path fall
    /// back to one delta carrying the whole response.
    async fn improve_stream(
        &self,
        request: &ImproveRequest,
        tx: mpsc::UnboundedSender<String>,
    ) -> Result<String, BackendError> {
        let improved = self.improve(request).await?;
        let _ = tx.send(improved.clone());
        Ok(improved)
    }
}

#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Submits a record for approval; returns the authoritative id.
    async fn create_pending(&self, record: &EmailRecord) -> Result<String, BackendError>;

    async fn list_pending(&self) -> Result<Vec<PendingEmail>, BackendError>;

    async fn resolve(&self, id: &str, approved: bool) -> Result<(), BackendError>;
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, request: &SendRequest) -> Result<SendReceipt, BackendError>;

    async fn fetch_thread(&self, id: &str) -> Result<Vec<ThreadMessage>, BackendError>;
}

#[async_trait]
pub trait ResumePipeline: Send + Sync {
    /// Best-effort hand-off of an uploaded résumé; callers degrade a failure
    /// here to a warning.
    async fn process_resume(&self, url: &str, filename: &str) -> Result<(), BackendError>;

    async fn analyse(&self, filename: &str) -> Result<AnalysisReport, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_email_into_record() {
        let pending = PendingEmail {
            id: "abc".to_string(),
            to: "a@b.com".to_string(),
            subject: "S".to_string(),
            content: "C".to_string(),
            metadata: serde_json::json!({"candidate_info": {"name": "Sarah"}}),
            created_at: Some("2025-06-01T12:00:00+00:00".to_string()),
        };
        let record = pending.into_record();
        assert_eq!(record.status, EmailStatus::PendingApproval);
        assert_eq!(record.id, "abc");
        assert_eq!(record.created_at.to_rfc3339(), "2025-06-01T12:00:00+00:00");
        assert!(record.thread.is_empty());
    }

    #[test]
    fn test_naive_timestamp_treated_as_utc() {
        let parsed = parse_timestamp("2025-06-01T12:00:00.123456").unwrap();
        assert_eq!(parsed.timestamp(), 1748779200);
    }

    #[test]
    fn test_unparseable_timestamp_defaults_to_now() {
        let pending = PendingEmail {
            id: "x".to_string(),
            to: "a@b.com".to_string(),
            subject: String::new(),
            content: String::new(),
            metadata: Value::Null,
            created_at: Some("not-a-date".to_string()),
        };
        let before = Utc::now();
        let record = pending.into_record();
        assert!(record.created_at >= before);
    }

    #[test]
    fn test_send_request_wire_shape() {
        let req = SendRequest {
            to: "a@b.com".to_string(),
            subject: "S".to_string(),
            message: "C".to_string(),
            sender: "me".to_string(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["to"], "a@b.com");
        assert_eq!(json["message"], "C");
        assert_eq!(json["sender"], "me");
        assert!(json.get("content").is_none());
    }
}
