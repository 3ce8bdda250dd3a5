//! `HttpBackend` — the single point of entry for all recruiter-backend calls.
//!
//! One `reqwest` client with a bounded timeout; a timed-out or failed call is
//! an ordinary error surfaced to the user. There is deliberately no retry
//! loop here: every retry in this workflow is user-initiated.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::debug;

use super::stream::consume_improve_stream;
use super::{
    AnalysisReport, ApprovalStore, BackendError, DraftService, GenerateEmailRequest,
    GeneratedDraft, ImproveRequest, MailTransport, PendingEmail, ResumePipeline, SendReceipt,
    SendRequest,
};
use crate::lifecycle::record::{EmailRecord, ThreadMessage};

#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

/// FastAPI-style error body: `{"detail": "..."}`.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    detail: String,
}

#[derive(Debug, Deserialize)]
struct ImprovedDraft {
    improved_content: String,
}

#[derive(Debug, Deserialize)]
struct PendingCreated {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PendingList {
    #[serde(default)]
    pending_emails: Vec<PendingEmail>,
}

#[derive(Debug, Deserialize)]
struct ThreadBody {
    #[serde(default)]
    messages: Vec<ThreadMessage>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|e| e.detail)
            .unwrap_or(body);
        Err(BackendError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let response = self.client.get(self.url(path)).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl DraftService for HttpBackend {
    async fn generate(
        &self,
        request: &GenerateEmailRequest,
    ) -> Result<GeneratedDraft, BackendError> {
        debug!(candidate = %request.candidate_name, job = %request.job_title, "generating draft");
        self.post_json("/api/email/generate", request).await
    }

    async fn improve(&self, request: &ImproveRequest) -> Result<String, BackendError> {
        let improved: ImprovedDraft = self.post_json("/api/email/improve", request).await?;
        Ok(improved.improved_content)
    }

    async fn improve_stream(
        &self,
        request: &ImproveRequest,
        tx: mpsc::UnboundedSender<String>,
    ) -> Result<String, BackendError> {
        let response = self
            .client
            .post(self.url("/api/email/improve"))
            .header("accept", "text/event-stream")
            .json(request)
            .send()
            .await?;
        let response = Self::check(response).await?;
        consume_improve_stream(response, tx).await
    }
}

#[async_trait]
impl ApprovalStore for HttpBackend {
    async fn create_pending(&self, record: &EmailRecord) -> Result<String, BackendError> {
        let created: PendingCreated = self.post_json("/api/email/pending", record).await?;
        Ok(created.id)
    }

    async fn list_pending(&self) -> Result<Vec<PendingEmail>, BackendError> {
        let list: PendingList = self.get_json("/api/email/pending").await?;
        Ok(list.pending_emails)
    }

    async fn resolve(&self, id: &str, approved: bool) -> Result<(), BackendError> {
        let body = json!({ "id": id, "approved": approved });
        let response = self
            .client
            .post(self.url("/api/email/approve"))
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl MailTransport for HttpBackend {
    async fn send(&self, request: &SendRequest) -> Result<SendReceipt, BackendError> {
        debug!(to = %request.to, "dispatching email");
        self.post_json("/api/email/send", request).await
    }

    async fn fetch_thread(&self, id: &str) -> Result<Vec<ThreadMessage>, BackendError> {
        let body: ThreadBody = self.get_json(&format!("/api/email/thread/{id}")).await?;
        Ok(body.messages)
    }
}

#[async_trait]
impl ResumePipeline for HttpBackend {
    async fn process_resume(&self, url: &str, filename: &str) -> Result<(), BackendError> {
        let body = json!({ "url": url, "filename": filename });
        let response = self
            .client
            .post(self.url("/api/process-resume"))
            .json(&body)
            .send()
            .await?;
        // The result payload is opaque; only success matters to the caller.
        Self::check(response).await?;
        Ok(())
    }

    async fn analyse(&self, filename: &str) -> Result<AnalysisReport, BackendError> {
        let body = json!({ "filename": filename });
        self.post_json("/analyse", &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::record::EmailStatus;
    use serde_json::Value;

    fn backend(server: &mockito::Server) -> HttpBackend {
        HttpBackend::new(server.url(), Duration::from_secs(5))
    }

    fn generate_request() -> GenerateEmailRequest {
        GenerateEmailRequest {
            candidate_name: "Sarah Chen".to_string(),
            candidate_email: "sarah@example.com".to_string(),
            job_title: "Senior Frontend Developer".to_string(),
            job_company: "TechFlow".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_generate_returns_content_and_subject() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/email/generate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"email_content": "Hi Sarah", "subject": "An opportunity"}"#)
            .create_async()
            .await;

        let draft = backend(&server).generate(&generate_request()).await.unwrap();
        mock.assert_async().await;
        assert_eq!(draft.email_content, "Hi Sarah");
        assert_eq!(draft.subject.as_deref(), Some("An opportunity"));
    }

    #[tokio::test]
    async fn test_generate_subject_may_be_omitted() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/email/generate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"email_content": "Hi Sarah"}"#)
            .create_async()
            .await;

        let draft = backend(&server).generate(&generate_request()).await.unwrap();
        assert!(draft.subject.is_none());
    }

    #[tokio::test]
    async fn test_improve_unwraps_improved_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/email/improve")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"improved_content": "Better email"}"#)
            .create_async()
            .await;

        let request = ImproveRequest {
            email_content: "email".to_string(),
            improvement_request: "shorter".to_string(),
            context: Value::Null,
        };
        let improved = backend(&server).improve(&request).await.unwrap();
        mock.assert_async().await;
        assert_eq!(improved, "Better email");
    }

    #[tokio::test]
    async fn test_error_detail_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/email/approve")
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(r#"{"detail": "Email request not found"}"#)
            .create_async()
            .await;

        let err = backend(&server).resolve("missing", true).await.unwrap_err();
        match err {
            BackendError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Email request not found");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_pending_unwraps_envelope() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/email/pending")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"pending_emails": [
                    {"id": "1", "to": "a@b.com", "subject": "S", "content": "C"}
                ]}"#,
            )
            .create_async()
            .await;

        let pending = backend(&server).list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].to, "a@b.com");
    }

    #[tokio::test]
    async fn test_create_pending_posts_record_and_returns_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/email/pending")
            .match_body(mockito::Matcher::PartialJson(json!({"to": "a@b.com"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "server-1", "status": "pending"}"#)
            .create_async()
            .await;

        let record = EmailRecord::new(
            "a@b.com".to_string(),
            "S".to_string(),
            "C".to_string(),
            Value::Null,
        );
        let id = backend(&server).create_pending(&record).await.unwrap();
        mock.assert_async().await;
        assert_eq!(id, "server-1");
    }

    #[tokio::test]
    async fn test_send_posts_relay_shape() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/email/send")
            .match_body(mockito::Matcher::Json(json!({
                "to": "a@b.com",
                "subject": "S",
                "message": "C",
                "sender": "me"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "m1", "status": "sent"}"#)
            .create_async()
            .await;

        let receipt = backend(&server)
            .send(&SendRequest {
                to: "a@b.com".to_string(),
                subject: "S".to_string(),
                message: "C".to_string(),
                sender: "me".to_string(),
            })
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(receipt.status, "sent");
        assert_eq!(receipt.id.as_deref(), Some("m1"));
    }

    #[tokio::test]
    async fn test_fetch_thread_parses_messages() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/email/thread/abc")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"email_id": "abc", "messages": [{
                    "sender": "recruiter@company.com",
                    "recipient": "a@b.com",
                    "timestamp": "2025-06-01T12:00:00Z",
                    "content": "Initial recruitment email sent",
                    "type": "sent"
                }]}"#,
            )
            .create_async()
            .await;

        let messages = backend(&server).fetch_thread("abc").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].recipient, "a@b.com");
    }

    #[tokio::test]
    async fn test_connection_failure_is_http_error() {
        // Port 1 is never listening.
        let backend = HttpBackend::new("http://127.0.0.1:1", Duration::from_secs(1));
        let err = backend.list_pending().await.unwrap_err();
        assert!(matches!(err, BackendError::Http(_)));
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let backend = HttpBackend::new("http://localhost:8000/", Duration::from_secs(1));
        assert_eq!(
            backend.url("/api/email/pending"),
            "http://localhost:8000/api/email/pending"
        );
    }

    #[test]
    fn test_pending_email_status_defaults() {
        let pending: PendingEmail = serde_json::from_str(
            r#"{"id": "1", "to": "a@b.com", "created_at": "2025-06-01T10:00:00"}"#,
        )
        .unwrap();
        let record = pending.into_record();
        assert_eq!(record.status, EmailStatus::PendingApproval);
    }
}
