//! Shared fixtures for route-level tests: inert backend collaborators and a
//! ready-made `AppState`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::backend::{
    AnalysisReport, ApprovalStore, BackendError, DraftService, GenerateEmailRequest,
    GeneratedDraft, ImproveRequest, MailTransport, PendingEmail, ResumePipeline, SendReceipt,
    SendRequest,
};
use crate::config::Config;
use crate::lifecycle::record::ThreadMessage;
use crate::lifecycle::{EmailRecord, LifecycleManager};
use crate::notice::NoticeBoard;
use crate::queue::QueuePoller;
use crate::state::AppState;

/// Collaborator set that answers every call with a canned success.
pub struct NullBackend;

#[async_trait]
impl DraftService for NullBackend {
    async fn generate(
        &self,
        _request: &GenerateEmailRequest,
    ) -> Result<GeneratedDraft, BackendError> {
        Ok(GeneratedDraft {
            email_content: "generated body".to_string(),
            subject: None,
        })
    }

    async fn improve(&self, _request: &ImproveRequest) -> Result<String, BackendError> {
        Ok("improved body".to_string())
    }
}

#[async_trait]
impl ApprovalStore for NullBackend {
    async fn create_pending(&self, record: &EmailRecord) -> Result<String, BackendError> {
        Ok(record.id.clone())
    }

    async fn list_pending(&self) -> Result<Vec<PendingEmail>, BackendError> {
        Ok(Vec::new())
    }

    async fn resolve(&self, _id: &str, _approved: bool) -> Result<(), BackendError> {
        Ok(())
    }
}

#[async_trait]
impl MailTransport for NullBackend {
    async fn send(&self, _request: &SendRequest) -> Result<SendReceipt, BackendError> {
        Ok(SendReceipt {
            id: None,
            message_id: None,
            status: "sent".to_string(),
        })
    }

    async fn fetch_thread(&self, _id: &str) -> Result<Vec<ThreadMessage>, BackendError> {
        Ok(Vec::new())
    }
}

pub struct FakePipeline {
    pub fail: bool,
}

#[async_trait]
impl ResumePipeline for FakePipeline {
    async fn process_resume(&self, _url: &str, _filename: &str) -> Result<(), BackendError> {
        if self.fail {
            return Err(BackendError::Api {
                status: 500,
                message: "pipeline unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn analyse(&self, _filename: &str) -> Result<AnalysisReport, BackendError> {
        Ok(AnalysisReport {
            applicant_details: json!({ "name": "Sarah Chen" }),
            job_details: json!({ "title": "Senior Frontend Developer" }),
        })
    }
}

fn test_config() -> Config {
    Config {
        backend_url: "http://localhost:8000".to_string(),
        port: 0,
        upload_dir: "uploads".into(),
        poll_interval: Duration::from_secs(60),
        request_timeout: Duration::from_secs(5),
        notice_ttl: Duration::from_secs(60),
        sender: "me".to_string(),
        rust_log: "info".to_string(),
    }
}

pub fn state_with_pipeline(pipeline: Arc<dyn ResumePipeline>) -> AppState {
    let notices = NoticeBoard::new(Duration::from_secs(60));
    let null = Arc::new(NullBackend);
    let lifecycle = Arc::new(LifecycleManager::new(
        null.clone(),
        null.clone(),
        null.clone(),
        "me".to_string(),
        notices.clone(),
    ));
    let poller = Arc::new(QueuePoller::new(
        lifecycle.clone(),
        null,
        notices.clone(),
        Duration::from_secs(60),
    ));
    AppState {
        lifecycle,
        poller,
        pipeline,
        notices,
        config: test_config(),
    }
}

pub fn test_state() -> AppState {
    state_with_pipeline(Arc::new(FakePipeline { fail: false }))
}

pub fn test_state_with_failing_pipeline() -> (AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut state = state_with_pipeline(Arc::new(FakePipeline { fail: true }));
    state.config.upload_dir = dir.path().to_path_buf();
    (state, dir)
}
