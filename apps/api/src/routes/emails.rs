//! Axum route handlers for the email lifecycle API. Handlers are thin: all
//! transition rules live in the lifecycle manager.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::backend::GenerateEmailRequest;
use crate::errors::AppError;
use crate::lifecycle::{EmailRecord, EmailStatus, ThreadMessage};
use crate::notice::Notice;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ComposeRequest {
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// Draft to fill; a new draft is composed when absent.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub facts: GenerateEmailRequest,
}

#[derive(Debug, Deserialize)]
pub struct ImproveBody {
    pub id: String,
    pub improvement_request: String,
}

#[derive(Debug, Deserialize)]
pub struct EditRequest {
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub id: String,
    pub approved: bool,
}

#[derive(Debug, Deserialize)]
pub struct SendBody {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub id: String,
    pub status: EmailStatus,
}

#[derive(Debug, Serialize)]
pub struct PendingResponse {
    pub pending_emails: Vec<EmailRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}

#[derive(Debug, Serialize)]
pub struct SentResponse {
    pub sent_emails: Vec<EmailRecord>,
}

#[derive(Debug, Serialize)]
pub struct ThreadResponse {
    pub email_id: String,
    pub messages: Vec<ThreadMessage>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/emails
///
/// Manual compose: creates a draft without touching the backend.
pub async fn handle_compose(
    State(state): State<AppState>,
    Json(request): Json<ComposeRequest>,
) -> Result<Json<EmailRecord>, AppError> {
    let record = state.lifecycle.compose(
        request.to,
        request.subject,
        request.content,
        request.metadata,
    )?;
    Ok(Json(record))
}

/// POST /api/emails/generate
///
/// Fills a draft from the generation service. When no draft id is given a
/// new one is composed for the candidate first.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<EmailRecord>, AppError> {
    let id = match request.id {
        Some(id) => id,
        None => {
            let facts = &request.facts;
            let metadata = json!({
                "candidate_info": {
                    "name": facts.candidate_name,
                    "email": facts.candidate_email,
                    "currentCompany": facts.current_company,
                    "skills": facts.skills,
                },
                "job_info": {
                    "title": facts.job_title,
                    "company": facts.job_company,
                },
            });
            state
                .lifecycle
                .compose(
                    request.facts.candidate_email.clone(),
                    String::new(),
                    String::new(),
                    metadata,
                )?
                .id
        }
    };

    let record = state.lifecycle.generate(&id, &request.facts).await?;
    Ok(Json(record))
}

/// POST /api/emails/improve
pub async fn handle_improve(
    State(state): State<AppState>,
    Json(body): Json<ImproveBody>,
) -> Result<Json<EmailRecord>, AppError> {
    let record = state
        .lifecycle
        .improve(&body.id, &body.improvement_request)
        .await?;
    Ok(Json(record))
}

/// POST /api/emails/improve/stream
///
/// Same contract as `improve`, relayed as Server-Sent Events: `chunk`
/// payloads as deltas arrive, then one `complete` or `error` payload. One
/// subscriber per call.
pub async fn handle_improve_stream(
    State(state): State<AppState>,
    Json(body): Json<ImproveBody>,
) -> Sse<UnboundedReceiverStream<Result<Event, Infallible>>> {
    let (delta_tx, mut delta_rx) = mpsc::unbounded_channel::<String>();
    let (done_tx, done_rx) = tokio::sync::oneshot::channel();

    let manager = state.lifecycle.clone();
    tokio::spawn(async move {
        let result = manager
            .improve_stream(&body.id, &body.improvement_request, delta_tx)
            .await;
        let _ = done_tx.send(result.map(|record| record.content).map_err(|e| e.to_string()));
    });

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        // Deltas drain first; the sender half dies with the improvement
        // task, so this loop ends before the terminal event.
        while let Some(delta) = delta_rx.recv().await {
            let payload = json!({ "type": "chunk", "content": delta });
            let _ = event_tx.send(Ok(Event::default().data(payload.to_string())));
        }
        let terminal = match done_rx.await {
            Ok(Ok(content)) => json!({ "type": "complete", "improved_content": content }),
            Ok(Err(message)) => json!({ "type": "error", "message": message }),
            Err(_) => json!({ "type": "error", "message": "improvement task aborted" }),
        };
        let _ = event_tx.send(Ok(Event::default().data(terminal.to_string())));
    });

    Sse::new(UnboundedReceiverStream::new(event_rx)).keep_alive(KeepAlive::default())
}

/// POST /api/emails/edit
pub async fn handle_edit(
    State(state): State<AppState>,
    Json(request): Json<EditRequest>,
) -> Result<Json<EmailRecord>, AppError> {
    let record = state
        .lifecycle
        .edit(&request.id, request.subject, request.content)?;
    Ok(Json(record))
}

/// POST /api/emails/pending
pub async fn handle_submit(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let record = state.lifecycle.submit_for_approval(&request.id).await?;
    Ok(Json(StatusResponse {
        id: record.id,
        status: record.status,
    }))
}

/// GET /api/emails/pending
///
/// The poller's reconciled snapshot plus the current banner, if any.
pub async fn handle_pending(State(state): State<AppState>) -> Json<PendingResponse> {
    Json(PendingResponse {
        pending_emails: state.poller.snapshot(),
        notice: state.notices.current(),
    })
}

/// POST /api/emails/pending/refresh
///
/// On-demand refresh, outside the poll cadence.
pub async fn handle_refresh(
    State(state): State<AppState>,
) -> Result<Json<PendingResponse>, AppError> {
    let pending_emails = state.poller.refresh_once().await?;
    Ok(Json(PendingResponse {
        pending_emails,
        notice: state.notices.current(),
    }))
}

/// POST /api/emails/approve
///
/// Resolves a pending email; approval dispatches the send.
pub async fn handle_approve(
    State(state): State<AppState>,
    Json(request): Json<ApproveRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let record = state.lifecycle.approve(&request.id, request.approved).await?;
    Ok(Json(StatusResponse {
        id: record.id,
        status: record.status,
    }))
}

/// POST /api/emails/send
///
/// Direct-send path, also the user-initiated retry after a failed dispatch.
pub async fn handle_send(
    State(state): State<AppState>,
    Json(body): Json<SendBody>,
) -> Result<Json<StatusResponse>, AppError> {
    let record = state.lifecycle.send(&body.id).await?;
    Ok(Json(StatusResponse {
        id: record.id,
        status: record.status,
    }))
}

/// GET /api/emails/sent
pub async fn handle_sent(State(state): State<AppState>) -> Json<SentResponse> {
    Json(SentResponse {
        sent_emails: state.lifecycle.records_by_status(EmailStatus::Sent),
    })
}

/// GET /api/emails/{id}/thread
pub async fn handle_thread(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ThreadResponse>, AppError> {
    let messages = state.lifecycle.fetch_thread(&id).await?;
    Ok(Json(ThreadResponse {
        email_id: id,
        messages,
    }))
}
