//! Résumé upload side-channel. Accepts only PDF files, stores them under a
//! timestamp-prefixed sanitized name, and hands the stored file to the
//! résumé pipeline best-effort — a failed hand-off degrades to a warning,
//! the stored file is never rolled back.

use axum::extract::{Multipart, State};
use axum::Json;
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub filename: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyseRequest {
    pub filename: String,
}

/// POST /api/upload
///
/// Multipart form: `file` (the résumé PDF) and `link` (the job posting URL).
pub async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut link: Option<String> = None;
    let mut file: Option<(String, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?
    {
        match field.name() {
            Some("link") => {
                link = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?,
                );
            }
            Some("file") => {
                if field.content_type() != Some("application/pdf") {
                    return Err(AppError::Validation(
                        "Only PDF files are allowed".to_string(),
                    ));
                }
                let filename = field.file_name().unwrap_or("resume.pdf").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?;
                file = Some((filename, data));
            }
            _ => {}
        }
    }

    let link = link
        .filter(|l| !l.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Job posting URL is required".to_string()))?;
    let (filename, data) = file
        .ok_or_else(|| AppError::Validation("Resume file is required".to_string()))?;

    let stored_name = format!(
        "{}-{}",
        Utc::now().timestamp_millis(),
        sanitize_filename(&filename)
    );
    tokio::fs::create_dir_all(&state.config.upload_dir)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to create upload dir: {e}")))?;
    let path = state.config.upload_dir.join(&stored_name);
    tokio::fs::write(&path, &data)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to store upload: {e}")))?;
    info!(file = %stored_name, bytes = data.len(), "resume stored");

    let warning = match state.pipeline.process_resume(&link, &stored_name).await {
        Ok(()) => None,
        Err(e) => {
            warn!(error = %e, "resume processing hand-off failed");
            Some("Resume stored, but processing could not be started".to_string())
        }
    };

    Ok(Json(UploadResponse {
        filename: stored_name,
        status: "uploaded".to_string(),
        warning,
    }))
}

/// POST /api/analyse
///
/// Proxies the résumé analysis used to prefill the compose form.
pub async fn handle_analyse(
    State(state): State<AppState>,
    Json(request): Json<AnalyseRequest>,
) -> Result<Json<Value>, AppError> {
    if request.filename.trim().is_empty() {
        return Err(AppError::Validation("Filename is required".to_string()));
    }
    let report = state.pipeline.analyse(&request.filename).await?;
    Ok(Json(json!({
        "applicant_details": report.applicant_details,
        "job_details": report.job_details,
    })))
}

/// Strips path components and anything outside `[A-Za-z0-9._-]`.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "resume.pdf".to_string()
    } else {
        cleaned
    }
}
