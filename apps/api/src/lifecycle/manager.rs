//! The email lifecycle state machine: draft → pending_approval →
//! approved/rejected → sent → threaded.
//!
//! The manager owns the record store and a per-id in-flight set. Every
//! operation validates locally before touching the network, and a failed
//! external call leaves status and content exactly as they were — retries
//! are always user-initiated.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{info, warn};

use crate::backend::{
    ApprovalStore, DraftService, GenerateEmailRequest, ImproveRequest, MailTransport,
    PendingEmail, SendRequest,
};
use crate::errors::AppError;
use crate::notice::NoticeBoard;

use super::record::{is_valid_email, EmailRecord, EmailStatus, ThreadMessage};
use super::store::RecordStore;

pub struct LifecycleManager {
    drafts: Arc<dyn DraftService>,
    approvals: Arc<dyn ApprovalStore>,
    transport: Arc<dyn MailTransport>,
    /// Sender identity forwarded to the mail relay.
    sender: String,
    notices: NoticeBoard,
    store: Mutex<RecordStore>,
}

impl LifecycleManager {
    pub fn new(
        drafts: Arc<dyn DraftService>,
        approvals: Arc<dyn ApprovalStore>,
        transport: Arc<dyn MailTransport>,
        sender: String,
        notices: NoticeBoard,
    ) -> Self {
        Self {
            drafts,
            approvals,
            transport,
            sender,
            notices,
            store: Mutex::new(RecordStore::new()),
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // Creation
    // ────────────────────────────────────────────────────────────────────

    /// Manual compose: creates a new draft record.
    pub fn compose(
        &self,
        to: String,
        subject: String,
        content: String,
        metadata: Value,
    ) -> Result<EmailRecord, AppError> {
        if to.trim().is_empty() {
            return Err(AppError::Validation(
                "Recipient address is required".to_string(),
            ));
        }
        if !is_valid_email(&to) {
            return Err(AppError::Validation(format!(
                "'{to}' is not a valid email address"
            )));
        }
        let record = EmailRecord::new(to, subject, content, metadata);
        let mut store = self.store.lock().unwrap();
        store.insert(record.clone());
        Ok(record)
    }

    /// Fills a draft from the generation service. Draft stays a draft; the
    /// subject falls back to "{job_title} Opportunity at {job_company}" when
    /// the service omits one.
    pub async fn generate(
        &self,
        id: &str,
        request: &GenerateEmailRequest,
    ) -> Result<EmailRecord, AppError> {
        {
            let mut store = self.store.lock().unwrap();
            let record = get(&store, id)?;
            if record.status != EmailStatus::Draft {
                return Err(AppError::InvalidTransition(format!(
                    "email {id} is {}, only drafts can be generated",
                    record.status
                )));
            }
            if request.candidate_name.trim().is_empty() {
                return Err(AppError::Validation("Candidate name is required".to_string()));
            }
            if request.job_title.trim().is_empty() {
                return Err(AppError::Validation("Job title is required".to_string()));
            }
            begin(&mut store, id)?;
        }

        let result = self.drafts.generate(request).await;

        let mut store = self.store.lock().unwrap();
        store.finish(id);
        match result {
            Ok(draft) => {
                let record = get_mut(&mut store, id)?;
                record.content = draft.email_content;
                record.subject = draft
                    .subject
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| {
                        format!("{} Opportunity at {}", request.job_title, request.job_company)
                    });
                self.notices.success("Draft generated");
                Ok(record.clone())
            }
            Err(e) => {
                self.notices.error(format!("Failed to generate draft: {e}"));
                Err(e.into())
            }
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // Revision
    // ────────────────────────────────────────────────────────────────────

    pub async fn improve(&self, id: &str, instruction: &str) -> Result<EmailRecord, AppError> {
        let request = self.prepare_improve(id, instruction)?;
        let result = self.drafts.improve(&request).await;
        self.finish_improve(id, result)
    }

    /// Streaming variant: same contract as `improve`, with content deltas
    /// forwarded to `tx` as they arrive.
    pub async fn improve_stream(
        &self,
        id: &str,
        instruction: &str,
        tx: tokio::sync::mpsc::UnboundedSender<String>,
    ) -> Result<EmailRecord, AppError> {
        let request = self.prepare_improve(id, instruction)?;
        let result = self.drafts.improve_stream(&request, tx).await;
        self.finish_improve(id, result)
    }

    fn prepare_improve(&self, id: &str, instruction: &str) -> Result<ImproveRequest, AppError> {
        let mut store = self.store.lock().unwrap();
        let record = get(&store, id)?;
        if !record.status.is_editable() {
            return Err(AppError::InvalidTransition(format!(
                "email {id} is {}, content is frozen",
                record.status
            )));
        }
        if instruction.trim().is_empty() {
            return Err(AppError::Validation(
                "Improvement request cannot be empty".to_string(),
            ));
        }
        if record.content.trim().is_empty() {
            return Err(AppError::Validation(
                "Email content cannot be empty".to_string(),
            ));
        }
        let request = ImproveRequest {
            email_content: record.content.clone(),
            improvement_request: instruction.to_string(),
            context: record.metadata.clone(),
        };
        begin(&mut store, id)?;
        Ok(request)
    }

    fn finish_improve(
        &self,
        id: &str,
        result: Result<String, crate::backend::BackendError>,
    ) -> Result<EmailRecord, AppError> {
        let mut store = self.store.lock().unwrap();
        store.finish(id);
        match result {
            Ok(improved) => {
                let record = get_mut(&mut store, id)?;
                record.content = improved;
                self.notices.success("Email improved");
                Ok(record.clone())
            }
            Err(e) => {
                self.notices.error(format!("Failed to improve email: {e}"));
                Err(e.into())
            }
        }
    }

    /// User edit of subject/content; allowed until the record is resolved
    /// or sent. Purely local.
    pub fn edit(
        &self,
        id: &str,
        subject: Option<String>,
        content: Option<String>,
    ) -> Result<EmailRecord, AppError> {
        let mut store = self.store.lock().unwrap();
        if store.is_in_flight(id) {
            return Err(AppError::RecordBusy(id.to_string()));
        }
        let record = get_mut(&mut store, id)?;
        if !record.status.is_editable() {
            return Err(AppError::InvalidTransition(format!(
                "email {id} is {}, content is frozen",
                record.status
            )));
        }
        if let Some(subject) = subject {
            record.subject = subject;
        }
        if let Some(content) = content {
            record.content = content;
        }
        Ok(record.clone())
    }

    // ────────────────────────────────────────────────────────────────────
    // Approval workflow
    // ────────────────────────────────────────────────────────────────────

    pub async fn submit_for_approval(&self, id: &str) -> Result<EmailRecord, AppError> {
        let snapshot = {
            let mut store = self.store.lock().unwrap();
            let record = get(&store, id)?;
            if record.status != EmailStatus::Draft {
                return Err(AppError::InvalidTransition(format!(
                    "email {id} is {}, only drafts can be submitted",
                    record.status
                )));
            }
            if record.content.trim().is_empty() {
                return Err(AppError::Validation(
                    "Email content cannot be empty".to_string(),
                ));
            }
            if record.to.trim().is_empty() || !is_valid_email(&record.to) {
                return Err(AppError::Validation(
                    "Recipient address is required".to_string(),
                ));
            }
            let snapshot = record.clone();
            begin(&mut store, id)?;
            snapshot
        };

        let result = self.approvals.create_pending(&snapshot).await;

        let mut store = self.store.lock().unwrap();
        store.finish(id);
        match result {
            Ok(server_id) => {
                store.rekey(id, &server_id);
                let record = get_mut(&mut store, &server_id)?;
                record.status = EmailStatus::PendingApproval;
                info!(id = %server_id, to = %record.to, "email submitted for approval");
                self.notices.success("Email submitted for approval");
                Ok(record.clone())
            }
            Err(e) => {
                self.notices
                    .error(format!("Failed to submit for approval: {e}"));
                Err(e.into())
            }
        }
    }

    /// Resolves a pending email. Exactly-once: a record that is no longer
    /// pending is rejected locally before any network call, so a double
    /// approval can never double-dispatch. On approval the send is a second
    /// guarded step — a dispatch failure leaves the record `approved` and
    /// retryable.
    pub async fn approve(&self, id: &str, approved: bool) -> Result<EmailRecord, AppError> {
        {
            let mut store = self.store.lock().unwrap();
            let record = get(&store, id)?;
            if record.status != EmailStatus::PendingApproval {
                return Err(AppError::InvalidTransition(format!(
                    "email {id} is {}, already resolved",
                    record.status
                )));
            }
            begin(&mut store, id)?;
        }

        let result = self.approvals.resolve(id, approved).await;

        {
            let mut store = self.store.lock().unwrap();
            store.finish(id);
            match result {
                Ok(()) => {
                    let record = get_mut(&mut store, id)?;
                    if approved {
                        record.status = EmailStatus::Approved;
                    } else {
                        record.status = EmailStatus::Rejected;
                        info!(id, "email rejected");
                        self.notices.success("Email rejected");
                        return Ok(record.clone());
                    }
                }
                Err(e) => {
                    self.notices.error(format!("Failed to resolve email: {e}"));
                    return Err(e.into());
                }
            }
        }

        // Approved: dispatch through the relay.
        self.send(id).await
    }

    /// Dispatches an email. Valid from `approved` (two-party flow) and from
    /// `draft` (direct compose-and-send). A record already sent is never
    /// sent twice — guarded on the local status, not just server state.
    pub async fn send(&self, id: &str) -> Result<EmailRecord, AppError> {
        let request = {
            let mut store = self.store.lock().unwrap();
            let record = get(&store, id)?;
            match record.status {
                EmailStatus::Draft | EmailStatus::Approved => {}
                EmailStatus::Sent => {
                    return Err(AppError::InvalidTransition(format!(
                        "email {id} has already been sent"
                    )))
                }
                status => {
                    return Err(AppError::InvalidTransition(format!(
                        "email {id} is {status}, cannot be sent"
                    )))
                }
            }
            if record.content.trim().is_empty() {
                return Err(AppError::Validation(
                    "Email content cannot be empty".to_string(),
                ));
            }
            if record.to.trim().is_empty() || !is_valid_email(&record.to) {
                return Err(AppError::Validation(
                    "Recipient address is required".to_string(),
                ));
            }
            let request = SendRequest {
                to: record.to.clone(),
                subject: record.subject.clone(),
                message: record.content.clone(),
                sender: self.sender.clone(),
            };
            begin(&mut store, id)?;
            request
        };

        let result = self.transport.send(&request).await;

        let mut store = self.store.lock().unwrap();
        store.finish(id);
        match result {
            Ok(receipt) => {
                let record = get_mut(&mut store, id)?;
                record.status = EmailStatus::Sent;
                info!(id, to = %record.to, status = %receipt.status, "email dispatched");
                self.notices
                    .success(format!("Email sent to {}", record.to));
                Ok(record.clone())
            }
            Err(e) => {
                warn!(id, error = %e, "send failed, record left retryable");
                self.notices.error(format!("Failed to send email: {e}"));
                Err(e.into())
            }
        }
    }

    /// Refreshes the conversation thread of a sent email. The thread is
    /// append-only; the record's status never changes here.
    pub async fn fetch_thread(&self, id: &str) -> Result<Vec<ThreadMessage>, AppError> {
        {
            let mut store = self.store.lock().unwrap();
            let record = get(&store, id)?;
            if record.status != EmailStatus::Sent {
                return Err(AppError::InvalidTransition(format!(
                    "email {id} is {}, thread is available once sent",
                    record.status
                )));
            }
            begin(&mut store, id)?;
        }

        let result = self.transport.fetch_thread(id).await;

        let mut store = self.store.lock().unwrap();
        store.finish(id);
        match result {
            Ok(messages) => {
                let record = get_mut(&mut store, id)?;
                let appended = record.extend_thread(messages);
                if appended > 0 {
                    info!(id, appended, "thread messages arrived");
                }
                Ok(record.thread.clone())
            }
            Err(e) => {
                self.notices.error(format!("Failed to load thread: {e}"));
                Err(e.into())
            }
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // Reconciliation
    // ────────────────────────────────────────────────────────────────────

    /// Applies a fresh pending list from the approval store. The fetched
    /// list replaces the pending view wholesale, with two exclusions that
    /// prevent flicker and duplicate action affordances:
    /// ids with an action currently in flight, and ids already resolved
    /// locally (the store may briefly keep listing them).
    pub fn reconcile_pending(&self, fetched: Vec<PendingEmail>) -> Vec<EmailRecord> {
        let mut store = self.store.lock().unwrap();
        let mut view = Vec::new();
        for pending in fetched {
            if store.is_in_flight(&pending.id) {
                continue;
            }
            if let Some(existing) = store.get_mut(&pending.id) {
                if existing.status != EmailStatus::PendingApproval {
                    continue;
                }
                // List endpoint is authoritative for the mutable fields.
                existing.to = pending.to;
                existing.subject = pending.subject;
                existing.content = pending.content;
                existing.metadata = pending.metadata;
                view.push(existing.clone());
            } else {
                let record = pending.into_record();
                store.insert(record.clone());
                view.push(record);
            }
        }
        view
    }

    // ────────────────────────────────────────────────────────────────────
    // Accessors
    // ────────────────────────────────────────────────────────────────────

    pub fn record(&self, id: &str) -> Option<EmailRecord> {
        self.store.lock().unwrap().get(id).cloned()
    }

    pub fn records_by_status(&self, status: EmailStatus) -> Vec<EmailRecord> {
        self.store.lock().unwrap().by_status(status)
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        self.store.lock().unwrap().is_in_flight(id)
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }
}

fn get<'a>(store: &'a RecordStore, id: &str) -> Result<&'a EmailRecord, AppError> {
    store
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("Email {id} not found")))
}

fn get_mut<'a>(store: &'a mut RecordStore, id: &str) -> Result<&'a mut EmailRecord, AppError> {
    store
        .get_mut(id)
        .ok_or_else(|| AppError::NotFound(format!("Email {id} not found")))
}

fn begin(store: &mut RecordStore, id: &str) -> Result<(), AppError> {
    if store.begin(id) {
        Ok(())
    } else {
        Err(AppError::RecordBusy(id.to_string()))
    }
}
