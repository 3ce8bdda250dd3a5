//! Approval queue poller: keeps a client-side view of the pending-approval
//! set by refreshing from the approval store on a fixed cadence and on
//! demand. A failed refresh keeps the previous view and never stops the
//! loop; only an explicit `stop()` does.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::backend::ApprovalStore;
use crate::errors::AppError;
use crate::lifecycle::{EmailRecord, LifecycleManager};
use crate::notice::NoticeBoard;

/// Read-only notification invoked when a queue row is selected.
pub type SelectionHook = Arc<dyn Fn(&EmailRecord) + Send + Sync>;

pub struct QueuePoller {
    manager: Arc<LifecycleManager>,
    approvals: Arc<dyn ApprovalStore>,
    notices: NoticeBoard,
    interval: Duration,
    view: Arc<Mutex<Vec<EmailRecord>>>,
    task: Mutex<Option<JoinHandle<()>>>,
    on_select: Mutex<Option<SelectionHook>>,
}

impl QueuePoller {
    pub fn new(
        manager: Arc<LifecycleManager>,
        approvals: Arc<dyn ApprovalStore>,
        notices: NoticeBoard,
        interval: Duration,
    ) -> Self {
        Self {
            manager,
            approvals,
            notices,
            interval,
            view: Arc::new(Mutex::new(Vec::new())),
            task: Mutex::new(None),
            on_select: Mutex::new(None),
        }
    }

    pub fn set_selection_hook(&self, hook: SelectionHook) {
        *self.on_select.lock().unwrap() = Some(hook);
    }

    /// Begins periodic refresh. The first refresh fires immediately, not
    /// after the first interval. Calling `start` while already polling is a
    /// no-op.
    pub fn start(&self) {
        let mut task = self.task.lock().unwrap();
        if task.is_some() {
            return;
        }
        let manager = self.manager.clone();
        let approvals = self.approvals.clone();
        let notices = self.notices.clone();
        let view = self.view.clone();
        let interval = self.interval;
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = refresh(&approvals, &manager, &notices, &view).await {
                    warn!(error = %e, "queue refresh failed; keeping previous view");
                }
            }
        }));
    }

    /// Cancels the periodic refresh. Safe to call repeatedly; in-flight
    /// responses die with the task, so a disposed view is never updated.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().unwrap().take() {
            task.abort();
        }
    }

    /// Single fetch + reconcile. On error the previously known list is
    /// preserved and the error is surfaced without clearing anything.
    pub async fn refresh_once(&self) -> Result<Vec<EmailRecord>, AppError> {
        refresh(&self.approvals, &self.manager, &self.notices, &self.view).await
    }

    pub fn snapshot(&self) -> Vec<EmailRecord> {
        self.view.lock().unwrap().clone()
    }

    /// Looks up a row in the current view and notifies the selection hook.
    /// Never mutates state.
    pub fn select(&self, id: &str) -> Option<EmailRecord> {
        let record = self
            .view
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned();
        if let Some(record) = &record {
            let hook = self.on_select.lock().unwrap().clone();
            if let Some(hook) = hook {
                hook(record);
            }
        }
        record
    }
}

impl Drop for QueuePoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn refresh(
    approvals: &Arc<dyn ApprovalStore>,
    manager: &LifecycleManager,
    notices: &NoticeBoard,
    view: &Mutex<Vec<EmailRecord>>,
) -> Result<Vec<EmailRecord>, AppError> {
    match approvals.list_pending().await {
        Ok(fetched) => {
            let reconciled = manager.reconcile_pending(fetched);
            debug!(pending = reconciled.len(), "approval queue refreshed");
            *view.lock().unwrap() = reconciled.clone();
            Ok(reconciled)
        }
        Err(e) => {
            notices.error(format!("Failed to refresh approval queue: {e}"));
            Err(e.into())
        }
    }
}
