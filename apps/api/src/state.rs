use std::sync::Arc;

use crate::backend::ResumePipeline;
use crate::config::Config;
use crate::lifecycle::LifecycleManager;
use crate::notice::NoticeBoard;
use crate::queue::QueuePoller;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<LifecycleManager>,
    pub poller: Arc<QueuePoller>,
    /// Résumé ingestion hand-off; failures here degrade to warnings.
    pub pipeline: Arc<dyn ResumePipeline>,
    pub notices: NoticeBoard,
    pub config: Config,
}
