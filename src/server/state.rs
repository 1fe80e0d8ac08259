use std::sync::Arc;
use std::time::Instant;

use crate::jobs::{JobStore, LocalizationEngine};
use crate::settings::Settings;

#[derive(Clone)]
pub(crate) struct ServerState {
    pub(crate) settings: Settings,
    pub(crate) store: Arc<JobStore>,
    pub(crate) engine: Arc<dyn LocalizationEngine>,
    pub(crate) started_at: Instant,
}
