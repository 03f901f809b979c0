use std::sync::Arc;

use crate::config::Config;
use crate::service::LeadService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LeadService>,
    pub config: Config,
}
