use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::SchedulingStore;

#[derive(Clone)]
pub struct AvailabilityState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn SchedulingStore>,
}

impl AvailabilityState {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn SchedulingStore>) -> Self {
        Self { config, store }
    }
}
