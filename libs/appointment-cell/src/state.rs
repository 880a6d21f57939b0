use std::sync::Arc;

use payment_cell::PaymentGateway;
use shared_config::AppConfig;
use shared_database::SchedulingStore;

#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn SchedulingStore>,
    pub payments: Arc<dyn PaymentGateway>,
}

impl AppointmentState {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn SchedulingStore>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self { config, store, payments }
    }
}
