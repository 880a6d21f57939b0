#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use mockall::mock;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::{AppointmentState, BookingMetadata, ConfirmBookingRequest};
use payment_cell::{
    payment_signature, CreateOrderRequest, PaymentError, PaymentGateway, PaymentOrder,
    RazorpayClient, Refund,
};
use shared_database::{InMemoryStore, SchedulingStore};
use shared_models::scheduling::{ConsultationMode, ProviderRate, ScheduleUpdate, TimeWindow};
use shared_utils::test_utils::{TestConfig, TestUser};

mock! {
    pub Gateway {}

    #[async_trait]
    impl PaymentGateway for Gateway {
        fn key_id(&self) -> String;
        async fn create_order(&self, request: CreateOrderRequest) -> Result<PaymentOrder, PaymentError>;
        async fn fetch_order(&self, order_id: &str) -> Result<PaymentOrder, PaymentError>;
        async fn refund(&self, payment_id: &str, amount_minor: i64) -> Result<Refund, PaymentError>;
    }
}

pub const FEE_MINOR: i64 = 50_000;

pub fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

pub fn first_slot() -> TimeWindow {
    TimeWindow::new(t(9, 0), t(9, 30))
}

/// Four 30-minute slots from 09:00 on `day()`, Asia/Kolkata.
pub fn morning_schedule(provider_id: Uuid) -> ScheduleUpdate {
    ScheduleUpdate {
        provider_id,
        date: day(),
        timezone: "Asia/Kolkata".to_string(),
        is_available: true,
        working_window: Some(TimeWindow::new(t(9, 0), t(11, 0))),
        break_window: None,
        slot_duration_minutes: Some(30),
        candidate_slots: vec![
            TimeWindow::new(t(9, 0), t(9, 30)),
            TimeWindow::new(t(9, 30), t(10, 0)),
            TimeWindow::new(t(10, 0), t(10, 30)),
            TimeWindow::new(t(10, 30), t(11, 0)),
        ],
    }
}

pub struct Harness {
    pub config: TestConfig,
    pub store: Arc<InMemoryStore>,
    pub provider: TestUser,
    pub patient: TestUser,
}

impl Harness {
    /// Provider with four 30-minute slots from 09:00 and a 500.00 INR rate.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    pub async fn with_config(config: TestConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let provider = TestUser::doctor("doc@example.com");
        let patient = TestUser::patient("pat@example.com");

        store.apply_schedule(morning_schedule(provider.uuid())).await.unwrap();

        store
            .upsert_provider_rate(ProviderRate {
                provider_id: provider.uuid(),
                consultation_fee_minor: FEE_MINOR,
                currency: "INR".to_string(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        Self { config, store, provider, patient }
    }

    pub fn state_with(&self, payments: Arc<dyn PaymentGateway>) -> AppointmentState {
        AppointmentState::new(self.config.to_arc(), self.store.clone(), payments)
    }

    /// State whose gateway is the HTTP client pointed at `server`.
    pub fn http_state(&self, server: &MockServer) -> AppointmentState {
        let config = TestConfig {
            payment_gateway_base_url: server.uri(),
            ..TestConfig::default()
        };
        let client = RazorpayClient::new(&config.to_app_config());
        self.state_with(Arc::new(client))
    }

    pub fn metadata(&self, patient: &TestUser, window: TimeWindow) -> BookingMetadata {
        BookingMetadata {
            patient_id: patient.uuid(),
            provider_id: self.provider.uuid(),
            date: day(),
            start_time: window.start_time,
            end_time: window.end_time,
            timezone: "Asia/Kolkata".to_string(),
            consultation_mode: ConsultationMode::Video,
            reason: Some("Follow-up".to_string()),
            notes: None,
        }
    }

    pub fn signed_confirmation(&self, order_id: &str, payment_id: &str) -> ConfirmBookingRequest {
        let signature = payment_signature(&self.config.payment_key_secret, order_id, payment_id).unwrap();
        ConfirmBookingRequest {
            order_id: order_id.to_string(),
            payment_id: payment_id.to_string(),
            signature,
            provider_id: None,
            date: None,
            start_time: None,
            end_time: None,
        }
    }
}

pub fn paid_order(order_id: &str, metadata: &BookingMetadata) -> PaymentOrder {
    PaymentOrder {
        id: order_id.to_string(),
        amount_minor: FEE_MINOR,
        currency: "INR".to_string(),
        receipt: None,
        status: "paid".to_string(),
        notes: metadata.to_notes(),
    }
}

/// Serves `GET /orders/{order_id}` with the metadata as notes.
pub async fn mount_paid_order(server: &MockServer, order_id: &str, metadata: &BookingMetadata) {
    Mock::given(method("GET"))
        .and(path(format!("/orders/{}", order_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": order_id,
            "entity": "order",
            "amount": FEE_MINOR,
            "amount_paid": FEE_MINOR,
            "currency": "INR",
            "receipt": "appt_test",
            "status": "paid",
            "notes": metadata.to_notes()
        })))
        .mount(server)
        .await;
}

/// A mock gateway that remembers the orders it creates and serves them back.
pub fn recording_gateway() -> MockGateway {
    let orders: Arc<Mutex<HashMap<String, PaymentOrder>>> = Arc::new(Mutex::new(HashMap::new()));
    let mut gateway = MockGateway::new();

    gateway.expect_key_id().return_const("rzp_test_key".to_string());

    let created = orders.clone();
    gateway.expect_create_order().returning(move |request| {
        let order = PaymentOrder {
            id: format!("order_{}", Uuid::new_v4().simple()),
            amount_minor: request.amount_minor,
            currency: request.currency,
            receipt: Some(request.receipt),
            status: "created".to_string(),
            notes: request.notes,
        };
        created.lock().unwrap().insert(order.id.clone(), order.clone());
        Ok(order)
    });

    let known = orders;
    gateway.expect_fetch_order().returning(move |order_id| {
        known
            .lock()
            .unwrap()
            .get(order_id)
            .cloned()
            .ok_or_else(|| PaymentError::Gateway { message: format!("HTTP 400: {} does not exist", order_id) })
    });

    gateway
}
