use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use uuid::Uuid;

use shared_config::{AppConfig, StorageBackend};
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub payment_gateway_base_url: String,
    pub payment_key_id: String,
    pub payment_key_secret: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            payment_gateway_base_url: "http://localhost:9911/v1".to_string(),
            payment_key_id: "rzp_test_key".to_string(),
            payment_key_secret: "rzp_test_secret".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(mut self, url: &str) -> Self {
        self.supabase_url = url.to_string();
        self
    }

    pub fn with_payment_gateway_url(mut self, url: &str) -> Self {
        self.payment_gateway_base_url = url.to_string();
        self
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            storage_backend: StorageBackend::Memory,
            payment_gateway_base_url: self.payment_gateway_base_url.clone(),
            payment_key_id: self.payment_key_id.clone(),
            payment_key_secret: self.payment_key_secret.clone(),
            default_currency: "INR".to_string(),
            default_timezone: "Asia/Kolkata".to_string(),
            server_port: 3000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn uuid(&self) -> Uuid {
        Uuid::parse_str(&self.id).unwrap_or_default()
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let claims = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "aud": "authenticated",
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap_or_default()
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned PostgREST rows for wiremock-backed store tests.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn availability_row(provider_id: &str, date: &str, slots: serde_json::Value) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "provider_id": provider_id,
            "date": date,
            "timezone": "Asia/Kolkata",
            "is_available": true,
            "working_window": { "start_time": "09:00:00", "end_time": "17:00:00" },
            "break_window": { "start_time": "13:00:00", "end_time": "14:00:00" },
            "slot_duration_minutes": 30,
            "slots": slots,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        })
    }

    pub fn slot_row(start: &str, end: &str, is_booked: bool) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "availability_id": Uuid::new_v4(),
            "start_time": start,
            "end_time": end,
            "is_booked": is_booked,
            "appointment_id": if is_booked { Some(Uuid::new_v4()) } else { None }
        })
    }

    pub fn appointment_row(patient_id: &str, provider_id: &str, order_id: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "patient_id": patient_id,
            "provider_id": provider_id,
            "date": "2026-03-02",
            "start_time": "09:00:00",
            "end_time": "09:30:00",
            "timezone": "Asia/Kolkata",
            "consultation_mode": "video",
            "reason": "Follow-up",
            "notes": null,
            "status": "scheduled",
            "fee_minor": 50000,
            "currency": "INR",
            "payment_status": "paid",
            "payment_order_id": order_id,
            "payment_id": "pay_test_1",
            "refund_id": null,
            "cancellation_reason": null,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert!(!app_config.supabase_jwt_secret.is_empty());
        assert!(app_config.is_payment_configured());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::doctor("doc@example.com");
        assert_eq!(user.email, "doc@example.com");
        assert_eq!(user.role, "doctor");

        let user_model = user.to_user();
        assert_eq!(user_model.email, Some(user.email.clone()));
        assert_eq!(user_model.id, user.id);
        assert_eq!(user_model.uuid(), Some(user.uuid()));
    }

    #[test]
    fn test_jwt_token_creation() {
        let user = TestUser::default();
        let token = JwtTestUtils::create_test_token(&user, "test-secret", Some(1));

        assert_eq!(token.split('.').count(), 3);
    }
}
