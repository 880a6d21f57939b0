use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Which `SchedulingStore` implementation the binary wires up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    Supabase,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in_memory" | "inmemory" => Ok(StorageBackend::Memory),
            "supabase" | "postgrest" => Ok(StorageBackend::Supabase),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub storage_backend: StorageBackend,
    pub payment_gateway_base_url: String,
    pub payment_key_id: String,
    pub payment_key_secret: String,
    pub default_currency: String,
    pub default_timezone: String,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            storage_backend: env::var("STORAGE_BACKEND")
                .ok()
                .and_then(|value| match value.parse() {
                    Ok(backend) => Some(backend),
                    Err(e) => {
                        warn!("{}, falling back to in-memory storage", e);
                        None
                    }
                })
                .unwrap_or(StorageBackend::Memory),
            payment_gateway_base_url: env::var("PAYMENT_GATEWAY_BASE_URL")
                .unwrap_or_else(|_| {
                    warn!("PAYMENT_GATEWAY_BASE_URL not set, using default");
                    "https://api.razorpay.com/v1".to_string()
                }),
            payment_key_id: env::var("PAYMENT_KEY_ID")
                .unwrap_or_else(|_| {
                    warn!("PAYMENT_KEY_ID not set, using empty value");
                    String::new()
                }),
            payment_key_secret: env::var("PAYMENT_KEY_SECRET")
                .unwrap_or_else(|_| {
                    warn!("PAYMENT_KEY_SECRET not set, using empty value");
                    String::new()
                }),
            default_currency: env::var("DEFAULT_CURRENCY")
                .unwrap_or_else(|_| "INR".to_string()),
            default_timezone: env::var("DEFAULT_TIMEZONE")
                .unwrap_or_else(|_| "UTC".to_string()),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|port| port.parse().ok())
                .unwrap_or(3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        if !config.is_payment_configured() {
            warn!("Payment gateway credentials missing - bookings cannot be confirmed");
        }

        config
    }

    /// Auth always needs the JWT secret; the Supabase URL and key only matter
    /// when the Supabase store is selected.
    pub fn is_configured(&self) -> bool {
        let auth_ready = !self.supabase_jwt_secret.is_empty();
        match self.storage_backend {
            StorageBackend::Memory => auth_ready,
            StorageBackend::Supabase => {
                auth_ready && !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
            }
        }
    }

    pub fn is_payment_configured(&self) -> bool {
        !self.payment_key_id.is_empty()
            && !self.payment_key_secret.is_empty()
            && !self.payment_gateway_base_url.is_empty()
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.storage_backend
    }
}
