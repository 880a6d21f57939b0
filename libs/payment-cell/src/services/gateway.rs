use async_trait::async_trait;

use crate::error::PaymentError;
use crate::models::{CreateOrderRequest, PaymentOrder, Refund};

/// External payment provider. Orders carry booking metadata in `notes`;
/// the order fetched back from the provider is the source of truth for it.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key id handed to the checkout client.
    fn key_id(&self) -> String;

    async fn create_order(&self, request: CreateOrderRequest) -> Result<PaymentOrder, PaymentError>;

    async fn fetch_order(&self, order_id: &str) -> Result<PaymentOrder, PaymentError>;

    async fn refund(&self, payment_id: &str, amount_minor: i64) -> Result<Refund, PaymentError>;
}
