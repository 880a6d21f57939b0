use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::error::PaymentError;
use crate::models::{CreateOrderRequest, PaymentOrder, Refund, RefundRequest};
use crate::services::gateway::PaymentGateway;

/// Orders / payments REST client authenticated with HTTP basic auth (`key_id:key_secret`).
pub struct RazorpayClient {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayClient {
    /// Missing credentials are reported per call as `NotConfigured`, so the
    /// service can still start and serve the non-payment routes.
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.payment_gateway_base_url.trim_end_matches('/').to_string(),
            key_id: config.payment_key_id.clone(),
            key_secret: config.payment_key_secret.clone(),
        }
    }

    fn is_configured(&self) -> bool {
        !self.key_id.is_empty() && !self.key_secret.is_empty()
    }

    async fn send<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, PaymentError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        if !self.is_configured() {
            return Err(PaymentError::NotConfigured);
        }

        let url = format!("{}{}", self.base_url, path);
        debug!("Sending {} request to payment gateway: {}", method, url);

        let mut request = self
            .client
            .request(method, &url)
            .basic_auth(&self.key_id, Some(&self.key_secret));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            error!("Payment gateway request failed: {} - {}", status, response_text);
            return Err(PaymentError::Gateway {
                message: format!("HTTP {}: {}", status, gateway_description(&response_text)),
            });
        }

        serde_json::from_str(&response_text).map_err(|e| {
            error!("Could not parse payment gateway response: {}", e);
            PaymentError::UnexpectedResponse(e.to_string())
        })
    }
}

/// Pulls `error.description` out of a gateway error body, falling back to the raw text.
fn gateway_description(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value["error"]["description"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    fn key_id(&self) -> String {
        self.key_id.clone()
    }

    async fn create_order(&self, request: CreateOrderRequest) -> Result<PaymentOrder, PaymentError> {
        let order: PaymentOrder = self.send(Method::POST, "/orders", Some(&request)).await?;
        info!("Created payment order {} for {} {}", order.id, order.amount_minor, order.currency);
        Ok(order)
    }

    async fn fetch_order(&self, order_id: &str) -> Result<PaymentOrder, PaymentError> {
        let path = format!("/orders/{}", order_id);
        self.send::<(), _>(Method::GET, &path, None).await
    }

    async fn refund(&self, payment_id: &str, amount_minor: i64) -> Result<Refund, PaymentError> {
        let path = format!("/payments/{}/refund", payment_id);
        let refund: Refund = self
            .send(Method::POST, &path, Some(&RefundRequest { amount: amount_minor }))
            .await?;
        info!("Issued refund {} for payment {}", refund.id, payment_id);
        Ok(refund)
    }
}
