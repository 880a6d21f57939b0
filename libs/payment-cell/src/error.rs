use thiserror::Error;

use shared_models::error::AppError;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment gateway is not configured")]
    NotConfigured,

    #[error("Payment gateway error: {message}")]
    Gateway { message: String },

    #[error("Unexpected payment gateway response: {0}")]
    UnexpectedResponse(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Payment signature mismatch")]
    SignatureMismatch,
}

impl From<PaymentError> for AppError {
    fn from(error: PaymentError) -> Self {
        match error {
            PaymentError::SignatureMismatch => AppError::Integrity(error.to_string()),
            PaymentError::NotConfigured => AppError::Internal(error.to_string()),
            PaymentError::Gateway { .. }
            | PaymentError::UnexpectedResponse(_)
            | PaymentError::Http(_) => AppError::ExternalService(error.to_string()),
        }
    }
}
