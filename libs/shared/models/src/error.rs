use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Integrity check failed: {0}")]
    Integrity(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Money was captured but the slot could not be claimed. Needs a manual refund.
    #[error("Conflict after payment: {message}")]
    PaymentCapturedConflict {
        message: String,
        order_id: String,
        payment_id: String,
        appointment_id: Option<String>,
    },

    #[error("External service error: {0}")]
    ExternalService(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::ValidationError(_) | AppError::Integrity(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Conflict(_) | AppError::PaymentCapturedConflict { .. } => StatusCode::CONFLICT,
            AppError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            AppError::PaymentCapturedConflict { message, order_id, payment_id, appointment_id } => {
                tracing::error!(
                    "Error: {}: {} (order {}, payment {}) - refund required",
                    status, message, order_id, payment_id
                );
                json!({
                    "error": message,
                    "requires_refund": true,
                    "order_id": order_id,
                    "payment_id": payment_id,
                    "appointment_id": appointment_id,
                })
            }
            AppError::Auth(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::ValidationError(msg)
            | AppError::Integrity(msg)
            | AppError::Conflict(msg)
            | AppError::ExternalService(msg)
            | AppError::Internal(msg)
            | AppError::Database(msg) => {
                if status.is_server_error() {
                    tracing::error!("Error: {}: {}", status, msg);
                } else {
                    tracing::debug!("Request rejected: {}: {}", status, msg);
                }
                json!({ "error": msg })
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::Auth("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::Integrity("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::ExternalService("x".into()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(AppError::Database("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let captured = AppError::PaymentCapturedConflict {
            message: "slot taken".into(),
            order_id: "order_1".into(),
            payment_id: "pay_1".into(),
            appointment_id: None,
        };
        assert_eq!(captured.status_code(), StatusCode::CONFLICT);
    }
}
