pub mod error;
pub mod models;
pub mod services;

pub use error::PaymentError;
pub use models::*;
pub use services::gateway::PaymentGateway;
pub use services::razorpay::RazorpayClient;
pub use services::signature::{payment_signature, verify_payment_signature};
