pub mod gateway;
pub mod razorpay;
pub mod signature;
