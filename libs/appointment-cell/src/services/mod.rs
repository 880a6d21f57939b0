pub mod appointments;
pub mod booking;
pub mod lifecycle;
