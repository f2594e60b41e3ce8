pub mod booking;
pub mod payment;
pub mod refund;
pub mod slots;
