pub mod booking;
pub mod tour;

pub use booking::{Booking, BookingStatus, RefundStatus};
pub use tour::Tour;
