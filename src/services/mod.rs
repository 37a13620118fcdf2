pub mod booking;
pub mod calendar;
pub mod ids;
pub mod lifecycle;
pub mod slots;

pub use booking::BookingService;
