pub mod booking;
pub mod realtime;
