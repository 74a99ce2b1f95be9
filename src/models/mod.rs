pub mod booking;
pub mod charger;
pub mod slot;
pub mod user;

pub use booking::{Actor, Booking, BookingAction, BookingPhase, BookingStatus};
pub use charger::{Charger, ChargerStatus, ChargerType};
pub use slot::SlotRange;
pub use user::{Role, User};
