use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::models::slot;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub charger_id: String,
    pub driver_id: String,
    pub booking_date: NaiveDate,
    pub start_time: String,
    /// Exclusive upper bound of the reserved slot.
    pub end_time: String,
    pub total_price: i64,
    pub status: BookingStatus,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    /// The status an `action` by `actor` moves this booking to, if that edge
    /// exists in the state machine. Terminal states have no outgoing edges.
    pub fn transition(self, action: BookingAction, actor: Actor) -> Option<BookingStatus> {
        match (self, action, actor) {
            (BookingStatus::Pending, BookingAction::Accept, Actor::Host) => {
                Some(BookingStatus::Confirmed)
            }
            (BookingStatus::Pending, BookingAction::Reject, Actor::Host) => {
                Some(BookingStatus::Cancelled)
            }
            (BookingStatus::Pending, BookingAction::Cancel, Actor::Driver) => {
                Some(BookingStatus::Cancelled)
            }
            (BookingStatus::Confirmed, BookingAction::Cancel, _) => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingAction {
    Accept,
    Reject,
    Cancel,
}

/// The caller's relationship to a booking: the driver who made it, or the
/// host owning its charger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Driver,
    Host,
}

/// Display phase derived from status and slot time. Nothing ever writes
/// `completed` through a transition; a confirmed booking whose slot has passed
/// simply renders as completed.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingPhase {
    Upcoming,
    Completed,
    Cancelled,
}

impl BookingPhase {
    pub fn of(
        status: BookingStatus,
        booking_date: NaiveDate,
        start_time: &str,
        now: NaiveDateTime,
    ) -> Self {
        match status {
            BookingStatus::Cancelled => BookingPhase::Cancelled,
            BookingStatus::Completed => BookingPhase::Completed,
            BookingStatus::Pending | BookingStatus::Confirmed => {
                let start_hour = slot::parse_hour(start_time).unwrap_or(0);
                let starts_at = booking_date
                    .and_hms_opt(u32::from(start_hour), 0, 0)
                    .unwrap_or_else(|| booking_date.and_time(chrono::NaiveTime::MIN));
                if starts_at > now {
                    BookingPhase::Upcoming
                } else {
                    BookingPhase::Completed
                }
            }
        }
    }
}

impl Booking {
    pub fn phase(&self, now: NaiveDateTime) -> BookingPhase {
        BookingPhase::of(self.status, self.booking_date, &self.start_time, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for s in ["pending", "confirmed", "completed", "cancelled"] {
            assert_eq!(BookingStatus::parse(s).unwrap().as_str(), s);
        }
    }

    #[test]
    fn test_status_parse_is_strict() {
        // A corrupt status must surface as an error rather than silently
        // becoming a slot-blocking pending booking.
        assert_eq!(BookingStatus::parse("paid"), None);
        assert_eq!(BookingStatus::parse(""), None);
        assert_eq!(BookingStatus::parse("Pending"), None);
    }

    #[test]
    fn test_host_accepts_pending() {
        assert_eq!(
            BookingStatus::Pending.transition(BookingAction::Accept, Actor::Host),
            Some(BookingStatus::Confirmed)
        );
    }

    #[test]
    fn test_host_rejects_pending() {
        assert_eq!(
            BookingStatus::Pending.transition(BookingAction::Reject, Actor::Host),
            Some(BookingStatus::Cancelled)
        );
    }

    #[test]
    fn test_driver_cancels_pending() {
        assert_eq!(
            BookingStatus::Pending.transition(BookingAction::Cancel, Actor::Driver),
            Some(BookingStatus::Cancelled)
        );
    }

    #[test]
    fn test_either_party_cancels_confirmed() {
        assert_eq!(
            BookingStatus::Confirmed.transition(BookingAction::Cancel, Actor::Driver),
            Some(BookingStatus::Cancelled)
        );
        assert_eq!(
            BookingStatus::Confirmed.transition(BookingAction::Cancel, Actor::Host),
            Some(BookingStatus::Cancelled)
        );
    }

    #[test]
    fn test_driver_cannot_accept_or_reject() {
        assert_eq!(
            BookingStatus::Pending.transition(BookingAction::Accept, Actor::Driver),
            None
        );
        assert_eq!(
            BookingStatus::Pending.transition(BookingAction::Reject, Actor::Driver),
            None
        );
    }

    #[test]
    fn test_terminal_states_have_no_edges() {
        for status in [BookingStatus::Cancelled, BookingStatus::Completed] {
            for action in [
                BookingAction::Accept,
                BookingAction::Reject,
                BookingAction::Cancel,
            ] {
                for actor in [Actor::Driver, Actor::Host] {
                    assert_eq!(status.transition(action, actor), None);
                }
            }
        }
    }

    #[test]
    fn test_accept_is_not_repeatable() {
        assert_eq!(
            BookingStatus::Confirmed.transition(BookingAction::Accept, Actor::Host),
            None
        );
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_phase_upcoming() {
        let phase = BookingPhase::of(
            BookingStatus::Confirmed,
            date("2025-06-20"),
            "10:00",
            dt("2025-06-16 09:00"),
        );
        assert_eq!(phase, BookingPhase::Upcoming);
    }

    #[test]
    fn test_phase_past_confirmed_is_completed() {
        let phase = BookingPhase::of(
            BookingStatus::Confirmed,
            date("2025-06-10"),
            "10:00",
            dt("2025-06-16 09:00"),
        );
        assert_eq!(phase, BookingPhase::Completed);
    }

    #[test]
    fn test_phase_pending_past_date_is_completed() {
        let phase = BookingPhase::of(
            BookingStatus::Pending,
            date("2025-06-10"),
            "10:00",
            dt("2025-06-16 09:00"),
        );
        assert_eq!(phase, BookingPhase::Completed);
    }

    #[test]
    fn test_phase_cancelled_wins_over_time() {
        let phase = BookingPhase::of(
            BookingStatus::Cancelled,
            date("2025-06-10"),
            "10:00",
            dt("2025-06-16 09:00"),
        );
        assert_eq!(phase, BookingPhase::Cancelled);
    }
}
