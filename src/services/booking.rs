//! The booking engine: availability validation, overlap prevention,
//! server-side pricing, and the status state machine with relationship-based
//! authorization.

use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{slot, Actor, Booking, BookingAction, BookingStatus, ChargerStatus, SlotRange};

#[derive(Debug)]
pub struct BookingRequest {
    pub charger_id: String,
    pub driver_id: String,
    pub booking_date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
}

/// Validates the request against the charger's availability and existing
/// reservations, then inserts the booking as `pending` awaiting host review.
///
/// The whole check-then-insert sequence runs inside an IMMEDIATE transaction,
/// so two concurrent requests for the same slot cannot both pass the overlap
/// check. `total_price` is always recomputed from the charger's rate; a
/// client-supplied figure is display echo only and never stored.
pub fn create_booking(conn: &mut Connection, req: &BookingRequest) -> Result<Booking, AppError> {
    let range = SlotRange::parse(&req.start_time, &req.end_time)
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let charger = queries::get_charger(&tx, &req.charger_id)?
        .ok_or_else(|| AppError::NotFound(format!("charger {}", req.charger_id)))?;
    if charger.status != ChargerStatus::Active {
        return Err(AppError::InactiveCharger);
    }

    let window = SlotRange::parse(&charger.available_start, &charger.available_end)
        .map_err(|e| AppError::Validation(e.to_string()))?;
    if !window.contains(&range) {
        return Err(AppError::Validation(
            "requested slot is outside the charger's available hours".to_string(),
        ));
    }

    // Normalized slot strings so stored values always compare correctly.
    let start_time = slot::format_hour(range.start);
    let end_time = slot::format_hour(range.end);

    if queries::has_overlapping_booking(&tx, &charger.id, req.booking_date, &start_time, &end_time)?
    {
        return Err(AppError::SlotConflict);
    }

    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        charger_id: charger.id.clone(),
        driver_id: req.driver_id.clone(),
        booking_date: req.booking_date,
        start_time,
        end_time,
        total_price: range.hours() * charger.price_per_hour,
        status: BookingStatus::Pending,
        created_at: Utc::now().naive_utc(),
    };
    queries::insert_booking(&tx, &booking)?;
    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        charger_id = %booking.charger_id,
        "booking created"
    );
    Ok(booking)
}

/// Applies `action` on behalf of `caller_id`. The caller must be the
/// booking's driver or the owning charger's host; a party attempting an edge
/// the state machine does not define (including anything out of a terminal
/// state) gets `InvalidTransition`.
///
/// No overlap re-check here: cancellation only frees capacity and acceptance
/// confirms a reservation that was already exclusive at creation time. Slot
/// fields and price are immutable after creation.
pub fn transition_booking(
    conn: &Connection,
    booking_id: &str,
    caller_id: &str,
    action: BookingAction,
) -> Result<Booking, AppError> {
    let mut booking = queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
    let charger = queries::get_charger(conn, &booking.charger_id)?
        .ok_or_else(|| AppError::NotFound(format!("charger {}", booking.charger_id)))?;

    let actor = if caller_id == booking.driver_id {
        Actor::Driver
    } else if caller_id == charger.host_id {
        Actor::Host
    } else {
        return Err(AppError::Unauthorized);
    };

    let next = booking
        .status
        .transition(action, actor)
        .ok_or(AppError::InvalidTransition)?;

    if !queries::update_booking_status(conn, booking_id, next)? {
        return Err(AppError::NotFound(format!("booking {booking_id}")));
    }
    booking.status = next;

    tracing::info!(booking_id = %booking.id, status = %booking.status.as_str(), "booking transitioned");
    Ok(booking)
}

/// Free hour slots for a charger on a given date: the availability window
/// minus every slot held by a pending or confirmed booking. Re-derived
/// server-side rather than trusting client slot generation.
pub fn list_free_slots(
    conn: &Connection,
    charger_id: &str,
    date: NaiveDate,
) -> Result<Vec<String>, AppError> {
    let charger = queries::get_charger(conn, charger_id)?
        .ok_or_else(|| AppError::NotFound(format!("charger {charger_id}")))?;
    if charger.status != ChargerStatus::Active {
        return Err(AppError::InactiveCharger);
    }

    let window = SlotRange::parse(&charger.available_start, &charger.available_end)
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let taken = queries::active_bookings_for_day(conn, charger_id, date)?;

    let mut free = vec![];
    for hour in window.start..window.end {
        let candidate = SlotRange {
            start: hour,
            end: hour + 1,
        };
        let blocked = taken.iter().any(|b| {
            SlotRange::parse(&b.start_time, &b.end_time)
                .map(|r| r.overlaps(&candidate))
                .unwrap_or(true)
        });
        if !blocked {
            free.push(slot::format_hour(hour));
        }
    }
    Ok(free)
}
