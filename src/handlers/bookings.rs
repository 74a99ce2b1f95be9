use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::Json;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::db::queries::{self, DriverBookingRow, HostBookingRow};
use crate::errors::AppError;
use crate::handlers::{caller_id, client_id};
use crate::models::{Booking, BookingAction, BookingPhase, BookingStatus};
use crate::services::booking::{self as engine, BookingRequest};
use crate::services::realtime::{publish_change, ChangeKind};
use crate::state::AppState;

// POST /api/bookings
#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub charger_id: String,
    pub booking_date: String,
    pub start_time: String,
    pub end_time: String,
    /// Client-computed display figure, accepted but never trusted; the
    /// stored price is always recomputed from the charger's rate.
    pub total_price: Option<i64>,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let driver_id = caller_id(&headers)?;
    let booking_date = NaiveDate::parse_from_str(&body.booking_date, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("invalid booking date: {}", body.booking_date)))?;

    let booking = {
        let mut db = state.db.lock().unwrap();
        engine::create_booking(
            &mut db,
            &BookingRequest {
                charger_id: body.charger_id.clone(),
                driver_id,
                booking_date,
                start_time: body.start_time.clone(),
                end_time: body.end_time.clone(),
            },
        )?
    };

    publish_change(
        &state,
        ChangeKind::Insert,
        &booking,
        client_id(&headers).as_deref(),
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "booking": booking })),
    ))
}

// ── Status transitions ──

async fn transition(
    state: Arc<AppState>,
    headers: HeaderMap,
    booking_id: String,
    action: BookingAction,
) -> Result<Json<serde_json::Value>, AppError> {
    let caller = caller_id(&headers)?;

    let booking = {
        let db = state.db.lock().unwrap();
        engine::transition_booking(&db, &booking_id, &caller, action)?
    };

    publish_change(
        &state,
        ChangeKind::Update,
        &booking,
        client_id(&headers).as_deref(),
    );

    Ok(Json(serde_json::json!({ "success": true, "booking": booking })))
}

// POST /api/bookings/:id/accept
pub async fn accept_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    transition(state, headers, id, BookingAction::Accept).await
}

// POST /api/bookings/:id/reject
pub async fn reject_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    transition(state, headers, id, BookingAction::Reject).await
}

// POST /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    transition(state, headers, id, BookingAction::Cancel).await
}

// ── Booking views ──

#[derive(Serialize)]
pub struct DriverBookingResponse {
    pub id: String,
    pub charger_id: String,
    pub driver_id: String,
    pub booking_date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub total_price: i64,
    pub status: BookingStatus,
    pub phase: BookingPhase,
    pub created_at: NaiveDateTime,
    pub charger_title: String,
    pub charger_address: String,
    pub charger_photo_url: Option<String>,
    pub price_per_hour: i64,
    pub host_id: String,
    pub host_name: String,
}

impl DriverBookingResponse {
    fn from_row(row: DriverBookingRow, now: NaiveDateTime) -> Self {
        let phase = row.booking.phase(now);
        let Booking {
            id,
            charger_id,
            driver_id,
            booking_date,
            start_time,
            end_time,
            total_price,
            status,
            created_at,
        } = row.booking;
        Self {
            id,
            charger_id,
            driver_id,
            booking_date,
            start_time,
            end_time,
            total_price,
            status,
            phase,
            created_at,
            charger_title: row.charger_title,
            charger_address: row.charger_address,
            charger_photo_url: row.charger_photo_url,
            price_per_hour: row.price_per_hour,
            host_id: row.host_id,
            host_name: row.host_name,
        }
    }
}

#[derive(Serialize)]
pub struct HostBookingResponse {
    pub id: String,
    pub charger_id: String,
    pub driver_id: String,
    pub booking_date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub total_price: i64,
    pub status: BookingStatus,
    pub phase: BookingPhase,
    pub created_at: NaiveDateTime,
    pub charger_title: String,
    pub charger_address: String,
    pub price_per_hour: i64,
    pub driver_name: String,
    pub driver_email: String,
}

impl HostBookingResponse {
    fn from_row(row: HostBookingRow, now: NaiveDateTime) -> Self {
        let phase = row.booking.phase(now);
        let Booking {
            id,
            charger_id,
            driver_id,
            booking_date,
            start_time,
            end_time,
            total_price,
            status,
            created_at,
        } = row.booking;
        Self {
            id,
            charger_id,
            driver_id,
            booking_date,
            start_time,
            end_time,
            total_price,
            status,
            phase,
            created_at,
            charger_title: row.charger_title,
            charger_address: row.charger_address,
            price_per_hour: row.price_per_hour,
            driver_name: row.driver_name,
            driver_email: row.driver_email,
        }
    }
}

// GET /api/bookings?driver_id=
#[derive(Deserialize)]
pub struct DriverBookingsQuery {
    pub driver_id: Option<String>,
    pub status: Option<String>,
}

pub async fn list_driver_bookings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DriverBookingsQuery>,
) -> Result<Json<Vec<DriverBookingResponse>>, AppError> {
    let driver_id = query
        .driver_id
        .ok_or_else(|| AppError::Validation("driver_id is required".to_string()))?;

    let rows = {
        let db = state.db.lock().unwrap();
        queries::bookings_for_driver(&db, &driver_id, query.status.as_deref())?
    };

    let now = Utc::now().naive_utc();
    Ok(Json(
        rows.into_iter()
            .map(|row| DriverBookingResponse::from_row(row, now))
            .collect(),
    ))
}

// GET /api/bookings/host?host_id=
#[derive(Deserialize)]
pub struct HostBookingsQuery {
    pub host_id: Option<String>,
    pub status: Option<String>,
}

pub async fn list_host_bookings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HostBookingsQuery>,
) -> Result<Json<Vec<HostBookingResponse>>, AppError> {
    let host_id = query
        .host_id
        .ok_or_else(|| AppError::Validation("host_id is required".to_string()))?;

    let rows = {
        let db = state.db.lock().unwrap();
        queries::bookings_for_host(&db, &host_id, query.status.as_deref())?
    };

    let now = Utc::now().naive_utc();
    Ok(Json(
        rows.into_iter()
            .map(|row| HostBookingResponse::from_row(row, now))
            .collect(),
    ))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DriverBookingResponse>, AppError> {
    let row = {
        let db = state.db.lock().unwrap();
        queries::get_booking_detail(&db, &id)?
            .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?
    };
    Ok(Json(DriverBookingResponse::from_row(
        row,
        Utc::now().naive_utc(),
    )))
}

// GET /api/bookings/events — SSE change stream
//
// Advisory cache-invalidation channel, never the source of truth. Each event
// is tagged with whether this subscriber's client caused it, so the client
// can suppress its own toast.
#[derive(Deserialize)]
pub struct EventsQuery {
    pub client_id: Option<String>,
}

pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.booking_tx.subscribe();
    let subscriber = query.client_id;

    let live_stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(event) => {
            let self_change = subscriber
                .as_deref()
                .map(|client| state.guard.consume(client, &event.booking.id))
                .unwrap_or(false);
            let data = serde_json::json!({
                "event": event.event,
                "booking": event.booking,
                "self_change": self_change,
            });
            Some(Ok(Event::default()
                .data(data.to_string())
                .event("booking_change")))
        }
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(_)) => None,
    });

    let keepalive_stream = tokio_stream::StreamExt::map(
        tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(Duration::from_secs(30))),
        |_| Ok(Event::default().comment("keepalive")),
    );

    Sse::new(StreamExt::merge(live_stream, keepalive_stream))
}
