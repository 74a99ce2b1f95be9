use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::queries::{self, ChargerFilter};
use crate::errors::AppError;
use crate::handlers::caller_id;
use crate::models::{Charger, ChargerStatus, ChargerType, Role, SlotRange};
use crate::services::booking as engine;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ChargerInput {
    pub title: String,
    pub address: String,
    pub pincode: String,
    pub price_per_hour: i64,
    pub charger_type: String,
    pub power_output: f64,
    pub available_start: String,
    pub available_end: String,
    pub photo_url: Option<String>,
    /// Only honored on update; new chargers always start active.
    pub status: Option<String>,
}

fn validate_input(input: &ChargerInput) -> Result<(ChargerType, SlotRange), AppError> {
    let title = input.title.trim();
    if title.len() < 3 || title.len() > 100 {
        return Err(AppError::Validation(
            "title must be between 3 and 100 characters".to_string(),
        ));
    }
    let address = input.address.trim();
    if address.len() < 10 || address.len() > 200 {
        return Err(AppError::Validation(
            "address must be between 10 and 200 characters".to_string(),
        ));
    }
    if input.pincode.len() != 6 || !input.pincode.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation("pincode must be 6 digits".to_string()));
    }
    if !(10..=500).contains(&input.price_per_hour) {
        return Err(AppError::Validation(
            "price must be between 10 and 500 per hour".to_string(),
        ));
    }
    if !(1.0..=350.0).contains(&input.power_output) {
        return Err(AppError::Validation(
            "power output must be between 1 and 350 kW".to_string(),
        ));
    }
    let charger_type = ChargerType::parse(&input.charger_type)
        .ok_or_else(|| AppError::Validation(format!("unknown charger type: {}", input.charger_type)))?;
    let window = SlotRange::parse(&input.available_start, &input.available_end)
        .map_err(|e| AppError::Validation(e.to_string()))?;
    Ok((charger_type, window))
}

// POST /api/chargers
pub async fn create_charger(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ChargerInput>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let host_id = caller_id(&headers)?;
    let (charger_type, _) = validate_input(&body)?;

    let db = state.db.lock().unwrap();
    let host = queries::get_user(&db, &host_id)?
        .ok_or_else(|| AppError::NotFound(format!("user {host_id}")))?;
    if host.role != Role::Host {
        return Err(AppError::Unauthorized);
    }

    let charger = Charger {
        id: Uuid::new_v4().to_string(),
        host_id,
        title: body.title.trim().to_string(),
        address: body.address.trim().to_string(),
        pincode: body.pincode.clone(),
        price_per_hour: body.price_per_hour,
        charger_type,
        power_output: body.power_output,
        available_start: body.available_start.clone(),
        available_end: body.available_end.clone(),
        photo_url: body.photo_url.clone().filter(|s| !s.is_empty()),
        status: ChargerStatus::Active,
        created_at: Utc::now().naive_utc(),
    };
    queries::create_charger(&db, &charger)?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "charger": charger })),
    ))
}

// GET /api/chargers?host_id=
#[derive(Deserialize)]
pub struct HostChargersQuery {
    pub host_id: Option<String>,
}

pub async fn list_chargers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HostChargersQuery>,
) -> Result<Json<Vec<Charger>>, AppError> {
    let host_id = query
        .host_id
        .ok_or_else(|| AppError::Validation("host_id is required".to_string()))?;

    let db = state.db.lock().unwrap();
    let chargers = queries::get_chargers_for_host(&db, &host_id)?;
    Ok(Json(chargers))
}

// GET /api/chargers/search
#[derive(Deserialize)]
pub struct SearchQuery {
    pub pincode: Option<String>,
    pub charger_type: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_power: Option<f64>,
}

pub async fn search_chargers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Charger>>, AppError> {
    let filter = ChargerFilter {
        pincode: query.pincode.filter(|s| !s.is_empty()),
        charger_type: query.charger_type.filter(|s| !s.is_empty()),
        min_price: query.min_price,
        max_price: query.max_price,
        min_power: query.min_power,
    };

    let db = state.db.lock().unwrap();
    let chargers = queries::search_chargers(&db, &filter)?;
    Ok(Json(chargers))
}

// GET /api/chargers/:id
#[derive(Serialize)]
pub struct ChargerDetailResponse {
    #[serde(flatten)]
    pub charger: Charger,
    pub host_name: String,
}

pub async fn get_charger(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ChargerDetailResponse>, AppError> {
    let db = state.db.lock().unwrap();
    let (charger, host_name) = queries::get_charger_detail(&db, &id)?
        .ok_or_else(|| AppError::NotFound(format!("charger {id}")))?;
    Ok(Json(ChargerDetailResponse { charger, host_name }))
}

// PUT /api/chargers/:id
pub async fn update_charger(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ChargerInput>,
) -> Result<Json<serde_json::Value>, AppError> {
    let caller = caller_id(&headers)?;
    let (charger_type, _) = validate_input(&body)?;

    let db = state.db.lock().unwrap();
    let existing = queries::get_charger(&db, &id)?
        .ok_or_else(|| AppError::NotFound(format!("charger {id}")))?;
    if existing.host_id != caller {
        return Err(AppError::Unauthorized);
    }

    // An omitted status leaves the current one untouched, so a field-only
    // update cannot re-activate a paused charger.
    let status = match &body.status {
        Some(s) => ChargerStatus::parse(s)
            .ok_or_else(|| AppError::Validation(format!("unknown charger status: {s}")))?,
        None => existing.status,
    };

    let charger = Charger {
        title: body.title.trim().to_string(),
        address: body.address.trim().to_string(),
        pincode: body.pincode.clone(),
        price_per_hour: body.price_per_hour,
        charger_type,
        power_output: body.power_output,
        available_start: body.available_start.clone(),
        available_end: body.available_end.clone(),
        photo_url: body.photo_url.clone().filter(|s| !s.is_empty()),
        status,
        ..existing
    };
    queries::update_charger(&db, &charger)?;

    Ok(Json(serde_json::json!({ "success": true, "charger": charger })))
}

// DELETE /api/chargers/:id
pub async fn delete_charger(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let caller = caller_id(&headers)?;

    let db = state.db.lock().unwrap();
    let existing = queries::get_charger(&db, &id)?
        .ok_or_else(|| AppError::NotFound(format!("charger {id}")))?;
    if existing.host_id != caller {
        return Err(AppError::Unauthorized);
    }
    queries::delete_charger(&db, &id)?;

    Ok(Json(
        serde_json::json!({ "success": true, "message": "charger deleted" }),
    ))
}

// GET /api/chargers/:id/slots?date=YYYY-MM-DD
#[derive(Deserialize)]
pub struct SlotsQuery {
    pub date: String,
}

#[derive(Serialize)]
pub struct SlotsResponse {
    pub date: NaiveDate,
    pub slots: Vec<String>,
}

pub async fn free_slots(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<SlotsResponse>, AppError> {
    let date = NaiveDate::parse_from_str(&query.date, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("invalid date: {}", query.date)))?;

    let db = state.db.lock().unwrap();
    let slots = engine::list_free_slots(&db, &id, date)?;
    Ok(Json(SlotsResponse { date, slots }))
}
