use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Role, User};
use crate::state::AppState;

// POST /api/auth/signup
//
// Called after the identity provider has created the account; records the
// user with their chosen role. The role never changes afterward.
#[derive(Deserialize)]
pub struct SignupRequest {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: String,
}

pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SignupRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    if body.user_id.trim().is_empty() || body.email.trim().is_empty() || body.name.trim().is_empty()
    {
        return Err(AppError::Validation(
            "user_id, email and name are required".to_string(),
        ));
    }
    let role = Role::parse(&body.role)
        .ok_or_else(|| AppError::Validation(format!("unknown role: {}", body.role)))?;

    let db = state.db.lock().unwrap();
    if queries::get_user(&db, &body.user_id)?.is_some() {
        return Err(AppError::Validation("user already exists".to_string()));
    }
    queries::create_user(
        &db,
        &User {
            id: body.user_id.clone(),
            email: body.email.trim().to_string(),
            name: body.name.trim().to_string(),
            role,
        },
    )?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "user_id": body.user_id })),
    ))
}

// GET /api/users/:id
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    let db = state.db.lock().unwrap();
    let user = queries::get_user(&db, &id)?
        .ok_or_else(|| AppError::NotFound(format!("user {id}")))?;
    Ok(Json(user))
}
