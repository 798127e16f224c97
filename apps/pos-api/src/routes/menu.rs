//! Menu catalogue routes.
//!
//! Reads are open to any signed-in staff member. Creating items and options
//! needs a manager; availability can also be toggled by the kitchen.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use bistro_core::{MenuItem, ModifierOption, Role};
use bistro_db::{NewMenuItem, NewModifierOption};
use serde::Deserialize;

use crate::auth::Principal;
use crate::error::ApiResult;
use crate::state::AppState;

const MENU_EDITORS: &[Role] = &[Role::Manager, Role::Admin];

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/menu", routes())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}/availability", put(set_availability))
        .route("/{id}/modifiers", get(modifiers).post(add_modifier))
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    #[serde(default)]
    available: bool,
}

async fn list(
    State(state): State<AppState>,
    _user: Principal,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<MenuItem>>> {
    Ok(Json(state.db.menu().list(query.available).await?))
}

async fn create(
    State(state): State<AppState>,
    user: Principal,
    Json(input): Json<NewMenuItem>,
) -> ApiResult<(StatusCode, Json<MenuItem>)> {
    user.require_role(MENU_EDITORS)?;
    let item = state.db.menu().create(&input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[derive(Debug, Deserialize)]
struct AvailabilityRequest {
    is_available: bool,
}

async fn set_availability(
    State(state): State<AppState>,
    user: Principal,
    Path(id): Path<String>,
    Json(body): Json<AvailabilityRequest>,
) -> ApiResult<Json<MenuItem>> {
    user.require_role(&[Role::Manager, Role::Admin, Role::Kitchen])?;
    Ok(Json(
        state.db.menu().set_availability(&id, body.is_available).await?,
    ))
}

async fn modifiers(
    State(state): State<AppState>,
    _user: Principal,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ModifierOption>>> {
    Ok(Json(state.db.menu().modifiers(&id).await?))
}

async fn add_modifier(
    State(state): State<AppState>,
    user: Principal,
    Path(id): Path<String>,
    Json(input): Json<NewModifierOption>,
) -> ApiResult<(StatusCode, Json<ModifierOption>)> {
    user.require_role(MENU_EDITORS)?;
    let option = state.db.menu().add_modifier(&id, &input).await?;
    Ok((StatusCode::CREATED, Json(option)))
}
