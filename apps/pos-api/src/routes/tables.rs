//! Table Registry routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use bistro_core::{Role, Table, TableStatus};
use bistro_db::{NewTable, TableTransfer};
use serde::Deserialize;

use crate::auth::Principal;
use crate::error::ApiResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/tables", routes())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_by_id))
        .route("/{id}/status", put(set_status))
        .route("/{id}/assign", post(assign))
        .route("/{id}/release", post(release))
        .route("/{id}/transfer", put(transfer))
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    #[serde(default)]
    status: Option<TableStatus>,
}

#[derive(Debug, Deserialize)]
struct StatusRequest {
    status: TableStatus,
}

#[derive(Debug, Deserialize)]
struct AssignRequest {
    order_id: String,
}

#[derive(Debug, Deserialize)]
struct TransferRequest {
    order_id: String,
    to_table_id: String,
}

async fn list(
    State(state): State<AppState>,
    _user: Principal,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Table>>> {
    Ok(Json(state.engine.list_tables(query.status).await?))
}

async fn create(
    State(state): State<AppState>,
    user: Principal,
    Json(input): Json<NewTable>,
) -> ApiResult<(StatusCode, Json<Table>)> {
    user.require_role(&[Role::Manager, Role::Admin])?;
    let table = state.engine.create_table(&input).await?;
    Ok((StatusCode::CREATED, Json(table)))
}

async fn get_by_id(
    State(state): State<AppState>,
    _user: Principal,
    Path(id): Path<String>,
) -> ApiResult<Json<Table>> {
    Ok(Json(state.engine.get_table(&id).await?))
}

async fn set_status(
    State(state): State<AppState>,
    _user: Principal,
    Path(id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> ApiResult<Json<Table>> {
    Ok(Json(state.engine.set_table_status(&id, body.status).await?))
}

async fn assign(
    State(state): State<AppState>,
    _user: Principal,
    Path(id): Path<String>,
    Json(body): Json<AssignRequest>,
) -> ApiResult<Json<Table>> {
    Ok(Json(state.engine.assign_table(&id, &body.order_id).await?))
}

async fn release(
    State(state): State<AppState>,
    _user: Principal,
    Path(id): Path<String>,
) -> ApiResult<Json<Table>> {
    Ok(Json(state.engine.release_table(&id).await?))
}

/// `{id}` is the table the order currently sits at.
async fn transfer(
    State(state): State<AppState>,
    user: Principal,
    Path(id): Path<String>,
    Json(body): Json<TransferRequest>,
) -> ApiResult<Json<TableTransfer>> {
    Ok(Json(
        state
            .engine
            .transfer_table(&body.order_id, &id, &body.to_table_id, &user.user_id)
            .await?,
    ))
}
