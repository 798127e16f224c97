//! Order routes.
//!
//! Thin wrappers over [`OrderEngine`](crate::services::OrderEngine): extract,
//! check role, call, serialize. The caller's id is recorded on every change.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use bistro_core::{ItemChanges, ItemRequest, Money, Order, OrderDetails, OrderStatus, Payment, Role};
use bistro_db::{OrderFilter, PaymentRequest};
use serde::{Deserialize, Serialize};

use crate::auth::Principal;
use crate::error::ApiResult;
use crate::state::AppState;

const TILL_ROLES: &[Role] = &[Role::Cashier, Role::Manager, Role::Admin];

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_by_id))
        .route("/{id}/status", put(transition))
        .route("/{id}/items", post(add_item))
        .route(
            "/{id}/items/{item_id}",
            put(update_item).delete(remove_item),
        )
        .route("/{id}/payments", get(payments).post(record_payment))
        .route("/{id}/discount", put(apply_discount))
}

#[derive(Debug, Deserialize)]
struct CreateOrderRequest {
    #[serde(flatten)]
    details: OrderDetails,
    #[serde(default)]
    items: Vec<ItemRequest>,
}

#[derive(Debug, Deserialize)]
struct StatusRequest {
    status: OrderStatus,
}

#[derive(Debug, Deserialize)]
struct DiscountRequest {
    discount_cents: i64,
}

#[derive(Debug, Serialize)]
struct PaymentResponse {
    order: Order,
    payment: Payment,
}

async fn list(
    State(state): State<AppState>,
    _user: Principal,
    Query(filter): Query<OrderFilter>,
) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(state.engine.list_orders(&filter).await?))
}

async fn create(
    State(state): State<AppState>,
    user: Principal,
    Json(body): Json<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let order = state
        .engine
        .create_order(&user.user_id, body.details, &body.items)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn get_by_id(
    State(state): State<AppState>,
    _user: Principal,
    Path(id): Path<String>,
) -> ApiResult<Json<Order>> {
    Ok(Json(state.engine.get_order(&id).await?))
}

async fn transition(
    State(state): State<AppState>,
    user: Principal,
    Path(id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> ApiResult<Json<Order>> {
    Ok(Json(
        state
            .engine
            .transition(&id, body.status, &user.user_id)
            .await?,
    ))
}

async fn add_item(
    State(state): State<AppState>,
    user: Principal,
    Path(id): Path<String>,
    Json(body): Json<ItemRequest>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let order = state.engine.add_item(&id, &body, &user.user_id).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn update_item(
    State(state): State<AppState>,
    user: Principal,
    Path((id, item_id)): Path<(String, String)>,
    Json(body): Json<ItemChanges>,
) -> ApiResult<Json<Order>> {
    Ok(Json(
        state
            .engine
            .update_item(&id, &item_id, &body, &user.user_id)
            .await?,
    ))
}

async fn remove_item(
    State(state): State<AppState>,
    user: Principal,
    Path((id, item_id)): Path<(String, String)>,
) -> ApiResult<Json<Order>> {
    Ok(Json(
        state
            .engine
            .remove_item(&id, &item_id, &user.user_id)
            .await?,
    ))
}

async fn payments(
    State(state): State<AppState>,
    _user: Principal,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Payment>>> {
    Ok(Json(state.engine.payments(&id).await?))
}

async fn record_payment(
    State(state): State<AppState>,
    user: Principal,
    Path(id): Path<String>,
    Json(body): Json<PaymentRequest>,
) -> ApiResult<(StatusCode, Json<PaymentResponse>)> {
    user.require_role(TILL_ROLES)?;
    let (order, payment) = state
        .engine
        .record_payment(&id, &body, &user.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(PaymentResponse { order, payment })))
}

async fn apply_discount(
    State(state): State<AppState>,
    user: Principal,
    Path(id): Path<String>,
    Json(body): Json<DiscountRequest>,
) -> ApiResult<Json<Order>> {
    user.require_role(TILL_ROLES)?;
    Ok(Json(
        state
            .engine
            .apply_discount(&id, Money::from_cents(body.discount_cents), &user.user_id)
            .await?,
    ))
}
