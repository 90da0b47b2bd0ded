use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    domain::{
        actor::RoleProfile, errors::OrderError, order::Order, order::OrderAggregate,
        status::OrderStatus,
    },
    platform::{
        app_error::{AppError, ErrorResponse, StdResponse},
        app_state::AppState,
    },
    services::{
        order_builder::{self, CheckoutLine},
        order_view::{self, OrderView},
        order_workflow,
    },
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_orders, create_order))
            .routes(utoipa_axum::routes!(get_own_orders))
            .routes(utoipa_axum::routes!(get_order, delete_order))
            .routes(utoipa_axum::routes!(update_order_status)),
    )
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderReq {
    pub meals: Vec<CheckoutLine>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusReq {
    pub status: OrderStatus,
}

async fn find_order(state: &AppState, id: i32) -> Result<OrderAggregate, OrderError> {
    state
        .repo
        .order_by_id(id)
        .await?
        .filter(|aggregate| !aggregate.order.is_deleted())
        .ok_or(OrderError::OrderNotFound(id))
}

/// Check out the given meals for the caller (or the member they care for).
#[utoipa::path(
    post,
    path = "/",
    tags = ["Orders"],
    security(("user_id" = [])),
    request_body = CreateOrderReq,
    responses(
        (status = 200, description = "Create order successfully", body = StdResponse<OrderView, String>),
        (status = 400, description = "Empty order or invalid quantity", body = ErrorResponse),
        (status = 404, description = "Meal or member not found", body = ErrorResponse),
        (status = 422, description = "Daily max order reached", body = ErrorResponse)
    )
)]
async fn create_order(
    State(state): State<AppState>,
    Extension(profile): Extension<RoleProfile>,
    Json(body): Json<CreateOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    let aggregate = order_builder::place_order(
        &*state.repo,
        &state.config.orders,
        profile.user.id,
        &body.meals,
        Utc::now(),
    )
    .await?;
    let order = order_view::render(&*state.repo, aggregate).await?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Create order successfully"),
    })
}

/// Fetch the orders of the calling member (or of the member a caregiver orders for), newest first.
#[utoipa::path(
    get,
    path = "/own",
    tags = ["Orders"],
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Get own orders successfully", body = StdResponse<Vec<OrderView>, String>),
        (status = 404, description = "Caller is not linked to a member", body = ErrorResponse)
    )
)]
async fn get_own_orders(
    State(state): State<AppState>,
    Extension(profile): Extension<RoleProfile>,
) -> Result<impl IntoResponse, AppError> {
    let member_id = profile
        .represented_member_id()
        .ok_or(OrderError::MemberNotFound)?;

    let orders = state.repo.orders_by_member(member_id).await?;
    let orders = order_view::render_all(&*state.repo, orders).await?;

    Ok(StdResponse {
        data: Some(orders),
        message: Some("Get own orders successfully"),
    })
}

/// Fetch every live order.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Orders"],
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Get orders successfully", body = StdResponse<Vec<OrderView>, String>),
        (status = 403, description = "Caller is not an admin", body = ErrorResponse)
    )
)]
async fn get_orders(
    State(state): State<AppState>,
    Extension(profile): Extension<RoleProfile>,
) -> Result<impl IntoResponse, AppError> {
    if !profile.is_admin() {
        return Err(AppError::ForbiddenResource(
            "Only admins can list all orders".to_string(),
        ));
    }

    let orders = state.repo.orders().await?;
    let orders = order_view::render_all(&*state.repo, orders).await?;

    Ok(StdResponse {
        data: Some(orders),
        message: Some("Get orders successfully"),
    })
}

/// Fetch a specific order with its meals and history.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Orders"],
    security(("user_id" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to fetch")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<OrderView, String>),
        (status = 404, description = "Order not found", body = ErrorResponse)
    )
)]
async fn get_order(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(profile): Extension<RoleProfile>,
) -> Result<impl IntoResponse, AppError> {
    let aggregate = find_order(&state, id).await?;
    if !order_workflow::can_view(&profile, &aggregate) {
        return Err(OrderError::OrderNotFound(id).into());
    }

    let order = order_view::render(&*state.repo, aggregate).await?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Get order successfully"),
    })
}

/// Move an order to the next status on behalf of the caller.
#[utoipa::path(
    patch,
    path = "/{id}/status",
    tags = ["Orders"],
    security(("user_id" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to update")
    ),
    request_body = UpdateOrderStatusReq,
    responses(
        (status = 200, description = "Update order status successfully", body = StdResponse<OrderView, String>),
        (status = 403, description = "Caller may not make this change", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse),
        (status = 409, description = "Order changed concurrently", body = ErrorResponse),
        (status = 422, description = "Transition not allowed", body = ErrorResponse)
    )
)]
async fn update_order_status(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(profile): Extension<RoleProfile>,
    Json(body): Json<UpdateOrderStatusReq>,
) -> Result<impl IntoResponse, AppError> {
    let aggregate =
        order_workflow::manual_transition(&*state.repo, id, body.status, &profile).await?;
    let order = order_view::render(&*state.repo, aggregate).await?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Update order status successfully"),
    })
}

/// Soft-delete an order. Its rows are kept but it no longer shows up anywhere.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Orders"],
    security(("user_id" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to delete")
    ),
    responses(
        (status = 200, description = "Delete order successfully", body = StdResponse<Order, String>),
        (status = 403, description = "Caller is not an admin", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse)
    )
)]
async fn delete_order(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(profile): Extension<RoleProfile>,
) -> Result<impl IntoResponse, AppError> {
    if !profile.is_admin() {
        return Err(AppError::ForbiddenResource(
            "Only admins can delete orders".to_string(),
        ));
    }

    let order = state
        .repo
        .soft_delete_order(id)
        .await?
        .ok_or(OrderError::OrderNotFound(id))?;
    tracing::info!(order_id = id, "Order deleted");

    Ok(StdResponse {
        data: Some(order),
        message: Some("Delete order successfully"),
    })
}
