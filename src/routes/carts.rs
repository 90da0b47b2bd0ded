use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    domain::{
        actor::RoleProfile,
        cart::{Cart, NewCartLine, ResolvedCart},
        errors::CartError,
    },
    platform::{
        app_error::{AppError, ErrorResponse, StdResponse},
        app_state::AppState,
    },
    services::cart_resolver::{reference_for, resolve_cart, resolve_carts},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/carts",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_raw_carts))
            .routes(utoipa_axum::routes!(get_my_carts, create_cart))
            .routes(utoipa_axum::routes!(get_cart, update_cart, delete_cart)),
    )
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCartReq {
    pub meal_id: i32,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartReq {
    pub quantity: i32,
}

fn check_quantity(quantity: i32) -> Result<(), CartError> {
    if quantity < 1 {
        return Err(CartError::InvalidQuantity(quantity));
    }
    Ok(())
}

/// Fetch every cart line in the system, unresolved.
#[utoipa::path(
    get,
    path = "/raw",
    tags = ["Carts"],
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Get raw carts successfully", body = StdResponse<Vec<Cart>, String>),
        (status = 403, description = "Caller is not an admin", body = ErrorResponse)
    )
)]
async fn get_raw_carts(
    State(state): State<AppState>,
    Extension(profile): Extension<RoleProfile>,
) -> Result<impl IntoResponse, AppError> {
    if !profile.is_admin() {
        return Err(AppError::ForbiddenResource(
            "Only admins can list raw carts".to_string(),
        ));
    }

    let carts = state.repo.carts().await?;

    Ok(StdResponse {
        data: Some(carts),
        message: Some("Get raw carts successfully"),
    })
}

/// Fetch the caller's cart lines with their owner.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Carts"],
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Get my carts successfully", body = StdResponse<Vec<ResolvedCart>, String>)
    )
)]
async fn get_my_carts(
    State(state): State<AppState>,
    Extension(profile): Extension<RoleProfile>,
) -> Result<impl IntoResponse, AppError> {
    let reference = reference_for(&profile)?;
    let carts = state.repo.carts_by_reference(reference).await?;
    let carts = resolve_carts(&*state.repo, carts).await?;

    Ok(StdResponse {
        data: Some(carts),
        message: Some("Get my carts successfully"),
    })
}

/// Fetch a single cart line. Admins may read any line.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Carts"],
    security(("user_id" = [])),
    params(
        ("id" = i32, Path, description = "Cart ID to fetch")
    ),
    responses(
        (status = 200, description = "Get cart successfully", body = StdResponse<ResolvedCart, String>),
        (status = 404, description = "Cart not found", body = ErrorResponse)
    )
)]
async fn get_cart(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(profile): Extension<RoleProfile>,
) -> Result<impl IntoResponse, AppError> {
    let cart = state
        .repo
        .cart_by_id(id)
        .await?
        .ok_or(CartError::CartNotFound(id))?;

    if !profile.is_admin() && reference_for(&profile).ok() != Some(cart.reference) {
        return Err(CartError::CartNotFound(id).into());
    }

    let cart = resolve_cart(&*state.repo, cart).await?;

    Ok(StdResponse {
        data: Some(cart),
        message: Some("Get cart successfully"),
    })
}

/// Add a meal to the caller's cart. Adding a meal already in the cart raises its quantity.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Carts"],
    security(("user_id" = [])),
    request_body = CreateCartReq,
    responses(
        (status = 200, description = "Add to cart successfully", body = StdResponse<ResolvedCart, String>),
        (status = 400, description = "Invalid quantity", body = ErrorResponse),
        (status = 404, description = "Meal not found", body = ErrorResponse)
    )
)]
async fn create_cart(
    State(state): State<AppState>,
    Extension(profile): Extension<RoleProfile>,
    Json(body): Json<CreateCartReq>,
) -> Result<impl IntoResponse, AppError> {
    let reference = reference_for(&profile)?;
    check_quantity(body.quantity)?;

    if state.repo.meal_by_id(body.meal_id).await?.is_none() {
        return Err(CartError::MealNotFound(body.meal_id).into());
    }

    let cart = state
        .repo
        .add_to_cart(NewCartLine {
            meal_id: body.meal_id,
            reference,
            quantity: body.quantity,
        })
        .await?;
    tracing::info!(cart_id = cart.id, meal_id = cart.meal_id, %reference, "Cart updated");

    let cart = resolve_cart(&*state.repo, cart).await?;

    Ok(StdResponse {
        data: Some(cart),
        message: Some("Add to cart successfully"),
    })
}

/// Set the quantity of one of the caller's cart lines.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Carts"],
    security(("user_id" = [])),
    params(
        ("id" = i32, Path, description = "Cart ID to update")
    ),
    request_body = UpdateCartReq,
    responses(
        (status = 200, description = "Update cart successfully", body = StdResponse<ResolvedCart, String>),
        (status = 404, description = "Cart not found", body = ErrorResponse)
    )
)]
async fn update_cart(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(profile): Extension<RoleProfile>,
    Json(body): Json<UpdateCartReq>,
) -> Result<impl IntoResponse, AppError> {
    let reference = reference_for(&profile)?;
    check_quantity(body.quantity)?;

    let cart = state
        .repo
        .update_cart_quantity(id, reference, body.quantity)
        .await?
        .ok_or(CartError::CartNotFound(id))?;
    let cart = resolve_cart(&*state.repo, cart).await?;

    Ok(StdResponse {
        data: Some(cart),
        message: Some("Update cart successfully"),
    })
}

/// Remove one of the caller's cart lines.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Carts"],
    security(("user_id" = [])),
    params(
        ("id" = i32, Path, description = "Cart ID to delete")
    ),
    responses(
        (status = 200, description = "Delete cart successfully", body = StdResponse<Cart, String>),
        (status = 404, description = "Cart not found", body = ErrorResponse)
    )
)]
async fn delete_cart(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(profile): Extension<RoleProfile>,
) -> Result<impl IntoResponse, AppError> {
    let reference = reference_for(&profile)?;

    let cart = state
        .repo
        .delete_cart(id, reference)
        .await?
        .ok_or(CartError::CartNotFound(id))?;

    Ok(StdResponse {
        data: Some(cart),
        message: Some("Delete cart successfully"),
    })
}
