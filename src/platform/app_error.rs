use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::errors::{CartError, OrderError};

/// Success envelope returned by every route.
#[derive(Debug, Serialize, ToSchema)]
pub struct StdResponse<T, M> {
    pub data: Option<T>,
    pub message: Option<M>,
}

impl<T: Serialize, M: Serialize> IntoResponse for StdResponse<T, M> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Error envelope: a machine-readable category plus a human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    ForbiddenResource(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BusinessRule(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    fn status_and_category(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "validation"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::ForbiddenResource(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::BusinessRule(_) => (StatusCode::UNPROCESSABLE_ENTITY, "business_rule"),
            AppError::Other(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_category();
        let message = match &self {
            AppError::Other(err) => {
                tracing::error!("Internal error: {:?}", err);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(ErrorResponse {
                error: error.to_string(),
                message,
            }),
        )
            .into_response()
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidQuantity(_)
            | OrderError::QuantityTooLarge(_)
            | OrderError::EmptyOrder => {
                AppError::BadRequest(err.to_string())
            }
            OrderError::MealNotFound(_)
            | OrderError::UserNotFound(_)
            | OrderError::MemberNotFound
            | OrderError::CaregiverNotFound
            | OrderError::OrderNotFound(_) => AppError::NotFound(err.to_string()),
            OrderError::RoleCannotOrder(_) | OrderError::Forbidden(_) => {
                AppError::ForbiddenResource(err.to_string())
            }
            OrderError::DailyMaxOrderReached { .. } | OrderError::InvalidTransition { .. } => {
                AppError::BusinessRule(err.to_string())
            }
            OrderError::ConcurrentModification(_) => AppError::Conflict(err.to_string()),
            OrderError::FailedToCreateOrder(source) => {
                AppError::Other(source.context("Failed to create order"))
            }
            OrderError::Store(source) => AppError::Other(source),
        }
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::InvalidReference(_)
            | CartError::InvalidQuantity(_)
            | CartError::QuantityTooLarge(_) => {
                AppError::BadRequest(err.to_string())
            }
            CartError::NotFound(_) | CartError::CartNotFound(_) | CartError::MealNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            CartError::RoleCannotHoldCart(_) => AppError::ForbiddenResource(err.to_string()),
            CartError::Store(source) => AppError::Other(source),
        }
    }
}
