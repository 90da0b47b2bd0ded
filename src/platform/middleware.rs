use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::{app_error::AppError, app_state::AppState};

/// Header carrying the id of the calling user, set by the gateway after authentication.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Resolves the caller into a [`RoleProfile`](crate::domain::actor::RoleProfile)
/// request extension, rejecting requests without a known user.
pub async fn identify_actor(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let raw = req
        .headers()
        .get(USER_ID_HEADER)
        .ok_or_else(|| AppError::Unauthorized("Missing X-User-Id header".to_string()))?;

    let user_id: i32 = raw
        .to_str()
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .ok_or_else(|| AppError::Unauthorized("Malformed X-User-Id header".to_string()))?;

    let profile = state
        .repo
        .role_data_by_user_id(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized(format!("Unknown user #{user_id}")))?;

    tracing::debug!(user_id, role = %profile.role(), "Identified caller");
    req.extensions_mut().insert(profile);

    Ok(next.run(req).await)
}
