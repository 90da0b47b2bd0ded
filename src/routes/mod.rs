pub mod carts;
pub mod orders;

use axum::{Router, middleware};
use tower_http::trace::TraceLayer;
use utoipa::openapi::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::platform::{app_state::AppState, middleware::identify_actor, swagger};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/api/v1",
        OpenApiRouter::new()
            .merge(carts::routes_with_openapi())
            .merge(orders::routes_with_openapi()),
    )
}

pub fn openapi() -> OpenApi {
    let (_, openapi) = routes_with_openapi().split_for_parts();
    swagger::describe(openapi, "MealCare OrderService API")
}

/// The full HTTP application: API routes behind actor identification, plus Swagger UI.
pub fn app(state: AppState) -> Router {
    let (api, openapi) = routes_with_openapi().split_for_parts();
    let openapi = swagger::describe(openapi, "MealCare OrderService API");

    let api = api
        .route_layer(middleware::from_fn_with_state(state.clone(), identify_actor))
        .with_state(state);

    Router::new()
        .merge(api)
        .merge(swagger::create_swagger_ui(openapi))
        .layer(TraceLayer::new_for_http())
}
