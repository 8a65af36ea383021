use axum::Router;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::app::{
    app_state::AppState,
    swagger::{ApiDoc, create_swagger_ui},
};

pub mod orders;
pub mod products;

/// Full HTTP surface: the API routes, their OpenAPI document and Swagger UI.
pub fn app(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .merge(products::routes_with_openapi(state.clone()))
        .merge(orders::routes_with_openapi(state.clone()))
        .split_for_parts();

    router
        .merge(create_swagger_ui(api))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
