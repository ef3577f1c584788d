//! Intake API router.
//!
//! Returns a composable `Router` with every route nested under `/api/`.
//! Handlers take `State<ApiContext>` and push blocking work through
//! [`ApiContext::blocking`].

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;

/// NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
pub fn api_router(ctx: ApiContext) -> Router {
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/reports", post(endpoints::reports::upload))
        .route("/reports/:id", get(endpoints::reports::detail))
        .route("/reports/:id/process", post(endpoints::reports::process))
        .route(
            "/reports/:id/recommendation",
            get(endpoints::reports::recommendation),
        )
        .route("/reports/:id/approve", post(endpoints::review::approve))
        .route("/reports/:id/modify", post(endpoints::review::modify))
        .route("/reports/:id/reject", post(endpoints::review::reject))
        .route(
            "/specialists",
            get(endpoints::specialists::list).post(endpoints::specialists::register),
        )
        .route(
            "/specialists/:id/availability",
            put(endpoints::specialists::availability),
        )
        .route("/specialists/:id/pending", get(endpoints::review::pending))
        .route("/specialists/:id/reviewed", get(endpoints::review::reviewed))
        .route("/specialists/:id/reports", get(endpoints::specialists::reports))
        .route("/specialists/:id/patients", get(endpoints::specialists::patients))
        .route("/patients/:id/reports", get(endpoints::patients::reports))
        .route(
            "/patients/:id/specialists",
            get(endpoints::patients::specialists),
        )
        .route(
            "/patients/:id/recommendations",
            get(endpoints::review::for_patient),
        )
        .route(
            "/mappings",
            get(endpoints::mappings::list)
                .post(endpoints::mappings::add)
                .put(endpoints::mappings::replace),
        )
        .route("/export", post(endpoints::export::rebuild))
        .with_state(ctx);

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
}
