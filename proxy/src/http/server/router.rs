use core::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{
        Request, StatusCode,
        header::{AUTHORIZATION, COOKIE},
    },
    middleware::{self as ax_middleware},
    routing,
};
use tower::ServiceBuilder;
use tower_http::{
    ServiceBuilderExt as _, request_id::MakeRequestUuid, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::{
    app::AppState,
    http::{
        api,
        server::middleware::{LevelAdjustingOnFailure, response_headers_middleware},
    },
};

/// Creates the application router: the query API under `/api` plus the middleware stack.
pub(crate) fn create_app(app_state: AppState) -> Router {
    #[expect(clippy::absolute_paths, reason = "I dont want conditional imports")]
    let middleware_stack = ServiceBuilder::new()
        .sensitive_headers([AUTHORIZATION, COOKIE])
        .set_x_request_id(MakeRequestUuid)
        .propagate_x_request_id()
        .layer(TraceLayer::new_for_http().on_failure(LevelAdjustingOnFailure))
        .layer(cfg_if_expr!(
            #[cfg(any(feature = "compression-gzip", feature = "compression-zstd"))]
            tower_http::compression::CompressionLayer::new(),
            #[cfg(not)]
            tower::layer::util::Identity::new(),
        ))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(ax_middleware::from_fn(response_headers_middleware));

    Router::new()
        .nest("/api", api::routes())
        .with_state(app_state)
        .fallback(routing::any(|req: Request<Body>| async move {
            tracing::warn!(method = %req.method(), uri = %req.uri(), "Unhandled request");
            StatusCode::NOT_FOUND
        }))
        .layer(middleware_stack)
}
