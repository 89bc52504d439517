use std::any::Any;

use axum::http::HeaderValue;
use axum::{
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{
    error::{AppError, AppResult, ErrorEnvelope},
    services::RecordError,
    state::AppState,
};

pub mod health;
pub mod protocols;
pub mod users;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = cors_layer(state.config.cors_allowed_origin.as_deref());
    let expose_detail = !state.config.environment.is_production();

    let users_routes = Router::new()
        .route("/", get(users::list_users).post(users::create_user))
        .route(
            "/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::deactivate_user),
        )
        .route("/:id/permanent", delete(users::delete_user_permanently));

    let protocols_routes = Router::new()
        .route(
            "/",
            get(protocols::list_protocols).post(protocols::create_protocol),
        )
        .route(
            "/number/:protocol_number",
            get(protocols::get_protocol_by_number),
        )
        .route(
            "/:id",
            get(protocols::get_protocol)
                .put(protocols::update_protocol)
                .delete(protocols::delete_protocol),
        );

    let router = Router::new()
        .route("/", get(health::index))
        .route("/api/health", get(health::health_check))
        .nest("/api/users", users_routes)
        .nest("/api/protocols", protocols_routes)
        .fallback(route_not_found)
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response));

    // Must wrap the panic layer so panics get their detail too.
    let router = if expose_detail {
        router.layer(middleware::map_response(expose_error_detail))
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http()).layer(cors)
}

fn cors_layer(allowed_origins: Option<&str>) -> CorsLayer {
    let allow_origin = match allowed_origins {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .filter_map(|value| match value.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(_) => {
                        tracing::warn!(origin = value, "ignoring invalid CORS allowed origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Narrows a path id to the key column type; ids past its range name no record.
pub(crate) fn record_id(raw: i64, missing: &'static str) -> AppResult<i32> {
    i32::try_from(raw).map_err(|_| RecordError::NotFound(missing).into())
}

async fn route_not_found() -> AppError {
    AppError::new(axum::http::StatusCode::NOT_FOUND, "route not found")
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "handler panicked".to_string()
    };
    AppError::internal(detail).into_response()
}

/// Re-renders server errors with their detail attached.
async fn expose_error_detail(mut response: Response) -> Response {
    match response.extensions_mut().remove::<ErrorEnvelope>() {
        Some(envelope) => (response.status(), Json(envelope)).into_response(),
        None => response,
    }
}
