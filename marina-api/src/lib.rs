use axum::{
    extract::State,
    http::Method,
    response::IntoResponse,
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod accounts;
pub mod auth;
pub mod bookings;
pub mod catalog;
pub mod error;
pub mod finance;
pub mod middleware;
pub mod notifications;
pub mod orders;
pub mod state;
pub mod worker;

pub use state::{AppState, AuthConfig};

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let public = Router::new().merge(auth::routes()).merge(catalog::public_routes());

    let protected = Router::new()
        .merge(bookings::routes())
        .merge(orders::routes())
        .merge(catalog::merchant_routes())
        .merge(accounts::routes())
        .merge(finance::routes())
        .merge(notifications::routes())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .with_state(state)
}

async fn rate_limit_middleware(
    State(state): State<AppState>,
    axum::extract::ConnectInfo(addr): axum::extract::ConnectInfo<SocketAddr>,
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<impl IntoResponse, impl IntoResponse> {
    let key = format!("ratelimit:{}", addr.ip());

    match state
        .redis
        .check_rate_limit(&key, state.rules.rate_limit_per_minute, 60)
        .await
    {
        Ok(true) => Ok(next.run(req).await),
        Ok(false) => Err((axum::http::StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded")),
        // Fail open: a Redis outage must not take the API down.
        Err(_) => Ok(next.run(req).await),
    }
}
