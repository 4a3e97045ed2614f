//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: directory, role synchronizer and provider store
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{
    Extension, Router,
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use careportal_auth::VerifierConfig;

use crate::config::ApiConfig;
use crate::middleware::AuthState;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, StartupError};

/// Build the full HTTP router.
///
/// Every route under `/api` except `/api/health` is wrapped with its own
/// authorization guard; see [`routes::router`]. Cross-origin browser calls
/// are accepted from `cors_origin` only.
pub fn build_app(auth: AuthState, services: AppServices, cors_origin: HeaderValue) -> Router {
    let api = Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router(&auth))
        .layer(Extension(Arc::new(services)));

    Router::new()
        .nest("/api", api)
        .layer(ServiceBuilder::new().layer(cors_layer(cors_origin)))
}

/// Preflights are answered here, before any route guard sees the request.
pub fn cors_layer(origin: HeaderValue) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}

pub async fn build_app_from_config(config: &ApiConfig) -> Result<Router, StartupError> {
    let auth = AuthState::hs256(
        config.jwt_secret.as_bytes(),
        VerifierConfig {
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
        },
    );
    let services = AppServices::from_config(config).await?;
    Ok(build_app(auth, services, config.cors_origin.clone()))
}
