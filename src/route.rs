//! Route definitions for the link router
//!
//! This module configures the HTTP routes and creates the Axum router with
//! the application state.

use axum::routing::get;
use axum::Router;

use crate::database::AppState;
use crate::handler::redirect_click;

/// Creates and configures the Axum application router
///
/// # Route Definitions
///
/// - `GET /{code}` - Resolves the short code through the waterfall router
///   and redirects (public endpoint)
///
/// # Arguments
///
/// * `state` - Application state containing the shared router instance
pub fn create_app(state: AppState) -> Router {
    Router::new()
        // Public redirect endpoint - resolves a click to a destination
        .route("/{code}", get(redirect_click))
        .with_state(state)
}
