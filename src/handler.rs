//! HTTP request handler for inbound clicks
//!
//! The public redirect endpoint: resolves a short code through the
//! waterfall router and answers with a redirect to the chosen destination.

use axum::{
    extract::{OriginalUri, Path, State},
    response::Redirect,
};
use tracing::{error, info};

use crate::database::AppState;
use crate::error::RouteError;

/// Redirects a click on a short link to its routed destination
///
/// When a visitor hits `http://localhost:8080/abc123?utm_source=x`, this
/// handler runs the waterfall router for "abc123", logs the decision for
/// the latency SLA and analytics, and redirects to the result.
///
/// # Response
///
/// - **307 Temporary Redirect** - Redirects to the routed destination
/// - **404 Not Found** - Short code does not exist or the link is inactive
/// - **503 Service Unavailable** - The link row itself could not be read
///
/// # Note
///
/// Uses 307 Temporary Redirect instead of 301 Permanent Redirect so that
/// every click passes through the router again: schedules, A/B tests, and
/// health state all change between clicks, and browser caching of a
/// permanent redirect would pin visitors to a stale destination.
pub async fn redirect_click(
    Path(code): Path<String>,
    OriginalUri(uri): OriginalUri,
    State(state): State<AppState>,
) -> Result<Redirect, RouteError> {
    match state.router.route(&code, &uri.to_string()).await {
        Ok(result) => {
            info!(
                short_code = %code,
                reason = result.routing_reason.as_str(),
                priority = result.priority_used,
                elapsed_ms = result.response_time_ms,
                destination = %result.destination_url,
                "routed click"
            );
            Ok(Redirect::temporary(&result.destination_url))
        }
        Err(RouteError::NotFound) => Err(RouteError::NotFound),
        Err(RouteError::Store(err)) => {
            error!(%err, short_code = %code, "store failure while resolving short link");
            Err(RouteError::Store(err))
        }
    }
}
