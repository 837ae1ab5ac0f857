//! Background prober for destination health checks
//!
//! Periodically TCP-connects to every destination's host and writes the
//! outcome back into the cached health state the routing path consults.
//! Probe results only ever touch the cache; a request in flight is never
//! blocked on a probe.

use std::time::Duration;

use chrono::Utc;
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, info, warn};
use url::Url;

use crate::model::HealthStatus;
use crate::store::RedbLinkStore;

/// Per-destination connect deadline
const PROBE_TIMEOUT: Duration = Duration::from_millis(1500);

/// Spawns a background Tokio task that periodically probes every stored
/// destination and records the result
///
/// A simple and fast TCP connect stands in for a full page fetch; it cannot
/// distinguish `out_of_stock` from `healthy`, so that status is left to
/// richer external checkers and this prober only writes `healthy`/`broken`.
pub fn spawn_health_prober(store: RedbLinkStore, interval_ms: u64) {
    let check_interval = Duration::from_millis(interval_ms);

    tokio::spawn(async move {
        let mut interval = time::interval(check_interval);

        // Prevent immediately ticking when spawned
        interval.tick().await;

        loop {
            interval.tick().await;

            let destinations = match store.list_all_destinations() {
                Ok(destinations) => destinations,
                Err(error) => {
                    warn!(%error, "health probe pass skipped, destination scan failed");
                    continue;
                }
            };

            for destination in destinations {
                let status = match probe(&destination.url).await {
                    Some(true) => HealthStatus::Healthy,
                    Some(false) => HealthStatus::Broken,
                    None => {
                        debug!(url = %destination.url, "destination has no probeable host, skipping");
                        continue;
                    }
                };

                if destination.health_status != Some(status) {
                    info!(
                        short_code = %destination.short_code,
                        url = %destination.url,
                        from = ?destination.health_status,
                        to = ?status,
                        "destination health state changed"
                    );
                }

                if let Err(error) = store.record_health_check(&destination, status, Utc::now()) {
                    warn!(%error, url = %destination.url, "failed to persist health check result");
                }
            }
        }
    });
}

/// Connects to the URL's host; `None` when the URL has no probeable host
async fn probe(raw_url: &str) -> Option<bool> {
    let url = Url::parse(raw_url).ok()?;
    let host = url.host_str()?.to_string();
    let port = url.port_or_known_default()?;

    let connected = matches!(
        time::timeout(PROBE_TIMEOUT, TcpStream::connect((host.as_str(), port))).await,
        Ok(Ok(_))
    );

    Some(connected)
}
