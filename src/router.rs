//! The waterfall router
//!
//! Resolves an inbound click on a short link to a final destination URL, in
//! strict precedence order:
//!
//! 1. Resolve the short link by code (active links only); this is the one
//!    hard failure in the chain.
//! 2. Schedule override: an active time window wins over everything.
//! 3. A/B test: a running test picks a variant by a single uniform draw and
//!    records the click on a detached task.
//! 4. Waterfall walk: first destination, in priority order, that the health
//!    policy accepts.
//! 5. Failsafe: the link's fallback URL, or its original URL.
//!
//! First match wins; once a branch commits there is no fallthrough. Every
//! branch carries the incoming tracking parameters onto its chosen URL.
//! Secondary lookups (schedule, A/B test, destinations) are wrapped in a
//! per-call deadline and degrade to "none found" on store failure or
//! timeout, so a click always produces some redirect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rand::Rng;
use tokio::time::timeout;
use tracing::warn;

use crate::error::RouteError;
use crate::health;
use crate::model::{AbTest, AbVariant, Destination, RouteResult, RoutingReason, Schedule};
use crate::params::preserve_params;
use crate::store::LinkStore;

/// Sentinel priority meaning "no ranked destination was used"
pub const FAILSAFE_PRIORITY: u32 = 999;

/// Priority reported for the override branches (schedule, A/B test)
pub const OVERRIDE_PRIORITY: u32 = 0;

/// Default per-lookup deadline
///
/// Each store lookup gets its own deadline so one slow query cannot
/// silently blow the overall latency budget.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_millis(50);

/// Source of the uniform variant draw in `[0.0, 100.0)`
///
/// Injectable so tests can pin the draw, and so a sticky per-visitor
/// assignment scheme could be substituted without touching the routing
/// control flow.
pub trait VariantDraw: Send + Sync + 'static {
    /// Returns a uniform draw in `[0.0, 100.0)`
    fn draw(&self) -> f64;
}

/// Default draw backed by the thread-local generator
pub struct ThreadRngDraw;

impl VariantDraw for ThreadRngDraw {
    fn draw(&self) -> f64 {
        rand::rng().random_range(0.0..100.0)
    }
}

/// Routes inbound clicks through the precedence chain described in the
/// module documentation
pub struct WaterfallRouter<S> {
    store: Arc<S>,
    rng: Arc<dyn VariantDraw>,
    lookup_timeout: Duration,
}

impl<S: LinkStore> WaterfallRouter<S> {
    /// Creates a router with the default draw source and lookup deadline
    pub fn new(store: Arc<S>) -> Self {
        Self::with_parts(store, Arc::new(ThreadRngDraw), DEFAULT_LOOKUP_TIMEOUT)
    }

    /// Creates a router with an explicit draw source and lookup deadline
    pub fn with_parts(store: Arc<S>, rng: Arc<dyn VariantDraw>, lookup_timeout: Duration) -> Self {
        Self {
            store,
            rng,
            lookup_timeout,
        }
    }

    /// Resolves one click to a routing decision
    ///
    /// The only hard failures are an unknown/inactive short code and a
    /// store fault on the link row itself; everything downstream degrades
    /// toward the failsafe URL.
    pub async fn route(
        &self,
        short_code: &str,
        incoming_url: &str,
    ) -> Result<RouteResult, RouteError> {
        let started = Instant::now();

        // 1. Resolve the short link; inactive behaves exactly like missing.
        let link = match timeout(
            self.lookup_timeout,
            self.store.find_active_short_link(short_code),
        )
        .await
        {
            Ok(Ok(Some(link))) => link,
            Ok(Ok(None)) => return Err(RouteError::NotFound),
            Ok(Err(error)) => return Err(RouteError::Store(error)),
            Err(_) => {
                warn!(short_code, "short link lookup timed out");
                return Err(RouteError::NotFound);
            }
        };

        // 2. Schedule override: bypasses A/B testing and the waterfall.
        if let Some(schedule) = self.active_schedule(short_code).await {
            return Ok(self.finish(
                &schedule.destination_url,
                incoming_url,
                OVERRIDE_PRIORITY,
                RoutingReason::Scheduled,
                started,
            ));
        }

        // 3. A/B test: stateless Bernoulli trial per click, no visitor
        // affinity. The click counter is recorded off the request path.
        if let Some(test) = self.running_ab_test(short_code).await {
            let variant = self.pick_variant(&test);
            self.record_variant_click(short_code, variant);

            let url = match variant {
                AbVariant::A => &test.variant_a_url,
                AbVariant::B => &test.variant_b_url,
            };
            return Ok(self.finish(
                url,
                incoming_url,
                OVERRIDE_PRIORITY,
                RoutingReason::AbTest,
                started,
            ));
        }

        // 4. Waterfall walk: first destination the health policy accepts.
        let now = Utc::now();
        for destination in self.destinations(short_code).await {
            if health::is_usable(&destination, now) {
                let reason = if destination.priority == 1 {
                    RoutingReason::Primary
                } else {
                    RoutingReason::Fallback
                };
                return Ok(self.finish(
                    &destination.url,
                    incoming_url,
                    destination.priority,
                    reason,
                    started,
                ));
            }
        }

        // 5. Failsafe: every click still gets a redirect.
        let failsafe_url = link.fallback_url.as_deref().unwrap_or(&link.original_url);
        Ok(self.finish(
            failsafe_url,
            incoming_url,
            FAILSAFE_PRIORITY,
            RoutingReason::Failsafe,
            started,
        ))
    }

    fn finish(
        &self,
        raw_destination: &str,
        incoming_url: &str,
        priority_used: u32,
        routing_reason: RoutingReason,
        started: Instant,
    ) -> RouteResult {
        RouteResult {
            destination_url: preserve_params(incoming_url, raw_destination),
            priority_used,
            routing_reason,
            response_time_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// `draw < variant_a_weight` selects A, else B
    fn pick_variant(&self, test: &AbTest) -> AbVariant {
        if self.rng.draw() < f64::from(test.variant_a_weight) {
            AbVariant::A
        } else {
            AbVariant::B
        }
    }

    /// Fire-and-forget click increment; failure is logged, never surfaced
    fn record_variant_click(&self, short_code: &str, variant: AbVariant) {
        let store = Arc::clone(&self.store);
        let short_code = short_code.to_string();

        tokio::spawn(async move {
            if let Err(error) = store.increment_ab_test_clicks(&short_code, variant).await {
                warn!(%error, short_code = %short_code, "failed to record A/B variant click");
            }
        });
    }

    async fn active_schedule(&self, short_code: &str) -> Option<Schedule> {
        let now = Utc::now();
        match timeout(
            self.lookup_timeout,
            self.store.find_active_schedule(short_code, now),
        )
        .await
        {
            Ok(Ok(found)) => found,
            Ok(Err(error)) => {
                warn!(%error, short_code, "schedule lookup failed, continuing without override");
                None
            }
            Err(_) => {
                warn!(short_code, "schedule lookup timed out, continuing without override");
                None
            }
        }
    }

    async fn running_ab_test(&self, short_code: &str) -> Option<AbTest> {
        match timeout(
            self.lookup_timeout,
            self.store.find_running_ab_test(short_code),
        )
        .await
        {
            Ok(Ok(found)) => found,
            Ok(Err(error)) => {
                warn!(%error, short_code, "A/B test lookup failed, continuing to waterfall");
                None
            }
            Err(_) => {
                warn!(short_code, "A/B test lookup timed out, continuing to waterfall");
                None
            }
        }
    }

    async fn destinations(&self, short_code: &str) -> Vec<Destination> {
        match timeout(
            self.lookup_timeout,
            self.store.list_destinations_by_priority(short_code),
        )
        .await
        {
            Ok(Ok(found)) => found,
            Ok(Err(error)) => {
                warn!(%error, short_code, "destination lookup failed, falling through to failsafe");
                Vec::new()
            }
            Err(_) => {
                warn!(short_code, "destination lookup timed out, falling through to failsafe");
                Vec::new()
            }
        }
    }
}
