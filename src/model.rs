//! Data models for the link routing service
//!
//! This module defines all the data structures used throughout the application:
//! the persisted link configuration records (short links, destinations,
//! schedules, A/B tests) and the per-request routing result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents a short link record stored in the database
///
/// A short link maps an opaque URL-safe code to a routing configuration.
/// Links are created and edited out-of-band; the router only ever reads them.
/// Links are deactivated instead of deleted so that old codes never get
/// silently reassigned.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ShortLink {
    /// Unique identifier/slug for the short link (e.g., "abc123")
    pub short_code: String,

    /// The original long URL this link was created for
    ///
    /// Used as the last-resort redirect target when no fallback URL is
    /// configured and no ranked destination qualifies.
    pub original_url: String,

    /// Optional safe URL used when every ranked destination is unusable
    pub fallback_url: Option<String>,

    /// Whether this link may be routed at all
    ///
    /// Inactive links behave exactly like missing links at resolution time.
    pub is_active: bool,

    /// Timestamp when this link record was created
    pub created_at: DateTime<Utc>,
}

/// Cached health state of a destination, written by an asynchronous
/// health-checking process
///
/// Deserialized through a plain string so a newer checker writing states
/// this build does not know about never breaks deserialization; anything
/// unrecognized lands in the catch-all variant and is treated as unusable.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum HealthStatus {
    /// Last check succeeded
    Healthy,
    /// Last check failed outright (connection refused, dead page)
    Broken,
    /// The page loads but the product is not purchasable
    OutOfStock,
    /// Explicitly never verified
    Unknown,
    /// Any status value this build does not know about
    Unrecognized,
}

impl From<String> for HealthStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "healthy" => HealthStatus::Healthy,
            "broken" => HealthStatus::Broken,
            "out_of_stock" => HealthStatus::OutOfStock,
            "unknown" => HealthStatus::Unknown,
            _ => HealthStatus::Unrecognized,
        }
    }
}

/// One candidate target URL in a short link's priority-ordered fallback chain
///
/// Destinations belong to exactly one short link. Their health fields are
/// mutated by the background prober (or an external checker); the router
/// treats them as read-only.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Destination {
    /// Unique identifier for this destination
    pub id: String,

    /// Short code of the owning link
    pub short_code: String,

    /// The target URL
    pub url: String,

    /// Rank in the fallback chain; 1 is the primary destination
    ///
    /// Ties are broken by ascending destination id.
    pub priority: u32,

    /// Cached health state, if any check has ever recorded one
    pub health_status: Option<HealthStatus>,

    /// When the cached health state was last refreshed
    pub last_health_check_at: Option<DateTime<Utc>>,
}

/// A time-window override for a short link
///
/// While a schedule is active (`starts_at <= now < ends_at`) its destination
/// URL wins over every other routing rule, modeling flash-sale behavior.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Schedule {
    /// Unique identifier for this schedule
    pub id: String,

    /// Short code of the owning link
    pub short_code: String,

    /// Destination URL to use while the window is active
    pub destination_url: String,

    /// Start of the active window (inclusive)
    pub starts_at: DateTime<Utc>,

    /// End of the active window (exclusive)
    pub ends_at: DateTime<Utc>,

    /// Timestamp when this schedule record was created
    ///
    /// When several schedules are active at once, the most recently created
    /// one wins.
    pub created_at: DateTime<Utc>,
}

/// Lifecycle state of an A/B test
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AbTestStatus {
    Draft,
    Running,
    Paused,
    Completed,
}

/// A two-variant split test attached to a short link
///
/// Weights are not validated to sum to 100: the variant draw is compared
/// against `variant_a_weight` alone, so a weight of 0 never selects A and a
/// weight of 100 or more always does. Click counters are incremented by the
/// router on a best-effort basis and read by external reporting.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AbTest {
    /// Unique identifier for this test
    pub id: String,

    /// Short code of the owning link
    pub short_code: String,

    /// Only `running` tests participate in routing
    pub status: AbTestStatus,

    /// Destination URL for variant A
    pub variant_a_url: String,

    /// Destination URL for variant B
    pub variant_b_url: String,

    /// Share of traffic (out of 100) routed to variant A
    pub variant_a_weight: u32,

    /// Share of traffic (out of 100) routed to variant B
    pub variant_b_weight: u32,

    /// Clicks recorded against variant A
    #[serde(default)]
    pub variant_a_clicks: u64,

    /// Clicks recorded against variant B
    #[serde(default)]
    pub variant_b_clicks: u64,
}

/// One of the two URLs being split-tested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbVariant {
    A,
    B,
}

/// Which branch of the routing waterfall produced the final destination
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoutingReason {
    /// An active schedule override fired
    Scheduled,
    /// A running A/B test selected a variant
    AbTest,
    /// The priority-1 destination was usable
    Primary,
    /// A lower-ranked destination was used
    Fallback,
    /// No ranked destination qualified; the link's safe URL was used
    Failsafe,
}

impl RoutingReason {
    /// Stable string form, matching the serialized representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingReason::Scheduled => "scheduled",
            RoutingReason::AbTest => "ab_test",
            RoutingReason::Primary => "primary",
            RoutingReason::Fallback => "fallback",
            RoutingReason::Failsafe => "failsafe",
        }
    }
}

/// Outcome of a single routing request
///
/// Created fresh per request and discarded after the caller has issued the
/// redirect and logged the decision; never persisted.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RouteResult {
    /// Final redirect target, with incoming tracking parameters carried over
    pub destination_url: String,

    /// Priority of the destination that was used
    ///
    /// 0 for the override branches (schedule, A/B test), the destination's
    /// actual priority for waterfall hits, 999 when the failsafe URL fired.
    pub priority_used: u32,

    /// Which branch of the waterfall produced this result
    pub routing_reason: RoutingReason,

    /// Wall-clock time spent inside the router, in milliseconds
    pub response_time_ms: u64,
}
