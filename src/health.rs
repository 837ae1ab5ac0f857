//! Destination health policy
//!
//! Pure decision logic over a destination's cached health state. No I/O:
//! the verdict depends only on the record and the caller-supplied clock.

use chrono::{DateTime, Duration, Utc};

use crate::model::{Destination, HealthStatus};

/// Minutes before a bad status on the primary destination is re-tried
pub const PRIMARY_RETRY_MINUTES: i64 = 5;

/// Minutes before a bad status on a backup destination is re-tried
pub const BACKUP_RETRY_MINUTES: i64 = 60;

/// Re-try window for a cached bad status, by priority rank
///
/// The primary destination is re-probed aggressively; backups more
/// patiently.
fn retry_window(priority: u32) -> Duration {
    if priority == 1 {
        Duration::minutes(PRIMARY_RETRY_MINUTES)
    } else {
        Duration::minutes(BACKUP_RETRY_MINUTES)
    }
}

/// Decides whether a destination is usable right now
///
/// Rules, in order:
/// 1. `healthy` is always usable, regardless of cache age.
/// 2. A missing or `unknown` status is usable (optimistic default: an
///    unchecked destination gets the benefit of the doubt).
/// 3. `broken` / `out_of_stock`: usable if never checked; otherwise usable
///    only once the cached bad status is older than the priority-dependent
///    re-try window. Stale negative information is discounted rather than
///    trusted; an asynchronous health check is expected to correct the
///    cache shortly after.
/// 4. Any unrecognized status is unusable.
pub fn is_usable(destination: &Destination, now: DateTime<Utc>) -> bool {
    match destination.health_status {
        Some(HealthStatus::Healthy) => true,
        None | Some(HealthStatus::Unknown) => true,
        Some(HealthStatus::Broken) | Some(HealthStatus::OutOfStock) => {
            match destination.last_health_check_at {
                // Never actually checked; give it a try once.
                None => true,
                Some(checked_at) => now - checked_at > retry_window(destination.priority),
            }
        }
        Some(HealthStatus::Unrecognized) => false,
    }
}
