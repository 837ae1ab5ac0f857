//! Database initialization and table definitions
//!
//! This module handles the setup and configuration of the embedded redb
//! database. It defines the tables holding the link routing configuration
//! and provides initialization functions.

use redb::{Database, TableDefinition};
use std::sync::Arc;

use crate::router::WaterfallRouter;
use crate::store::RedbLinkStore;

/// Main table for short link records
///
/// Key: short code as string
/// Value: JSON-serialized ShortLink as string
pub const TABLE_LINKS: TableDefinition<&str, &str> = TableDefinition::new("links_v1");

/// Table for the priority-ordered destination chains
///
/// Key: Composite key in format "{short_code}:{priority:05}:{destination_id}"
/// Value: JSON-serialized Destination as string
///
/// Example:
/// - Key: "abc123:00001:dest_a"
/// - Value: '{"id":"dest_a","short_code":"abc123","priority":1,...}'
///
/// Zero-padding the priority keeps lexicographic key order equal to numeric
/// priority order, so a single range scan yields the waterfall order with a
/// stable id tie-break.
pub const TABLE_DESTINATIONS: TableDefinition<&str, &str> =
    TableDefinition::new("destinations_v1");

/// Table for schedule overrides
///
/// Key: Composite key in format "{short_code}:{schedule_id}"
/// Value: JSON-serialized Schedule as string
pub const TABLE_SCHEDULES: TableDefinition<&str, &str> = TableDefinition::new("schedules_v1");

/// Table for A/B tests, at most one per short link
///
/// Key: short code as string
/// Value: JSON-serialized AbTest as string
pub const TABLE_AB_TESTS: TableDefinition<&str, &str> = TableDefinition::new("ab_tests_v1");

/// Application state shared across all request handlers
///
/// Wraps the waterfall router (which owns the store and database handle) so
/// it can be shared thread-safely across async handlers in Axum.
#[derive(Clone)]
pub struct AppState {
    /// Shared router instance handling every inbound click
    pub router: Arc<WaterfallRouter<RedbLinkStore>>,
}

/// Initializes the embedded database and creates required tables
///
/// Creates or opens the database file at the specified path, opens every
/// table so it exists before the first request, and commits.
///
/// # Arguments
///
/// * `db_path` - File path where the database should be stored (e.g., "data.db")
///
/// # Returns
///
/// * `Ok(Database)` - Successfully initialized database instance
/// * `Err(redb::Error)` - Database initialization error
pub fn init_db(db_path: &str) -> Result<Database, redb::Error> {
    let db = Database::create(db_path)?;

    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(TABLE_LINKS)?;
        write_txn.open_table(TABLE_DESTINATIONS)?;
        write_txn.open_table(TABLE_SCHEDULES)?;
        write_txn.open_table(TABLE_AB_TESTS)?;
    }
    write_txn.commit()?;

    Ok(db)
}
