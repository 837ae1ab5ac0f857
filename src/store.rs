//! Link configuration store
//!
//! This module defines the read contract the waterfall router depends on
//! (`LinkStore`) and its embedded-database implementation backed by redb.
//! Keeping the router behind a trait means the routing logic is independent
//! of the underlying storage technology and can be tested against an
//! in-memory store.

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable};
use std::future::Future;
use std::sync::Arc;

use crate::database::{TABLE_AB_TESTS, TABLE_DESTINATIONS, TABLE_LINKS, TABLE_SCHEDULES};
use crate::error::StoreError;
use crate::model::{
    AbTest, AbTestStatus, AbVariant, Destination, HealthStatus, Schedule, ShortLink,
};

/// Read contract required by the waterfall router
///
/// Every lookup is an asynchronous I/O boundary from the router's point of
/// view; implementations backed by an embedded database simply complete
/// immediately.
pub trait LinkStore: Send + Sync + 'static {
    /// Looks up a short link by code, treating inactive links as missing
    fn find_active_short_link(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Option<ShortLink>, StoreError>> + Send;

    /// Returns the schedule whose window contains `now`, if any
    ///
    /// When several windows overlap, the most recently created schedule wins.
    fn find_active_schedule(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<Schedule>, StoreError>> + Send;

    /// Returns the link's A/B test if one exists and is running
    fn find_running_ab_test(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Option<AbTest>, StoreError>> + Send;

    /// Lists the link's destinations in ascending priority order,
    /// ties broken by ascending destination id
    fn list_destinations_by_priority(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Vec<Destination>, StoreError>> + Send;

    /// Best-effort increment of one variant's click counter
    ///
    /// A missing test is not an error; the click is simply dropped.
    fn increment_ab_test_clicks(
        &self,
        code: &str,
        variant: AbVariant,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Builds the composite destination key
///
/// Zero-padding the priority keeps lexicographic order equal to numeric
/// priority order; the trailing id gives a stable tie-break.
fn destination_key(code: &str, priority: u32, id: &str) -> String {
    format!("{}:{:05}:{}", code, priority, id)
}

/// `LinkStore` implementation over the embedded redb database
///
/// Records are stored as JSON strings under `&str` keys; chains that belong
/// to one short link share a `"{code}:"` key prefix so a single range scan
/// retrieves them in order.
#[derive(Clone)]
pub struct RedbLinkStore {
    db: Arc<Database>,
}

impl RedbLinkStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Inserts or replaces a short link record
    pub fn put_short_link(&self, link: &ShortLink) -> Result<(), StoreError> {
        let record_json = serde_json::to_string(link)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE_LINKS)?;
            table.insert(link.short_code.as_str(), record_json.as_str())?;
        }
        write_txn.commit()?;

        Ok(())
    }

    /// Inserts or replaces a destination record
    pub fn put_destination(&self, destination: &Destination) -> Result<(), StoreError> {
        let key = destination_key(
            &destination.short_code,
            destination.priority,
            &destination.id,
        );
        let record_json = serde_json::to_string(destination)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE_DESTINATIONS)?;
            table.insert(key.as_str(), record_json.as_str())?;
        }
        write_txn.commit()?;

        Ok(())
    }

    /// Inserts or replaces a schedule record
    pub fn put_schedule(&self, schedule: &Schedule) -> Result<(), StoreError> {
        let key = format!("{}:{}", schedule.short_code, schedule.id);
        let record_json = serde_json::to_string(schedule)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE_SCHEDULES)?;
            table.insert(key.as_str(), record_json.as_str())?;
        }
        write_txn.commit()?;

        Ok(())
    }

    /// Inserts or replaces a link's A/B test
    pub fn put_ab_test(&self, test: &AbTest) -> Result<(), StoreError> {
        let record_json = serde_json::to_string(test)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE_AB_TESTS)?;
            table.insert(test.short_code.as_str(), record_json.as_str())?;
        }
        write_txn.commit()?;

        Ok(())
    }

    /// Reads a link's A/B test regardless of status
    pub fn get_ab_test(&self, code: &str) -> Result<Option<AbTest>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE_AB_TESTS)?;

        match table.get(code)? {
            Some(guard) => Ok(Some(serde_json::from_str::<AbTest>(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Lists every destination across all links, used by the health prober
    pub fn list_all_destinations(&self) -> Result<Vec<Destination>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE_DESTINATIONS)?;

        let destinations = table
            .iter()?
            .filter_map(|res| {
                res.ok()
                    .and_then(|(_, value)| serde_json::from_str::<Destination>(value.value()).ok())
            })
            .collect();

        Ok(destinations)
    }

    /// Persists the outcome of one health probe against a destination
    pub fn record_health_check(
        &self,
        destination: &Destination,
        status: HealthStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut updated = destination.clone();
        updated.health_status = Some(status);
        updated.last_health_check_at = Some(checked_at);
        self.put_destination(&updated)
    }

    fn load_active_short_link(&self, code: &str) -> Result<Option<ShortLink>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE_LINKS)?;

        let record = match table.get(code)? {
            Some(guard) => serde_json::from_str::<ShortLink>(guard.value())?,
            None => return Ok(None),
        };

        // Inactive links are never routed; resolution fails exactly as if
        // the code did not exist.
        if record.is_active {
            Ok(Some(record))
        } else {
            Ok(None)
        }
    }

    fn load_active_schedule(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Schedule>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE_SCHEDULES)?;

        // Range boundaries for all schedules of this link:
        // start_key: "abc123:" - matches every key with this code prefix
        // end_key: "abc123:{" - '{' is lexicographically after ':', giving
        //                       an exclusive upper bound on the prefix
        let start_key = format!("{}:", code);
        let end_key = format!("{}:{{", code);

        let active = table
            .range(start_key.as_str()..end_key.as_str())?
            .filter_map(|res| {
                res.ok()
                    .and_then(|(_, value)| serde_json::from_str::<Schedule>(value.value()).ok())
            })
            .filter(|schedule| schedule.starts_at <= now && now < schedule.ends_at)
            .max_by_key(|schedule| schedule.created_at);

        Ok(active)
    }

    fn load_running_ab_test(&self, code: &str) -> Result<Option<AbTest>, StoreError> {
        let test = match self.get_ab_test(code)? {
            Some(test) => test,
            None => return Ok(None),
        };

        if test.status == AbTestStatus::Running {
            Ok(Some(test))
        } else {
            Ok(None)
        }
    }

    fn load_destinations(&self, code: &str) -> Result<Vec<Destination>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE_DESTINATIONS)?;

        let start_key = format!("{}:", code);
        let end_key = format!("{}:{{", code);

        // Key order is "{code}:{priority:05}:{id}", so the scan already
        // yields ascending priority with the id tie-break.
        let destinations = table
            .range(start_key.as_str()..end_key.as_str())?
            .filter_map(|res| {
                res.ok()
                    .and_then(|(_, value)| serde_json::from_str::<Destination>(value.value()).ok())
            })
            .collect();

        Ok(destinations)
    }

    fn bump_ab_test_clicks(&self, code: &str, variant: AbVariant) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE_AB_TESTS)?;

            // The guard borrows the table, so the value is copied out
            // before the insert below.
            let current = table.get(code)?.map(|guard| guard.value().to_string());

            let record_json = match current {
                Some(json) => json,
                None => return Ok(()),
            };

            let mut test = serde_json::from_str::<AbTest>(&record_json)?;
            match variant {
                AbVariant::A => test.variant_a_clicks += 1,
                AbVariant::B => test.variant_b_clicks += 1,
            }

            let updated_json = serde_json::to_string(&test)?;
            table.insert(code, updated_json.as_str())?;
        }
        write_txn.commit()?;

        Ok(())
    }
}

impl LinkStore for RedbLinkStore {
    async fn find_active_short_link(&self, code: &str) -> Result<Option<ShortLink>, StoreError> {
        self.load_active_short_link(code)
    }

    async fn find_active_schedule(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Schedule>, StoreError> {
        self.load_active_schedule(code, now)
    }

    async fn find_running_ab_test(&self, code: &str) -> Result<Option<AbTest>, StoreError> {
        self.load_running_ab_test(code)
    }

    async fn list_destinations_by_priority(
        &self,
        code: &str,
    ) -> Result<Vec<Destination>, StoreError> {
        self.load_destinations(code)
    }

    async fn increment_ab_test_clicks(
        &self,
        code: &str,
        variant: AbVariant,
    ) -> Result<(), StoreError> {
        self.bump_ab_test_clicks(code, variant)
    }
}
