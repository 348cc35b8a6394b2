use anyhow::anyhow;
use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use diesel::r2d2::ConnectionManager;
use diesel::r2d2::Pool;
use diesel::PgConnection;
use diesel_migrations::embed_migrations;
use diesel_migrations::EmbeddedMigrations;
use diesel_migrations::MigrationHarness;
use tracing::info;
use uuid::Uuid;

use crate::error::Error;
use crate::framework::attendance::AttendanceRecord;
use crate::framework::attendance::AttendanceStatus;
use crate::framework::character::Character;
use crate::framework::composition::CompositionAssignment;
use crate::framework::notification::MessageHandle;
use crate::framework::raid::Raid;
use crate::framework::user_settings::UserSettings;
use crate::framework::GuildId;
use crate::framework::MemberId;

#[cfg(test)]
pub mod memory;
mod models;
mod pg;
mod schema;

pub use pg::PgStore;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub fn connect(database_url: &str) -> Result<PgPool, Error> {
    let manager = ConnectionManager::new(database_url);
    Ok(Pool::builder().build(manager)?)
}

pub fn run_migrations(pool: &PgPool) -> Result<(), Error> {
    let mut connection = pool.get()?;

    let applied = connection
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow!("Failed to run migrations: {}", e))?;

    info!(count = applied.len(), "Migrations applied");

    Ok(())
}

/// The messages a raid keeps a handle to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// The public raid message, re-rendered on every change.
    Raid,
    /// The advance reminder carrying the RSVP reactions.
    Reminder,
    FinalReminder,
}

/// Selects raids for [`Store::list_raids`]. Unset criteria match everything.
/// Results are ordered by scheduled time, soonest first.
#[derive(Debug, Clone, Default)]
pub struct RaidFilter {
    guild_id: Option<GuildId>,
    archived: Option<bool>,
    scheduled_after: Option<DateTime<Utc>>,
    scheduled_before: Option<DateTime<Utc>>,
    without_message: Option<MessageKind>,
}

impl RaidFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guild(mut self, guild_id: GuildId) -> Self {
        self.guild_id = Some(guild_id);
        self
    }

    pub fn archived(mut self, archived: bool) -> Self {
        self.archived = Some(archived);
        self
    }

    /// Exclusive.
    pub fn scheduled_after(mut self, after: DateTime<Utc>) -> Self {
        self.scheduled_after = Some(after);
        self
    }

    /// Exclusive.
    pub fn scheduled_before(mut self, before: DateTime<Utc>) -> Self {
        self.scheduled_before = Some(before);
        self
    }

    /// Only raids that have no handle of this kind yet.
    pub fn without_message(mut self, kind: MessageKind) -> Self {
        self.without_message = Some(kind);
        self
    }

    #[cfg(test)]
    pub fn matches(&self, raid: &Raid) -> bool {
        self.guild_id.map_or(true, |g| raid.guild_id == g)
            && self.archived.map_or(true, |a| raid.archived == a)
            && self.scheduled_after.map_or(true, |t| raid.scheduled > t)
            && self.scheduled_before.map_or(true, |t| raid.scheduled < t)
            && self
                .without_message
                .map_or(true, |kind| raid.message(kind).is_none())
    }
}

/// Persistence for raids and everything hanging off them.
///
/// Upserts are keyed on the natural unique keys and resolved by the store,
/// so concurrent writers never produce duplicate rows.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_raid(&self, raid: &Raid) -> Result<Raid, Error>;

    async fn find_raid(&self, raid_id: Uuid) -> Result<Option<Raid>, Error>;

    /// The raid whose advance reminder is `handle`.
    async fn find_raid_by_reminder(&self, handle: MessageHandle) -> Result<Option<Raid>, Error>;

    async fn list_raids(&self, filter: RaidFilter) -> Result<Vec<Raid>, Error>;

    /// `None` when the raid does not exist.
    async fn archive_raid(&self, raid_id: Uuid) -> Result<Option<Raid>, Error>;

    /// Fails with [`Error::RaidNotFound`] when the raid does not exist.
    async fn set_message(
        &self,
        raid_id: Uuid,
        kind: MessageKind,
        handle: Option<MessageHandle>,
    ) -> Result<(), Error>;

    /// Removes the raid, its attendance and its composition in one unit.
    async fn delete_raid(&self, raid_id: Uuid) -> Result<Option<Raid>, Error>;

    /// Insert or update by `(raid_id, member_id)`. A `None` note keeps the
    /// stored note.
    async fn upsert_attendance(
        &self,
        record: &AttendanceRecord,
    ) -> Result<AttendanceRecord, Error>;

    async fn find_attendance(
        &self,
        raid_id: Uuid,
        member_id: MemberId,
    ) -> Result<Option<AttendanceRecord>, Error>;

    /// Ordered by status, then member name.
    async fn list_attendance(
        &self,
        raid_id: Uuid,
        status: Option<AttendanceStatus>,
    ) -> Result<Vec<AttendanceRecord>, Error>;

    async fn delete_attendance_for_raid(&self, raid_id: Uuid) -> Result<usize, Error>;

    /// Raids scheduled within `[from, to]` the member is confirmed for.
    async fn count_confirmed(
        &self,
        member_id: MemberId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<usize, Error>;

    /// Upserts the assignment by `(raid_id, member_id)` and makes sure the
    /// member's attendance is confirmed, inserting `confirm` if the member
    /// has no record. Both writes commit together.
    async fn assign(
        &self,
        assignment: &CompositionAssignment,
        confirm: &AttendanceRecord,
    ) -> Result<CompositionAssignment, Error>;

    async fn delete_assignment(&self, raid_id: Uuid, member_id: MemberId) -> Result<bool, Error>;

    async fn list_assignments(&self, raid_id: Uuid) -> Result<Vec<CompositionAssignment>, Error>;

    async fn upsert_character(&self, character: &Character) -> Result<Character, Error>;

    async fn find_character(&self, character_id: Uuid) -> Result<Option<Character>, Error>;

    async fn find_character_by_name(
        &self,
        user_id: MemberId,
        name: &str,
    ) -> Result<Option<Character>, Error>;

    async fn list_characters(&self, user_id: MemberId) -> Result<Vec<Character>, Error>;

    async fn find_user_settings(&self, user_id: MemberId) -> Result<Option<UserSettings>, Error>;

    async fn upsert_user_settings(&self, settings: &UserSettings) -> Result<UserSettings, Error>;
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn filter_bounds_are_exclusive() {
        let now = Utc::now();
        let raid = Raid::new("Savage", "", now, "", 1, 2);

        assert!(RaidFilter::new().matches(&raid));
        assert!(!RaidFilter::new().scheduled_after(now).matches(&raid));
        assert!(!RaidFilter::new().scheduled_before(now).matches(&raid));
        assert!(RaidFilter::new()
            .scheduled_after(now - Duration::seconds(1))
            .scheduled_before(now + Duration::seconds(1))
            .matches(&raid));
    }

    #[test]
    fn filter_checks_guild_archive_and_handles() {
        let mut raid = Raid::new("Savage", "", Utc::now(), "", 1, 2);
        raid.reminder_message = Some(MessageHandle(9));

        assert!(!RaidFilter::new().guild(2).matches(&raid));
        assert!(!RaidFilter::new().archived(true).matches(&raid));
        assert!(!RaidFilter::new()
            .without_message(MessageKind::Reminder)
            .matches(&raid));
        assert!(RaidFilter::new()
            .without_message(MessageKind::FinalReminder)
            .matches(&raid));
    }
}
