use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use tracing::debug;
use tracing::info;
use uuid::Uuid;

use super::notification::Change;
use super::notification::ChangeNotifier;
use super::notification::MessageHandle;
use super::notification::RsvpReaction;
use super::MemberId;
use crate::database::Store;
use crate::error::Error;

/// RSVP state of a member for a raid. Declaration order is the display
/// order of status groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttendanceStatus {
    Pending,
    Confirmed,
    Declined,
    BenchRequested,
    OnBench,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 5] = [
        AttendanceStatus::Pending,
        AttendanceStatus::Confirmed,
        AttendanceStatus::Declined,
        AttendanceStatus::BenchRequested,
        AttendanceStatus::OnBench,
    ];

    pub fn ordinal(self) -> i16 {
        self as i16
    }

    pub fn from_ordinal(ordinal: i16) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.ordinal() == ordinal)
    }

    pub fn is_bench(self) -> bool {
        matches!(
            self,
            AttendanceStatus::BenchRequested | AttendanceStatus::OnBench
        )
    }
}

impl Display for AttendanceStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AttendanceStatus::Pending => "Pending",
            AttendanceStatus::Confirmed => "Confirmed",
            AttendanceStatus::Declined => "Declined",
            AttendanceStatus::BenchRequested => "Bench requested",
            AttendanceStatus::OnBench => "On bench",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub raid_id: Uuid,
    pub member_id: MemberId,
    /// Display name captured when the record was last written.
    pub member_name: String,
    pub status: AttendanceStatus,
    pub response_time: DateTime<Utc>,
    pub note: Option<String>,
}

impl AttendanceRecord {
    pub fn new(
        raid_id: Uuid,
        member_id: MemberId,
        member_name: impl Into<String>,
        status: AttendanceStatus,
        note: Option<String>,
    ) -> Self {
        Self {
            raid_id,
            member_id,
            member_name: member_name.into(),
            status,
            response_time: Utc::now(),
            note,
        }
    }
}

pub struct AttendanceTracker {
    store: Arc<dyn Store>,
    changes: ChangeNotifier,
}

impl AttendanceTracker {
    pub fn new(store: Arc<dyn Store>, changes: ChangeNotifier) -> Self {
        Self { store, changes }
    }

    /// Inserts or updates the member's RSVP, stamping the response time.
    /// A missing note keeps whatever note the record already had.
    ///
    /// Unknown raid ids are rejected rather than producing orphan rows.
    pub async fn set_status(
        &self,
        raid_id: Uuid,
        member_id: MemberId,
        member_name: &str,
        status: AttendanceStatus,
        note: Option<String>,
    ) -> Result<AttendanceRecord, Error> {
        if self.store.find_raid(raid_id).await?.is_none() {
            return Err(Error::RaidNotFound { raid_id });
        }

        let record = AttendanceRecord::new(raid_id, member_id, member_name, status, note);
        let record = self.store.upsert_attendance(&record).await?;

        info!(%raid_id, member_id, %status, "Attendance updated");
        self.changes.notify(raid_id, Change::Attendance);

        Ok(record)
    }

    /// All records for the raid, grouped by status, then by display name.
    pub async fn list_by_raid(&self, raid_id: Uuid) -> Result<Vec<AttendanceRecord>, Error> {
        self.store.list_attendance(raid_id, None).await
    }

    pub async fn list_by_status(
        &self,
        raid_id: Uuid,
        status: AttendanceStatus,
    ) -> Result<Vec<AttendanceRecord>, Error> {
        self.store.list_attendance(raid_id, Some(status)).await
    }

    /// Members who asked for, or were moved to, the bench.
    pub async fn bench(&self, raid_id: Uuid) -> Result<Vec<AttendanceRecord>, Error> {
        Ok(self
            .list_by_raid(raid_id)
            .await?
            .into_iter()
            .filter(|r| r.status.is_bench())
            .collect())
    }

    /// `None` when the member never responded.
    pub async fn get_status(
        &self,
        raid_id: Uuid,
        member_id: MemberId,
    ) -> Result<Option<AttendanceStatus>, Error> {
        Ok(self
            .store
            .find_attendance(raid_id, member_id)
            .await?
            .map(|r| r.status))
    }

    pub async fn delete_all_for_raid(&self, raid_id: Uuid) -> Result<usize, Error> {
        let rows = self.store.delete_attendance_for_raid(raid_id).await?;
        debug!(%raid_id, rows, "Deleted attendance records");

        if rows > 0 {
            self.changes.notify(raid_id, Change::Attendance);
        }

        Ok(rows)
    }

    /// Returns `None` when the member has no record for the raid.
    pub async fn move_to_bench(
        &self,
        raid_id: Uuid,
        member_id: MemberId,
    ) -> Result<Option<AttendanceRecord>, Error> {
        self.change_existing(raid_id, member_id, AttendanceStatus::OnBench)
            .await
    }

    pub async fn move_from_bench_to_confirmed(
        &self,
        raid_id: Uuid,
        member_id: MemberId,
    ) -> Result<Option<AttendanceRecord>, Error> {
        self.change_existing(raid_id, member_id, AttendanceStatus::Confirmed)
            .await
    }

    async fn change_existing(
        &self,
        raid_id: Uuid,
        member_id: MemberId,
        status: AttendanceStatus,
    ) -> Result<Option<AttendanceRecord>, Error> {
        let Some(existing) = self.store.find_attendance(raid_id, member_id).await? else {
            return Ok(None);
        };

        let record = self
            .set_status(raid_id, member_id, &existing.member_name, status, None)
            .await?;

        Ok(Some(record))
    }

    /// Number of raids in `[from, to]` the member confirmed.
    pub async fn confirmed_count(
        &self,
        member_id: MemberId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<usize, Error> {
        self.store.count_confirmed(member_id, from, to).await
    }

    /// Routes a reaction on an advance reminder to the regular RSVP path.
    /// Reactions on other messages, and unknown emoji, are ignored.
    pub async fn respond_to_reminder(
        &self,
        reminder: MessageHandle,
        member_id: MemberId,
        member_name: &str,
        emoji: &str,
    ) -> Result<Option<AttendanceRecord>, Error> {
        let Some(reaction) = RsvpReaction::from_emoji(emoji) else {
            return Ok(None);
        };

        let Some(raid) = self.store.find_raid_by_reminder(reminder).await? else {
            return Ok(None);
        };

        let record = self
            .set_status(raid.id, member_id, member_name, reaction.status(), None)
            .await?;

        Ok(Some(record))
    }
}
