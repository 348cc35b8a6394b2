use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::MutexGuard;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

use super::MessageKind;
use super::RaidFilter;
use super::Store;
use crate::error::Error;
use crate::framework::attendance::AttendanceRecord;
use crate::framework::attendance::AttendanceStatus;
use crate::framework::character::Character;
use crate::framework::composition::CompositionAssignment;
use crate::framework::notification::MessageHandle;
use crate::framework::raid::Raid;
use crate::framework::user_settings::UserSettings;
use crate::framework::MemberId;

#[derive(Default)]
struct Tables {
    raids: BTreeMap<Uuid, Raid>,
    attendance: BTreeMap<(Uuid, MemberId), AttendanceRecord>,
    composition: BTreeMap<(Uuid, MemberId), CompositionAssignment>,
    characters: BTreeMap<Uuid, Character>,
    user_settings: BTreeMap<MemberId, UserSettings>,
}

/// Store used by the unit tests. A single lock makes every call atomic,
/// standing in for the unique keys and transactions of [`super::PgStore`].
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_raid(&self, raid: &Raid) -> Result<Raid, Error> {
        self.tables().raids.insert(raid.id, raid.clone());
        Ok(raid.clone())
    }

    async fn find_raid(&self, raid_id: Uuid) -> Result<Option<Raid>, Error> {
        Ok(self.tables().raids.get(&raid_id).cloned())
    }

    async fn find_raid_by_reminder(&self, handle: MessageHandle) -> Result<Option<Raid>, Error> {
        Ok(self
            .tables()
            .raids
            .values()
            .find(|r| r.reminder_message == Some(handle))
            .cloned())
    }

    async fn list_raids(&self, filter: RaidFilter) -> Result<Vec<Raid>, Error> {
        let mut raids: Vec<Raid> = self
            .tables()
            .raids
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        raids.sort_by_key(|r| r.scheduled);
        Ok(raids)
    }

    async fn archive_raid(&self, raid_id: Uuid) -> Result<Option<Raid>, Error> {
        Ok(self.tables().raids.get_mut(&raid_id).map(|raid| {
            raid.archived = true;
            raid.clone()
        }))
    }

    async fn set_message(
        &self,
        raid_id: Uuid,
        kind: MessageKind,
        handle: Option<MessageHandle>,
    ) -> Result<(), Error> {
        let mut tables = self.tables();
        let raid = tables
            .raids
            .get_mut(&raid_id)
            .ok_or(Error::RaidNotFound { raid_id })?;

        match kind {
            MessageKind::Raid => raid.message = handle,
            MessageKind::Reminder => raid.reminder_message = handle,
            MessageKind::FinalReminder => raid.final_reminder_message = handle,
        }
        Ok(())
    }

    async fn delete_raid(&self, raid_id: Uuid) -> Result<Option<Raid>, Error> {
        let mut tables = self.tables();
        let Some(raid) = tables.raids.remove(&raid_id) else {
            return Ok(None);
        };

        tables.attendance.retain(|(id, _), _| *id != raid_id);
        tables.composition.retain(|(id, _), _| *id != raid_id);

        Ok(Some(raid))
    }

    async fn upsert_attendance(
        &self,
        record: &AttendanceRecord,
    ) -> Result<AttendanceRecord, Error> {
        let mut tables = self.tables();
        let key = (record.raid_id, record.member_id);

        let mut record = record.clone();
        if record.note.is_none() {
            record.note = tables.attendance.get(&key).and_then(|r| r.note.clone());
        }
        tables.attendance.insert(key, record.clone());

        Ok(record)
    }

    async fn find_attendance(
        &self,
        raid_id: Uuid,
        member_id: MemberId,
    ) -> Result<Option<AttendanceRecord>, Error> {
        Ok(self.tables().attendance.get(&(raid_id, member_id)).cloned())
    }

    async fn list_attendance(
        &self,
        raid_id: Uuid,
        status: Option<AttendanceStatus>,
    ) -> Result<Vec<AttendanceRecord>, Error> {
        let mut records: Vec<AttendanceRecord> = self
            .tables()
            .attendance
            .values()
            .filter(|r| r.raid_id == raid_id)
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            a.status
                .cmp(&b.status)
                .then_with(|| a.member_name.cmp(&b.member_name))
        });
        Ok(records)
    }

    async fn delete_attendance_for_raid(&self, raid_id: Uuid) -> Result<usize, Error> {
        let mut tables = self.tables();
        let before = tables.attendance.len();
        tables.attendance.retain(|(id, _), _| *id != raid_id);
        Ok(before - tables.attendance.len())
    }

    async fn count_confirmed(
        &self,
        member_id: MemberId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<usize, Error> {
        let tables = self.tables();

        Ok(tables
            .attendance
            .values()
            .filter(|r| r.member_id == member_id && r.status == AttendanceStatus::Confirmed)
            .filter_map(|r| tables.raids.get(&r.raid_id))
            .filter(|raid| raid.scheduled >= from && raid.scheduled <= to)
            .count())
    }

    async fn assign(
        &self,
        assignment: &CompositionAssignment,
        confirm: &AttendanceRecord,
    ) -> Result<CompositionAssignment, Error> {
        let mut tables = self.tables();
        let key = (assignment.raid_id, assignment.member_id);

        tables
            .attendance
            .entry(key)
            .and_modify(|record| {
                if record.status != AttendanceStatus::Confirmed {
                    record.status = AttendanceStatus::Confirmed;
                    record.response_time = confirm.response_time;
                }
            })
            .or_insert_with(|| confirm.clone());

        let mut assignment = assignment.clone();
        if assignment.sub_role.is_none() {
            assignment.sub_role = tables.composition.get(&key).and_then(|a| a.sub_role.clone());
        }
        tables.composition.insert(key, assignment.clone());

        Ok(assignment)
    }

    async fn delete_assignment(&self, raid_id: Uuid, member_id: MemberId) -> Result<bool, Error> {
        Ok(self
            .tables()
            .composition
            .remove(&(raid_id, member_id))
            .is_some())
    }

    async fn list_assignments(&self, raid_id: Uuid) -> Result<Vec<CompositionAssignment>, Error> {
        // keys sort by (raid, member), matching the Postgres ordering
        Ok(self
            .tables()
            .composition
            .values()
            .filter(|a| a.raid_id == raid_id)
            .cloned()
            .collect())
    }

    async fn upsert_character(&self, character: &Character) -> Result<Character, Error> {
        let mut tables = self.tables();

        let mut character = character.clone();
        if let Some(existing) = tables
            .characters
            .values()
            .find(|c| c.user_id == character.user_id && c.name == character.name)
        {
            character.id = existing.id;
        }
        tables.characters.insert(character.id, character.clone());

        Ok(character)
    }

    async fn find_character(&self, character_id: Uuid) -> Result<Option<Character>, Error> {
        Ok(self.tables().characters.get(&character_id).cloned())
    }

    async fn find_character_by_name(
        &self,
        user_id: MemberId,
        name: &str,
    ) -> Result<Option<Character>, Error> {
        Ok(self
            .tables()
            .characters
            .values()
            .find(|c| c.user_id == user_id && c.name == name)
            .cloned())
    }

    async fn list_characters(&self, user_id: MemberId) -> Result<Vec<Character>, Error> {
        let mut characters: Vec<Character> = self
            .tables()
            .characters
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        characters.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(characters)
    }

    async fn find_user_settings(&self, user_id: MemberId) -> Result<Option<UserSettings>, Error> {
        Ok(self.tables().user_settings.get(&user_id).cloned())
    }

    async fn upsert_user_settings(&self, settings: &UserSettings) -> Result<UserSettings, Error> {
        self.tables()
            .user_settings
            .insert(settings.user_id, settings.clone());
        Ok(settings.clone())
    }
}
