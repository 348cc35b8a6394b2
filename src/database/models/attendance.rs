use anyhow::anyhow;
use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

use super::from_db_id;
use super::to_db_id;
use crate::database::schema::raid_attendance;
use crate::error::Error;
use crate::framework::attendance::AttendanceRecord;
use crate::framework::attendance::AttendanceStatus;

#[derive(Queryable, Selectable, Insertable, Clone, Debug)]
#[diesel(table_name = raid_attendance)]
pub struct AttendanceRow {
    pub raid_id: Uuid,
    pub member_id: i64,
    pub member_name: String,
    pub status: i16,
    pub response_time: DateTime<Utc>,
    pub note: Option<String>,
}

impl From<&AttendanceRecord> for AttendanceRow {
    fn from(record: &AttendanceRecord) -> Self {
        Self {
            raid_id: record.raid_id,
            member_id: to_db_id(record.member_id),
            member_name: record.member_name.clone(),
            status: record.status.ordinal(),
            response_time: record.response_time,
            note: record.note.clone(),
        }
    }
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = Error;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        let status = AttendanceStatus::from_ordinal(row.status).ok_or_else(|| {
            anyhow!(
                "Unknown attendance status {} stored for raid {}",
                row.status,
                row.raid_id
            )
        })?;

        Ok(Self {
            raid_id: row.raid_id,
            member_id: from_db_id(row.member_id),
            member_name: row.member_name,
            status,
            response_time: row.response_time,
            note: row.note,
        })
    }
}
