use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

use super::from_db_id;
use super::to_db_id;
use crate::database::schema::raid;
use crate::framework::notification::MessageHandle;
use crate::framework::raid::Raid;

#[derive(Queryable, Selectable, Insertable, Clone, Debug)]
#[diesel(table_name = raid)]
pub struct RaidRow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub scheduled_time: DateTime<Utc>,
    pub location: String,
    pub archived: bool,
    pub guild_id: i64,
    pub channel_id: i64,
    pub message_id: Option<i64>,
    pub reminder_message_id: Option<i64>,
    pub final_reminder_message_id: Option<i64>,
}

fn handle_to_db(handle: Option<MessageHandle>) -> Option<i64> {
    handle.map(|h| to_db_id(h.0))
}

fn handle_from_db(id: Option<i64>) -> Option<MessageHandle> {
    id.map(|id| MessageHandle(from_db_id(id)))
}

impl From<&Raid> for RaidRow {
    fn from(raid: &Raid) -> Self {
        Self {
            id: raid.id,
            name: raid.name.clone(),
            description: raid.description.clone(),
            scheduled_time: raid.scheduled,
            location: raid.location.clone(),
            archived: raid.archived,
            guild_id: to_db_id(raid.guild_id),
            channel_id: to_db_id(raid.channel_id),
            message_id: handle_to_db(raid.message),
            reminder_message_id: handle_to_db(raid.reminder_message),
            final_reminder_message_id: handle_to_db(raid.final_reminder_message),
        }
    }
}

impl From<RaidRow> for Raid {
    fn from(row: RaidRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            scheduled: row.scheduled_time,
            location: row.location,
            archived: row.archived,
            guild_id: from_db_id(row.guild_id),
            channel_id: from_db_id(row.channel_id),
            message: handle_from_db(row.message_id),
            reminder_message: handle_from_db(row.reminder_message_id),
            final_reminder_message: handle_from_db(row.final_reminder_message_id),
        }
    }
}
