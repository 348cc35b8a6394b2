use chrono::DateTime;
use chrono::Utc;

use super::from_db_id;
use super::to_db_id;
use crate::database::schema::user_settings;
use crate::framework::user_settings::UserSettings;

#[derive(Queryable, Selectable, Insertable, AsChangeset, Clone, Debug)]
#[diesel(table_name = user_settings)]
#[diesel(primary_key(user_id))]
pub struct UserSettingsRow {
    pub user_id: i64,
    pub time_zone: String,
    pub last_updated: DateTime<Utc>,
}

impl From<&UserSettings> for UserSettingsRow {
    fn from(settings: &UserSettings) -> Self {
        Self {
            user_id: to_db_id(settings.user_id),
            time_zone: settings.time_zone.clone(),
            last_updated: settings.last_updated,
        }
    }
}

impl From<UserSettingsRow> for UserSettings {
    fn from(row: UserSettingsRow) -> Self {
        Self {
            user_id: from_db_id(row.user_id),
            time_zone: row.time_zone,
            last_updated: row.last_updated,
        }
    }
}
