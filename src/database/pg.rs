use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use diesel::dsl::sql;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::sql_types::Nullable;
use diesel::sql_types::Text;
use diesel::upsert::excluded;
use tracing::debug;
use uuid::Uuid;

use super::models::attendance::AttendanceRow;
use super::models::character::CharacterRow;
use super::models::composition::CompositionRow;
use super::models::raid::RaidRow;
use super::models::to_db_id;
use super::models::user_settings::UserSettingsRow;
use super::schema::raid;
use super::schema::raid_attendance;
use super::schema::raid_character;
use super::schema::raid_composition;
use super::schema::user_settings;
use super::MessageKind;
use super::PgPool;
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

/// [`Store`] over a Postgres connection pool. Diesel is synchronous, so
/// every call runs on tokio's blocking pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn run<T, F>(&self, f: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> Result<T, Error> + Send + 'static,
    {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get()?;
            f(&mut connection)
        })
        .await?
    }
}

impl RaidFilter {
    fn apply_filter<'a>(&self, mut query: raid::BoxedQuery<'a, Pg>) -> raid::BoxedQuery<'a, Pg> {
        use super::schema::raid::dsl;

        if let Some(guild_id) = self.guild_id {
            query = query.filter(dsl::guild_id.eq(to_db_id(guild_id)));
        }

        if let Some(archived) = self.archived {
            query = query.filter(dsl::archived.eq(archived));
        }

        if let Some(after) = self.scheduled_after {
            query = query.filter(dsl::scheduled_time.gt(after));
        }

        if let Some(before) = self.scheduled_before {
            query = query.filter(dsl::scheduled_time.lt(before));
        }

        query = match self.without_message {
            Some(MessageKind::Raid) => query.filter(dsl::message_id.is_null()),
            Some(MessageKind::Reminder) => query.filter(dsl::reminder_message_id.is_null()),
            Some(MessageKind::FinalReminder) => {
                query.filter(dsl::final_reminder_message_id.is_null())
            }
            None => query,
        };

        query.order(dsl::scheduled_time.asc())
    }
}

fn find_raid_row(connection: &mut PgConnection, raid_id: Uuid) -> Result<Option<RaidRow>, Error> {
    Ok(raid::table
        .find(raid_id)
        .select(RaidRow::as_select())
        .first(connection)
        .optional()?)
}

#[async_trait]
impl Store for PgStore {
    async fn insert_raid(&self, new_raid: &Raid) -> Result<Raid, Error> {
        let row = RaidRow::from(new_raid);

        self.run(move |connection| {
            let row = diesel::insert_into(raid::table)
                .values(&row)
                .returning(RaidRow::as_returning())
                .get_result(connection)?;
            Ok(Raid::from(row))
        })
        .await
    }

    async fn find_raid(&self, raid_id: Uuid) -> Result<Option<Raid>, Error> {
        self.run(move |connection| Ok(find_raid_row(connection, raid_id)?.map(Raid::from)))
            .await
    }

    async fn find_raid_by_reminder(&self, handle: MessageHandle) -> Result<Option<Raid>, Error> {
        self.run(move |connection| {
            let row = raid::table
                .filter(raid::reminder_message_id.eq(to_db_id(handle.0)))
                .select(RaidRow::as_select())
                .first(connection)
                .optional()?;
            Ok(row.map(Raid::from))
        })
        .await
    }

    async fn list_raids(&self, filter: RaidFilter) -> Result<Vec<Raid>, Error> {
        self.run(move |connection| {
            let rows = filter
                .apply_filter(raid::table.into_boxed())
                .select(RaidRow::as_select())
                .load(connection)?;
            Ok(rows.into_iter().map(Raid::from).collect())
        })
        .await
    }

    async fn archive_raid(&self, raid_id: Uuid) -> Result<Option<Raid>, Error> {
        self.run(move |connection| {
            let row = diesel::update(raid::table.find(raid_id))
                .set(raid::archived.eq(true))
                .returning(RaidRow::as_returning())
                .get_result(connection)
                .optional()?;
            Ok(row.map(Raid::from))
        })
        .await
    }

    async fn set_message(
        &self,
        raid_id: Uuid,
        kind: MessageKind,
        handle: Option<MessageHandle>,
    ) -> Result<(), Error> {
        let value = handle.map(|h| to_db_id(h.0));

        self.run(move |connection| {
            let target = diesel::update(raid::table.find(raid_id));
            let rows = match kind {
                MessageKind::Raid => target.set(raid::message_id.eq(value)).execute(connection)?,
                MessageKind::Reminder => target
                    .set(raid::reminder_message_id.eq(value))
                    .execute(connection)?,
                MessageKind::FinalReminder => target
                    .set(raid::final_reminder_message_id.eq(value))
                    .execute(connection)?,
            };

            if rows == 0 {
                return Err(Error::RaidNotFound { raid_id });
            }
            Ok(())
        })
        .await
    }

    async fn delete_raid(&self, raid_id: Uuid) -> Result<Option<Raid>, Error> {
        self.run(move |connection| {
            connection.transaction::<_, Error, _>(|connection| {
                let Some(row) = find_raid_row(connection, raid_id)? else {
                    return Ok(None);
                };

                let attendance = diesel::delete(
                    raid_attendance::table.filter(raid_attendance::raid_id.eq(raid_id)),
                )
                .execute(connection)?;
                let composition = diesel::delete(
                    raid_composition::table.filter(raid_composition::raid_id.eq(raid_id)),
                )
                .execute(connection)?;
                diesel::delete(raid::table.find(raid_id)).execute(connection)?;

                debug!(%raid_id, attendance, composition, "Deleted raid rows");

                Ok(Some(Raid::from(row)))
            })
        })
        .await
    }

    async fn upsert_attendance(
        &self,
        record: &AttendanceRecord,
    ) -> Result<AttendanceRecord, Error> {
        let row = AttendanceRow::from(record);

        self.run(move |connection| {
            use super::schema::raid_attendance::dsl;

            let row = diesel::insert_into(dsl::raid_attendance)
                .values(&row)
                .on_conflict((dsl::raid_id, dsl::member_id))
                .do_update()
                .set((
                    dsl::member_name.eq(excluded(dsl::member_name)),
                    dsl::status.eq(excluded(dsl::status)),
                    dsl::response_time.eq(excluded(dsl::response_time)),
                    dsl::note.eq(sql::<Nullable<Text>>(
                        "COALESCE(excluded.note, raid_attendance.note)",
                    )),
                ))
                .returning(AttendanceRow::as_returning())
                .get_result(connection)?;

            AttendanceRecord::try_from(row)
        })
        .await
    }

    async fn find_attendance(
        &self,
        raid_id: Uuid,
        member_id: MemberId,
    ) -> Result<Option<AttendanceRecord>, Error> {
        self.run(move |connection| {
            raid_attendance::table
                .find((raid_id, to_db_id(member_id)))
                .select(AttendanceRow::as_select())
                .first(connection)
                .optional()?
                .map(AttendanceRecord::try_from)
                .transpose()
        })
        .await
    }

    async fn list_attendance(
        &self,
        raid_id: Uuid,
        status: Option<AttendanceStatus>,
    ) -> Result<Vec<AttendanceRecord>, Error> {
        self.run(move |connection| {
            use super::schema::raid_attendance::dsl;

            let mut query = dsl::raid_attendance
                .filter(dsl::raid_id.eq(raid_id))
                .into_boxed();
            if let Some(status) = status {
                query = query.filter(dsl::status.eq(status.ordinal()));
            }

            query
                .order((dsl::status.asc(), dsl::member_name.asc()))
                .select(AttendanceRow::as_select())
                .load(connection)?
                .into_iter()
                .map(AttendanceRecord::try_from)
                .collect()
        })
        .await
    }

    async fn delete_attendance_for_raid(&self, raid_id: Uuid) -> Result<usize, Error> {
        self.run(move |connection| {
            Ok(diesel::delete(
                raid_attendance::table.filter(raid_attendance::raid_id.eq(raid_id)),
            )
            .execute(connection)?)
        })
        .await
    }

    async fn count_confirmed(
        &self,
        member_id: MemberId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<usize, Error> {
        self.run(move |connection| {
            let count: i64 = raid_attendance::table
                .inner_join(raid::table)
                .filter(raid_attendance::member_id.eq(to_db_id(member_id)))
                .filter(raid_attendance::status.eq(AttendanceStatus::Confirmed.ordinal()))
                .filter(raid::scheduled_time.ge(from))
                .filter(raid::scheduled_time.le(to))
                .count()
                .get_result(connection)?;
            Ok(count as usize)
        })
        .await
    }

    async fn assign(
        &self,
        assignment: &CompositionAssignment,
        confirm: &AttendanceRecord,
    ) -> Result<CompositionAssignment, Error> {
        let assignment = CompositionRow::from(assignment);
        let confirm = AttendanceRow::from(confirm);
        let confirmed = AttendanceStatus::Confirmed.ordinal();

        self.run(move |connection| {
            connection.transaction::<_, Error, _>(|connection| {
                use super::schema::raid_attendance::dsl as att;
                use super::schema::raid_composition::dsl as comp;

                diesel::insert_into(att::raid_attendance)
                    .values(&confirm)
                    .on_conflict((att::raid_id, att::member_id))
                    .do_nothing()
                    .execute(connection)?;

                diesel::update(
                    att::raid_attendance
                        .filter(att::raid_id.eq(confirm.raid_id))
                        .filter(att::member_id.eq(confirm.member_id))
                        .filter(att::status.ne(confirmed)),
                )
                .set((
                    att::status.eq(confirmed),
                    att::response_time.eq(confirm.response_time),
                ))
                .execute(connection)?;

                let row = diesel::insert_into(comp::raid_composition)
                    .values(&assignment)
                    .on_conflict((comp::raid_id, comp::member_id))
                    .do_update()
                    .set((
                        comp::character_id.eq(excluded(comp::character_id)),
                        comp::job.eq(excluded(comp::job)),
                        comp::sub_role.eq(sql::<Nullable<Text>>(
                            "COALESCE(excluded.sub_role, raid_composition.sub_role)",
                        )),
                    ))
                    .returning(CompositionRow::as_returning())
                    .get_result(connection)?;

                CompositionAssignment::try_from(row)
            })
        })
        .await
    }

    async fn delete_assignment(&self, raid_id: Uuid, member_id: MemberId) -> Result<bool, Error> {
        self.run(move |connection| {
            let rows = diesel::delete(raid_composition::table.find((raid_id, to_db_id(member_id))))
                .execute(connection)?;
            Ok(rows > 0)
        })
        .await
    }

    async fn list_assignments(&self, raid_id: Uuid) -> Result<Vec<CompositionAssignment>, Error> {
        self.run(move |connection| {
            raid_composition::table
                .filter(raid_composition::raid_id.eq(raid_id))
                .order(raid_composition::member_id.asc())
                .select(CompositionRow::as_select())
                .load(connection)?
                .into_iter()
                .map(CompositionAssignment::try_from)
                .collect()
        })
        .await
    }

    async fn upsert_character(&self, character: &Character) -> Result<Character, Error> {
        let row = CharacterRow::try_from(character)?;

        self.run(move |connection| {
            let row = diesel::insert_into(raid_character::table)
                .values(&row)
                .on_conflict((raid_character::user_id, raid_character::name))
                .do_update()
                .set(&row)
                .returning(CharacterRow::as_returning())
                .get_result(connection)?;
            Character::try_from(row)
        })
        .await
    }

    async fn find_character(&self, character_id: Uuid) -> Result<Option<Character>, Error> {
        self.run(move |connection| {
            raid_character::table
                .find(character_id)
                .select(CharacterRow::as_select())
                .first(connection)
                .optional()?
                .map(Character::try_from)
                .transpose()
        })
        .await
    }

    async fn find_character_by_name(
        &self,
        user_id: MemberId,
        name: &str,
    ) -> Result<Option<Character>, Error> {
        let name = name.to_string();

        self.run(move |connection| {
            raid_character::table
                .filter(raid_character::user_id.eq(to_db_id(user_id)))
                .filter(raid_character::name.eq(name))
                .select(CharacterRow::as_select())
                .first(connection)
                .optional()?
                .map(Character::try_from)
                .transpose()
        })
        .await
    }

    async fn list_characters(&self, user_id: MemberId) -> Result<Vec<Character>, Error> {
        self.run(move |connection| {
            raid_character::table
                .filter(raid_character::user_id.eq(to_db_id(user_id)))
                .order(raid_character::name.asc())
                .select(CharacterRow::as_select())
                .load(connection)?
                .into_iter()
                .map(Character::try_from)
                .collect()
        })
        .await
    }

    async fn find_user_settings(&self, user_id: MemberId) -> Result<Option<UserSettings>, Error> {
        self.run(move |connection| {
            let row = user_settings::table
                .find(to_db_id(user_id))
                .select(UserSettingsRow::as_select())
                .first(connection)
                .optional()?;
            Ok(row.map(UserSettings::from))
        })
        .await
    }

    async fn upsert_user_settings(&self, settings: &UserSettings) -> Result<UserSettings, Error> {
        let row = UserSettingsRow::from(settings);

        self.run(move |connection| {
            let row = diesel::insert_into(user_settings::table)
                .values(&row)
                .on_conflict(user_settings::user_id)
                .do_update()
                .set(&row)
                .returning(UserSettingsRow::as_returning())
                .get_result(connection)?;
            Ok(UserSettings::from(row))
        })
        .await
    }
}
