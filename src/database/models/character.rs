use uuid::Uuid;

use super::from_db_id;
use super::to_db_id;
use crate::database::schema::raid_character;
use crate::error::Error;
use crate::framework::character::Character;
use crate::framework::composition::Job;

#[derive(Queryable, Selectable, Insertable, AsChangeset, Clone, Debug)]
#[diesel(table_name = raid_character)]
pub struct CharacterRow {
    pub id: Uuid,
    pub user_id: i64,
    pub name: String,
    pub world: String,
    pub preferred_job: String,
    /// JSON array of job codes.
    pub secondary_jobs: String,
}

impl TryFrom<&Character> for CharacterRow {
    type Error = Error;

    fn try_from(character: &Character) -> Result<Self, Self::Error> {
        let secondary: Vec<&str> = character.secondary_jobs.iter().map(|j| j.code()).collect();

        Ok(Self {
            id: character.id,
            user_id: to_db_id(character.user_id),
            name: character.name.clone(),
            world: character.world.clone(),
            preferred_job: character.preferred_job.code().to_string(),
            secondary_jobs: serde_json::to_string(&secondary)?,
        })
    }
}

impl TryFrom<CharacterRow> for Character {
    type Error = Error;

    fn try_from(row: CharacterRow) -> Result<Self, Self::Error> {
        let secondary: Vec<String> = serde_json::from_str(&row.secondary_jobs)?;

        Ok(Self {
            id: row.id,
            user_id: from_db_id(row.user_id),
            name: row.name,
            world: row.world,
            preferred_job: row.preferred_job.parse()?,
            secondary_jobs: secondary
                .iter()
                .map(|code| code.parse::<Job>())
                .collect::<Result<Vec<_>, _>>()?,
        })
    }
}
