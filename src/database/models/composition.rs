use uuid::Uuid;

use super::from_db_id;
use super::to_db_id;
use crate::database::schema::raid_composition;
use crate::error::Error;
use crate::framework::composition::CompositionAssignment;

#[derive(Queryable, Selectable, Insertable, Clone, Debug)]
#[diesel(table_name = raid_composition)]
pub struct CompositionRow {
    pub raid_id: Uuid,
    pub member_id: i64,
    pub character_id: Uuid,
    pub job: String,
    pub sub_role: Option<String>,
}

impl From<&CompositionAssignment> for CompositionRow {
    fn from(assignment: &CompositionAssignment) -> Self {
        Self {
            raid_id: assignment.raid_id,
            member_id: to_db_id(assignment.member_id),
            character_id: assignment.character_id,
            job: assignment.job.code().to_string(),
            sub_role: assignment.sub_role.clone(),
        }
    }
}

impl TryFrom<CompositionRow> for CompositionAssignment {
    type Error = Error;

    fn try_from(row: CompositionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            raid_id: row.raid_id,
            member_id: from_db_id(row.member_id),
            character_id: row.character_id,
            job: row.job.parse()?,
            sub_role: row.sub_role,
        })
    }
}
