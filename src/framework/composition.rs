use std::collections::BTreeMap;
use std::fmt::Display;
use std::fmt::Formatter;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use tracing::info;
use tracing::warn;
use uuid::Uuid;

use super::attendance::AttendanceRecord;
use super::attendance::AttendanceStatus;
use super::notification::Change;
use super::notification::ChangeNotifier;
use super::MemberId;
use crate::database::Store;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Job {
    Pld,
    War,
    Drk,
    Gnb,
    Whm,
    Sch,
    Ast,
    Sge,
    Mnk,
    Drg,
    Nin,
    Sam,
    Rpr,
    Brd,
    Mch,
    Dnc,
    Blm,
    Smn,
    Rdm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Tank,
    Healer,
    Dps,
}

/// Job to role classification. Every job must have exactly one entry.
const ROLE_TABLE: [(Job, Role); 19] = [
    (Job::Pld, Role::Tank),
    (Job::War, Role::Tank),
    (Job::Drk, Role::Tank),
    (Job::Gnb, Role::Tank),
    (Job::Whm, Role::Healer),
    (Job::Sch, Role::Healer),
    (Job::Ast, Role::Healer),
    (Job::Sge, Role::Healer),
    (Job::Mnk, Role::Dps),
    (Job::Drg, Role::Dps),
    (Job::Nin, Role::Dps),
    (Job::Sam, Role::Dps),
    (Job::Rpr, Role::Dps),
    (Job::Brd, Role::Dps),
    (Job::Mch, Role::Dps),
    (Job::Dnc, Role::Dps),
    (Job::Blm, Role::Dps),
    (Job::Smn, Role::Dps),
    (Job::Rdm, Role::Dps),
];

/// A full party: 2 tanks, 2 healers, 4 DPS.
pub const TARGET_COMPOSITION: [(Role, usize); 3] =
    [(Role::Tank, 2), (Role::Healer, 2), (Role::Dps, 4)];

impl Job {
    pub const ALL: [Job; 19] = [
        Job::Pld,
        Job::War,
        Job::Drk,
        Job::Gnb,
        Job::Whm,
        Job::Sch,
        Job::Ast,
        Job::Sge,
        Job::Mnk,
        Job::Drg,
        Job::Nin,
        Job::Sam,
        Job::Rpr,
        Job::Brd,
        Job::Mch,
        Job::Dnc,
        Job::Blm,
        Job::Smn,
        Job::Rdm,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Job::Pld => "PLD",
            Job::War => "WAR",
            Job::Drk => "DRK",
            Job::Gnb => "GNB",
            Job::Whm => "WHM",
            Job::Sch => "SCH",
            Job::Ast => "AST",
            Job::Sge => "SGE",
            Job::Mnk => "MNK",
            Job::Drg => "DRG",
            Job::Nin => "NIN",
            Job::Sam => "SAM",
            Job::Rpr => "RPR",
            Job::Brd => "BRD",
            Job::Mch => "MCH",
            Job::Dnc => "DNC",
            Job::Blm => "BLM",
            Job::Smn => "SMN",
            Job::Rdm => "RDM",
        }
    }

    pub fn role(self) -> Option<Role> {
        ROLE_TABLE
            .iter()
            .find(|(job, _)| *job == self)
            .map(|(_, role)| *role)
    }
}

impl Display for Job {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Job {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Job::ALL
            .into_iter()
            .find(|job| job.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidInput(format!("Unknown job: {}", s)))
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::Tank => "Tank",
            Role::Healer => "Healer",
            Role::Dps => "DPS",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionAssignment {
    pub raid_id: Uuid,
    pub member_id: MemberId,
    pub character_id: Uuid,
    pub job: Job,
    /// Free-text slot label, e.g. "MT" or "main healer".
    pub sub_role: Option<String>,
}

/// Counts assignments per role. All three roles are always present.
pub fn tally(assignments: &[CompositionAssignment]) -> BTreeMap<Role, usize> {
    let mut counts: BTreeMap<Role, usize> =
        TARGET_COMPOSITION.iter().map(|(role, _)| (*role, 0)).collect();

    for assignment in assignments {
        match assignment.job.role() {
            Some(role) => *counts.entry(role).or_default() += 1,
            None => warn!(job = %assignment.job, "Job has no role classification"),
        }
    }

    counts
}

pub fn matches_target(counts: &BTreeMap<Role, usize>) -> bool {
    TARGET_COMPOSITION
        .iter()
        .all(|(role, wanted)| counts.get(role).copied().unwrap_or_default() == *wanted)
}

pub struct CompositionManager {
    store: Arc<dyn Store>,
    changes: ChangeNotifier,
}

impl CompositionManager {
    pub fn new(store: Arc<dyn Store>, changes: ChangeNotifier) -> Self {
        Self { store, changes }
    }

    /// Puts the member's character into a job slot for the raid and
    /// confirms the member's attendance in the same write.
    pub async fn assign_role(
        &self,
        raid_id: Uuid,
        member_id: MemberId,
        character_id: Uuid,
        job: Job,
        sub_role: Option<String>,
    ) -> Result<CompositionAssignment, Error> {
        if self.store.find_raid(raid_id).await?.is_none() {
            return Err(Error::RaidNotFound { raid_id });
        }

        let character = match self.store.find_character(character_id).await? {
            Some(character) if character.user_id == member_id => character,
            _ => return Err(Error::CharacterNotFound { character_id }),
        };

        let assignment = CompositionAssignment {
            raid_id,
            member_id,
            character_id,
            job,
            sub_role,
        };
        let confirm = AttendanceRecord::new(
            raid_id,
            member_id,
            character.name.clone(),
            AttendanceStatus::Confirmed,
            None,
        );

        let assignment = self.store.assign(&assignment, &confirm).await?;

        info!(%raid_id, member_id, %job, character = %character.name, "Job assigned");
        self.changes.notify(raid_id, Change::Composition);

        Ok(assignment)
    }

    /// Returns false when the member had no assignment.
    pub async fn remove_assignment(
        &self,
        raid_id: Uuid,
        member_id: MemberId,
    ) -> Result<bool, Error> {
        let removed = self.store.delete_assignment(raid_id, member_id).await?;

        if removed {
            info!(%raid_id, member_id, "Job assignment removed");
            self.changes.notify(raid_id, Change::Composition);
        }

        Ok(removed)
    }

    /// Takes the member's character out of the lineup. The character must
    /// belong to the member. Returns false when that character is not the
    /// one assigned.
    pub async fn remove_character(
        &self,
        raid_id: Uuid,
        member_id: MemberId,
        character_id: Uuid,
    ) -> Result<bool, Error> {
        if self.store.find_raid(raid_id).await?.is_none() {
            return Err(Error::RaidNotFound { raid_id });
        }

        match self.store.find_character(character_id).await? {
            Some(character) if character.user_id == member_id => {}
            _ => return Err(Error::CharacterNotFound { character_id }),
        }

        let assigned = self
            .assignments(raid_id)
            .await?
            .iter()
            .any(|a| a.member_id == member_id && a.character_id == character_id);
        if !assigned {
            return Ok(false);
        }

        self.remove_assignment(raid_id, member_id).await
    }

    pub async fn assignments(&self, raid_id: Uuid) -> Result<Vec<CompositionAssignment>, Error> {
        self.store.list_assignments(raid_id).await
    }

    pub async fn role_counts(&self, raid_id: Uuid) -> Result<BTreeMap<Role, usize>, Error> {
        Ok(tally(&self.assignments(raid_id).await?))
    }

    pub async fn is_valid_composition(&self, raid_id: Uuid) -> Result<bool, Error> {
        Ok(matches_target(&self.role_counts(raid_id).await?))
    }
}
