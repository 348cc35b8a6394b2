use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use super::composition::Job;
use super::MemberId;
use crate::database::Store;
use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Character {
    pub id: Uuid,
    pub user_id: MemberId,
    pub name: String,
    pub world: String,
    pub preferred_job: Job,
    pub secondary_jobs: Vec<Job>,
}

impl Character {
    pub fn new(
        user_id: MemberId,
        name: impl Into<String>,
        world: impl Into<String>,
        preferred_job: Job,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            world: world.into(),
            preferred_job,
            secondary_jobs: Vec::new(),
        }
    }
}

impl Display for Character {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let secondary = if self.secondary_jobs.is_empty() {
            "None".to_string()
        } else {
            self.secondary_jobs
                .iter()
                .map(Job::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };

        write!(
            f,
            "{} @ {} (ID: {}) Preferred: {} Secondary: {}",
            self.name,
            self.world,
            self.id.simple(),
            self.preferred_job,
            secondary
        )
    }
}

/// Parses a comma separated list of job codes.
pub fn parse_jobs(list: &str) -> Result<Vec<Job>, Error> {
    list.split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::parse)
        .collect()
}

pub struct CharacterRegistry {
    store: Arc<dyn Store>,
}

impl CharacterRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Registers a character, or updates the jobs of the user's character
    /// with the same name. Secondary jobs are kept when none are given.
    pub async fn register(
        &self,
        user_id: MemberId,
        name: &str,
        world: &str,
        preferred_job: Job,
        secondary_jobs: Option<Vec<Job>>,
    ) -> Result<Character, Error> {
        let character = match self.store.find_character_by_name(user_id, name).await? {
            Some(mut existing) => {
                existing.preferred_job = preferred_job;
                if let Some(secondary_jobs) = secondary_jobs {
                    existing.secondary_jobs = secondary_jobs;
                }
                existing
            }
            None => {
                let mut character = Character::new(user_id, name, world, preferred_job);
                character.secondary_jobs = secondary_jobs.unwrap_or_default();
                character
            }
        };

        let character = self.store.upsert_character(&character).await?;
        info!(user_id, character = %character.name, "Character registered");

        Ok(character)
    }

    pub async fn get(&self, character_id: Uuid) -> Result<Character, Error> {
        self.store
            .find_character(character_id)
            .await?
            .ok_or(Error::CharacterNotFound { character_id })
    }

    /// Like [`get`](Self::get), but only succeeds for the owner.
    pub async fn get_owned(
        &self,
        character_id: Uuid,
        user_id: MemberId,
    ) -> Result<Character, Error> {
        let character = self.get(character_id).await?;

        if character.user_id != user_id {
            return Err(Error::CharacterNotFound { character_id });
        }

        Ok(character)
    }

    pub async fn list_for_user(&self, user_id: MemberId) -> Result<Vec<Character>, Error> {
        self.store.list_characters(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;

    #[tokio::test]
    async fn re_registering_updates_jobs_in_place() {
        let registry = CharacterRegistry::new(Arc::new(MemoryStore::default()));

        let first = registry
            .register(1, "Wuk Lamat", "Tonberry", Job::Pld, Some(vec![Job::War]))
            .await
            .unwrap();
        let second = registry
            .register(1, "Wuk Lamat", "Tonberry", Job::Gnb, None)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.preferred_job, Job::Gnb);
        assert_eq!(second.secondary_jobs, vec![Job::War]);
        assert_eq!(registry.list_for_user(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn owned_lookup_rejects_other_users() {
        let registry = CharacterRegistry::new(Arc::new(MemoryStore::default()));
        let character = registry
            .register(1, "Erenville", "Ultros", Job::Brd, None)
            .await
            .unwrap();

        assert!(registry.get_owned(character.id, 1).await.is_ok());
        assert!(matches!(
            registry.get_owned(character.id, 2).await,
            Err(Error::CharacterNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn racing_registrations_keep_one_character() {
        let store = Arc::new(MemoryStore::default());

        // both writers missed each other's lookup and minted their own id
        let first = store
            .upsert_character(&Character::new(1, "Krile", "Ultros", Job::Sch))
            .await
            .unwrap();
        let second = store
            .upsert_character(&Character::new(1, "Krile", "Ultros", Job::Sge))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        let characters = store.list_characters(1).await.unwrap();
        assert_eq!(characters.len(), 1);
        assert_eq!(characters[0].preferred_job, Job::Sge);
    }

    #[test]
    fn job_lists_reject_unknown_codes() {
        assert_eq!(parse_jobs("whm, sch,").unwrap(), vec![Job::Whm, Job::Sch]);
        assert!(parse_jobs("whm, xyz").is_err());
    }
}
