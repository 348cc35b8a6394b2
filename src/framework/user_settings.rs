use std::sync::Arc;

use chrono::DateTime;
use chrono::NaiveDateTime;
use chrono::Utc;
use tracing::info;
use tracing::warn;

use super::timezone;
use super::MemberId;
use crate::database::Store;
use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSettings {
    pub user_id: MemberId,
    /// IANA zone id, empty until the user picks one.
    pub time_zone: String,
    pub last_updated: DateTime<Utc>,
}

impl UserSettings {
    pub fn new(user_id: MemberId) -> Self {
        Self {
            user_id,
            time_zone: String::new(),
            last_updated: Utc::now(),
        }
    }
}

pub struct UserSettingsService {
    store: Arc<dyn Store>,
}

impl UserSettingsService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Settings for the user, created on first access.
    pub async fn get(&self, user_id: MemberId) -> Result<UserSettings, Error> {
        match self.store.find_user_settings(user_id).await? {
            Some(settings) => Ok(settings),
            None => self.store.upsert_user_settings(&UserSettings::new(user_id)).await,
        }
    }

    pub async fn set_timezone(
        &self,
        user_id: MemberId,
        zone_id: &str,
    ) -> Result<UserSettings, Error> {
        let zone_id = zone_id.trim();
        if !timezone::is_known_zone(zone_id) {
            return Err(Error::UnknownZone {
                zone: zone_id.to_string(),
            });
        }

        let mut settings = self.get(user_id).await?;
        settings.time_zone = zone_id.to_string();
        settings.last_updated = Utc::now();

        let settings = self.store.upsert_user_settings(&settings).await?;
        info!(user_id, zone = %settings.time_zone, "Time zone updated");

        Ok(settings)
    }

    pub async fn has_timezone(&self, user_id: MemberId) -> Result<bool, Error> {
        Ok(self
            .store
            .find_user_settings(user_id)
            .await?
            .is_some_and(|s| !s.time_zone.is_empty()))
    }

    /// Converts a local time in the user's zone to UTC.
    pub async fn to_utc(
        &self,
        user_id: MemberId,
        local: NaiveDateTime,
    ) -> Result<DateTime<Utc>, Error> {
        let settings = self.get(user_id).await?;

        match timezone::to_utc(&settings.time_zone, local) {
            Err(Error::UnknownZone { zone }) => {
                // zone ids can disappear from the tz database between releases
                warn!(user_id, %zone, "Stored time zone no longer known, assuming UTC");
                timezone::to_utc("", local)
            }
            other => other,
        }
    }
}
