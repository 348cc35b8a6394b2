use poise::serenity_prelude as serenity;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Raid not found: {raid_id}")]
    RaidNotFound { raid_id: Uuid },
    #[error("Character not found or not owned by you: {character_id}")]
    CharacterNotFound { character_id: Uuid },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Raid time must be in the future")]
    ScheduleInPast,
    #[error("Unknown time zone: {zone}")]
    UnknownZone { zone: String },
    #[error("You need to set your time zone first with `/settings timezone`")]
    TimezoneRequired,
    #[error("Message unavailable: {0}")]
    MessageUnavailable(String),
    #[error("Error with serenity: {0}")]
    SerenityError(#[from] serenity::Error),
    #[error("Error operating with settings: {0}")]
    ConfigError(#[from] config::ConfigError),
    #[error("Error formatting: {0}")]
    FmtError(#[from] std::fmt::Error),
    #[error("Error parsing schedule: {source}")]
    CronError {
        #[from]
        source: cron::error::Error,
    },
    #[error("Error encoding jobs: {source}")]
    JsonError {
        #[from]
        source: serde_json::Error,
    },
    #[error("Error with diesel: {source}")]
    DieselError {
        #[from]
        source: diesel::result::Error,
    },
    #[error("Error with r2d2: {source}")]
    R2d2Error {
        #[from]
        source: r2d2::Error,
    },
    #[error("Background task failed: {source}")]
    JoinError {
        #[from]
        source: tokio::task::JoinError,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Errors caused by what the user asked for, as opposed to failures of
    /// the bot or its backing services.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::RaidNotFound { .. }
                | Error::CharacterNotFound { .. }
                | Error::InvalidInput(_)
                | Error::ScheduleInPast
                | Error::UnknownZone { .. }
                | Error::TimezoneRequired
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_are_user_facing() {
        let err = Error::RaidNotFound {
            raid_id: Uuid::nil(),
        };

        assert!(err.is_user_facing());
        assert!(!Error::MessageUnavailable("gone".into()).is_user_facing());
    }
}
