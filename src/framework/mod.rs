use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::info;

use self::attendance::AttendanceStatus;
use self::attendance::AttendanceTracker;
use self::character::CharacterRegistry;
use self::composition::CompositionManager;
use self::notification::ChangeNotifier;
use self::notification::NotificationHub;
use self::notification::RaidChanged;
use self::raid::Raid;
use self::raid::RaidLifecycle;
use self::user_settings::UserSettingsService;
use crate::database::Store;
use crate::error::Error;

pub mod attendance;
pub mod character;
pub mod composition;
pub mod notification;
pub mod raid;
pub mod reminder;
pub mod timezone;
pub mod user_settings;

/// Chat platform user id.
pub type MemberId = u64;
pub type GuildId = u64;
pub type ChannelId = u64;

/// Everything a command handler needs, wired to one store and one hub.
pub struct Services {
    pub raids: Arc<RaidLifecycle>,
    pub attendance: AttendanceTracker,
    pub composition: CompositionManager,
    pub characters: CharacterRegistry,
    pub user_settings: UserSettingsService,
}

/// A raid as entered by a user, in the user's own time zone.
#[derive(Debug, Clone)]
pub struct RaidDraft {
    pub name: String,
    pub description: String,
    /// `yyyy-MM-dd`
    pub date: String,
    /// `HH:mm`
    pub time: String,
    pub location: String,
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
}

impl Services {
    /// The receiver carries raid change signals and should be handed to
    /// [`RaidLifecycle::run_renderer`].
    pub fn new(
        store: Arc<dyn Store>,
        hub: Arc<dyn NotificationHub>,
    ) -> (Self, mpsc::UnboundedReceiver<RaidChanged>) {
        let (changes, rx) = ChangeNotifier::channel();

        let services = Self {
            raids: Arc::new(RaidLifecycle::new(store.clone(), hub)),
            attendance: AttendanceTracker::new(store.clone(), changes.clone()),
            composition: CompositionManager::new(store.clone(), changes),
            characters: CharacterRegistry::new(store.clone()),
            user_settings: UserSettingsService::new(store),
        };

        (services, rx)
    }

    /// Creates a raid from local date and time input and signs the creator
    /// up as confirmed. Nothing is written unless the input is valid and in
    /// the future.
    pub async fn plan_raid(
        &self,
        creator: u64,
        creator_name: &str,
        draft: RaidDraft,
        now: DateTime<Utc>,
    ) -> Result<Raid, Error> {
        if !self.user_settings.has_timezone(creator).await? {
            return Err(Error::TimezoneRequired);
        }

        let local = timezone::parse_local(&draft.date, &draft.time)?;
        let scheduled = self.user_settings.to_utc(creator, local).await?;
        if scheduled <= now {
            return Err(Error::ScheduleInPast);
        }

        let raid = self
            .raids
            .create(
                &draft.name,
                &draft.description,
                scheduled,
                &draft.location,
                draft.guild_id,
                draft.channel_id,
            )
            .await?;

        // the attendance signal renders the new raid's message
        self.attendance
            .set_status(raid.id, creator, creator_name, AttendanceStatus::Confirmed, None)
            .await?;

        info!(raid_id = %raid.id, creator, "Raid planned");

        Ok(raid)
    }
}
