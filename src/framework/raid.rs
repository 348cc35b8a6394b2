use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;
use uuid::Uuid;

use super::attendance::AttendanceRecord;
use super::attendance::AttendanceStatus;
use super::composition::CompositionAssignment;
use super::composition::Role;
use super::notification::ColorHint;
use super::notification::MessageContent;
use super::notification::MessageHandle;
use super::notification::NotificationHub;
use super::notification::RaidChanged;
use super::ChannelId;
use super::GuildId;
use crate::database::MessageKind;
use crate::database::RaidFilter;
use crate::database::Store;
use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raid {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// Always UTC, whatever zone the creator entered it in.
    pub scheduled: DateTime<Utc>,
    pub location: String,
    pub archived: bool,
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message: Option<MessageHandle>,
    pub reminder_message: Option<MessageHandle>,
    pub final_reminder_message: Option<MessageHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaidState {
    Scheduled,
    Archived,
}

impl Raid {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        scheduled: DateTime<Utc>,
        location: impl Into<String>,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            scheduled,
            location: location.into(),
            archived: false,
            guild_id,
            channel_id,
            message: None,
            reminder_message: None,
            final_reminder_message: None,
        }
    }

    pub fn state(&self) -> RaidState {
        if self.archived {
            RaidState::Archived
        } else {
            RaidState::Scheduled
        }
    }

    pub fn message(&self, kind: MessageKind) -> Option<MessageHandle> {
        match kind {
            MessageKind::Raid => self.message,
            MessageKind::Reminder => self.reminder_message,
            MessageKind::FinalReminder => self.final_reminder_message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineupEntry {
    pub assignment: CompositionAssignment,
    pub character_name: String,
}

/// A raid together with everything needed to display it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaidDetails {
    pub raid: Raid,
    pub attendance: Vec<AttendanceRecord>,
    pub lineup: Vec<LineupEntry>,
}

pub struct RaidLifecycle {
    store: Arc<dyn Store>,
    hub: Arc<dyn NotificationHub>,
}

impl RaidLifecycle {
    pub fn new(store: Arc<dyn Store>, hub: Arc<dyn NotificationHub>) -> Self {
        Self { store, hub }
    }

    /// Stores a new raid. `scheduled` must already be converted to UTC.
    pub async fn create(
        &self,
        name: &str,
        description: &str,
        scheduled: DateTime<Utc>,
        location: &str,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Raid, Error> {
        let raid = Raid::new(name, description, scheduled, location, guild_id, channel_id);
        let raid = self.store.insert_raid(&raid).await?;

        info!(raid_id = %raid.id, guild_id, scheduled = %raid.scheduled, "Raid created");

        Ok(raid)
    }

    pub async fn find(&self, raid_id: Uuid) -> Result<Raid, Error> {
        self.store
            .find_raid(raid_id)
            .await?
            .ok_or(Error::RaidNotFound { raid_id })
    }

    pub async fn get(&self, raid_id: Uuid) -> Result<RaidDetails, Error> {
        let raid = self.find(raid_id).await?;
        let attendance = self.store.list_attendance(raid_id, None).await?;
        let assignments = self.store.list_assignments(raid_id).await?;

        let mut lineup = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let character_name = match self.store.find_character(assignment.character_id).await? {
                Some(character) => character.name,
                None => attendance
                    .iter()
                    .find(|r| r.member_id == assignment.member_id)
                    .map(|r| r.member_name.clone())
                    .unwrap_or_else(|| assignment.member_id.to_string()),
            };
            lineup.push(LineupEntry {
                assignment,
                character_name,
            });
        }

        Ok(RaidDetails {
            raid,
            attendance,
            lineup,
        })
    }

    /// Unarchived raids of the guild scheduled after now, soonest first.
    pub async fn list_upcoming(&self, guild_id: GuildId) -> Result<Vec<Raid>, Error> {
        let filter = RaidFilter::new()
            .guild(guild_id)
            .archived(false)
            .scheduled_after(Utc::now());

        self.store.list_raids(filter).await
    }

    /// Archiving is one-way. Archiving an archived raid is a no-op.
    pub async fn archive(&self, raid_id: Uuid) -> Result<Raid, Error> {
        let raid = self
            .store
            .archive_raid(raid_id)
            .await?
            .ok_or(Error::RaidNotFound { raid_id })?;

        info!(%raid_id, "Raid archived");

        if raid.message.is_some() {
            if let Err(e) = self.render(raid_id).await {
                warn!(%raid_id, error = %e, "Failed to refresh archived raid message");
            }
        }

        Ok(raid)
    }

    /// Removes the raid with its attendance and composition, then tries to
    /// clean up the messages that were posted for it.
    pub async fn delete(&self, raid_id: Uuid) -> Result<Raid, Error> {
        let raid = self
            .store
            .delete_raid(raid_id)
            .await?
            .ok_or(Error::RaidNotFound { raid_id })?;

        info!(%raid_id, "Raid deleted");

        let handles = [
            MessageKind::Raid,
            MessageKind::Reminder,
            MessageKind::FinalReminder,
        ]
        .into_iter()
        .filter_map(|kind| raid.message(kind));

        for handle in handles {
            if let Err(e) = self.hub.delete(raid.channel_id, handle).await {
                warn!(%raid_id, %handle, error = %e, "Could not delete raid message");
            }
        }

        Ok(raid)
    }

    /// Brings the raid's public message up to date, posting a fresh one when
    /// there is none or the old one can no longer be edited.
    pub async fn render(&self, raid_id: Uuid) -> Result<MessageHandle, Error> {
        let details = self.get(raid_id).await?;
        let content = display(&details);
        let raid = &details.raid;

        if let Some(handle) = raid.message {
            match self.hub.update(raid.channel_id, handle, &content).await {
                Ok(()) => {
                    debug!(%raid_id, %handle, "Raid message updated");
                    return Ok(handle);
                }
                Err(e) => {
                    warn!(
                        %raid_id,
                        %handle,
                        error = %e,
                        "Raid message update failed, sending a new one"
                    );
                }
            }
        }

        let handle = self.hub.send(raid.channel_id, &content).await?;
        if let Err(e) = self
            .store
            .set_message(raid_id, MessageKind::Raid, Some(handle))
            .await
        {
            if matches!(e, Error::RaidNotFound { .. }) {
                // deleted while the message was being posted
                warn!(%raid_id, %handle, "Raid is gone, removing its new message");
                if let Err(e) = self.hub.delete(raid.channel_id, handle).await {
                    warn!(%raid_id, %handle, error = %e, "Could not delete raid message");
                }
            }
            return Err(e);
        }
        debug!(%raid_id, %handle, "Raid message sent");

        Ok(handle)
    }

    /// Re-renders raids as change signals arrive. Signals that queue up while
    /// a render is in flight are merged, so each raid renders once per batch.
    pub async fn run_renderer(self: Arc<Self>, mut changes: mpsc::UnboundedReceiver<RaidChanged>) {
        while let Some(first) = changes.recv().await {
            let mut pending = BTreeSet::new();
            let mut next = Some(first);
            while let Some(changed) = next {
                debug!(raid_id = %changed.raid_id, change = ?changed.change, "Raid changed");
                pending.insert(changed.raid_id);
                next = changes.try_recv().ok();
            }

            for raid_id in pending {
                match self.render(raid_id).await {
                    Ok(_) => {}
                    Err(Error::RaidNotFound { .. }) => {
                        debug!(%raid_id, "Raid gone before it could be rendered");
                    }
                    Err(e) => error!(%raid_id, error = %e, "Failed to render raid"),
                }
            }
        }

        debug!("Raid change channel closed, renderer stopping");
    }
}

/// Builds the public raid message: schedule, RSVP counts and the lineup
/// grouped by role.
pub fn display(details: &RaidDetails) -> MessageContent {
    let raid = &details.raid;

    let title = match raid.state() {
        RaidState::Scheduled => raid.name.clone(),
        RaidState::Archived => format!("{} (archived)", raid.name),
    };

    let mut counts: BTreeMap<AttendanceStatus, usize> = BTreeMap::new();
    for record in &details.attendance {
        *counts.entry(record.status).or_default() += 1;
    }
    let summary = AttendanceStatus::ALL
        .iter()
        .map(|status| format!("{}: {}", status, counts.get(status).copied().unwrap_or(0)))
        .collect::<Vec<_>>()
        .join("\n");

    let mut content = MessageContent::new(title, raid.description.clone(), ColorHint::Blue)
        .field("Time", raid.scheduled.format("%Y-%m-%d %H:%M UTC").to_string(), true)
        .field("Location", raid.location.clone(), true)
        .field("Attendance", summary, false);

    let roles = [
        (Role::Tank, "Tanks"),
        (Role::Healer, "Healers"),
        (Role::Dps, "DPS"),
    ];
    for (role, name) in roles {
        let lines = details
            .lineup
            .iter()
            .filter(|e| e.assignment.job.role() == Some(role))
            .map(|entry| match &entry.assignment.sub_role {
                Some(sub_role) => format!(
                    "{} - {} ({})",
                    entry.assignment.job, entry.character_name, sub_role
                ),
                None => format!("{} - {}", entry.assignment.job, entry.character_name),
            })
            .collect::<Vec<_>>();

        let value = if lines.is_empty() {
            "None".to_string()
        } else {
            lines.join("\n")
        };
        content = content.field(name, value, true);
    }

    content
        .footer(format!("Raid ID: {}", raid.id))
        .timestamp(raid.scheduled)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Duration;

    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::framework::character::Character;
    use crate::framework::composition::Job;
    use crate::framework::notification::tests::HubCall;
    use crate::framework::notification::tests::RecordingHub;
    use crate::framework::notification::Change;

    /// Deletes the raid while its message is being posted.
    struct DeletingHub {
        store: Arc<MemoryStore>,
        raid_id: Uuid,
        inner: RecordingHub,
    }

    #[async_trait]
    impl NotificationHub for DeletingHub {
        async fn send(
            &self,
            channel_id: ChannelId,
            content: &MessageContent,
        ) -> Result<MessageHandle, Error> {
            self.store.delete_raid(self.raid_id).await?;
            self.inner.send(channel_id, content).await
        }

        async fn update(
            &self,
            channel_id: ChannelId,
            handle: MessageHandle,
            content: &MessageContent,
        ) -> Result<(), Error> {
            self.inner.update(channel_id, handle, content).await
        }

        async fn delete(&self, channel_id: ChannelId, handle: MessageHandle) -> Result<(), Error> {
            self.inner.delete(channel_id, handle).await
        }
    }

    fn setup() -> (Arc<MemoryStore>, Arc<RecordingHub>, RaidLifecycle) {
        let store = Arc::new(MemoryStore::default());
        let hub = Arc::new(RecordingHub::default());
        let lifecycle = RaidLifecycle::new(store.clone(), hub.clone());
        (store, hub, lifecycle)
    }

    async fn create(
        lifecycle: &RaidLifecycle,
        name: &str,
        offset: Duration,
        guild: GuildId,
    ) -> Raid {
        lifecycle
            .create(name, "", Utc::now() + offset, "Pandaemonium", guild, 20)
            .await
            .unwrap()
    }

    async fn assign(store: &MemoryStore, raid_id: Uuid, member_id: u64, name: &str, job: Job) {
        let character = store
            .upsert_character(&Character::new(member_id, name, "Phoenix", job))
            .await
            .unwrap();
        let assignment = CompositionAssignment {
            raid_id,
            member_id,
            character_id: character.id,
            job,
            sub_role: None,
        };
        let confirm =
            AttendanceRecord::new(raid_id, member_id, name, AttendanceStatus::Confirmed, None);
        store.assign(&assignment, &confirm).await.unwrap();
    }

    #[tokio::test]
    async fn upcoming_skips_past_and_archived_raids() {
        let (_store, _hub, lifecycle) = setup();

        create(&lifecycle, "past", -Duration::days(1), 1).await;
        let later = create(&lifecycle, "later", Duration::days(2), 1).await;
        let soon = create(&lifecycle, "soon", Duration::days(1), 1).await;
        let archived = create(&lifecycle, "archived", Duration::days(3), 1).await;
        create(&lifecycle, "other guild", Duration::days(1), 2).await;
        lifecycle.archive(archived.id).await.unwrap();

        let ids: Vec<_> = lifecycle
            .list_upcoming(1)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();

        assert_eq!(ids, vec![soon.id, later.id]);
    }

    #[tokio::test]
    async fn archive_is_one_way_and_idempotent() {
        let (_store, _hub, lifecycle) = setup();
        let raid = create(&lifecycle, "Extreme", Duration::days(1), 1).await;

        assert_eq!(lifecycle.archive(raid.id).await.unwrap().state(), RaidState::Archived);
        assert_eq!(lifecycle.archive(raid.id).await.unwrap().state(), RaidState::Archived);
        assert!(matches!(
            lifecycle.archive(Uuid::new_v4()).await,
            Err(Error::RaidNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn delete_cascades_and_removes_message() {
        let (store, hub, lifecycle) = setup();
        let raid = create(&lifecycle, "Savage", Duration::days(1), 1).await;
        assign(&store, raid.id, 1, "Y'shtola", Job::Blm).await;
        store
            .upsert_attendance(&AttendanceRecord::new(
                raid.id,
                2,
                "Alisaie",
                AttendanceStatus::Pending,
                None,
            ))
            .await
            .unwrap();
        let handle = lifecycle.render(raid.id).await.unwrap();

        lifecycle.delete(raid.id).await.unwrap();

        assert!(store.find_raid(raid.id).await.unwrap().is_none());
        assert!(store.list_attendance(raid.id, None).await.unwrap().is_empty());
        assert!(store.list_assignments(raid.id).await.unwrap().is_empty());
        assert_eq!(hub.calls().last(), Some(&HubCall::Delete(20, handle)));
    }

    #[tokio::test]
    async fn delete_swallows_message_removal_failure() {
        let (store, hub, lifecycle) = setup();
        let raid = create(&lifecycle, "Savage", Duration::days(1), 1).await;
        lifecycle.render(raid.id).await.unwrap();
        *hub.fail_deletes.lock().unwrap() = true;

        assert!(lifecycle.delete(raid.id).await.is_ok());
        assert!(store.find_raid(raid.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn render_sends_then_updates_then_repairs() {
        let (store, hub, lifecycle) = setup();
        let raid = create(&lifecycle, "Unreal", Duration::days(1), 1).await;

        let first = lifecycle.render(raid.id).await.unwrap();
        let second = lifecycle.render(raid.id).await.unwrap();
        assert_eq!(first, second);
        assert!(matches!(hub.calls()[1], HubCall::Update(20, h, _) if h == first));

        *hub.fail_updates.lock().unwrap() = true;
        let repaired = lifecycle.render(raid.id).await.unwrap();

        assert_ne!(repaired, first);
        assert_eq!(hub.sends().len(), 2);
        assert_eq!(store.find_raid(raid.id).await.unwrap().unwrap().message, Some(repaired));
    }

    #[tokio::test]
    async fn message_posted_for_a_deleted_raid_is_removed() {
        let store = Arc::new(MemoryStore::default());
        let raid = store
            .insert_raid(&Raid::new("Savage", "", Utc::now() + Duration::days(1), "", 1, 20))
            .await
            .unwrap();
        let hub = Arc::new(DeletingHub {
            store: store.clone(),
            raid_id: raid.id,
            inner: RecordingHub::default(),
        });
        let lifecycle = RaidLifecycle::new(store.clone(), hub.clone());

        let result = lifecycle.render(raid.id).await;

        assert!(matches!(result, Err(Error::RaidNotFound { .. })));
        let calls = hub.inner.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[0], HubCall::Send(20, _)));
        assert_eq!(calls[1], HubCall::Delete(20, MessageHandle(1001)));
    }

    #[tokio::test]
    async fn display_groups_lineup_by_role() {
        let (store, _hub, lifecycle) = setup();
        let raid = create(&lifecycle, "Savage", Duration::days(1), 1).await;
        assign(&store, raid.id, 1, "Estinien", Job::Drg).await;
        assign(&store, raid.id, 2, "Alphinaud", Job::Sch).await;
        store
            .upsert_attendance(&AttendanceRecord::new(
                raid.id,
                3,
                "Zero",
                AttendanceStatus::Declined,
                None,
            ))
            .await
            .unwrap();

        let content = display(&lifecycle.get(raid.id).await.unwrap());

        assert_eq!(content.find_field("Tanks").unwrap().value, "None");
        assert_eq!(content.find_field("Healers").unwrap().value, "SCH - Alphinaud");
        assert_eq!(content.find_field("DPS").unwrap().value, "DRG - Estinien");
        let summary = &content.find_field("Attendance").unwrap().value;
        assert!(summary.contains("Confirmed: 2"));
        assert!(summary.contains("Declined: 1"));
        assert_eq!(content.footer, Some(format!("Raid ID: {}", raid.id)));
        assert_eq!(content.color, ColorHint::Blue);
    }

    #[tokio::test]
    async fn renderer_merges_queued_changes() {
        let (_store, hub, lifecycle) = setup();
        let lifecycle = Arc::new(lifecycle);
        let raid = create(&lifecycle, "Savage", Duration::days(1), 1).await;
        let (tx, rx) = mpsc::unbounded_channel();

        for change in [Change::Attendance, Change::Composition, Change::Attendance] {
            tx.send(RaidChanged {
                raid_id: raid.id,
                change,
            })
            .unwrap();
        }
        drop(tx);

        lifecycle.run_renderer(rx).await;

        assert_eq!(hub.calls().len(), 1);
    }
}
