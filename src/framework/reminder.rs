use std::sync::Arc;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use cron::Schedule;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::attendance::AttendanceStatus;
use super::notification::ColorHint;
use super::notification::MessageContent;
use super::notification::NotificationHub;
use super::notification::RsvpReaction;
use super::raid::Raid;
use crate::database::MessageKind;
use crate::database::RaidFilter;
use crate::database::Store;
use crate::error::Error;
use crate::settings::ReminderSettings;

/// Raids scheduled strictly between `now + start` and `now + end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderWindow {
    pub start: Duration,
    pub end: Duration,
}

impl ReminderWindow {
    pub fn hours(start: i64, end: i64) -> Self {
        Self {
            start: Duration::hours(start),
            end: Duration::hours(end),
        }
    }

    fn filter(&self, now: DateTime<Utc>) -> RaidFilter {
        RaidFilter::new()
            .archived(false)
            .scheduled_after(now + self.start)
            .scheduled_before(now + self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderConfig {
    pub advance: ReminderWindow,
    pub last_call: ReminderWindow,
    /// Remember the final reminder so later sweeps inside the window skip it.
    pub final_reminder_once: bool,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            advance: ReminderWindow::hours(24, 25),
            last_call: ReminderWindow::hours(1, 2),
            final_reminder_once: false,
        }
    }
}

impl From<&ReminderSettings> for ReminderConfig {
    fn from(settings: &ReminderSettings) -> Self {
        Self {
            final_reminder_once: settings.final_reminder_once,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub advance_sent: usize,
    pub final_sent: usize,
    pub failures: usize,
}

pub struct ReminderScheduler {
    config: ReminderConfig,
}

impl ReminderScheduler {
    pub fn new(config: ReminderConfig) -> Self {
        Self { config }
    }

    /// One pass over both reminder windows. A failure for one raid is logged
    /// and counted, and the sweep carries on with the rest.
    pub async fn sweep(
        &self,
        store: &dyn Store,
        hub: &dyn NotificationHub,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, Error> {
        let mut report = SweepReport::default();

        let advance = self
            .config
            .advance
            .filter(now)
            .without_message(MessageKind::Reminder);
        for raid in store.list_raids(advance).await? {
            match send_advance(store, hub, &raid).await {
                Ok(true) => report.advance_sent += 1,
                Ok(false) => debug!(raid_id = %raid.id, "No pending attendees, skipping reminder"),
                Err(e) => {
                    report.failures += 1;
                    error!(
                        raid_id = %raid.id,
                        channel_id = raid.channel_id,
                        error = %e,
                        "Failed to send raid reminder"
                    );
                }
            }
        }

        let mut last_call = self.config.last_call.filter(now);
        if self.config.final_reminder_once {
            last_call = last_call.without_message(MessageKind::FinalReminder);
        }
        for raid in store.list_raids(last_call).await? {
            match self.send_final(store, hub, &raid).await {
                Ok(()) => report.final_sent += 1,
                Err(e) => {
                    report.failures += 1;
                    error!(
                        raid_id = %raid.id,
                        channel_id = raid.channel_id,
                        error = %e,
                        "Failed to send final reminder"
                    );
                }
            }
        }

        Ok(report)
    }

    async fn send_final(
        &self,
        store: &dyn Store,
        hub: &dyn NotificationHub,
        raid: &Raid,
    ) -> Result<(), Error> {
        let content = MessageContent::new(
            format!("Final Reminder: {}", raid.name),
            format!(
                "The raid begins at {}!\n\nSee you there!",
                raid.scheduled.format("%H:%M UTC")
            ),
            ColorHint::Red,
        )
        .footer(format!("Raid ID: {}", raid.id))
        .timestamp(raid.scheduled);

        let handle = hub.send(raid.channel_id, &content).await?;
        if self.config.final_reminder_once {
            store
                .set_message(raid.id, MessageKind::FinalReminder, Some(handle))
                .await?;
        }

        Ok(())
    }

    /// Runs a sweep now and then at every instant of `schedule` until the
    /// returned task is stopped. Sweeps never overlap.
    pub fn spawn(
        self,
        schedule: Schedule,
        store: Arc<dyn Store>,
        hub: Arc<dyn NotificationHub>,
    ) -> ReminderTask {
        let (stop, mut stopped) = watch::channel(false);

        let handle = tokio::spawn(async move {
            self.run_sweep(store.as_ref(), hub.as_ref()).await;

            loop {
                let Some(next) = schedule.upcoming(Utc).next() else {
                    warn!("Reminder schedule has no upcoming runs");
                    break;
                };
                let wait = (next - Utc::now()).to_std().unwrap_or_default();

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        self.run_sweep(store.as_ref(), hub.as_ref()).await;
                    }
                    _ = stopped.changed() => break,
                }
            }

            debug!("Reminder task stopped");
        });

        ReminderTask { stop, handle }
    }

    async fn run_sweep(&self, store: &dyn Store, hub: &dyn NotificationHub) {
        match self.sweep(store, hub, Utc::now()).await {
            Ok(report) if report == SweepReport::default() => {
                debug!("Reminder sweep found nothing to do")
            }
            Ok(report) => info!(
                advance_sent = report.advance_sent,
                final_sent = report.final_sent,
                failures = report.failures,
                "Reminder sweep finished"
            ),
            Err(e) => error!(error = %e, "Reminder sweep failed"),
        }
    }
}

/// Returns false when nobody is pending, leaving the raid eligible for the
/// next sweep.
async fn send_advance(
    store: &dyn Store,
    hub: &dyn NotificationHub,
    raid: &Raid,
) -> Result<bool, Error> {
    let pending = store
        .list_attendance(raid.id, Some(AttendanceStatus::Pending))
        .await?;
    if pending.is_empty() {
        return Ok(false);
    }

    let content = MessageContent::new(
        format!("Reminder: {}", raid.name),
        format!(
            "The raid is scheduled for tomorrow at {}!\n\nPlease confirm your attendance by reacting to this message or using the attendance command.",
            raid.scheduled.format("%H:%M UTC")
        ),
        ColorHint::Gold,
    )
    .field("Raid", raid.name.clone(), true)
    .field("Time", raid.scheduled.format("%Y-%m-%d %H:%M UTC").to_string(), true)
    .field("Pending Responses", pending.len().to_string(), true)
    .footer(format!("Raid ID: {}", raid.id))
    .timestamp(raid.scheduled)
    .mentions(pending.iter().map(|r| r.member_id).collect())
    .reactions(&RsvpReaction::ALL);

    let handle = hub.send(raid.channel_id, &content).await?;
    store
        .set_message(raid.id, MessageKind::Reminder, Some(handle))
        .await?;

    info!(raid_id = %raid.id, %handle, pending = pending.len(), "Raid reminder sent");

    Ok(true)
}

/// Handle to the background sweep loop.
pub struct ReminderTask {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ReminderTask {
    /// Waits for a running sweep to finish, then ends the loop.
    pub async fn stop(self) {
        let _ = self.stop.send(true);

        if let Err(e) = self.handle.await {
            error!(error = %e, "Reminder task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::framework::attendance::AttendanceRecord;
    use crate::framework::notification::tests::RecordingHub;

    async fn raid_at(store: &MemoryStore, now: DateTime<Utc>, offset: Duration) -> Raid {
        store
            .insert_raid(&Raid::new("Savage", "", now + offset, "Arcadion", 1, 30))
            .await
            .unwrap()
    }

    async fn attend(store: &MemoryStore, raid: &Raid, member_id: u64, status: AttendanceStatus) {
        store
            .upsert_attendance(&AttendanceRecord::new(
                raid.id,
                member_id,
                format!("member {}", member_id),
                status,
                None,
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn advance_reminder_mentions_pending_and_fires_once() {
        let store = MemoryStore::default();
        let hub = RecordingHub::default();
        let scheduler = ReminderScheduler::new(ReminderConfig::default());
        let now = Utc::now();
        let raid = raid_at(&store, now, Duration::minutes(24 * 60 + 30)).await;
        for id in 1..=3 {
            attend(&store, &raid, id, AttendanceStatus::Pending).await;
        }
        for id in 4..=5 {
            attend(&store, &raid, id, AttendanceStatus::Confirmed).await;
        }

        let report = scheduler.sweep(&store, &hub, now).await.unwrap();

        assert_eq!(report.advance_sent, 1);
        let sends = hub.sends();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].mentions, vec![1, 2, 3]);
        assert_eq!(sends[0].reactions, RsvpReaction::ALL.to_vec());
        assert_eq!(sends[0].color, ColorHint::Gold);
        assert!(store.find_raid(raid.id).await.unwrap().unwrap().reminder_message.is_some());

        let again = scheduler.sweep(&store, &hub, now).await.unwrap();
        assert_eq!(again.advance_sent, 0);
        assert_eq!(hub.sends().len(), 1);
    }

    #[tokio::test]
    async fn advance_window_bounds_are_exclusive_and_skip_archived() {
        let store = MemoryStore::default();
        let hub = RecordingHub::default();
        let scheduler = ReminderScheduler::new(ReminderConfig::default());
        let now = Utc::now();
        let edge = raid_at(&store, now, Duration::hours(25)).await;
        let archived = raid_at(&store, now, Duration::minutes(24 * 60 + 10)).await;
        store.archive_raid(archived.id).await.unwrap();
        for raid in [&edge, &archived] {
            attend(&store, raid, 1, AttendanceStatus::Pending).await;
        }

        let report = scheduler.sweep(&store, &hub, now).await.unwrap();

        assert_eq!(report, SweepReport::default());
        assert!(hub.calls().is_empty());
    }

    #[tokio::test]
    async fn no_pending_attendees_leaves_raid_eligible() {
        let store = MemoryStore::default();
        let hub = RecordingHub::default();
        let scheduler = ReminderScheduler::new(ReminderConfig::default());
        let now = Utc::now();
        let raid = raid_at(&store, now, Duration::minutes(24 * 60 + 30)).await;

        scheduler.sweep(&store, &hub, now).await.unwrap();
        assert!(hub.sends().is_empty());

        attend(&store, &raid, 9, AttendanceStatus::Pending).await;
        let report = scheduler.sweep(&store, &hub, now).await.unwrap();
        assert_eq!(report.advance_sent, 1);
    }

    #[tokio::test]
    async fn final_reminder_repeats_unless_configured_once() {
        let now = Utc::now();

        for (once, expected) in [(false, 2), (true, 1)] {
            let store = MemoryStore::default();
            let hub = RecordingHub::default();
            let scheduler = ReminderScheduler::new(ReminderConfig {
                final_reminder_once: once,
                ..Default::default()
            });
            raid_at(&store, now, Duration::minutes(90)).await;

            scheduler.sweep(&store, &hub, now).await.unwrap();
            scheduler
                .sweep(&store, &hub, now + Duration::minutes(10))
                .await
                .unwrap();

            let sends = hub.sends();
            assert_eq!(sends.len(), expected, "final_reminder_once = {}", once);
            assert!(sends.iter().all(|c| c.color == ColorHint::Red));
        }
    }

    #[tokio::test]
    async fn one_failing_raid_does_not_stop_the_sweep() {
        let store = MemoryStore::default();
        let hub = RecordingHub::default();
        let scheduler = ReminderScheduler::new(ReminderConfig::default());
        let now = Utc::now();
        let raid = raid_at(&store, now, Duration::minutes(24 * 60 + 30)).await;
        attend(&store, &raid, 1, AttendanceStatus::Pending).await;
        raid_at(&store, now, Duration::minutes(90)).await;
        *hub.fail_sends.lock().unwrap() = true;

        let report = scheduler.sweep(&store, &hub, now).await.unwrap();

        assert_eq!(report.failures, 2);
        assert!(store.find_raid(raid.id).await.unwrap().unwrap().reminder_message.is_none());

        *hub.fail_sends.lock().unwrap() = false;
        let retry = scheduler.sweep(&store, &hub, now).await.unwrap();
        assert_eq!(retry.advance_sent, 1);
        assert_eq!(retry.final_sent, 1);
    }

    #[tokio::test]
    async fn spawned_task_sweeps_at_start_and_stops() {
        let store = Arc::new(MemoryStore::default());
        let hub = Arc::new(RecordingHub::default());
        let raid = raid_at(&store, Utc::now(), Duration::minutes(24 * 60 + 30)).await;
        attend(&store, &raid, 1, AttendanceStatus::Pending).await;
        let schedule = Schedule::from_str("0 0 0 1 1 * 2099").unwrap();

        let task = ReminderScheduler::new(ReminderConfig::default()).spawn(
            schedule,
            store.clone(),
            hub.clone(),
        );
        task.stop().await;

        assert_eq!(hub.sends().len(), 1);
    }
}
