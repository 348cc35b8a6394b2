use std::fmt::Display;
use std::fmt::Formatter;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use super::attendance::AttendanceStatus;
use super::ChannelId;
use super::MemberId;
use crate::error::Error;

/// Platform id of a message previously sent through a [`NotificationHub`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageHandle(pub u64);

impl Display for MessageHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorHint {
    Blue,
    Gold,
    Red,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline,
        }
    }
}

/// Reactions offered on an advance reminder, each standing for an RSVP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsvpReaction {
    Confirm,
    Decline,
    Bench,
}

impl RsvpReaction {
    pub const ALL: [RsvpReaction; 3] = [
        RsvpReaction::Confirm,
        RsvpReaction::Decline,
        RsvpReaction::Bench,
    ];

    pub fn emoji(self) -> &'static str {
        match self {
            RsvpReaction::Confirm => "\u{2705}",
            RsvpReaction::Decline => "\u{274C}",
            RsvpReaction::Bench => "\u{1FA91}",
        }
    }

    pub fn from_emoji(emoji: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.emoji() == emoji)
    }

    pub fn status(self) -> AttendanceStatus {
        match self {
            RsvpReaction::Confirm => AttendanceStatus::Confirmed,
            RsvpReaction::Decline => AttendanceStatus::Declined,
            RsvpReaction::Bench => AttendanceStatus::BenchRequested,
        }
    }
}

/// Semantic payload handed to the hub. The hub decides how it looks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContent {
    pub title: String,
    pub description: String,
    pub fields: Vec<Field>,
    pub color: ColorHint,
    pub footer: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    /// Members to ping alongside the message.
    pub mentions: Vec<MemberId>,
    pub reactions: Vec<RsvpReaction>,
}

impl MessageContent {
    pub fn new(title: impl Into<String>, description: impl Into<String>, color: ColorHint) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            fields: Vec::new(),
            color,
            footer: None,
            timestamp: None,
            mentions: Vec::new(),
            reactions: Vec::new(),
        }
    }

    pub fn field(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        inline: bool,
    ) -> Self {
        self.fields.push(Field::new(name, value, inline));
        self
    }

    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn mentions(mut self, mentions: Vec<MemberId>) -> Self {
        self.mentions = mentions;
        self
    }

    pub fn reactions(mut self, reactions: &[RsvpReaction]) -> Self {
        self.reactions = reactions.to_vec();
        self
    }

    #[cfg(test)]
    pub fn find_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Outbound side of the chat platform.
#[async_trait]
pub trait NotificationHub: Send + Sync {
    async fn send(
        &self,
        channel_id: ChannelId,
        content: &MessageContent,
    ) -> Result<MessageHandle, Error>;

    async fn update(
        &self,
        channel_id: ChannelId,
        handle: MessageHandle,
        content: &MessageContent,
    ) -> Result<(), Error>;

    async fn delete(&self, channel_id: ChannelId, handle: MessageHandle) -> Result<(), Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Attendance,
    Composition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaidChanged {
    pub raid_id: Uuid,
    pub change: Change,
}

/// Sending half of the raid-changed channel, cloned into every component
/// that mutates raid state.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: mpsc::UnboundedSender<RaidChanged>,
}

impl ChangeNotifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RaidChanged>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn notify(&self, raid_id: Uuid, change: Change) {
        if self.tx.send(RaidChanged { raid_id, change }).is_err() {
            warn!(%raid_id, ?change, "No renderer listening for raid changes");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum HubCall {
        Send(ChannelId, MessageContent),
        Update(ChannelId, MessageHandle, MessageContent),
        Delete(ChannelId, MessageHandle),
    }

    /// Hub that records every call. Handles are handed out sequentially.
    #[derive(Default)]
    pub(crate) struct RecordingHub {
        pub calls: Mutex<Vec<HubCall>>,
        pub fail_updates: Mutex<bool>,
        pub fail_sends: Mutex<bool>,
        pub fail_deletes: Mutex<bool>,
        next: Mutex<u64>,
    }

    impl RecordingHub {
        pub(crate) fn calls(&self) -> Vec<HubCall> {
            self.calls.lock().unwrap().clone()
        }

        pub(crate) fn sends(&self) -> Vec<MessageContent> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    HubCall::Send(_, content) => Some(content),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl NotificationHub for RecordingHub {
        async fn send(
            &self,
            channel_id: ChannelId,
            content: &MessageContent,
        ) -> Result<MessageHandle, Error> {
            if *self.fail_sends.lock().unwrap() {
                return Err(Error::MessageUnavailable("channel not found".into()));
            }
            self.calls
                .lock()
                .unwrap()
                .push(HubCall::Send(channel_id, content.clone()));
            let mut next = self.next.lock().unwrap();
            *next += 1;
            Ok(MessageHandle(1000 + *next))
        }

        async fn update(
            &self,
            channel_id: ChannelId,
            handle: MessageHandle,
            content: &MessageContent,
        ) -> Result<(), Error> {
            self.calls
                .lock()
                .unwrap()
                .push(HubCall::Update(channel_id, handle, content.clone()));
            if *self.fail_updates.lock().unwrap() {
                return Err(Error::MessageUnavailable("unknown message".into()));
            }
            Ok(())
        }

        async fn delete(&self, channel_id: ChannelId, handle: MessageHandle) -> Result<(), Error> {
            self.calls
                .lock()
                .unwrap()
                .push(HubCall::Delete(channel_id, handle));
            if *self.fail_deletes.lock().unwrap() {
                return Err(Error::MessageUnavailable("missing permissions".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn reactions_map_to_statuses() {
        assert_eq!(
            RsvpReaction::from_emoji("\u{2705}").map(RsvpReaction::status),
            Some(AttendanceStatus::Confirmed)
        );
        assert_eq!(
            RsvpReaction::from_emoji("\u{1FA91}").map(RsvpReaction::status),
            Some(AttendanceStatus::BenchRequested)
        );
        assert_eq!(RsvpReaction::from_emoji("\u{1F44D}"), None);
    }

    #[tokio::test]
    async fn notifier_delivers_to_subscriber() {
        let (notifier, mut rx) = ChangeNotifier::channel();
        let raid_id = Uuid::new_v4();

        notifier.notify(raid_id, Change::Composition);

        assert_eq!(
            rx.recv().await,
            Some(RaidChanged {
                raid_id,
                change: Change::Composition
            })
        );
    }

    #[test]
    fn notify_without_subscriber_does_not_panic() {
        let (notifier, rx) = ChangeNotifier::channel();
        drop(rx);

        notifier.notify(Uuid::new_v4(), Change::Attendance);
    }
}
