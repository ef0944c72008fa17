//! Message records as stored by the backend and rendered by the core.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// System-generated lifecycle events rendered as admin bubbles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AdminEvent {
    /// The channel was created
    ChannelCreation,
    /// A member was added
    MemberAdded,
    /// A member left
    MemberLeft,
    /// The channel was renamed
    ChannelNameChange,
}

impl AdminEvent {
    /// Wire name of the event (`"channelCreation"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChannelCreation => "channelCreation",
            Self::MemberAdded => "memberAdded",
            Self::MemberLeft => "memberLeft",
            Self::ChannelNameChange => "channelNameChange",
        }
    }
}

/// What a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    /// Plain text
    Text,
    /// Still image with optional caption
    Photo,
    /// Video with poster image and optional caption
    Video,
    /// Voice recording
    Audio,
    /// Channel lifecycle event
    Admin(AdminEvent),
}

impl MessageKind {
    /// Short title used for the denormalized `lastMessageType` field.
    ///
    /// Every admin variant shares the title `"admin"`.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Admin(_) => "admin",
        }
    }

    /// Photo, video and audio messages reference uploaded blobs.
    pub fn is_media(&self) -> bool {
        matches!(self, Self::Photo | Self::Video | Self::Audio)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin(event) => f.write_str(event.as_str()),
            other => f.write_str(other.title()),
        }
    }
}

/// Error returned when parsing an unknown message kind string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown message kind: {0}")]
pub struct UnknownMessageKind(pub String);

impl FromStr for MessageKind {
    type Err = UnknownMessageKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "photo" => Ok(Self::Photo),
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "channelCreation" => Ok(Self::Admin(AdminEvent::ChannelCreation)),
            "memberAdded" => Ok(Self::Admin(AdminEvent::MemberAdded)),
            "memberLeft" => Ok(Self::Admin(AdminEvent::MemberLeft)),
            "channelNameChange" => Ok(Self::Admin(AdminEvent::ChannelNameChange)),
            other => Err(UnknownMessageKind(other.to_string())),
        }
    }
}

/// Blob references attached to media messages.
///
/// Only the fields matching the message kind are populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaFields {
    /// Poster / still image URL (Photo, Video)
    pub thumbnail_url: Option<String>,
    /// Pixel width of the thumbnail source (Photo, Video)
    pub thumbnail_width: Option<u32>,
    /// Pixel height of the thumbnail source (Photo, Video)
    pub thumbnail_height: Option<u32>,
    /// Video file URL
    pub video_url: Option<String>,
    /// Voice recording URL
    pub audio_url: Option<String>,
    /// Voice recording length in seconds
    pub audio_duration_secs: Option<f64>,
}

/// Per-message reaction tallies.
///
/// A participant holds at most one reaction. `counts` never contains a zero
/// entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reactions {
    /// emoji -> number of participants who chose it
    pub counts: BTreeMap<String, u32>,
    /// participant id -> emoji they chose
    pub by_participant: BTreeMap<String, String>,
}

impl Reactions {
    /// Record `participant`'s reaction, replacing any previous one.
    ///
    /// Returns the resulting count for `emoji`.
    pub fn apply(&mut self, participant: &str, emoji: &str) -> u32 {
        if let Some(previous) = self.by_participant.get(participant) {
            if previous == emoji {
                return self.count_of(emoji);
            }
            let previous = previous.clone();
            if let Some(count) = self.counts.get_mut(&previous) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    self.counts.remove(&previous);
                }
            }
        }
        self.by_participant
            .insert(participant.to_string(), emoji.to_string());
        let count = self.counts.entry(emoji.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Emoji currently chosen by `participant`.
    pub fn emoji_of(&self, participant: &str) -> Option<&str> {
        self.by_participant.get(participant).map(String::as_str)
    }

    /// Current count for `emoji` (zero when absent).
    pub fn count_of(&self, emoji: &str) -> u32 {
        self.counts.get(emoji).copied().unwrap_or(0)
    }

    /// Whether nobody has reacted.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Backend-assigned id, unique within the conversation
    pub id: String,
    /// Owning conversation
    pub conversation_id: String,
    /// Authoring participant
    pub sender_id: String,
    /// Payload kind
    pub kind: MessageKind,
    /// Text body or caption; empty for pure media
    pub body: String,
    /// Creation instant in Unix milliseconds, assigned by the backend
    pub timestamp_ms: i64,
    /// Blob references for media kinds
    #[serde(default)]
    pub media: MediaFields,
    /// Reaction tallies
    #[serde(default)]
    pub reactions: Reactions,
}

impl Message {
    /// Display ordering: ascending by `timestamp_ms`, then by `id`.
    ///
    /// This is the single ordering used by the feed and by every backend
    /// implementation when paging.
    pub fn display_order(&self, other: &Self) -> Ordering {
        self.timestamp_ms
            .cmp(&other.timestamp_ms)
            .then_with(|| self.id.cmp(&other.id))
    }

    /// The `(timestamp_ms, id)` sort key.
    pub fn order_key(&self) -> (i64, &str) {
        (self.timestamp_ms, self.id.as_str())
    }
}

/// One page of history, ascending by [`Message::display_order`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePage {
    /// Messages in the page
    pub messages: Vec<Message>,
    /// Id of the oldest message loaded once this page is merged
    pub new_cursor: Option<String>,
}

/// Item pushed through a live subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// A message was appended to the conversation
    Message(Message),
    /// The stream dropped; no further events follow
    Failed(String),
}

/// Opaque handle returned by `subscribe_to_new_messages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(pub u64);

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, ts: i64) -> Message {
        Message {
            id: id.to_string(),
            conversation_id: "c1".to_string(),
            sender_id: "u1".to_string(),
            kind: MessageKind::Text,
            body: String::new(),
            timestamp_ms: ts,
            media: MediaFields::default(),
            reactions: Reactions::default(),
        }
    }

    #[test]
    fn display_order_breaks_ties_by_id() {
        let a = message("a", 10);
        let b = message("b", 10);
        let c = message("0", 11);
        assert_eq!(a.display_order(&b), Ordering::Less);
        assert_eq!(b.display_order(&c), Ordering::Less);
        assert_eq!(c.display_order(&a), Ordering::Greater);
    }

    #[test]
    fn kind_parses_user_and_admin_strings() {
        assert_eq!("text".parse::<MessageKind>().unwrap(), MessageKind::Text);
        assert_eq!("video".parse::<MessageKind>().unwrap(), MessageKind::Video);
        assert_eq!(
            "memberLeft".parse::<MessageKind>().unwrap(),
            MessageKind::Admin(AdminEvent::MemberLeft)
        );
        assert!("admin".parse::<MessageKind>().is_err());
        assert!("sticker".parse::<MessageKind>().is_err());
    }

    #[test]
    fn admin_kinds_share_a_title() {
        assert_eq!(
            MessageKind::Admin(AdminEvent::ChannelCreation).title(),
            "admin"
        );
        assert_eq!(
            MessageKind::Admin(AdminEvent::ChannelNameChange).to_string(),
            "channelNameChange"
        );
        assert!(MessageKind::Audio.is_media());
        assert!(!MessageKind::Text.is_media());
    }

    #[test]
    fn reaction_replacement_moves_the_count() {
        let mut reactions = Reactions::default();
        assert_eq!(reactions.apply("p1", "👍"), 1);
        assert_eq!(reactions.apply("p1", "❤️"), 1);

        assert_eq!(reactions.counts.len(), 1);
        assert_eq!(reactions.count_of("❤️"), 1);
        assert_eq!(reactions.count_of("👍"), 0);
        assert_eq!(reactions.emoji_of("p1"), Some("❤️"));
    }

    #[test]
    fn reaction_same_emoji_twice_is_stable() {
        let mut reactions = Reactions::default();
        reactions.apply("p1", "😂");
        reactions.apply("p2", "😂");
        assert_eq!(reactions.apply("p1", "😂"), 2);
        assert_eq!(reactions.by_participant.len(), 2);
    }

    #[test]
    fn reaction_replacement_keeps_other_participants() {
        let mut reactions = Reactions::default();
        reactions.apply("p1", "👍");
        reactions.apply("p2", "👍");
        reactions.apply("p1", "😮");
        assert_eq!(reactions.count_of("👍"), 1);
        assert_eq!(reactions.count_of("😮"), 1);
    }

    #[test]
    fn message_deserializes_without_optional_sections() {
        let json = r#"{
            "id": "m1",
            "conversation_id": "c1",
            "sender_id": "u1",
            "kind": "photo",
            "body": "",
            "timestamp_ms": 5
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.kind, MessageKind::Photo);
        assert!(msg.reactions.is_empty());
        assert_eq!(msg.media, MediaFields::default());
    }
}
