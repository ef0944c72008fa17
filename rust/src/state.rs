use chatroom_backend_traits::{AdminEvent, MediaFields, MessageKind};

#[derive(uniffi::Record, Clone, Debug)]
pub struct AppState {
    pub rev: u64,
    pub session: Option<SessionState>,
    pub busy: BusyState,
    pub current_chat: Option<ChatRoomState>,
    pub uploads: Vec<UploadProgress>,
    pub toast: Option<String>,
}

impl AppState {
    pub fn empty() -> Self {
        Self {
            rev: 0,
            session: None,
            busy: BusyState::idle(),
            current_chat: None,
            uploads: vec![],
            toast: None,
        }
    }
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct SessionState {
    pub user_id: String,
    pub display_name: String,
}

/// "In flight" flags for long-ish operations that the UI should reflect.
///
/// Ephemeral UI state (focus, keyboard) stays native; async operation state
/// that drives spinners lives here so the UI never has to guess.
#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct BusyState {
    pub opening_chat: bool,
    pub loading_older: bool,
    pub resolving_media: bool,
}

impl BusyState {
    pub fn idle() -> Self {
        Self {
            opening_chat: false,
            loading_older: false,
            resolving_media: false,
        }
    }
}

#[derive(uniffi::Record, Clone, Debug)]
pub struct ChatRoomState {
    pub chat_id: String,
    pub title: String,
    pub is_group: bool,
    pub messages: Vec<ChatMessage>,
    pub can_load_older: bool,
    pub staged: Vec<StagedAttachment>,
    pub draft_text: String,
    pub scroll: Option<ScrollRequest>,
}

#[derive(uniffi::Record, Clone, Debug)]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: String,
    pub sender_name: Option<String>,
    pub kind: ChatMessageKind,
    pub body: String,
    pub timestamp_ms: i64,
    pub time_label: String,
    pub is_mine: bool,
    pub show_day_separator: bool,
    pub day_label: Option<String>,
    pub show_sender_name: bool,
    pub media: Option<ChatMedia>,
    pub reactions: Vec<ReactionSummary>,
}

#[derive(uniffi::Enum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatMessageKind {
    Text,
    Photo,
    Video,
    Audio,
    ChannelCreated,
    MemberAdded,
    MemberLeft,
    ChannelRenamed,
}

impl From<MessageKind> for ChatMessageKind {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Text => Self::Text,
            MessageKind::Photo => Self::Photo,
            MessageKind::Video => Self::Video,
            MessageKind::Audio => Self::Audio,
            MessageKind::Admin(AdminEvent::ChannelCreation) => Self::ChannelCreated,
            MessageKind::Admin(AdminEvent::MemberAdded) => Self::MemberAdded,
            MessageKind::Admin(AdminEvent::MemberLeft) => Self::MemberLeft,
            MessageKind::Admin(AdminEvent::ChannelNameChange) => Self::ChannelRenamed,
        }
    }
}

#[derive(uniffi::Record, Clone, Debug, PartialEq)]
pub struct ChatMedia {
    pub thumbnail_url: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub video_url: Option<String>,
    pub audio_url: Option<String>,
    pub audio_duration_secs: Option<f64>,
    pub audio_duration_label: Option<String>,
}

impl ChatMedia {
    pub(crate) fn from_fields(kind: MessageKind, media: &MediaFields) -> Option<Self> {
        if !kind.is_media() {
            return None;
        }
        Some(Self {
            thumbnail_url: media.thumbnail_url.clone(),
            width: media.thumbnail_width,
            height: media.thumbnail_height,
            video_url: media.video_url.clone(),
            audio_url: media.audio_url.clone(),
            audio_duration_secs: media.audio_duration_secs,
            audio_duration_label: media
                .audio_duration_secs
                .map(crate::grouping::format_elapsed),
        })
    }
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct ReactionSummary {
    pub emoji: String,
    pub count: u32,
    pub reacted_by_me: bool,
}

#[derive(uniffi::Enum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StagedKind {
    Photo,
    Video,
    Audio,
}

#[derive(uniffi::Record, Clone, Debug)]
pub struct StagedAttachment {
    pub id: String,
    pub kind: StagedKind,
    pub thumbnail_jpeg: Option<Vec<u8>>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration_secs: Option<f64>,
    pub duration_label: Option<String>,
}

#[derive(uniffi::Enum, Clone, Debug, PartialEq, Eq)]
pub enum UploadPhase {
    Uploading,
    Persisting,
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct UploadProgress {
    pub upload_id: String,
    pub chat_id: String,
    pub kind: StagedKind,
    pub phase: UploadPhase,
}

/// One-shot scroll instruction for the message list.
///
/// `token` increases with every request; the UI acknowledges with
/// `AppAction::AckScroll` once it has performed the jump.
#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct ScrollRequest {
    pub token: u64,
    pub target: ScrollTarget,
}

#[derive(uniffi::Enum, Clone, Debug, PartialEq, Eq)]
pub enum ScrollTarget {
    Bottom { animated: bool },
    Message { message_id: String, index: u32 },
}

#[derive(uniffi::Enum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PickedKind {
    Image,
    Video,
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct PickerItem {
    pub id: String,
    pub kind: PickedKind,
    pub path: String,
}

pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_kinds_map_to_view_kinds() {
        assert_eq!(
            ChatMessageKind::from(MessageKind::Admin(AdminEvent::ChannelNameChange)),
            ChatMessageKind::ChannelRenamed
        );
        assert_eq!(ChatMessageKind::from(MessageKind::Photo), ChatMessageKind::Photo);
    }

    #[test]
    fn chat_media_only_for_media_kinds() {
        let fields = MediaFields {
            audio_url: Some("mem://voice_message/1".into()),
            audio_duration_secs: Some(75.4),
            ..MediaFields::default()
        };
        assert!(ChatMedia::from_fields(MessageKind::Text, &fields).is_none());
        let media = ChatMedia::from_fields(MessageKind::Audio, &fields).unwrap();
        assert_eq!(media.audio_duration_label.as_deref(), Some("01:15"));
    }
}
