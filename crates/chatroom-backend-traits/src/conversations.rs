//! Conversations (channels) and their participants.

use serde::{Deserialize, Serialize};

use crate::messages::MessageKind;

const UNKNOWN_TITLE: &str = "Unknown";

/// A user as listed in a conversation's member directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Participant id
    pub id: String,
    /// Human readable name
    pub display_name: String,
    /// Avatar URL
    pub profile_image_url: Option<String>,
}

/// A one-to-one or group conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation id
    pub id: String,
    /// Explicit channel name (groups only, usually)
    pub name: Option<String>,
    /// Creator participant id
    pub created_by: String,
    /// Creation instant in Unix milliseconds
    pub creation_timestamp_ms: i64,
    /// Member ids in join order
    pub member_ids: Vec<String>,
    /// Admin ids
    pub admin_ids: Vec<String>,
    /// Resolved member directory (may lag behind `member_ids`)
    #[serde(default)]
    pub members: Vec<Participant>,
    /// Denormalized body of the latest message
    #[serde(default)]
    pub last_message_preview: String,
    /// Denormalized timestamp of the latest message
    #[serde(default)]
    pub last_message_timestamp_ms: i64,
    /// Denormalized kind of the latest message
    pub last_message_kind: MessageKind,
}

impl Conversation {
    /// More than two members makes a group chat.
    pub fn is_group(&self) -> bool {
        self.member_ids.len() > 2
    }

    /// Directory entries other than `current_user_id`, in member order.
    pub fn members_excluding<'a>(&'a self, current_user_id: &'a str) -> Vec<&'a Participant> {
        self.ordered_members()
            .into_iter()
            .filter(|p| p.id != current_user_id)
            .collect()
    }

    /// Title shown in the navigation bar and chat list.
    pub fn title(&self, current_user_id: &str) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        let others = self.members_excluding(current_user_id);
        if !self.is_group() {
            return others
                .first()
                .map(|p| p.display_name.clone())
                .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
        }

        let names: Vec<&str> = others.iter().map(|p| p.display_name.as_str()).collect();
        match names.len() {
            2 => names.join(" and "),
            n if n > 2 => format!("{}, and {} others", names[..2].join(", "), n - 2),
            _ => UNKNOWN_TITLE.to_string(),
        }
    }

    /// Chat-list preview line for the latest message.
    pub fn preview_message(&self) -> String {
        match self.last_message_kind {
            MessageKind::Admin(_) => "Newly Created Chat!".to_string(),
            MessageKind::Text => self.last_message_preview.clone(),
            MessageKind::Photo => "Photo Message".to_string(),
            MessageKind::Video => "Video Message".to_string(),
            MessageKind::Audio => "Audio Message".to_string(),
        }
    }

    /// Whether `user_id` created this conversation.
    pub fn is_created_by(&self, user_id: &str) -> bool {
        self.created_by == user_id
    }

    /// Display name of the creator, or empty when not in the directory.
    pub fn creator_name(&self) -> String {
        self.display_name_of(&self.created_by)
            .unwrap_or_default()
            .to_string()
    }

    /// Looks up a member's display name.
    pub fn display_name_of(&self, participant_id: &str) -> Option<&str> {
        self.members
            .iter()
            .find(|p| p.id == participant_id)
            .map(|p| p.display_name.as_str())
    }

    /// Whether every member in `member_ids` has a directory entry.
    pub fn all_members_fetched(&self) -> bool {
        self.members.len() == self.member_ids.len()
    }

    /// Directory sorted by position in `member_ids`; unknown ids go last.
    fn ordered_members(&self) -> Vec<&Participant> {
        let mut members: Vec<&Participant> = self.members.iter().collect();
        members.sort_by_key(|p| {
            self.member_ids
                .iter()
                .position(|id| id == &p.id)
                .unwrap_or(usize::MAX)
        });
        members
    }
}
