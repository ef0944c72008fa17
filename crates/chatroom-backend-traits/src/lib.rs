//! Chat-room backend - the domain model and the data service trait the chat-room
//! core talks to. The hosted database, auth and blob store live behind
//! [`ChatBackend`]; the core never sees vendor types.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod conversations;
pub mod error;
pub mod messages;

pub use conversations::{Conversation, Participant};
pub use error::BackendError;
pub use messages::{
    AdminEvent, LiveEvent, MediaFields, Message, MessageKind, MessagePage, Reactions,
    SubscriptionHandle, UnknownMessageKind,
};

/// Blob-store folder a payload is uploaded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UploadCategory {
    /// Avatar images
    ProfilePhoto,
    /// Photo messages and video poster frames
    PhotoMessage,
    /// Video files
    VideoMessage,
    /// Voice recordings
    VoiceMessage,
}

impl UploadCategory {
    /// Storage folder name for this category.
    pub fn folder(&self) -> &'static str {
        match self {
            Self::ProfilePhoto => "profile_photos",
            Self::PhotoMessage => "photo_message",
            Self::VideoMessage => "video_message",
            Self::VoiceMessage => "voice_message",
        }
    }
}

/// The backend data service.
///
/// Implementations wrap a hosted realtime database plus blob store. Every
/// method is asynchronous and must not block the caller's thread.
#[async_trait]
pub trait ChatBackend: Send + Sync + 'static {
    /// Fetch up to `page_size` messages older than `before_cursor`, or the
    /// most recent page when the cursor is `None`.
    ///
    /// The page is sorted ascending by [`Message::display_order`].
    async fn fetch_message_page(
        &self,
        conversation_id: &str,
        before_cursor: Option<&str>,
        page_size: usize,
    ) -> Result<MessagePage, BackendError>;

    /// Id of the first message ever sent in the conversation.
    async fn fetch_first_message_id(
        &self,
        conversation_id: &str,
    ) -> Result<Option<String>, BackendError>;

    /// Conversation metadata and member directory.
    async fn fetch_conversation(&self, conversation_id: &str)
    -> Result<Conversation, BackendError>;

    /// Start pushing newly appended messages into `sink`.
    ///
    /// Delivery may replay a message the caller already holds; callers
    /// de-duplicate by id.
    async fn subscribe_to_new_messages(
        &self,
        conversation_id: &str,
        sink: flume::Sender<LiveEvent>,
    ) -> Result<SubscriptionHandle, BackendError>;

    /// Stop a subscription. Unknown handles are ignored.
    async fn unsubscribe(&self, handle: SubscriptionHandle);

    /// Persist a text message and update the conversation preview.
    async fn send_text_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        body: &str,
    ) -> Result<(), BackendError>;

    /// Persist a media message and update the conversation preview.
    async fn send_media_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        kind: MessageKind,
        media: MediaFields,
        body: &str,
    ) -> Result<(), BackendError>;

    /// Upload a binary payload and return its download URL.
    async fn upload_blob(
        &self,
        bytes: Vec<u8>,
        category: UploadCategory,
    ) -> Result<String, BackendError>;

    /// Record `participant_id`'s reaction, replacing any previous one.
    ///
    /// Returns the updated count for `emoji`.
    async fn add_reaction(
        &self,
        message_id: &str,
        conversation_id: &str,
        participant_id: &str,
        emoji: &str,
    ) -> Result<u32, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_categories_map_to_folders() {
        assert_eq!(UploadCategory::ProfilePhoto.folder(), "profile_photos");
        assert_eq!(UploadCategory::PhotoMessage.folder(), "photo_message");
        assert_eq!(UploadCategory::VideoMessage.folder(), "video_message");
        assert_eq!(UploadCategory::VoiceMessage.folder(), "voice_message");
    }
}
