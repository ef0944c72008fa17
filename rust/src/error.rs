use chatroom_backend_traits::BackendError;

/// Failures the chat room surfaces or logs.
///
/// Only `FetchFailed` reaches the user (as a toast); the rest are logged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChatRoomError {
    #[error("fetch failed: {0}")]
    FetchFailed(BackendError),
    #[error("upload failed: {0}")]
    UploadFailed(BackendError),
    #[error("persist failed: {0}")]
    PersistFailed(BackendError),
    #[error("live subscription failed: {0}")]
    SubscriptionFailed(String),
    #[error("media: {0}")]
    Media(String),
}

impl ChatRoomError {
    /// Short user-facing text for toasts.
    pub fn user_message(&self) -> String {
        match self {
            Self::FetchFailed(e) => format!("Couldn't load messages: {e}"),
            Self::UploadFailed(e) => format!("Upload failed: {e}"),
            Self::PersistFailed(e) => format!("Couldn't send message: {e}"),
            Self::SubscriptionFailed(reason) => format!("Live updates stopped: {reason}"),
            Self::Media(reason) => format!("Couldn't read attachment: {reason}"),
        }
    }
}
