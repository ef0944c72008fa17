use crate::state::PickerItem;

#[derive(uniffi::Enum, Debug, Clone)]
pub enum AppAction {
    // Session
    SignIn {
        user_id: String,
        display_name: String,
    },
    SignOut,

    // Chat room
    OpenChat {
        chat_id: String,
    },
    CloseChat,
    /// `top_visible_id` is the row at the top of the viewport; the view is
    /// restored to it once the page lands. Defaults to the oldest loaded row.
    LoadOlderMessages {
        top_visible_id: Option<String>,
    },
    UpdateDraft {
        text: String,
    },
    /// Sends the draft as typed. Whitespace-only drafts count as empty.
    SendMessage,
    AddReaction {
        message_id: String,
        emoji: String,
    },

    // Attachments
    AddPickerSelection {
        items: Vec<PickerItem>,
    },
    AddRecordedAudio {
        path: String,
        duration_secs: f64,
    },
    RemoveAttachment {
        attachment_id: String,
    },

    // UI
    AckScroll {
        token: u64,
    },
    ClearToast,
}

impl AppAction {
    /// Log-safe action tag (never includes message text or file paths).
    pub fn tag(&self) -> &'static str {
        match self {
            // Session
            AppAction::SignIn { .. } => "SignIn",
            AppAction::SignOut => "SignOut",

            // Chat room
            AppAction::OpenChat { .. } => "OpenChat",
            AppAction::CloseChat => "CloseChat",
            AppAction::LoadOlderMessages { .. } => "LoadOlderMessages",
            AppAction::UpdateDraft { .. } => "UpdateDraft",
            AppAction::SendMessage => "SendMessage",
            AppAction::AddReaction { .. } => "AddReaction",

            // Attachments
            AppAction::AddPickerSelection { .. } => "AddPickerSelection",
            AppAction::AddRecordedAudio { .. } => "AddRecordedAudio",
            AppAction::RemoveAttachment { .. } => "RemoveAttachment",

            // UI
            AppAction::AckScroll { .. } => "AckScroll",
            AppAction::ClearToast => "ClearToast",
        }
    }
}
