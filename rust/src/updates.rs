use chatroom_backend_traits::{
    BackendError, Conversation, LiveEvent, MessagePage, SubscriptionHandle,
};

use crate::core::PendingAttachment;
use crate::error::ChatRoomError;
use crate::state::{AppState, UploadPhase};
use crate::AppAction;

#[derive(uniffi::Enum, Clone, Debug)]
pub enum AppUpdate {
    FullState(AppState),
}

impl AppUpdate {
    pub fn rev(&self) -> u64 {
        match self {
            AppUpdate::FullState(s) => s.rev,
        }
    }
}

#[derive(Debug)]
pub(crate) enum CoreMsg {
    Action(AppAction),
    Internal(Box<InternalEvent>),
}

/// Completions of async work, marshalled back onto the actor thread.
///
/// Room-scoped events carry the `generation` of the room that issued them;
/// the actor drops any whose generation is no longer current.
#[derive(Debug)]
pub(crate) enum InternalEvent {
    ConversationFetched {
        generation: u64,
        result: Result<Conversation, BackendError>,
    },
    PageFetched {
        generation: u64,
        result: Result<MessagePage, BackendError>,
    },
    FirstMessageIdFetched {
        generation: u64,
        result: Result<Option<String>, BackendError>,
    },
    Subscribed {
        generation: u64,
        result: Result<SubscriptionHandle, BackendError>,
    },
    Live {
        generation: u64,
        event: LiveEvent,
    },
    PickerSelectionResolved {
        generation: u64,
        selection: u64,
        attachments: Vec<PendingAttachment>,
    },
    ReactionApplied {
        generation: u64,
        message_id: String,
        emoji: String,
        result: Result<u32, BackendError>,
    },

    // Fire-and-forget sends. Not room scoped: they outlive the room.
    TextSent {
        chat_id: String,
        result: Result<(), BackendError>,
    },
    UploadPhaseChanged {
        upload_id: String,
        phase: UploadPhase,
    },
    UploadFinished {
        upload_id: String,
        result: Result<(), ChatRoomError>,
    },
}
