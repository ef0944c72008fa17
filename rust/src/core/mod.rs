mod compose;
mod config;
mod feed;
mod media;
mod room;
mod staging;
mod uploads;

use std::sync::{Arc, RwLock};

use chatroom_backend_traits::ChatBackend;
use flume::Sender;

use crate::actions::AppAction;
use crate::state::{AppState, BusyState, SessionState};
use crate::updates::{AppUpdate, CoreMsg, InternalEvent};
use crate::VideoFrameSource;

pub(crate) use config::default_app_config_json;
pub(crate) use staging::PendingAttachment;

use self::room::ChatRoom;

pub(crate) type SharedFrameSource = Arc<RwLock<Option<Arc<dyn VideoFrameSource>>>>;

pub(crate) struct AppCore {
    state: AppState,
    rev: u64,

    update_sender: Sender<AppUpdate>,
    core_sender: Sender<CoreMsg>,
    shared_state: Arc<RwLock<AppState>>,

    data_dir: String,
    config: config::AppConfig,
    runtime: tokio::runtime::Runtime,
    backend: Arc<dyn ChatBackend>,
    frame_source: SharedFrameSource,

    session: Option<SessionState>,
    room: Option<ChatRoom>,
    // Bumped for every opened room; completions from older rooms are dropped.
    generation: u64,
    scroll_token: u64,
}

impl AppCore {
    pub(crate) fn new(
        update_sender: Sender<AppUpdate>,
        core_sender: Sender<CoreMsg>,
        data_dir: String,
        shared_state: Arc<RwLock<AppState>>,
        backend: Arc<dyn ChatBackend>,
        frame_source: SharedFrameSource,
    ) -> Self {
        let config = config::load_app_config(&data_dir);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .build()
            .expect("tokio runtime");

        tracing::debug!(
            page_size = config.page_size(),
            staging_dir = %config.media_staging_dir(&data_dir).display(),
            "config loaded"
        );

        let this = Self {
            state: AppState::empty(),
            rev: 0,
            update_sender,
            core_sender,
            shared_state,
            data_dir,
            config,
            runtime,
            backend,
            frame_source,
            session: None,
            room: None,
            generation: 0,
            scroll_token: 0,
        };

        // Ensure FfiApp.state() has an immediately-available snapshot.
        let snapshot = this.state.clone();
        this.commit_state_snapshot(&snapshot);
        this
    }

    fn next_rev(&mut self) -> u64 {
        self.rev += 1;
        self.state.rev = self.rev;
        self.rev
    }

    fn commit_state_snapshot(&self, snapshot: &AppState) {
        match self.shared_state.write() {
            Ok(mut g) => *g = snapshot.clone(),
            Err(poison) => *poison.into_inner() = snapshot.clone(),
        }
    }

    fn emit_state(&mut self) {
        self.state.current_chat = self.project_current_chat();
        self.state.busy.loading_older = self.room.as_ref().is_some_and(|r| r.feed.is_loading());
        self.next_rev();
        let snapshot = self.state.clone();
        self.commit_state_snapshot(&snapshot);
        let _ = self.update_sender.send(AppUpdate::FullState(snapshot));
    }

    fn toast(&mut self, msg: impl Into<String>) {
        // Kept until the UI clears it, so a resync via state() still shows it.
        self.state.toast = Some(msg.into());
        self.emit_state();
    }

    fn set_busy(&mut self, f: impl FnOnce(&mut BusyState)) {
        f(&mut self.state.busy);
    }

    fn send_internal(tx: &Sender<CoreMsg>, event: InternalEvent) {
        let _ = tx.send(CoreMsg::Internal(Box::new(event)));
    }

    fn current_user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user_id.as_str())
    }

    fn require_session(&mut self) -> Option<String> {
        match self.current_user_id() {
            Some(id) => Some(id.to_string()),
            None => {
                self.toast("Please sign in first");
                None
            }
        }
    }

    fn require_room(&mut self) -> bool {
        if self.room.is_some() {
            return true;
        }
        self.toast("Open a chat first");
        false
    }

    pub(crate) fn handle_message(&mut self, msg: CoreMsg) {
        match msg {
            CoreMsg::Action(ref action) => {
                // Never log `?action` directly: it carries drafts and file paths.
                tracing::info!(action = action.tag(), "dispatch");
                self.handle_action(action.clone());
            }
            CoreMsg::Internal(internal) => self.handle_internal(*internal),
        }
    }

    fn handle_action(&mut self, action: AppAction) {
        match action {
            AppAction::SignIn {
                user_id,
                display_name,
            } => {
                let user_id = user_id.trim().to_string();
                if user_id.is_empty() {
                    self.toast("User id is required");
                    return;
                }
                if self.current_user_id() != Some(user_id.as_str()) {
                    self.close_room();
                }
                tracing::info!(%user_id, "signed in");
                self.session = Some(SessionState {
                    user_id,
                    display_name,
                });
                self.state.session = self.session.clone();
                self.emit_state();
            }
            AppAction::SignOut => {
                self.close_room();
                self.session = None;
                self.state.session = None;
                self.state.uploads.clear();
                self.state.busy = BusyState::idle();
                self.emit_state();
            }
            AppAction::OpenChat { chat_id } => {
                if self.require_session().is_none() {
                    return;
                }
                self.open_room(chat_id);
            }
            AppAction::CloseChat => {
                self.close_room();
                self.emit_state();
            }
            AppAction::LoadOlderMessages { top_visible_id } => {
                if !self.require_room() {
                    return;
                }
                self.load_older(top_visible_id);
            }
            AppAction::UpdateDraft { text } => {
                if let Some(room) = self.room.as_mut() {
                    room.draft = text;
                    self.emit_state();
                }
            }
            AppAction::SendMessage => {
                let Some(user_id) = self.require_session() else {
                    return;
                };
                if !self.require_room() {
                    return;
                }
                self.send_staged(user_id);
            }
            AppAction::AddReaction { message_id, emoji } => {
                let Some(user_id) = self.require_session() else {
                    return;
                };
                if !self.require_room() {
                    return;
                }
                self.add_reaction(user_id, message_id, emoji);
            }
            AppAction::AddPickerSelection { items } => {
                if !self.require_room() {
                    return;
                }
                self.resolve_picker_selection(items);
            }
            AppAction::AddRecordedAudio {
                path,
                duration_secs,
            } => {
                if !self.require_room() {
                    return;
                }
                self.stage_recording(path, duration_secs);
            }
            AppAction::RemoveAttachment { attachment_id } => {
                if let Some(room) = self.room.as_mut() {
                    if room.staging.remove(&attachment_id).is_some() {
                        self.emit_state();
                    }
                }
            }
            AppAction::AckScroll { token } => {
                if let Some(room) = self.room.as_mut() {
                    if room.scroll.as_ref().is_some_and(|s| s.token == token) {
                        room.scroll = None;
                        self.emit_state();
                    }
                }
            }
            AppAction::ClearToast => {
                if self.state.toast.take().is_some() {
                    self.emit_state();
                }
            }
        }
    }

    fn handle_internal(&mut self, internal: InternalEvent) {
        match internal {
            InternalEvent::ConversationFetched { generation, result } => {
                self.on_conversation_fetched(generation, result)
            }
            InternalEvent::PageFetched { generation, result } => {
                self.on_page_fetched(generation, result)
            }
            InternalEvent::FirstMessageIdFetched { generation, result } => {
                self.on_first_message_id(generation, result)
            }
            InternalEvent::Subscribed { generation, result } => {
                self.on_subscribed(generation, result)
            }
            InternalEvent::Live { generation, event } => self.on_live_event(generation, event),
            InternalEvent::PickerSelectionResolved {
                generation,
                selection,
                attachments,
            } => self.on_picker_resolved(generation, selection, attachments),
            InternalEvent::ReactionApplied {
                generation,
                message_id,
                emoji,
                result,
            } => self.on_reaction_applied(generation, message_id, emoji, result),
            InternalEvent::TextSent { chat_id, result } => {
                if let Err(e) = result {
                    let err = crate::error::ChatRoomError::PersistFailed(e);
                    tracing::warn!(%chat_id, %err, "text message not sent");
                }
            }
            InternalEvent::UploadPhaseChanged { upload_id, phase } => {
                self.on_upload_phase(upload_id, phase)
            }
            InternalEvent::UploadFinished { upload_id, result } => {
                self.on_upload_finished(upload_id, result)
            }
        }
    }
}
