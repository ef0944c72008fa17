use chatroom_backend_traits::{
    BackendError, Conversation, LiveEvent, Message, MessagePage, SubscriptionHandle,
};
use chrono::Local;

use super::feed::{FeedSignal, MessageFeed, PageRequest};
use super::staging::AttachmentStagingQueue;
use super::AppCore;
use crate::error::ChatRoomError;
use crate::grouping::{self, GroupingContext};
use crate::state::{
    now_millis, ChatMedia, ChatMessage, ChatRoomState, ReactionSummary, ScrollRequest,
    ScrollTarget,
};
use crate::updates::InternalEvent;

/// Everything owned by the currently open conversation.
pub(super) struct ChatRoom {
    pub(super) generation: u64,
    pub(super) chat_id: String,
    pub(super) conversation: Option<Conversation>,
    pub(super) feed: MessageFeed,
    pub(super) staging: AttachmentStagingQueue,
    pub(super) draft: String,
    pub(super) scroll: Option<ScrollRequest>,
    // Bumped per picker selection and per send; older resolutions are discarded.
    pub(super) picker_seq: u64,
    subscription: Option<SubscriptionHandle>,
    live_forwarder: Option<tokio::task::JoinHandle<()>>,
}

impl AppCore {
    /// The open room, if `generation` still names it.
    pub(super) fn room_for(&mut self, generation: u64) -> Option<&mut ChatRoom> {
        match self.room.as_mut() {
            Some(room) if room.generation == generation => Some(room),
            _ => {
                tracing::debug!(generation, current = self.generation, "dropping stale completion");
                None
            }
        }
    }

    pub(super) fn open_room(&mut self, chat_id: String) {
        if self.room.as_ref().is_some_and(|r| r.chat_id == chat_id) {
            self.emit_state();
            return;
        }
        self.close_room();

        self.generation += 1;
        let generation = self.generation;
        tracing::info!(%chat_id, generation, "opening chat");
        self.room = Some(ChatRoom {
            generation,
            chat_id: chat_id.clone(),
            conversation: None,
            feed: MessageFeed::new(chat_id.clone(), self.config.page_size()),
            staging: AttachmentStagingQueue::new(),
            draft: String::new(),
            scroll: None,
            picker_seq: 0,
            subscription: None,
            live_forwarder: None,
        });
        self.set_busy(|b| b.opening_chat = true);

        let backend = self.backend.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = backend.fetch_conversation(&chat_id).await;
            Self::send_internal(&tx, InternalEvent::ConversationFetched { generation, result });
        });

        // The first page also bootstraps the first-id lookup and live stream.
        self.load_older(None);
    }

    /// Tear down the open room: stop the live stream and delete staged files.
    ///
    /// Uploads already dispatched keep running.
    pub(super) fn close_room(&mut self) {
        let Some(mut room) = self.room.take() else {
            return;
        };
        tracing::info!(chat_id = %room.chat_id, generation = room.generation, "closing chat");
        if let Some(task) = room.live_forwarder.take() {
            task.abort();
        }
        if let Some(handle) = room.subscription.take() {
            let backend = self.backend.clone();
            self.runtime.spawn(async move {
                backend.unsubscribe(handle).await;
            });
        }
        room.staging.teardown();
        self.set_busy(|b| {
            b.opening_chat = false;
            b.loading_older = false;
            b.resolving_media = false;
        });
    }

    pub(super) fn load_older(&mut self, top_visible_id: Option<String>) {
        let Some(room) = self.room.as_mut() else {
            return;
        };
        let top_visible = top_visible_id
            .filter(|id| room.feed.contains(id))
            .or_else(|| room.feed.messages().first().map(|m| m.id.clone()));
        let Some(request) = room.feed.begin_load_older(top_visible) else {
            tracing::debug!(
                loading = room.feed.is_loading(),
                exhausted = room.feed.is_exhausted(),
                "load older skipped"
            );
            return;
        };
        let generation = room.generation;
        let chat_id = room.chat_id.clone();
        self.spawn_page_fetch(generation, chat_id, request);
        self.emit_state();
    }

    fn spawn_page_fetch(&mut self, generation: u64, chat_id: String, request: PageRequest) {
        let PageRequest {
            before_cursor,
            page_size,
            open_subscription,
            fetch_first_message_id,
        } = request;

        if open_subscription {
            self.spawn_subscription(generation, chat_id.clone());
        }
        if fetch_first_message_id {
            let backend = self.backend.clone();
            let tx = self.core_sender.clone();
            let chat_id = chat_id.clone();
            self.runtime.spawn(async move {
                let result = backend.fetch_first_message_id(&chat_id).await;
                Self::send_internal(&tx, InternalEvent::FirstMessageIdFetched { generation, result });
            });
        }

        let backend = self.backend.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = backend
                .fetch_message_page(&chat_id, before_cursor.as_deref(), page_size)
                .await;
            Self::send_internal(&tx, InternalEvent::PageFetched { generation, result });
        });
    }

    fn spawn_subscription(&mut self, generation: u64, chat_id: String) {
        let (live_tx, live_rx) = flume::unbounded::<LiveEvent>();

        let tx = self.core_sender.clone();
        let forwarder = self.runtime.spawn(async move {
            while let Ok(event) = live_rx.recv_async().await {
                Self::send_internal(&tx, InternalEvent::Live { generation, event });
            }
        });
        if let Some(room) = self.room_for(generation) {
            room.live_forwarder = Some(forwarder);
        }

        let backend = self.backend.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = backend.subscribe_to_new_messages(&chat_id, live_tx).await;
            Self::send_internal(&tx, InternalEvent::Subscribed { generation, result });
        });
    }

    pub(super) fn on_conversation_fetched(
        &mut self,
        generation: u64,
        result: Result<Conversation, BackendError>,
    ) {
        let Some(room) = self.room_for(generation) else {
            return;
        };
        match result {
            Ok(conversation) => {
                room.conversation = Some(conversation);
                self.set_busy(|b| b.opening_chat = false);
                self.emit_state();
            }
            Err(e) => {
                let err = ChatRoomError::FetchFailed(e);
                tracing::warn!(%err, "conversation fetch failed");
                self.set_busy(|b| b.opening_chat = false);
                self.toast(err.user_message());
            }
        }
    }

    pub(super) fn on_page_fetched(
        &mut self,
        generation: u64,
        result: Result<MessagePage, BackendError>,
    ) {
        let Some(room) = self.room_for(generation) else {
            return;
        };
        match room.feed.finish_load_older(result) {
            Ok(signal) => {
                tracing::debug!(
                    loaded = room.feed.messages().len(),
                    cursor = ?room.feed.cursor(),
                    exhausted = room.feed.is_exhausted(),
                    "page merged"
                );
                self.request_scroll(signal);
                self.emit_state();
            }
            Err(err) => {
                tracing::warn!(%err, "page fetch failed");
                self.toast(err.user_message());
            }
        }
    }

    pub(super) fn on_first_message_id(
        &mut self,
        generation: u64,
        result: Result<Option<String>, BackendError>,
    ) {
        let Some(room) = self.room_for(generation) else {
            return;
        };
        match room.feed.set_first_message_id(result) {
            Ok(()) => self.emit_state(),
            // Retried with the next page load.
            Err(err) => tracing::warn!(%err, "first message lookup failed"),
        }
    }

    pub(super) fn on_subscribed(
        &mut self,
        generation: u64,
        result: Result<SubscriptionHandle, BackendError>,
    ) {
        let stale_handle = match (self.room_for(generation), result) {
            (Some(room), Ok(handle)) => {
                tracing::debug!(chat_id = %room.chat_id, handle = handle.0, "live stream open");
                room.subscription = Some(handle);
                None
            }
            (Some(_), Err(e)) => {
                let err = ChatRoomError::SubscriptionFailed(e.to_string());
                tracing::warn!(%err, "live stream unavailable");
                None
            }
            (None, Ok(handle)) => Some(handle),
            (None, Err(_)) => None,
        };
        // The room closed while subscribing.
        if let Some(handle) = stale_handle {
            let backend = self.backend.clone();
            self.runtime.spawn(async move {
                backend.unsubscribe(handle).await;
            });
        }
    }

    pub(super) fn on_live_event(&mut self, generation: u64, event: LiveEvent) {
        let Some(room) = self.room_for(generation) else {
            return;
        };
        match event {
            LiveEvent::Message(message) => {
                let id = message.id.clone();
                match room.feed.on_live_message(message) {
                    Some(signal) => {
                        self.request_scroll(signal);
                        self.emit_state();
                    }
                    None => tracing::debug!(%id, "live message dropped (duplicate or other chat)"),
                }
            }
            LiveEvent::Failed(reason) => {
                let err = ChatRoomError::SubscriptionFailed(reason);
                tracing::warn!(chat_id = %room.chat_id, %err, "live stream dropped");
                room.subscription = None;
            }
        }
    }

    pub(super) fn add_reaction(&mut self, user_id: String, message_id: String, emoji: String) {
        let Some(room) = self.room.as_ref() else {
            return;
        };
        if !room.feed.contains(&message_id) {
            tracing::debug!(%message_id, "reaction on unknown message ignored");
            return;
        }
        let generation = room.generation;
        let chat_id = room.chat_id.clone();
        let backend = self.backend.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = backend
                .add_reaction(&message_id, &chat_id, &user_id, &emoji)
                .await;
            Self::send_internal(
                &tx,
                InternalEvent::ReactionApplied {
                    generation,
                    message_id,
                    emoji,
                    result,
                },
            );
        });
    }

    pub(super) fn on_reaction_applied(
        &mut self,
        generation: u64,
        message_id: String,
        emoji: String,
        result: Result<u32, BackendError>,
    ) {
        let Some(user_id) = self.current_user_id().map(ToString::to_string) else {
            return;
        };
        let Some(room) = self.room_for(generation) else {
            return;
        };
        match result {
            Ok(count) => {
                if let Some(message) = room.feed.message_mut(&message_id) {
                    let local = message.reactions.apply(&user_id, &emoji);
                    if local != count {
                        tracing::debug!(%message_id, local, remote = count, "reaction count differs");
                    }
                    self.emit_state();
                }
            }
            Err(e) => tracing::warn!(%message_id, %e, "reaction not applied"),
        }
    }

    fn request_scroll(&mut self, signal: FeedSignal) {
        let target = match signal {
            FeedSignal::None => return,
            FeedSignal::ScrollToBottom { animated } => ScrollTarget::Bottom { animated },
            FeedSignal::RestoreScroll { message_id, index } => ScrollTarget::Message {
                message_id,
                index: index as u32,
            },
        };
        self.scroll_token += 1;
        let token = self.scroll_token;
        if let Some(room) = self.room.as_mut() {
            room.scroll = Some(ScrollRequest { token, target });
        }
    }

    pub(super) fn project_current_chat(&self) -> Option<ChatRoomState> {
        let room = self.room.as_ref()?;
        let user_id = self.current_user_id().unwrap_or_default();
        let conversation = room.conversation.as_ref();
        let is_group = conversation.is_some_and(Conversation::is_group);
        let ctx = GroupingContext {
            current_user_id: user_id,
            is_group,
        };
        let messages = room.feed.messages();
        let flags = grouping::row_flags(messages, &ctx);
        let now = now_millis();

        let rows = messages
            .iter()
            .zip(flags)
            .map(|(m, f)| ChatMessage {
                id: m.id.clone(),
                sender_id: m.sender_id.clone(),
                sender_name: conversation
                    .and_then(|c| c.display_name_of(&m.sender_id))
                    .map(ToString::to_string),
                kind: m.kind.into(),
                body: m.body.clone(),
                timestamp_ms: m.timestamp_ms,
                time_label: grouping::time_label(m.timestamp_ms, &Local),
                is_mine: m.sender_id == user_id,
                show_day_separator: f.show_day_separator,
                day_label: f
                    .show_day_separator
                    .then(|| grouping::day_separator_label(m.timestamp_ms, now, &Local)),
                show_sender_name: f.show_sender_name,
                media: ChatMedia::from_fields(m.kind, &m.media),
                reactions: reaction_summaries(m, user_id),
            })
            .collect();

        Some(ChatRoomState {
            chat_id: room.chat_id.clone(),
            title: conversation
                .map(|c| c.title(user_id))
                .unwrap_or_default(),
            is_group,
            messages: rows,
            can_load_older: !room.feed.is_exhausted(),
            staged: room.staging.views(),
            draft_text: room.draft.clone(),
            scroll: room.scroll.clone(),
        })
    }
}

fn reaction_summaries(message: &Message, user_id: &str) -> Vec<ReactionSummary> {
    let mine = message.reactions.emoji_of(user_id);
    message
        .reactions
        .counts
        .iter()
        .map(|(emoji, count)| ReactionSummary {
            emoji: emoji.clone(),
            count: *count,
            reacted_by_me: mine == Some(emoji.as_str()),
        })
        .collect()
}
