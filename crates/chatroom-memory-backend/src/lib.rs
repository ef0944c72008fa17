//! Memory-based backend implementation for the chat-room core.
//!
//! [`MemoryBackend`] implements [`ChatBackend`] entirely in process. It is
//! non-persistent and is meant for tests, demos and offline development.
//!
//! Behaviour mirrors the hosted backend where the core depends on it:
//!
//! - pages are cursor based and ascending;
//! - a new live subscription immediately replays the newest existing
//!   message (child-added semantics), so subscribers must de-duplicate;
//! - every send updates the conversation's denormalized preview;
//! - timestamps assigned on send are strictly increasing per conversation.
//!
//! Failures and latency can be injected per operation to exercise the
//! core's error paths.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chatroom_backend_traits::{
    BackendError, ChatBackend, Conversation, LiveEvent, MediaFields, Message, MessageKind,
    MessagePage, Reactions, SubscriptionHandle, UploadCategory,
};
use parking_lot::{Mutex, RwLock};

mod messages;

use self::messages::MessageLog;

#[derive(Debug, Default)]
struct Faults {
    fetch_failures: usize,
    first_id_failures: usize,
    subscribe_failures: usize,
    upload_failures: HashMap<UploadCategory, usize>,
    persist_failures: usize,
    fetch_delay: Option<Duration>,
    upload_delay: Option<Duration>,
}

#[derive(Debug)]
struct Subscriber {
    conversation_id: String,
    sink: flume::Sender<LiveEvent>,
}

#[derive(Debug, Default)]
struct State {
    conversations: HashMap<String, Conversation>,
    logs: HashMap<String, MessageLog>,
    blobs: HashMap<String, Vec<u8>>,
    subscribers: HashMap<u64, Subscriber>,
}

/// An in-memory [`ChatBackend`].
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RwLock<State>,
    faults: Mutex<Faults>,
    next_message: AtomicU64,
    next_blob: AtomicU64,
    next_subscription: AtomicU64,
    page_fetches: AtomicUsize,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Decrement a fault counter, returning whether the fault fires.
fn take_fault(counter: &mut usize) -> bool {
    if *counter > 0 {
        *counter -= 1;
        true
    } else {
        false
    }
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a conversation.
    pub fn insert_conversation(&self, conversation: Conversation) {
        let mut state = self.state.write();
        state
            .logs
            .entry(conversation.id.clone())
            .or_default();
        state
            .conversations
            .insert(conversation.id.clone(), conversation);
    }

    /// Appends a message with an explicit timestamp, bypassing the send path.
    ///
    /// Live subscribers are notified like for a regular send.
    pub fn seed_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        kind: MessageKind,
        body: &str,
        timestamp_ms: i64,
    ) -> Message {
        let message = Message {
            id: self.next_message_id(),
            conversation_id: conversation_id.to_string(),
            sender_id: sender_id.to_string(),
            kind,
            body: body.to_string(),
            timestamp_ms,
            media: MediaFields::default(),
            reactions: Reactions::default(),
        };
        self.append(message.clone());
        message
    }

    /// Snapshot of a conversation's messages in display order.
    pub fn messages(&self, conversation_id: &str) -> Vec<Message> {
        self.state
            .read()
            .logs
            .get(conversation_id)
            .map(|log| log.all().to_vec())
            .unwrap_or_default()
    }

    /// Snapshot of a conversation's metadata.
    pub fn conversation(&self, conversation_id: &str) -> Option<Conversation> {
        self.state.read().conversations.get(conversation_id).cloned()
    }

    /// Bytes stored under a URL returned by `upload_blob`.
    pub fn blob(&self, url: &str) -> Option<Vec<u8>> {
        self.state.read().blobs.get(url).cloned()
    }

    /// Number of stored blobs.
    pub fn blob_count(&self) -> usize {
        self.state.read().blobs.len()
    }

    /// Number of `fetch_message_page` calls served so far (including failed ones).
    pub fn page_fetch_count(&self) -> usize {
        self.page_fetches.load(Ordering::SeqCst)
    }

    /// Number of live subscriptions currently open.
    pub fn subscriber_count(&self) -> usize {
        self.state.read().subscribers.len()
    }

    /// Fail the next `n` page fetches with a network error.
    pub fn fail_next_fetches(&self, n: usize) {
        self.faults.lock().fetch_failures = n;
    }

    /// Fail the next `n` first-message lookups.
    pub fn fail_next_first_id_lookups(&self, n: usize) {
        self.faults.lock().first_id_failures = n;
    }

    /// Fail the next `n` subscription attempts.
    pub fn fail_next_subscriptions(&self, n: usize) {
        self.faults.lock().subscribe_failures = n;
    }

    /// Fail the next `n` uploads in `category`.
    pub fn fail_next_uploads(&self, category: UploadCategory, n: usize) {
        self.faults.lock().upload_failures.insert(category, n);
    }

    /// Fail the next `n` message writes (text or media).
    pub fn fail_next_persists(&self, n: usize) {
        self.faults.lock().persist_failures = n;
    }

    /// Delay every page fetch by `delay`.
    pub fn set_fetch_delay(&self, delay: Option<Duration>) {
        self.faults.lock().fetch_delay = delay;
    }

    /// Delay every upload by `delay`.
    pub fn set_upload_delay(&self, delay: Option<Duration>) {
        self.faults.lock().upload_delay = delay;
    }

    /// Break every open live subscription with `reason`.
    pub fn drop_subscriptions(&self, reason: &str) {
        let mut state = self.state.write();
        for (_, sub) in state.subscribers.drain() {
            let _ = sub.sink.send(LiveEvent::Failed(reason.to_string()));
        }
    }

    fn next_message_id(&self) -> String {
        let seq = self.next_message.fetch_add(1, Ordering::SeqCst);
        format!("msg-{seq:010}")
    }

    fn append(&self, message: Message) {
        let mut state = self.state.write();
        if let Some(conversation) = state.conversations.get_mut(&message.conversation_id) {
            conversation.last_message_preview = message.body.clone();
            conversation.last_message_timestamp_ms = message.timestamp_ms;
            conversation.last_message_kind = message.kind;
        }
        state
            .logs
            .entry(message.conversation_id.clone())
            .or_default()
            .insert(message.clone());

        // Disconnected sinks are pruned as we go.
        state.subscribers.retain(|_, sub| {
            if sub.conversation_id != message.conversation_id {
                return true;
            }
            sub.sink.send(LiveEvent::Message(message.clone())).is_ok()
        });
    }

    fn persist(
        &self,
        conversation_id: &str,
        sender_id: &str,
        kind: MessageKind,
        media: MediaFields,
        body: &str,
    ) -> Result<(), BackendError> {
        if take_fault(&mut self.faults.lock().persist_failures) {
            return Err(BackendError::Storage("injected persist failure".to_string()));
        }
        let last_ts = {
            let state = self.state.read();
            if !state.conversations.contains_key(conversation_id) {
                return Err(BackendError::NotFound(format!(
                    "conversation {conversation_id}"
                )));
            }
            state
                .logs
                .get(conversation_id)
                .and_then(MessageLog::last_timestamp_ms)
        };
        let timestamp_ms = match last_ts {
            Some(last) => now_ms().max(last + 1),
            None => now_ms(),
        };
        let message = Message {
            id: self.next_message_id(),
            conversation_id: conversation_id.to_string(),
            sender_id: sender_id.to_string(),
            kind,
            body: body.to_string(),
            timestamp_ms,
            media,
            reactions: Reactions::default(),
        };
        tracing::debug!(conversation_id, id = %message.id, kind = %kind, "memory backend: message persisted");
        self.append(message);
        Ok(())
    }
}

#[async_trait]
impl ChatBackend for MemoryBackend {
    async fn fetch_message_page(
        &self,
        conversation_id: &str,
        before_cursor: Option<&str>,
        page_size: usize,
    ) -> Result<MessagePage, BackendError> {
        self.page_fetches.fetch_add(1, Ordering::SeqCst);
        let (delay, fail) = {
            let mut faults = self.faults.lock();
            (faults.fetch_delay, take_fault(&mut faults.fetch_failures))
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(BackendError::Network("injected fetch failure".to_string()));
        }
        let state = self.state.read();
        let log = state
            .logs
            .get(conversation_id)
            .ok_or_else(|| BackendError::NotFound(format!("conversation {conversation_id}")))?;
        log.page(before_cursor, page_size)
    }

    async fn fetch_first_message_id(
        &self,
        conversation_id: &str,
    ) -> Result<Option<String>, BackendError> {
        if take_fault(&mut self.faults.lock().first_id_failures) {
            return Err(BackendError::Network(
                "injected first-id failure".to_string(),
            ));
        }
        let state = self.state.read();
        let log = state
            .logs
            .get(conversation_id)
            .ok_or_else(|| BackendError::NotFound(format!("conversation {conversation_id}")))?;
        Ok(log.first_id())
    }

    async fn fetch_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Conversation, BackendError> {
        self.conversation(conversation_id)
            .ok_or_else(|| BackendError::NotFound(format!("conversation {conversation_id}")))
    }

    async fn subscribe_to_new_messages(
        &self,
        conversation_id: &str,
        sink: flume::Sender<LiveEvent>,
    ) -> Result<SubscriptionHandle, BackendError> {
        if take_fault(&mut self.faults.lock().subscribe_failures) {
            return Err(BackendError::Network(
                "injected subscribe failure".to_string(),
            ));
        }
        let id = self.next_subscription.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write();
        if !state.conversations.contains_key(conversation_id) {
            return Err(BackendError::NotFound(format!(
                "conversation {conversation_id}"
            )));
        }
        if let Some(newest) = state.logs.get(conversation_id).and_then(MessageLog::last) {
            let _ = sink.send(LiveEvent::Message(newest.clone()));
        }
        state.subscribers.insert(
            id,
            Subscriber {
                conversation_id: conversation_id.to_string(),
                sink,
            },
        );
        Ok(SubscriptionHandle(id))
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.state.write().subscribers.remove(&handle.0);
    }

    async fn send_text_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        body: &str,
    ) -> Result<(), BackendError> {
        self.persist(
            conversation_id,
            sender_id,
            MessageKind::Text,
            MediaFields::default(),
            body,
        )
    }

    async fn send_media_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        kind: MessageKind,
        media: MediaFields,
        body: &str,
    ) -> Result<(), BackendError> {
        if !kind.is_media() {
            return Err(BackendError::Rejected(format!(
                "{kind} is not a media kind"
            )));
        }
        self.persist(conversation_id, sender_id, kind, media, body)
    }

    async fn upload_blob(
        &self,
        bytes: Vec<u8>,
        category: UploadCategory,
    ) -> Result<String, BackendError> {
        let (delay, fail) = {
            let mut faults = self.faults.lock();
            let fail = faults
                .upload_failures
                .get_mut(&category)
                .map(take_fault)
                .unwrap_or(false);
            (faults.upload_delay, fail)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(BackendError::Network(format!(
                "injected upload failure ({})",
                category.folder()
            )));
        }
        let seq = self.next_blob.fetch_add(1, Ordering::SeqCst);
        let url = format!("mem://{}/blob-{seq:06}", category.folder());
        self.state.write().blobs.insert(url.clone(), bytes);
        Ok(url)
    }

    async fn add_reaction(
        &self,
        message_id: &str,
        conversation_id: &str,
        participant_id: &str,
        emoji: &str,
    ) -> Result<u32, BackendError> {
        let mut state = self.state.write();
        let message = state
            .logs
            .get_mut(conversation_id)
            .and_then(|log| log.get_mut(message_id))
            .ok_or_else(|| BackendError::NotFound(format!("message {message_id}")))?;
        Ok(message.reactions.apply(participant_id, emoji))
    }
}

#[cfg(test)]
mod tests {
    use chatroom_backend_traits::{AdminEvent, Participant};

    use super::*;

    fn conversation(id: &str, members: &[&str]) -> Conversation {
        Conversation {
            id: id.to_string(),
            name: None,
            created_by: members[0].to_string(),
            creation_timestamp_ms: 0,
            member_ids: members.iter().map(|m| m.to_string()).collect(),
            admin_ids: vec![members[0].to_string()],
            members: members
                .iter()
                .map(|m| Participant {
                    id: m.to_string(),
                    display_name: m.to_uppercase(),
                    profile_image_url: None,
                })
                .collect(),
            last_message_preview: String::new(),
            last_message_timestamp_ms: 0,
            last_message_kind: MessageKind::Admin(AdminEvent::ChannelCreation),
        }
    }

    fn backend_with_chat() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend.insert_conversation(conversation("c1", &["me", "alice"]));
        backend
    }

    #[tokio::test]
    async fn send_updates_preview_and_orders_timestamps() {
        let backend = backend_with_chat();
        backend.seed_message("c1", "alice", MessageKind::Text, "old", i64::MAX / 2);
        backend.send_text_message("c1", "me", "newer").await.unwrap();

        let messages = backend.messages("c1");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].body, "newer");
        assert!(messages[1].timestamp_ms > messages[0].timestamp_ms);

        let conv = backend.conversation("c1").unwrap();
        assert_eq!(conv.last_message_preview, "newer");
        assert_eq!(conv.last_message_kind, MessageKind::Text);
    }

    #[tokio::test]
    async fn subscription_replays_newest_then_streams() {
        let backend = backend_with_chat();
        let seeded = backend.seed_message("c1", "alice", MessageKind::Text, "hi", 1);
        let (tx, rx) = flume::unbounded();
        let handle = backend.subscribe_to_new_messages("c1", tx).await.unwrap();

        assert_eq!(rx.recv().unwrap(), LiveEvent::Message(seeded));
        backend.send_text_message("c1", "me", "yo").await.unwrap();
        match rx.recv().unwrap() {
            LiveEvent::Message(m) => assert_eq!(m.body, "yo"),
            other => panic!("unexpected {other:?}"),
        }

        backend.unsubscribe(handle).await;
        assert_eq!(backend.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn dropped_subscriptions_report_failure() {
        let backend = backend_with_chat();
        let (tx, rx) = flume::unbounded();
        backend.subscribe_to_new_messages("c1", tx).await.unwrap();
        backend.drop_subscriptions("socket closed");
        assert_eq!(rx.recv().unwrap(), LiveEvent::Failed("socket closed".into()));
        assert_eq!(backend.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn injected_faults_fire_once() {
        let backend = backend_with_chat();
        backend.fail_next_fetches(1);
        assert!(backend.fetch_message_page("c1", None, 5).await.is_err());
        assert!(backend.fetch_message_page("c1", None, 5).await.is_ok());
        assert_eq!(backend.page_fetch_count(), 2);

        backend.fail_next_uploads(UploadCategory::VoiceMessage, 1);
        assert!(
            backend
                .upload_blob(vec![1], UploadCategory::VoiceMessage)
                .await
                .is_err()
        );
        let url = backend
            .upload_blob(vec![1, 2], UploadCategory::VoiceMessage)
            .await
            .unwrap();
        assert!(url.starts_with("mem://voice_message/"));
        assert_eq!(backend.blob(&url), Some(vec![1, 2]));
    }

    #[tokio::test]
    async fn media_send_rejects_text_kind() {
        let backend = backend_with_chat();
        let err = backend
            .send_media_message("c1", "me", MessageKind::Text, MediaFields::default(), "")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected(_)));
    }

    #[tokio::test]
    async fn reactions_replace_per_participant() {
        let backend = backend_with_chat();
        let m = backend.seed_message("c1", "alice", MessageKind::Text, "hi", 1);
        assert_eq!(backend.add_reaction(&m.id, "c1", "me", "👍").await.unwrap(), 1);
        assert_eq!(backend.add_reaction(&m.id, "c1", "me", "❤️").await.unwrap(), 1);
        let stored = &backend.messages("c1")[0];
        assert_eq!(stored.reactions.count_of("👍"), 0);
        assert_eq!(stored.reactions.emoji_of("me"), Some("❤️"));
    }

    #[tokio::test]
    async fn first_message_id_tracks_oldest() {
        let backend = backend_with_chat();
        assert_eq!(backend.fetch_first_message_id("c1").await.unwrap(), None);
        let first = backend.seed_message("c1", "alice", MessageKind::Text, "a", 5);
        backend.seed_message("c1", "alice", MessageKind::Text, "b", 9);
        assert_eq!(
            backend.fetch_first_message_id("c1").await.unwrap(),
            Some(first.id)
        );
        assert!(backend.fetch_first_message_id("nope").await.is_err());
    }
}
