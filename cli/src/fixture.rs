use std::path::Path;

use anyhow::{Context, Result};
use chatroom_backend_traits::{AdminEvent, Conversation, MessageKind, Participant};
use chatroom_memory_backend::MemoryBackend;
use serde::Deserialize;

const HOUR_MS: i64 = 3_600_000;

/// Conversations and history loaded into the in-memory backend at startup.
#[derive(Debug, Deserialize)]
pub struct Fixture {
    pub conversations: Vec<Conversation>,
    #[serde(default)]
    pub messages: Vec<SeedMessage>,
}

#[derive(Debug, Deserialize)]
pub struct SeedMessage {
    pub conversation_id: String,
    pub sender_id: String,
    pub kind: MessageKind,
    #[serde(default)]
    pub body: String,
    pub timestamp_ms: i64,
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path).with_context(|| format!("read fixture {}", path.display()))?;
        serde_json::from_slice(&raw).with_context(|| format!("parse fixture {}", path.display()))
    }

    /// A three-person group with two days of history ending `now_ms`.
    pub fn demo(user_id: &str, now_ms: i64) -> Self {
        let member = |id: &str, name: &str| Participant {
            id: id.to_string(),
            display_name: name.to_string(),
            profile_image_url: None,
        };
        let start = now_ms - 30 * HOUR_MS;
        let conversation = Conversation {
            id: "demo".to_string(),
            name: None,
            created_by: "alice".to_string(),
            creation_timestamp_ms: start,
            member_ids: vec!["alice".into(), "bob".into(), user_id.to_string()],
            admin_ids: vec!["alice".into()],
            members: vec![
                member("alice", "Alice"),
                member("bob", "Bob"),
                member(user_id, "Me"),
            ],
            last_message_preview: String::new(),
            last_message_timestamp_ms: start,
            last_message_kind: MessageKind::Admin(AdminEvent::ChannelCreation),
        };

        let lines = [
            ("alice", "anyone up for dinner?"),
            ("alice", "thinking thai"),
            ("bob", "in"),
            (user_id, "same, 7pm?"),
            ("bob", "works"),
            ("alice", "booked"),
            ("alice", "running 10 late"),
            (user_id, "no rush"),
        ];
        let mut messages = vec![SeedMessage {
            conversation_id: "demo".into(),
            sender_id: "alice".into(),
            kind: MessageKind::Admin(AdminEvent::ChannelCreation),
            body: String::new(),
            timestamp_ms: start,
        }];
        messages.extend(lines.iter().enumerate().map(|(i, (sender, body))| SeedMessage {
            conversation_id: "demo".into(),
            sender_id: sender.to_string(),
            kind: MessageKind::Text,
            body: body.to_string(),
            timestamp_ms: start + (i as i64 + 1) * 4 * HOUR_MS,
        }));

        Self {
            conversations: vec![conversation],
            messages,
        }
    }

    pub fn seed(&self, backend: &MemoryBackend) {
        for conversation in &self.conversations {
            backend.insert_conversation(conversation.clone());
        }
        for m in &self.messages {
            backend.seed_message(&m.conversation_id, &m.sender_id, m.kind, &m.body, m.timestamp_ms);
        }
        tracing::debug!(
            conversations = self.conversations.len(),
            messages = self.messages.len(),
            "fixture seeded"
        );
    }
}
