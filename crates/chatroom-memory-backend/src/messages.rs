//! Per-conversation message log and cursor paging.

use chatroom_backend_traits::{BackendError, Message, MessagePage};

/// Messages of one conversation, kept sorted by [`Message::display_order`].
#[derive(Debug, Default, Clone)]
pub(crate) struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub(crate) fn insert(&mut self, message: Message) {
        let pos = self
            .messages
            .partition_point(|m| m.display_order(&message).is_lt());
        self.messages.insert(pos, message);
    }

    pub(crate) fn first_id(&self) -> Option<String> {
        self.messages.first().map(|m| m.id.clone())
    }

    pub(crate) fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub(crate) fn last_timestamp_ms(&self) -> Option<i64> {
        self.messages.last().map(|m| m.timestamp_ms)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    pub(crate) fn all(&self) -> &[Message] {
        &self.messages
    }

    /// Up to `page_size` messages strictly older than `before_cursor`.
    ///
    /// `new_cursor` is the oldest id of the returned page, or the incoming
    /// cursor when nothing older exists.
    pub(crate) fn page(
        &self,
        before_cursor: Option<&str>,
        page_size: usize,
    ) -> Result<MessagePage, BackendError> {
        let end = match before_cursor {
            None => self.messages.len(),
            Some(cursor) => self
                .messages
                .iter()
                .position(|m| m.id == cursor)
                .ok_or_else(|| BackendError::NotFound(format!("cursor {cursor}")))?,
        };
        let start = end.saturating_sub(page_size);
        let messages = self.messages[start..end].to_vec();
        let new_cursor = messages
            .first()
            .map(|m| m.id.clone())
            .or_else(|| before_cursor.map(ToString::to_string));
        Ok(MessagePage {
            messages,
            new_cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use chatroom_backend_traits::{MediaFields, MessageKind, Reactions};

    use super::*;

    fn message(id: &str, ts: i64) -> Message {
        Message {
            id: id.to_string(),
            conversation_id: "c1".to_string(),
            sender_id: "u1".to_string(),
            kind: MessageKind::Text,
            body: id.to_string(),
            timestamp_ms: ts,
            media: MediaFields::default(),
            reactions: Reactions::default(),
        }
    }

    fn log_of(n: i64) -> MessageLog {
        let mut log = MessageLog::default();
        for i in 0..n {
            log.insert(message(&format!("m{i:02}"), i * 10));
        }
        log
    }

    fn ids(page: &MessagePage) -> Vec<&str> {
        page.messages.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn insert_keeps_display_order() {
        let mut log = MessageLog::default();
        log.insert(message("b", 20));
        log.insert(message("a", 10));
        log.insert(message("c", 20));
        let ids: Vec<&str> = log.all().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(log.first_id().as_deref(), Some("a"));
    }

    #[test]
    fn first_page_is_most_recent() {
        let log = log_of(12);
        let page = log.page(None, 5).unwrap();
        assert_eq!(ids(&page), vec!["m07", "m08", "m09", "m10", "m11"]);
        assert_eq!(page.new_cursor.as_deref(), Some("m07"));
    }

    #[test]
    fn pages_walk_backwards_to_the_first_message() {
        let log = log_of(12);
        let p1 = log.page(None, 5).unwrap();
        let p2 = log.page(p1.new_cursor.as_deref(), 5).unwrap();
        assert_eq!(ids(&p2), vec!["m02", "m03", "m04", "m05", "m06"]);
        let p3 = log.page(p2.new_cursor.as_deref(), 5).unwrap();
        assert_eq!(ids(&p3), vec!["m00", "m01"]);
        assert_eq!(p3.new_cursor, log.first_id());

        let p4 = log.page(p3.new_cursor.as_deref(), 5).unwrap();
        assert!(p4.messages.is_empty());
        assert_eq!(p4.new_cursor.as_deref(), Some("m00"));
    }

    #[test]
    fn unknown_cursor_is_not_found() {
        let log = log_of(3);
        assert!(matches!(
            log.page(Some("nope"), 5),
            Err(BackendError::NotFound(_))
        ));
    }

    #[test]
    fn empty_log_pages_are_empty() {
        let log = MessageLog::default();
        let page = log.page(None, 5).unwrap();
        assert!(page.messages.is_empty());
        assert_eq!(page.new_cursor, None);
    }
}
