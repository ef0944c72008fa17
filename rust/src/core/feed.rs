//! The ordered message list of one open conversation.
//!
//! `MessageFeed` is a plain state machine: it decides *whether* and *what* to
//! fetch, and merges whatever comes back. The actor owns the async side.

use chatroom_backend_traits::{BackendError, Message, MessagePage};

use crate::error::ChatRoomError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum FirstMessageId {
    Unknown,
    Known(Option<String>),
}

/// What the caller must fetch after `begin_load_older` succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PageRequest {
    pub(crate) before_cursor: Option<String>,
    pub(crate) page_size: usize,
    /// Set on the first load only.
    pub(crate) open_subscription: bool,
    /// Set until a first-message-id lookup succeeds (and none is in flight).
    pub(crate) fetch_first_message_id: bool,
}

/// Scroll instruction produced by a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FeedSignal {
    None,
    ScrollToBottom { animated: bool },
    RestoreScroll { message_id: String, index: usize },
}

#[derive(Debug)]
pub(crate) struct MessageFeed {
    conversation_id: String,
    page_size: usize,
    messages: Vec<Message>,
    cursor: Option<String>,
    first_message_id: FirstMessageId,
    first_lookup_in_flight: bool,
    subscription_requested: bool,
    // Some(cursor) while a page fetch is outstanding.
    in_flight: Option<Option<String>>,
    anchor: Option<String>,
    pages_loaded: usize,
    reached_start: bool,
}

impl MessageFeed {
    pub(crate) fn new(conversation_id: impl Into<String>, page_size: usize) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            page_size: page_size.max(1),
            messages: Vec::new(),
            cursor: None,
            first_message_id: FirstMessageId::Unknown,
            first_lookup_in_flight: false,
            subscription_requested: false,
            in_flight: None,
            anchor: None,
            pages_loaded: 0,
            reached_start: false,
        }
    }

    pub(crate) fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub(crate) fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub(crate) fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub(crate) fn contains(&self, message_id: &str) -> bool {
        self.messages.iter().any(|m| m.id == message_id)
    }

    pub(crate) fn message_mut(&mut self, message_id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == message_id)
    }

    /// No older history exists beyond what is loaded.
    pub(crate) fn is_exhausted(&self) -> bool {
        if self.reached_start {
            return true;
        }
        match &self.first_message_id {
            FirstMessageId::Known(Some(first)) => self.cursor.as_deref() == Some(first.as_str()),
            FirstMessageId::Known(None) => self.pages_loaded > 0,
            FirstMessageId::Unknown => false,
        }
    }

    /// Gate a page fetch. Returns `None` while a fetch is outstanding or once
    /// history is exhausted.
    ///
    /// `top_visible_id` is restored as the scroll anchor when a later page
    /// lands.
    pub(crate) fn begin_load_older(&mut self, top_visible_id: Option<String>) -> Option<PageRequest> {
        if self.is_loading() || self.is_exhausted() {
            return None;
        }
        self.in_flight = Some(self.cursor.clone());
        self.anchor = top_visible_id;

        let open_subscription = !self.subscription_requested;
        self.subscription_requested = true;

        let fetch_first_message_id =
            self.first_message_id == FirstMessageId::Unknown && !self.first_lookup_in_flight;
        if fetch_first_message_id {
            self.first_lookup_in_flight = true;
        }

        Some(PageRequest {
            before_cursor: self.cursor.clone(),
            page_size: self.page_size,
            open_subscription,
            fetch_first_message_id,
        })
    }

    /// Merge the outcome of the fetch started by `begin_load_older`.
    ///
    /// On failure nothing but the busy flag changes.
    pub(crate) fn finish_load_older(
        &mut self,
        result: Result<MessagePage, BackendError>,
    ) -> Result<FeedSignal, ChatRoomError> {
        let requested_cursor = self.in_flight.take().flatten();
        let anchor = self.anchor.take();
        let page = result.map_err(ChatRoomError::FetchFailed)?;

        if page.messages.is_empty() && requested_cursor.is_some() {
            self.reached_start = true;
        }
        let had_messages = !page.messages.is_empty();
        for message in page.messages {
            if !self.contains(&message.id) {
                self.messages.push(message);
            }
        }
        self.messages.sort_by(|a, b| a.display_order(b));
        if had_messages {
            self.cursor = self.messages.first().map(|m| m.id.clone());
        }
        self.pages_loaded += 1;

        if self.pages_loaded == 1 {
            return Ok(FeedSignal::ScrollToBottom { animated: false });
        }
        let signal = anchor
            .and_then(|id| {
                self.messages
                    .iter()
                    .position(|m| m.id == id)
                    .map(|index| FeedSignal::RestoreScroll {
                        message_id: id,
                        index,
                    })
            })
            .unwrap_or(FeedSignal::None);
        Ok(signal)
    }

    /// Cache the first-message-id lookup. A failed lookup is retried on the
    /// next `begin_load_older`.
    pub(crate) fn set_first_message_id(
        &mut self,
        result: Result<Option<String>, BackendError>,
    ) -> Result<(), ChatRoomError> {
        self.first_lookup_in_flight = false;
        let first = result.map_err(ChatRoomError::FetchFailed)?;
        self.first_message_id = FirstMessageId::Known(first);
        Ok(())
    }

    /// Tail-append from the live stream. Returns `None` for a replayed id.
    pub(crate) fn on_live_message(&mut self, message: Message) -> Option<FeedSignal> {
        if message.conversation_id != self.conversation_id || self.contains(&message.id) {
            return None;
        }
        let pos = self
            .messages
            .partition_point(|m| m.display_order(&message).is_lt());
        self.messages.insert(pos, message);
        Some(FeedSignal::ScrollToBottom { animated: true })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chatroom_backend_traits::{MediaFields, MessageKind, Reactions};

    use super::*;

    fn msg(id: &str, ts: i64) -> Message {
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

    fn page(ids: &[(&str, i64)]) -> MessagePage {
        MessagePage {
            messages: ids.iter().map(|(id, ts)| msg(id, *ts)).collect(),
            new_cursor: ids.first().map(|(id, _)| id.to_string()),
        }
    }

    fn ids(feed: &MessageFeed) -> Vec<&str> {
        feed.messages().iter().map(|m| m.id.as_str()).collect()
    }

    fn assert_sorted_unique(feed: &MessageFeed) {
        let msgs = feed.messages();
        for pair in msgs.windows(2) {
            assert!(pair[0].order_key() < pair[1].order_key(), "unsorted: {:?}", ids(feed));
        }
        let unique: HashSet<&str> = msgs.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(unique.len(), msgs.len(), "duplicate ids: {:?}", ids(feed));
    }

    #[derive(Clone, Copy, Debug)]
    enum Step {
        Page(usize),
        Live(usize),
    }

    #[test]
    fn every_interleaving_stays_sorted_and_unique() {
        // Two pages of history plus three live messages, one of which the
        // newest page also contains.
        let pages = [
            page(&[("m3", 30), ("m4", 40), ("m5", 50)]),
            page(&[("m0", 0), ("m1", 10), ("m2", 20)]),
        ];
        let live = [msg("m5", 50), msg("m6", 60), msg("m7", 60)];

        let steps = [
            Step::Page(0),
            Step::Page(1),
            Step::Live(0),
            Step::Live(1),
            Step::Live(2),
        ];
        let mut orders = vec![vec![]];
        for _ in 0..steps.len() {
            let mut next = Vec::new();
            for order in &orders {
                for (i, step) in steps.iter().enumerate() {
                    let used = order.iter().any(|(j, _): &(usize, Step)| *j == i);
                    if !used {
                        let mut o = order.clone();
                        o.push((i, *step));
                        next.push(o);
                    }
                }
            }
            orders = next;
        }
        assert_eq!(orders.len(), 120);

        for order in orders {
            let mut feed = MessageFeed::new("c1", 3);
            for (_, step) in &order {
                match step {
                    Step::Page(p) => {
                        feed.begin_load_older(None);
                        feed.finish_load_older(Ok(pages[*p].clone())).unwrap();
                    }
                    Step::Live(l) => {
                        feed.on_live_message(live[*l].clone());
                    }
                }
                assert_sorted_unique(&feed);
            }
            assert_eq!(ids(&feed), vec!["m0", "m1", "m2", "m3", "m4", "m5", "m6", "m7"]);
        }
    }

    #[test]
    fn second_load_while_busy_is_refused() {
        let mut feed = MessageFeed::new("c1", 5);
        let first = feed.begin_load_older(None).unwrap();
        assert_eq!(first.before_cursor, None);
        assert!(first.open_subscription);
        assert!(first.fetch_first_message_id);
        assert!(feed.is_loading());
        assert_eq!(feed.begin_load_older(None), None);

        feed.finish_load_older(Ok(page(&[("m5", 50), ("m6", 60)])))
            .unwrap();
        let second = feed.begin_load_older(Some("m5".into())).unwrap();
        assert_eq!(second.before_cursor.as_deref(), Some("m5"));
        assert!(!second.open_subscription);
        assert!(!second.fetch_first_message_id, "lookup still in flight");
    }

    #[test]
    fn exhausted_once_cursor_reaches_first_message() {
        let mut feed = MessageFeed::new("c1", 2);
        feed.begin_load_older(None).unwrap();
        feed.set_first_message_id(Ok(Some("m0".into()))).unwrap();
        feed.finish_load_older(Ok(page(&[("m2", 20), ("m3", 30)])))
            .unwrap();
        assert_eq!(feed.cursor(), Some("m2"));
        assert!(!feed.is_exhausted());

        feed.begin_load_older(Some("m2".into())).unwrap();
        feed.finish_load_older(Ok(page(&[("m0", 0), ("m1", 10)])))
            .unwrap();
        assert_eq!(feed.cursor(), Some("m0"));
        assert!(feed.is_exhausted());
        assert_eq!(feed.begin_load_older(Some("m0".into())), None);
    }

    #[test]
    fn empty_conversation_is_exhausted_after_first_page() {
        let mut feed = MessageFeed::new("c1", 5);
        feed.begin_load_older(None).unwrap();
        feed.set_first_message_id(Ok(None)).unwrap();
        assert!(!feed.is_exhausted());
        let signal = feed.finish_load_older(Ok(MessagePage::default())).unwrap();
        assert_eq!(signal, FeedSignal::ScrollToBottom { animated: false });
        assert!(feed.is_exhausted());
    }

    #[test]
    fn empty_older_page_marks_start_without_first_id() {
        let mut feed = MessageFeed::new("c1", 2);
        feed.begin_load_older(None).unwrap();
        feed.set_first_message_id(Err(BackendError::Network("down".into())))
            .unwrap_err();
        feed.finish_load_older(Ok(page(&[("m0", 0), ("m1", 10)])))
            .unwrap();
        assert!(!feed.is_exhausted());

        let retry = feed.begin_load_older(Some("m0".into())).unwrap();
        assert!(retry.fetch_first_message_id, "failed lookup is retried");
        feed.finish_load_older(Ok(MessagePage {
            messages: vec![],
            new_cursor: Some("m0".into()),
        }))
        .unwrap();
        assert!(feed.is_exhausted());
    }

    #[test]
    fn failed_fetch_leaves_state_unchanged() {
        let mut feed = MessageFeed::new("c1", 2);
        feed.begin_load_older(None).unwrap();
        feed.finish_load_older(Ok(page(&[("m2", 20), ("m3", 30)])))
            .unwrap();

        feed.begin_load_older(Some("m2".into())).unwrap();
        let err = feed
            .finish_load_older(Err(BackendError::Network("timeout".into())))
            .unwrap_err();
        assert!(matches!(err, ChatRoomError::FetchFailed(_)));
        assert!(!feed.is_loading());
        assert_eq!(feed.cursor(), Some("m2"));
        assert_eq!(ids(&feed), vec!["m2", "m3"]);

        let retry = feed.begin_load_older(Some("m2".into())).unwrap();
        assert_eq!(retry.before_cursor.as_deref(), Some("m2"));
    }

    #[test]
    fn later_pages_restore_the_previous_top_row() {
        let mut feed = MessageFeed::new("c1", 2);
        feed.begin_load_older(None).unwrap();
        feed.finish_load_older(Ok(page(&[("m2", 20), ("m3", 30)])))
            .unwrap();
        feed.begin_load_older(Some("m2".into())).unwrap();
        let signal = feed
            .finish_load_older(Ok(page(&[("m0", 0), ("m1", 10)])))
            .unwrap();
        assert_eq!(
            signal,
            FeedSignal::RestoreScroll {
                message_id: "m2".into(),
                index: 2
            }
        );
    }

    #[test]
    fn live_replay_is_dropped_silently() {
        let mut feed = MessageFeed::new("c1", 5);
        assert_eq!(
            feed.on_live_message(msg("m1", 10)),
            Some(FeedSignal::ScrollToBottom { animated: true })
        );
        assert_eq!(feed.on_live_message(msg("m1", 10)), None);
        assert_eq!(ids(&feed), vec!["m1"]);
        // Live messages never move the cursor.
        assert_eq!(feed.cursor(), None);
    }

    #[test]
    fn live_message_for_another_conversation_is_ignored() {
        let mut feed = MessageFeed::new("c1", 5);
        let mut other = msg("m9", 10);
        other.conversation_id = "c2".to_string();
        assert_eq!(feed.on_live_message(other), None);
        assert!(feed.messages().is_empty());
    }
}
