//! transcript data model: messages, ids and the append-only session log.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::markup::{self, Segment};

/// who authored a message. fixed at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    User,
    Assistant,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::User => "user",
            Origin::Assistant => "assistant",
        }
    }

    pub fn is_user(self) -> bool {
        self == Origin::User
    }

    pub fn is_assistant(self) -> bool {
        self == Origin::Assistant
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// millisecond-timestamp message id, unique within a session.
///
/// ids come from an [`IdGenerator`], which bumps past the previous id when two
/// messages land in the same millisecond (or the clock steps backwards), so ids
/// are strictly increasing in creation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct IdGenerator {
    last: Option<u64>,
}

impl IdGenerator {
    pub fn next_id(&mut self) -> MessageId {
        self.next_from(now_millis())
    }

    fn next_from(&mut self, millis: u64) -> MessageId {
        let id = match self.last {
            Some(last) if millis <= last => last + 1,
            _ => millis,
        };
        self.last = Some(id);
        MessageId(id)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// a single transcript entry. fields are read-only once built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    text: String,
    origin: Origin,
}

impl Message {
    pub fn new(id: MessageId, origin: Origin, text: impl Into<String>) -> Self {
        Self { id, text: text.into(), origin }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    /// raw text: what the user typed, or the backend output with markers intact.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// render-time view of the text. assistant replies go through the markup
    /// parser; user text is shown verbatim.
    pub fn segments(&self) -> Vec<Segment<'_>> {
        match self.origin {
            Origin::Assistant => markup::parse(&self.text),
            Origin::User if self.text.is_empty() => Vec::new(),
            Origin::User => vec![Segment::plain(&self.text)],
        }
    }
}

/// ordered, append-only conversation log.
#[derive(Debug, Default)]
pub struct SessionLog {
    messages: Vec<Message>,
    ids: IdGenerator,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// create a message with a fresh id and append it. returns the new id.
    pub fn push(&mut self, origin: Origin, text: impl Into<String>) -> MessageId {
        let id = self.ids.next_id();
        self.messages.push(Message::new(id, origin, text));
        id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// owned copy for readers that outlive the borrow.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ids_disambiguate_within_one_tick() {
        let mut ids = IdGenerator::default();
        let a = ids.next_from(1_000);
        let b = ids.next_from(1_000);
        let c = ids.next_from(999);
        let d = ids.next_from(5_000);
        assert_eq!(
            [a.as_u64(), b.as_u64(), c.as_u64(), d.as_u64()],
            [1_000, 1_001, 1_002, 5_000]
        );
    }

    #[test]
    fn log_keeps_insertion_order_with_unique_ids() {
        let mut log = SessionLog::new();
        let ids: Vec<_> = (0..50).map(|i| log.push(Origin::User, format!("m{i}"))).collect();

        assert_eq!(log.len(), 50);
        for (i, m) in log.messages().iter().enumerate() {
            assert_eq!(m.id(), ids[i]);
            assert_eq!(m.text(), format!("m{i}"));
        }
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn snapshot_is_detached_from_later_appends() {
        let mut log = SessionLog::new();
        log.push(Origin::User, "hi");
        let snap = log.snapshot();
        log.push(Origin::Assistant, "hello");
        assert_eq!(snap.len(), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn segments_parse_assistant_text_only() {
        let mut log = SessionLog::new();
        let user = log.push(Origin::User, "say {{this}}");
        let bot = log.push(Origin::Assistant, "fine, {{this}}");

        assert_eq!(
            log.get(user).map(Message::segments),
            Some(vec![Segment::plain("say {{this}}")])
        );
        assert_eq!(
            log.get(bot).map(Message::segments),
            Some(vec![Segment::plain("fine, "), Segment::emphasized("this")])
        );
    }

    #[test]
    fn origin_serializes_lowercase() {
        let json = serde_json::to_string(&Origin::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
