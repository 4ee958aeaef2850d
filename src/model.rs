use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::rc::Rc;

#[derive(Debug, Serialize, Clone, PartialEq, Eq, Hash)]
pub struct Sender {
    pub id: String,
    /// Absent for reduced/deactivated accounts that messages still reference.
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq, Hash)]
pub struct Thread {
    pub id: String,
    pub name: Option<String>,
}

/// A message as it comes out of one export, with references still by id.
#[derive(Debug, Serialize, Clone, PartialEq, Eq, Hash)]
pub struct RawMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub text: Option<String>,
    pub thread_id: String,
    pub sender_id: String,
    pub reply_to_id: Option<String>,
}

/// One normalized unit of information extracted from an export row.
///
/// Equality is structural over every field; the merge stage relies on that to
/// collapse facts repeated across overlapping snapshots.
#[derive(Debug, Serialize, Clone, PartialEq, Eq, Hash)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Fact {
    Sender(Sender),
    Thread(Thread),
    Message(RawMessage),
}

impl Fact {
    pub fn kind(&self) -> &'static str {
        match self {
            Fact::Sender(_) => "sender",
            Fact::Thread(_) => "thread",
            Fact::Message(_) => "message",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Fact::Sender(sender) => &sender.id,
            Fact::Thread(thread) => &thread.id,
            Fact::Message(message) => &message.id,
        }
    }
}

/// A fact tagged with the export it was read from. Only `fact` takes part in
/// deduplication.
#[derive(Debug, Clone)]
pub struct SourcedFact {
    pub origin: Rc<Path>,
    pub fact: Fact,
}

impl SourcedFact {
    pub fn new(origin: Rc<Path>, fact: Fact) -> Self {
        Self { origin, fact }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub text: Option<String>,
    pub thread: Rc<Thread>,
    pub sender: Rc<Sender>,
    pub reply_to: Option<Rc<Message>>,
}

impl Message {
    pub fn reply_to_id(&self) -> Option<&str> {
        self.reply_to.as_deref().map(|parent| parent.id.as_str())
    }
}

/// A resolved entity as emitted by the graph builder.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Sender(Rc<Sender>),
    Thread(Rc<Thread>),
    Message(Rc<Message>),
}

impl Entity {
    pub fn kind(&self) -> &'static str {
        match self {
            Entity::Sender(_) => "sender",
            Entity::Thread(_) => "thread",
            Entity::Message(_) => "message",
        }
    }

    pub fn as_message(&self) -> Option<&Rc<Message>> {
        match self {
            Entity::Message(message) => Some(message),
            _ => None,
        }
    }

    pub fn record(&self) -> EntityRecord<'_> {
        match self {
            Entity::Sender(sender) => EntityRecord::Sender {
                id: &sender.id,
                name: sender.name.as_deref(),
            },
            Entity::Thread(thread) => EntityRecord::Thread {
                id: &thread.id,
                name: thread.name.as_deref(),
            },
            Entity::Message(message) => EntityRecord::message(message),
        }
    }
}

/// Flat, serializable view of an [`Entity`]. References are rendered by id so
/// reply chains are never embedded recursively.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityRecord<'a> {
    Sender {
        id: &'a str,
        name: Option<&'a str>,
    },
    Thread {
        id: &'a str,
        name: Option<&'a str>,
    },
    Message {
        id: &'a str,
        timestamp: DateTime<Utc>,
        text: Option<&'a str>,
        thread_id: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        thread_name: Option<&'a str>,
        sender_id: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        sender_name: Option<&'a str>,
        reply_to_id: Option<&'a str>,
    },
}

impl<'a> EntityRecord<'a> {
    pub fn message(message: &'a Message) -> Self {
        EntityRecord::Message {
            id: &message.id,
            timestamp: message.timestamp,
            text: message.text.as_deref(),
            thread_id: &message.thread.id,
            thread_name: message.thread.name.as_deref(),
            sender_id: &message.sender.id,
            sender_name: message.sender.name.as_deref(),
            reply_to_id: message.reply_to_id(),
        }
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Default, Serialize, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub files: usize,
    pub senders: usize,
    pub threads: usize,
    pub messages: usize,
    pub replies_resolved: usize,
    pub replies_missing: usize,
    pub duplicates: usize,
    pub file_errors: usize,
    pub unresolved_senders: usize,
    pub unresolved_threads: usize,
    pub duration_ms: u64,
}

impl RunStats {
    pub fn errors(&self) -> usize {
        self.file_errors + self.unresolved_senders + self.unresolved_threads
    }
}
