//! Row-level decoding of messenger export tables into [`Fact`]s.
//!
//! Everything here works on plain row structs so it can be exercised without a
//! database. The extractor is responsible for reading those rows in the right
//! order.

use crate::error::{ExtractError, KeyError};
use crate::model::{RawMessage, Sender, Thread};
use chrono::DateTime;
use std::collections::HashMap;

pub const USER_KEY_PREFIX: &str = "FACEBOOK:";

/// Thread category with no conversational content; always skipped.
pub const MONTAGE_CATEGORY: &str = "MONTAGE";

/// Rows with no retrievable content.
pub const MSG_TYPE_TOMBSTONE: i64 = -1;
/// "X left the group" notices, which may reference users that no longer exist.
pub const MSG_TYPE_LEFT_GROUP: i64 = 2;

pub const FILTERED_MSG_TYPES: &[i64] = &[MSG_TYPE_TOMBSTONE, MSG_TYPE_LEFT_GROUP];

#[derive(Debug, Clone)]
pub struct SenderRow {
    pub user_key: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ParticipantRow {
    pub thread_key: String,
    pub user_key: String,
}

#[derive(Debug, Clone)]
pub struct ThreadRow {
    pub thread_key: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub msg_id: String,
    pub timestamp_ms: i64,
    pub text: Option<String>,
    pub thread_key: String,
    /// `sender.user_key` pulled out of the JSON `sender` column.
    pub user_key: Option<String>,
    pub reply_to_id: Option<String>,
}

/// `FACEBOOK:<id>` -> `<id>`.
pub fn normalise_user_id(key: &str) -> Result<String, KeyError> {
    key.strip_prefix(USER_KEY_PREFIX)
        .map(str::to_string)
        .ok_or_else(|| KeyError::MissingUserPrefix(key.to_string()))
}

/// Second `:` segment of a thread key. Covers both `GROUP:<group_id>` and
/// `ONE_TO_ONE:<other_user>:<own_user>`.
pub fn normalise_thread_id(key: &str) -> Result<String, KeyError> {
    key.split(':')
        .nth(1)
        .map(str::to_string)
        .ok_or_else(|| KeyError::MalformedThreadKey(key.to_string()))
}

pub fn thread_category(key: &str) -> &str {
    key.split_once(':').map_or(key, |(category, _)| category)
}

pub fn self_user_key(self_id: &str) -> String {
    format!("{USER_KEY_PREFIX}{self_id}")
}

pub fn decode_sender(row: &SenderRow) -> Result<Sender, KeyError> {
    Ok(Sender {
        id: normalise_user_id(&row.user_key)?,
        name: row.name.clone(),
    })
}

/// Per-file lookup of thread participants, used only to synthesize names for
/// untitled threads.
#[derive(Debug, Default)]
pub struct ParticipantIndex {
    self_key: Option<String>,
    senders: HashMap<String, Sender>,
    threads: HashMap<String, Vec<Sender>>,
}

impl ParticipantIndex {
    pub fn new(self_id: Option<&str>) -> Self {
        Self {
            self_key: self_id.map(self_user_key),
            ..Self::default()
        }
    }

    /// Senders are keyed by their full composite user key, the same form
    /// participant rows use.
    pub fn add_sender(&mut self, user_key: String, sender: Sender) {
        self.senders.insert(user_key, sender);
    }

    /// Returns `false` when the participant was excluded as the account owner.
    pub fn add_participant(&mut self, row: &ParticipantRow) -> Result<bool, KeyError> {
        if self.self_key.as_deref() == Some(row.user_key.as_str()) {
            return Ok(false);
        }
        let sender = self
            .senders
            .get(&row.user_key)
            .cloned()
            .ok_or_else(|| KeyError::UnknownParticipant {
                thread_key: row.thread_key.clone(),
                user_key: row.user_key.clone(),
            })?;
        self.threads
            .entry(row.thread_key.clone())
            .or_default()
            .push(sender);
        Ok(true)
    }

    /// `None` when the thread has no participants besides the account owner.
    pub fn participants(&self, thread_key: &str) -> Option<&[Sender]> {
        self.threads.get(thread_key).map(Vec::as_slice)
    }
}

/// Joins participant names (or bare ids for unnamed ones) in participant order.
pub fn synthesize_thread_name(participants: &[Sender]) -> Option<String> {
    if participants.is_empty() {
        return None;
    }
    let names: Vec<&str> = participants
        .iter()
        .map(|sender| sender.name.as_deref().unwrap_or(&sender.id))
        .collect();
    Some(names.join(", "))
}

/// `Ok(None)` for thread categories that are skipped outright.
pub fn decode_thread(
    row: &ThreadRow,
    participants: &ParticipantIndex,
) -> Result<Option<Thread>, KeyError> {
    if thread_category(&row.thread_key) == MONTAGE_CATEGORY {
        return Ok(None);
    }
    let name = match &row.name {
        Some(name) => Some(name.clone()),
        None => participants
            .participants(&row.thread_key)
            .and_then(synthesize_thread_name)
            .ok_or_else(|| KeyError::NoParticipants(row.thread_key.clone()))
            .map(Some)?,
    };
    Ok(Some(Thread {
        id: normalise_thread_id(&row.thread_key)?,
        name,
    }))
}

pub fn decode_message(row: MessageRow) -> Result<RawMessage, ExtractError> {
    let timestamp =
        DateTime::from_timestamp_millis(row.timestamp_ms).ok_or_else(|| ExtractError::Timestamp {
            msg_id: row.msg_id.clone(),
            millis: row.timestamp_ms,
        })?;
    let user_key = row.user_key.ok_or_else(|| KeyError::MissingSenderKey {
        msg_id: row.msg_id.clone(),
    })?;
    Ok(RawMessage {
        thread_id: normalise_thread_id(&row.thread_key)?,
        sender_id: normalise_user_id(&user_key)?,
        id: row.msg_id,
        timestamp,
        text: row.text,
        reply_to_id: row.reply_to_id,
    })
}
