use crate::model::RawMessage;
use std::error::Error as _;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A composite key that does not have the shape the export format promises.
/// Seeing one means the format changed underneath us, so the current file's
/// pass stops.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("user key {0:?} lacks the FACEBOOK: prefix")]
    MissingUserPrefix(String),
    #[error("thread key {0:?} has no id segment")]
    MalformedThreadKey(String),
    #[error("message {msg_id} has no sender user_key")]
    MissingSenderKey { msg_id: String },
    #[error("participant {user_key:?} of thread {thread_key:?} is not in thread_users")]
    UnknownParticipant {
        thread_key: String,
        user_key: String,
    },
    #[error("thread {0:?} has no name and no participants to name it after")]
    NoParticipants(String),
}

/// Failure inside a single export file's pass.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("open export database")]
    Open(#[source] rusqlite::Error),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error("message {msg_id} has out-of-range timestamp {millis}ms")]
    Timestamp { msg_id: String, millis: i64 },
    #[error("{count} messages have no timestamp_ms")]
    UntimedMessages { count: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Sender(String),
    Thread(String),
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Sender(id) => write!(f, "sender {id}"),
            Reference::Thread(id) => write!(f, "thread {id}"),
        }
    }
}

/// Recoverable errors, emitted as values in the output stream.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("while processing {}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: ExtractError,
    },
    #[error("message {} in {} references unknown {reference}", .message.id, .origin.display())]
    Unresolved {
        origin: PathBuf,
        message: RawMessage,
        reference: Reference,
    },
}

impl IngestError {
    pub fn file(path: &Path, source: impl Into<ExtractError>) -> Self {
        IngestError::File {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::File { .. } => "file",
            IngestError::Unresolved {
                reference: Reference::Sender(_),
                ..
            } => "unresolved_sender",
            IngestError::Unresolved {
                reference: Reference::Thread(_),
                ..
            } => "unresolved_thread",
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            IngestError::File { path, .. } => path,
            IngestError::Unresolved { origin, .. } => origin,
        }
    }

    /// The error and its causes joined with ": ".
    pub fn describe(&self) -> String {
        let mut out = self.to_string();
        let mut cause = self.source();
        while let Some(err) = cause {
            out.push_str(": ");
            out.push_str(&err.to_string());
            cause = err.source();
        }
        out
    }
}
