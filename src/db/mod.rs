use crate::decode::{MessageRow, ParticipantRow, SenderRow, ThreadRow};
use rusqlite::{Connection, OpenFlags, params};
use std::path::Path;

mod queries;

/// Position of the last message row read; the next page starts after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageCursor {
    pub timestamp_ms: i64,
    pub rowid: i64,
}

impl MessageCursor {
    pub const START: MessageCursor = MessageCursor {
        timestamp_ms: i64::MIN,
        rowid: i64::MIN,
    };
}

/// Open an export snapshot strictly read-only.
///
/// `immutable=1` tells SQLite the file cannot change under it, so no locks are
/// taken and no `-wal`/`-shm` files are created next to a copied device dump.
pub fn open_export(path: &Path) -> rusqlite::Result<Connection> {
    let uri = format!("file:{}?immutable=1", encode_uri_path(path));
    Connection::open_with_flags(
        uri,
        OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
}

fn encode_uri_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '%' => out.push_str("%25"),
            '?' => out.push_str("%3f"),
            '#' => out.push_str("%23"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn read_senders(conn: &Connection) -> rusqlite::Result<Vec<SenderRow>> {
    let mut stmt = conn.prepare(queries::SENDERS)?;
    let rows = stmt.query_map([], |row| {
        Ok(SenderRow {
            user_key: row.get("user_key")?,
            name: row.get("name")?,
        })
    })?;
    rows.collect()
}

pub fn read_participants(conn: &Connection) -> rusqlite::Result<Vec<ParticipantRow>> {
    let mut stmt = conn.prepare(queries::PARTICIPANTS)?;
    let rows = stmt.query_map([], |row| {
        Ok(ParticipantRow {
            thread_key: row.get("thread_key")?,
            user_key: row.get("user_key")?,
        })
    })?;
    rows.collect()
}

pub fn read_threads(conn: &Connection) -> rusqlite::Result<Vec<ThreadRow>> {
    let mut stmt = conn.prepare(queries::THREADS)?;
    let rows = stmt.query_map([], |row| {
        Ok(ThreadRow {
            thread_key: row.get("thread_key")?,
            name: row.get("name")?,
        })
    })?;
    rows.collect()
}

/// Up to `limit` message rows after `after`, in `(timestamp_ms, rowid)` order.
pub fn read_message_page(
    conn: &Connection,
    after: MessageCursor,
    limit: usize,
) -> rusqlite::Result<Vec<(MessageCursor, MessageRow)>> {
    let sql = queries::message_page();
    let mut stmt = conn.prepare_cached(&sql)?;
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = stmt.query_map(params![after.timestamp_ms, after.rowid, limit], |row| {
        let cursor = MessageCursor {
            timestamp_ms: row.get("timestamp_ms")?,
            rowid: row.get("row_id")?,
        };
        let message = MessageRow {
            msg_id: row.get("msg_id")?,
            timestamp_ms: cursor.timestamp_ms,
            text: row.get("text")?,
            thread_key: row.get("thread_key")?,
            user_key: row.get("user_key")?,
            reply_to_id: row.get("message_replied_to_id")?,
        };
        Ok((cursor, message))
    })?;
    rows.collect()
}

/// Messages the timestamp-ordered pager cannot reach.
pub fn count_untimed_messages(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row(&queries::untimed_messages(), [], |row| row.get(0))
}
