use crate::decode::FILTERED_MSG_TYPES;

pub const SENDERS: &str = "SELECT user_key, name FROM thread_users ORDER BY rowid";

pub const PARTICIPANTS: &str = "SELECT thread_key, user_key FROM thread_participants ORDER BY rowid";

pub const THREADS: &str = "SELECT thread_key, name FROM threads ORDER BY rowid";

fn filtered_types() -> String {
    FILTERED_MSG_TYPES
        .iter()
        .map(|code| code.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Rows are not stored chronologically, so ordering happens here. `rowid`
/// breaks ties between equal timestamps and anchors the keyset cursor.
pub fn message_page() -> String {
    format!(
        "
        SELECT rowid AS row_id,
               msg_id,
               timestamp_ms,
               text,
               thread_key,
               message_replied_to_id,
               json_extract(sender, '$.user_key') AS user_key
        FROM messages
        WHERE msg_type NOT IN ({types})
          AND (timestamp_ms, rowid) > (?1, ?2)
        ORDER BY timestamp_ms, rowid
        LIMIT ?3
        ",
        types = filtered_types()
    )
}

pub fn untimed_messages() -> String {
    format!(
        "SELECT COUNT(*) FROM messages WHERE timestamp_ms IS NULL AND msg_type NOT IN ({types})",
        types = filtered_types()
    )
}
