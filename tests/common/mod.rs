#![allow(dead_code)]

use rusqlite::{Connection, params};
use serde_json::json;
use std::path::Path;

/// Builds a messenger `threads_db2`-shaped export for tests.
pub struct ExportBuilder {
    conn: Connection,
}

impl ExportBuilder {
    pub fn create(path: &Path) -> Self {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "
            CREATE TABLE thread_users (
                user_key TEXT PRIMARY KEY,
                name TEXT,
                messaging_actor_type TEXT
            );
            CREATE TABLE thread_participants (
                thread_key TEXT,
                user_key TEXT
            );
            CREATE TABLE threads (
                thread_key TEXT PRIMARY KEY,
                name TEXT
            );
            CREATE TABLE messages (
                msg_id TEXT PRIMARY KEY,
                thread_key TEXT,
                timestamp_ms INTEGER,
                text TEXT,
                sender TEXT,
                msg_type INTEGER,
                message_replied_to_id TEXT
            );
            ",
        )
        .unwrap();
        Self { conn }
    }

    pub fn user(self, user_key: &str, name: Option<&str>) -> Self {
        self.conn
            .execute(
                "INSERT INTO thread_users (user_key, name) VALUES (?1, ?2)",
                params![user_key, name],
            )
            .unwrap();
        self
    }

    pub fn participant(self, thread_key: &str, user_key: &str) -> Self {
        self.conn
            .execute(
                "INSERT INTO thread_participants (thread_key, user_key) VALUES (?1, ?2)",
                params![thread_key, user_key],
            )
            .unwrap();
        self
    }

    pub fn thread(self, thread_key: &str, name: Option<&str>) -> Self {
        self.conn
            .execute(
                "INSERT INTO threads (thread_key, name) VALUES (?1, ?2)",
                params![thread_key, name],
            )
            .unwrap();
        self
    }

    pub fn message(self, msg: Msg<'_>) -> Self {
        let sender = json!({ "user_key": msg.user_key, "name": "ignored" }).to_string();
        self.conn
            .execute(
                "INSERT INTO messages
                 (msg_id, timestamp_ms, thread_key, text, sender, msg_type, message_replied_to_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    msg.id,
                    msg.timestamp_ms,
                    msg.thread_key,
                    msg.text,
                    sender,
                    msg.msg_type,
                    msg.reply_to
                ],
            )
            .unwrap();
        self
    }

    pub fn done(self) {
        drop(self.conn);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Msg<'a> {
    pub id: &'a str,
    pub timestamp_ms: Option<i64>,
    pub text: Option<&'a str>,
    pub thread_key: &'a str,
    pub user_key: &'a str,
    pub msg_type: i64,
    pub reply_to: Option<&'a str>,
}

impl<'a> Msg<'a> {
    pub fn new(id: &'a str, timestamp_ms: i64, thread_key: &'a str, user_key: &'a str) -> Self {
        Self {
            id,
            timestamp_ms: Some(timestamp_ms),
            text: Some("hello"),
            thread_key,
            user_key,
            msg_type: 0,
            reply_to: None,
        }
    }

    pub fn reply_to(mut self, parent: &'a str) -> Self {
        self.reply_to = Some(parent);
        self
    }

    pub fn untimed(mut self) -> Self {
        self.timestamp_ms = None;
        self
    }

    pub fn msg_type(mut self, msg_type: i64) -> Self {
        self.msg_type = msg_type;
        self
    }

    pub fn text(mut self, text: &'a str) -> Self {
        self.text = Some(text);
        self
    }
}
