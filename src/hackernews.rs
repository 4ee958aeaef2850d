//! Hacker News items from a dogsheep `hacker-news-to-sqlite` export.
//!
//! A single table, read as-is: no cross-referencing and no merging across
//! snapshots. Only the newest export is used.

use crate::db;
use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use serde::Serialize;
use std::path::{Path, PathBuf};

const ITEMS: &str = "SELECT id, type, time, title, text, url FROM items ORDER BY time";

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Item {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub created: DateTime<Utc>,
    /// Stories only.
    pub title: Option<String>,
    pub text_html: Option<String>,
    pub url: Option<String>,
}

impl Item {
    pub fn permalink(&self) -> String {
        format!("https://news.ycombinator.com/item?id={}", self.id)
    }
}

/// The lexicographically greatest path, i.e. the most recent dated export.
pub fn latest_export(files: &[PathBuf]) -> Option<&Path> {
    files.iter().max().map(PathBuf::as_path)
}

struct ItemRow {
    id: Value,
    kind: String,
    time: Option<i64>,
    title: Option<String>,
    text_html: Option<String>,
    url: Option<String>,
}

fn decode_item(row: ItemRow) -> Result<Item> {
    let id = match row.id {
        Value::Integer(value) => value.to_string(),
        Value::Text(value) => value,
        other => bail!("item id has unexpected type {:?}", other.data_type()),
    };
    let time = row.time.ok_or_else(|| anyhow!("item {id} has no time"))?;
    let created = DateTime::from_timestamp(time, 0)
        .ok_or_else(|| anyhow!("item {id} has out-of-range time {time}"))?;
    Ok(Item {
        id,
        kind: row.kind,
        created,
        title: row.title,
        text_html: row.text_html,
        url: row.url,
    })
}

/// Items in time order. Rows are fetched up front and decoded one at a time,
/// so a bad row surfaces as its own error and the rest still come through.
pub fn items(path: &Path) -> Result<impl Iterator<Item = Result<Item>>> {
    let conn = db::open_export(path).with_context(|| format!("open {}", path.display()))?;
    let mut stmt = conn
        .prepare(ITEMS)
        .with_context(|| format!("query items in {}", path.display()))?;
    let rows: Vec<rusqlite::Result<ItemRow>> = stmt
        .query_map([], |row| {
            Ok(ItemRow {
                id: row.get("id")?,
                kind: row.get("type")?,
                time: row.get("time")?,
                title: row.get("title")?,
                text_html: row.get("text")?,
                url: row.get("url")?,
            })
        })?
        .collect();
    Ok(rows
        .into_iter()
        .map(|row| decode_item(row?)))
}
