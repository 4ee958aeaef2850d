use crate::db::{self, MessageCursor};
use crate::decode::{self, ParticipantIndex};
use crate::error::{ExtractError, IngestError};
use crate::model::{Fact, SourcedFact};
use rusqlite::Connection;
use std::collections::VecDeque;
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, warn};

pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Account owner's bare id; excluded from thread participant lists.
    pub self_id: Option<String>,
    /// Message rows fetched per query.
    pub page_size: usize,
}

impl ExtractOptions {
    pub fn new(self_id: Option<String>) -> Self {
        Self {
            self_id,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::new(None)
    }
}

enum Stage {
    Pending,
    Messages {
        conn: Connection,
        cursor: MessageCursor,
    },
    Done,
}

#[derive(Debug, Default, Clone, Copy)]
struct ReaderStats {
    senders: usize,
    threads: usize,
    threads_skipped: usize,
    messages: usize,
}

/// Lazy fact stream for one export snapshot.
///
/// Senders, participants and threads are read together on the first pull;
/// messages follow page by page in timestamp order. The connection lives in
/// the reader and is dropped as soon as the file is exhausted or fails, or
/// when the reader itself is dropped.
pub struct ExportReader {
    path: Rc<Path>,
    options: ExtractOptions,
    stage: Stage,
    buffer: VecDeque<Result<SourcedFact, IngestError>>,
    stats: ReaderStats,
}

pub fn read_export(path: &Path, options: &ExtractOptions) -> ExportReader {
    ExportReader {
        path: Rc::from(path),
        options: options.clone(),
        stage: Stage::Pending,
        buffer: VecDeque::new(),
        stats: ReaderStats::default(),
    }
}

impl ExportReader {
    fn push(&mut self, fact: Fact) {
        self.buffer
            .push_back(Ok(SourcedFact::new(self.path.clone(), fact)));
    }

    fn fail(&mut self, err: impl Into<ExtractError>) {
        let err = IngestError::file(&self.path, err);
        warn!(path = %self.path.display(), "export pass aborted: {}", err.describe());
        self.buffer.push_back(Err(err));
    }

    fn start(&mut self) -> Stage {
        let conn = match db::open_export(&self.path) {
            Ok(conn) => conn,
            Err(err) => {
                self.fail(ExtractError::Open(err));
                return Stage::Done;
            }
        };
        match self.read_head(&conn) {
            Ok(()) => Stage::Messages {
                conn,
                cursor: MessageCursor::START,
            },
            Err(err) => {
                self.fail(err);
                Stage::Done
            }
        }
    }

    /// Senders must be indexed before participants, and participants before
    /// threads, since untitled threads are named after their participants.
    fn read_head(&mut self, conn: &Connection) -> Result<(), ExtractError> {
        let mut participants = ParticipantIndex::new(self.options.self_id.as_deref());

        for row in db::read_senders(conn)? {
            let sender = decode::decode_sender(&row)?;
            participants.add_sender(row.user_key, sender.clone());
            self.stats.senders += 1;
            self.push(Fact::Sender(sender));
        }

        for row in db::read_participants(conn)? {
            participants.add_participant(&row)?;
        }

        for row in db::read_threads(conn)? {
            match decode::decode_thread(&row, &participants)? {
                Some(thread) => {
                    self.stats.threads += 1;
                    self.push(Fact::Thread(thread));
                }
                None => self.stats.threads_skipped += 1,
            }
        }

        // NULL timestamps sort ahead of every message, so the pass cannot
        // get past them.
        let count = db::count_untimed_messages(conn)?;
        if count > 0 {
            return Err(ExtractError::UntimedMessages { count });
        }
        Ok(())
    }

    fn next_page(&mut self, conn: Connection, cursor: MessageCursor) -> Stage {
        let page_size = self.options.page_size.max(1);
        let rows = match db::read_message_page(&conn, cursor, page_size) {
            Ok(rows) => rows,
            Err(err) => {
                self.fail(err);
                return Stage::Done;
            }
        };
        let exhausted = rows.len() < page_size;
        let mut last = cursor;
        for (position, row) in rows {
            last = position;
            match decode::decode_message(row) {
                Ok(message) => {
                    self.stats.messages += 1;
                    self.push(Fact::Message(message));
                }
                Err(err) => {
                    self.fail(err);
                    return Stage::Done;
                }
            }
        }
        if exhausted {
            debug!(
                path = %self.path.display(),
                senders = self.stats.senders,
                threads = self.stats.threads,
                threads_skipped = self.stats.threads_skipped,
                messages = self.stats.messages,
                "export exhausted"
            );
            Stage::Done
        } else {
            Stage::Messages { conn, cursor: last }
        }
    }
}

impl Iterator for ExportReader {
    type Item = Result<SourcedFact, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(item);
            }
            self.stage = match std::mem::replace(&mut self.stage, Stage::Done) {
                Stage::Pending => self.start(),
                Stage::Messages { conn, cursor } => self.next_page(conn, cursor),
                Stage::Done => return None,
            };
        }
    }
}
