use crate::error::{IngestError, Reference};
use crate::extract::ExtractOptions;
use crate::graph::{GraphBuilder, Resolve};
use crate::merge::{self, Concat, Dedup};
use crate::model::{Entity, RunStats};
use std::path::PathBuf;
use std::time::Instant;

/// Everything needed to run the reconciliation over a fixed list of exports.
#[derive(Debug, Clone)]
pub struct Pipeline {
    files: Vec<PathBuf>,
    options: ExtractOptions,
}

impl Pipeline {
    /// `files` is processed in the order given; pass oldest snapshot first.
    pub fn new(files: Vec<PathBuf>, options: ExtractOptions) -> Self {
        Self { files, options }
    }

    /// Phase one only: the deduplicated raw fact stream.
    pub fn facts(&self) -> Dedup<Concat> {
        merge::merge(self.files.clone(), &self.options)
    }

    /// Both phases. Every call starts a fresh run from the source files.
    pub fn entities(&self) -> Entities {
        Entities {
            inner: GraphBuilder::new().resolve(self.facts()),
            stats: RunStats::default(),
            started: Instant::now(),
        }
    }
}

/// Resolved entity stream that keeps running totals for reporting.
pub struct Entities {
    inner: Resolve<Dedup<Concat>>,
    stats: RunStats,
    started: Instant,
}

impl Entities {
    /// Totals for everything pulled so far.
    pub fn stats(&self) -> RunStats {
        let dedup = self.inner.get_ref();
        let counts = self.inner.builder().counts();
        RunStats {
            files: dedup.get_ref().opened(),
            duplicates: dedup.duplicates(),
            replies_resolved: counts.replies_resolved,
            replies_missing: counts.replies_missing,
            duration_ms: self.started.elapsed().as_millis() as u64,
            ..self.stats.clone()
        }
    }

    fn tally(&mut self, item: &Result<Entity, IngestError>) {
        match item {
            Ok(Entity::Sender(_)) => self.stats.senders += 1,
            Ok(Entity::Thread(_)) => self.stats.threads += 1,
            Ok(Entity::Message(_)) => self.stats.messages += 1,
            Err(IngestError::File { .. }) => self.stats.file_errors += 1,
            Err(IngestError::Unresolved { reference, .. }) => match reference {
                Reference::Sender(_) => self.stats.unresolved_senders += 1,
                Reference::Thread(_) => self.stats.unresolved_threads += 1,
            },
        }
    }
}

impl Iterator for Entities {
    type Item = Result<Entity, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next()?;
        self.tally(&item);
        Some(item)
    }
}
