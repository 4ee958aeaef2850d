use crate::error::IngestError;
use crate::extract::{ExportReader, ExtractOptions, read_export};
use crate::model::{Fact, SourcedFact};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::debug;

/// Concatenation of per-file fact streams, opening each export only once the
/// previous one is exhausted.
pub struct Concat {
    files: std::vec::IntoIter<PathBuf>,
    options: ExtractOptions,
    index: usize,
    total: usize,
    current: Option<ExportReader>,
}

impl Concat {
    pub fn new(files: Vec<PathBuf>, options: &ExtractOptions) -> Self {
        Self {
            total: files.len(),
            files: files.into_iter(),
            options: options.clone(),
            index: 0,
            current: None,
        }
    }

    /// Number of exports opened so far.
    pub fn opened(&self) -> usize {
        self.index
    }
}

impl Iterator for Concat {
    type Item = Result<SourcedFact, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(reader) = self.current.as_mut() {
                if let Some(item) = reader.next() {
                    return Some(item);
                }
                self.current = None;
            }
            let path = self.files.next()?;
            self.index += 1;
            debug!(
                path = %path.display(),
                index = self.index,
                total = self.total,
                "processing {} {}/{}",
                path.display(),
                self.index,
                self.total
            );
            self.current = Some(read_export(&path, &self.options));
        }
    }
}

/// Drops facts structurally equal to one already emitted. Errors always pass.
pub struct Dedup<I> {
    inner: I,
    seen: HashSet<Fact>,
    duplicates: usize,
}

impl<I> Dedup<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            seen: HashSet::new(),
            duplicates: 0,
        }
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn get_ref(&self) -> &I {
        &self.inner
    }
}

impl<I> Iterator for Dedup<I>
where
    I: Iterator<Item = Result<SourcedFact, IngestError>>,
{
    type Item = Result<SourcedFact, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok(sourced) => {
                    if self.seen.contains(&sourced.fact) {
                        self.duplicates += 1;
                        debug!(
                            kind = sourced.fact.kind(),
                            id = sourced.fact.id(),
                            origin = %sourced.origin.display(),
                            "duplicate fact"
                        );
                        continue;
                    }
                    self.seen.insert(sourced.fact.clone());
                    return Some(Ok(sourced));
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

pub fn dedup<I>(items: I) -> Dedup<I::IntoIter>
where
    I: IntoIterator<Item = Result<SourcedFact, IngestError>>,
{
    Dedup::new(items.into_iter())
}

/// Deduplicated fact stream over `files`, in the order given.
///
/// No global re-sort happens here: chronology across files is only as good
/// as the file order.
pub fn merge(files: Vec<PathBuf>, options: &ExtractOptions) -> Dedup<Concat> {
    Dedup::new(Concat::new(files, options))
}
