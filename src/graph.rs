//! Second phase: fold the deduplicated fact stream into linked entities.
//!
//! Resolution is single-pass. A message can only point at senders, threads and
//! parent messages that came before it in the stream; nothing is deferred or
//! retried once the stream moves on.

use crate::error::{IngestError, Reference};
use crate::model::{Entity, Fact, Message, RawMessage, Sender, SourcedFact, Thread};
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResolveCounts {
    pub replies_resolved: usize,
    /// `reply_to_id` was set but no earlier message had that id.
    pub replies_missing: usize,
}

/// Lookup tables for one run. Created empty, dropped with the run.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    senders: HashMap<String, Rc<Sender>>,
    threads: HashMap<String, Rc<Thread>>,
    messages: HashMap<String, Rc<Message>>,
    counts: ResolveCounts,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> ResolveCounts {
        self.counts
    }

    /// Process one item of the merged stream.
    pub fn accept(
        &mut self,
        item: Result<SourcedFact, IngestError>,
    ) -> Result<Entity, IngestError> {
        let SourcedFact { origin, fact } = item?;
        match fact {
            Fact::Sender(sender) => {
                let sender = Rc::new(sender);
                self.senders.insert(sender.id.clone(), sender.clone());
                Ok(Entity::Sender(sender))
            }
            Fact::Thread(thread) => {
                let thread = Rc::new(thread);
                self.threads.insert(thread.id.clone(), thread.clone());
                Ok(Entity::Thread(thread))
            }
            Fact::Message(raw) => self.resolve_message(&origin, raw).map(Entity::Message),
        }
    }

    fn resolve_message(
        &mut self,
        origin: &Path,
        raw: RawMessage,
    ) -> Result<Rc<Message>, IngestError> {
        let Some(sender) = self.senders.get(&raw.sender_id).cloned() else {
            let reference = Reference::Sender(raw.sender_id.clone());
            return Err(unresolved(origin, raw, reference));
        };
        let Some(thread) = self.threads.get(&raw.thread_id).cloned() else {
            let reference = Reference::Thread(raw.thread_id.clone());
            return Err(unresolved(origin, raw, reference));
        };

        // Exports routinely omit history, so a missing parent is not an error.
        let reply_to = match raw.reply_to_id.as_deref() {
            Some(parent_id) => {
                let parent = self.messages.get(parent_id).cloned();
                if parent.is_some() {
                    self.counts.replies_resolved += 1;
                } else {
                    self.counts.replies_missing += 1;
                }
                parent
            }
            None => None,
        };

        let message = Rc::new(Message {
            id: raw.id,
            timestamp: raw.timestamp,
            text: raw.text,
            thread,
            sender,
            reply_to,
        });
        self.messages.insert(message.id.clone(), message.clone());
        Ok(message)
    }

    pub fn resolve<I>(self, items: I) -> Resolve<I::IntoIter>
    where
        I: IntoIterator<Item = Result<SourcedFact, IngestError>>,
    {
        Resolve {
            inner: items.into_iter(),
            builder: self,
        }
    }
}

fn unresolved(origin: &Path, message: RawMessage, reference: Reference) -> IngestError {
    IngestError::Unresolved {
        origin: origin.to_path_buf(),
        message,
        reference,
    }
}

/// Lazy adapter driving a [`GraphBuilder`] over a fact stream.
pub struct Resolve<I> {
    inner: I,
    builder: GraphBuilder,
}

impl<I> Resolve<I> {
    pub fn builder(&self) -> &GraphBuilder {
        &self.builder
    }

    pub fn get_ref(&self) -> &I {
        &self.inner
    }
}

impl<I> Iterator for Resolve<I>
where
    I: Iterator<Item = Result<SourcedFact, IngestError>>,
{
    type Item = Result<Entity, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next()?;
        Some(self.builder.accept(item))
    }
}

/// Messages and errors only; senders and threads are dropped.
pub fn messages<I>(entities: I) -> impl Iterator<Item = Result<Rc<Message>, IngestError>>
where
    I: IntoIterator<Item = Result<Entity, IngestError>>,
{
    entities.into_iter().filter_map(|item| match item {
        Ok(Entity::Message(message)) => Some(Ok(message)),
        Ok(Entity::Sender(_) | Entity::Thread(_)) => None,
        Err(err) => Some(Err(err)),
    })
}
