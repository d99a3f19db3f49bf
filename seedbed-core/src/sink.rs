use std::sync::Arc;

use crate::key::Key;
use crate::record::{AssignError, Instance};
use crate::schema::{CollectionDescription, Context};

/// The host side of a seeding run: receives inserted instances, executes
/// raw commands, and commits once after materialization.
pub trait RecordSink {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Stages an instance for insertion into a collection.
    fn insert(&mut self, collection: &CollectionDescription, instance: Instance) -> Result<(), Self::Error>;

    /// Executes a raw command against the backing store.
    fn execute(&mut self, command: &str) -> Result<(), Self::Error>;

    /// Persists every staged insertion as one unit.
    fn commit(&mut self) -> Result<(), Self::Error>;
}

/// Errors from [`MemorySink`].
#[derive(Debug, thiserror::Error)]
pub enum MemorySinkError {
    #[error("collection \"{collection}\" rejected an instance: {source}")]
    Insert {
        collection: String,
        #[source]
        source: AssignError,
    },
    #[error("command rejected: {0}")]
    Rejected(String),
}

/// One observable step taken by a [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Execute(String),
    Insert { collection: String, entity: &'static str },
    Commit { inserted: usize },
}

/// Seeds a typed [`Context`] held in memory.
///
/// Inserted instances stay pending until `commit` moves them into the
/// context, in insertion order.
pub struct MemorySink<C: Context> {
    context: C,
    pending: Vec<(String, Instance)>,
    executed: Vec<String>,
    journal: Vec<SinkEvent>,
    commits: usize,
    reject: Option<String>,
    stamp: Option<Key>,
}

impl<C: Context> MemorySink<C> {
    pub fn new(context: C) -> Self {
        MemorySink {
            context,
            pending: Vec::new(),
            executed: Vec::new(),
            journal: Vec::new(),
            commits: 0,
            reject: None,
            stamp: None,
        }
    }

    /// Makes `execute` fail for commands containing `pattern`.
    pub fn reject_commands_containing(mut self, pattern: impl Into<String>) -> Self {
        self.reject = Some(pattern.into());
        self
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn into_context(self) -> C {
        self.context
    }

    /// Commands executed so far, in order.
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    /// Every execute, insert, and commit, in the order they happened.
    pub fn journal(&self) -> &[SinkEvent] {
        &self.journal
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn commits(&self) -> usize {
        self.commits
    }

    /// Model stamp recorded by the last `create`.
    pub fn stamp(&self) -> Option<Key> {
        self.stamp
    }

    pub(crate) fn set_stamp(&mut self, stamp: Key) {
        self.stamp = Some(stamp);
    }

    /// Replaces the context with a fresh one and forgets every run.
    pub(crate) fn reset(&mut self, context: C) {
        self.context = context;
        self.pending.clear();
        self.executed.clear();
        self.journal.clear();
        self.commits = 0;
        self.stamp = None;
    }
}

impl<C: Context + Default> Default for MemorySink<C> {
    fn default() -> Self {
        Self::new(C::default())
    }
}

impl<C: Context> RecordSink for MemorySink<C> {
    type Error = MemorySinkError;

    fn insert(&mut self, collection: &CollectionDescription, instance: Instance) -> Result<(), Self::Error> {
        self.journal.push(SinkEvent::Insert {
            collection: collection.name().to_string(),
            entity: instance.entity_name(),
        });
        self.pending.push((collection.name().to_string(), instance));
        Ok(())
    }

    fn execute(&mut self, command: &str) -> Result<(), Self::Error> {
        if let Some(pattern) = &self.reject {
            if command.contains(pattern.as_str()) {
                return Err(MemorySinkError::Rejected(command.to_string()));
            }
        }
        self.journal.push(SinkEvent::Execute(command.to_string()));
        self.executed.push(command.to_string());
        Ok(())
    }

    /// Moves staged instances into the context in order. On failure the
    /// failed instance and everything after it stay staged.
    fn commit(&mut self) -> Result<(), Self::Error> {
        let mut inserted = 0;
        let mut failure = None;
        for (collection, instance) in &self.pending {
            match self.context.insert(collection, Arc::clone(instance)) {
                Ok(()) => inserted += 1,
                Err(source) => {
                    failure = Some(MemorySinkError::Insert {
                        collection: collection.clone(),
                        source,
                    });
                    break;
                }
            }
        }
        self.pending.drain(..inserted);
        if let Some(err) = failure {
            return Err(err);
        }
        self.commits += 1;
        self.journal.push(SinkEvent::Commit { inserted });
        Ok(())
    }
}
