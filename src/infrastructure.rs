use serde::{Deserialize, Serialize};
use std::{
    fmt::{self, Display},
    sync::Arc,
};
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use crate::{
    core::model::{Book, CatalogId, DiaryEntry, EntryId},
    error::Result,
};

pub mod persistence;

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UniqueId(pub Uuid);

impl UniqueId {
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn uuid(&self) -> &Uuid {
        let Self(id) = self;
        id
    }
}

impl Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let UniqueId(id) = self;
        write!(f, "{id}")
    }
}

#[derive(Clone)]
pub struct Termination {
    signal: broadcast::Sender<()>,
}

impl Default for Termination {
    fn default() -> Self {
        Self::new()
    }
}

impl Termination {
    pub fn new() -> Self {
        let (signal, _rx) = broadcast::channel(1);
        Self { signal }
    }

    pub fn waiter(&self) -> TerminationWaiter {
        TerminationWaiter::new(self.signal.subscribe())
    }

    // Nobody listening is fine, the server may already be gone.
    pub fn signal(&self) {
        let _ = self.signal.send(());
    }
}

#[derive(Clone)]
pub struct TerminationWaiter(Arc<Mutex<broadcast::Receiver<()>>>);

impl TerminationWaiter {
    fn new(receiver: broadcast::Receiver<()>) -> Self {
        Self(Arc::new(Mutex::new(receiver)))
    }

    /// Resolves on the first signal, or when every `Termination` is dropped.
    pub async fn wait(&self) {
        let _ = self.0.lock().await.recv().await;
    }
}

/// Saved books, keyed by their catalog id.
pub trait BookCollection {
    /// Stores the book as saved. An already stored record keeps its fields
    /// and only has its saved flag raised.
    fn upsert_and_mark(&self, book: Book) -> Result<Book>;

    fn find_book(&self, id: &CatalogId) -> Result<Option<Book>>;

    fn list_saved(&self) -> Result<Vec<Book>>;

    /// Clears the saved flag. Unknown ids are ignored.
    fn remove(&self, id: &CatalogId) -> Result<()>;
}

pub trait EntryArchive {
    fn put_entry(&self, entry: &DiaryEntry) -> Result<()>;

    fn delete_entry(&self, id: EntryId) -> Result<()>;

    // Replay source for the journal
    fn all_entries(&self) -> Result<Vec<DiaryEntry>>;
}

pub trait Storage: BookCollection + EntryArchive + Send + Sync + 'static {}

impl<S> Storage for S where S: BookCollection + EntryArchive + Send + Sync + 'static {}
