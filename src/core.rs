use std::collections::HashSet;
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};

use crate::{
    catalog::{query::Page, AdvancedSearch, BookFinder, Catalog},
    error::{Error, Result},
    infrastructure::Storage,
};
use model::{
    query::{self, Journal, JournalChange, JournalQuery},
    Book, CatalogId, DiaryEntry, EntryId, NewEntry,
};

pub mod model;

pub struct Application<S, C> {
    storage: S,
    finder: BookFinder<C>,
    journal: RwLock<Journal>,

    // One diary write at a time, so the archive and the journal agree
    diary_writes: Mutex<()>,
}

impl<S, C> Application<S, C>
where
    S: Storage,
    C: Catalog,
{
    /// Replays the stored diary into the journal.
    pub fn try_new(storage: S, finder: BookFinder<C>) -> Result<Self> {
        let journal = Journal::replay(storage.all_entries()?);
        Ok(Self {
            storage,
            finder,
            journal: RwLock::new(journal),
            diary_writes: Mutex::new(()),
        })
    }

    pub fn wellness_subjects(&self) -> Vec<String> {
        self.finder.subjects().wellness().to_vec()
    }

    pub async fn search_books(
        &self,
        text: Option<&str>,
        subject: Option<&str>,
        page: Page,
    ) -> Result<Vec<Book>> {
        self.finder.search(text, subject, page).await
    }

    pub async fn popular_books(&self, page: Page) -> Result<Vec<Book>> {
        self.finder.popular(page).await
    }

    pub async fn wellness_books(&self, category: Option<&str>, page: Page) -> Result<Vec<Book>> {
        self.finder.wellness(category, page).await
    }

    pub async fn search_books_advanced(
        &self,
        search: &AdvancedSearch,
        page: Page,
    ) -> Result<Vec<Book>> {
        self.finder.advanced(search, page).await
    }

    pub fn save_book(&self, book: Book) -> Result<Book> {
        let saved = self.storage.upsert_and_mark(book)?;
        tracing::info!(catalog_id = %saved.catalog_id, "Saved book");
        Ok(saved)
    }

    pub fn saved_books(&self) -> Result<Vec<Book>> {
        self.storage.list_saved()
    }

    pub fn remove_book(&self, id: &CatalogId) -> Result<()> {
        self.storage.remove(id)
    }

    pub async fn issue_query<Q>(&self, query: Q) -> Q::Output
    where
        Q: JournalQuery,
    {
        let journal = self.journal.read().await;
        query.execute(&journal)
    }

    pub async fn create_entry(&self, new_entry: NewEntry) -> Result<DiaryEntry> {
        let entry = DiaryEntry::create(new_entry, OffsetDateTime::now_utc())?;

        let _guard = self.diary_writes.lock().await;
        self.storage.put_entry(&entry)?;
        self.journal
            .write()
            .await
            .apply(JournalChange::Recorded(entry.clone()));

        Ok(entry)
    }

    pub async fn update_entry(&self, id: EntryId, revision: NewEntry) -> Result<DiaryEntry> {
        let _guard = self.diary_writes.lock().await;
        let Some(current) = self.issue_query(query::EntryById(id)).await else {
            return Err(Error::NotFound(format!("diary entry {id}")));
        };

        let revised = current.revise(revision, OffsetDateTime::now_utc())?;
        self.storage.put_entry(&revised)?;
        self.journal
            .write()
            .await
            .apply(JournalChange::Recorded(revised.clone()));

        Ok(revised)
    }

    pub async fn delete_entry(&self, id: EntryId) -> Result<()> {
        let _guard = self.diary_writes.lock().await;
        if !self.journal.read().await.contains(id) {
            return Err(Error::NotFound(format!("diary entry {id}")));
        }

        self.storage.delete_entry(id)?;
        self.journal.write().await.apply(JournalChange::Erased(id));

        Ok(())
    }

    /// Entries linked to a stored book whose title contains `title`.
    pub async fn entries_by_book_title(&self, title: &str) -> Result<Vec<DiaryEntry>> {
        let linked = self.issue_query(query::EntriesWithBooks).await;

        let mut matching = HashSet::new();
        for book_id in linked.iter().filter_map(|entry| entry.book_id.as_ref()) {
            if matching.contains(book_id) {
                continue;
            }
            if let Some(book) = self.storage.find_book(book_id)? {
                if book.title_contains(title) {
                    matching.insert(book_id.clone());
                }
            }
        }

        Ok(self
            .issue_query(query::EntriesReferencing(matching))
            .await)
    }
}
