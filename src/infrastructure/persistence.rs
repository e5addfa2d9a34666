use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    core::model::{Book, CatalogId, DiaryEntry, EntryId},
    error::{self, Error},
};

use super::{BookCollection, EntryArchive};

struct BookKey<'a>(&'a CatalogId);

impl<'a> AsRef<[u8]> for BookKey<'a> {
    fn as_ref(&self) -> &[u8] {
        let Self(id) = self;
        id.as_str().as_bytes()
    }
}

struct EntryKey(EntryId);

impl AsRef<[u8]> for EntryKey {
    fn as_ref(&self) -> &[u8] {
        let Self(EntryId(id)) = self;
        id.uuid().as_bytes()
    }
}

fn as_json<A>(record: &A) -> error::Result<Vec<u8>>
where
    A: Serialize,
{
    Ok(serde_json::to_vec(record)?)
}

fn from_slice<A>(bytes: &[u8]) -> error::Result<A>
where
    A: DeserializeOwned,
{
    Ok(serde_json::from_slice(bytes)?)
}

/// fjall-backed storage for both the book collection and the diary.
#[derive(Clone)]
pub struct Archive(Arc<ArchiveInner>);

impl Archive {
    pub fn try_new<P>(store_path: P) -> error::Result<Self>
    where
        P: AsRef<Path>,
    {
        Ok(Self(Arc::new(ArchiveInner::try_open(Keyspace::open(
            Config::new(store_path),
        )?)?)))
    }

    fn inner(&self) -> &ArchiveInner {
        let Self(x) = self;
        x
    }
}

pub struct ArchiveInner {
    keyspace: Keyspace,
    books: PartitionHandle,
    entries: PartitionHandle,

    // Serializes read-modify-write cycles on the books partition
    book_writes: Mutex<()>,
}

impl ArchiveInner {
    pub fn try_open(keyspace: Keyspace) -> error::Result<Self> {
        let books = keyspace.open_partition("books", PartitionCreateOptions::default())?;
        let entries = keyspace.open_partition("entries", PartitionCreateOptions::default())?;

        Ok(Self {
            keyspace,
            books,
            entries,
            book_writes: Mutex::new(()),
        })
    }

    fn lock_book_writes(&self) -> error::Result<std::sync::MutexGuard<'_, ()>> {
        self.book_writes
            .lock()
            .map_err(|_| Error::Generic("book write lock poisoned".to_owned()))
    }

    fn find_book(&self, id: &CatalogId) -> error::Result<Option<Book>> {
        if let Some(bytes) = self.books.get(BookKey(id))? {
            Ok(Some(from_slice(&bytes)?))
        } else {
            Ok(None)
        }
    }

    // Callers hold the book write lock and persist once it is released
    fn store_book(&self, book: &Book) -> error::Result<()> {
        self.books
            .insert(BookKey(&book.catalog_id).as_ref(), as_json(book)?)?;
        Ok(())
    }

    fn persist(&self) -> error::Result<()> {
        Ok(self.keyspace.persist(PersistMode::SyncAll)?)
    }

    fn upsert_and_mark(&self, book: Book) -> error::Result<Book> {
        let record = book.into_collection_record()?;

        let stored = {
            let _guard = self.lock_book_writes()?;
            let stored = match self.find_book(&record.catalog_id)? {
                Some(existing) => Book {
                    is_saved: true,
                    ..existing
                },
                None => record,
            };
            self.store_book(&stored)?;
            stored
        };
        self.persist()?;

        Ok(stored)
    }

    fn unmark(&self, id: &CatalogId) -> error::Result<()> {
        let changed = {
            let _guard = self.lock_book_writes()?;
            match self.find_book(id)? {
                Some(existing) if existing.is_saved => {
                    self.store_book(&Book {
                        is_saved: false,
                        ..existing
                    })?;
                    true
                }
                _ => false,
            }
        };

        if changed {
            self.persist()?;
        }

        Ok(())
    }

    fn saved_books(&self) -> error::Result<Vec<Book>> {
        let mut books = vec![];

        for pair in self.books.iter() {
            let (_, bytes) = pair?;
            let book: Book = from_slice(&bytes)?;
            if book.is_saved {
                books.push(book)
            }
        }

        Ok(books)
    }

    fn put_entry(&self, entry: &DiaryEntry) -> error::Result<()> {
        self.entries
            .insert(EntryKey(entry.id).as_ref(), as_json(entry)?)?;
        self.persist()
    }

    fn delete_entry(&self, id: EntryId) -> error::Result<()> {
        self.entries.remove(EntryKey(id).as_ref())?;
        self.persist()
    }

    fn find_all_entries(&self) -> error::Result<Vec<DiaryEntry>> {
        let mut entries = vec![];

        for pair in self.entries.iter() {
            let (_, bytes) = pair?;
            entries.push(from_slice(&bytes)?)
        }

        Ok(entries)
    }
}

impl BookCollection for Archive {
    fn upsert_and_mark(&self, book: Book) -> error::Result<Book> {
        self.inner().upsert_and_mark(book)
    }

    fn find_book(&self, id: &CatalogId) -> error::Result<Option<Book>> {
        self.inner().find_book(id)
    }

    fn list_saved(&self) -> error::Result<Vec<Book>> {
        self.inner().saved_books()
    }

    fn remove(&self, id: &CatalogId) -> error::Result<()> {
        self.inner().unmark(id)
    }
}

impl EntryArchive for Archive {
    fn put_entry(&self, entry: &DiaryEntry) -> error::Result<()> {
        self.inner().put_entry(entry)
    }

    fn delete_entry(&self, id: EntryId) -> error::Result<()> {
        self.inner().delete_entry(id)
    }

    fn all_entries(&self) -> error::Result<Vec<DiaryEntry>> {
        self.inner().find_all_entries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{Mood, NewEntry};
    use tempfile::TempDir;
    use time::OffsetDateTime;

    fn open_archive() -> (Archive, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::try_new(dir.path()).unwrap();
        (archive, dir)
    }

    fn book(id: &str, title: &str) -> Book {
        Book {
            catalog_id: id.into(),
            title: Some(title.to_owned()),
            ..Default::default()
        }
    }

    #[test]
    fn saving_twice_keeps_one_saved_record() {
        let (archive, _dir) = open_archive();

        archive.upsert_and_mark(book("X", "Atomic Habits")).unwrap();
        archive.upsert_and_mark(book("X", "Atomic Habits")).unwrap();

        let saved = archive.list_saved().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].catalog_id, CatalogId::from("X"));
        assert!(saved[0].is_saved);
    }

    #[test]
    fn resaving_preserves_stored_fields() {
        let (archive, _dir) = open_archive();

        archive
            .upsert_and_mark(Book {
                description: Some("Tiny changes".to_owned()),
                ..book("X", "Atomic Habits")
            })
            .unwrap();
        archive.remove(&"X".into()).unwrap();

        let stored = archive
            .upsert_and_mark(Book {
                description: Some("Something else".to_owned()),
                ..book("X", "A different title")
            })
            .unwrap();

        assert!(stored.is_saved);
        assert_eq!(stored.title.as_deref(), Some("Atomic Habits"));
        assert_eq!(stored.description.as_deref(), Some("Tiny changes"));
    }

    #[test]
    fn saving_backfills_authors_and_description() {
        let (archive, _dir) = open_archive();

        archive.upsert_and_mark(book("Y", "Wherever You Go")).unwrap();

        let stored = archive.find_book(&"Y".into()).unwrap().unwrap();
        assert_eq!(stored.authors, vec!["Unknown Author".to_owned()]);
        assert_eq!(stored.description.as_deref(), Some(""));
    }

    #[test]
    fn saving_without_id_writes_nothing() {
        let (archive, _dir) = open_archive();

        let result = archive.upsert_and_mark(book("", "Nameless"));

        assert!(matches!(result, Err(Error::Validation(..))));
        assert!(archive.find_book(&"".into()).unwrap().is_none());
        assert!(archive.list_saved().unwrap().is_empty());
    }

    #[test]
    fn removing_is_soft_and_tolerates_unknown_ids() {
        let (archive, _dir) = open_archive();

        archive.remove(&"missing".into()).unwrap();

        archive.upsert_and_mark(book("Z", "Quiet")).unwrap();
        archive.remove(&"Z".into()).unwrap();

        assert!(archive.list_saved().unwrap().is_empty());
        let kept = archive.find_book(&"Z".into()).unwrap().unwrap();
        assert!(!kept.is_saved);
        assert_eq!(kept.title.as_deref(), Some("Quiet"));
    }

    #[test]
    fn concurrent_saves_and_removes_keep_one_record() {
        let (archive, _dir) = open_archive();
        archive.upsert_and_mark(book("X", "Atomic Habits")).unwrap();

        std::thread::scope(|scope| {
            for writer in 0..4 {
                let archive = archive.clone();
                scope.spawn(move || {
                    for round in 0..10 {
                        let title = format!("Rewrite {writer}.{round}");
                        archive.upsert_and_mark(book("X", &title)).unwrap();
                        archive.remove(&"X".into()).unwrap();
                    }
                });
            }
        });

        let saved = archive.list_saved().unwrap();
        assert!(saved.iter().filter(|b| b.catalog_id.as_str() == "X").count() <= 1);

        let stored = archive.find_book(&"X".into()).unwrap().unwrap();
        assert_eq!(stored.title.as_deref(), Some("Atomic Habits"));
        assert_eq!(stored.authors, vec!["Unknown Author".to_owned()]);
    }

    #[test]
    fn entries_are_stored_and_deleted() {
        let (archive, _dir) = open_archive();
        let entry = DiaryEntry::create(
            NewEntry {
                title: "First light".to_owned(),
                mood: Mood::Grateful,
                ..Default::default()
            },
            OffsetDateTime::now_utc(),
        )
        .unwrap();

        archive.put_entry(&entry).unwrap();
        assert_eq!(archive.all_entries().unwrap(), vec![entry.clone()]);

        archive.delete_entry(entry.id).unwrap();
        assert!(archive.all_entries().unwrap().is_empty());
    }
}
