use std::{
    collections::{HashMap, HashSet},
    hash::Hash,
};

use time::OffsetDateTime;

use crate::core::model::{CatalogId, DiaryEntry, EntryId, Mood};

pub enum JournalChange {
    Recorded(DiaryEntry),
    Erased(EntryId),
}

/// Read model over all diary entries.
#[derive(Debug, Default)]
pub struct Journal {
    entries: HashMap<EntryId, DiaryEntry>,
    entries_by_tag: HashMap<String, HashSet<EntryId>>,
    entries_by_mood: HashMap<Mood, HashSet<EntryId>>,
}

impl Journal {
    pub fn replay<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = DiaryEntry>,
    {
        let mut journal = Self::default();
        for entry in entries {
            journal.apply(JournalChange::Recorded(entry))
        }
        journal
    }

    pub fn apply(&mut self, change: JournalChange) {
        match change {
            JournalChange::Recorded(entry) => {
                self.unindex(entry.id);
                for tag in &entry.tags {
                    self.entries_by_tag
                        .entry(tag.clone())
                        .or_default()
                        .insert(entry.id);
                }
                self.entries_by_mood
                    .entry(entry.mood)
                    .or_default()
                    .insert(entry.id);
                self.entries.insert(entry.id, entry);
            }
            JournalChange::Erased(id) => {
                self.unindex(id);
            }
        }
    }

    fn unindex(&mut self, id: EntryId) {
        if let Some(previous) = self.entries.remove(&id) {
            for tag in &previous.tags {
                forget(&mut self.entries_by_tag, tag, id);
            }
            forget(&mut self.entries_by_mood, &previous.mood, id);
        }
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.entries.contains_key(&id)
    }

    fn resolve<'a, I>(&self, ids: I) -> Vec<DiaryEntry>
    where
        I: IntoIterator<Item = &'a EntryId>,
    {
        newest_first(
            ids.into_iter()
                .filter_map(|id| self.entries.get(id).cloned())
                .collect(),
        )
    }

    fn select<P>(&self, predicate: P) -> Vec<DiaryEntry>
    where
        P: Fn(&DiaryEntry) -> bool,
    {
        newest_first(
            self.entries
                .values()
                .filter(|entry| predicate(entry))
                .cloned()
                .collect(),
        )
    }
}

// Drops the index key along with its last entry
fn forget<K>(index: &mut HashMap<K, HashSet<EntryId>>, key: &K, id: EntryId)
where
    K: Eq + Hash,
{
    if let Some(ids) = index.get_mut(key) {
        ids.remove(&id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

fn newest_first(mut entries: Vec<DiaryEntry>) -> Vec<DiaryEntry> {
    entries.sort_by(|p, q| q.created_at.cmp(&p.created_at).then(p.id.cmp(&q.id)));
    entries
}

pub trait JournalQuery {
    type Output;

    fn execute(&self, journal: &Journal) -> Self::Output;
}

pub struct AllEntries;

impl JournalQuery for AllEntries {
    type Output = Vec<DiaryEntry>;

    fn execute(&self, journal: &Journal) -> Self::Output {
        journal.select(|_| true)
    }
}

pub struct EntryById(pub EntryId);

impl JournalQuery for EntryById {
    type Output = Option<DiaryEntry>;

    fn execute(&self, journal: &Journal) -> Self::Output {
        let Self(id) = self;
        journal.entries.get(id).cloned()
    }
}

pub struct TextSearch {
    pub text: String,
    pub mood: Option<Mood>,
}

impl JournalQuery for TextSearch {
    type Output = Vec<DiaryEntry>;

    fn execute(&self, journal: &Journal) -> Self::Output {
        let Self { text, mood } = self;
        journal.select(|entry| {
            entry.mentions(text) && mood.map_or(true, |mood| entry.mood == mood)
        })
    }
}

pub struct EntriesByTag(pub String);

impl JournalQuery for EntriesByTag {
    type Output = Vec<DiaryEntry>;

    fn execute(&self, journal: &Journal) -> Self::Output {
        let Self(tag) = self;
        journal
            .entries_by_tag
            .get(tag.trim())
            .map(|ids| journal.resolve(ids))
            .unwrap_or_default()
    }
}

pub struct EntriesByMood(pub Mood);

impl JournalQuery for EntriesByMood {
    type Output = Vec<DiaryEntry>;

    fn execute(&self, journal: &Journal) -> Self::Output {
        let Self(mood) = self;
        journal
            .entries_by_mood
            .get(mood)
            .map(|ids| journal.resolve(ids))
            .unwrap_or_default()
    }
}

/// Both bounds are inclusive.
pub struct CreatedBetween {
    pub from: OffsetDateTime,
    pub to: OffsetDateTime,
}

impl JournalQuery for CreatedBetween {
    type Output = Vec<DiaryEntry>;

    fn execute(&self, journal: &Journal) -> Self::Output {
        let Self { from, to } = self;
        journal.select(|entry| (*from..=*to).contains(&entry.created_at))
    }
}

pub struct EntriesWithBooks;

impl JournalQuery for EntriesWithBooks {
    type Output = Vec<DiaryEntry>;

    fn execute(&self, journal: &Journal) -> Self::Output {
        journal.select(|entry| entry.book_id.is_some())
    }
}

pub struct EntriesReferencing(pub HashSet<CatalogId>);

impl JournalQuery for EntriesReferencing {
    type Output = Vec<DiaryEntry>;

    fn execute(&self, journal: &Journal) -> Self::Output {
        let Self(book_ids) = self;
        journal.select(|entry| {
            entry
                .book_id
                .as_ref()
                .is_some_and(|id| book_ids.contains(id))
        })
    }
}
