use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, str::FromStr};
use time::OffsetDateTime;

use crate::{
    error::{Error, Result},
    infrastructure::UniqueId,
};

pub mod query;

const UNKNOWN_AUTHOR: &str = "Unknown Author";

#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogId(pub String);

impl CatalogId {
    pub fn is_blank(&self) -> bool {
        let Self(id) = self;
        id.trim().is_empty()
    }

    pub fn as_str(&self) -> &str {
        let Self(id) = self;
        id
    }
}

impl fmt::Display for CatalogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self(id) = self;
        write!(f, "{id}")
    }
}

impl From<&str> for CatalogId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub catalog_id: CatalogId,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub preview_url: Option<String>,
    pub categories: Vec<String>,
    pub average_rating: Option<f64>,
    pub ratings_count: Option<u32>,
    pub is_saved: bool,
}

impl Book {
    /// Checks the fields a collection record cannot do without and fills
    /// every other absent field with its empty default. The result is
    /// marked as saved.
    pub fn into_collection_record(self) -> Result<Self> {
        if self.catalog_id.is_blank() {
            return Err(Error::validation("Book catalog id is required"));
        }

        if self.title.as_deref().map_or(true, |t| t.trim().is_empty()) {
            return Err(Error::validation("Book title is required"));
        }

        let authors = if self.authors.is_empty() {
            vec![UNKNOWN_AUTHOR.to_owned()]
        } else {
            self.authors
        };

        Ok(Self {
            subtitle: Some(self.subtitle.unwrap_or_default()),
            publisher: Some(self.publisher.unwrap_or_default()),
            published_date: Some(self.published_date.unwrap_or_default()),
            description: Some(self.description.unwrap_or_default()),
            thumbnail_url: Some(self.thumbnail_url.unwrap_or_default()),
            preview_url: Some(self.preview_url.unwrap_or_default()),
            authors,
            is_saved: true,
            ..self
        })
    }

    pub fn title_contains(&self, needle: &str) -> bool {
        self.title
            .as_deref()
            .is_some_and(|title| title.to_lowercase().contains(&needle.to_lowercase()))
    }
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub UniqueId);

impl EntryId {
    pub fn fresh() -> Self {
        Self(UniqueId::fresh())
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self(id) = self;
        write!(f, "{id}")
    }
}

#[derive(Copy, Clone, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mood {
    VeryHappy,
    Happy,
    #[default]
    Neutral,
    Sad,
    VerySad,
    Angry,
    Anxious,
    Excited,
    Grateful,
    Peaceful,
}

impl Mood {
    pub const ALL: [Mood; 10] = [
        Mood::VeryHappy,
        Mood::Happy,
        Mood::Neutral,
        Mood::Sad,
        Mood::VerySad,
        Mood::Angry,
        Mood::Anxious,
        Mood::Excited,
        Mood::Grateful,
        Mood::Peaceful,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Mood::VeryHappy => "VERY_HAPPY",
            Mood::Happy => "HAPPY",
            Mood::Neutral => "NEUTRAL",
            Mood::Sad => "SAD",
            Mood::VerySad => "VERY_SAD",
            Mood::Angry => "ANGRY",
            Mood::Anxious => "ANXIOUS",
            Mood::Excited => "EXCITED",
            Mood::Grateful => "GRATEFUL",
            Mood::Peaceful => "PEACEFUL",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Mood::VeryHappy => "Very Happy",
            Mood::Happy => "Happy",
            Mood::Neutral => "Neutral",
            Mood::Sad => "Sad",
            Mood::VerySad => "Very Sad",
            Mood::Angry => "Angry",
            Mood::Anxious => "Anxious",
            Mood::Excited => "Excited",
            Mood::Grateful => "Grateful",
            Mood::Peaceful => "Peaceful",
        }
    }
}

impl FromStr for Mood {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Mood::ALL
            .into_iter()
            .find(|mood| mood.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Validation(format!("Unknown mood `{s}`")))
    }
}

/// The caller-supplied part of a diary entry, used both to create and to
/// replace one.
#[derive(Clone, Debug, Default)]
pub struct NewEntry {
    pub title: String,
    pub content: String,
    pub mood: Mood,
    pub tags: Vec<String>,
    pub book_id: Option<CatalogId>,
}

impl NewEntry {
    fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            Err(Error::validation("Entry title is required"))
        } else {
            Ok(())
        }
    }

    fn normalized_tags(&self) -> BTreeSet<String> {
        self.tags
            .iter()
            .map(|tag| tag.trim())
            .filter(|tag| !tag.is_empty())
            .map(|tag| tag.to_owned())
            .collect()
    }

    fn book_reference(&self) -> Option<CatalogId> {
        self.book_id.clone().filter(|id| !id.is_blank())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryEntry {
    pub id: EntryId,
    pub title: String,
    pub content: String,
    pub mood: Mood,
    pub tags: BTreeSet<String>,
    pub book_id: Option<CatalogId>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl DiaryEntry {
    pub fn create(new_entry: NewEntry, now: OffsetDateTime) -> Result<Self> {
        new_entry.validate()?;
        Ok(Self {
            id: EntryId::fresh(),
            tags: new_entry.normalized_tags(),
            book_id: new_entry.book_reference(),
            title: new_entry.title,
            content: new_entry.content,
            mood: new_entry.mood,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn revise(&self, revision: NewEntry, now: OffsetDateTime) -> Result<Self> {
        revision.validate()?;
        Ok(Self {
            id: self.id,
            tags: revision.normalized_tags(),
            book_id: revision.book_reference(),
            title: revision.title,
            content: revision.content,
            mood: revision.mood,
            created_at: self.created_at,
            updated_at: now,
        })
    }

    pub fn mentions(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.title.to_lowercase().contains(&text) || self.content.to_lowercase().contains(&text)
    }
}
