use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    catalog::{query::Page, AdvancedSearch},
    core::model as domain,
    error::Result,
};

const DEFAULT_PAGE_SIZE: u32 = 16;

// Query strings cannot flatten a shared paging struct, numbers arrive as text
fn page_of(page: Option<u32>, size: Option<u32>) -> Result<Page> {
    Page::new(page.unwrap_or_default(), size.unwrap_or(DEFAULT_PAGE_SIZE))
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Book {
    catalog_id: domain::CatalogId,
    title: Option<String>,
    subtitle: Option<String>,
    authors: Vec<String>,
    publisher: Option<String>,
    published_date: Option<String>,
    description: Option<String>,
    thumbnail_url: Option<String>,
    preview_url: Option<String>,
    categories: Vec<String>,
    average_rating: Option<f64>,
    ratings_count: Option<u32>,
    is_saved: bool,
}

impl From<domain::Book> for Book {
    fn from(
        domain::Book {
            catalog_id,
            title,
            subtitle,
            authors,
            publisher,
            published_date,
            description,
            thumbnail_url,
            preview_url,
            categories,
            average_rating,
            ratings_count,
            is_saved,
        }: domain::Book,
    ) -> Self {
        Self {
            catalog_id,
            title,
            subtitle,
            authors,
            publisher,
            published_date,
            description,
            thumbnail_url,
            preview_url,
            categories,
            average_rating,
            ratings_count,
            is_saved,
        }
    }
}

impl From<Book> for domain::Book {
    fn from(
        Book {
            catalog_id,
            title,
            subtitle,
            authors,
            publisher,
            published_date,
            description,
            thumbnail_url,
            preview_url,
            categories,
            average_rating,
            ratings_count,
            is_saved,
        }: Book,
    ) -> Self {
        Self {
            catalog_id,
            title,
            subtitle,
            authors,
            publisher,
            published_date,
            description,
            thumbnail_url,
            preview_url,
            categories,
            average_rating,
            ratings_count,
            is_saved,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CatalogId(pub domain::CatalogId);

#[derive(Debug, Deserialize)]
pub struct EntryId(pub domain::EntryId);

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub subject: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl SearchParams {
    pub fn page(&self) -> Result<Page> {
        page_of(self.page, self.size)
    }
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl PageParams {
    pub fn page(&self) -> Result<Page> {
        page_of(self.page, self.size)
    }
}

#[derive(Debug, Deserialize)]
pub struct WellnessParams {
    pub category: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl WellnessParams {
    pub fn page(&self) -> Result<Page> {
        page_of(self.page, self.size)
    }
}

#[derive(Debug, Deserialize)]
pub struct AdvancedParams {
    pub description: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl AdvancedParams {
    pub fn into_search(self) -> Result<(AdvancedSearch, Page)> {
        let page = page_of(self.page, self.size)?;
        let Self {
            description,
            title,
            author,
            ..
        } = self;

        Ok((
            AdvancedSearch {
                description,
                title,
                author,
            },
            page,
        ))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewEntry {
    title: String,
    content: String,
    mood: domain::Mood,
    tags: Vec<String>,
    book_id: Option<domain::CatalogId>,
}

impl From<NewEntry> for domain::NewEntry {
    fn from(
        NewEntry {
            title,
            content,
            mood,
            tags,
            book_id,
        }: NewEntry,
    ) -> Self {
        Self {
            title,
            content,
            mood,
            tags,
            book_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TextSearchParams {
    #[serde(default)]
    pub q: String,
    pub mood: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RangeParams {
    #[serde(with = "time::serde::rfc3339")]
    pub from: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub to: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct BookTitleParams {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct MoodView {
    name: &'static str,
    label: &'static str,
}

impl From<domain::Mood> for MoodView {
    fn from(mood: domain::Mood) -> Self {
        Self {
            name: mood.name(),
            label: mood.label(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorMessage {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn posted_book_may_omit_fields() {
        let book: Book =
            serde_json::from_str(r#"{"catalogId": "abc", "title": "Breath"}"#).unwrap();
        let book = domain::Book::from(book);

        assert_eq!(book.catalog_id.as_str(), "abc");
        assert_eq!(book.title.as_deref(), Some("Breath"));
        assert!(book.authors.is_empty());
        assert!(!book.is_saved);
    }

    #[test]
    fn book_is_rendered_in_camel_case() {
        let book = Book::from(domain::Book {
            catalog_id: "abc".into(),
            thumbnail_url: Some("https://t".to_owned()),
            is_saved: true,
            ..Default::default()
        });
        let json = serde_json::to_value(&book).unwrap();

        assert_eq!(json["catalogId"], "abc");
        assert_eq!(json["thumbnailUrl"], "https://t");
        assert_eq!(json["isSaved"], true);
    }

    #[test]
    fn new_entry_reads_mood_and_book_reference() {
        let entry: NewEntry = serde_json::from_str(
            r#"{"title": "Morning", "mood": "VERY_HAPPY", "tags": ["sun"], "bookId": "b1"}"#,
        )
        .unwrap();
        let entry = domain::NewEntry::from(entry);

        assert_eq!(entry.mood, domain::Mood::VeryHappy);
        assert_eq!(entry.book_id, Some(domain::CatalogId::from("b1")));
        assert_eq!(entry.content, "");
    }

    #[test]
    fn paging_defaults_and_rejects_empty_pages() {
        let defaults = PageParams {
            page: None,
            size: None,
        };
        assert_eq!(defaults.page().unwrap(), Page::new(0, 16).unwrap());

        let empty = PageParams {
            page: Some(1),
            size: Some(0),
        };
        assert!(matches!(empty.page(), Err(Error::Validation(..))));
    }

    #[test]
    fn moods_render_name_and_label() {
        let json = serde_json::to_value(MoodView::from(domain::Mood::VerySad)).unwrap();
        assert_eq!(json, serde_json::json!({"name": "VERY_SAD", "label": "Very Sad"}));
    }
}
