use std::fmt;

use crate::{
    catalog::Subjects,
    error::{Error, Result},
};

// Leaves headroom for what the filters throw away
const MIN_ITEMS_PER_SUBJECT: u32 = 10;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    pub fn new(number: u32, size: u32) -> Result<Self> {
        if size == 0 {
            Err(Error::validation("Page size must be positive"))
        } else {
            Ok(Self { number, size })
        }
    }

    pub fn offset(&self) -> u32 {
        self.number.saturating_mul(self.size)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OrderBy {
    Relevance,
    Newest,
}

impl OrderBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderBy::Relevance => "relevance",
            OrderBy::Newest => "newest",
        }
    }
}

/// One provider request. `terms` is already in the provider's `q` syntax:
/// URL-safe words joined by `+`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VolumeQuery {
    pub terms: String,
    pub start_index: u32,
    pub max_results: u32,
    pub order_by: Option<OrderBy>,
}

impl fmt::Display for VolumeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "q={} startIndex={} maxResults={}",
            self.terms, self.start_index, self.max_results
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Composition {
    Single(VolumeQuery),
    FanOut(Vec<VolumeQuery>),
}

fn usable(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|text| !text.is_empty())
}

fn joined_words(text: &str) -> String {
    text.split_whitespace()
        .map(|word| urlencoding::encode(word).into_owned())
        .collect::<Vec<_>>()
        .join("+")
}

fn subject_term(subject: &str) -> String {
    format!("subject:{}", joined_words(subject))
}

fn per_subject_quota(page_size: u32, subject_count: usize) -> u32 {
    let subject_count = u32::try_from(subject_count.max(1)).unwrap_or(u32::MAX);
    MIN_ITEMS_PER_SUBJECT.max(page_size.saturating_mul(2) / subject_count)
}

pub struct Composer<'a> {
    subjects: &'a Subjects,
}

impl<'a> Composer<'a> {
    pub fn new(subjects: &'a Subjects) -> Self {
        Self { subjects }
    }

    fn base_terms(&self, text: Option<&str>) -> String {
        usable(text).map_or_else(|| self.subjects.default_terms(), joined_words)
    }

    /// Free text narrowed to an allow-listed subject is one request; with
    /// neither, the search spreads over the target subjects.
    pub fn search(&self, text: Option<&str>, subject: Option<&str>, page: Page) -> Composition {
        let text = usable(text);
        let subject = usable(subject).filter(|subject| self.subjects.is_wellness(subject));

        if text.is_none() && subject.is_none() {
            return Composition::FanOut(self.fan_out(None, page, None));
        }

        let mut terms = self.base_terms(text);
        if let Some(subject) = subject {
            terms.push('+');
            terms.push_str(&subject_term(subject));
        }

        Composition::Single(VolumeQuery {
            terms,
            start_index: page.offset(),
            max_results: page.size,
            order_by: None,
        })
    }

    pub fn fan_out(
        &self,
        text: Option<&str>,
        page: Page,
        order_by: Option<OrderBy>,
    ) -> Vec<VolumeQuery> {
        let targets = self.subjects.targets();
        let base = self.base_terms(text);
        let max_results = per_subject_quota(page.size, targets.len());

        targets
            .iter()
            .map(|target| VolumeQuery {
                terms: format!("{base}+{}", subject_term(target)),
                start_index: page.offset(),
                max_results,
                order_by,
            })
            .collect()
    }

    /// A title and/or author lookup. `None` when neither is given.
    pub fn targeted(
        &self,
        title: Option<&str>,
        author: Option<&str>,
        page: Page,
    ) -> Option<VolumeQuery> {
        let mut terms = vec![];
        if let Some(title) = usable(title) {
            terms.push(format!("intitle:{}", urlencoding::encode(title)));
        }
        if let Some(author) = usable(author) {
            terms.push(format!("inauthor:{}", urlencoding::encode(author)));
        }

        if terms.is_empty() {
            None
        } else {
            Some(VolumeQuery {
                terms: terms.join("+"),
                start_index: page.offset(),
                max_results: page.size.max(MIN_ITEMS_PER_SUBJECT),
                order_by: None,
            })
        }
    }
}
