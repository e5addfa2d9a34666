use std::{future::Future, sync::Arc};
use tokio::task;

use crate::{
    core::model::Book,
    error::{Error, Result},
};
use filter::{Aggregate, CategoryFilter};
use query::{Composer, Composition, OrderBy, Page, VolumeQuery};

pub mod filter;
pub mod google;
pub mod query;

pub trait Catalog: Send + Sync + 'static {
    fn fetch(&self, query: &VolumeQuery) -> impl Future<Output = Result<Vec<Book>>> + Send;
}

/// The wellness vocabulary searches are biased toward. Built once at startup.
#[derive(Clone, Debug)]
pub struct Subjects {
    wellness: Vec<String>,
    targets: Vec<String>,
    default_terms: Vec<String>,
}

impl Default for Subjects {
    fn default() -> Self {
        Self::new(
            &[
                "psychology",
                "productivity",
                "personal development",
                "mental health",
                "wellness",
                "motivation",
                "self-help",
                "mindfulness",
                "personal growth",
            ],
            &["self-help", "mindfulness", "motivation", "psychology"],
            &["wellness", "self-help", "motivation", "psychology"],
        )
    }
}

fn owned(xs: &[&str]) -> Vec<String> {
    xs.iter().map(|x| x.to_string()).collect()
}

impl Subjects {
    pub fn new(wellness: &[&str], targets: &[&str], default_terms: &[&str]) -> Self {
        Self {
            wellness: owned(wellness),
            targets: owned(targets),
            default_terms: owned(default_terms),
        }
    }

    pub fn wellness(&self) -> &[String] {
        &self.wellness
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn is_wellness(&self, subject: &str) -> bool {
        let subject = subject.trim();
        self.wellness
            .iter()
            .any(|known| known.eq_ignore_ascii_case(subject))
    }

    /// The disjunction used when a query has no text of its own.
    pub fn default_terms(&self) -> String {
        self.default_terms.join("+OR+")
    }
}

/// What an empty search lists.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DefaultListing {
    /// Fan out over the target subjects and drop unrelated genres.
    #[default]
    Wellness,
    /// Fan out over the target subjects and keep whatever comes back.
    All,
}

#[derive(Clone, Debug, Default)]
pub struct AdvancedSearch {
    pub description: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
}

pub struct BookFinder<C> {
    catalog: Arc<C>,
    subjects: Subjects,
    default_listing: DefaultListing,
}

impl<C> BookFinder<C>
where
    C: Catalog,
{
    pub fn new(catalog: C, subjects: Subjects, default_listing: DefaultListing) -> Self {
        Self {
            catalog: Arc::new(catalog),
            subjects,
            default_listing,
        }
    }

    pub fn subjects(&self) -> &Subjects {
        &self.subjects
    }

    fn composer(&self) -> Composer<'_> {
        Composer::new(&self.subjects)
    }

    pub async fn search(
        &self,
        text: Option<&str>,
        subject: Option<&str>,
        page: Page,
    ) -> Result<Vec<Book>> {
        match self.composer().search(text, subject, page) {
            Composition::Single(query) => {
                let aggregate = Aggregate::new(CategoryFilter::Unfiltered, page.size as usize);
                self.gather(vec![query], aggregate).await
            }
            Composition::FanOut(queries) => {
                let category = match self.default_listing {
                    DefaultListing::Wellness => CategoryFilter::Wellness,
                    DefaultListing::All => CategoryFilter::Unfiltered,
                };
                self.gather(queries, Aggregate::new(category, page.size as usize))
                    .await
            }
        }
    }

    pub async fn popular(&self, page: Page) -> Result<Vec<Book>> {
        let queries = self
            .composer()
            .fan_out(None, page, Some(OrderBy::Relevance));
        let aggregate = Aggregate::new(CategoryFilter::Wellness, page.size as usize);
        self.gather(queries, aggregate).await
    }

    /// Wellness books, optionally narrowed to one category.
    pub async fn wellness(&self, category: Option<&str>, page: Page) -> Result<Vec<Book>> {
        let category = category
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map_or(CategoryFilter::Wellness, |c| {
                CategoryFilter::Matching(c.to_owned())
            });
        let queries = self.composer().fan_out(None, page, None);
        self.gather(queries, Aggregate::new(category, page.size as usize))
            .await
    }

    pub async fn advanced(&self, search: &AdvancedSearch, page: Page) -> Result<Vec<Book>> {
        let composer = self.composer();
        let queries = match composer.targeted(search.title.as_deref(), search.author.as_deref(), page)
        {
            Some(query) => vec![query],
            None => composer.fan_out(search.description.as_deref(), page, None),
        };

        let aggregate = Aggregate::new(CategoryFilter::Unfiltered, page.size as usize)
            .with_description(search.description.as_deref());
        self.gather(queries, aggregate).await
    }

    async fn gather(&self, queries: Vec<VolumeQuery>, aggregate: Aggregate) -> Result<Vec<Book>> {
        let handles = queries
            .into_iter()
            .map(|query| {
                let catalog = Arc::clone(&self.catalog);
                task::spawn(async move {
                    let outcome = catalog.fetch(&query).await;
                    (query, outcome)
                })
            })
            .collect::<Vec<_>>();

        let issued = handles.len();
        let mut failures = 0;
        let mut results = vec![];

        // In issue order, so earlier subjects win deduplication
        for handle in handles {
            match handle.await {
                Ok((_, Ok(books))) => results.extend(books),
                Ok((query, Err(error))) => {
                    failures += 1;
                    tracing::warn!(%query, %error, "Catalog query failed");
                }
                Err(error) => {
                    failures += 1;
                    tracing::warn!(%error, "Catalog query task failed");
                }
            }
        }

        if issued > 0 && failures == issued {
            Err(Error::ProviderUnavailable(format!(
                "all {issued} catalog queries failed"
            )))
        } else {
            Ok(aggregate.apply(results))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn book(id: &str, categories: &[&str]) -> Book {
        Book {
            catalog_id: id.into(),
            title: Some(format!("Book {id}")),
            description: Some(format!("About {id} and calm")),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Answers by the subject a query targets; a `None` answer is a failure.
    #[derive(Default)]
    struct StubCatalog {
        answers: Vec<(&'static str, Option<Vec<Book>>)>,
        received: Mutex<Vec<VolumeQuery>>,
    }

    impl StubCatalog {
        fn answering(answers: Vec<(&'static str, Option<Vec<Book>>)>) -> Self {
            Self {
                answers,
                ..Default::default()
            }
        }
    }

    impl Catalog for StubCatalog {
        async fn fetch(&self, query: &VolumeQuery) -> Result<Vec<Book>> {
            self.received.lock().unwrap().push(query.clone());
            let answer = self
                .answers
                .iter()
                .find(|(needle, _)| query.terms.contains(needle))
                .map(|(_, answer)| answer.clone());

            match answer {
                Some(Some(books)) => Ok(books),
                Some(None) => Err(Error::Generic("catalog down".to_owned())),
                None => Ok(vec![]),
            }
        }
    }

    fn finder(catalog: StubCatalog) -> BookFinder<StubCatalog> {
        BookFinder::new(catalog, Subjects::default(), DefaultListing::Wellness)
    }

    fn received(finder: &BookFinder<StubCatalog>) -> Vec<VolumeQuery> {
        finder.catalog.received.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn empty_search_fans_out_and_caps_the_page() {
        let many = |prefix: &str| -> Vec<Book> {
            (0..10).map(|i| book(&format!("{prefix}{i}"), &[])).collect()
        };
        let finder = finder(StubCatalog::answering(vec![
            ("subject:self-help", Some(many("s"))),
            ("subject:mindfulness", Some(many("m"))),
        ]));

        let books = finder
            .search(Some(""), Some(""), Page::new(0, 8).unwrap())
            .await
            .unwrap();

        assert_eq!(books.len(), 8);
        assert_eq!(books[0].catalog_id.as_str(), "s0");

        let queries = received(&finder);
        assert!(queries.len() <= 4);
        assert!(queries.iter().all(|q| q.max_results == 10));
        assert!(queries
            .iter()
            .all(|q| q.terms.starts_with(&finder.subjects().default_terms())));
    }

    #[tokio::test]
    async fn fan_out_dedupes_across_subjects_in_subject_order() {
        let finder = finder(StubCatalog::answering(vec![
            ("subject:self-help", Some(vec![book("a", &[]), book("b", &[])])),
            ("subject:mindfulness", Some(vec![book("b", &[]), book("c", &[])])),
        ]));

        let books = finder.popular(Page::new(0, 16).unwrap()).await.unwrap();
        let ids: Vec<_> = books.iter().map(|b| b.catalog_id.as_str()).collect();

        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(received(&finder)
            .iter()
            .all(|q| q.order_by == Some(OrderBy::Relevance)));
    }

    #[tokio::test]
    async fn partial_failures_are_tolerated() {
        let finder = finder(StubCatalog::answering(vec![
            ("subject:self-help", None),
            ("subject:mindfulness", Some(vec![book("m", &[])])),
        ]));

        let books = finder.wellness(None, Page::new(0, 8).unwrap()).await.unwrap();
        assert_eq!(books.len(), 1);
    }

    #[tokio::test]
    async fn total_failure_reports_the_provider_unavailable() {
        let finder = finder(StubCatalog::answering(vec![("subject:", None)]));

        let result = finder.wellness(None, Page::new(0, 8).unwrap()).await;
        assert!(matches!(result, Err(Error::ProviderUnavailable(..))));

        let single = finder
            .search(Some("calm"), Some("mindfulness"), Page::new(0, 8).unwrap())
            .await;
        assert!(matches!(single, Err(Error::ProviderUnavailable(..))));
    }

    #[tokio::test]
    async fn wellness_listing_filters_by_category() {
        let finder = finder(StubCatalog::answering(vec![(
            "subject:self-help",
            Some(vec![
                book("med", &["Body, Mind & Spirit / Meditation"]),
                book("novel", &["Fiction"]),
            ]),
        )]));

        let page = Page::new(0, 8).unwrap();
        let narrowed = finder.wellness(Some("mindfulness"), page).await.unwrap();
        assert_eq!(narrowed.len(), 1);
        assert_eq!(narrowed[0].catalog_id.as_str(), "med");

        let broad = finder.wellness(None, page).await.unwrap();
        assert_eq!(broad.len(), 1);
    }

    #[tokio::test]
    async fn unfiltered_default_listing_keeps_every_genre() {
        let finder = BookFinder::new(
            StubCatalog::answering(vec![(
                "subject:self-help",
                Some(vec![book("novel", &["Fiction"])]),
            )]),
            Subjects::default(),
            DefaultListing::All,
        );

        let books = finder.search(None, None, Page::new(0, 8).unwrap()).await.unwrap();
        assert_eq!(books.len(), 1);
    }

    #[tokio::test]
    async fn advanced_search_targets_title_and_filters_descriptions() {
        let finder = finder(StubCatalog::answering(vec![(
            "intitle:",
            Some(vec![
                book("a", &[]),
                Book {
                    description: Some("Nothing relevant".to_owned()),
                    ..book("b", &[])
                },
            ]),
        )]));

        let search = AdvancedSearch {
            description: Some("CALM".to_owned()),
            title: Some("Stillness Is the Key".to_owned()),
            author: None,
        };
        let books = finder
            .advanced(&search, Page::new(0, 16).unwrap())
            .await
            .unwrap();

        assert_eq!(books.len(), 1);
        assert_eq!(books[0].catalog_id.as_str(), "a");

        let queries = received(&finder);
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].terms, "intitle:Stillness%20Is%20the%20Key");
    }
}
