use reqwest::{Client, Request};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;

use crate::{
    catalog::{query::VolumeQuery, Catalog},
    core::model::{Book, CatalogId},
    error::{self, Error},
};

pub const VOLUMES_ENDPOINT: &str = "https://www.googleapis.com/books/v1/volumes";

/// Upper bound on `maxResults`, whatever the caller asks for.
pub const MAX_RESULTS_CAP: u32 = 48;

#[derive(Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<JsonValue>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Volume {
    id: Option<String>,
    #[serde(default)]
    volume_info: VolumeInfo,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    title: Option<String>,
    subtitle: Option<String>,
    authors: Option<Vec<String>>,
    publisher: Option<String>,
    published_date: Option<String>,
    description: Option<String>,
    categories: Option<Vec<String>>,
    image_links: Option<ImageLinks>,
    preview_link: Option<String>,
    average_rating: Option<f64>,
    ratings_count: Option<u32>,
}

#[derive(Deserialize)]
struct ImageLinks {
    thumbnail: Option<String>,
}

impl From<Volume> for Book {
    fn from(Volume { id, volume_info }: Volume) -> Self {
        let VolumeInfo {
            title,
            subtitle,
            authors,
            publisher,
            published_date,
            description,
            categories,
            image_links,
            preview_link,
            average_rating,
            ratings_count,
        } = volume_info;

        Self {
            catalog_id: CatalogId(id.unwrap_or_default()),
            title,
            subtitle,
            authors: authors.unwrap_or_default(),
            publisher,
            published_date,
            description,
            thumbnail_url: image_links
                .and_then(|links| links.thumbnail)
                .map(|url| url.replacen("http://", "https://", 1)),
            preview_url: preview_link,
            categories: categories.unwrap_or_default(),
            average_rating,
            ratings_count,
            is_saved: false,
        }
    }
}

/// Flattens a volumes response. A body that is not a volumes response
/// yields nothing; items that do not parse are skipped.
pub fn parse_volumes(body: &[u8]) -> Vec<Book> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return vec![];
    }

    let response: VolumesResponse = match serde_json::from_slice(body) {
        Ok(response) => response,
        Err(error) => {
            tracing::warn!(%error, "Unreadable catalog response");
            return vec![];
        }
    };

    response
        .items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Volume>(item) {
            Ok(volume) => Some(volume.into()),
            Err(error) => {
                tracing::warn!(%error, "Skipping catalog item");
                None
            }
        })
        .collect()
}

#[derive(Clone)]
pub struct GoogleBooks {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl GoogleBooks {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> error::Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    fn parameters(&self, query: &VolumeQuery) -> Vec<(&'static str, String)> {
        let mut parameters = vec![
            ("maxResults", query.max_results.min(MAX_RESULTS_CAP).to_string()),
            ("startIndex", query.start_index.to_string()),
            ("printType", "books".to_owned()),
            ("langRestrict", "en".to_owned()),
        ];

        if let Some(order_by) = query.order_by {
            parameters.push(("orderBy", order_by.as_str().to_owned()));
        }

        if let Some(key) = &self.api_key {
            parameters.push(("key", key.clone()));
        }

        parameters
    }

    // `q` goes in verbatim, it is already in the provider's syntax
    fn resource_uri(&self, query: &VolumeQuery) -> String {
        format!("{}?q={}", self.base_url, query.terms)
    }
}

impl GoogleBooks {
    fn request(&self, query: &VolumeQuery) -> error::Result<Request> {
        Ok(self
            .http_client
            .get(self.resource_uri(query))
            .query(&self.parameters(query))
            .build()?)
    }
}

impl Catalog for GoogleBooks {
    async fn fetch(&self, query: &VolumeQuery) -> error::Result<Vec<Book>> {
        tracing::debug!(%query, "Querying the book catalog");

        let response = self.http_client.execute(self.request(query)?).await?;

        if response.status().is_success() {
            Ok(parse_volumes(&response.bytes().await?))
        } else {
            Err(Error::Upstream(response.status()))
        }
    }
}
