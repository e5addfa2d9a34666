use clap::{Parser, ValueEnum};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

use crate::catalog::{google, DefaultListing};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Listing {
    /// Drop unrelated genres from the empty search
    Wellness,
    /// Keep whatever the catalog returns
    All,
}

impl From<Listing> for DefaultListing {
    fn from(value: Listing) -> Self {
        match value {
            Listing::Wellness => DefaultListing::Wellness,
            Listing::All => DefaultListing::All,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "wellspring")]
#[command(about = "A wellness diary and reading list service")]
pub struct Settings {
    #[arg(long, env = "WELLSPRING_LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    #[arg(long, env = "WELLSPRING_STORE", default_value = "wellspring-store")]
    pub store_path: PathBuf,

    #[arg(
        long,
        env = "GOOGLE_BOOKS_API_KEY",
        help = "Catalog API key, anonymous access when absent",
        hide_env_values = true
    )]
    pub api_key: Option<String>,

    #[arg(long, env = "WELLSPRING_CATALOG_URL", default_value = google::VOLUMES_ENDPOINT)]
    pub catalog_url: String,

    #[arg(
        long,
        env = "WELLSPRING_REQUEST_TIMEOUT",
        default_value_t = 10,
        help = "Catalog request timeout in seconds"
    )]
    pub request_timeout: u64,

    #[arg(long, env = "WELLSPRING_DEFAULT_LISTING", value_enum, default_value_t = Listing::Wellness)]
    pub default_listing: Listing,

    #[arg(long, env = "WELLSPRING_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}
