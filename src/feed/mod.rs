//! Feed retrieval and decoding.
//!
//! - [`fetcher`] - HTTP retrieval with a timeout and body size cap
//! - [`parser`] - RSS 2.0 decoding into [`RawFeedItem`]s
//! - [`date`] - `pubDate` normalization with ordered fallback layouts
//!
//! Nothing in here touches the store; the scraper module wires these pieces
//! to the database.

mod date;
mod fetcher;
mod parser;

pub use date::{normalize_pub_date, DateParseError};
pub use fetcher::{build_http_client, fetch_feed, FetchError};
pub use parser::{parse_channel, RawFeedItem, RssChannel};

use thiserror::Error;
use url::Url;

/// Reasons a feed URL is refused at registration time.
#[derive(Debug, Error)]
pub enum FeedUrlError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    MissingHost,
}

/// Check that a feed URL can be fetched over HTTP(S).
pub fn validate_feed_url(url_str: &str) -> Result<Url, FeedUrlError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(FeedUrlError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(FeedUrlError::MissingHost);
    }

    Ok(url)
}
