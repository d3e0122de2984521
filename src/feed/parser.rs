use rss::Channel;

/// A single `<item>` as it appears in the feed, before any normalization.
///
/// Missing elements decode as empty strings; deciding what an empty value
/// means is left to the ingestor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: String,
}

impl From<&rss::Item> for RawFeedItem {
    fn from(item: &rss::Item) -> Self {
        Self {
            title: item.title().unwrap_or_default().to_string(),
            link: item.link().unwrap_or_default().to_string(),
            description: item.description().unwrap_or_default().to_string(),
            pub_date: item.pub_date().unwrap_or_default().to_string(),
        }
    }
}

/// The `<channel>` of an RSS 2.0 document.
#[derive(Debug, Clone, Default)]
pub struct RssChannel {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<RawFeedItem>,
}

/// Decode an RSS 2.0 document into its channel.
///
/// Decoding is lenient inside an item: markup nested in a text element is
/// skipped and a repeated element replaces the earlier one, so one sloppy item
/// never costs its siblings. A body without an `<rss>` root, or one that isn't
/// well-formed XML, is an error.
pub fn parse_channel(bytes: &[u8]) -> Result<RssChannel, rss::Error> {
    let channel = Channel::read_from(bytes)?;
    Ok(RssChannel {
        title: channel.title().to_string(),
        link: channel.link().to_string(),
        description: channel.description().to_string(),
        items: channel.items().iter().map(RawFeedItem::from).collect(),
    })
}
