use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::summary::ParsedSummary;

/// Heading stored when a page has no usable `<title>`.
pub const NO_TITLE: &str = "No title found";

/// One enriched bookmark, keyed by its normalized URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub id: Uuid,
    pub url: String,
    pub heading: String,
    pub summary: String,
    /// Comma-joined keyword set.
    pub tags: String,
    pub fetched_utc: String,
}

impl UrlRecord {
    pub fn new(
        normalized_url: impl Into<String>,
        heading: Option<&str>,
        parsed: ParsedSummary,
        fetched_utc: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: normalized_url.into(),
            heading: heading.unwrap_or(NO_TITLE).to_string(),
            summary: parsed.summary,
            tags: parsed.tags,
            fetched_utc: fetched_utc.into(),
        }
    }

    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .split(", ")
            .filter(|tag| !tag.is_empty())
            .collect()
    }
}
