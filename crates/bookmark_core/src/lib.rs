//! Bookmark core: pure URL handling, response parsing and batch outcome types.
mod input;
mod normalize;
mod outcome;
mod record;
mod summary;

pub use input::{extract_bookmark_urls, parse_url_list};
pub use normalize::{is_tracking_key, normalize_url, TRACKING_PREFIXES};
pub use outcome::{BatchReport, BrokenUrl, FailureStage, SkipReason, UrlOutcome, UrlReport};
pub use record::{UrlRecord, NO_TITLE};
pub use summary::{
    build_summary_prompt, extract_tags, join_tags, parse_summary_response, truncate_summary,
    ParsedSummary, ELLIPSIS, PROMPT_INSTRUCTION, PROMPT_TEXT_LIMIT, SUMMARY_CHAR_LIMIT,
};
