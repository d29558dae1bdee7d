use std::sync::LazyLock;

use regex::Regex;

static BOOKMARK_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s"<>]+"#).expect("bookmark url pattern is valid")
});

/// Split a newline-delimited URL list into trimmed, non-empty entries.
pub fn parse_url_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Pull every `http(s)://` URL out of an exported bookmarks file.
///
/// Matches stop at whitespace, angle brackets and double quotes; a stray
/// surrounding quote character is stripped. Order and duplicates follow the
/// file.
pub fn extract_bookmark_urls(html: &str) -> Vec<String> {
    BOOKMARK_URL
        .find_iter(html)
        .map(|found| found.as_str().trim_matches(|c| c == '"' || c == '\''))
        .filter(|url| !url.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
