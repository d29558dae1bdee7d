use std::collections::BTreeSet;

/// Fixed instruction placed ahead of the page text.
pub const PROMPT_INSTRUCTION: &str =
    "Concisely summarise web page information and descriptive SEO keywords and tags: \n\n";
/// Characters of extracted page text sent to the backend.
pub const PROMPT_TEXT_LIMIT: usize = 2_000;
/// Characters of summary kept before the ellipsis marker.
pub const SUMMARY_CHAR_LIMIT: usize = 200;
pub const ELLIPSIS: &str = "...";
/// Tags must be strictly longer than this many characters.
pub const MIN_TAG_CHARS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSummary {
    pub summary: String,
    pub tags: String,
}

pub fn build_summary_prompt(text: &str) -> String {
    format!("{PROMPT_INSTRUCTION}{}", char_prefix(text, PROMPT_TEXT_LIMIT))
}

/// Split a generated response into a summary line and a tag list.
///
/// The first line is the summary candidate. Tags come from the whole response,
/// not a dedicated section: the backend is free-form. Returns `None` when the
/// candidate is empty.
pub fn parse_summary_response(response: &str) -> Option<ParsedSummary> {
    let candidate = response
        .trim_start()
        .lines()
        .next()
        .map(str::trim_end)
        .unwrap_or_default();
    if candidate.is_empty() {
        return None;
    }

    Some(ParsedSummary {
        summary: truncate_summary(candidate),
        tags: join_tags(&extract_tags(response)),
    })
}

pub fn truncate_summary(candidate: &str) -> String {
    if candidate.chars().count() > SUMMARY_CHAR_LIMIT {
        format!("{}{ELLIPSIS}", char_prefix(candidate, SUMMARY_CHAR_LIMIT))
    } else {
        candidate.to_string()
    }
}

/// Unique purely-alphabetic tokens longer than [`MIN_TAG_CHARS`], case-sensitive.
pub fn extract_tags(response: &str) -> BTreeSet<String> {
    response
        .split_whitespace()
        .filter(|word| word.chars().all(char::is_alphabetic))
        .filter(|word| word.chars().count() > MIN_TAG_CHARS)
        .map(ToOwned::to_owned)
        .collect()
}

pub fn join_tags(tags: &BTreeSet<String>) -> String {
    tags.iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::char_prefix;

    #[test]
    fn char_prefix_respects_multibyte_boundaries() {
        assert_eq!(char_prefix("héllo", 2), "hé");
        assert_eq!(char_prefix("abc", 10), "abc");
        assert_eq!(char_prefix("", 3), "");
    }
}
