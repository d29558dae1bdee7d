use url::Url;

/// Query keys starting with any of these prefixes are tracking noise.
pub const TRACKING_PREFIXES: [&str; 3] = ["amp_", "precache_", "utm_"];

/// Canonicalize a URL for deduplication by dropping tracking query parameters.
///
/// Scheme, host, path and fragment are kept as parsed. The surviving query
/// pairs are re-encoded in their original order, so repeated keys stay
/// repeated. Input that does not parse as an absolute URL is returned trimmed
/// but otherwise untouched.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut url) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };

    if url.query().is_none() {
        return url.into();
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_key(key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(&kept);
    }
    url.into()
}

pub fn is_tracking_key(key: &str) -> bool {
    TRACKING_PREFIXES
        .iter()
        .any(|prefix| key.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_without_query_is_left_alone() {
        assert_eq!(
            normalize_url("https://example.com/a/b#frag"),
            "https://example.com/a/b#frag"
        );
    }

    #[test]
    fn tracking_prefix_must_match_start_of_key() {
        assert!(is_tracking_key("utm_source"));
        assert!(is_tracking_key("amp_js_v"));
        assert!(!is_tracking_key("xutm_source"));
        assert!(!is_tracking_key("UTM_SOURCE"));
    }
}
