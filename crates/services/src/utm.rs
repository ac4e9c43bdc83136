//! # UTM Extractor
//!
//! Pulls campaign tags (`utm_*` query parameters) out of a request URL.

use std::collections::BTreeMap;
use url::Url;

const UTM_PREFIX: &str = "utm_";

/// Returns `None` when the URL carries no campaign tags or does not parse.
/// Keys keep their original casing; values are percent-decoded.
pub fn extract(request_url: &str) -> Option<BTreeMap<String, String>> {
    let url = Url::parse(request_url).ok()?;
    let tags: BTreeMap<String, String> = url
        .query_pairs()
        .filter(|(key, _)| key.starts_with(UTM_PREFIX))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    (!tags.is_empty()).then_some(tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_utm_parameters() {
        let tags = extract("https://bio.test/alice?utm_source=ig&ref=abc&utm_Campaign=Spring%20Sale").unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags["utm_source"], "ig");
        assert_eq!(tags["utm_Campaign"], "Spring Sale");
    }

    #[test]
    fn no_tags_is_none_not_empty() {
        assert_eq!(extract("https://bio.test/alice?ref=abc"), None);
        assert_eq!(extract("https://bio.test/alice"), None);
    }

    #[test]
    fn malformed_input_contributes_nothing() {
        assert_eq!(extract("not a url"), None);
        let bare = extract("https://bio.test/?utm_source").unwrap();
        assert_eq!(bare.get("utm_source").map(String::as_str), Some(""));
    }

    #[test]
    fn prefix_is_case_sensitive() {
        assert_eq!(extract("https://bio.test/?UTM_SOURCE=x"), None);
    }
}
