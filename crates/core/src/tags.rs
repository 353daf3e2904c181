//! Bill-type tags embedded in note text as `[Tag]` tokens.

use regex::Regex;
use std::collections::HashMap;

/// Pulls categorical tags out of free text. Implementations must be pure:
/// the same text always yields the same tags, in first-seen order, without duplicates.
pub trait TagExtractor {
    fn extract(&self, text: &str) -> Vec<String>;
}

impl<F> TagExtractor for F
where
    F: Fn(&str) -> Vec<String>,
{
    fn extract(&self, text: &str) -> Vec<String> {
        self(text)
    }
}

/// Older notes used different spellings for some tags.
pub const LEGACY_TAG_ALIASES: &[(&str, &str)] = &[
    ("utility", "Utilities"),
    ("bill", "Bills"),
    ("sub", "Subscription"),
    ("subs", "Subscription"),
    ("insurance", "Insurance"),
    ("rent", "Housing"),
    ("mortgage", "Housing"),
];

const TAG_PATTERN: &str = r"\[([^\[\]]+)\]";

pub struct BracketTagExtractor {
    pattern: Regex,
    aliases: HashMap<String, String>,
}

impl Default for BracketTagExtractor {
    fn default() -> Self {
        Self::with_aliases(LEGACY_TAG_ALIASES)
    }
}

impl BracketTagExtractor {
    pub fn with_aliases(aliases: &[(&str, &str)]) -> Self {
        Self {
            pattern: Regex::new(TAG_PATTERN).expect("tag pattern is valid"),
            aliases: aliases
                .iter()
                .map(|(legacy, tag)| (legacy.to_lowercase(), tag.to_string()))
                .collect(),
        }
    }

    fn canonical(&self, raw: &str) -> String {
        self.aliases
            .get(&raw.to_lowercase())
            .cloned()
            .unwrap_or_else(|| raw.to_string())
    }
}

impl TagExtractor for BracketTagExtractor {
    fn extract(&self, text: &str) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        for cap in self.pattern.captures_iter(text) {
            let raw = cap[1].trim();
            if raw.is_empty() {
                continue;
            }
            let tag = self.canonical(raw);
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        tags
    }
}

/// Renders tags back into note form: `[A] [B]`.
pub fn format_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|t| format!("[{t}]"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tags_in_order() {
        let extractor = BracketTagExtractor::default();
        let tags = extractor.extract("[Streaming] paid by card [Entertainment]");
        assert_eq!(tags, vec!["Streaming", "Entertainment"]);
    }

    #[test]
    fn text_without_tags_yields_nothing() {
        let extractor = BracketTagExtractor::default();
        assert!(extractor.extract("paid online").is_empty());
        assert!(extractor.extract("[]").is_empty());
        assert!(extractor.extract("[   ]").is_empty());
    }

    #[test]
    fn translates_legacy_tags() {
        let extractor = BracketTagExtractor::default();
        assert_eq!(extractor.extract("[utility]"), vec!["Utilities"]);
        assert_eq!(extractor.extract("[SUB] [Subscription]"), vec!["Subscription"]);
    }

    #[test]
    fn deduplicates_after_translation() {
        let extractor = BracketTagExtractor::default();
        assert_eq!(extractor.extract("[Rent][mortgage][Housing]"), vec!["Housing"]);
    }

    #[test]
    fn closures_are_extractors() {
        let upper = |text: &str| vec![text.to_uppercase()];
        assert_eq!(upper.extract("gym"), vec!["GYM"]);
    }

    #[test]
    fn format_round_trip() {
        let tags = vec!["Utilities".to_string(), "Bills".to_string()];
        let notes = format_tags(&tags);
        assert_eq!(notes, "[Utilities] [Bills]");
        assert_eq!(BracketTagExtractor::with_aliases(&[]).extract(&notes), tags);
    }
}
