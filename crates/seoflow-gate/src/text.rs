//! Markdown-light text helpers shared by the checks.

use std::sync::LazyLock;

use regex::Regex;

static TOP_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#[ \t]+\S").expect("valid heading regex"));
static INTERNAL_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\]\((/[^)\s]*)\)").expect("valid link regex"));

/// Lowercase alphanumeric words, punctuation dropped.
pub(crate) fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|w| w.trim_matches('\'').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Body reduced to its words joined by single spaces.
pub(crate) fn normalized(text: &str) -> String {
    words(text).join(" ")
}

pub(crate) fn top_level_headings(body: &str) -> usize {
    TOP_HEADING_RE.find_iter(body).count()
}

/// Root-relative markdown link targets in `body`.
pub(crate) fn internal_links(body: &str) -> Vec<String> {
    INTERNAL_LINK_RE
        .captures_iter(body)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Non-overlapping occurrences of `phrase` as a whole-word sequence.
pub(crate) fn phrase_occurrences(haystack: &[String], phrase: &[String]) -> usize {
    if phrase.is_empty() || haystack.len() < phrase.len() {
        return 0;
    }
    let mut count = 0;
    let mut i = 0;
    while i + phrase.len() <= haystack.len() {
        if haystack[i..i + phrase.len()] == *phrase {
            count += 1;
            i += phrase.len();
        } else {
            i += 1;
        }
    }
    count
}

/// Replaces every whole-word occurrence of each name with a placeholder.
pub(crate) fn mask_names(text: &str, names: &[&str]) -> String {
    let mut tokens = words(text);
    for name in names {
        let needle = words(name);
        if needle.is_empty() {
            continue;
        }
        let mut out = Vec::with_capacity(tokens.len());
        let mut i = 0;
        while i < tokens.len() {
            if i + needle.len() <= tokens.len() && tokens[i..i + needle.len()] == *needle {
                out.push("{place}".to_string());
                i += needle.len();
            } else {
                out.push(tokens[i].clone());
                i += 1;
            }
        }
        tokens = out;
    }
    tokens.join(" ")
}
