//! Canonical form of subject tags.
//!
//! Subjects arrive as library-style headings (`Science fiction -- Fiction`).
//! They are split into separate tags, qualifiers such as `(Fictitious
//! character)` are folded back into the tag they qualify, and each tag is
//! title-cased and stripped of characters the catalog treats specially.
//! Sanitizing an already sanitized list changes nothing.

use crate::consts::{TAG_STOPWORDS, WHITESPACE_REGEX};
use std::collections::BTreeSet;

const HEADING_SEPARATOR: &str = "--";
/// Stand-in for `,`, which the catalog uses to separate tags.
const COMMA_PLACEHOLDER: char = '\u{201A}';

/// Sanitized, deduplicated tags in sorted order.
pub fn sanitize<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut merged: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().replace('"', "");
        for part in tag.split(HEADING_SEPARATOR) {
            let part = WHITESPACE_REGEX.replace_all(part.trim(), " ");
            if part.is_empty() {
                continue;
            }
            match merged.last_mut() {
                Some(previous) if part.starts_with('(') => {
                    previous.push(' ');
                    previous.push_str(&part);
                },
                // A qualifier with nothing to qualify stands on its own.
                None if part.starts_with('(') => merged.extend(unwrap_qualifier(&part)),
                _ => merged.push(part.into_owned()),
            }
        }
    }
    let canonical: BTreeSet<String> = merged
        .iter()
        .map(|tag| {
            title_case(tag, ' ')
                .replace(" and ", " & ")
                .replace(',', &COMMA_PLACEHOLDER.to_string())
        })
        .collect();
    canonical.into_iter().collect()
}

/// `(1837-1901)` becomes `1837-1901`, so it can never attach itself to a
/// neighbour once sorted.
fn unwrap_qualifier(part: &str) -> Option<String> {
    let mut inner = part;
    while let Some(rest) = inner.strip_prefix('(') {
        inner = rest.strip_suffix(')').unwrap_or(rest).trim();
    }
    (!inner.is_empty()).then(|| inner.to_string())
}

/// Current catalog tags in the same shape as [`sanitize`] output, for
/// comparison.
pub fn normalize_current(tags: &[String]) -> Vec<String> {
    let set: BTreeSet<&str> = tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).collect();
    set.into_iter().map(str::to_string).collect()
}

/// Capitalizes each word except stopwords in the middle of the phrase.
/// Hyphenated words are treated as phrases of their own.
fn title_case(phrase: &str, separator: char) -> String {
    let words: Vec<&str> = phrase.split(separator).collect();
    let last = words.len().saturating_sub(1);
    words
        .iter()
        .enumerate()
        .map(|(position, word)| {
            if separator == ' ' && word.contains('-') {
                title_case(word, '-')
            } else if position != 0 && position != last && is_stopword(word) {
                word.to_lowercase()
            } else {
                capitalize(word)
            }
        })
        .collect::<Vec<_>>()
        .join(&separator.to_string())
}

fn is_stopword(word: &str) -> bool {
    let bare = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
    TAG_STOPWORDS.contains(&bare.as_str())
}

/// Upper-cases the first letter, leaving everything else untouched.
fn capitalize(word: &str) -> String {
    match word.char_indices().find(|(_, c)| c.is_alphabetic()) {
        Some((index, letter)) => {
            let rest = &word[index + letter.len_utf8()..];
            format!("{}{}{}", &word[..index], letter.to_uppercase(), rest)
        },
        None => word.to_string(),
    }
}
