use regex::Regex;
use scraper::Selector;
use std::sync::LazyLock;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        pub(crate) static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

selector!(ANCHOR_SELECTOR, "a[href]");
regex!(INTER_TAG_WHITESPACE_REGEX, r">\s+<");
regex!(WHITESPACE_REGEX, r"\s+");

// Site-relative paths of internal links.
// Book pages: `/ebooks/<author>/<title>[/<contributor>...]`.
regex!(BOOK_PATH_REGEX, r"^/ebooks/[^/?#]+/[^/?#]+(?:/[^/?#]+)*/?$");
regex!(AUTHOR_PATH_REGEX, r"^/ebooks/[^/?#]+/?$");
regex!(COLLECTION_PATH_REGEX, r"^/collections/[^/?#]+/?$");

/// Words left in lower case inside a tag, unless first or last.
pub(crate) const TAG_STOPWORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "but", "by", "for", "from", "in", "into", "nor", "of", "on", "or", "per", "the", "to",
    "via", "vs", "with",
];
