//! Book descriptions: minification and rewriting of links between books.

use crate::consts::{
    ANCHOR_SELECTOR, AUTHOR_PATH_REGEX, BOOK_PATH_REGEX, COLLECTION_PATH_REGEX, INTER_TAG_WHITESPACE_REGEX,
    WHITESPACE_REGEX,
};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use scraper::Html;
use shelf_asyncutils::CancellationToken;
use shelf_catalog::Catalog;
use shelf_metadata::Identifier;

/// Identifier scheme under which books record their page on the site.
const URL_SCHEME: &str = "url";

/// Collapses whitespace runs and removes whitespace between tags.
pub fn minify(markup: &str) -> String {
    let collapsed = INTER_TAG_WHITESPACE_REGEX.replace_all(markup, "><");
    WHITESPACE_REGEX.replace_all(&collapsed, " ").trim().to_string()
}

/// Where a link in a description points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    /// Another book on the site, by its absolute page URL.
    Book(String),
    Author(String),
    Collection(String),
    Unrecognized(String),
}

/// Classifies and rewrites links relative to the site books come from.
#[derive(Debug, Clone)]
pub struct LinkRewriter {
    base: String,
}

impl LinkRewriter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Site-relative path of `href`, if it points at the site.
    fn site_path<'a>(&self, href: &'a str) -> Option<&'a str> {
        let path = match href.strip_prefix(&self.base) {
            Some(rest) => rest,
            None if href.starts_with('/') && !href.starts_with("//") => href,
            None => return None,
        };
        let end = path.find(['?', '#']).unwrap_or(path.len());
        Some(&path[..end])
    }

    pub fn classify(&self, href: &str) -> Link {
        let Some(path) = self.site_path(href) else {
            return Link::Unrecognized(href.to_string());
        };
        // Author pages share the book prefix, so check them first.
        if AUTHOR_PATH_REGEX.is_match(path) {
            Link::Author(href.to_string())
        } else if BOOK_PATH_REGEX.is_match(path) {
            Link::Book(format!("{}{}", self.base, path.trim_end_matches('/')))
        } else if COLLECTION_PATH_REGEX.is_match(path) {
            Link::Collection(href.to_string())
        } else {
            Link::Unrecognized(href.to_string())
        }
    }

    /// Every link target in `markup`, in document order.
    pub fn links(&self, markup: &str) -> Vec<(String, Link)> {
        let fragment = Html::parse_fragment(markup);
        fragment
            .select(&ANCHOR_SELECTOR)
            .filter_map(|a| a.value().attr("href"))
            .map(|href| (href.to_string(), self.classify(href)))
            .collect()
    }

    /// Points links to other books at their catalog entries
    /// (`calibre://show-book/_/<id>`).
    ///
    /// Books are looked up by their `url` identifier. Links to books that
    /// are not in the catalog, and all other links, are left as they are.
    pub async fn rewrite(&self, markup: &str, catalog: &Catalog, cancel: &CancellationToken) -> Result<String> {
        let mut rewritten = markup.to_string();
        for (href, link) in self.links(markup) {
            match link {
                Link::Book(url) => {
                    let identifier = Identifier::new(URL_SCHEME, &url);
                    match catalog.find(&identifier, None, cancel).await.or_raise(|| ErrorKind::Catalog)? {
                        Some(entry) => {
                            tracing::debug!(%url, id = entry.id, "Rewriting link to book in catalog");
                            rewritten = replace_href(&rewritten, &href, &format!("calibre://show-book/_/{}", entry.id));
                        },
                        None => tracing::info!(%url, "Linked book is not in the catalog; leaving link as is"),
                    }
                },
                Link::Author(href) => tracing::debug!(%href, "Leaving author link as is"),
                Link::Collection(href) => tracing::debug!(%href, "Leaving collection link as is"),
                Link::Unrecognized(href) => tracing::debug!(%href, "Unrecognized link in description"),
            }
        }
        Ok(rewritten)
    }
}

/// Replaces `href` attribute values equal to `from`, whichever quotes they use.
///
/// `from` is the decoded attribute value, so its entity-escaped spelling is
/// matched as well.
fn replace_href(markup: &str, from: &str, to: &str) -> String {
    let mut rewritten = markup.to_string();
    let escaped = escape_attribute(from);
    for spelling in std::iter::once(from).chain((escaped != from).then_some(escaped.as_str())) {
        rewritten = rewritten
            .replace(&format!("href=\"{spelling}\""), &format!("href=\"{to}\""))
            .replace(&format!("href='{spelling}'"), &format!("href='{to}'"));
    }
    rewritten
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
