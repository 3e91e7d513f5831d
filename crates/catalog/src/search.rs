//! Search expressions understood by the catalog tool.

use shelf_metadata::Identifier;

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Exact identifier match, e.g. `identifiers:"=isbn:=9780000000000"`.
pub fn identifier(identifier: &Identifier) -> String {
    format!("identifiers:\"={}:={}\"", escape(&identifier.scheme), escape(&identifier.value))
}

/// Books that have a file in `format`, e.g. `formats:"=EPUB"`.
pub fn format(format: &str) -> String {
    format!("formats:\"={}\"", escape(&format.to_uppercase()))
}

/// A single book by id.
pub fn book(id: u64) -> String {
    format!("id:{id}")
}

/// Conjunction of every term.
pub fn all<I: IntoIterator<Item = S>, S: AsRef<str>>(terms: I) -> String {
    terms.into_iter().map(|t| t.as_ref().to_string()).collect::<Vec<_>>().join(" and ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier() {
        let id = Identifier::new("url", "https://standardebooks.org/ebooks/h-g-wells/the-time-machine");
        assert_eq!(identifier(&id), r#"identifiers:"=url:=https://standardebooks.org/ebooks/h-g-wells/the-time-machine""#);
        assert_eq!(identifier(&Identifier::new("x", "a\"b")), r#"identifiers:"=x:=a\"b""#);
    }

    #[test]
    fn test_combined() {
        let expr = all([identifier(&Identifier::new("isbn", "1")), format("epub")]);
        assert_eq!(expr, r#"identifiers:"=isbn:=1" and formats:"=EPUB""#);
        assert_eq!(book(42), "id:42");
    }
}
