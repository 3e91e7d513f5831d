use crate::error::{Error, ErrorKind};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// A `(scheme, value)` pair that uniquely resolves a catalog entry to a
/// source book, e.g. `isbn:9780000000000` or `url:https://example.org/book`.
///
/// The wire format is `scheme:value`; only the first colon separates the two
/// halves, so values (URLs in particular) may contain further colons.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier {
    pub scheme: String,
    pub value: String,
}
impl Identifier {
    pub fn new(scheme: impl Into<String>, value: impl ToString) -> Self {
        Self {
            scheme: scheme.into().trim().to_lowercase(),
            value: value.to_string().trim().to_string(),
        }
    }
}

impl FromStr for Identifier {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((scheme, value)) if !scheme.trim().is_empty() && !value.trim().is_empty() => {
                Ok(Self::new(scheme, value))
            },
            _ => exn::bail!(ErrorKind::ParseError {
                field: "identifier",
                value: s.to_string(),
            }),
        }
    }
}
impl<S: Into<String>, V: ToString> From<(S, V)> for Identifier {
    fn from((scheme, value): (S, V)) -> Self {
        Self::new(scheme, value)
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.scheme, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_wire_format() {
        let identifier = Identifier::new("isbn", "9780000000000");
        assert_eq!(identifier.to_string(), "isbn:9780000000000");
        let parsed: Identifier = identifier.to_string().parse().unwrap();
        assert_eq!(parsed, identifier);
    }

    #[test]
    fn test_numeric_value() {
        assert_eq!(Identifier::new("goodreads", 42u64).to_string(), "goodreads:42");
    }

    #[rstest]
    #[case("url:https://example.org/ebooks/a/b", "url", "https://example.org/ebooks/a/b")]
    #[case("ISBN: 123 ", "isbn", "123")]
    fn test_parse(#[case] input: &str, #[case] scheme: &str, #[case] value: &str) {
        let identifier: Identifier = input.parse().unwrap();
        assert_eq!(identifier.scheme, scheme);
        assert_eq!(identifier.value, value);
    }

    #[rstest]
    #[case("isbn")]
    #[case(":123")]
    #[case("isbn:")]
    #[case("")]
    fn test_parse_rejects(#[case] input: &str) {
        assert!(input.parse::<Identifier>().is_err());
    }
}
