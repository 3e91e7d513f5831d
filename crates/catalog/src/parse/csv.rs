use memchr::memchr2_iter;

/// A reassembled CSV record. `None` marks an empty, unquoted field.
pub type Record = Vec<Option<String>>;

const QUOTE: u8 = b'"';

/// Incremental, quote-aware CSV reassembler.
///
/// Quoted fields may span physical lines: a line that ends while the current
/// field has an odd number of quote characters continues that field on the
/// next line, joined by `\n`. A delimiter only splits fields at even quote
/// parity. The first physical line is the header and is discarded.
#[derive(Debug)]
pub struct CsvReassembler {
    delimiter: u8,
    header_seen: bool,
    fields: Vec<String>,
    /// Raw text of the field currently being assembled.
    current: String,
    /// Quote characters seen so far in `current`.
    quotes: usize,
    /// Whether `current` has been started on this record at all.
    pending: bool,
}

impl Default for CsvReassembler {
    fn default() -> Self {
        Self::new(b',')
    }
}

impl CsvReassembler {
    pub fn new(delimiter: u8) -> Self {
        Self {
            delimiter,
            header_seen: false,
            fields: Vec::new(),
            current: String::new(),
            quotes: 0,
            pending: false,
        }
    }

    /// Whether a record is partially assembled.
    pub fn in_record(&self) -> bool {
        self.pending
    }

    /// Feeds one physical line. Returns the record it completes, if any.
    pub fn push(&mut self, line: &str) -> Option<Record> {
        if !self.header_seen {
            self.header_seen = true;
            return None;
        }
        if self.pending {
            // Still inside a quoted field from the previous line.
            self.current.push('\n');
        } else if line.is_empty() {
            return None;
        }
        self.pending = true;

        let bytes = line.as_bytes();
        let mut start = 0;
        for position in memchr2_iter(QUOTE, self.delimiter, bytes) {
            if bytes[position] == QUOTE {
                self.quotes += 1;
            } else if self.quotes % 2 == 0 {
                self.current.push_str(&line[start..position]);
                self.end_field();
                start = position + 1;
            }
        }
        self.current.push_str(&line[start..]);

        if self.quotes % 2 == 1 {
            return None;
        }
        self.end_field();
        self.pending = false;
        Some(std::mem::take(&mut self.fields).into_iter().map(unquote).collect())
    }

    /// Flushes a record left open by an unbalanced quote at end of output.
    pub fn finish(&mut self) -> Option<Record> {
        if !self.pending {
            return None;
        }
        tracing::warn!(fields = self.fields.len() + 1, "Output ended inside a quoted field; flushing partial record");
        self.end_field();
        self.pending = false;
        Some(std::mem::take(&mut self.fields).into_iter().map(unquote).collect())
    }

    fn end_field(&mut self) {
        self.fields.push(std::mem::take(&mut self.current));
        self.quotes = 0;
    }
}

/// Strips surrounding paired quotes and collapses doubled quotes.
fn unquote(raw: String) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    match raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        Some(inner) => Some(inner.replace("\"\"", "\"")),
        None => Some(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn feed(lines: &[&str]) -> Vec<Record> {
        let mut parser = CsvReassembler::default();
        let mut records: Vec<Record> = lines.iter().filter_map(|line| parser.push(line)).collect();
        records.extend(parser.finish());
        records
    }

    fn owned(fields: &[Option<&str>]) -> Record {
        fields.iter().map(|f| f.map(str::to_string)).collect()
    }

    #[test]
    fn test_header_is_discarded() {
        let records = feed(&["category_type,tag_name,count,rating", "tags,Fiction,3,0"]);
        assert_eq!(records, vec![owned(&[Some("tags"), Some("Fiction"), Some("3"), Some("0")])]);
    }

    #[test]
    fn test_quoted_field_spans_two_lines() {
        let records = feed(&["h1,h2", "a,\"line one", "line two\",b"]);
        assert_eq!(records, vec![owned(&[Some("a"), Some("line one\nline two"), Some("b")])]);
    }

    #[test]
    fn test_record_completes_only_at_even_parity() {
        let mut parser = CsvReassembler::default();
        assert_eq!(parser.push("header"), None);
        assert_eq!(parser.push("\"x"), None);
        assert!(parser.in_record());
        assert_eq!(parser.push(""), None);
        assert_eq!(parser.push("y\",z"), Some(owned(&[Some("x\n\ny"), Some("z")])));
        assert!(!parser.in_record());
    }

    #[rstest]
    #[case("a,,c", owned(&[Some("a"), None, Some("c")]))]
    #[case("\"\",b", owned(&[Some(""), Some("b")]))]
    #[case("\"say \"\"hi\"\"\",b", owned(&[Some("say \"hi\""), Some("b")]))]
    #[case("\"a,b\",c", owned(&[Some("a,b"), Some("c")]))]
    #[case("a,", owned(&[Some("a"), None]))]
    fn test_single_line(#[case] line: &str, #[case] expected: Record) {
        assert_eq!(feed(&["header", line]), vec![expected]);
    }

    #[test]
    fn test_unterminated_record_is_flushed() {
        let records = feed(&["header", "a,\"never closed"]);
        assert_eq!(records, vec![owned(&[Some("a"), Some("\"never closed")])]);
    }

    #[test]
    fn test_custom_delimiter() {
        let mut parser = CsvReassembler::new(b';');
        parser.push("h");
        assert_eq!(parser.push("a;b,c"), Some(owned(&[Some("a"), Some("b,c")])));
    }

    #[test]
    fn test_blank_lines_between_records_are_skipped() {
        assert_eq!(feed(&["header", "", "a"]), vec![owned(&[Some("a")])]);
    }
}
