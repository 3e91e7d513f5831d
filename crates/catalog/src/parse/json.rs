use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::de::DeserializeOwned;

/// Buffers every output line and parses the whole lot as one JSON document
/// once the process has exited.
#[derive(Debug, Default)]
pub struct JsonCollector {
    buffer: String,
}

impl JsonCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines are concatenated without a separator. Line breaks in the tool's
    /// JSON only ever occur between tokens.
    pub fn push(&mut self, line: &str) {
        self.buffer.push_str(line);
    }

    /// Parses the buffered output.
    ///
    /// Returns `Ok(None)` when the tool printed nothing, which it does when a
    /// query matches no rows.
    ///
    /// # Errors
    /// [`ErrorKind::MalformedOutput`] when the buffer is not valid JSON of
    /// the requested shape. `context` names the query in the error.
    pub fn finish<T: DeserializeOwned>(self, context: &str) -> Result<Option<T>> {
        if self.buffer.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&self.buffer)
            .map(Some)
            .or_raise(|| ErrorKind::MalformedOutput(context.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::ops::Deref;

    #[test]
    fn test_multiline_array() {
        let mut collector = JsonCollector::new();
        for line in ["[", "  {", "    \"id\": 1,", "    \"title\": \"A\"", "  },", "  {\"id\": 2}", "]"] {
            collector.push(line);
        }
        let rows: Vec<Value> = collector.finish("list").unwrap().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["title"], "A");
    }

    #[test]
    fn test_empty_output_is_no_rows() {
        let mut collector = JsonCollector::new();
        collector.push("   ");
        assert_eq!(collector.finish::<Vec<Value>>("list").unwrap(), None);
    }

    #[test]
    fn test_malformed_output() {
        let mut collector = JsonCollector::new();
        collector.push("[{\"id\": 1,");
        let err = collector.finish::<Vec<Value>>("list").unwrap_err();
        assert_eq!(err.deref(), &ErrorKind::MalformedOutput("list".to_string()));
    }
}
