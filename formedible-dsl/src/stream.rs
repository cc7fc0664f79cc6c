//! Completion buffer
//!
//! Collects streamed completion text and parses it once, when the stream
//! finishes.

use crate::guard::{explain, source_too_large};
use crate::parser::{FormedibleParser, Stage};
use formedible_core::{FormResult, ParseOutcome};

#[derive(Debug)]
pub struct CompletionBuffer {
    parser: FormedibleParser,
    text: String,
    /// Total bytes received, including dropped chunks.
    received: usize,
    overflowed: bool,
    cancelled: bool,
}

impl CompletionBuffer {
    pub fn new(parser: FormedibleParser) -> Self {
        Self {
            parser,
            text: String::new(),
            received: 0,
            overflowed: false,
            cancelled: false,
        }
    }

    /// Append a chunk. Chunks after cancellation or after the buffer passed
    /// `maxCodeLength` are dropped.
    pub fn push(&mut self, chunk: &str) {
        self.received += chunk.len();
        if self.cancelled || self.overflowed {
            return;
        }
        if self.text.len() + chunk.len() > self.parser.config().max_code_length {
            self.overflowed = true;
            tracing::debug!(
                received = self.received,
                max_code_length = self.parser.config().max_code_length,
                "completion exceeded maxCodeLength; dropping further chunks"
            );
            return;
        }
        self.text.push_str(chunk);
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.text.clear();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn is_overflowed(&self) -> bool {
        self.overflowed
    }

    /// Bytes currently held.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// `None` when the stream was cancelled.
    pub fn finish_and_parse(self) -> Option<FormResult<ParseOutcome>> {
        self.finish_with_observer(|_| {})
    }

    pub fn finish_with_observer<F>(self, observer: F) -> Option<FormResult<ParseOutcome>>
    where
        F: FnMut(Stage),
    {
        if self.cancelled {
            tracing::debug!("completion cancelled; not parsing");
            return None;
        }
        if self.overflowed {
            let config = self.parser.config();
            return Some(Err(explain(source_too_large(self.received, config), config)));
        }
        Some(self.parser.parse_with_observer(&self.text, observer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formedible_core::{ErrorKind, ParserConfig};

    #[test]
    fn test_chunks_are_joined_then_parsed() {
        let mut buffer = CompletionBuffer::new(FormedibleParser::with_defaults());
        for chunk in ["```formedible\n{ fields: [", "{ name: 'age', type: 'number' }", "] }\n```"] {
            buffer.push(chunk);
        }
        let outcome = buffer.finish_and_parse().expect("not cancelled").expect("parse");
        assert_eq!(outcome.config.field_names(), vec!["age"]);
    }

    #[test]
    fn test_cancelled_buffer_never_parses() {
        let mut buffer = CompletionBuffer::new(FormedibleParser::with_defaults());
        buffer.push("{ fields: [] }");
        buffer.cancel();
        buffer.push("ignored");
        assert!(buffer.is_empty());
        let mut stages = Vec::new();
        assert!(buffer.finish_with_observer(|s| stages.push(s)).is_none());
        assert!(stages.is_empty());
    }

    #[test]
    fn test_overflow_resolves_without_parsing() {
        let parser = FormedibleParser::new(ParserConfig::default().with_max_code_length(16));
        let mut buffer = CompletionBuffer::new(parser);
        buffer.push("{ fields: [");
        buffer.push("{ name: 'a', type: 'text' }");
        buffer.push("] }");
        assert!(buffer.is_overflowed());
        assert_eq!(buffer.len(), 11);

        let mut stages = Vec::new();
        let err = buffer
            .finish_with_observer(|s| stages.push(s))
            .expect("not cancelled")
            .expect_err("too large");
        assert_eq!(err.kind, ErrorKind::SourceTooLarge);
        assert!(stages.is_empty());
    }
}
