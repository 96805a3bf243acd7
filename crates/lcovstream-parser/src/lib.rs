//! Incremental LCOV record tokenizer.
//!
//! Bytes are written in arbitrarily sized chunks and read back as raw records
//! (`variant` + comma-split values). A record split across chunk boundaries is
//! reported as incomplete until the rest of it has been written.
//!
//! # Examples
//!
//! ```
//! use lcovstream_parser::RecordParser;
//! use lcovstream_types::Variant;
//!
//! let mut parser = RecordParser::default();
//! parser.write(&b"DA:1,"[..]);
//! assert!(parser.read().incomplete);
//!
//! parser.write(&b"4\n"[..]);
//! let record = parser.read();
//! assert_eq!(record.variant, Variant::LineLocation);
//! assert_eq!(record.value, Some(vec!["1".to_string(), "4".to_string()]));
//! assert!(parser.read().done);
//! ```

use std::collections::VecDeque;

use lcovstream_types::{FieldNames, RawRecord, Variant};
use tracing::{debug, trace};

// ============================================================================
// Byte Matching
// ============================================================================

/// Incremental comparator for a single byte pattern.
///
/// The cursor only moves forward on a matching byte. A broken sequence is not
/// detected here; callers reset the matcher themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteMatch {
    pattern: Vec<u8>,
    cursor: usize,
}

impl ByteMatch {
    pub fn new(pattern: impl Into<Vec<u8>>) -> Self {
        Self {
            pattern: pattern.into(),
            cursor: 0,
        }
    }

    pub fn pattern(&self) -> &[u8] {
        &self.pattern
    }

    pub fn len(&self) -> usize {
        self.pattern.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_empty()
    }

    /// Advance by one position if `byte` is the next pattern byte.
    ///
    /// A matcher that already matched the whole pattern starts over first.
    pub fn compare(&mut self, byte: u8) -> bool {
        if self.cursor >= self.pattern.len() {
            self.cursor = 0;
        }

        let matched = self.pattern.get(self.cursor) == Some(&byte);
        if matched {
            self.cursor += 1;
        }
        matched
    }

    /// Returns `true` when the whole pattern has been matched.
    pub fn matched(&self) -> bool {
        self.cursor == self.pattern.len()
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}

// ============================================================================
// Field Table
// ============================================================================

/// The configured field tokens, longest first, advanced together per byte.
///
/// Ordering by length lets `FNDA` win over `FN` and `BRDA` over `DA` when
/// both complete on the same byte.
#[derive(Debug, Clone)]
pub struct FieldTable {
    fields: Vec<(Variant, ByteMatch)>,
}

impl FieldTable {
    /// Build the table from configured field names.
    ///
    /// Empty tokens can never be recognized and are left out.
    pub fn new(names: &FieldNames) -> Self {
        let mut fields: Vec<(Variant, ByteMatch)> = names
            .entries()
            .filter(|(_, token)| !token.is_empty())
            .map(|(variant, token)| (variant, ByteMatch::new(token.as_bytes())))
            .collect();
        fields.sort_by(|(_, a), (_, b)| b.len().cmp(&a.len()));
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `(variant, token)` pairs in matching order.
    pub fn iter(&self) -> impl Iterator<Item = (Variant, &[u8])> + '_ {
        self.fields
            .iter()
            .map(|(variant, matcher)| (*variant, matcher.pattern()))
    }

    pub fn reset(&mut self) {
        for (_, matcher) in &mut self.fields {
            matcher.reset();
        }
    }

    /// Feed one byte to every matcher and return the first accepted field.
    ///
    /// `next` is the following buffered byte, if any. A colon-requiring field
    /// whose next byte is known and is not `:` is rejected at this position,
    /// leaving longer siblings free to match. An empty field is only accepted
    /// once the byte after it is buffered.
    ///
    /// A byte that breaks a partial match restarts that matcher instead of
    /// being skipped, so `TXN:` is not read as `TN:` while `TTN:` still is.
    pub fn advance(&mut self, byte: u8, next: Option<u8>) -> Option<Variant> {
        for (variant, matcher) in &mut self.fields {
            if !matcher.compare(byte) {
                // The byte may begin a fresh occurrence of the token.
                matcher.reset();
                matcher.compare(byte);
            }

            if !matcher.matched() {
                continue;
            }

            if variant.requires_colon() && matches!(next, Some(following) if following != b':') {
                continue;
            }

            if variant.is_empty_field() && next.is_none() {
                continue;
            }

            return Some(*variant);
        }
        None
    }
}

// ============================================================================
// Chunk Queue
// ============================================================================

/// FIFO of chunks written but not yet taken by the parser.
#[derive(Debug, Clone, Default)]
pub struct ChunkQueue {
    chunks: VecDeque<Vec<u8>>,
    buffered: usize,
}

impl ChunkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk at the tail. Empty chunks carry nothing and are dropped.
    pub fn push(&mut self, chunk: Vec<u8>) {
        if chunk.is_empty() {
            return;
        }
        self.buffered += chunk.len();
        self.chunks.push_back(chunk);
    }

    /// Remove the chunk at the head.
    pub fn pop(&mut self) -> Option<Vec<u8>> {
        let chunk = self.chunks.pop_front()?;
        self.buffered -= chunk.len();
        Some(chunk)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total number of queued bytes.
    pub fn buffered_bytes(&self) -> usize {
        self.buffered
    }
}

// ============================================================================
// Record Parser
// ============================================================================

/// Incremental LCOV tokenizer over a sequence of written chunks.
#[derive(Debug, Clone)]
pub struct RecordParser {
    fields: FieldTable,
    chunks: ChunkQueue,
    buffer: Option<Vec<u8>>,
    offset: usize,
}

impl Default for RecordParser {
    fn default() -> Self {
        Self::new(&FieldNames::default())
    }
}

impl RecordParser {
    pub fn new(names: &FieldNames) -> Self {
        Self {
            fields: FieldTable::new(names),
            chunks: ChunkQueue::new(),
            buffer: None,
            offset: 0,
        }
    }

    pub fn field_table(&self) -> &FieldTable {
        &self.fields
    }

    /// Queue a chunk. No parsing happens until [`RecordParser::read`].
    pub fn write(&mut self, chunk: impl Into<Vec<u8>>) {
        self.chunks.push(chunk.into());
    }

    /// The unconsumed remainder of the active buffer.
    ///
    /// Chunks still waiting in the queue are not included.
    pub fn current_buffer(&self) -> Option<&[u8]> {
        self.buffer
            .as_deref()
            .map(|buffer| &buffer[self.offset.min(buffer.len())..])
    }

    /// Try to produce the next record.
    pub fn read(&mut self) -> RawRecord {
        let exhausted = match &self.buffer {
            Some(buffer) => self.offset >= buffer.len(),
            None => true,
        };

        if exhausted {
            match self.chunks.pop() {
                Some(chunk) => {
                    self.buffer = Some(chunk);
                    self.offset = 0;
                }
                None => return RawRecord::done(),
            }
        }

        let mut record = self.scan();
        while record.incomplete {
            let Some(chunk) = self.chunks.pop() else {
                break;
            };
            self.splice(chunk);
            record = self.scan();
        }
        record
    }

    /// Read until a result is `done` or `incomplete`.
    ///
    /// The terminal result is included, so the list is never empty.
    pub fn flush(&mut self) -> Vec<RawRecord> {
        let mut records = Vec::new();
        loop {
            let record = self.read();
            let terminal = record.done || record.incomplete;
            records.push(record);
            if terminal {
                return records;
            }
        }
    }

    /// Join the unconsumed tail of the active buffer with the next chunk.
    fn splice(&mut self, chunk: Vec<u8>) {
        match self.buffer.as_mut() {
            Some(buffer) => {
                buffer.drain(..self.offset.min(buffer.len()));
                buffer.extend_from_slice(&chunk);
            }
            None => self.buffer = Some(chunk),
        }
        self.offset = 0;
        debug!(
            buffered = self.buffer.as_ref().map_or(0, Vec::len),
            "spliced chunk into active buffer"
        );
    }

    fn scan(&mut self) -> RawRecord {
        let Some(buffer) = self.buffer.as_deref() else {
            return RawRecord::done();
        };

        self.fields.reset();

        for index in self.offset..buffer.len() {
            let next = buffer.get(index + 1).copied();
            let Some(variant) = self.fields.advance(buffer[index], next) else {
                continue;
            };

            self.fields.reset();

            if variant.is_empty_field() {
                self.offset = skip_line_break(buffer, index + 1);
                trace!(?variant, "record accepted");
                return RawRecord::complete(variant, None);
            }

            let start = if variant.requires_colon() {
                index + 2
            } else {
                index + 1
            };

            return match find_newline(buffer, start) {
                Some(newline) => {
                    let value = split_value(&buffer[start..newline]);
                    self.offset = newline + 1;
                    trace!(?variant, values = value.len(), "record accepted");
                    RawRecord::complete(variant, Some(value))
                }
                None => RawRecord::incomplete(variant),
            };
        }

        RawRecord::incomplete(Variant::None)
    }
}

fn skip_line_break(buffer: &[u8], index: usize) -> usize {
    match buffer.get(index..) {
        Some([b'\r', b'\n', ..]) => index + 2,
        Some([b'\n', ..]) => index + 1,
        _ => index,
    }
}

fn find_newline(buffer: &[u8], start: usize) -> Option<usize> {
    buffer
        .get(start..)?
        .iter()
        .position(|byte| *byte == b'\n')
        .map(|position| start + position)
}

fn split_value(raw: &[u8]) -> Vec<String> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    raw.split(|byte| *byte == b',')
        .map(|part| String::from_utf8_lossy(part).into_owned())
        .collect()
}

// ============================================================================
// Value Helpers
// ============================================================================

/// Parse a leading base-10 integer, returning 0 when there is none.
///
/// Leading whitespace and a `+` sign are accepted; values saturate at
/// `u64::MAX`.
///
/// # Examples
///
/// ```
/// use lcovstream_parser::parse_integer;
///
/// assert_eq!(parse_integer("1111111"), 1111111);
/// assert_eq!(parse_integer("42abc"), 42);
/// assert_eq!(parse_integer("e"), 0);
/// assert_eq!(parse_integer("-"), 0);
/// ```
pub fn parse_integer(value: &str) -> u64 {
    let trimmed = value.trim_start();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    unsigned
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0u64, |total, digit| {
            total
                .saturating_mul(10)
                .saturating_add(u64::from(digit - b'0'))
        })
}

/// Returns `true` for tab, line feed, vertical tab, form feed, carriage
/// return, space, next line (133) and no-break space (160).
pub fn is_blank_space(byte: u8) -> bool {
    matches!(byte, 9..=13 | 32 | 133 | 160)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn values(items: &[&str]) -> Option<Vec<String>> {
        Some(items.iter().map(|item| item.to_string()).collect())
    }

    fn parse_all(input: &str) -> Vec<RawRecord> {
        let mut parser = RecordParser::default();
        parser.write(input.as_bytes());
        parser.flush()
    }

    // ------------------------------------------------------------------------
    // ByteMatch Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_byte_match_matches_sequence() {
        let mut matcher = ByteMatch::new(&b"FN"[..]);
        assert!(matcher.compare(b'F'));
        assert!(!matcher.matched());
        assert!(matcher.compare(b'N'));
        assert!(matcher.matched());
    }

    #[test]
    fn test_byte_match_restarts_after_full_match() {
        let mut matcher = ByteMatch::new(&b"LH"[..]);
        matcher.compare(b'L');
        matcher.compare(b'H');
        assert!(matcher.matched());

        assert!(matcher.compare(b'L'));
        assert!(!matcher.matched());
    }

    #[test]
    fn test_byte_match_mismatch_keeps_cursor() {
        let mut matcher = ByteMatch::new(&b"TN"[..]);
        assert!(matcher.compare(b'T'));
        assert!(!matcher.compare(b'X'));
        assert!(matcher.compare(b'N'));
        assert!(matcher.matched());

        matcher.reset();
        assert!(!matcher.matched());
        assert!(!matcher.compare(b'N'));
    }

    #[test]
    fn test_byte_match_is_case_sensitive() {
        let mut matcher = ByteMatch::new(&b"da"[..]);
        assert!(!matcher.compare(b'D'));
    }

    // ------------------------------------------------------------------------
    // FieldTable Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_field_table_orders_longest_first() {
        let table = FieldTable::new(&FieldNames::default());
        let lengths: Vec<usize> = table.iter().map(|(_, token)| token.len()).collect();

        assert_eq!(table.len(), 17);
        assert_eq!(lengths[0], "end_of_record".len());
        assert!(lengths.windows(2).all(|pair| pair[0] >= pair[1]));
        assert_eq!(table.iter().last().map(|(variant, _)| variant), Some(Variant::Comment));
    }

    #[test]
    fn test_field_table_skips_empty_tokens() {
        let mut names = FieldNames::default();
        names.set_token(Variant::Version, "");
        let table = FieldTable::new(&names);

        assert_eq!(table.len(), 16);
        assert!(table.iter().all(|(variant, _)| variant != Variant::Version));
    }

    #[test]
    fn test_field_table_prefers_longer_sibling() {
        let mut table = FieldTable::new(&FieldNames::default());
        let input = b"FNDA:1,f";
        let mut accepted = None;
        for index in 0..input.len() {
            if let Some(variant) = table.advance(input[index], input.get(index + 1).copied()) {
                accepted = Some(variant);
                break;
            }
        }
        assert_eq!(accepted, Some(Variant::FunctionExecution));
    }

    // ------------------------------------------------------------------------
    // ChunkQueue Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_chunk_queue_is_fifo() {
        let mut queue = ChunkQueue::new();
        queue.push(b"one".to_vec());
        queue.push(Vec::new());
        queue.push(b"three".to_vec());

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.buffered_bytes(), 8);
        assert_eq!(queue.pop(), Some(b"one".to_vec()));
        assert_eq!(queue.pop(), Some(b"three".to_vec()));
        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
        assert_eq!(queue.buffered_bytes(), 0);
    }

    // ------------------------------------------------------------------------
    // Field Name Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_parses_every_default_field() {
        let names = FieldNames::default();

        for (variant, token) in names.entries() {
            let input = if variant.is_empty_field() {
                format!("{token}\n")
            } else {
                format!("{token}:test,data\n")
            };

            let expected_value = if variant.is_empty_field() {
                None
            } else if variant == Variant::Comment {
                values(&[":test", "data"])
            } else {
                values(&["test", "data"])
            };

            assert_eq!(
                parse_all(&input),
                vec![
                    RawRecord::complete(variant, expected_value),
                    RawRecord::done()
                ],
                "field {token}"
            );
        }
    }

    #[test]
    fn test_parses_custom_field_names() {
        let mut names = FieldNames::default();
        names.set_token(Variant::LineHit, "LINES_HIT");
        names.set_token(Variant::EndOfRecord, "EOR");

        let mut parser = RecordParser::new(&names);
        parser.write(&b"LINES_HIT:7\nEOR\nLH:3\n"[..]);

        let records = parser.flush();
        assert_eq!(records[0], RawRecord::complete(Variant::LineHit, values(&["7"])));
        assert_eq!(records[1], RawRecord::complete(Variant::EndOfRecord, None));
        // `LH` is no longer a token; the bytes are skipped over.
        assert_eq!(records[2], RawRecord::incomplete(Variant::None));
        assert_eq!(records.len(), 3);
    }

    // ------------------------------------------------------------------------
    // Chunk Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_read_without_chunks_is_done() {
        let mut parser = RecordParser::default();
        assert_eq!(parser.read(), RawRecord::done());
    }

    #[test]
    fn test_value_without_newline_is_incomplete() {
        let mut parser = RecordParser::default();
        parser.write(&b"TN:example"[..]);

        assert_eq!(parser.read(), RawRecord::incomplete(Variant::TestName));
    }

    #[test]
    fn test_value_with_newline_is_complete() {
        let mut parser = RecordParser::default();
        parser.write(&b"TN:example\n"[..]);

        assert_eq!(
            parser.read(),
            RawRecord::complete(Variant::TestName, values(&["example"]))
        );
    }

    #[test]
    fn test_multiple_chunks_into_one_record() {
        let mut parser = RecordParser::default();
        for chunk in ["TN", ":", "example", "\n"] {
            parser.write(chunk.as_bytes());
        }

        assert_eq!(
            parser.flush(),
            vec![
                RawRecord::complete(Variant::TestName, values(&["example"])),
                RawRecord::done()
            ]
        );
    }

    #[test]
    fn test_multiple_chunks_into_multiple_records() {
        let mut parser = RecordParser::default();
        let chunks = [
            "TN", ":", "example", "\n", "VER", ":", "2", "\n", "SF", ":", "directory/file.ext",
            "\n",
        ];
        for chunk in chunks {
            parser.write(chunk.as_bytes());
        }

        assert_eq!(
            parser.flush(),
            vec![
                RawRecord::complete(Variant::TestName, values(&["example"])),
                RawRecord::complete(Variant::Version, values(&["2"])),
                RawRecord::complete(Variant::FilePath, values(&["directory/file.ext"])),
                RawRecord::done()
            ]
        );
    }

    #[test]
    fn test_multiple_sections() {
        let input = "TN:example 1\nSF:file.ext\nend_of_record\nTN:example 2\nSF:directory/file.ext\nend_of_record\n";

        assert_eq!(
            parse_all(input),
            vec![
                RawRecord::complete(Variant::TestName, values(&["example 1"])),
                RawRecord::complete(Variant::FilePath, values(&["file.ext"])),
                RawRecord::complete(Variant::EndOfRecord, None),
                RawRecord::complete(Variant::TestName, values(&["example 2"])),
                RawRecord::complete(Variant::FilePath, values(&["directory/file.ext"])),
                RawRecord::complete(Variant::EndOfRecord, None),
                RawRecord::done()
            ]
        );
    }

    #[test]
    fn test_token_split_across_flushes() {
        let mut parser = RecordParser::default();
        parser.write(&b"FN"[..]);
        let first = parser.flush();
        assert_eq!(first.len(), 1);
        assert!(first[0].incomplete);

        parser.write(&b"DA:3,main\n"[..]);
        assert_eq!(
            parser.flush(),
            vec![
                RawRecord::complete(Variant::FunctionExecution, values(&["3", "main"])),
                RawRecord::done()
            ]
        );
    }

    #[test]
    fn test_read_resumes_after_done() {
        let mut parser = RecordParser::default();
        parser.write(&b"LH:1\n"[..]);
        assert_eq!(parser.flush().len(), 2);

        parser.write(&b"LF:2\n"[..]);
        assert_eq!(
            parser.read(),
            RawRecord::complete(Variant::LineInstrumented, values(&["2"]))
        );
    }

    #[test]
    fn test_flush_stops_at_incomplete() {
        let mut parser = RecordParser::default();
        parser.write(&b"LH:1\nLF:"[..]);

        assert_eq!(
            parser.flush(),
            vec![
                RawRecord::complete(Variant::LineHit, values(&["1"])),
                RawRecord::incomplete(Variant::LineInstrumented)
            ]
        );
    }

    // ------------------------------------------------------------------------
    // Current Buffer Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_current_buffer_is_none_before_read() {
        let mut parser = RecordParser::default();
        assert!(parser.current_buffer().is_none());

        parser.write(&b"not relevant"[..]);
        assert!(parser.current_buffer().is_none());
    }

    #[test]
    fn test_current_buffer_exposes_unconsumed_tail() {
        let mut parser = RecordParser::default();
        parser.write(&b"LH:1\nSF"[..]);
        parser.read();

        assert_eq!(parser.current_buffer(), Some(&b"SF"[..]));
    }

    // ------------------------------------------------------------------------
    // Comment Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_comment_keeps_text_after_marker() {
        let mut parser = RecordParser::default();
        parser.write(&b"TN:test\n#SF:example.file\n"[..]);

        assert_eq!(
            parser.read(),
            RawRecord::complete(Variant::TestName, values(&["test"]))
        );
        assert_eq!(
            parser.read(),
            RawRecord::complete(Variant::Comment, values(&["SF:example.file"]))
        );
        assert_eq!(parser.read(), RawRecord::done());
    }

    #[test]
    fn test_comment_without_newline_is_incomplete() {
        let mut parser = RecordParser::default();
        parser.write(&b"TN:test\n#SF:example.file"[..]);

        parser.read();
        assert_eq!(parser.read(), RawRecord::incomplete(Variant::Comment));
    }

    // ------------------------------------------------------------------------
    // Empty Field Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_end_of_record_has_no_value() {
        let mut parser = RecordParser::default();
        parser.write(&b"end_of_record\n"[..]);

        assert_eq!(parser.read(), RawRecord::complete(Variant::EndOfRecord, None));
        assert_eq!(parser.read(), RawRecord::done());
    }

    #[test]
    fn test_end_of_record_without_newline_is_incomplete() {
        let mut parser = RecordParser::default();
        parser.write(&b"end_of_record"[..]);

        assert_eq!(parser.read(), RawRecord::incomplete(Variant::None));
    }

    #[test]
    fn test_end_of_record_completes_when_next_byte_arrives() {
        let mut parser = RecordParser::default();
        parser.write(&b"end_of_record"[..]);
        parser.read();
        parser.write(&b"\nTN:next\n"[..]);

        assert_eq!(parser.read(), RawRecord::complete(Variant::EndOfRecord, None));
        assert_eq!(
            parser.read(),
            RawRecord::complete(Variant::TestName, values(&["next"]))
        );
    }

    // ------------------------------------------------------------------------
    // Matching Edge Cases
    // ------------------------------------------------------------------------

    #[test]
    fn test_token_without_colon_is_skipped() {
        assert_eq!(
            parse_all("xLHy\nLH:3\n"),
            vec![
                RawRecord::complete(Variant::LineHit, values(&["3"])),
                RawRecord::done()
            ]
        );
    }

    #[test]
    fn test_prefix_collisions_resolve_to_longest_token() {
        let records = parse_all("FN:1,f\nFNDA:2,f\nFNF:1\nFNH:1\nFNL:0,1,2\nFNA:0,2,f\nBRDA:1,0,0,1\nDA:1,1\n");
        let variants: Vec<Variant> = records.iter().map(|record| record.variant).collect();

        assert_eq!(
            variants,
            vec![
                Variant::FunctionLocation,
                Variant::FunctionExecution,
                Variant::FunctionInstrumented,
                Variant::FunctionHit,
                Variant::FunctionLeader,
                Variant::FunctionAlias,
                Variant::BranchLocation,
                Variant::LineLocation,
                Variant::None
            ]
        );
    }

    #[test]
    fn test_values_keep_embedded_colons() {
        assert_eq!(
            parse_all("SF:C:\\project\\src\\lib.rs\n")[0],
            RawRecord::complete(Variant::FilePath, values(&["C:\\project\\src\\lib.rs"]))
        );
    }

    #[test]
    fn test_values_split_on_commas() {
        assert_eq!(
            parse_all("SF:dir,with,commas/file.rs\n")[0],
            RawRecord::complete(Variant::FilePath, values(&["dir", "with", "commas/file.rs"]))
        );
    }

    #[test]
    fn test_empty_value_yields_single_empty_token() {
        assert_eq!(
            parse_all("TN:\n")[0],
            RawRecord::complete(Variant::TestName, values(&[""]))
        );
    }

    #[test]
    fn test_crlf_line_endings() {
        assert_eq!(
            parse_all("TN:name\r\nDA:1,2\r\nend_of_record\r\n"),
            vec![
                RawRecord::complete(Variant::TestName, values(&["name"])),
                RawRecord::complete(Variant::LineLocation, values(&["1", "2"])),
                RawRecord::complete(Variant::EndOfRecord, None),
                RawRecord::done()
            ]
        );
    }

    #[test]
    fn test_false_start_before_token() {
        assert_eq!(
            parse_all("TTN:x\n")[0],
            RawRecord::complete(Variant::TestName, values(&["x"]))
        );
    }

    #[test]
    fn test_interrupted_token_is_not_matched() {
        assert_eq!(
            parse_all("TXN:x\n"),
            vec![RawRecord::incomplete(Variant::None)]
        );
    }

    #[test]
    fn test_trailing_whitespace_is_incomplete() {
        let mut parser = RecordParser::default();
        parser.write(&b"LH:1\n\n"[..]);

        let records = parser.flush();
        assert_eq!(records.last(), Some(&RawRecord::incomplete(Variant::None)));
        assert!(
            parser
                .current_buffer()
                .is_some_and(|rest| rest.iter().all(|byte| is_blank_space(*byte)))
        );
    }

    // ------------------------------------------------------------------------
    // Value Helper Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer("e"), 0);
        assert_eq!(parse_integer(""), 0);
        assert_eq!(parse_integer("1111111"), 1111111);
        assert_eq!(parse_integer("  12"), 12);
        assert_eq!(parse_integer("+7"), 7);
        assert_eq!(parse_integer("-7"), 0);
        assert_eq!(parse_integer("3.9"), 3);
        assert_eq!(parse_integer("99999999999999999999999"), u64::MAX);
    }

    #[test]
    fn test_is_blank_space() {
        for byte in [9u8, 10, 11, 12, 13, 32, 133, 160] {
            assert!(is_blank_space(byte), "{byte}");
        }
        for byte in [0u8, 8, 14, 31, 33, b'a', 134, 159, 161] {
            assert!(!is_blank_space(byte), "{byte}");
        }
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn record_line() -> impl Strategy<Value = (Variant, String)> {
        prop_oneof![
            "[a-z_ ]{0,10}".prop_map(|name| (Variant::TestName, format!("TN:{name}"))),
            "[a-z/._,]{1,20}".prop_map(|path| (Variant::FilePath, format!("SF:{path}"))),
            (1u32..500, "[a-z_]{1,10}")
                .prop_map(|(line, name)| (Variant::FunctionLocation, format!("FN:{line},{name}"))),
            (0u32..50, "[a-z_]{1,10}")
                .prop_map(|(hit, name)| (Variant::FunctionExecution, format!("FNDA:{hit},{name}"))),
            (0u32..50).prop_map(|count| (Variant::FunctionInstrumented, format!("FNF:{count}"))),
            (0u32..50).prop_map(|count| (Variant::FunctionHit, format!("FNH:{count}"))),
            (0u32..9, 1u32..500, 1u32..500).prop_map(|(index, start, end)| (
                Variant::FunctionLeader,
                format!("FNL:{index},{start},{end}")
            )),
            (0u32..9, 0u32..50, "[a-z_]{1,10}").prop_map(|(index, hit, name)| (
                Variant::FunctionAlias,
                format!("FNA:{index},{hit},{name}")
            )),
            (1u32..500, 0u32..4, 0u32..4, 0u32..9).prop_map(|(line, block, branch, taken)| (
                Variant::BranchLocation,
                format!("BRDA:{line},{block},{branch},{taken}")
            )),
            (0u32..50).prop_map(|count| (Variant::BranchInstrumented, format!("BRF:{count}"))),
            (0u32..50).prop_map(|count| (Variant::BranchHit, format!("BRH:{count}"))),
            (1u32..500, 0u32..50)
                .prop_map(|(line, hit)| (Variant::LineLocation, format!("DA:{line},{hit}"))),
            (0u32..50).prop_map(|count| (Variant::LineInstrumented, format!("LF:{count}"))),
            (0u32..50).prop_map(|count| (Variant::LineHit, format!("LH:{count}"))),
            "[0-9]{1,2}".prop_map(|version| (Variant::Version, format!("VER:{version}"))),
            "[a-z :]{0,10}".prop_map(|text| (Variant::Comment, format!("#{text}"))),
            Just((Variant::EndOfRecord, "end_of_record".to_string())),
        ]
    }

    fn accepted(records: Vec<RawRecord>) -> Vec<RawRecord> {
        records
            .into_iter()
            .filter(|record| !record.done && !record.incomplete)
            .collect()
    }

    proptest! {
        /// Every line of a well-formed document yields exactly one record.
        #[test]
        fn whole_buffer_yields_one_record_per_line(
            lines in prop::collection::vec(record_line(), 0..30),
        ) {
            let text: String = lines.iter().map(|(_, line)| format!("{line}\n")).collect();
            let mut parser = RecordParser::default();
            parser.write(text.into_bytes());

            let records = parser.flush();
            prop_assert_eq!(records.last(), Some(&RawRecord::done()));

            let variants: Vec<Variant> = accepted(records).iter().map(|record| record.variant).collect();
            let expected: Vec<Variant> = lines.iter().map(|(variant, _)| *variant).collect();
            prop_assert_eq!(variants, expected);
        }

        /// Splitting the input at arbitrary points does not change the records.
        #[test]
        fn chunked_input_matches_whole_input(
            lines in prop::collection::vec(record_line(), 0..30),
            sizes in prop::collection::vec(1usize..7, 1..64),
        ) {
            let text: String = lines.iter().map(|(_, line)| format!("{line}\n")).collect();
            let bytes = text.into_bytes();

            let mut whole = RecordParser::default();
            whole.write(bytes.clone());
            let expected = accepted(whole.flush());

            let mut chunked = RecordParser::default();
            let mut actual = Vec::new();
            let mut position = 0;
            let mut size_index = 0;
            while position < bytes.len() {
                let size = sizes[size_index % sizes.len()];
                let end = (position + size).min(bytes.len());
                chunked.write(bytes[position..end].to_vec());
                actual.extend(accepted(chunked.flush()));
                position = end;
                size_index += 1;
            }
            actual.extend(accepted(chunked.flush()));

            prop_assert_eq!(actual, expected);
        }

        /// Feeding one byte at a time before a single flush heals every split.
        #[test]
        fn byte_at_a_time_matches_whole_input(
            lines in prop::collection::vec(record_line(), 0..15),
        ) {
            let text: String = lines.iter().map(|(_, line)| format!("{line}\n")).collect();

            let mut whole = RecordParser::default();
            whole.write(text.as_bytes());
            let expected = accepted(whole.flush());

            let mut bytewise = RecordParser::default();
            for byte in text.bytes() {
                bytewise.write(vec![byte]);
            }
            prop_assert_eq!(accepted(bytewise.flush()), expected);
        }

        /// `parse_integer` never panics and is zero without leading digits.
        #[test]
        fn parse_integer_is_total(value in "\\PC{0,20}") {
            let parsed = parse_integer(&value);
            let trimmed = value.trim_start();
            let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
            if !unsigned.starts_with(|c: char| c.is_ascii_digit()) {
                prop_assert_eq!(parsed, 0);
            }
        }

        #[test]
        fn parse_integer_reads_decimal_numbers(number in any::<u32>()) {
            prop_assert_eq!(parse_integer(&number.to_string()), u64::from(number));
        }
    }
}
