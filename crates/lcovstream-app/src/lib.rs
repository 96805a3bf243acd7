//! Application orchestration for lcovstream.
//!
//! This crate wires the tokenizer, the record interpreter and the section
//! aggregator to byte sources:
//!
//! 1. [`parse_bytes`] parses a fully buffered input in one go
//! 2. [`collect_sections`] drains a [`ChunkSource`] and returns every section
//! 3. [`SectionStream`] yields each section as soon as `end_of_record` seals it
//! 4. [`RecordStream`] yields the typed records themselves
//!
//! # Example
//!
//! ```
//! use lcovstream_adapters_io::ChunkIter;
//! use lcovstream_app::SectionStream;
//! use lcovstream_types::FieldNames;
//!
//! let input = b"TN:unit\nSF:src/lib.rs\nDA:1,3\nend_of_record\n";
//! let source = ChunkIter::split(input, 7);
//!
//! let sections: Vec<_> = SectionStream::new(source, &FieldNames::default())
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(sections.len(), 1);
//! assert_eq!(sections[0].path, "src/lib.rs");
//! assert_eq!(sections[0].lines.details[0].hit, 3);
//! ```

use std::collections::VecDeque;
use std::io;

pub use lcovstream_config::EofMode;
use lcovstream_domain::{SectionAggregator, aggregate, interpret};
use lcovstream_parser::{RecordParser, is_blank_space};
use lcovstream_ports::ChunkSource;
use lcovstream_types::{Entry, FieldNames, SectionSummary};
use thiserror::Error;
use tracing::{debug, warn};

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while consuming a chunk source.
#[derive(Debug, Error)]
pub enum AppError {
    /// The input ended in the middle of a record.
    #[error("unexpected end of input.")]
    UnexpectedEndOfInput,

    /// The chunk source failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

// ============================================================================
// Buffered Adapters
// ============================================================================

/// Parse a complete LCOV document held in memory.
///
/// Every section slot is returned, including a trailing one that was not
/// closed by `end_of_record`.
pub fn parse_bytes(input: &[u8], names: &FieldNames) -> Vec<SectionSummary> {
    parse_bytes_with(&mut RecordParser::new(names), input)
}

/// Like [`parse_bytes`], reusing an existing parser and its field table.
pub fn parse_bytes_with(parser: &mut RecordParser, input: &[u8]) -> Vec<SectionSummary> {
    parser.write(input);
    aggregate(parser.flush())
}

/// Drain `source`, flushing the parser after every chunk, and return every
/// section slot once the source ends.
pub fn collect_sections(
    mut source: impl ChunkSource,
    parser: &mut RecordParser,
) -> Result<Vec<SectionSummary>, AppError> {
    let mut aggregator = SectionAggregator::new();

    while let Some(chunk) = source.next_chunk()? {
        parser.write(chunk);
        for record in parser.flush() {
            aggregator.fold_raw(record);
        }
    }

    Ok(aggregator.into_sections())
}

// ============================================================================
// Record Pump
// ============================================================================

/// Pulls chunks through a parser and queues the resulting typed records.
///
/// At end of input a newline is appended to any leftover bytes so a final
/// record without its line break still completes. Whatever remains after
/// that is an error in strict mode.
struct RecordPump<S> {
    source: S,
    parser: RecordParser,
    eof: EofMode,
    pending: VecDeque<Entry>,
    error: Option<AppError>,
    finished: bool,
}

impl<S: ChunkSource> RecordPump<S> {
    fn new(source: S, parser: RecordParser) -> Self {
        Self {
            source,
            parser,
            eof: EofMode::Strict,
            pending: VecDeque::new(),
            error: None,
            finished: false,
        }
    }

    fn next_entry(&mut self) -> Option<Result<Entry, AppError>> {
        loop {
            if let Some(entry) = self.pending.pop_front() {
                return Some(Ok(entry));
            }
            if let Some(err) = self.error.take() {
                return Some(Err(err));
            }
            if self.finished {
                return None;
            }

            match self.source.next_chunk() {
                Ok(Some(chunk)) => {
                    self.parser.write(chunk);
                    self.drain_parser();
                }
                Ok(None) => {
                    self.finished = true;
                    self.finish();
                }
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err.into()));
                }
            }
        }
    }

    fn drain_parser(&mut self) {
        for record in self.parser.flush() {
            let entry = interpret(record);
            if !entry.is_none() {
                self.pending.push_back(entry);
            }
        }
    }

    fn finish(&mut self) {
        if self.parser.current_buffer().is_some_and(|rest| !rest.is_empty()) {
            debug!("terminating trailing bytes with a newline");
            self.parser.write(&b"\n"[..]);
            self.drain_parser();
        }

        let leftover = self
            .parser
            .current_buffer()
            .is_some_and(|rest| rest.iter().any(|&byte| !is_blank_space(byte)));

        if !leftover {
            debug!("input ended on a record boundary");
            return;
        }

        match self.eof {
            EofMode::Strict => {
                warn!("unexpected end of input");
                self.error = Some(AppError::UnexpectedEndOfInput);
            }
            EofMode::Lenient => {
                let bytes = self.parser.current_buffer().map_or(0, <[u8]>::len);
                warn!(bytes, "ignoring unterminated trailing input");
            }
        }
    }
}

// ============================================================================
// Streaming Adapters
// ============================================================================

/// Iterator over the typed records of a chunk source.
///
/// `None` sentinels are never yielded.
pub struct RecordStream<S> {
    pump: RecordPump<S>,
}

impl<S: ChunkSource> RecordStream<S> {
    pub fn new(source: S, names: &FieldNames) -> Self {
        Self::with_parser(source, RecordParser::new(names))
    }

    pub fn with_parser(source: S, parser: RecordParser) -> Self {
        Self {
            pump: RecordPump::new(source, parser),
        }
    }

    pub fn eof_mode(mut self, eof: EofMode) -> Self {
        self.pump.eof = eof;
        self
    }
}

impl<S: ChunkSource> Iterator for RecordStream<S> {
    type Item = Result<Entry, AppError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pump.next_entry()
    }
}

/// Iterator yielding each section as soon as `end_of_record` seals it.
///
/// In strict mode a section that is still open when the input ends is
/// dropped, and unterminated trailing bytes produce one
/// [`AppError::UnexpectedEndOfInput`]. In lenient mode the open section is
/// yielded last and trailing bytes are ignored.
pub struct SectionStream<S> {
    pump: RecordPump<S>,
    aggregator: SectionAggregator,
    ready: VecDeque<SectionSummary>,
    exhausted: bool,
}

impl<S: ChunkSource> SectionStream<S> {
    pub fn new(source: S, names: &FieldNames) -> Self {
        Self::with_parser(source, RecordParser::new(names))
    }

    /// Stream with a parser configured by the caller.
    pub fn with_parser(source: S, parser: RecordParser) -> Self {
        Self {
            pump: RecordPump::new(source, parser),
            aggregator: SectionAggregator::new(),
            ready: VecDeque::new(),
            exhausted: false,
        }
    }

    pub fn eof_mode(mut self, eof: EofMode) -> Self {
        self.pump.eof = eof;
        self
    }
}

impl<S: ChunkSource> Iterator for SectionStream<S> {
    type Item = Result<SectionSummary, AppError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(section) = self.ready.pop_front() {
                return Some(Ok(section));
            }
            if self.exhausted {
                return None;
            }

            match self.pump.next_entry() {
                Some(Ok(entry)) => {
                    if self.aggregator.fold(entry) {
                        self.ready.extend(self.aggregator.take_sealed());
                    }
                }
                Some(Err(err)) => return Some(Err(err)),
                None => {
                    self.exhausted = true;
                    let open = std::mem::take(&mut self.aggregator).into_sections();
                    if self.pump.eof == EofMode::Lenient {
                        self.ready.extend(open);
                    } else if !open.is_empty() {
                        warn!(
                            sections = open.len(),
                            "dropping section without end_of_record"
                        );
                    }
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================


// ============================================================================
// Property Tests
// ============================================================================
