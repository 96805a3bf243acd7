//! Pure domain logic for lcovstream.
//!
//! This crate turns raw tokenizer output into typed records and folds those
//! records into per-section coverage summaries. It performs no I/O and never
//! fails: malformed values fall back to zero or the empty string.

use std::collections::HashMap;

use lcovstream_parser::parse_integer;
use lcovstream_types::{
    BranchEntry, BranchLocationEntry, Entry, FunctionAliasEntry, FunctionEntry,
    FunctionExecutionEntry, FunctionLeaderEntry, FunctionLocationEntry, LineEntry,
    LineLocationEntry, RawRecord, SectionSummary, Variant,
};
use tracing::{debug, trace};

// ============================================================================
// Record Interpretation
// ============================================================================

/// Convert one raw record into a typed record.
///
/// Incomplete records and the `None` variant become [`Entry::None`], carrying
/// the `done`/`incomplete` flags through.
///
/// # Examples
///
/// ```
/// use lcovstream_domain::interpret;
/// use lcovstream_types::{Entry, RawRecord, Variant};
///
/// let record = RawRecord::complete(Variant::LineHit, Some(vec!["12".to_string()]));
/// assert_eq!(interpret(record), Entry::LineHit { hit: 12 });
///
/// let pending = RawRecord::incomplete(Variant::LineHit);
/// assert!(interpret(pending).is_none());
/// ```
pub fn interpret(record: RawRecord) -> Entry {
    let RawRecord {
        done,
        incomplete,
        variant,
        value,
    } = record;

    if incomplete {
        return Entry::None { done, incomplete };
    }

    let value = value.unwrap_or_default();

    match variant {
        Variant::None => Entry::None { done, incomplete },
        Variant::BranchHit => Entry::BranchHit {
            hit: first_integer(&value),
        },
        Variant::BranchInstrumented => Entry::BranchInstrumented {
            found: first_integer(&value),
        },
        Variant::BranchLocation => Entry::BranchLocation(branch_location(&value)),
        Variant::Comment => Entry::Comment {
            comment: value.join(","),
        },
        Variant::EndOfRecord => Entry::EndOfRecord,
        Variant::FilePath => Entry::FilePath {
            path: value.join(","),
        },
        Variant::FunctionAlias => Entry::FunctionAlias(function_alias(&value)),
        Variant::FunctionExecution => Entry::FunctionExecution(function_execution(&value)),
        Variant::FunctionHit => Entry::FunctionHit {
            hit: first_integer(&value),
        },
        Variant::FunctionInstrumented => Entry::FunctionInstrumented {
            found: first_integer(&value),
        },
        Variant::FunctionLeader => Entry::FunctionLeader(function_leader(&value)),
        Variant::FunctionLocation => Entry::FunctionLocation(function_location(&value)),
        Variant::LineHit => Entry::LineHit {
            hit: first_integer(&value),
        },
        Variant::LineInstrumented => Entry::LineInstrumented {
            found: first_integer(&value),
        },
        Variant::LineLocation => Entry::LineLocation(line_location(&value)),
        Variant::TestName => Entry::TestName {
            name: value.into_iter().next().unwrap_or_default(),
        },
        Variant::Version => Entry::Version {
            version: value.into_iter().next().unwrap_or_default(),
        },
    }
}

fn first_integer(value: &[String]) -> u64 {
    value.first().map_or(0, |token| parse_integer(token))
}

/// `line,[e]block,branch...,taken` where the branch label may contain commas.
fn branch_location(value: &[String]) -> BranchLocationEntry {
    let [line, block, label @ .., taken] = value else {
        return BranchLocationEntry::default();
    };
    if label.is_empty() {
        return BranchLocationEntry::default();
    }

    let exception_block = block.strip_prefix('e');

    BranchLocationEntry {
        line: parse_integer(line),
        block: parse_integer(exception_block.unwrap_or(block)),
        branch: label.join(","),
        // `-` marks a branch whose condition was never evaluated.
        hit: if taken == "-" { 0 } else { parse_integer(taken) },
        is_exception: exception_block.is_some(),
    }
}

/// Supports both `FN:<start>,<name>` and `FN:<start>,<end>,<name>`.
fn function_location(value: &[String]) -> FunctionLocationEntry {
    let [start, end, rest @ ..] = value else {
        return FunctionLocationEntry::default();
    };

    let line_start = parse_integer(start);
    let line_end = parse_integer(end);

    let name = if rest.is_empty() {
        end.clone()
    } else if line_end < line_start {
        value[1..].join(",")
    } else {
        rest.join(",")
    };

    FunctionLocationEntry {
        name,
        line_start,
        line_end,
    }
}

fn function_execution(value: &[String]) -> FunctionExecutionEntry {
    match value {
        [hit, name @ ..] if !name.is_empty() => FunctionExecutionEntry {
            name: name.join(","),
            hit: parse_integer(hit),
        },
        _ => FunctionExecutionEntry::default(),
    }
}

fn function_alias(value: &[String]) -> FunctionAliasEntry {
    match value {
        [index, hit, name @ ..] if !name.is_empty() => FunctionAliasEntry {
            index: parse_integer(index),
            hit: parse_integer(hit),
            name: name.join(","),
        },
        _ => FunctionAliasEntry::default(),
    }
}

fn function_leader(value: &[String]) -> FunctionLeaderEntry {
    match value {
        [index, start, rest @ ..] => FunctionLeaderEntry {
            index: parse_integer(index),
            line_start: parse_integer(start),
            line_end: rest.first().map_or(0, |end| parse_integer(end)),
        },
        _ => FunctionLeaderEntry::default(),
    }
}

fn line_location(value: &[String]) -> LineLocationEntry {
    match value {
        [line, hit, rest @ ..] => LineLocationEntry {
            line: parse_integer(line),
            hit: parse_integer(hit),
            checksum: rest.first().cloned().unwrap_or_default(),
        },
        _ => LineLocationEntry::default(),
    }
}

// ============================================================================
// Section Aggregation
// ============================================================================

/// Leader state for one function index of the alias/leader extension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct FunctionIndexEntry {
    /// Line number of the leader, 0 until a leader record is seen.
    line: u64,
    /// Positions in the current section's `functions.details`.
    aliases: Vec<usize>,
}

/// Folds typed records into a growing list of section summaries.
///
/// Function records are deduplicated by name within a section. Both lookup
/// maps are cleared in place at every `TestName` and `EndOfRecord`.
#[derive(Debug, Clone, Default)]
pub struct SectionAggregator {
    sections: Vec<SectionSummary>,
    current: usize,
    function_map: HashMap<String, usize>,
    function_indices: HashMap<u64, FunctionIndexEntry>,
}

impl SectionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the section slot the next record is written into.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Every section slot created so far, sealed or not.
    pub fn sections(&self) -> &[SectionSummary] {
        &self.sections
    }

    /// Sections closed by an `EndOfRecord`.
    pub fn sealed(&self) -> &[SectionSummary] {
        &self.sections[..self.current.min(self.sections.len())]
    }

    /// Hand the sealed sections to the caller.
    ///
    /// A section still being filled stays and becomes slot 0.
    pub fn take_sealed(&mut self) -> Vec<SectionSummary> {
        let sealed = self.current.min(self.sections.len());
        self.current -= sealed;
        self.sections.drain(..sealed).collect()
    }

    pub fn into_sections(self) -> Vec<SectionSummary> {
        self.sections
    }

    /// The function summary registered under `name` in the current section.
    pub fn current_function(&self, name: &str) -> Option<&FunctionEntry> {
        let position = *self.function_map.get(name)?;
        self.sections
            .get(self.current)?
            .functions
            .details
            .get(position)
    }

    /// Interpret a raw record and fold it.
    pub fn fold_raw(&mut self, record: RawRecord) -> bool {
        self.fold(interpret(record))
    }

    /// Fold one record. Returns `true` when it sealed the current section.
    pub fn fold(&mut self, entry: Entry) -> bool {
        if entry.is_none() {
            return false;
        }

        trace!(variant = ?entry.variant(), section = self.current, "folding record");

        if self.current == self.sections.len() {
            self.sections.push(SectionSummary::default());
        }
        let section = &mut self.sections[self.current];

        match entry {
            Entry::None { .. } => {}
            Entry::TestName { name } => {
                self.function_map.clear();
                self.function_indices.clear();
                section.name = name;
            }
            Entry::FilePath { path } => section.path = path,
            Entry::EndOfRecord => {
                self.function_map.clear();
                self.function_indices.clear();
                debug!(
                    index = self.current,
                    name = %section.name,
                    path = %section.path,
                    "section sealed"
                );
                self.current += 1;
                return true;
            }
            Entry::FunctionLocation(location) => {
                match self.function_map.get(&location.name).copied() {
                    Some(position) => {
                        section.functions.details[position].line = location.line_start;
                    }
                    None => {
                        register_function(
                            &mut self.function_map,
                            &mut section.functions.details,
                            FunctionEntry {
                                name: location.name,
                                line: location.line_start,
                                hit: 0,
                            },
                        );
                    }
                }
            }
            Entry::FunctionExecution(execution) => {
                match self.function_map.get(&execution.name).copied() {
                    Some(position) => {
                        let function = &mut section.functions.details[position];
                        function.hit = function.hit.saturating_add(execution.hit);
                    }
                    None => {
                        register_function(
                            &mut self.function_map,
                            &mut section.functions.details,
                            FunctionEntry {
                                name: execution.name,
                                line: 0,
                                hit: execution.hit,
                            },
                        );
                    }
                }
            }
            Entry::FunctionLeader(leader) => {
                let index = self.function_indices.entry(leader.index).or_default();
                index.line = leader.line_start;
                for &position in &index.aliases {
                    section.functions.details[position].line = leader.line_start;
                }
            }
            Entry::FunctionAlias(alias) => {
                // Aliases may precede their leader; the line stays 0 until it arrives.
                let index = self.function_indices.entry(alias.index).or_default();
                match self.function_map.get(&alias.name).copied() {
                    Some(position) => {
                        let function = &mut section.functions.details[position];
                        function.hit = function.hit.saturating_add(alias.hit);
                        function.line = index.line;
                    }
                    None => {
                        let position = register_function(
                            &mut self.function_map,
                            &mut section.functions.details,
                            FunctionEntry {
                                name: alias.name,
                                line: index.line,
                                hit: alias.hit,
                            },
                        );
                        index.aliases.push(position);
                    }
                }
            }
            Entry::BranchLocation(branch) => section.branches.details.push(BranchEntry {
                line: branch.line,
                block: branch.block,
                branch: branch.branch,
                hit: branch.hit,
                is_exception: branch.is_exception,
            }),
            Entry::LineLocation(line) => section.lines.details.push(LineEntry {
                line: line.line,
                hit: line.hit,
            }),
            Entry::BranchInstrumented { found } => {
                section.branches.instrumented = section.branches.instrumented.saturating_add(found);
            }
            Entry::BranchHit { hit } => {
                section.branches.hit = section.branches.hit.saturating_add(hit);
            }
            Entry::FunctionInstrumented { found } => {
                section.functions.instrumented =
                    section.functions.instrumented.saturating_add(found);
            }
            Entry::FunctionHit { hit } => {
                section.functions.hit = section.functions.hit.saturating_add(hit);
            }
            Entry::LineInstrumented { found } => {
                section.lines.instrumented = section.lines.instrumented.saturating_add(found);
            }
            Entry::LineHit { hit } => {
                section.lines.hit = section.lines.hit.saturating_add(hit);
            }
            Entry::Comment { .. } | Entry::Version { .. } => {}
        }

        false
    }
}

fn register_function(
    function_map: &mut HashMap<String, usize>,
    details: &mut Vec<FunctionEntry>,
    function: FunctionEntry,
) -> usize {
    let position = details.len();
    function_map.insert(function.name.clone(), position);
    details.push(function);
    position
}

/// Fold a sequence of raw records into sections.
///
/// Every section slot is returned, including a trailing one that was never
/// closed by an `EndOfRecord`.
pub fn aggregate(records: impl IntoIterator<Item = RawRecord>) -> Vec<SectionSummary> {
    let mut aggregator = SectionAggregator::new();
    for record in records {
        aggregator.fold_raw(record);
    }
    aggregator.into_sections()
}

// ============================================================================
// Tests
// ============================================================================


// ============================================================================
// Property Tests
// ============================================================================
