//! Core types and DTOs for lcovstream.
//!
//! This crate defines the data shared by every layer of the pipeline:
//! field variants and their configurable tokens, raw tokenizer output,
//! typed records, and the per-section coverage summaries they fold into.

use serde::{Deserialize, Serialize};

// ============================================================================
// Field Variants
// ============================================================================

/// Identifies which LCOV field a record represents.
///
/// `None` is a sentinel for "no record produced"; it never has a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Variant {
    None,
    BranchHit,
    BranchInstrumented,
    BranchLocation,
    Comment,
    EndOfRecord,
    FilePath,
    FunctionAlias,
    FunctionExecution,
    FunctionHit,
    FunctionInstrumented,
    FunctionLeader,
    FunctionLocation,
    LineHit,
    LineInstrumented,
    LineLocation,
    TestName,
    Version,
}

impl Variant {
    /// Every variant that can be recognized in input, in logical-key order.
    pub const FIELDS: [Variant; 17] = [
        Variant::BranchHit,
        Variant::BranchInstrumented,
        Variant::BranchLocation,
        Variant::Comment,
        Variant::EndOfRecord,
        Variant::FilePath,
        Variant::FunctionAlias,
        Variant::FunctionExecution,
        Variant::FunctionHit,
        Variant::FunctionInstrumented,
        Variant::FunctionLeader,
        Variant::FunctionLocation,
        Variant::LineHit,
        Variant::LineInstrumented,
        Variant::LineLocation,
        Variant::TestName,
        Variant::Version,
    ];

    /// Returns `true` for variants that carry no value.
    pub fn is_empty_field(self) -> bool {
        matches!(self, Variant::EndOfRecord | Variant::None)
    }

    /// Returns `true` for variants that must be followed by a `:` to match.
    ///
    /// Comments carry a value but have no colon requirement.
    pub fn requires_colon(self) -> bool {
        !self.is_empty_field() && self != Variant::Comment
    }

    /// The logical configuration key of this variant (e.g. `lineHit`).
    pub fn key(self) -> &'static str {
        match self {
            Variant::None => "none",
            Variant::BranchHit => "branchHit",
            Variant::BranchInstrumented => "branchInstrumented",
            Variant::BranchLocation => "branchLocation",
            Variant::Comment => "comment",
            Variant::EndOfRecord => "endOfRecord",
            Variant::FilePath => "filePath",
            Variant::FunctionAlias => "functionAlias",
            Variant::FunctionExecution => "functionExecution",
            Variant::FunctionHit => "functionHit",
            Variant::FunctionInstrumented => "functionInstrumented",
            Variant::FunctionLeader => "functionLeader",
            Variant::FunctionLocation => "functionLocation",
            Variant::LineHit => "lineHit",
            Variant::LineInstrumented => "lineInstrumented",
            Variant::LineLocation => "lineLocation",
            Variant::TestName => "testName",
            Variant::Version => "version",
        }
    }

    /// Look up a recognizable variant by its logical key.
    ///
    /// Returns `None` for unknown keys and for the `none` sentinel.
    ///
    /// # Examples
    ///
    /// ```
    /// use lcovstream_types::Variant;
    ///
    /// assert_eq!(Variant::from_key("lineHit"), Some(Variant::LineHit));
    /// assert_eq!(Variant::from_key("none"), None);
    /// assert_eq!(Variant::from_key("LH"), None);
    /// ```
    pub fn from_key(key: &str) -> Option<Variant> {
        Variant::FIELDS.into_iter().find(|variant| variant.key() == key)
    }
}

// ============================================================================
// Field Names
// ============================================================================

/// The literal tokens used to recognize each field in input.
///
/// Defaults follow the output of the reference `geninfo` tool. Any subset can
/// be overridden when deserializing; missing keys keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldNames {
    pub branch_hit: String,
    pub branch_instrumented: String,
    pub branch_location: String,
    pub comment: String,
    pub end_of_record: String,
    pub file_path: String,
    pub function_alias: String,
    pub function_execution: String,
    pub function_hit: String,
    pub function_instrumented: String,
    pub function_leader: String,
    pub function_location: String,
    pub line_hit: String,
    pub line_instrumented: String,
    pub line_location: String,
    pub test_name: String,
    pub version: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            branch_hit: "BRH".to_string(),
            branch_instrumented: "BRF".to_string(),
            branch_location: "BRDA".to_string(),
            comment: "#".to_string(),
            end_of_record: "end_of_record".to_string(),
            file_path: "SF".to_string(),
            function_alias: "FNA".to_string(),
            function_execution: "FNDA".to_string(),
            function_hit: "FNH".to_string(),
            function_instrumented: "FNF".to_string(),
            function_leader: "FNL".to_string(),
            function_location: "FN".to_string(),
            line_hit: "LH".to_string(),
            line_instrumented: "LF".to_string(),
            line_location: "DA".to_string(),
            test_name: "TN".to_string(),
            version: "VER".to_string(),
        }
    }
}

impl FieldNames {
    fn slot_mut(&mut self, variant: Variant) -> Option<&mut String> {
        let slot = match variant {
            Variant::None => return None,
            Variant::BranchHit => &mut self.branch_hit,
            Variant::BranchInstrumented => &mut self.branch_instrumented,
            Variant::BranchLocation => &mut self.branch_location,
            Variant::Comment => &mut self.comment,
            Variant::EndOfRecord => &mut self.end_of_record,
            Variant::FilePath => &mut self.file_path,
            Variant::FunctionAlias => &mut self.function_alias,
            Variant::FunctionExecution => &mut self.function_execution,
            Variant::FunctionHit => &mut self.function_hit,
            Variant::FunctionInstrumented => &mut self.function_instrumented,
            Variant::FunctionLeader => &mut self.function_leader,
            Variant::FunctionLocation => &mut self.function_location,
            Variant::LineHit => &mut self.line_hit,
            Variant::LineInstrumented => &mut self.line_instrumented,
            Variant::LineLocation => &mut self.line_location,
            Variant::TestName => &mut self.test_name,
            Variant::Version => &mut self.version,
        };
        Some(slot)
    }

    /// The token configured for `variant`, or `None` for the sentinel.
    pub fn token(&self, variant: Variant) -> Option<&str> {
        let token = match variant {
            Variant::None => return None,
            Variant::BranchHit => &self.branch_hit,
            Variant::BranchInstrumented => &self.branch_instrumented,
            Variant::BranchLocation => &self.branch_location,
            Variant::Comment => &self.comment,
            Variant::EndOfRecord => &self.end_of_record,
            Variant::FilePath => &self.file_path,
            Variant::FunctionAlias => &self.function_alias,
            Variant::FunctionExecution => &self.function_execution,
            Variant::FunctionHit => &self.function_hit,
            Variant::FunctionInstrumented => &self.function_instrumented,
            Variant::FunctionLeader => &self.function_leader,
            Variant::FunctionLocation => &self.function_location,
            Variant::LineHit => &self.line_hit,
            Variant::LineInstrumented => &self.line_instrumented,
            Variant::LineLocation => &self.line_location,
            Variant::TestName => &self.test_name,
            Variant::Version => &self.version,
        };
        Some(token.as_str())
    }

    /// Replace the token for `variant`. Returns `false` for the sentinel.
    pub fn set_token(&mut self, variant: Variant, token: impl Into<String>) -> bool {
        match self.slot_mut(variant) {
            Some(slot) => {
                *slot = token.into();
                true
            }
            None => false,
        }
    }

    /// All `(variant, token)` pairs in logical-key order.
    pub fn entries(&self) -> impl Iterator<Item = (Variant, &str)> + '_ {
        Variant::FIELDS
            .into_iter()
            .filter_map(move |variant| self.token(variant).map(|token| (variant, token)))
    }

    /// Find the first pair of variants configured with an identical token.
    ///
    /// # Examples
    ///
    /// ```
    /// use lcovstream_types::{FieldNames, Variant};
    ///
    /// let mut names = FieldNames::default();
    /// assert_eq!(names.find_duplicate(), None);
    ///
    /// names.set_token(Variant::LineHit, "DA");
    /// assert_eq!(
    ///     names.find_duplicate(),
    ///     Some((Variant::LineHit, Variant::LineLocation))
    /// );
    /// ```
    pub fn find_duplicate(&self) -> Option<(Variant, Variant)> {
        let entries: Vec<(Variant, &str)> = self.entries().collect();
        for (position, (variant, token)) in entries.iter().enumerate() {
            if let Some((other, _)) = entries[position + 1..]
                .iter()
                .find(|(_, other_token)| other_token == token)
            {
                return Some((*variant, *other));
            }
        }
        None
    }
}

// ============================================================================
// Raw Parse Results
// ============================================================================

/// One result of the incremental tokenizer.
///
/// `value` holds the comma-split text between the field's colon and the
/// terminating newline, or `None` for empty fields and unfinished records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// No record is available and none can be produced without more input.
    pub done: bool,
    /// A record was recognized but its bytes are not fully buffered yet.
    pub incomplete: bool,
    pub variant: Variant,
    pub value: Option<Vec<String>>,
}

impl RawRecord {
    /// The terminal "nothing buffered" result.
    pub fn done() -> Self {
        Self {
            done: true,
            incomplete: false,
            variant: Variant::None,
            value: None,
        }
    }

    /// A result for a recognized (or unrecognizable) but unfinished record.
    pub fn incomplete(variant: Variant) -> Self {
        Self {
            done: false,
            incomplete: true,
            variant,
            value: None,
        }
    }

    /// A complete record.
    pub fn complete(variant: Variant, value: Option<Vec<String>>) -> Self {
        Self {
            done: false,
            incomplete: false,
            variant,
            value,
        }
    }
}

// ============================================================================
// Typed Records
// ============================================================================

/// `BRDA:<line>,[e]<block>,<branch>,<taken>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchLocationEntry {
    pub line: u64,
    pub block: u64,
    /// Expression or branch label; may contain commas.
    pub branch: String,
    pub hit: u64,
    pub is_exception: bool,
}

/// `FN:<line start>[,<line end>],<name>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionLocationEntry {
    pub name: String,
    pub line_start: u64,
    pub line_end: u64,
}

/// `FNDA:<hit>,<name>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionExecutionEntry {
    pub name: String,
    pub hit: u64,
}

/// `FNL:<index>,<line start>[,<line end>]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionLeaderEntry {
    pub index: u64,
    pub line_start: u64,
    pub line_end: u64,
}

/// `FNA:<index>,<hit>,<name>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionAliasEntry {
    pub index: u64,
    pub hit: u64,
    pub name: String,
}

/// `DA:<line>,<hit>[,<checksum>]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineLocationEntry {
    pub line: u64,
    pub hit: u64,
    pub checksum: String,
}

/// A strongly typed record, one shape per field variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "camelCase")]
pub enum Entry {
    /// No record: the parser needs more input or has none buffered.
    None { done: bool, incomplete: bool },
    BranchHit { hit: u64 },
    BranchInstrumented { found: u64 },
    BranchLocation(BranchLocationEntry),
    Comment { comment: String },
    EndOfRecord,
    FilePath { path: String },
    FunctionAlias(FunctionAliasEntry),
    FunctionExecution(FunctionExecutionEntry),
    FunctionHit { hit: u64 },
    FunctionInstrumented { found: u64 },
    FunctionLeader(FunctionLeaderEntry),
    FunctionLocation(FunctionLocationEntry),
    LineHit { hit: u64 },
    LineInstrumented { found: u64 },
    LineLocation(LineLocationEntry),
    TestName { name: String },
    Version { version: String },
}

impl Entry {
    /// The field variant this record was produced from.
    pub fn variant(&self) -> Variant {
        match self {
            Entry::None { .. } => Variant::None,
            Entry::BranchHit { .. } => Variant::BranchHit,
            Entry::BranchInstrumented { .. } => Variant::BranchInstrumented,
            Entry::BranchLocation(_) => Variant::BranchLocation,
            Entry::Comment { .. } => Variant::Comment,
            Entry::EndOfRecord => Variant::EndOfRecord,
            Entry::FilePath { .. } => Variant::FilePath,
            Entry::FunctionAlias(_) => Variant::FunctionAlias,
            Entry::FunctionExecution(_) => Variant::FunctionExecution,
            Entry::FunctionHit { .. } => Variant::FunctionHit,
            Entry::FunctionInstrumented { .. } => Variant::FunctionInstrumented,
            Entry::FunctionLeader(_) => Variant::FunctionLeader,
            Entry::FunctionLocation(_) => Variant::FunctionLocation,
            Entry::LineHit { .. } => Variant::LineHit,
            Entry::LineInstrumented { .. } => Variant::LineInstrumented,
            Entry::LineLocation(_) => Variant::LineLocation,
            Entry::TestName { .. } => Variant::TestName,
            Entry::Version { .. } => Variant::Version,
        }
    }

    /// Returns `true` for the "no record" sentinel.
    pub fn is_none(&self) -> bool {
        matches!(self, Entry::None { .. })
    }

    /// The `done` flag every typed record carries. Only a `None` sentinel can
    /// report `true`.
    pub fn done(&self) -> bool {
        matches!(self, Entry::None { done: true, .. })
    }

    /// Borrow this record in its emitted shape, with `done` alongside
    /// `variant`.
    pub fn record(&self) -> EntryRecord<'_> {
        EntryRecord {
            done: (!self.is_none()).then_some(false),
            entry: self,
        }
    }
}

/// Serialized form of an [`Entry`]: `{done, variant, ...fields}`.
///
/// The sentinel already carries `done`, so it is not repeated for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntryRecord<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    done: Option<bool>,
    #[serde(flatten)]
    entry: &'a Entry,
}

impl EntryRecord<'_> {
    pub fn done(&self) -> bool {
        self.entry.done()
    }
}

// ============================================================================
// Section Summaries
// ============================================================================

/// A single instrumented line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEntry {
    pub line: u64,
    pub hit: u64,
}

/// A single instrumented function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionEntry {
    pub name: String,
    pub line: u64,
    pub hit: u64,
}

/// A single instrumented branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchEntry {
    pub line: u64,
    pub block: u64,
    /// A human-readable label that should uniquely identify the branch.
    pub branch: String,
    pub hit: u64,
    /// Possibly a `catch` or otherwise exception related branch.
    pub is_exception: bool,
}

/// Running totals plus per-entity detail for one kind of coverage.
///
/// `hit` and `instrumented` come from the dedicated count records and are
/// independent of `details.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary<Detail> {
    /// Details in first-seen order.
    pub details: Vec<Detail>,
    pub hit: u64,
    pub instrumented: u64,
}

impl<Detail> Default for Summary<Detail> {
    fn default() -> Self {
        Self {
            details: Vec::new(),
            hit: 0,
            instrumented: 0,
        }
    }
}

/// Coverage data for one test-name/source-file pairing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSummary {
    /// The test name (`TN`).
    pub name: String,
    /// The source file path (`SF`).
    pub path: String,
    pub branches: Summary<BranchEntry>,
    pub functions: Summary<FunctionEntry>,
    pub lines: Summary<LineEntry>,
}

// ============================================================================
// Tests
// ============================================================================
