//! Error taxonomy for parsing, pairing and transforming primer schemes.
//!
//! Line-level variants always carry the 1-based line number and the raw line
//! so a user can find the offending record without re-reading the file.
use thiserror::Error;

use crate::primername::PrimerSide;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the core can report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Wrong number of columns or a non-integer coordinate.
    #[error("line {line}: {reason}: '{content}'")]
    LineFormat { line: usize, content: String, reason: String },

    /// `start < 0` or `start >= end`. `line` is `None` for records built by a transform.
    #[error("{}invalid coordinates ({reason}): '{content}'", at(.line))]
    Coordinate { line: Option<usize>, content: String, reason: String },

    /// Pool column is not a positive integer.
    #[error("{}pool must be a positive integer, got '{value}': '{content}'", at(.line))]
    Pool { line: Option<usize>, content: String, value: String },

    /// Strand column is not `+` or `-`.
    #[error("line {line}: strand must be '+' or '-', got '{value}': '{content}'")]
    Strand { line: usize, content: String, value: String },

    /// Sequence column contains characters outside the IUPAC DNA alphabet.
    #[error("{}invalid primer sequence '{sequence}': '{content}'", at(.line))]
    Sequence { line: Option<usize>, content: String, sequence: String },

    /// Primer name does not match `<scheme>_<n>_<side>[_<alt>]`.
    #[error("{}invalid primer name '{name}': {reason}", at(.line))]
    NameFormat { name: String, reason: String, line: Option<usize> },

    /// An amplicon group has primers on only one side.
    #[error("amplicon {amplicon} on {chrom} has no {missing} primer")]
    UnpairedPrimer { amplicon: String, chrom: String, missing: PrimerSide },

    /// The same primer name appears twice within one amplicon.
    #[error("duplicate primer '{name}' on {chrom}")]
    DuplicatePrimer { name: String, chrom: String },

    /// Members of one amplicon disagree on the pool.
    #[error("amplicon {amplicon} on {chrom} mixes pools {expected} and {found}")]
    PoolConsistency { amplicon: String, chrom: String, expected: u32, found: u32 },

    /// A remap could not be applied to every record.
    #[error("remap failed: {reason}")]
    Remap { reason: String },

    /// Both schemes define the same amplicon number on the same chromosome.
    #[error("merge conflict: amplicon {amplicon_number} exists on {chrom} in both schemes")]
    MergeConflict { chrom: String, amplicon_number: u32 },

    /// A strict parse produced ERROR-level validation findings.
    #[error("scheme failed validation with {errors} error(s); first: {first}")]
    Validation { errors: usize, first: String },
}

fn at(line: &Option<usize>) -> String {
    line.map(|l| format!("line {l}: ")).unwrap_or_default()
}

impl Error {
    /// Attach a line number to a name error raised by the name parser.
    pub(crate) fn at_line(self, line_no: usize) -> Self {
        match self {
            Error::NameFormat { name, reason, .. } => Error::NameFormat { name, reason, line: Some(line_no) },
            other => other,
        }
    }

    /// The input line this error is attributable to, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::LineFormat { line, .. } | Error::Strand { line, .. } => Some(*line),
            Error::Coordinate { line, .. }
            | Error::Pool { line, .. }
            | Error::Sequence { line, .. }
            | Error::NameFormat { line, .. } => *line,
            _ => None,
        }
    }
}
