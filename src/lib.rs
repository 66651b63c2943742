#![forbid(unsafe_code)]
//! # primalbed
//!
//! Parse, validate, normalise and transform **tiled-amplicon primer schemes**
//! stored as `primer.bed` files (primalscheme / ARTIC conventions).
//!
//! ## Highlights
//! - **Typed records**: every line becomes a [`BedLine`] with a decoded [`PrimerName`].
//! - **Pairing**: records are grouped into [`Amplicon`]s, alternates included.
//! - **Validation**: scheme-wide checks (pool overlaps, inserts, ordering) as [`Finding`]s.
//! - **Transforms**: remap, renumber, merge and rename, always returning a new [`Scheme`].
//!
//! ## Examples
//! ```rust
//! let bed = "chr1\t100\t120\tscheme_1_LEFT\t1\t+\n\
//!            chr1\t200\t220\tscheme_1_RIGHT\t1\t-\n";
//! let parsed = primalbed::parse(bed, &primalbed::ParseOptions::default()).unwrap();
//! let amp = &parsed.scheme.amplicons()[0];
//! assert_eq!((amp.number(), amp.pool()), (1, 1));
//! assert_eq!((amp.insert_start(), amp.insert_end()), (120, 200));
//! assert_eq!(primalbed::serialize(&parsed.scheme), bed);
//! ```
//!
//! ## Version
//! See [`VERSION`].

pub mod amplicon;
pub mod bedline;
pub mod error;
pub mod pair;
pub mod primername;
pub mod scheme;
pub mod serialize;
pub mod table;
pub mod transform;
pub mod validate;

use log::info;

pub use amplicon::Amplicon;
pub use bedline::{BedLine, Strand};
pub use error::{Error, Result};
pub use pair::Mode;
pub use primername::{PrimerName, PrimerNameVersion, PrimerSide};
pub use scheme::{Scheme, Unassigned};
pub use serialize::serialize;
pub use table::{read_chrom_map, write_amplicon_table, TableKind};
pub use transform::{
    downgrade_primernames, merge, merge_primers, remap, renumber_amplicons, renumber_pools, update_primernames,
    MergePolicy, RemapOptions, Unmapped,
};
pub use validate::{validate, AltPolicy, Finding, FindingKind, Severity, ValidateOptions};

/// Parser configuration.
#[derive(Clone, Debug, Default)]
pub struct ParseOptions {
    pub mode: Mode,
    pub validate: ValidateOptions,
}

/// A parsed scheme together with everything noticed while building it.
#[derive(Clone, Debug)]
pub struct Parsed {
    pub scheme: Scheme,
    pub findings: Vec<Finding>,
}

impl Parsed {
    pub fn errors(&self) -> impl Iterator<Item = &Finding> { self.findings.iter().filter(|f| f.is_error()) }
    pub fn has_errors(&self) -> bool { self.errors().next().is_some() }
}

/// Parse `primer.bed` text.
///
/// In [`Mode::Strict`] the first line, pairing or validation error aborts;
/// WARNING findings are still returned. In [`Mode::Lenient`] this is
/// [`parse_lenient`] and never fails.
pub fn parse(text: &str, opts: &ParseOptions) -> Result<Parsed> {
    if opts.mode == Mode::Lenient {
        return Ok(parse_lenient(text, opts));
    }
    let mut headers = Vec::new();
    let mut records = Vec::new();
    for (line_no, line) in content_lines(text) {
        match line {
            Line::Header(h) => headers.push(h.to_string()),
            Line::Record(r) => records.push(BedLine::parse_line(r, line_no)?),
        }
    }
    let paired = pair::build(records, Mode::Strict)?;
    let scheme = Scheme::canonical(headers, paired.amplicons, paired.unassigned);

    let mut findings = paired.findings;
    findings.extend(validate(&scheme, &opts.validate));
    let errors: Vec<&Finding> = findings.iter().filter(|f| f.is_error()).collect();
    if let Some(first) = errors.first() {
        return Err(Error::Validation { errors: errors.len(), first: first.message.clone() });
    }
    log_summary(&scheme);
    Ok(Parsed { scheme, findings })
}

/// Parse `primer.bed` text, turning every error into a finding.
///
/// Lines that do not parse are kept as [`Unassigned::Raw`]; records that do
/// not pair are kept as [`Unassigned::Record`].
pub fn parse_lenient(text: &str, opts: &ParseOptions) -> Parsed {
    let mut headers = Vec::new();
    let mut records = Vec::new();
    let mut raw = Vec::new();
    let mut findings = Vec::new();
    for (line_no, line) in content_lines(text) {
        match line {
            Line::Header(h) => headers.push(h.to_string()),
            Line::Record(r) => match BedLine::parse_line(r, line_no) {
                Ok(b) => records.push(b),
                Err(e) => {
                    log::warn!("{}", e);
                    findings.push(Finding::from_error(&e));
                    raw.push(Unassigned::Raw { line: line_no, content: r.to_string() });
                }
            },
        }
    }
    let paired = pair::build_lenient(records);
    let mut unassigned = paired.unassigned;
    unassigned.extend(raw);
    let scheme = Scheme::canonical(headers, paired.amplicons, unassigned);

    findings.extend(paired.findings);
    findings.extend(validate(&scheme, &opts.validate));
    log_summary(&scheme);
    Parsed { scheme, findings }
}

enum Line<'a> {
    Header(&'a str),
    Record(&'a str),
}

// Numbered (1-based) non-blank lines, classified.
fn content_lines(text: &str) -> impl Iterator<Item = (usize, Line<'_>)> {
    text.lines().enumerate().filter_map(|(i, l)| {
        let l = l.trim_end_matches('\r');
        if l.trim().is_empty() {
            None
        } else if l.trim_start().starts_with('#') {
            Some((i + 1, Line::Header(l.trim())))
        } else {
            Some((i + 1, Line::Record(l)))
        }
    })
}

fn log_summary(scheme: &Scheme) {
    info!(
        "{} amplicons across {} chromosome(s) in {} pool(s), {} unassigned",
        scheme.amplicons().len(),
        scheme.chromosomes().len(),
        scheme.pool_count(),
        scheme.unassigned().len()
    );
}

/// Crate version string (from `CARGO_PKG_VERSION`).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
