//! Scheme-wide invariant checks.
//!
//! [`validate`] never mutates the scheme. It returns a list of [`Finding`]s,
//! each tagged ERROR or WARNING. Strict callers reject a scheme with any
//! ERROR; lenient callers decide for themselves.
//!
//! Checks, in reporting order:
//! - amplicon and primer ordering
//! - primers of different amplicons overlapping within one (chromosome, pool)
//! - amplicon numbers repeated on one chromosome
//! - LEFT primers reaching past RIGHT primers (no insert), circular amplicons excepted
//! - alternates with identical coordinates (see [`AltPolicy`])
//! - strand disagreeing with primer side
//! - chromosome naming
//! - pool numbering
//! - unassigned records
use core::fmt;
use core::str::FromStr;
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::bedline::BedLine;
use crate::error::Error;
use crate::scheme::{amplicon_order, Scheme, Unassigned};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        })
    }
}

/// What a finding is about. Mirrors the error taxonomy for pipeline errors
/// downgraded in lenient mode, plus the validator's own checks.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    LineFormat,
    Coordinate,
    Pool,
    Strand,
    Sequence,
    NameFormat,
    UnpairedPrimer,
    DuplicatePrimer,
    PoolConsistency,
    Remap,
    MergeConflict,
    Validation,
    /// Input lines were not in canonical order.
    InputOrder,
    Order,
    PoolOverlap,
    DuplicateAmplicon,
    ShortInsert,
    IdenticalAlts,
    StrandMismatch,
    ChromNaming,
    PoolNumbering,
    Unassigned,
}

/// One validation result.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub kind: FindingKind,
    /// Primer or amplicon names involved.
    pub entities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub message: String,
}

impl Finding {
    pub fn error(kind: FindingKind, entities: Vec<String>, message: impl Into<String>) -> Self {
        Self { severity: Severity::Error, kind, entities, line: None, message: message.into() }
    }

    pub fn warning(kind: FindingKind, entities: Vec<String>, message: impl Into<String>) -> Self {
        Self { severity: Severity::Warning, kind, entities, line: None, message: message.into() }
    }

    pub fn at_line(mut self, line: Option<usize>) -> Self {
        self.line = line;
        self
    }

    pub fn is_error(&self) -> bool { self.severity == Severity::Error }

    /// Downgrade a pipeline error into an ERROR finding.
    pub fn from_error(e: &Error) -> Self {
        let (kind, entities) = match e {
            Error::LineFormat { .. } => (FindingKind::LineFormat, vec![]),
            Error::Coordinate { .. } => (FindingKind::Coordinate, vec![]),
            Error::Pool { .. } => (FindingKind::Pool, vec![]),
            Error::Strand { .. } => (FindingKind::Strand, vec![]),
            Error::Sequence { .. } => (FindingKind::Sequence, vec![]),
            Error::NameFormat { name, .. } => (FindingKind::NameFormat, vec![name.clone()]),
            Error::UnpairedPrimer { amplicon, .. } => (FindingKind::UnpairedPrimer, vec![amplicon.clone()]),
            Error::DuplicatePrimer { name, .. } => (FindingKind::DuplicatePrimer, vec![name.clone()]),
            Error::PoolConsistency { amplicon, .. } => (FindingKind::PoolConsistency, vec![amplicon.clone()]),
            Error::Remap { .. } => (FindingKind::Remap, vec![]),
            Error::MergeConflict { chrom, amplicon_number } => {
                (FindingKind::MergeConflict, vec![format!("{chrom}:{amplicon_number}")])
            }
            Error::Validation { .. } => (FindingKind::Validation, vec![]),
        };
        Finding::error(kind, entities, e.to_string()).at_line(e.line())
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// What to do with alternate primers that share identical coordinates on one
/// amplicon side. Some schemes use these deliberately (different oligo, same
/// footprint); others contain them by accident.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum AltPolicy {
    /// Treat as intended redundancy.
    #[default]
    Accept,
    /// Report a WARNING.
    Warn,
    /// Report an ERROR.
    Reject,
}

impl FromStr for AltPolicy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "accept" | "allow" => Ok(Self::Accept),
            "warn" => Ok(Self::Warn),
            "reject" | "error" => Ok(Self::Reject),
            other => Err(format!("Unknown alt policy: {}", other)),
        }
    }
}

/// Validator configuration.
#[derive(Clone, Debug, Default)]
pub struct ValidateOptions {
    /// Downgrade "LEFT primer past RIGHT primer" from ERROR to WARNING.
    pub allow_short_amplicons: bool,
    pub alt_policy: AltPolicy,
}

/// Run every check against `scheme`.
pub fn validate(scheme: &Scheme, opts: &ValidateOptions) -> Vec<Finding> {
    let mut out = Vec::new();
    check_order(scheme, &mut out);
    check_pool_overlaps(scheme, &mut out);
    check_unique_numbers(scheme, &mut out);
    check_inserts(scheme, opts, &mut out);
    check_identical_alts(scheme, opts, &mut out);
    check_strands(scheme, &mut out);
    check_chrom_naming(scheme, &mut out);
    check_pool_numbering(scheme, &mut out);
    check_unassigned(scheme, &mut out);
    out
}

fn check_order(scheme: &Scheme, out: &mut Vec<Finding>) {
    for w in scheme.amplicons().windows(2) {
        if amplicon_order(&w[0], &w[1]).is_gt() {
            out.push(Finding::error(
                FindingKind::Order,
                vec![w[0].name(), w[1].name()],
                format!("amplicon {} on {} is listed before {} on {}", w[0].name(), w[0].chrom(), w[1].name(), w[1].chrom()),
            ));
        }
    }
    for a in scheme.amplicons() {
        for side in [a.left(), a.right()] {
            for w in side.windows(2) {
                if w[0].canonical_cmp(&w[1]).is_gt() {
                    out.push(Finding::error(
                        FindingKind::Order,
                        vec![w[0].name().to_string(), w[1].name().to_string()],
                        format!("primer {} is listed before {} in amplicon {}", w[0].name(), w[1].name(), a.name()),
                    ));
                }
            }
        }
    }
}

// Sort each (chrom, pool) group by start and sweep forward while the next
// start is still inside the current primer. Members of the same amplicon are
// skipped: alternates overlap by construction and LEFT/RIGHT collisions are
// reported as a missing insert.
fn check_pool_overlaps(scheme: &Scheme, out: &mut Vec<Finding>) {
    let mut groups: BTreeMap<(&str, u32), Vec<(&BedLine, usize)>> = BTreeMap::new();
    for (idx, a) in scheme.amplicons().iter().enumerate() {
        for b in a.primers() {
            groups.entry((b.chrom(), b.pool())).or_default().push((b, idx));
        }
    }
    let offset = scheme.amplicons().len();
    for (k, b) in scheme.unassigned_records().enumerate() {
        groups.entry((b.chrom(), b.pool())).or_default().push((b, offset + k));
    }

    for ((chrom, pool), mut members) in groups {
        members.sort_by(|x, y| x.0.canonical_cmp(y.0));
        for i in 0..members.len() {
            let (a, owner_a) = members[i];
            for &(b, owner_b) in &members[i + 1..] {
                if b.start() >= a.end() {
                    break;
                }
                if owner_a == owner_b {
                    continue;
                }
                out.push(Finding::error(
                    FindingKind::PoolOverlap,
                    vec![a.name().to_string(), b.name().to_string()],
                    format!(
                        "{} [{}, {}) overlaps {} [{}, {}) in pool {} on {}",
                        a.name(), a.start(), a.end(), b.name(), b.start(), b.end(), pool, chrom
                    ),
                ));
            }
        }
    }
}

fn check_unique_numbers(scheme: &Scheme, out: &mut Vec<Finding>) {
    let mut seen: BTreeMap<(&str, u32), Vec<String>> = BTreeMap::new();
    for a in scheme.amplicons() {
        seen.entry((a.chrom(), a.number())).or_default().push(a.name());
    }
    for ((chrom, number), names) in seen {
        if names.len() > 1 {
            out.push(Finding::error(
                FindingKind::DuplicateAmplicon,
                names.clone(),
                format!("amplicon number {} is used {} times on {} ({})", number, names.len(), chrom, names.join(", ")),
            ));
        }
    }
}

fn check_inserts(scheme: &Scheme, opts: &ValidateOptions, out: &mut Vec<Finding>) {
    for a in scheme.amplicons().iter().filter(|a| !a.has_insert()) {
        let msg = format!(
            "amplicon {} on {} has LEFT primers ending at {} past RIGHT primers starting at {}",
            a.name(), a.chrom(), a.insert_start(), a.insert_end()
        );
        let f = if opts.allow_short_amplicons {
            Finding::warning(FindingKind::ShortInsert, vec![a.name()], msg)
        } else {
            Finding::error(FindingKind::ShortInsert, vec![a.name()], msg)
        };
        out.push(f);
    }
}

fn check_identical_alts(scheme: &Scheme, opts: &ValidateOptions, out: &mut Vec<Finding>) {
    if opts.alt_policy == AltPolicy::Accept {
        return;
    }
    for a in scheme.amplicons() {
        for side in [a.left(), a.right()] {
            let mut sites: BTreeMap<(u64, u64), Vec<String>> = BTreeMap::new();
            for b in side {
                sites.entry((b.start(), b.end())).or_default().push(b.name().to_string());
            }
            for ((start, end), names) in sites.into_iter().filter(|(_, n)| n.len() > 1) {
                let msg = format!("alternates {} share coordinates [{}, {}) on {}", names.join(", "), start, end, a.chrom());
                out.push(match opts.alt_policy {
                    AltPolicy::Reject => Finding::error(FindingKind::IdenticalAlts, names, msg),
                    _ => Finding::warning(FindingKind::IdenticalAlts, names, msg),
                });
            }
        }
    }
}

fn check_strands(scheme: &Scheme, out: &mut Vec<Finding>) {
    for b in scheme.bedlines() {
        let expected = b.name().side().expected_strand();
        if b.strand() != expected {
            out.push(Finding::warning(
                FindingKind::StrandMismatch,
                vec![b.name().to_string()],
                format!("{} primer {} is on strand {} (expected {})", b.name().side(), b.name(), b.strand(), expected),
            ));
        }
    }
}

fn check_chrom_naming(scheme: &Scheme, out: &mut Vec<Finding>) {
    let chroms: BTreeSet<&str> = scheme.bedlines().into_iter().map(BedLine::chrom).collect();
    for c in chroms.iter().filter(|c| c.is_empty() || c.chars().any(char::is_whitespace)) {
        out.push(Finding::error(FindingKind::ChromNaming, vec![c.to_string()], format!("invalid chromosome name '{}'", c)));
    }
    let prefixed = chroms.iter().filter(|c| c.starts_with("chr")).count();
    if prefixed > 0 && prefixed < chroms.len() {
        out.push(Finding::warning(
            FindingKind::ChromNaming,
            chroms.iter().map(|c| c.to_string()).collect(),
            format!("chromosome names mix 'chr'-prefixed and unprefixed styles: {}", chroms.iter().copied().collect::<Vec<_>>().join(", ")),
        ));
    }
}

fn check_pool_numbering(scheme: &Scheme, out: &mut Vec<Finding>) {
    let pools = scheme.pools();
    let contiguous = pools.iter().copied().eq(1..=pools.len() as u32);
    if !contiguous {
        out.push(Finding::warning(
            FindingKind::PoolNumbering,
            pools.iter().map(|p| p.to_string()).collect(),
            format!(
                "pools are not numbered 1..{} ({}); run renumber-pools",
                pools.len(),
                pools.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ")
            ),
        ));
    }
}

fn check_unassigned(scheme: &Scheme, out: &mut Vec<Finding>) {
    for u in scheme.unassigned() {
        out.push(match u {
            Unassigned::Record(b) => Finding::warning(
                FindingKind::Unassigned,
                vec![b.name().to_string()],
                format!("primer {} on {} is not part of any amplicon", b.name(), b.chrom()),
            ),
            Unassigned::Raw { line, content } => Finding::warning(
                FindingKind::Unassigned,
                vec![],
                format!("line {} could not be parsed: '{}'", line, content),
            )
            .at_line(Some(*line)),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amplicon::Amplicon;

    fn bl(s: &str) -> BedLine { BedLine::parse_line(s, 1).unwrap() }

    fn amp(lines: &[&str], rights: &[&str]) -> Amplicon {
        Amplicon::new(lines.iter().map(|s| bl(s)).collect(), rights.iter().map(|s| bl(s)).collect()).unwrap()
    }

    fn kinds(f: &[Finding]) -> Vec<FindingKind> { f.iter().map(|f| f.kind).collect() }

    #[test]
    fn clean_scheme_has_no_findings() {
        let s = Scheme::canonical(
            vec![],
            vec![
                amp(&["chr1\t100\t120\ts_1_LEFT\t1\t+"], &["chr1\t300\t320\ts_1_RIGHT\t1\t-"]),
                amp(&["chr1\t250\t270\ts_2_LEFT\t2\t+"], &["chr1\t500\t520\ts_2_RIGHT\t2\t-"]),
            ],
            vec![],
        );
        assert!(validate(&s, &ValidateOptions::default()).is_empty());
    }

    #[test]
    fn overlap_in_same_pool_is_an_error_naming_both() {
        let s = Scheme::canonical(
            vec![],
            vec![
                amp(&["chr1\t100\t150\ts_1_LEFT\t1\t+"], &["chr1\t400\t420\ts_1_RIGHT\t1\t-"]),
                amp(&["chr1\t140\t160\ts_2_LEFT\t1\t+"], &["chr1\t600\t620\ts_2_RIGHT\t1\t-"]),
            ],
            vec![],
        );
        let f = validate(&s, &ValidateOptions::default());
        let o: Vec<_> = f.iter().filter(|f| f.kind == FindingKind::PoolOverlap).collect();
        assert!(!o.is_empty());
        assert!(o[0].is_error());
        assert!(o[0].entities.contains(&"s_1_LEFT".to_string()));
        assert!(o[0].entities.contains(&"s_2_LEFT".to_string()));
    }

    #[test]
    fn overlap_in_different_pools_is_fine() {
        let s = Scheme::canonical(
            vec![],
            vec![
                amp(&["chr1\t100\t150\ts_1_LEFT\t1\t+"], &["chr1\t400\t420\ts_1_RIGHT\t1\t-"]),
                amp(&["chr1\t140\t160\ts_2_LEFT\t2\t+"], &["chr1\t600\t620\ts_2_RIGHT\t2\t-"]),
            ],
            vec![],
        );
        assert!(!kinds(&validate(&s, &ValidateOptions::default())).contains(&FindingKind::PoolOverlap));
    }

    #[test]
    fn short_insert_respects_allowance() {
        let s = Scheme::canonical(
            vec![],
            vec![amp(&["chr1\t100\t220\ts_1_LEFT\t1\t+"], &["chr1\t200\t260\ts_1_RIGHT\t1\t-"])],
            vec![],
        );
        let strict = validate(&s, &ValidateOptions::default());
        assert!(strict.iter().any(|f| f.kind == FindingKind::ShortInsert && f.is_error()));
        let lenient = validate(&s, &ValidateOptions { allow_short_amplicons: true, ..Default::default() });
        assert!(lenient.iter().any(|f| f.kind == FindingKind::ShortInsert && !f.is_error()));
    }

    #[test]
    fn circular_amplicon_is_not_a_short_insert() {
        let s = Scheme::canonical(
            vec![],
            vec![amp(&["chrM\t16400\t16420\ts_1_LEFT\t1\t+"], &["chrM\t100\t120\ts_1_RIGHT\t1\t-"])],
            vec![],
        );
        assert!(validate(&s, &ValidateOptions::default()).is_empty());
    }

    #[test]
    fn duplicate_numbers_order_and_pool_gaps() {
        let a = amp(&["chr1\t100\t120\tx_1_LEFT\t1\t+"], &["chr1\t300\t320\tx_1_RIGHT\t1\t-"]);
        let b = amp(&["chr1\t1000\t1020\ty_1_LEFT\t3\t+"], &["chr1\t1300\t1320\ty_1_RIGHT\t3\t-"]);
        // y before x violates (number, chrom, scheme) order
        let s = Scheme::new(vec![], vec![b, a], vec![]);
        let k = kinds(&validate(&s, &ValidateOptions::default()));
        assert!(k.contains(&FindingKind::DuplicateAmplicon));
        assert!(k.contains(&FindingKind::Order));
        assert!(k.contains(&FindingKind::PoolNumbering));
    }

    #[test]
    fn identical_alt_policy() {
        let s = Scheme::canonical(
            vec![],
            vec![amp(
                &["chr1\t100\t120\ts_1_LEFT_1\t1\t+\tACGT", "chr1\t100\t120\ts_1_LEFT_2\t1\t+\tACGA"],
                &["chr1\t300\t320\ts_1_RIGHT_1\t1\t-"],
            )],
            vec![],
        );
        assert!(validate(&s, &ValidateOptions::default()).is_empty());
        let warn = validate(&s, &ValidateOptions { alt_policy: AltPolicy::Warn, ..Default::default() });
        assert_eq!(kinds(&warn), vec![FindingKind::IdenticalAlts]);
        assert!(!warn[0].is_error());
        let reject = validate(&s, &ValidateOptions { alt_policy: AltPolicy::Reject, ..Default::default() });
        assert!(reject[0].is_error());
        assert_eq!("reject".parse::<AltPolicy>().unwrap(), AltPolicy::Reject);
    }

    #[test]
    fn strand_naming_and_unassigned_warnings() {
        let s = Scheme::canonical(
            vec![],
            vec![
                amp(&["chr1\t100\t120\ts_1_LEFT\t1\t-"], &["chr1\t300\t320\ts_1_RIGHT\t1\t-"]),
                amp(&["2\t100\t120\ts_2_LEFT\t1\t+"], &["2\t300\t320\ts_2_RIGHT\t1\t-"]),
            ],
            vec![Unassigned::Raw { line: 4, content: "bad".into() }],
        );
        let f = validate(&s, &ValidateOptions::default());
        assert!(f.iter().all(|f| !f.is_error()), "{f:?}");
        let k = kinds(&f);
        assert!(k.contains(&FindingKind::StrandMismatch));
        assert!(k.contains(&FindingKind::ChromNaming));
        let u = f.iter().find(|f| f.kind == FindingKind::Unassigned).unwrap();
        assert_eq!(u.line, Some(4));
    }

    #[test]
    fn findings_serialize_for_reports() {
        let f = Finding::from_error(&Error::Pool { line: Some(2), content: "x".into(), value: "0".into() });
        let v = serde_json::to_value(&f).unwrap();
        assert_eq!(v["severity"], "ERROR");
        assert_eq!(v["kind"], "pool");
        assert_eq!(v["line"], 2);
    }
}
