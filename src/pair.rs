//! Group primer records into amplicons.
//!
//! Records are bucketed by (scheme, chromosome, amplicon number) in one
//! pass, so the result does not depend on input order. Each bucket is then
//! checked for duplicate names, pool agreement and the presence of both
//! sides. Problems are collected as rejections; [`build`] decides whether
//! they abort (strict) or become findings (lenient).
use std::collections::{BTreeMap, HashSet};

use log::{debug, warn};

use crate::amplicon::Amplicon;
use crate::bedline::{sort_canonical, BedLine};
use crate::error::{Error, Result};
use crate::primername::PrimerSide;
use crate::scheme::Unassigned;
use crate::validate::{Finding, FindingKind};

/// How pipeline errors are handled.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Mode {
    /// Abort on the first error.
    #[default]
    Strict,
    /// Record errors as findings and keep going.
    Lenient,
}

/// Output of the pairing step.
#[derive(Clone, Debug, Default)]
pub struct Paired {
    pub amplicons: Vec<Amplicon>,
    /// Valid records that could not be placed.
    pub unassigned: Vec<Unassigned>,
    /// Every group-level error, in group order.
    pub rejections: Vec<Error>,
    /// Non-fatal observations about the input.
    pub findings: Vec<Finding>,
}

type GroupKey = (String, String, u32);

/// Pair `lines`, collecting every problem instead of stopping.
pub fn pair(lines: Vec<BedLine>) -> Paired {
    let mut out = Paired::default();

    if let Some(w) = lines.windows(2).find(|w| w[0].canonical_cmp(&w[1]).is_gt()) {
        out.findings.push(Finding::warning(
            FindingKind::InputOrder,
            vec![w[0].name().to_string(), w[1].name().to_string()],
            format!("input is not sorted: {} appears before {}; output will be reordered", w[0].name(), w[1].name()),
        ));
    }

    let mut groups: BTreeMap<GroupKey, Vec<BedLine>> = BTreeMap::new();
    for b in lines {
        let key = (b.name().scheme().to_string(), b.chrom().to_string(), b.name().amplicon_number());
        groups.entry(key).or_default().push(b);
    }
    debug!("grouped records into {} amplicon candidates", groups.len());

    for ((scheme, chrom, number), members) in groups {
        pair_group(&scheme, &chrom, number, members, &mut out);
    }

    debug!(
        "paired {} amplicons, {} unassigned records, {} rejected groups",
        out.amplicons.len(),
        out.unassigned.len(),
        out.rejections.len()
    );
    out
}

fn pair_group(scheme: &str, chrom: &str, number: u32, mut members: Vec<BedLine>, out: &mut Paired) {
    let amplicon = format!("{}_{}", scheme, number);
    sort_canonical(&mut members);

    // Keep the first occurrence of each name.
    let mut seen = HashSet::new();
    let (mut kept, dups): (Vec<BedLine>, Vec<BedLine>) = members.into_iter().partition(|b| seen.insert(b.name().to_string()));
    for d in dups {
        out.rejections.push(Error::DuplicatePrimer { name: d.name().to_string(), chrom: chrom.to_string() });
        out.unassigned.push(Unassigned::Record(d));
    }

    if let Some(pool) = kept.first().map(BedLine::pool) {
        let (agree, disagree): (Vec<BedLine>, Vec<BedLine>) = kept.into_iter().partition(|b| b.pool() == pool);
        for d in disagree {
            out.rejections.push(Error::PoolConsistency {
                amplicon: amplicon.clone(),
                chrom: chrom.to_string(),
                expected: pool,
                found: d.pool(),
            });
            out.unassigned.push(Unassigned::Record(d));
        }
        kept = agree;
    }

    let (left, right): (Vec<BedLine>, Vec<BedLine>) = kept.into_iter().partition(|b| b.name().side() == PrimerSide::Left);
    let missing = match (left.is_empty(), right.is_empty()) {
        (false, false) => None,
        (true, _) => Some(PrimerSide::Left),
        (false, true) => Some(PrimerSide::Right),
    };
    if let Some(missing) = missing {
        debug!("{} on {}: no {} primer", amplicon, chrom, missing);
        out.rejections.push(Error::UnpairedPrimer { amplicon, chrom: chrom.to_string(), missing });
        out.unassigned.extend(left.into_iter().chain(right).map(Unassigned::Record));
        return;
    }

    let (nl, nr) = (left.len(), right.len());
    match Amplicon::new(left.clone(), right.clone()) {
        Ok(a) => {
            debug!("{} on {}: paired {} LEFT and {} RIGHT in pool {}", amplicon, chrom, nl, nr, a.pool());
            out.amplicons.push(a);
        }
        Err(e) => {
            out.rejections.push(e);
            out.unassigned.extend(left.into_iter().chain(right).map(Unassigned::Record));
        }
    }
}

/// Pair `lines` under `mode`.
///
/// Strict mode returns the first rejection (in group order) as an error.
/// Lenient mode never fails; see [`build_lenient`].
pub fn build(lines: Vec<BedLine>, mode: Mode) -> Result<Paired> {
    match mode {
        Mode::Strict => {
            let mut paired = pair(lines);
            if !paired.rejections.is_empty() {
                return Err(paired.rejections.swap_remove(0));
            }
            Ok(paired)
        }
        Mode::Lenient => Ok(build_lenient(lines)),
    }
}

/// Pair `lines`, moving every rejection into `findings` as an ERROR.
pub fn build_lenient(lines: Vec<BedLine>) -> Paired {
    let mut paired = pair(lines);
    for e in paired.rejections.drain(..) {
        warn!("{}", e);
        paired.findings.push(Finding::from_error(&e));
    }
    paired
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(rows: &[&str]) -> Vec<BedLine> {
        rows.iter().enumerate().map(|(i, r)| BedLine::parse_line(r, i + 1).unwrap()).collect()
    }

    #[test]
    fn pairs_regardless_of_input_order() {
        let rows = [
            "chr1\t300\t320\ts_2_LEFT\t2\t+",
            "chr1\t200\t220\ts_1_RIGHT\t1\t-",
            "chr1\t500\t520\ts_2_RIGHT\t2\t-",
            "chr1\t100\t120\ts_1_LEFT\t1\t+",
        ];
        let a = build(lines(&rows), Mode::Strict).unwrap();
        let mut rev = rows;
        rev.reverse();
        let b = build(lines(&rev), Mode::Strict).unwrap();
        assert_eq!(a.amplicons, b.amplicons);
        assert_eq!(a.amplicons.len(), 2);
        assert!(a.unassigned.is_empty());
        assert!(a.findings.iter().any(|f| f.kind == FindingKind::InputOrder));
    }

    #[test]
    fn strict_reports_unpaired() {
        let e = build(lines(&["chr1\t100\t120\tscheme_1_LEFT\t1\t+"]), Mode::Strict).unwrap_err();
        match e {
            Error::UnpairedPrimer { amplicon, missing, .. } => {
                assert_eq!(amplicon, "scheme_1");
                assert_eq!(missing, PrimerSide::Right);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn lenient_moves_failures_to_unassigned() {
        let p = build(
            lines(&[
                "chr1\t100\t120\ts_1_LEFT\t1\t+",
                "chr1\t300\t320\ts_2_LEFT\t2\t+",
                "chr1\t500\t520\ts_2_RIGHT\t2\t-",
            ]),
            Mode::Lenient,
        )
        .unwrap();
        assert_eq!(p.amplicons.len(), 1);
        assert_eq!(p.unassigned.len(), 1);
        assert!(p.rejections.is_empty());
        assert!(p.findings.iter().any(|f| f.kind == FindingKind::UnpairedPrimer && f.is_error()));
    }

    #[test]
    fn pool_disagreement_unassigns_the_outliers() {
        let rows = [
            "chr1\t100\t120\ts_1_LEFT\t1\t+",
            "chr1\t105\t125\ts_1_LEFT_alt1\t2\t+",
            "chr1\t300\t320\ts_1_RIGHT\t1\t-",
        ];
        let e = build(lines(&rows), Mode::Strict).unwrap_err();
        assert!(matches!(e, Error::PoolConsistency { expected: 1, found: 2, .. }));

        let p = build(lines(&rows), Mode::Lenient).unwrap();
        assert_eq!(p.amplicons.len(), 1);
        assert_eq!(p.amplicons[0].left().len(), 1);
        assert_eq!(p.unassigned.len(), 1);
    }

    #[test]
    fn duplicates_are_rejected() {
        let rows = [
            "chr1\t100\t120\ts_1_LEFT\t1\t+",
            "chr1\t101\t121\ts_1_LEFT\t1\t+",
            "chr1\t300\t320\ts_1_RIGHT\t1\t-",
        ];
        assert!(matches!(build(lines(&rows), Mode::Strict), Err(Error::DuplicatePrimer { .. })));
        let p = build(lines(&rows), Mode::Lenient).unwrap();
        assert_eq!(p.amplicons.len(), 1);
        assert_eq!(p.unassigned.len(), 1);
    }

    #[test]
    fn alternates_share_an_amplicon() {
        let p = build(
            lines(&[
                "chr1\t100\t120\ts_1_LEFT_1\t1\t+",
                "chr1\t102\t124\ts_1_LEFT_2\t1\t+",
                "chr1\t300\t320\ts_1_RIGHT_1\t1\t-",
            ]),
            Mode::Strict,
        )
        .unwrap();
        assert_eq!(p.amplicons[0].left().len(), 2);
        assert_eq!(p.amplicons[0].right().len(), 1);
    }
}
