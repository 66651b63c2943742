//! Paired primers for one genomic target.
//!
//! An [`Amplicon`] owns every LEFT and RIGHT record that shares a scheme
//! name, chromosome and amplicon number. Alternate oligos for the same site
//! are kept side by side. The constructor checks membership and pool
//! agreement; the insert-span rule is left to the validator so that
//! short-amplicon schemes can still be loaded.
use std::collections::HashSet;

use crate::bedline::{sort_canonical, BedLine};
use crate::error::{Error, Result};
use crate::primername::PrimerSide;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Amplicon {
    scheme: String,
    chrom: String,
    number: u32,
    pool: u32,
    left: Vec<BedLine>,
    right: Vec<BedLine>,
}

impl Amplicon {
    /// Pair LEFT and RIGHT records into one amplicon.
    ///
    /// Both lists are sorted into canonical order. The pool of the first
    /// record (canonically) is the amplicon's pool; any other value is a
    /// [`Error::PoolConsistency`].
    pub fn new(mut left: Vec<BedLine>, mut right: Vec<BedLine>) -> Result<Self> {
        sort_canonical(&mut left);
        sort_canonical(&mut right);

        let first = match (left.first(), right.first()) {
            (Some(l), Some(r)) => if l.canonical_cmp(r).is_le() { l.clone() } else { r.clone() },
            (Some(l), None) => l.clone(),
            (None, Some(r)) => r.clone(),
            (None, None) => {
                return Err(Error::UnpairedPrimer { amplicon: "<empty>".into(), chrom: "<empty>".into(), missing: PrimerSide::Left })
            }
        };
        let scheme = first.name().scheme().to_string();
        let number = first.name().amplicon_number();
        let chrom = first.chrom().to_string();
        let amplicon = first.name().amplicon_name();

        if left.is_empty() {
            return Err(Error::UnpairedPrimer { amplicon, chrom, missing: PrimerSide::Left });
        }
        if right.is_empty() {
            return Err(Error::UnpairedPrimer { amplicon, chrom, missing: PrimerSide::Right });
        }

        let pool = first.pool();
        for (expected_side, b) in left.iter().map(|b| (PrimerSide::Left, b)).chain(right.iter().map(|b| (PrimerSide::Right, b))) {
            if b.name().side() != expected_side
                || b.name().scheme() != scheme
                || b.name().amplicon_number() != number
                || b.chrom() != chrom
            {
                return Err(Error::NameFormat {
                    name: b.name().to_string(),
                    reason: format!("does not belong to {} {} on {}", amplicon, expected_side, chrom),
                    line: None,
                });
            }
            if b.pool() != pool {
                return Err(Error::PoolConsistency { amplicon, chrom, expected: pool, found: b.pool() });
            }
        }
        let mut seen = HashSet::new();
        if let Some(dup) = left.iter().chain(right.iter()).find(|b| !seen.insert(b.name())) {
            return Err(Error::DuplicatePrimer { name: dup.name().to_string(), chrom });
        }

        Ok(Self { scheme, chrom, number, pool, left, right })
    }

    pub fn scheme(&self) -> &str { &self.scheme }
    pub fn chrom(&self) -> &str { &self.chrom }
    pub fn number(&self) -> u32 { self.number }
    pub fn pool(&self) -> u32 { self.pool }
    /// 0-based pool index.
    pub fn ipool(&self) -> u32 { self.pool - 1 }
    pub fn left(&self) -> &[BedLine] { &self.left }
    pub fn right(&self) -> &[BedLine] { &self.right }

    /// `<scheme>_<number>`.
    pub fn name(&self) -> String { format!("{}_{}", self.scheme, self.number) }

    /// Every member record, LEFT first.
    pub fn primers(&self) -> impl Iterator<Item = &BedLine> { self.left.iter().chain(self.right.iter()) }

    /// Move every member to `pool`, which must be >= 1.
    pub(crate) fn repool(&self, pool: u32) -> Self {
        let f = |b: &BedLine| b.repooled(pool);
        Self {
            pool,
            left: self.left.iter().map(f).collect(),
            right: self.right.iter().map(f).collect(),
            ..self.clone()
        }
    }

    /// Outer bounds: first LEFT base to last RIGHT base. For a circular
    /// amplicon the start is greater than the end and the span wraps through
    /// the origin.
    pub fn amplicon_start(&self) -> u64 { self.left.iter().map(BedLine::start).min().unwrap_or(0) }
    pub fn amplicon_end(&self) -> u64 { self.right.iter().map(BedLine::end).max().unwrap_or(0) }

    /// Insert between the primers: `[max LEFT end, min RIGHT start)`. Wraps
    /// like the outer bounds when the amplicon is circular.
    pub fn insert_start(&self) -> u64 { self.left.iter().map(BedLine::end).max().unwrap_or(0) }
    pub fn insert_end(&self) -> u64 { self.right.iter().map(BedLine::start).min().unwrap_or(0) }

    /// True when every LEFT primer lies downstream of every RIGHT primer,
    /// i.e. the amplicon spans the origin of a circular reference.
    pub fn is_circular(&self) -> bool { self.amplicon_start() >= self.amplicon_end() }

    /// True when no LEFT primer reaches past the first RIGHT primer, or the
    /// amplicon is circular.
    pub fn has_insert(&self) -> bool { self.is_circular() || self.insert_start() <= self.insert_end() }

    /// `chrom, amplicon_start, amplicon_end, name, pool`.
    pub fn to_amplicon_str(&self) -> String {
        format!("{}\t{}\t{}\t{}\t{}", self.chrom, self.amplicon_start(), self.amplicon_end(), self.name(), self.pool)
    }

    /// `chrom, insert_start, insert_end, name, pool`: the region left after primer trimming.
    pub fn to_primertrim_str(&self) -> String {
        format!("{}\t{}\t{}\t{}\t{}", self.chrom, self.insert_start(), self.insert_end(), self.name(), self.pool)
    }
}
