//! One primer record of a `primer.bed` file.
//!
//! ```text
//! chrom  start  end  name  pool  strand  [sequence  [weight]]
//! ```
//!
//! Coordinates are 0-based half-open. The pool lives in the BED *score*
//! column and is 1-based. Columns past the weight are ignored. Records are immutable; the `with_*` methods return
//! modified copies for the transform engine.
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::str::FromStr;

use bio::alphabets::dna;
use log::debug;

use crate::error::{Error, Result};
use crate::primername::PrimerName;

/// Orientation of a primer on the reference.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn as_char(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.as_char()) }
}

impl FromStr for Strand {
    type Err = String;
    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s {
            "+" => Ok(Self::Forward),
            "-" => Ok(Self::Reverse),
            other => Err(other.to_string()),
        }
    }
}

// Finite and non-negative, so comparing bit patterns is exact.
#[derive(Clone, Copy, Debug)]
struct Weight(f64);

impl PartialEq for Weight {
    fn eq(&self, other: &Self) -> bool { self.0.to_bits() == other.0.to_bits() }
}

impl Eq for Weight {}

impl Hash for Weight {
    fn hash<H: Hasher>(&self, state: &mut H) { self.0.to_bits().hash(state) }
}

/// A validated primer record.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct BedLine {
    chrom: String,
    start: u64,
    end: u64,
    name: PrimerName,
    pool: u32,
    strand: Strand,
    sequence: Option<String>,
    weight: Option<Weight>,
}

impl BedLine {
    /// Build an unweighted record from already-typed parts, enforcing the record invariants.
    pub fn new(
        chrom: &str,
        start: u64,
        end: u64,
        name: PrimerName,
        pool: u32,
        strand: Strand,
        sequence: Option<&str>,
    ) -> Result<Self> {
        let content = || format!("{chrom}\t{start}\t{end}\t{name}\t{pool}\t{strand}");
        if start >= end {
            return Err(Error::Coordinate { line: None, content: content(), reason: format!("start {start} >= end {end}") });
        }
        if pool == 0 {
            return Err(Error::Pool { line: None, content: content(), value: pool.to_string() });
        }
        let sequence = match sequence {
            Some(s) if !s.is_empty() => {
                if !is_iupac(s) {
                    return Err(Error::Sequence { line: None, content: content(), sequence: s.to_string() });
                }
                Some(s.to_ascii_uppercase())
            }
            _ => None,
        };
        Ok(Self { chrom: chrom.to_string(), start, end, name, pool, strand, sequence, weight: None })
    }

    /// Parse one tab-delimited line. `line_no` is 1-based and only used for diagnostics.
    ///
    /// Fields are trimmed, so stray spaces around tabs are tolerated. Header
    /// and blank lines must be filtered by the caller.
    pub fn parse_line(line: &str, line_no: usize) -> Result<Self> {
        let raw = line.trim_end_matches(['\r', '\n']);
        let content = || raw.to_string();
        let fields: Vec<&str> = raw.split('\t').map(str::trim).collect();
        if fields.len() < 6 {
            return Err(Error::LineFormat {
                line: line_no,
                content: content(),
                reason: format!("expected at least 6 tab-separated columns, found {}", fields.len()),
            });
        }
        if fields.len() > 8 {
            debug!("line {}: ignoring {} column(s) past the weight", line_no, fields.len() - 8);
        }

        let chrom = fields[0];
        if chrom.is_empty() {
            return Err(Error::LineFormat { line: line_no, content: content(), reason: "empty chromosome".to_string() });
        }
        let coord = |idx: usize, what: &str| -> Result<i64> {
            fields[idx].parse::<i64>().map_err(|_| Error::LineFormat {
                line: line_no,
                content: content(),
                reason: format!("{} '{}' is not an integer", what, fields[idx]),
            })
        };
        let start = coord(1, "start")?;
        let end = coord(2, "end")?;
        if start < 0 {
            return Err(Error::Coordinate { line: Some(line_no), content: content(), reason: format!("start {start} < 0") });
        }
        if start >= end {
            return Err(Error::Coordinate {
                line: Some(line_no),
                content: content(),
                reason: format!("start {start} >= end {end}"),
            });
        }

        let name = PrimerName::parse(fields[3]).map_err(|e| e.at_line(line_no))?;

        let pool = match fields[4].parse::<u32>() {
            Ok(p) if p >= 1 => p,
            _ => return Err(Error::Pool { line: Some(line_no), content: content(), value: fields[4].to_string() }),
        };
        let strand = fields[5]
            .parse::<Strand>()
            .map_err(|value| Error::Strand { line: line_no, content: content(), value })?;

        let sequence = match fields.get(6) {
            Some(s) if !s.is_empty() => {
                if !is_iupac(s) {
                    return Err(Error::Sequence { line: Some(line_no), content: content(), sequence: s.to_string() });
                }
                Some(s.to_ascii_uppercase())
            }
            _ => None,
        };

        let weight = match fields.get(7) {
            Some(w) if !w.is_empty() => match w.parse::<f64>() {
                Ok(v) if v.is_finite() && v >= 0.0 => Some(Weight(v + 0.0)),
                _ => {
                    return Err(Error::LineFormat {
                        line: line_no,
                        content: content(),
                        reason: format!("weight '{}' is not a non-negative number", w),
                    })
                }
            },
            _ => None,
        };

        Ok(Self { chrom: chrom.to_string(), start: start as u64, end: end as u64, name, pool, strand, sequence, weight })
    }

    #[inline]
    pub fn chrom(&self) -> &str { &self.chrom }
    #[inline]
    pub fn start(&self) -> u64 { self.start }
    #[inline]
    pub fn end(&self) -> u64 { self.end }
    pub fn name(&self) -> &PrimerName { &self.name }
    pub fn pool(&self) -> u32 { self.pool }
    /// 0-based pool index.
    pub fn ipool(&self) -> u32 { self.pool - 1 }
    pub fn strand(&self) -> Strand { self.strand }
    pub fn sequence(&self) -> Option<&str> { self.sequence.as_deref() }
    pub fn weight(&self) -> Option<f64> { self.weight.map(|w| w.0) }
    pub fn length(&self) -> u64 { self.end - self.start }

    /// True when the two records share at least one base on the same chromosome.
    pub fn overlaps(&self, other: &BedLine) -> bool {
        self.chrom == other.chrom && self.start < other.end && other.start < self.end
    }

    pub fn with_chrom(&self, chrom: &str) -> Self {
        Self { chrom: chrom.to_string(), ..self.clone() }
    }

    pub fn with_coords(&self, start: u64, end: u64) -> Result<Self> {
        if start >= end {
            return Err(Error::Coordinate {
                line: None,
                content: self.to_bed(),
                reason: format!("start {start} >= end {end}"),
            });
        }
        Ok(Self { start, end, ..self.clone() })
    }

    pub fn with_name(&self, name: PrimerName) -> Self {
        Self { name, ..self.clone() }
    }

    // Only for callers that already hold a valid pool.
    pub(crate) fn repooled(&self, pool: u32) -> Self {
        Self { pool, ..self.clone() }
    }

    /// Canonical BED line, without trailing newline. The sequence column is
    /// written when there is a sequence or a weight; the weight column only
    /// when there is a weight.
    pub fn to_bed(&self) -> String {
        let mut s = format!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.chrom, self.start, self.end, self.name, self.pool, self.strand
        );
        if self.sequence.is_some() || self.weight.is_some() {
            s.push('\t');
            s.push_str(self.sequence.as_deref().unwrap_or(""));
        }
        if let Some(w) = self.weight {
            s.push_str(&format!("\t{:?}", w.0));
        }
        s
    }

    /// Total canonical order: chromosome, start, end, name; then strand, pool and
    /// sequence so that no two distinct records compare equal.
    pub fn canonical_cmp(&self, other: &BedLine) -> Ordering {
        self.chrom
            .cmp(&other.chrom)
            .then(self.start.cmp(&other.start))
            .then(self.end.cmp(&other.end))
            .then_with(|| self.name.to_string().cmp(&other.name.to_string()))
            .then(self.strand.cmp(&other.strand))
            .then(self.pool.cmp(&other.pool))
            .then_with(|| self.sequence.cmp(&other.sequence))
            .then_with(|| self.weight().partial_cmp(&other.weight()).unwrap_or(Ordering::Equal))
    }
}

impl fmt::Display for BedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.to_bed()) }
}

/// Sort records in place into canonical order.
pub fn sort_canonical(lines: &mut [BedLine]) {
    lines.sort_by(BedLine::canonical_cmp);
}

fn is_iupac(seq: &str) -> bool {
    dna::iupac_alphabet().is_word(seq.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primername::PrimerSide;
    use rstest::rstest;

    #[test]
    fn parses_seven_column_line() {
        let b = BedLine::parse_line("chr1\t100\t200\tscheme_1_LEFT\t1\t+\tacgt", 1).unwrap();
        assert_eq!(b.chrom(), "chr1");
        assert_eq!((b.start(), b.end(), b.length()), (100, 200, 100));
        assert_eq!(b.name().side(), PrimerSide::Left);
        assert_eq!((b.pool(), b.ipool()), (1, 0));
        assert_eq!(b.strand(), Strand::Forward);
        assert_eq!(b.sequence(), Some("ACGT"));
        assert_eq!(b.to_bed(), "chr1\t100\t200\tscheme_1_LEFT\t1\t+\tACGT");
    }

    #[test]
    fn six_columns_and_stray_whitespace() {
        let b = BedLine::parse_line("MN908947.3\t 30 \t54\tSARS-CoV-2_1_left \t2\t+\r\n", 4).unwrap();
        assert_eq!(b.sequence(), None);
        assert_eq!(b.to_bed(), "MN908947.3\t30\t54\tSARS-CoV-2_1_LEFT\t2\t+");
        // empty seventh column is treated as no sequence
        let b = BedLine::parse_line("chr1\t1\t2\ts_1_RIGHT\t1\t-\t", 1).unwrap();
        assert_eq!(b.sequence(), None);
    }

    #[rstest]
    #[case("chr1\t100\t200\ts_1_LEFT\t1", "too few columns")]
    #[case("chr1\t100\t200\ts_1_LEFT\t1\t+\tACGT\theavy", "non-numeric weight")]
    #[case("chr1\t100\t200\ts_1_LEFT\t1\t+\tACGT\t-1.0", "negative weight")]
    #[case("chr1\tabc\t200\ts_1_LEFT\t1\t+", "non-integer start")]
    #[case("\t100\t200\ts_1_LEFT\t1\t+", "empty chromosome")]
    fn line_format_errors(#[case] line: &str, #[case] description: &str) {
        let r = BedLine::parse_line(line, 9);
        assert!(matches!(r, Err(Error::LineFormat { line: 9, .. })), "{description}: {r:?}");
    }

    #[rstest]
    #[case("chr1\t-5\t200\ts_1_LEFT\t1\t+")]
    #[case("chr1\t200\t200\ts_1_LEFT\t1\t+")]
    #[case("chr1\t300\t200\ts_1_LEFT\t1\t+")]
    fn coordinate_errors(#[case] line: &str) {
        assert!(matches!(BedLine::parse_line(line, 2), Err(Error::Coordinate { line: Some(2), .. })));
    }

    #[rstest]
    #[case("0")]
    #[case("-1")]
    #[case("one")]
    #[case("1.5")]
    fn pool_errors(#[case] pool: &str) {
        let line = format!("chr1\t1\t20\ts_1_LEFT\t{pool}\t+");
        assert!(matches!(BedLine::parse_line(&line, 1), Err(Error::Pool { .. })));
    }

    #[test]
    fn strand_sequence_and_name_errors() {
        let r = BedLine::parse_line("chr1\t1\t20\ts_1_LEFT\t1\t.", 1);
        assert!(matches!(r, Err(Error::Strand { ref value, .. }) if value == "."));
        let r = BedLine::parse_line("chr1\t1\t20\ts_1_LEFT\t1\t+\tACGTZ", 1);
        assert!(matches!(r, Err(Error::Sequence { .. })));
        let r = BedLine::parse_line("chr1\t1\t20\tnot-a-primer\t1\t+", 5);
        assert!(matches!(r, Err(Error::NameFormat { line: Some(5), .. })));
    }

    #[rstest]
    #[case("chr1\t100\t200\ts_1_LEFT\t1\t+\tACGT\t1.0", Some(1.0), "chr1\t100\t200\ts_1_LEFT\t1\t+\tACGT\t1.0")]
    #[case("chr1\t100\t200\ts_1_LEFT\t1\t+\tACGT\t0.25\tnote", Some(0.25), "chr1\t100\t200\ts_1_LEFT\t1\t+\tACGT\t0.25")]
    #[case("chr1\t100\t200\ts_1_LEFT\t1\t+\t\t2", Some(2.0), "chr1\t100\t200\ts_1_LEFT\t1\t+\t\t2.0")]
    #[case("chr1\t100\t200\ts_1_LEFT\t1\t+\tACGT\t", None, "chr1\t100\t200\ts_1_LEFT\t1\t+\tACGT")]
    fn weight_column(#[case] line: &str, #[case] weight: Option<f64>, #[case] bed: &str) {
        let b = BedLine::parse_line(line, 1).unwrap();
        assert_eq!(b.weight(), weight);
        assert_eq!(b.to_bed(), bed);
        assert_eq!(BedLine::parse_line(bed, 1).unwrap(), b);
    }

    #[test]
    fn degenerate_bases_are_accepted() {
        let b = BedLine::parse_line("chr1\t1\t20\ts_1_LEFT\t1\t+\tACGTRYSWKMBDHVN", 1).unwrap();
        assert_eq!(b.sequence(), Some("ACGTRYSWKMBDHVN"));
    }

    #[test]
    fn canonical_order_breaks_ties_by_name() {
        let a = BedLine::parse_line("chr1\t100\t120\ts_1_LEFT_alt1\t1\t+", 1).unwrap();
        let b = BedLine::parse_line("chr1\t100\t120\ts_1_LEFT\t1\t+", 2).unwrap();
        let c = BedLine::parse_line("chr1\t90\t130\ts_1_LEFT_2\t1\t+", 3).unwrap();
        let d = BedLine::parse_line("MN1\t900\t930\ts_2_LEFT\t1\t+", 4).unwrap();
        let mut v = vec![a.clone(), b.clone(), c.clone(), d.clone()];
        sort_canonical(&mut v);
        assert_eq!(v, vec![d, c, b, a]);
    }

    #[test]
    fn builders_keep_invariants() {
        let b = BedLine::parse_line("chr1\t100\t120\ts_1_LEFT\t1\t+", 1).unwrap();
        assert_eq!(b.with_chrom("NC_1").chrom(), "NC_1");
        let e = b.with_coords(120, 120).unwrap_err();
        assert!(matches!(e, Error::Coordinate { line: None, .. }));
        assert!(!e.to_string().starts_with("line"));
        assert!(BedLine::new("chr1", 1, 20, b.name().clone(), 0, Strand::Forward, None).is_err());
        let other = BedLine::parse_line("chr1\t119\t140\ts_2_LEFT\t1\t+", 2).unwrap();
        assert!(b.overlaps(&other));
        assert!(!b.overlaps(&other.with_coords(120, 140).unwrap()));
    }
}
