//! Scheme-to-scheme rewrites.
//!
//! Every function here borrows a [`Scheme`] and returns a new one. None of
//! them accept partial results: the first record that cannot be rewritten
//! aborts the whole transform.
use std::collections::{BTreeMap, HashMap, HashSet};

use log::{debug, info};

use crate::amplicon::Amplicon;
use crate::bedline::BedLine;
use crate::error::{Error, Result};
use crate::primername::PrimerName;
use crate::scheme::{Scheme, Unassigned};

/// What to do with a chromosome that has no entry in the rename map.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Unmapped {
    /// Fail with [`Error::Remap`].
    #[default]
    Fail,
    /// Keep the current name.
    Identity,
}

/// Chromosome renaming and coordinate shifting.
#[derive(Clone, Debug, Default)]
pub struct RemapOptions {
    pub chroms: HashMap<String, String>,
    /// Added to every start and end.
    pub offset: i64,
    pub unmapped: Unmapped,
}

/// How [`merge`] resolves amplicons present in both inputs.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MergePolicy {
    /// Reject any (chromosome, amplicon number) present in both schemes.
    #[default]
    Fail,
    /// Shift every amplicon number of the second scheme past the first's maximum.
    Offset,
    /// Renumber the union with [`renumber_amplicons`].
    Renumber,
}

impl std::str::FromStr for MergePolicy {
    type Err = String;
    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "offset" => Ok(Self::Offset),
            "renumber" => Ok(Self::Renumber),
            other => Err(format!("Unknown merge policy: {}", other)),
        }
    }
}

/// Rename chromosomes and shift coordinates.
pub fn remap(scheme: &Scheme, opts: &RemapOptions) -> Result<Scheme> {
    let remap_line = |b: &BedLine| -> Result<BedLine> {
        let chrom = match (opts.chroms.get(b.chrom()), opts.unmapped) {
            (Some(c), _) => c.as_str(),
            (None, Unmapped::Identity) => b.chrom(),
            (None, Unmapped::Fail) => {
                return Err(Error::Remap { reason: format!("chromosome '{}' is not in the mapping", b.chrom()) })
            }
        };
        let shift = |v: u64| -> Result<u64> {
            let shifted = i64::try_from(v).ok().and_then(|v| v.checked_add(opts.offset)).ok_or_else(|| Error::Remap {
                reason: format!("{} at {}:{} cannot be shifted by {}", b.name(), b.chrom(), v, opts.offset),
            })?;
            u64::try_from(shifted).map_err(|_| Error::Remap {
                reason: format!("{} at {}:{} would move to negative coordinate {}", b.name(), b.chrom(), v, shifted),
            })
        };
        b.with_chrom(chrom).with_coords(shift(b.start())?, shift(b.end())?)
    };

    let amplicons = scheme
        .amplicons()
        .iter()
        .map(|a| map_members(a, &remap_line))
        .collect::<Result<Vec<_>>>()?;
    let unassigned = scheme
        .unassigned()
        .iter()
        .map(|u| match u {
            Unassigned::Record(b) => remap_line(b).map(Unassigned::Record),
            raw => Ok(raw.clone()),
        })
        .collect::<Result<Vec<_>>>()?;

    info!("remapped {} amplicons (offset {})", amplicons.len(), opts.offset);
    Ok(Scheme::canonical(scheme.headers().to_vec(), amplicons, unassigned))
}

/// Renumber pools to `1..k`, keeping which amplicons share a pool.
///
/// Pools are ranked by first appearance over amplicons sorted by (pool,
/// number). Unassigned records in pools no amplicon uses are numbered after.
pub fn renumber_pools(scheme: &Scheme) -> Scheme {
    let mut order: Vec<&Amplicon> = scheme.amplicons().iter().collect();
    order.sort_by_key(|a| (a.pool(), a.number()));

    let mut mapping: HashMap<u32, u32> = HashMap::new();
    let old_pools = order.iter().map(|a| a.pool()).chain(scheme.unassigned_records().map(BedLine::pool));
    for p in old_pools {
        let next = mapping.len() as u32 + 1;
        mapping.entry(p).or_insert(next);
    }
    let new_pool = |p: u32| mapping.get(&p).copied().unwrap_or(p);
    debug!("pool mapping: {:?}", mapping);

    let amplicons = scheme.amplicons().iter().map(|a| a.repool(new_pool(a.pool()))).collect();
    let unassigned = scheme
        .unassigned()
        .iter()
        .map(|u| match u {
            Unassigned::Record(b) => Unassigned::Record(b.repooled(new_pool(b.pool()))),
            raw => raw.clone(),
        })
        .collect();
    Scheme::canonical(scheme.headers().to_vec(), amplicons, unassigned)
}

/// Number amplicons `1..n` in genomic order across the whole scheme.
///
/// Order is (chromosome, amplicon start, amplicon end, old number, scheme
/// name). Member names are re-encoded with the new number. Unassigned
/// records are numbered after `n`, see [`renumber_unassigned`].
pub fn renumber_amplicons(scheme: &Scheme) -> Result<Scheme> {
    let amplicons = renumbered(scheme.amplicons().iter())?;
    let unassigned = renumber_unassigned(scheme.unassigned().iter(), amplicons.len())?;
    info!("renumbered {} amplicons", amplicons.len());
    Ok(Scheme::canonical(scheme.headers().to_vec(), amplicons, unassigned))
}

/// Give unassigned records the numbers following `after`, one per former
/// (chromosome, amplicon number, scheme) group in that order. Records that
/// shared an amplicon keep sharing one.
fn renumber_unassigned<'a>(unassigned: impl Iterator<Item = &'a Unassigned>, after: usize) -> Result<Vec<Unassigned>> {
    let unassigned: Vec<&Unassigned> = unassigned.collect();
    let mut groups: BTreeMap<(&str, u32, &str), u32> = BTreeMap::new();
    for &u in &unassigned {
        if let Unassigned::Record(b) = u {
            groups.insert((b.chrom(), b.name().amplicon_number(), b.name().scheme()), 0);
        }
    }
    for (i, ((_, old, scheme), number)) in groups.iter_mut().enumerate() {
        *number = u32::try_from(after + i + 1).map_err(|_| Error::NameFormat {
            name: format!("{}_{}", scheme, old),
            reason: "too many amplicons to renumber".to_string(),
            line: None,
        })?;
    }
    unassigned
        .into_iter()
        .map(|u| match u {
            Unassigned::Record(b) => {
                let number = groups[&(b.chrom(), b.name().amplicon_number(), b.name().scheme())];
                Ok(Unassigned::Record(b.with_name(b.name().with_amplicon_number(number)?)))
            }
            raw => Ok(raw.clone()),
        })
        .collect()
}

fn renumbered<'a>(amplicons: impl Iterator<Item = &'a Amplicon>) -> Result<Vec<Amplicon>> {
    let mut order: Vec<&Amplicon> = amplicons.collect();
    order.sort_by(|a, b| {
        a.chrom()
            .cmp(b.chrom())
            .then(a.amplicon_start().cmp(&b.amplicon_start()))
            .then(a.amplicon_end().cmp(&b.amplicon_end()))
            .then(a.number().cmp(&b.number()))
            .then_with(|| a.scheme().cmp(b.scheme()))
    });
    order
        .into_iter()
        .enumerate()
        .map(|(i, a)| {
            let number = u32::try_from(i + 1).map_err(|_| Error::NameFormat {
                name: a.name(),
                reason: "too many amplicons to renumber".to_string(),
                line: None,
            })?;
            with_number(a, number)
        })
        .collect()
}

fn shifted_number(number: u32, shift: u32, name: String) -> Result<u32> {
    number.checked_add(shift).ok_or_else(|| Error::NameFormat {
        name,
        reason: format!("amplicon number overflows when shifted by {}", shift),
        line: None,
    })
}

fn with_number(a: &Amplicon, number: u32) -> Result<Amplicon> {
    map_members(a, |b| Ok(b.with_name(b.name().with_amplicon_number(number)?)))
}

/// Combine two schemes.
///
/// Headers are concatenated with duplicates dropped. Unassigned entries of
/// both inputs are kept and take part in collision handling like amplicons.
pub fn merge(a: &Scheme, b: &Scheme, policy: MergePolicy) -> Result<Scheme> {
    let mut headers = a.headers().to_vec();
    for h in b.headers() {
        if !headers.contains(h) {
            headers.push(h.clone());
        }
    }
    // (chromosome, amplicon number) of every amplicon and unassigned record.
    let numbered = |s: &Scheme| -> Vec<(String, u32)> {
        s.amplicons()
            .iter()
            .map(|x| (x.chrom().to_string(), x.number()))
            .chain(s.unassigned_records().map(|r| (r.chrom().to_string(), r.name().amplicon_number())))
            .collect()
    };

    let (amplicons, unassigned) = match policy {
        MergePolicy::Fail => {
            let taken: HashSet<(String, u32)> = numbered(a).into_iter().collect();
            if let Some((chrom, amplicon_number)) = numbered(b).into_iter().find(|k| taken.contains(k)) {
                return Err(Error::MergeConflict { chrom, amplicon_number });
            }
            let amplicons = a.amplicons().iter().chain(b.amplicons()).cloned().collect();
            (amplicons, a.unassigned().iter().chain(b.unassigned()).cloned().collect())
        }
        MergePolicy::Offset => {
            let shift = numbered(a).into_iter().map(|(_, n)| n).max().unwrap_or(0);
            let mut amplicons = a.amplicons().to_vec();
            for x in b.amplicons() {
                amplicons.push(with_number(x, shifted_number(x.number(), shift, x.name())?)?);
            }
            let mut unassigned = a.unassigned().to_vec();
            for u in b.unassigned() {
                unassigned.push(match u {
                    Unassigned::Record(r) => {
                        let number = shifted_number(r.name().amplicon_number(), shift, r.name().to_string())?;
                        let name = r.name().with_amplicon_number(number)?;
                        Unassigned::Record(r.with_name(name))
                    }
                    raw => raw.clone(),
                });
            }
            (amplicons, unassigned)
        }
        MergePolicy::Renumber => {
            let amplicons = renumbered(a.amplicons().iter().chain(b.amplicons()))?;
            let unassigned = renumber_unassigned(a.unassigned().iter().chain(b.unassigned()), amplicons.len())?;
            (amplicons, unassigned)
        }
    };

    info!("merged {} + {} amplicons with policy {:?}", a.amplicons().len(), b.amplicons().len(), policy);
    Ok(Scheme::canonical(headers, amplicons, unassigned))
}

/// Collapse each amplicon side to a single primer spanning all its alternates.
///
/// The merged primer keeps the longest sequence and is named
/// `<scheme>_<n>_<SIDE>_1`.
pub fn merge_primers(scheme: &Scheme) -> Result<Scheme> {
    let collapse = |a: &Amplicon, side: &[BedLine]| -> Result<BedLine> {
        let first = &side[0];
        let start = side.iter().map(BedLine::start).min().unwrap_or(first.start());
        let end = side.iter().map(BedLine::end).max().unwrap_or(first.end());
        // Longest wins; the first of equal length is kept.
        let sequence = side
            .iter()
            .filter_map(BedLine::sequence)
            .fold(None, |best: Option<&str>, s| match best {
                Some(b) if b.len() >= s.len() => Some(b),
                _ => Some(s),
            });
        let side_kind = first.name().side();
        let name = PrimerName::new(a.scheme(), a.number(), side_kind, Some("1"))?;
        BedLine::new(a.chrom(), start, end, name, a.pool(), side_kind.expected_strand(), sequence)
    };
    let amplicons = scheme
        .amplicons()
        .iter()
        .map(|a| Amplicon::new(vec![collapse(a, a.left())?], vec![collapse(a, a.right())?]))
        .collect::<Result<Vec<_>>>()?;
    Ok(Scheme::canonical(scheme.headers().to_vec(), amplicons, scheme.unassigned().to_vec()))
}

/// Rename primers to the V2 convention: `_1`, `_2`, ... per amplicon side,
/// ordered by sequence.
pub fn update_primernames(scheme: &Scheme) -> Result<Scheme> {
    rename_alternates(scheme, |i| Some((i + 1).to_string()))
}

/// Rename primers to the V1 convention: no suffix for the first primer of
/// each side, `_alt1`, `_alt2`, ... for the rest.
pub fn downgrade_primernames(scheme: &Scheme) -> Result<Scheme> {
    rename_alternates(scheme, |i| (i > 0).then(|| format!("alt{}", i)))
}

fn rename_alternates(scheme: &Scheme, suffix: impl Fn(usize) -> Option<String>) -> Result<Scheme> {
    let rename = |side: &[BedLine]| -> Result<Vec<BedLine>> {
        let mut ordered: Vec<&BedLine> = side.iter().collect();
        ordered.sort_by(|x, y| x.sequence().cmp(&y.sequence()).then_with(|| x.canonical_cmp(y)));
        ordered
            .into_iter()
            .enumerate()
            .map(|(i, b)| Ok(b.with_name(b.name().with_alt(suffix(i).as_deref())?)))
            .collect()
    };
    let amplicons = scheme
        .amplicons()
        .iter()
        .map(|a| Amplicon::new(rename(a.left())?, rename(a.right())?))
        .collect::<Result<Vec<_>>>()?;
    Ok(Scheme::canonical(scheme.headers().to_vec(), amplicons, scheme.unassigned().to_vec()))
}

// Rebuild an amplicon from rewritten members so its invariants are rechecked.
fn map_members(a: &Amplicon, f: impl Fn(&BedLine) -> Result<BedLine>) -> Result<Amplicon> {
    let left = a.left().iter().map(&f).collect::<Result<Vec<_>>>()?;
    let right = a.right().iter().map(&f).collect::<Result<Vec<_>>>()?;
    Amplicon::new(left, right)
}

/// Summary of how many amplicons each pool holds, for logging.
pub fn pool_sizes(scheme: &Scheme) -> BTreeMap<u32, usize> {
    let mut sizes = BTreeMap::new();
    for a in scheme.amplicons() {
        *sizes.entry(a.pool()).or_insert(0) += 1;
    }
    sizes
}
