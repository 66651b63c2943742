//! A whole primer scheme: headers, amplicons and anything that could not be paired.
use core::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::amplicon::Amplicon;
use crate::bedline::BedLine;

/// A record the pairer could not place in an amplicon.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Unassigned {
    /// A valid primer whose amplicon group was incomplete or inconsistent.
    Record(BedLine),
    /// An input line that did not parse; kept verbatim for reporting.
    Raw { line: usize, content: String },
}

/// Ordered collection of amplicons for one reference context.
///
/// Schemes are values: transforms build new ones and never edit in place.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Scheme {
    headers: Vec<String>,
    amplicons: Vec<Amplicon>,
    unassigned: Vec<Unassigned>,
}

/// Amplicon order inside a scheme: number, then chromosome, then scheme name.
pub fn amplicon_order(a: &Amplicon, b: &Amplicon) -> Ordering {
    a.number()
        .cmp(&b.number())
        .then_with(|| a.chrom().cmp(b.chrom()))
        .then_with(|| a.scheme().cmp(b.scheme()))
}

impl Scheme {
    /// Assemble a scheme exactly as given; no sorting is applied.
    pub fn new(headers: Vec<String>, amplicons: Vec<Amplicon>, unassigned: Vec<Unassigned>) -> Self {
        Self { headers, amplicons, unassigned }
    }

    /// Assemble a scheme and put amplicons and unassigned records in canonical order.
    pub fn canonical(headers: Vec<String>, mut amplicons: Vec<Amplicon>, mut unassigned: Vec<Unassigned>) -> Self {
        amplicons.sort_by(amplicon_order);
        unassigned.sort_by(|a, b| match (a, b) {
            (Unassigned::Record(x), Unassigned::Record(y)) => x.canonical_cmp(y),
            (Unassigned::Record(_), Unassigned::Raw { .. }) => Ordering::Less,
            (Unassigned::Raw { .. }, Unassigned::Record(_)) => Ordering::Greater,
            (Unassigned::Raw { line: x, .. }, Unassigned::Raw { line: y, .. }) => x.cmp(y),
        });
        Self { headers, amplicons, unassigned }
    }

    pub fn headers(&self) -> &[String] { &self.headers }
    pub fn amplicons(&self) -> &[Amplicon] { &self.amplicons }
    pub fn unassigned(&self) -> &[Unassigned] { &self.unassigned }

    /// `#key=value` headers as a map. Surrounding whitespace is trimmed, headers
    /// without `=` are skipped and a repeated key keeps its last value.
    pub fn header_map(&self) -> BTreeMap<String, String> {
        self.headers
            .iter()
            .filter_map(|h| h.trim_start_matches('#').split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, _)| !k.is_empty())
            .collect()
    }

    /// Unassigned entries that are still valid records.
    pub fn unassigned_records(&self) -> impl Iterator<Item = &BedLine> {
        self.unassigned.iter().filter_map(|u| match u {
            Unassigned::Record(b) => Some(b),
            Unassigned::Raw { .. } => None,
        })
    }

    /// Every record (paired and unassigned) in canonical order.
    pub fn bedlines(&self) -> Vec<&BedLine> {
        let mut v: Vec<&BedLine> = self.amplicons.iter().flat_map(|a| a.primers()).chain(self.unassigned_records()).collect();
        v.sort_by(|a, b| a.canonical_cmp(b));
        v
    }

    pub fn chromosomes(&self) -> BTreeSet<&str> { self.amplicons.iter().map(Amplicon::chrom).collect() }
    pub fn pools(&self) -> BTreeSet<u32> { self.amplicons.iter().map(Amplicon::pool).collect() }
    pub fn pool_count(&self) -> usize { self.pools().len() }

    /// Look up one amplicon by chromosome and number.
    pub fn amplicon(&self, chrom: &str, number: u32) -> Option<&Amplicon> {
        self.amplicons.iter().find(|a| a.chrom() == chrom && a.number() == number)
    }
}
