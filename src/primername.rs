//! Structured primer names: `<scheme>_<amplicon>_<side>[_<alt>]`.
//!
//! Two suffix conventions are in circulation:
//! - **V1**: no suffix, or `_alt`/`_alt<N>` for alternate oligos (`SARS-CoV-2_5_LEFT_alt1`).
//! - **V2**: a numeric suffix on every primer (`SARS-CoV-2_5_LEFT_1`).
//!
//! Parsing accepts both (plus a few side aliases) and always re-renders the
//! canonical spelling, so names that leave this crate are accepted by the
//! rest of the primalscheme/ARTIC tooling.
//!
//! # Examples
//! ```
//! use primalbed::primername::{PrimerName, PrimerSide, PrimerNameVersion};
//! let n = PrimerName::parse("nCoV-2019_12_r_ALT2").unwrap();
//! assert_eq!(n.amplicon_number(), 12);
//! assert_eq!(n.side(), PrimerSide::Right);
//! assert_eq!(n.to_string(), "nCoV-2019_12_RIGHT_alt2");
//! assert_eq!(n.version(), PrimerNameVersion::V1);
//! ```
use core::fmt;
use core::str::FromStr;

use crate::bedline::Strand;
use crate::error::{Error, Result};

/// Which end of the amplicon a primer sits on.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum PrimerSide {
    /// Forward primer, upstream of the insert.
    Left,
    /// Reverse primer, downstream of the insert.
    Right,
}

impl PrimerSide {
    /// Strand a primer on this side is expected to carry.
    pub fn expected_strand(self) -> Strand {
        match self {
            PrimerSide::Left => Strand::Forward,
            PrimerSide::Right => Strand::Reverse,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PrimerSide::Left => "LEFT",
            PrimerSide::Right => "RIGHT",
        }
    }
}

impl fmt::Display for PrimerSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for PrimerSide {
    type Err = String;
    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LEFT" | "L" | "F" | "FWD" | "FORWARD" => Ok(Self::Left),
            "RIGHT" | "R" | "REV" | "REVERSE" => Ok(Self::Right),
            other => Err(format!("unknown primer side '{}'", other)),
        }
    }
}

/// Suffix convention a name follows.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PrimerNameVersion {
    /// No suffix, or `alt[N]`.
    V1,
    /// Numeric suffix.
    V2,
    /// Any other alphanumeric suffix; accepted but not one of the published conventions.
    Other,
}

/// A decoded primer name.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct PrimerName {
    scheme: String,
    amplicon_number: u32,
    side: PrimerSide,
    alt: Option<String>,
}

impl PrimerName {
    /// Build a name from parts, checking each part against the grammar.
    pub fn new(scheme: &str, amplicon_number: u32, side: PrimerSide, alt: Option<&str>) -> Result<Self> {
        let fail = |reason: String| Error::NameFormat {
            name: format!("{}_{}_{}{}", scheme, amplicon_number, side, alt.map(|a| format!("_{a}")).unwrap_or_default()),
            reason,
            line: None,
        };
        check_scheme(scheme).map_err(fail)?;
        if amplicon_number == 0 {
            return Err(fail("amplicon number must be >= 1".to_string()));
        }
        let alt = match alt {
            Some(a) => Some(canonical_alt(a).map_err(fail)?),
            None => None,
        };
        Ok(Self { scheme: scheme.to_string(), amplicon_number, side, alt })
    }

    /// Parse a raw name field.
    pub fn parse(raw: &str) -> Result<Self> {
        let name = raw.trim();
        let fail = |reason: &str| Error::NameFormat { name: name.to_string(), reason: reason.to_string(), line: None };

        let parts: Vec<&str> = name.split('_').collect();
        if parts.len() < 3 {
            return Err(fail("expected <scheme>_<amplicon>_<LEFT|RIGHT>[_<alt>]"));
        }
        if parts.len() > 4 {
            return Err(fail("too many '_' separated fields"));
        }
        check_scheme(parts[0]).map_err(|r| fail(&r))?;

        let number = parts[1];
        if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(fail("amplicon number must be a positive integer"));
        }
        let amplicon_number: u32 = number.parse().map_err(|_| fail("amplicon number out of range"))?;
        if amplicon_number == 0 {
            return Err(fail("amplicon number must be >= 1"));
        }

        let side = parts[2].parse::<PrimerSide>().map_err(|e: String| fail(&e))?;
        let alt = match parts.get(3) {
            Some(a) => Some(canonical_alt(a).map_err(|r| fail(&r))?),
            None => None,
        };

        Ok(Self { scheme: parts[0].to_string(), amplicon_number, side, alt })
    }

    pub fn scheme(&self) -> &str { &self.scheme }
    pub fn amplicon_number(&self) -> u32 { self.amplicon_number }
    pub fn side(&self) -> PrimerSide { self.side }
    pub fn alt(&self) -> Option<&str> { self.alt.as_deref() }

    /// `<scheme>_<amplicon>`, the name shared by every primer of one amplicon.
    pub fn amplicon_name(&self) -> String { format!("{}_{}", self.scheme, self.amplicon_number) }

    /// Which suffix convention this name follows.
    pub fn version(&self) -> PrimerNameVersion {
        match self.alt.as_deref() {
            None => PrimerNameVersion::V1,
            Some(a) if a.bytes().all(|b| b.is_ascii_digit()) => PrimerNameVersion::V2,
            Some(a) if a.starts_with("alt") && a[3..].bytes().all(|b| b.is_ascii_digit()) => PrimerNameVersion::V1,
            Some(_) => PrimerNameVersion::Other,
        }
    }

    /// Same name with a different amplicon number.
    pub fn with_amplicon_number(&self, amplicon_number: u32) -> Result<Self> {
        Self::new(&self.scheme, amplicon_number, self.side, self.alt.as_deref())
    }

    /// Same name with a different (or no) alt suffix.
    pub fn with_alt(&self, alt: Option<&str>) -> Result<Self> {
        Self::new(&self.scheme, self.amplicon_number, self.side, alt)
    }
}

impl fmt::Display for PrimerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.scheme, self.amplicon_number, self.side)?;
        if let Some(alt) = &self.alt {
            write!(f, "_{}", alt)?;
        }
        Ok(())
    }
}

impl FromStr for PrimerName {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

fn check_scheme(scheme: &str) -> core::result::Result<(), String> {
    if scheme.is_empty() {
        return Err("scheme name is empty".to_string());
    }
    if !scheme.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return Err(format!("scheme name '{}' may only contain letters, digits and '-'", scheme));
    }
    Ok(())
}

// `ALT2`/`Alt2` -> `alt2`; anything else alphanumeric is kept verbatim.
fn canonical_alt(alt: &str) -> core::result::Result<String, String> {
    if alt.is_empty() || !alt.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(format!("alt suffix '{}' must be alphanumeric", alt));
    }
    if alt.len() >= 3 && alt[..3].eq_ignore_ascii_case("alt") && alt[3..].bytes().all(|b| b.is_ascii_digit()) {
        return Ok(format!("alt{}", &alt[3..]));
    }
    Ok(alt.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("scheme_1_LEFT", "scheme", 1, PrimerSide::Left, None, "scheme_1_LEFT")]
    #[case("SARS-CoV-2_5_RIGHT", "SARS-CoV-2", 5, PrimerSide::Right, None, "SARS-CoV-2_5_RIGHT")]
    #[case("test_3_LEFT_alt1", "test", 3, PrimerSide::Left, Some("alt1"), "test_3_LEFT_alt1")]
    #[case("test_3_left_ALT", "test", 3, PrimerSide::Left, Some("alt"), "test_3_LEFT_alt")]
    #[case("test_4_RIGHT_2", "test", 4, PrimerSide::Right, Some("2"), "test_4_RIGHT_2")]
    #[case("test_10_F", "test", 10, PrimerSide::Left, None, "test_10_LEFT")]
    #[case("test_10_r", "test", 10, PrimerSide::Right, None, "test_10_RIGHT")]
    #[case("  test_007_L  ", "test", 7, PrimerSide::Left, None, "test_7_LEFT")]
    fn parses_valid_names(
        #[case] raw: &str,
        #[case] scheme: &str,
        #[case] number: u32,
        #[case] side: PrimerSide,
        #[case] alt: Option<&str>,
        #[case] canonical: &str,
    ) {
        let n = PrimerName::parse(raw).unwrap();
        assert_eq!(n.scheme(), scheme);
        assert_eq!(n.amplicon_number(), number);
        assert_eq!(n.side(), side);
        assert_eq!(n.alt(), alt);
        assert_eq!(n.to_string(), canonical);
        // canonical output parses back to the same value
        assert_eq!(PrimerName::parse(&n.to_string()).unwrap(), n);
    }

    #[rstest]
    #[case("", "empty")]
    #[case("scheme_1", "missing side")]
    #[case("scheme_x_LEFT", "non-numeric amplicon")]
    #[case("scheme_0_LEFT", "zero amplicon")]
    #[case("scheme_-1_LEFT", "negative amplicon")]
    #[case("scheme_+1_LEFT", "signed amplicon")]
    #[case("scheme_1_MIDDLE", "unknown side")]
    #[case("scheme_1_LEFT_a_b", "too many fields")]
    #[case("sch.eme_1_LEFT", "bad scheme character")]
    #[case("_1_LEFT", "empty scheme")]
    #[case("scheme_1_LEFT_", "empty alt")]
    #[case("scheme_1_LEFT_al-t", "non-alphanumeric alt")]
    fn rejects_invalid_names(#[case] raw: &str, #[case] description: &str) {
        let r = PrimerName::parse(raw);
        assert!(matches!(r, Err(Error::NameFormat { .. })), "expected NameFormat for {description}: {raw:?}");
    }

    #[test]
    fn versions() {
        assert_eq!(PrimerName::parse("s_1_LEFT").unwrap().version(), PrimerNameVersion::V1);
        assert_eq!(PrimerName::parse("s_1_LEFT_alt3").unwrap().version(), PrimerNameVersion::V1);
        assert_eq!(PrimerName::parse("s_1_LEFT_0").unwrap().version(), PrimerNameVersion::V2);
        assert_eq!(PrimerName::parse("s_1_LEFT_b").unwrap().version(), PrimerNameVersion::Other);
    }

    #[test]
    fn rebuild_with_new_parts() {
        let n = PrimerName::parse("s_1_RIGHT_alt1").unwrap();
        assert_eq!(n.with_amplicon_number(9).unwrap().to_string(), "s_9_RIGHT_alt1");
        assert_eq!(n.with_alt(None).unwrap().to_string(), "s_1_RIGHT");
        assert_eq!(n.amplicon_name(), "s_1");
        assert!(n.with_amplicon_number(0).is_err());
        assert_eq!(n.side().expected_strand(), Strand::Reverse);
    }
}
