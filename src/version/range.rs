//! Version range expressions.
//!
//! Grammar:
//!
//! ```text
//! range       := restriction ("," restriction)* | version
//! restriction := ("[" | "(") [version] "," [version] ("]" | ")")
//!              | "[" version "]"
//! ```
//!
//! A bare `version` is a soft recommendation and matches every version.
//! Restrictions must be ordered and must not overlap.

use super::ToolVersion;
use crate::error::{HarnessError, Result};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// One interval of a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restriction {
    pub lower: Option<ToolVersion>,
    pub lower_inclusive: bool,
    pub upper: Option<ToolVersion>,
    pub upper_inclusive: bool,
}

impl Restriction {
    /// The unbounded restriction `(,)`.
    #[must_use]
    pub const fn everything() -> Self {
        Self {
            lower: None,
            lower_inclusive: false,
            upper: None,
            upper_inclusive: false,
        }
    }

    #[must_use]
    pub fn contains(&self, version: &ToolVersion) -> bool {
        if let Some(lower) = &self.lower {
            match version.cmp(lower) {
                Ordering::Less => return false,
                Ordering::Equal if !self.lower_inclusive => return false,
                _ => {}
            }
        }
        if let Some(upper) = &self.upper {
            match version.cmp(upper) {
                Ordering::Greater => return false,
                Ordering::Equal if !self.upper_inclusive => return false,
                _ => {}
            }
        }
        true
    }

    fn parse(expr: &str, full: &str) -> Result<Self> {
        let invalid = |reason: &str| HarnessError::InvalidRange {
            range: full.to_string(),
            reason: reason.to_string(),
        };

        let lower_inclusive = expr.starts_with('[');
        let upper_inclusive = expr.ends_with(']');
        let inner = expr[1..expr.len() - 1].trim();

        let Some(comma) = inner.find(',') else {
            if !(lower_inclusive && upper_inclusive) {
                return Err(invalid("single version must be surrounded by []"));
            }
            if inner.is_empty() {
                return Err(invalid("empty restriction"));
            }
            let exact = ToolVersion::parse(inner)?;
            return Ok(Self {
                lower: Some(exact.clone()),
                lower_inclusive: true,
                upper: Some(exact),
                upper_inclusive: true,
            });
        };

        let lower_text = inner[..comma].trim();
        let upper_text = inner[comma + 1..].trim();
        if upper_text.contains(',') {
            return Err(invalid("restriction has more than two bounds"));
        }

        let lower = if lower_text.is_empty() {
            None
        } else {
            Some(ToolVersion::parse(lower_text)?)
        };
        let upper = if upper_text.is_empty() {
            None
        } else {
            Some(ToolVersion::parse(upper_text)?)
        };

        if let (Some(lo), Some(hi)) = (&lower, &upper) {
            if hi < lo {
                return Err(invalid("range defies version ordering"));
            }
            if hi == lo && !(lower_inclusive && upper_inclusive) {
                return Err(invalid("empty range"));
            }
        }

        Ok(Self {
            lower,
            lower_inclusive,
            upper,
            upper_inclusive,
        })
    }
}

impl fmt::Display for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(lo), Some(hi)) = (&self.lower, &self.upper) {
            if lo == hi && self.lower_inclusive && self.upper_inclusive {
                return write!(f, "[{lo}]");
            }
        }
        f.write_str(if self.lower_inclusive { "[" } else { "(" })?;
        if let Some(lo) = &self.lower {
            write!(f, "{lo}")?;
        }
        f.write_str(",")?;
        if let Some(hi) = &self.upper {
            write!(f, "{hi}")?;
        }
        f.write_str(if self.upper_inclusive { "]" } else { ")" })
    }
}

/// A parsed version constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    expr: String,
    recommended: Option<ToolVersion>,
    restrictions: Vec<Restriction>,
}

impl VersionRange {
    /// Parse a range expression such as `(,3.0-alpha-3)` or `[2.0.6,)`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange` for unbalanced brackets, reversed or
    /// overlapping bounds, and `VersionParse` for malformed versions.
    pub fn parse(expr: &str) -> Result<Self> {
        let full = expr.trim();
        let invalid = |reason: String| HarnessError::InvalidRange {
            range: full.to_string(),
            reason,
        };

        if full.is_empty() {
            return Err(invalid("range is empty".to_string()));
        }

        let mut restrictions: Vec<Restriction> = Vec::new();
        let mut rest = full;

        while rest.starts_with('[') || rest.starts_with('(') {
            let close = rest
                .find([']', ')'])
                .ok_or_else(|| invalid(format!("unbounded range: {rest}")))?;
            let restriction = Restriction::parse(&rest[..=close], full)?;

            if let Some(previous) = restrictions.last() {
                let overlaps = match (&previous.upper, &restriction.lower) {
                    (Some(upper), Some(lower)) => match upper.cmp(lower) {
                        Ordering::Greater => true,
                        Ordering::Equal => previous.upper_inclusive && restriction.lower_inclusive,
                        Ordering::Less => false,
                    },
                    _ => true,
                };
                if overlaps {
                    return Err(invalid(format!(
                        "ranges overlap: {previous} and {restriction}"
                    )));
                }
            }
            restrictions.push(restriction);

            rest = rest[close + 1..].trim_start();
            if let Some(stripped) = rest.strip_prefix(',') {
                rest = stripped.trim_start();
            }
        }

        if !rest.is_empty() {
            if !restrictions.is_empty() {
                return Err(invalid(
                    "only fully-qualified sets allowed in a multiple set range".to_string(),
                ));
            }
            let recommended = ToolVersion::parse(rest)?;
            return Ok(Self {
                expr: full.to_string(),
                recommended: Some(recommended),
                restrictions: vec![Restriction::everything()],
            });
        }

        Ok(Self {
            expr: full.to_string(),
            recommended: None,
            restrictions,
        })
    }

    /// The range every tool version satisfies.
    #[must_use]
    pub fn all() -> Self {
        Self {
            expr: "(,)".to_string(),
            recommended: None,
            restrictions: vec![Restriction::everything()],
        }
    }

    #[must_use]
    pub fn contains(&self, version: &ToolVersion) -> bool {
        self.restrictions.iter().any(|r| r.contains(version))
    }

    /// Parse `version` and test it against this range.
    ///
    /// # Errors
    ///
    /// Returns `VersionParse` if `version` is malformed.
    pub fn matches_str(&self, version: &str) -> Result<bool> {
        Ok(self.contains(&ToolVersion::parse(version)?))
    }

    #[must_use]
    pub fn restrictions(&self) -> &[Restriction] {
        &self.restrictions
    }

    /// The bare version, when the range was written as a recommendation.
    #[must_use]
    pub fn recommended(&self) -> Option<&ToolVersion> {
        self.recommended.as_ref()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.expr
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

impl FromStr for VersionRange {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(s: &str) -> VersionRange {
        VersionRange::parse(s).expect("valid range")
    }

    fn matches(r: &str, v: &str) -> bool {
        range(r).matches_str(v).expect("valid version")
    }

    #[test]
    fn open_upper_bound() {
        assert!(matches("(,3.0-alpha-3)", "2.0.9"));
        assert!(matches("(,3.0-alpha-3)", "3.0-alpha-2"));
        assert!(!matches("(,3.0-alpha-3)", "3.0-alpha-3"));
        assert!(!matches("(,3.0-alpha-3)", "3.0"));
        assert!(!matches("(,3.0-alpha-3)", "3.9.6"));
    }

    #[test]
    fn closed_lower_bound() {
        assert!(!matches("[2.0.6,)", "2.0.5"));
        assert!(matches("[2.0.6,)", "2.0.6"));
        assert!(matches("[2.0.6,)", "4.0.0-beta-5"));
    }

    #[test]
    fn exclusive_lower_bound() {
        assert!(!matches("(2.0.8,)", "2.0.8"));
        assert!(matches("(2.0.8,)", "2.0.9"));
    }

    #[test]
    fn prerelease_boundary() {
        assert!(!matches("[4.0.0-beta-5,)", "4.0.0-beta-4"));
        assert!(matches("[4.0.0-beta-5,)", "4.0.0-beta-5"));
        assert!(matches("[4.0.0-beta-5,)", "4.0.0"));
        assert!(!matches("[4.0.0-beta-5,)", "3.9.9"));
    }

    #[test]
    fn exact_pin() {
        assert!(matches("[3.0]", "3.0"));
        assert!(matches("[3.0]", "3"));
        assert!(!matches("[3.0]", "3.0.1"));
    }

    #[test]
    fn union_of_restrictions() {
        let r = range("[1.0,2.0),[3.0,)");
        assert_eq!(r.restrictions().len(), 2);
        assert!(r.matches_str("1.5").unwrap());
        assert!(!r.matches_str("2.5").unwrap());
        assert!(r.matches_str("3.0").unwrap());
    }

    #[test]
    fn bare_version_matches_everything() {
        let r = range("2.0");
        assert_eq!(r.recommended().map(ToString::to_string), Some("2.0".to_string()));
        assert!(r.matches_str("1.0").unwrap());
        assert!(r.matches_str("9.9").unwrap());
    }

    #[test]
    fn all_matches_everything() {
        assert!(VersionRange::all().matches_str("0.1").unwrap());
    }

    #[test]
    fn rejects_malformed() {
        for bad in [
            "",
            "[1.0",
            "(1.0)",
            "[2.0,1.0]",
            "(1.0,1.0)",
            "[1.0,2.0,3.0]",
            "[1.0,3.0],[2.0,4.0]",
            "[1.0,2.0],3.0",
        ] {
            assert!(VersionRange::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn display_keeps_expression() {
        assert_eq!(range(" [2.0.6,) ").to_string(), "[2.0.6,)");
        let r = range("[1.0,2.0)");
        assert_eq!(r.restrictions()[0].to_string(), "[1.0,2.0)");
    }
}
