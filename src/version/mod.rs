//! Structured tool versions with a total ordering.
//!
//! Versions are split into items on `.`, `-` and digit/letter transitions.
//! A `-` (or a letter→digit transition) opens a nested sub-list, so
//! `3.0-alpha-3` parses as `[3, [alpha, [3]]]` once trailing nulls are
//! normalized away. Comparison then walks the item trees:
//!
//! - numbers compare numerically, and beat any qualifier or sub-list
//! - known qualifiers order `alpha < beta < milestone < rc < snapshot <
//!   release < sp`; unknown qualifiers sort after `sp`, lexically
//! - a missing item compares like `0` / release, so `1.0 == 1` and
//!   `3.0-alpha-3 < 3.0`

mod range;

pub use range::{Restriction, VersionRange};

use crate::error::{HarnessError, Result};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

const QUALIFIERS: [&str; 7] = ["alpha", "beta", "milestone", "rc", "snapshot", "", "sp"];
const RELEASE_INDEX: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    /// Decimal digits with leading zeros stripped ("0" for zero).
    Int(String),
    /// Qualifier after alias resolution.
    Str(String),
    List(Vec<Item>),
}

impl Item {
    fn int(digits: &str) -> Self {
        let trimmed = digits.trim_start_matches('0');
        if trimmed.is_empty() {
            Self::Int("0".to_string())
        } else {
            Self::Int(trimmed.to_string())
        }
    }

    fn qualifier(raw: &str, followed_by_digit: bool) -> Self {
        let value = if followed_by_digit && raw.len() == 1 {
            match raw {
                "a" => "alpha",
                "b" => "beta",
                "m" => "milestone",
                other => other,
            }
        } else {
            raw
        };
        let value = match value {
            "ga" | "final" | "release" => "",
            "cr" => "rc",
            other => other,
        };
        Self::Str(value.to_string())
    }

    fn is_null(&self) -> bool {
        match self {
            Self::Int(digits) => digits == "0",
            Self::Str(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
        }
    }

    /// Comparison against an absent item.
    fn cmp_missing(&self) -> Ordering {
        match self {
            Self::Int(digits) => {
                if digits == "0" {
                    Ordering::Equal
                } else {
                    Ordering::Greater
                }
            }
            Self::Str(s) => qualifier_key(s).cmp(&RELEASE_INDEX.to_string()),
            Self::List(items) => items.first().map_or(Ordering::Equal, Self::cmp_missing),
        }
    }

    fn cmp_item(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Self::Int(_), _) | (Self::List(_), Self::Str(_)) => Ordering::Greater,
            (Self::Str(a), Self::Str(b)) => qualifier_key(a).cmp(&qualifier_key(b)),
            (Self::Str(_), _) | (Self::List(_), Self::Int(_)) => Ordering::Less,
            (Self::List(a), Self::List(b)) => cmp_lists(a, b),
        }
    }
}

fn qualifier_key(qualifier: &str) -> String {
    QUALIFIERS
        .iter()
        .position(|q| *q == qualifier)
        .map_or_else(
            || format!("{}-{qualifier}", QUALIFIERS.len()),
            |idx| idx.to_string(),
        )
}

fn cmp_opt(left: Option<&Item>, right: Option<&Item>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (Some(l), None) => l.cmp_missing(),
        (None, Some(r)) => r.cmp_missing().reverse(),
        (Some(l), Some(r)) => l.cmp_item(r),
    }
}

fn cmp_lists(a: &[Item], b: &[Item]) -> Ordering {
    let len = a.len().max(b.len());
    for idx in 0..len {
        let result = cmp_opt(a.get(idx), b.get(idx));
        if result != Ordering::Equal {
            return result;
        }
    }
    Ordering::Equal
}

/// Drop trailing null items; stop at the first non-null scalar.
fn normalize(items: &mut Vec<Item>) {
    let mut idx = items.len();
    while idx > 0 {
        idx -= 1;
        if items[idx].is_null() {
            items.remove(idx);
        } else if !matches!(items[idx], Item::List(_)) {
            break;
        }
    }
}

fn parse_item(is_digit: bool, token: &str) -> Item {
    if is_digit {
        Item::int(token)
    } else {
        Item::qualifier(token, false)
    }
}

fn parse_items(version: &str) -> Vec<Item> {
    let lower = version.to_lowercase();
    let chars: Vec<char> = lower.chars().collect();

    // Each `-` or letter→digit boundary opens a sub-list appended to the
    // current one; later items never return to an outer list.
    let mut stack: Vec<Vec<Item>> = vec![Vec::new()];
    let mut is_digit = false;
    let mut start = 0usize;

    let token = |from: usize, to: usize| chars[from..to].iter().collect::<String>();

    for (i, &c) in chars.iter().enumerate() {
        let current = stack.len() - 1;
        if c == '.' {
            if i == start {
                stack[current].push(Item::int("0"));
            } else {
                stack[current].push(parse_item(is_digit, &token(start, i)));
            }
            start = i + 1;
        } else if c == '-' {
            if i == start {
                stack[current].push(Item::int("0"));
            } else {
                stack[current].push(parse_item(is_digit, &token(start, i)));
            }
            start = i + 1;
            stack.push(Vec::new());
        } else if c.is_ascii_digit() {
            if !is_digit && i > start {
                stack[current].push(Item::qualifier(&token(start, i), true));
                start = i;
                stack.push(Vec::new());
            }
            is_digit = true;
        } else {
            if is_digit && i > start {
                stack[current].push(Item::int(&token(start, i)));
                start = i;
                stack.push(Vec::new());
            }
            is_digit = false;
        }
    }

    if chars.len() > start {
        let current = stack.len() - 1;
        stack[current].push(parse_item(is_digit, &token(start, chars.len())));
    }

    while stack.len() > 1 {
        let mut child = stack.pop().unwrap_or_default();
        normalize(&mut child);
        if let Some(parent) = stack.last_mut() {
            parent.push(Item::List(child));
        }
    }
    let mut root = stack.pop().unwrap_or_default();
    normalize(&mut root);
    root
}

/// A parsed tool version.
///
/// Equality and ordering use the canonical item tree, so `1.0` and `1`
/// are equal even though `Display` preserves the input text.
#[derive(Debug, Clone)]
pub struct ToolVersion {
    raw: String,
    items: Vec<Item>,
}

impl ToolVersion {
    /// Parse a version string.
    ///
    /// # Errors
    ///
    /// Returns `VersionParse` for empty or whitespace-containing input.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(HarnessError::VersionParse {
                input: input.to_string(),
                reason: "version is empty".to_string(),
            });
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(HarnessError::VersionParse {
                input: input.to_string(),
                reason: "version contains whitespace".to_string(),
            });
        }
        Ok(Self {
            raw: trimmed.to_string(),
            items: parse_items(trimmed),
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Canonical form, useful when debugging ordering surprises.
    #[must_use]
    pub fn canonical(&self) -> String {
        fn render(items: &[Item], out: &mut String) {
            for (idx, item) in items.iter().enumerate() {
                match item {
                    Item::Int(d) => {
                        if idx > 0 {
                            out.push('.');
                        }
                        out.push_str(d);
                    }
                    Item::Str(s) => {
                        if idx > 0 {
                            out.push('.');
                        }
                        out.push_str(s);
                    }
                    Item::List(inner) => {
                        out.push('-');
                        render(inner, out);
                    }
                }
            }
        }
        let mut out = String::new();
        render(&self.items, &mut out);
        out
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for ToolVersion {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl PartialEq for ToolVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ToolVersion {}

impl PartialOrd for ToolVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ToolVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_lists(&self.items, &other.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> ToolVersion {
        ToolVersion::parse(s).expect("valid version")
    }

    fn assert_ordered(versions: &[&str]) {
        for pair in versions.windows(2) {
            assert!(
                v(pair[0]) < v(pair[1]),
                "expected {} < {} ({} vs {})",
                pair[0],
                pair[1],
                v(pair[0]).canonical(),
                v(pair[1]).canonical()
            );
        }
    }

    #[test]
    fn numeric_segments_are_not_lexical() {
        assert_ordered(&["2.0.6", "2.0.8", "2.0.9", "2.0.10", "2.1"]);
        assert!(v("10.0") > v("9.9.9"));
    }

    #[test]
    fn trailing_zeros_are_insignificant() {
        assert_eq!(v("1"), v("1.0"));
        assert_eq!(v("1.0.0"), v("1"));
        assert_eq!(v("3.0-ga"), v("3.0"));
        assert_eq!(v("3.0-final"), v("3"));
    }

    #[test]
    fn release_sorts_after_prerelease() {
        assert_ordered(&[
            "3.0-alpha-1",
            "3.0-alpha-3",
            "3.0-beta-1",
            "3.0-milestone-1",
            "3.0-rc-1",
            "3.0-SNAPSHOT",
            "3.0",
            "3.0-sp-1",
        ]);
    }

    #[test]
    fn maven_history_orders_correctly() {
        assert_ordered(&[
            "2.0",
            "2.0.6",
            "2.0.9",
            "2.2.1",
            "3.0-alpha-2",
            "3.0-alpha-3",
            "3.0-beta-3",
            "3.0",
            "3.9.6",
            "4.0.0-alpha-13",
            "4.0.0-beta-4",
            "4.0.0-beta-5",
            "4.0.0-rc-1",
            "4.0.0",
        ]);
    }

    #[test]
    fn single_letter_aliases_need_a_digit() {
        assert_eq!(v("1.0a1"), v("1.0-alpha-1"));
        assert_eq!(v("1.0b2"), v("1.0-beta-2"));
        assert_eq!(v("1.0m3"), v("1.0-milestone-3"));
        assert_eq!(v("1.0-cr1"), v("1.0-rc1"));
    }

    #[test]
    fn unknown_qualifiers_sort_after_sp() {
        assert!(v("1.0-sp") < v("1.0-foo"));
        assert!(v("1.0-bar") < v("1.0-foo"));
        assert!(v("1.0") < v("1.0-foo"));
    }

    #[test]
    fn build_numbers_order_numerically() {
        assert!(v("1.0-1") < v("1.0-2"));
        assert!(v("1.0-2") < v("1.0-10"));
        assert!(v("1.0") < v("1.0-1"));
    }

    #[test]
    fn huge_numbers_compare() {
        assert!(v("1.99999999999999999999999999999999999999") < v("1.100000000000000000000000000000000000000"));
        assert_eq!(v("1.007"), v("1.7"));
    }

    #[test]
    fn display_keeps_input_text() {
        assert_eq!(v("3.0-Alpha-3").to_string(), "3.0-Alpha-3");
        assert_eq!(v("3.0-Alpha-3"), v("3.0-alpha-3"));
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        assert!(ToolVersion::parse("").is_err());
        assert!(ToolVersion::parse("   ").is_err());
        assert!(ToolVersion::parse("1.0 beta").is_err());
    }

    #[test]
    fn canonical_form() {
        assert_eq!(v("3.0-alpha-3").canonical(), "3-alpha-3");
        assert_eq!(v("1.0.0").canonical(), "1");
    }
}
