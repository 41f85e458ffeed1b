// src/version.rs

//! EVR (Epoch:Version-Release) parsing and comparison
//!
//! Implements the packaging ecosystem's version ordering rules: a
//! permissive splitter for `[epoch:]version[-release]` strings and the
//! segment-wise alphanumeric comparator used everywhere two package
//! versions must be ordered. Upgrade decisions ride on these results,
//! so the comparator reproduces the de-facto rules exactly, tilde
//! ordering included.

use std::cmp::Ordering;

/// A parsed `[epoch:]version[-release]` triple borrowing from the
/// source string.
///
/// `parse_evr` never defaults an absent epoch; entry points that need
/// the `"0"` default apply it themselves (see [`compare_labels`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evr<'a> {
    /// Leading digit run before `:`, if the delimiter is present.
    /// May be empty when the string starts with `:`.
    pub epoch: Option<&'a str>,
    /// Everything between the epoch delimiter and the last `-`
    pub version: &'a str,
    /// Everything after the last `-`, if one exists
    pub release: Option<&'a str>,
}

impl<'a> Evr<'a> {
    /// Build a pre-split triple, for callers that already hold the
    /// components separately
    pub fn new(epoch: Option<&'a str>, version: &'a str, release: Option<&'a str>) -> Self {
        Self {
            epoch,
            version,
            release,
        }
    }
}

/// Split an EVR string into its epoch, version, and release components.
///
/// The epoch is the leading run of ASCII digits, taken only when it is
/// immediately followed by `:`. The release is everything after the
/// last `-`. Both are absent rather than defaulted when their
/// delimiter is missing; parsing never fails.
pub fn parse_evr(evr: &str) -> Evr<'_> {
    let bytes = evr.as_bytes();

    let mut digits = 0;
    while digits < bytes.len() && bytes[digits].is_ascii_digit() {
        digits += 1;
    }

    let (epoch, rest) = if digits < bytes.len() && bytes[digits] == b':' {
        (Some(&evr[..digits]), &evr[digits + 1..])
    } else {
        (None, evr)
    };

    let (version, release) = match rest.rfind('-') {
        Some(dash) => (&rest[..dash], Some(&rest[dash + 1..])),
        None => (rest, None),
    };

    Evr {
        epoch,
        version,
        release,
    }
}

/// Compare two version strings segment by segment.
///
/// Strings are cut into maximal runs of digits or letters; any other
/// byte separates runs. Digit runs compare numerically with leading
/// zeros stripped, letter runs compare byte-lexically, and a digit run
/// outranks a letter run at the same position. A tilde sorts before
/// everything, including the end of the string. When all paired runs
/// tie, whichever string has runs left over is the larger.
pub fn rpm_vercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let one = a.as_bytes();
    let two = b.as_bytes();
    let mut i = 0;
    let mut j = 0;

    while i < one.len() || j < two.len() {
        while i < one.len() && !one[i].is_ascii_alphanumeric() && one[i] != b'~' {
            i += 1;
        }
        while j < two.len() && !two[j].is_ascii_alphanumeric() && two[j] != b'~' {
            j += 1;
        }

        // Tilde sorts lower than anything, end of string included
        let a_tilde = i < one.len() && one[i] == b'~';
        let b_tilde = j < two.len() && two[j] == b'~';
        if a_tilde || b_tilde {
            if !a_tilde {
                return Ordering::Greater;
            }
            if !b_tilde {
                return Ordering::Less;
            }
            i += 1;
            j += 1;
            continue;
        }

        if i >= one.len() || j >= two.len() {
            break;
        }

        let start_a = i;
        let start_b = j;
        let numeric = one[i].is_ascii_digit();
        if numeric {
            while i < one.len() && one[i].is_ascii_digit() {
                i += 1;
            }
            while j < two.len() && two[j].is_ascii_digit() {
                j += 1;
            }
        } else {
            while i < one.len() && one[i].is_ascii_alphabetic() {
                i += 1;
            }
            while j < two.len() && two[j].is_ascii_alphabetic() {
                j += 1;
            }
        }

        let seg_a = &one[start_a..i];
        let seg_b = &two[start_b..j];

        // seg_a is non-empty by construction; an empty seg_b means the
        // run types differ, and a numeric run outranks a letter run
        if seg_b.is_empty() {
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        if numeric {
            let trim_a = trim_leading_zeros(seg_a);
            let trim_b = trim_leading_zeros(seg_b);
            match trim_a.len().cmp(&trim_b.len()) {
                Ordering::Equal => {}
                other => return other,
            }
            match trim_a.cmp(trim_b) {
                Ordering::Equal => {}
                other => return other,
            }
        } else {
            match seg_a.cmp(seg_b) {
                Ordering::Equal => {}
                other => return other,
            }
        }
    }

    // All paired segments tied; leftover segments win
    if i >= one.len() && j >= two.len() {
        Ordering::Equal
    } else if i >= one.len() {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

fn trim_leading_zeros(seg: &[u8]) -> &[u8] {
    let mut k = 0;
    while k < seg.len() && seg[k] == b'0' {
        k += 1;
    }
    &seg[k..]
}

/// Compare two optional EVR components.
///
/// Presence beats absence; two absent components are equal; two
/// present components delegate to [`rpm_vercmp`].
pub fn compare_segment(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (Some(x), Some(y)) => rpm_vercmp(x, y),
    }
}

/// Compare two pre-split triples, defaulting an absent epoch to `"0"`
/// on either side.
///
/// This is the label-comparison entry point: an absent epoch ranks
/// below any positive one. Dependency-record ordering deliberately
/// does not default and goes through [`compare_segment`] directly.
pub fn compare_labels(a: &Evr<'_>, b: &Evr<'_>) -> Ordering {
    let epoch_a = a.epoch.unwrap_or("0");
    let epoch_b = b.epoch.unwrap_or("0");

    rpm_vercmp(epoch_a, epoch_b)
        .then_with(|| rpm_vercmp(a.version, b.version))
        .then_with(|| compare_segment(a.release, b.release))
}

/// Compare two combined `[epoch:]version[-release]` strings.
///
/// Parses both sides with [`parse_evr`] and orders them through
/// [`compare_labels`], so an absent epoch is defaulted to `"0"` here.
pub fn compare_evr(a: &str, b: &str) -> Ordering {
    compare_labels(&parse_evr(a), &parse_evr(b))
}
