// src/deps/mod.rs

//! Dependency sets: name/EVR/sense records and range-overlap testing
//!
//! A dependency set collects the records of one relationship kind
//! (Requires, Provides, Conflicts, Obsoletes), built from the parallel
//! name/version/flags tag triple of a header. Records order by EVR
//! only; names are matched, never version-ordered. Overlap testing
//! implements the range rules upgrade resolution depends on, with
//! epoch promotion as an explicit parameter instead of process state.

use crate::error::{Error, Result};
use crate::header::Header;
use crate::tags::{self, Tag, TagRegistry};
use crate::version::{compare_segment, parse_evr, rpm_vercmp};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use tracing::debug;

bitflags! {
    /// Comparison sense of a versioned dependency
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct SenseFlags: u32 {
        const LESS = 0x02;
        const GREATER = 0x04;
        const EQUAL = 0x08;
        /// Tracked-feature dependency satisfied by the library itself
        const RPMLIB = 0x0100_0000;
    }
}

impl SenseFlags {
    /// Just the comparison bits
    pub fn sense(self) -> SenseFlags {
        self & (SenseFlags::LESS | SenseFlags::GREATER | SenseFlags::EQUAL)
    }

    fn op_str(self) -> &'static str {
        let sense = self.sense();
        if sense == SenseFlags::LESS | SenseFlags::EQUAL {
            "<="
        } else if sense == SenseFlags::GREATER | SenseFlags::EQUAL {
            ">="
        } else if sense == SenseFlags::LESS {
            "<"
        } else if sense == SenseFlags::GREATER {
            ">"
        } else if sense == SenseFlags::EQUAL {
            "="
        } else {
            ""
        }
    }
}

/// Relationship kind a dependency set describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepTag {
    Requires,
    Provides,
    Conflicts,
    Obsoletes,
}

impl DepTag {
    /// Header tag holding the dependency names
    pub fn name_tag(self) -> Tag {
        match self {
            DepTag::Requires => tags::REQUIRENAME,
            DepTag::Provides => tags::PROVIDENAME,
            DepTag::Conflicts => tags::CONFLICTNAME,
            DepTag::Obsoletes => tags::OBSOLETENAME,
        }
    }

    /// Header tag holding the dependency version strings
    pub fn version_tag(self) -> Tag {
        match self {
            DepTag::Requires => tags::REQUIREVERSION,
            DepTag::Provides => tags::PROVIDEVERSION,
            DepTag::Conflicts => tags::CONFLICTVERSION,
            DepTag::Obsoletes => tags::OBSOLETEVERSION,
        }
    }

    /// Header tag holding the dependency sense flags
    pub fn flags_tag(self) -> Tag {
        match self {
            DepTag::Requires => tags::REQUIREFLAGS,
            DepTag::Provides => tags::PROVIDEFLAGS,
            DepTag::Conflicts => tags::CONFLICTFLAGS,
            DepTag::Obsoletes => tags::OBSOLETEFLAGS,
        }
    }

    fn type_char(self) -> char {
        match self {
            DepTag::Requires => 'R',
            DepTag::Provides => 'P',
            DepTag::Conflicts => 'C',
            DepTag::Obsoletes => 'O',
        }
    }
}

/// One dependency record: a name, an optional `[epoch:]version[-release]`
/// string, and the comparison sense
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepRecord {
    pub name: String,
    /// Empty for an unversioned (existence-only) dependency
    pub evr: String,
    pub flags: SenseFlags,
    pub tag: DepTag,
}

impl DepRecord {
    pub fn new(tag: DepTag, name: &str, evr: &str, flags: SenseFlags) -> Self {
        DepRecord {
            name: name.to_string(),
            evr: evr.to_string(),
            flags,
            tag,
        }
    }

    /// Order two records by EVR alone.
    ///
    /// Names are deliberately excluded from version ordering, and the
    /// bare parse is used: an absent epoch stays absent and loses to a
    /// present one by the segment presence rules.
    pub fn compare_evr(&self, other: &DepRecord) -> Ordering {
        let a = parse_evr(&self.evr);
        let b = parse_evr(&other.evr);

        compare_segment(a.epoch, b.epoch)
            .then_with(|| rpm_vercmp(a.version, b.version))
            .then_with(|| compare_segment(a.release, b.release))
    }
}

impl fmt::Display for DepRecord {
    /// The DNEVR form, e.g. `R glibc >= 2.34-1`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tag.type_char(), self.name)?;
        if !self.flags.sense().is_empty() && !self.evr.is_empty() {
            write!(f, " {} {}", self.flags.op_str(), self.evr)?;
        }
        Ok(())
    }
}

/// Do the version ranges of two records overlap?
///
/// Records with different names never overlap. A record without sense
/// bits or without an EVR is an existence test and overlaps anything
/// with the same name. Epoch handling: when only `a` carries a
/// positive epoch, `b`'s missing epoch is promoted to match unless
/// `no_promote` is set, in which case `a` compares greater; a missing
/// epoch on `a` against a positive one on `b` always compares less.
pub fn overlaps(a: &DepRecord, b: &DepRecord, no_promote: bool) -> bool {
    if a.name != b.name {
        return false;
    }
    if a.flags.sense().is_empty() || b.flags.sense().is_empty() {
        return true;
    }
    if a.evr.is_empty() || b.evr.is_empty() {
        return true;
    }

    let evr_a = parse_evr(&a.evr);
    let evr_b = parse_evr(&b.evr);
    let epoch_a = evr_a.epoch.filter(|e| !e.is_empty());
    let epoch_b = evr_b.epoch.filter(|e| !e.is_empty());

    let mut sense = match (epoch_a, epoch_b) {
        (Some(x), Some(y)) => rpm_vercmp(x, y),
        (Some(x), None) if positive_epoch(x) => {
            if no_promote {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        }
        (None, Some(y)) if positive_epoch(y) => Ordering::Less,
        _ => Ordering::Equal,
    };

    if sense == Ordering::Equal {
        sense = rpm_vercmp(evr_a.version, evr_b.version);
        if sense == Ordering::Equal {
            // Release breaks the tie only when both sides carry one
            if let (Some(rel_a), Some(rel_b)) = (
                evr_a.release.filter(|r| !r.is_empty()),
                evr_b.release.filter(|r| !r.is_empty()),
            ) {
                sense = rpm_vercmp(rel_a, rel_b);
            }
        }
    }

    match sense {
        Ordering::Less => {
            a.flags.contains(SenseFlags::GREATER) || b.flags.contains(SenseFlags::LESS)
        }
        Ordering::Greater => {
            a.flags.contains(SenseFlags::LESS) || b.flags.contains(SenseFlags::GREATER)
        }
        Ordering::Equal => {
            (a.flags.contains(SenseFlags::EQUAL) && b.flags.contains(SenseFlags::EQUAL))
                || (a.flags.contains(SenseFlags::LESS) && b.flags.contains(SenseFlags::LESS))
                || (a.flags.contains(SenseFlags::GREATER)
                    && b.flags.contains(SenseFlags::GREATER))
        }
    }
}

fn positive_epoch(epoch: &str) -> bool {
    epoch.parse::<u64>().is_ok_and(|n| n > 0)
}

/// Built-in tracked features satisfied by the library itself
const RPMLIB_FEATURES: &[(&str, &str)] = &[
    ("rpmlib(VersionedDependencies)", "3.0.3-1"),
    ("rpmlib(CompressedFileNames)", "3.0.4-1"),
    ("rpmlib(PayloadFilesHavePrefix)", "4.0-1"),
    ("rpmlib(ExplicitPackageProvide)", "4.0-0"),
    ("rpmlib(FileDigests)", "4.6.0-1"),
];

/// Ordered collection of dependency records of one relationship kind.
///
/// Iteration goes through external cursors; the set itself carries no
/// position state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySet {
    tag: DepTag,
    records: Vec<DepRecord>,
}

impl DependencySet {
    pub fn new(tag: DepTag) -> Self {
        DependencySet {
            tag,
            records: Vec::new(),
        }
    }

    /// Single-record set, for probing another set
    pub fn single(tag: DepTag, name: &str, evr: &str, flags: SenseFlags) -> Self {
        DependencySet {
            tag,
            records: vec![DepRecord::new(tag, name, evr, flags)],
        }
    }

    /// Build a set from a header's name/version/flags tag triple.
    ///
    /// A header without the name tag yields an empty set. Version and
    /// flags arrays may be absent entirely (unversioned legacy data)
    /// but must match the name count when present.
    pub fn from_header(
        registry: &dyn TagRegistry,
        header: &Header,
        tag: DepTag,
    ) -> Result<Self> {
        let names = decoded_strings(registry, header, tag.name_tag())?;
        let versions = decoded_strings(registry, header, tag.version_tag())?;
        let flag_values = decoded_ints(registry, header, tag.flags_tag())?;

        if !versions.is_empty() && versions.len() != names.len() {
            return Err(Error::DepTripleMismatch(tag.version_tag()));
        }
        if !flag_values.is_empty() && flag_values.len() != names.len() {
            return Err(Error::DepTripleMismatch(tag.flags_tag()));
        }

        let records = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| DepRecord {
                name,
                evr: versions.get(i).cloned().unwrap_or_default(),
                flags: SenseFlags::from_bits_truncate(
                    flag_values.get(i).copied().unwrap_or(0) as u32,
                ),
                tag,
            })
            .collect::<Vec<_>>();

        debug!("built {:?} set with {} records", tag, records.len());
        Ok(DependencySet { tag, records })
    }

    /// The package's own provide: `name = [epoch:]version-release`
    pub fn package_provide(registry: &dyn TagRegistry, header: &Header) -> Result<Self> {
        let name = required_string(registry, header, tags::NAME)?;
        let version = required_string(registry, header, tags::VERSION)?;
        let release = header
            .get_decoded(registry, tags::RELEASE)?
            .and_then(|d| d.as_str().map(str::to_string));
        let epoch = header
            .get_decoded(registry, tags::EPOCH)?
            .and_then(|d| d.as_int());

        let mut evr = String::new();
        if let Some(e) = epoch {
            evr.push_str(&format!("{}:", e));
        }
        evr.push_str(&version);
        if let Some(r) = release {
            evr.push_str(&format!("-{}", r));
        }

        Ok(Self::single(
            DepTag::Provides,
            &name,
            &evr,
            SenseFlags::EQUAL,
        ))
    }

    /// The feature set the library itself provides
    pub fn rpmlib_provides() -> Self {
        let records = RPMLIB_FEATURES
            .iter()
            .map(|&(name, evr)| {
                DepRecord::new(
                    DepTag::Provides,
                    name,
                    evr,
                    SenseFlags::RPMLIB | SenseFlags::LESS | SenseFlags::EQUAL,
                )
            })
            .collect();
        DependencySet {
            tag: DepTag::Provides,
            records,
        }
    }

    pub fn tag(&self) -> DepTag {
        self.tag
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DepRecord> {
        self.records.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DepRecord> {
        self.records.iter()
    }

    pub fn push(&mut self, record: DepRecord) {
        self.records.push(record);
    }

    /// Index of an exactly matching record (name, EVR, and flags)
    pub fn find(&self, probe: &DepRecord) -> Option<usize> {
        self.records.iter().position(|r| {
            r.name == probe.name && r.evr == probe.evr && r.flags == probe.flags
        })
    }

    /// Index of the first member whose range overlaps the probe
    pub fn search(&self, probe: &DepRecord, no_promote: bool) -> Option<usize> {
        self.records
            .iter()
            .position(|r| overlaps(r, probe, no_promote))
    }

    /// Fold another set's records into this one, dropping exact
    /// duplicates and keeping the result sorted by name, EVR, flags
    pub fn merge(&mut self, other: &DependencySet) {
        for record in &other.records {
            if self.find(record).is_none() {
                self.records.push(record.clone());
            }
        }
        self.records.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.evr.cmp(&b.evr))
                .then_with(|| a.flags.bits().cmp(&b.flags.bits()))
        });
    }
}

impl fmt::Display for DependencySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for record in &self.records {
            writeln!(f, "{}", record)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a DependencySet {
    type Item = &'a DepRecord;
    type IntoIter = std::slice::Iter<'a, DepRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

fn decoded_strings(
    registry: &dyn TagRegistry,
    header: &Header,
    tag: Tag,
) -> Result<Vec<String>> {
    match header.get(tag) {
        None => Ok(Vec::new()),
        Some(entry) => entry
            .decode(registry)?
            .into_strings()
            .ok_or(Error::TypeMismatch {
                tag,
                expected: crate::tags::TagType::StringArray,
            }),
    }
}

fn decoded_ints(registry: &dyn TagRegistry, header: &Header, tag: Tag) -> Result<Vec<u64>> {
    match header.get(tag) {
        None => Ok(Vec::new()),
        Some(entry) => entry
            .decode(registry)?
            .into_ints()
            .ok_or(Error::TypeMismatch {
                tag,
                expected: crate::tags::TagType::Int32,
            }),
    }
}

fn required_string(
    registry: &dyn TagRegistry,
    header: &Header,
    tag: Tag,
) -> Result<String> {
    header
        .get_decoded(registry, tag)?
        .and_then(|d| d.as_str().map(str::to_string))
        .ok_or(Error::MissingTag(tag))
}
