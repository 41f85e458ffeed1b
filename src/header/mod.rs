// src/header/mod.rs

//! Header container: an insertion-ordered tag -> entry map
//!
//! This module holds the container side of the tagged value model:
//! entry storage and retrieval, the typed encode paths, iteration that
//! hides internal bookkeeping tags, pairwise and batched merges, and
//! header-to-header version ordering.

pub mod data;

pub use data::{Decoded, TagData, Value};

use crate::error::{Error, Result};
use crate::tags::{self, ReturnType, Tag, TagRegistry, TagSpec, TagType};
use crate::version::compare_segment;
use indexmap::IndexMap;
use std::cmp::Ordering;
use tracing::debug;

/// Package metadata: an ordered map from tag to entry.
///
/// Iteration order is insertion order and a tag appears at most once;
/// re-inserting a tag replaces its entry. The header exclusively owns
/// its entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    entries: IndexMap<Tag, TagData>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, replacing any existing entry under its tag
    pub fn put(&mut self, entry: TagData) {
        self.entries.insert(entry.tag(), entry);
    }

    /// The raw entry stored under a tag, if present.
    ///
    /// Absence here means the header has no such entry; it is distinct
    /// from a registry lookup failure, which is an error.
    pub fn get(&self, tag: Tag) -> Option<&TagData> {
        self.entries.get(&tag)
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.entries.contains_key(&tag)
    }

    /// Remove and return the entry under a tag
    pub fn remove(&mut self, tag: Tag) -> Option<TagData> {
        self.entries.shift_remove(&tag)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    ///
    /// The i18n lookaside table entry is skipped; callers never see
    /// it. The iterator is single-pass; start a fresh one for another
    /// scan.
    pub fn iter(&self) -> EntryIter<'_> {
        EntryIter {
            inner: self.entries.iter(),
        }
    }

    /// Registered names of the decodable entries, in header order.
    ///
    /// Entries with a Null payload type or unknown to the registry are
    /// left out, as is the i18n lookaside table.
    pub fn keys(&self, registry: &dyn TagRegistry) -> Vec<String> {
        self.iter()
            .filter(|(_, tag_type, _)| *tag_type != TagType::Null)
            .filter_map(|(tag, _, _)| registry.info(tag))
            .map(|info| info.name.clone())
            .collect()
    }

    /// Resolve a tag reference and decode its entry.
    ///
    /// `Ok(None)` means the tag resolved but the header has no such
    /// entry; an unknown tag name or number is an error.
    pub fn get_decoded(
        &self,
        registry: &dyn TagRegistry,
        spec: impl Into<TagSpec>,
    ) -> Result<Option<Decoded>> {
        let tag = registry.resolve(&spec.into())?;
        match self.entries.get(&tag) {
            None => Ok(None),
            Some(entry) => entry.decode(registry).map(Some),
        }
    }

    /// Store one value under a tag, replacing any existing entry.
    ///
    /// The value must match the tag's declared type; integers narrow
    /// to the declared width without range validation.
    pub fn put_value(
        &mut self,
        registry: &dyn TagRegistry,
        tag: Tag,
        value: &Value,
    ) -> Result<()> {
        let info = registry
            .info(tag)
            .ok_or_else(|| Error::UnknownTag(tag.to_string()))?;
        let entry = TagData::from_value(tag, info.tag_type, value)?;
        self.entries.insert(tag, entry);
        Ok(())
    }

    /// Append one value to a tag's entry, the list path.
    ///
    /// Creates the entry when absent. Appending to an existing entry
    /// is only valid for tags with an Array return class; scalar tags
    /// reject the second value with a type mismatch.
    pub fn append_value(
        &mut self,
        registry: &dyn TagRegistry,
        tag: Tag,
        value: &Value,
    ) -> Result<()> {
        let info = registry
            .info(tag)
            .ok_or_else(|| Error::UnknownTag(tag.to_string()))?;
        match self.entries.get_mut(&tag) {
            Some(existing) => {
                if info.return_type != ReturnType::Array {
                    return Err(Error::TypeMismatch {
                        tag,
                        expected: info.tag_type,
                    });
                }
                existing.push_value(value)
            }
            None => {
                let entry = TagData::from_value(tag, info.tag_type, value)?;
                self.entries.insert(tag, entry);
                Ok(())
            }
        }
    }

    /// Append a batch of values in order.
    ///
    /// Stops at the first mismatch; values appended before the failure
    /// stay in place, so callers must assume partial effect on error.
    pub fn extend_values(
        &mut self,
        registry: &dyn TagRegistry,
        tag: Tag,
        values: &[Value],
    ) -> Result<()> {
        for value in values {
            self.append_value(registry, tag, value)?;
        }
        Ok(())
    }

    /// Fold another header's entries into this one.
    ///
    /// Precondition: both headers carry `match_tag` and the stored
    /// entries compare raw-equal (type, count, payload). On mismatch
    /// nothing is changed. On success every source entry replaces or
    /// inserts under its tag; tags present only in this header are
    /// untouched.
    pub fn merge_from(&mut self, source: &Header, match_tag: Tag) -> Result<()> {
        let ours = self.get(match_tag).ok_or(Error::MatchTagMissing)?;
        let theirs = source.get(match_tag).ok_or(Error::MatchTagMissing)?;
        if ours != theirs {
            return Err(Error::MatchTagMismatch);
        }

        debug!(
            "merging {} entries over {} under match tag {}",
            source.len(),
            self.len(),
            match_tag
        );

        for entry in source.entries.values() {
            self.entries.insert(entry.tag(), entry.clone());
        }
        Ok(())
    }
}

/// Insertion-order iterator over header entries, hiding the i18n
/// lookaside table
pub struct EntryIter<'a> {
    inner: indexmap::map::Iter<'a, Tag, TagData>,
}

impl<'a> Iterator for EntryIter<'a> {
    type Item = (Tag, TagType, &'a TagData);

    fn next(&mut self) -> Option<Self::Item> {
        for (tag, entry) in self.inner.by_ref() {
            if *tag == tags::I18NTABLE {
                continue;
            }
            return Some((*tag, entry.tag_type(), entry));
        }
        None
    }
}

/// Merge paired header streams in order.
///
/// Source `i` folds into target `i` via [`Header::merge_from`]. The
/// batch aborts at the first failing pair; merges already applied to
/// earlier targets are not rolled back.
pub fn merge_headers(
    targets: &mut [Header],
    sources: impl IntoIterator<Item = Header>,
    match_tag: Tag,
) -> Result<()> {
    for (index, source) in sources.into_iter().enumerate() {
        let target = targets.get_mut(index).ok_or(Error::UnpairedSource)?;
        target.merge_from(&source, match_tag)?;
    }
    Ok(())
}

/// Order two headers by their epoch, version, and release tags.
///
/// A missing epoch counts as zero on either side; version and release
/// fall back to presence rules when a header lacks them. Entries that
/// fail to decode are treated as absent.
pub fn compare_versions(
    registry: &dyn TagRegistry,
    a: &Header,
    b: &Header,
) -> Ordering {
    let (epoch_a, version_a, release_a) = version_triple(registry, a);
    let (epoch_b, version_b, release_b) = version_triple(registry, b);

    epoch_a
        .unwrap_or(0)
        .cmp(&epoch_b.unwrap_or(0))
        .then_with(|| compare_segment(version_a.as_deref(), version_b.as_deref()))
        .then_with(|| compare_segment(release_a.as_deref(), release_b.as_deref()))
}

fn version_triple(
    registry: &dyn TagRegistry,
    header: &Header,
) -> (Option<u64>, Option<String>, Option<String>) {
    let decode_str = |tag: Tag| -> Option<String> {
        header
            .get(tag)
            .and_then(|entry| entry.decode(registry).ok())
            .and_then(|decoded| decoded.as_str().map(str::to_string))
    };
    let epoch = header
        .get(tags::EPOCH)
        .and_then(|entry| entry.decode(registry).ok())
        .and_then(|decoded| decoded.as_int());
    (epoch, decode_str(tags::VERSION), decode_str(tags::RELEASE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::StandardTags;

    fn sample_header(name: &str, version: &str, release: &str) -> Header {
        let mut header = Header::new();
        header.put(TagData::string(tags::NAME, name));
        header.put(TagData::string(tags::VERSION, version));
        header.put(TagData::string(tags::RELEASE, release));
        header
    }

    #[test]
    fn test_put_replaces_existing_entry() {
        let mut header = sample_header("foo", "1.0", "1");
        header.put(TagData::string(tags::VERSION, "2.0"));
        assert_eq!(header.len(), 3, "replacement must not add an entry");

        let decoded = header
            .get_decoded(&StandardTags, tags::VERSION)
            .unwrap()
            .unwrap();
        assert_eq!(decoded.as_str(), Some("2.0"));
    }

    #[test]
    fn test_get_decoded_distinguishes_absent_from_unknown() {
        let header = sample_header("foo", "1.0", "1");

        // Known tag, no entry: a valid empty result
        let absent = header.get_decoded(&StandardTags, tags::EPOCH).unwrap();
        assert!(absent.is_none());

        // Unknown tag name: an error, never a silent default
        let unknown = header.get_decoded(&StandardTags, "bogus");
        assert!(matches!(unknown, Err(Error::UnknownTag(_))));
    }

    #[test]
    fn test_lookup_by_name() {
        let header = sample_header("foo", "1.0", "1");
        let decoded = header.get_decoded(&StandardTags, "name").unwrap().unwrap();
        assert_eq!(decoded.as_str(), Some("foo"));
    }

    #[test]
    fn test_iteration_order_and_i18n_skip() {
        let mut header = sample_header("foo", "1.0", "1");
        header.put(TagData::string_array(tags::I18NTABLE, ["C", "de"]));
        header.put(TagData::string(tags::ARCH, "x86_64"));

        let seen: Vec<Tag> = header.iter().map(|(tag, _, _)| tag).collect();
        assert_eq!(
            seen,
            vec![tags::NAME, tags::VERSION, tags::RELEASE, tags::ARCH],
            "insertion order preserved, i18n table hidden"
        );
    }

    #[test]
    fn test_keys_skips_unregistered_tags() {
        let mut header = sample_header("foo", "1.0", "1");
        header.put(TagData::string(Tag(65000), "private"));
        let keys = header.keys(&StandardTags);
        assert_eq!(keys, vec!["Name", "Version", "Release"]);
    }

    #[test]
    fn test_put_value_type_checks() {
        let mut header = Header::new();
        let ok = header.put_value(&StandardTags, tags::NAME, &Value::Str("foo".into()));
        assert!(ok.is_ok());

        let bad = header.put_value(&StandardTags, tags::NAME, &Value::Int(1));
        assert!(matches!(bad, Err(Error::TypeMismatch { .. })));
        // Failed assignment must not have touched the entry
        let decoded = header.get_decoded(&StandardTags, tags::NAME).unwrap().unwrap();
        assert_eq!(decoded.as_str(), Some("foo"));
    }

    #[test]
    fn test_append_value_on_array_tag() {
        let mut header = Header::new();
        for name in ["libc.so.6", "libm.so.6"] {
            header
                .append_value(&StandardTags, tags::REQUIRENAME, &Value::Str(name.into()))
                .unwrap();
        }
        let decoded = header
            .get_decoded(&StandardTags, tags::REQUIRENAME)
            .unwrap()
            .unwrap();
        assert_eq!(
            decoded.into_strings(),
            Some(vec!["libc.so.6".to_string(), "libm.so.6".to_string()])
        );
    }

    #[test]
    fn test_append_second_value_to_scalar_tag_fails() {
        let mut header = Header::new();
        header
            .append_value(&StandardTags, tags::VERSION, &Value::Str("1.0".into()))
            .unwrap();
        let second = header.append_value(&StandardTags, tags::VERSION, &Value::Str("2.0".into()));
        assert!(matches!(second, Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_extend_values_partial_effect_on_mismatch() {
        let mut header = Header::new();
        let values = [
            Value::Str("libc.so.6".into()),
            Value::Int(7),
            Value::Str("never-applied".into()),
        ];
        let result = header.extend_values(&StandardTags, tags::REQUIRENAME, &values);
        assert!(result.is_err());

        // The element before the mismatch stays applied
        let decoded = header
            .get_decoded(&StandardTags, tags::REQUIRENAME)
            .unwrap()
            .unwrap();
        assert_eq!(decoded.into_strings(), Some(vec!["libc.so.6".to_string()]));
    }

    #[test]
    fn test_merge_mismatch_leaves_target_unchanged() {
        let mut target = sample_header("foo", "1.0", "1");
        let source = sample_header("bar", "2.0", "2");
        let before = target.clone();

        let result = target.merge_from(&source, tags::NAME);
        assert!(matches!(result, Err(Error::MatchTagMismatch)));
        assert_eq!(target, before, "failed merge must not modify the target");
    }

    #[test]
    fn test_merge_missing_match_tag() {
        let mut target = sample_header("foo", "1.0", "1");
        let mut source = Header::new();
        source.put(TagData::string(tags::VERSION, "2.0"));

        let result = target.merge_from(&source, tags::NAME);
        assert!(matches!(result, Err(Error::MatchTagMissing)));
    }

    #[test]
    fn test_merge_overwrites_shared_tags_only() {
        let mut target = sample_header("foo", "1.0", "1");
        target.put(TagData::string(tags::ARCH, "x86_64"));

        let mut source = Header::new();
        source.put(TagData::string(tags::NAME, "foo"));
        source.put(TagData::string(tags::VERSION, "2.0"));
        source.put(TagData::string(tags::SOURCERPM, "foo-2.0.src.rpm"));

        target.merge_from(&source, tags::NAME).unwrap();

        let version = target.get_decoded(&StandardTags, tags::VERSION).unwrap().unwrap();
        assert_eq!(version.as_str(), Some("2.0"), "source wins shared tags");

        let arch = target.get_decoded(&StandardTags, tags::ARCH).unwrap().unwrap();
        assert_eq!(arch.as_str(), Some("x86_64"), "target-only tags untouched");

        let srpm = target.get_decoded(&StandardTags, tags::SOURCERPM).unwrap().unwrap();
        assert_eq!(srpm.as_str(), Some("foo-2.0.src.rpm"), "source-only tags inserted");

        let release = target.get_decoded(&StandardTags, tags::RELEASE).unwrap().unwrap();
        assert_eq!(release.as_str(), Some("1"), "tags absent from source keep old values");
    }

    #[test]
    fn test_merge_headers_pairs_in_order() {
        let mut targets = vec![
            sample_header("foo", "1.0", "1"),
            sample_header("bar", "1.0", "1"),
        ];
        let sources = vec![
            sample_header("foo", "1.1", "1"),
            sample_header("bar", "1.2", "1"),
        ];

        merge_headers(&mut targets, sources, tags::NAME).unwrap();
        let bar_version = targets[1]
            .get_decoded(&StandardTags, tags::VERSION)
            .unwrap()
            .unwrap();
        assert_eq!(bar_version.as_str(), Some("1.2"));
    }

    #[test]
    fn test_merge_headers_no_rollback_of_earlier_pairs() {
        let mut targets = vec![
            sample_header("foo", "1.0", "1"),
            sample_header("bar", "1.0", "1"),
        ];
        let sources = vec![
            sample_header("foo", "1.1", "1"),
            sample_header("baz", "9.9", "9"),
        ];

        let result = merge_headers(&mut targets, sources, tags::NAME);
        assert!(matches!(result, Err(Error::MatchTagMismatch)));

        // First pair already applied, second target untouched
        let foo_version = targets[0]
            .get_decoded(&StandardTags, tags::VERSION)
            .unwrap()
            .unwrap();
        assert_eq!(foo_version.as_str(), Some("1.1"));
        let bar_version = targets[1]
            .get_decoded(&StandardTags, tags::VERSION)
            .unwrap()
            .unwrap();
        assert_eq!(bar_version.as_str(), Some("1.0"));
    }

    #[test]
    fn test_merge_headers_unpaired_source() {
        let mut targets = vec![sample_header("foo", "1.0", "1")];
        let sources = vec![
            sample_header("foo", "1.1", "1"),
            sample_header("bar", "1.0", "1"),
        ];
        let result = merge_headers(&mut targets, sources, tags::NAME);
        assert!(matches!(result, Err(Error::UnpairedSource)));
    }

    #[test]
    fn test_compare_versions_epoch_wins() {
        let mut newer = sample_header("foo", "1.0", "1");
        newer.put(TagData::int32(tags::EPOCH, &[1]));
        let older = sample_header("foo", "9.9", "9");

        assert_eq!(
            compare_versions(&StandardTags, &newer, &older),
            Ordering::Greater
        );
    }

    #[test]
    fn test_compare_versions_release_tiebreak() {
        let a = sample_header("foo", "1.0", "1");
        let b = sample_header("foo", "1.0", "2");
        assert_eq!(compare_versions(&StandardTags, &a, &b), Ordering::Less);
        assert_eq!(compare_versions(&StandardTags, &a, &a), Ordering::Equal);
    }
}
