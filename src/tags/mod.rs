// src/tags/mod.rs

//! Tag identifiers and per-tag metadata
//!
//! Every header entry is named by an integer tag. What type the entry
//! carries and whether retrieval yields a single value or a sequence
//! is declared per tag, not per entry, and is looked up through the
//! [`TagRegistry`] capability. [`StandardTags`] covers the well-known
//! package tags; tests and tooling can supply their own registry with
//! synthetic tags.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Integer identifier naming one header metadata attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag(pub u32);

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// On-disk data type of a header entry's payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum TagType {
    Null = 0,
    Char = 1,
    Int8 = 2,
    Int16 = 3,
    Int32 = 4,
    Int64 = 5,
    String = 6,
    Bin = 7,
    StringArray = 8,
    I18nString = 9,
}

/// Whether retrieval of a tag always yields a sequence or a single
/// value, independent of the entry's actual count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnType {
    Scalar,
    Array,
}

/// Registered metadata for one tag
#[derive(Debug, Clone)]
pub struct TagInfo {
    /// Canonical tag name, e.g. "Requirename"
    pub name: String,
    pub tag_type: TagType,
    pub return_type: ReturnType,
}

/// A tag reference supplied by a caller: either the raw number or a
/// registered name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagSpec {
    Number(u32),
    Name(String),
}

impl From<u32> for TagSpec {
    fn from(n: u32) -> Self {
        TagSpec::Number(n)
    }
}

impl From<Tag> for TagSpec {
    fn from(tag: Tag) -> Self {
        TagSpec::Number(tag.0)
    }
}

impl From<&str> for TagSpec {
    fn from(name: &str) -> Self {
        TagSpec::Name(name.to_string())
    }
}

/// Per-tag metadata lookup capability.
///
/// Injected into decode and encode paths rather than compiled in, so
/// callers can substitute a registry with synthetic tags.
pub trait TagRegistry {
    /// Metadata for a tag number, if registered
    fn info(&self, tag: Tag) -> Option<&TagInfo>;

    /// Tag number for a registered name (case-insensitive)
    fn by_name(&self, name: &str) -> Option<Tag>;

    /// Resolve a caller-supplied tag reference.
    ///
    /// Unknown names and unregistered numbers both surface as
    /// [`Error::UnknownTag`]; there is no sentinel value.
    fn resolve(&self, spec: &TagSpec) -> Result<Tag> {
        match spec {
            TagSpec::Number(n) => {
                let tag = Tag(*n);
                if self.info(tag).is_some() {
                    Ok(tag)
                } else {
                    Err(Error::UnknownTag(n.to_string()))
                }
            }
            TagSpec::Name(name) => self
                .by_name(name)
                .ok_or_else(|| Error::UnknownTag(name.clone())),
        }
    }
}

// Well-known tag numbers. The i18n lookaside table lives in the
// header-private range below 1000 and is never exposed by iteration.
pub const I18NTABLE: Tag = Tag(100);
pub const SIGMD5: Tag = Tag(261);
pub const NAME: Tag = Tag(1000);
pub const VERSION: Tag = Tag(1001);
pub const RELEASE: Tag = Tag(1002);
pub const EPOCH: Tag = Tag(1003);
pub const SUMMARY: Tag = Tag(1004);
pub const DESCRIPTION: Tag = Tag(1005);
pub const BUILDTIME: Tag = Tag(1006);
pub const BUILDHOST: Tag = Tag(1007);
pub const SIZE: Tag = Tag(1009);
pub const VENDOR: Tag = Tag(1011);
pub const LICENSE: Tag = Tag(1014);
pub const GROUP: Tag = Tag(1016);
pub const URL: Tag = Tag(1020);
pub const OS: Tag = Tag(1021);
pub const ARCH: Tag = Tag(1022);
pub const FILESIZES: Tag = Tag(1028);
pub const FILEMODES: Tag = Tag(1030);
pub const FILEDIGESTS: Tag = Tag(1035);
pub const SOURCERPM: Tag = Tag(1044);
pub const PROVIDENAME: Tag = Tag(1047);
pub const REQUIREFLAGS: Tag = Tag(1048);
pub const REQUIRENAME: Tag = Tag(1049);
pub const REQUIREVERSION: Tag = Tag(1050);
pub const CONFLICTFLAGS: Tag = Tag(1053);
pub const CONFLICTNAME: Tag = Tag(1054);
pub const CONFLICTVERSION: Tag = Tag(1055);
pub const OBSOLETENAME: Tag = Tag(1090);
pub const PROVIDEFLAGS: Tag = Tag(1112);
pub const PROVIDEVERSION: Tag = Tag(1113);
pub const OBSOLETEFLAGS: Tag = Tag(1114);
pub const OBSOLETEVERSION: Tag = Tag(1115);
pub const DIRINDEXES: Tag = Tag(1116);
pub const BASENAMES: Tag = Tag(1117);
pub const DIRNAMES: Tag = Tag(1118);

type BuiltinRow = (Tag, &'static str, TagType, ReturnType);

const BUILTIN: &[BuiltinRow] = &[
    (I18NTABLE, "Headeri18ntable", TagType::StringArray, ReturnType::Array),
    (SIGMD5, "Sigmd5", TagType::Bin, ReturnType::Scalar),
    (NAME, "Name", TagType::String, ReturnType::Scalar),
    (VERSION, "Version", TagType::String, ReturnType::Scalar),
    (RELEASE, "Release", TagType::String, ReturnType::Scalar),
    (EPOCH, "Epoch", TagType::Int32, ReturnType::Scalar),
    (SUMMARY, "Summary", TagType::I18nString, ReturnType::Scalar),
    (DESCRIPTION, "Description", TagType::I18nString, ReturnType::Scalar),
    (BUILDTIME, "Buildtime", TagType::Int32, ReturnType::Scalar),
    (BUILDHOST, "Buildhost", TagType::String, ReturnType::Scalar),
    (SIZE, "Size", TagType::Int32, ReturnType::Scalar),
    (VENDOR, "Vendor", TagType::String, ReturnType::Scalar),
    (LICENSE, "License", TagType::String, ReturnType::Scalar),
    (GROUP, "Group", TagType::I18nString, ReturnType::Scalar),
    (URL, "Url", TagType::String, ReturnType::Scalar),
    (OS, "Os", TagType::String, ReturnType::Scalar),
    (ARCH, "Arch", TagType::String, ReturnType::Scalar),
    (FILESIZES, "Filesizes", TagType::Int32, ReturnType::Array),
    (FILEMODES, "Filemodes", TagType::Int16, ReturnType::Array),
    (FILEDIGESTS, "Filedigests", TagType::StringArray, ReturnType::Array),
    (SOURCERPM, "Sourcerpm", TagType::String, ReturnType::Scalar),
    (PROVIDENAME, "Providename", TagType::StringArray, ReturnType::Array),
    (REQUIREFLAGS, "Requireflags", TagType::Int32, ReturnType::Array),
    (REQUIRENAME, "Requirename", TagType::StringArray, ReturnType::Array),
    (REQUIREVERSION, "Requireversion", TagType::StringArray, ReturnType::Array),
    (CONFLICTFLAGS, "Conflictflags", TagType::Int32, ReturnType::Array),
    (CONFLICTNAME, "Conflictname", TagType::StringArray, ReturnType::Array),
    (CONFLICTVERSION, "Conflictversion", TagType::StringArray, ReturnType::Array),
    (OBSOLETENAME, "Obsoletename", TagType::StringArray, ReturnType::Array),
    (PROVIDEFLAGS, "Provideflags", TagType::Int32, ReturnType::Array),
    (PROVIDEVERSION, "Provideversion", TagType::StringArray, ReturnType::Array),
    (OBSOLETEFLAGS, "Obsoleteflags", TagType::Int32, ReturnType::Array),
    (OBSOLETEVERSION, "Obsoleteversion", TagType::StringArray, ReturnType::Array),
    (DIRINDEXES, "Dirindexes", TagType::Int32, ReturnType::Array),
    (BASENAMES, "Basenames", TagType::StringArray, ReturnType::Array),
    (DIRNAMES, "Dirnames", TagType::StringArray, ReturnType::Array),
];

struct StandardTable {
    by_tag: HashMap<Tag, TagInfo>,
    by_name: HashMap<String, Tag>,
}

static STANDARD: Lazy<StandardTable> = Lazy::new(|| {
    let mut by_tag = HashMap::with_capacity(BUILTIN.len());
    let mut by_name = HashMap::with_capacity(BUILTIN.len());
    for &(tag, name, tag_type, return_type) in BUILTIN {
        by_tag.insert(
            tag,
            TagInfo {
                name: name.to_string(),
                tag_type,
                return_type,
            },
        );
        by_name.insert(name.to_lowercase(), tag);
    }
    StandardTable { by_tag, by_name }
});

/// Registry of the well-known package tags
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardTags;

impl TagRegistry for StandardTags {
    fn info(&self, tag: Tag) -> Option<&TagInfo> {
        STANDARD.by_tag.get(&tag)
    }

    fn by_name(&self, name: &str) -> Option<Tag> {
        STANDARD.by_name.get(&name.to_lowercase()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_number() {
        let registry = StandardTags;
        let info = registry.info(NAME).unwrap();
        assert_eq!(info.name, "Name");
        assert_eq!(info.tag_type, TagType::String);
        assert_eq!(info.return_type, ReturnType::Scalar);
    }

    #[test]
    fn test_lookup_by_name_is_case_insensitive() {
        let registry = StandardTags;
        assert_eq!(registry.by_name("requirename"), Some(REQUIRENAME));
        assert_eq!(registry.by_name("Requirename"), Some(REQUIRENAME));
        assert_eq!(registry.by_name("REQUIRENAME"), Some(REQUIRENAME));
    }

    #[test]
    fn test_resolve_accepts_numbers_and_names() {
        let registry = StandardTags;
        assert_eq!(registry.resolve(&TagSpec::from(1000)).unwrap(), NAME);
        assert_eq!(registry.resolve(&TagSpec::from("epoch")).unwrap(), EPOCH);
    }

    #[test]
    fn test_resolve_unknown_is_an_error() {
        let registry = StandardTags;
        let by_name = registry.resolve(&TagSpec::from("nosuchtag"));
        assert!(matches!(by_name, Err(Error::UnknownTag(_))));

        let by_number = registry.resolve(&TagSpec::from(424242));
        assert!(matches!(by_number, Err(Error::UnknownTag(_))));
    }

    #[test]
    fn test_dependency_tags_are_arrays() {
        let registry = StandardTags;
        for tag in [REQUIRENAME, REQUIREVERSION, PROVIDENAME, OBSOLETENAME] {
            let info = registry.info(tag).unwrap();
            assert_eq!(info.return_type, ReturnType::Array, "{}", tag);
        }
        assert_eq!(
            registry.info(REQUIREFLAGS).unwrap().tag_type,
            TagType::Int32
        );
    }
}
