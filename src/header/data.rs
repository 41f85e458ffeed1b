// src/header/data.rs

//! Tagged entry payloads and typed decode
//!
//! A [`TagData`] owns the raw bytes of one header entry: integers in
//! big-endian at their native width, string families as consecutive
//! NUL-terminated UTF-8, binary as an opaque blob. Decoding renders
//! the payload as independent typed values, with the scalar-vs-array
//! choice driven by the tag's registered return class, never by the
//! entry itself.

use crate::error::{Error, Result};
use crate::tags::{ReturnType, Tag, TagRegistry, TagType};
use serde::{Deserialize, Serialize};

/// One decoded value from a header entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Str(String),
    Int(u64),
    Bin(Vec<u8>),
}

/// Result of decoding an entry: a single value or a sequence,
/// depending on the tag's return class and the entry's count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decoded {
    Scalar(Value),
    Array(Vec<Value>),
}

impl Decoded {
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Decoded::Scalar(v) => Some(v),
            Decoded::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Decoded::Array(vs) => Some(vs),
            Decoded::Scalar(_) => None,
        }
    }

    /// Scalar string content, if that is what was decoded
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Decoded::Scalar(Value::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Scalar integer content, if that is what was decoded
    pub fn as_int(&self) -> Option<u64> {
        match self {
            Decoded::Scalar(Value::Int(n)) => Some(*n),
            _ => None,
        }
    }

    /// Flatten to a string list; `None` if any element is non-string
    pub fn into_strings(self) -> Option<Vec<String>> {
        let values = match self {
            Decoded::Scalar(v) => vec![v],
            Decoded::Array(vs) => vs,
        };
        values
            .into_iter()
            .map(|v| match v {
                Value::Str(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Flatten to an integer list; `None` if any element is non-integer
    pub fn into_ints(self) -> Option<Vec<u64>> {
        let values = match self {
            Decoded::Scalar(v) => vec![v],
            Decoded::Array(vs) => vs,
        };
        values
            .into_iter()
            .map(|v| match v {
                Value::Int(n) => Some(n),
                _ => None,
            })
            .collect()
    }
}

/// One header entry: a tag, a payload type, a cardinality, and the
/// owned raw bytes.
///
/// Entries are created by the typed constructors or by the header's
/// encode path and are compared raw (type, count, payload) when a
/// merge checks its match-tag precondition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagData {
    tag: Tag,
    tag_type: TagType,
    count: u32,
    data: Vec<u8>,
}

impl TagData {
    /// Single NUL-terminated string entry
    pub fn string(tag: Tag, value: &str) -> Self {
        Self::one_string(tag, TagType::String, value)
    }

    /// Single localized string entry
    pub fn i18n_string(tag: Tag, value: &str) -> Self {
        Self::one_string(tag, TagType::I18nString, value)
    }

    fn one_string(tag: Tag, tag_type: TagType, value: &str) -> Self {
        let mut data = Vec::with_capacity(value.len() + 1);
        data.extend_from_slice(value.as_bytes());
        data.push(0);
        TagData {
            tag,
            tag_type,
            count: 1,
            data,
        }
    }

    /// String-array entry, one NUL-terminated element per item
    pub fn string_array<I, S>(tag: Tag, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut data = Vec::new();
        let mut count = 0;
        for value in values {
            data.extend_from_slice(value.as_ref().as_bytes());
            data.push(0);
            count += 1;
        }
        TagData {
            tag,
            tag_type: TagType::StringArray,
            count,
            data,
        }
    }

    pub fn int8(tag: Tag, values: &[u8]) -> Self {
        TagData {
            tag,
            tag_type: TagType::Int8,
            count: values.len() as u32,
            data: values.to_vec(),
        }
    }

    pub fn int16(tag: Tag, values: &[u16]) -> Self {
        let data = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        TagData {
            tag,
            tag_type: TagType::Int16,
            count: values.len() as u32,
            data,
        }
    }

    pub fn int32(tag: Tag, values: &[u32]) -> Self {
        let data = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        TagData {
            tag,
            tag_type: TagType::Int32,
            count: values.len() as u32,
            data,
        }
    }

    pub fn int64(tag: Tag, values: &[u64]) -> Self {
        let data = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        TagData {
            tag,
            tag_type: TagType::Int64,
            count: values.len() as u32,
            data,
        }
    }

    /// Opaque binary entry; the count is the byte length
    pub fn binary(tag: Tag, data: &[u8]) -> Self {
        TagData {
            tag,
            tag_type: TagType::Bin,
            count: data.len() as u32,
            data: data.to_vec(),
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn tag_type(&self) -> TagType {
        self.tag_type
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Raw payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.data
    }

    /// Decode the payload into typed values.
    ///
    /// Emission is a sequence when the tag's registered return class
    /// is `Array` or the count is anything other than one; binary
    /// entries are always a single blob regardless. The returned
    /// values are independent copies; the entry may be dropped
    /// immediately afterward.
    pub fn decode(&self, registry: &dyn TagRegistry) -> Result<Decoded> {
        let info = registry
            .info(self.tag)
            .ok_or_else(|| Error::UnknownTag(self.tag.to_string()))?;
        let emit_array = info.return_type == ReturnType::Array || self.count != 1;

        match self.tag_type {
            TagType::Bin => {
                if self.data.len() != self.count as usize {
                    return Err(self.malformed("binary length disagrees with count"));
                }
                Ok(Decoded::Scalar(Value::Bin(self.data.clone())))
            }
            TagType::Char | TagType::Int8 => self.decode_ints(1, emit_array),
            TagType::Int16 => self.decode_ints(2, emit_array),
            TagType::Int32 => self.decode_ints(4, emit_array),
            TagType::Int64 => self.decode_ints(8, emit_array),
            TagType::String | TagType::I18nString => {
                let strings = self.read_strings()?;
                if emit_array {
                    Ok(Decoded::Array(
                        strings.into_iter().map(Value::Str).collect(),
                    ))
                } else {
                    let first = strings
                        .into_iter()
                        .next()
                        .ok_or_else(|| self.malformed("empty string payload"))?;
                    Ok(Decoded::Scalar(Value::Str(first)))
                }
            }
            // Cardinality alone governs string arrays
            TagType::StringArray => Ok(Decoded::Array(
                self.read_strings()?.into_iter().map(Value::Str).collect(),
            )),
            TagType::Null => Err(Error::UnsupportedType(TagType::Null)),
        }
    }

    fn decode_ints(&self, width: usize, emit_array: bool) -> Result<Decoded> {
        let values = self.read_ints(width)?;
        if emit_array {
            Ok(Decoded::Array(values.into_iter().map(Value::Int).collect()))
        } else {
            let first = values
                .into_iter()
                .next()
                .ok_or_else(|| self.malformed("empty integer payload"))?;
            Ok(Decoded::Scalar(Value::Int(first)))
        }
    }

    fn read_ints(&self, width: usize) -> Result<Vec<u64>> {
        let need = self.count as usize * width;
        if self.data.len() < need {
            return Err(self.malformed("truncated integer payload"));
        }
        Ok(self.data[..need]
            .chunks_exact(width)
            .map(|chunk| chunk.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
            .collect())
    }

    fn read_strings(&self) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(self.count as usize);
        let mut rest: &[u8] = &self.data;
        for _ in 0..self.count {
            let nul = rest
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| self.malformed("unterminated string"))?;
            let text = std::str::from_utf8(&rest[..nul])
                .map_err(|_| self.malformed("invalid utf-8 in string payload"))?;
            out.push(text.to_string());
            rest = &rest[nul + 1..];
        }
        Ok(out)
    }

    /// Build an entry holding one value under the tag's declared type.
    ///
    /// Integer values narrow to the declared width without range
    /// validation; out-of-range bits are dropped.
    pub(crate) fn from_value(tag: Tag, tag_type: TagType, value: &Value) -> Result<Self> {
        match (tag_type, value) {
            (TagType::String, Value::Str(s)) => Ok(Self::string(tag, s)),
            (TagType::I18nString, Value::Str(s)) => Ok(Self::i18n_string(tag, s)),
            (TagType::StringArray, Value::Str(s)) => Ok(Self::string_array(tag, [s])),
            (TagType::Int64, Value::Int(n)) => Ok(Self::int64(tag, &[*n])),
            (TagType::Int32, Value::Int(n)) => Ok(Self::int32(tag, &[*n as u32])),
            (TagType::Int16, Value::Int(n)) => Ok(Self::int16(tag, &[*n as u16])),
            (TagType::Int8, Value::Int(n)) => Ok(Self::int8(tag, &[*n as u8])),
            (TagType::Char, Value::Int(n)) => Ok(TagData {
                tag,
                tag_type: TagType::Char,
                count: 1,
                data: vec![*n as u8],
            }),
            (TagType::Bin, Value::Bin(bytes)) => Ok(Self::binary(tag, bytes)),
            (expected, _) => Err(Error::TypeMismatch { tag, expected }),
        }
    }

    /// Append one more value to an existing entry of matching type
    pub(crate) fn push_value(&mut self, value: &Value) -> Result<()> {
        match (self.tag_type, value) {
            (TagType::String | TagType::I18nString | TagType::StringArray, Value::Str(s)) => {
                self.data.extend_from_slice(s.as_bytes());
                self.data.push(0);
                self.count += 1;
            }
            (TagType::Int64, Value::Int(n)) => {
                self.data.extend_from_slice(&n.to_be_bytes());
                self.count += 1;
            }
            (TagType::Int32, Value::Int(n)) => {
                self.data.extend_from_slice(&(*n as u32).to_be_bytes());
                self.count += 1;
            }
            (TagType::Int16, Value::Int(n)) => {
                self.data.extend_from_slice(&(*n as u16).to_be_bytes());
                self.count += 1;
            }
            (TagType::Int8 | TagType::Char, Value::Int(n)) => {
                self.data.push(*n as u8);
                self.count += 1;
            }
            (TagType::Bin, Value::Bin(bytes)) => {
                self.data.extend_from_slice(bytes);
                self.count += bytes.len() as u32;
            }
            (expected, _) => {
                return Err(Error::TypeMismatch {
                    tag: self.tag,
                    expected,
                });
            }
        }
        Ok(())
    }

    fn malformed(&self, reason: &str) -> Error {
        Error::Malformed {
            tag: self.tag,
            reason: reason.to_string(),
        }
    }
}
