//! Value codec.
//!
//! Maps a single column value from the database's native type system to an
//! external JSON-compatible value. The mapping is driven by a closed
//! [`NativeType`] enum so every tag has exactly one [`ValueKind`], checked by
//! the compiler.
//!
//! # Null handling
//!
//! Drivers hand back a default scalar for SQL NULL (0, 0.0, false). The codec
//! takes the null flag separately and always prefers it over the raw value.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt;

// =============================================================================
// Native Type Tags
// =============================================================================

/// Native column type tag, as reported by result metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeType {
    Integer,
    Bit,
    BigInt,
    TinyInt,
    SmallInt,
    Decimal,
    Numeric,
    Float,
    Real,
    Double,
    Char,
    VarChar,
    NVarChar,
    LongVarChar,
    LongNVarChar,
    Date,
    Time,
    Timestamp,
    Boolean,
    Binary,
    VarBinary,
    LongVarBinary,
    Blob,
    Clob,
    Array,
    Struct,
    Distinct,
    Ref,
    Object,
    Other,
}

/// External value kind a native type encodes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Float,
    Decimal,
    String,
    Boolean,
    Bytes,
    /// Best-effort textual rendering of whatever the driver returned.
    Fallback,
}

impl NativeType {
    /// The external kind this tag encodes to.
    pub const fn kind(self) -> ValueKind {
        match self {
            Self::Integer | Self::Bit | Self::BigInt | Self::TinyInt | Self::SmallInt => {
                ValueKind::Integer
            }
            Self::Decimal | Self::Numeric => ValueKind::Decimal,
            Self::Float | Self::Real | Self::Double => ValueKind::Float,
            Self::Char
            | Self::VarChar
            | Self::NVarChar
            | Self::LongVarChar
            | Self::LongNVarChar
            | Self::Date
            | Self::Time
            | Self::Timestamp
            | Self::Clob => ValueKind::String,
            Self::Boolean => ValueKind::Boolean,
            Self::Binary | Self::VarBinary | Self::LongVarBinary | Self::Blob => ValueKind::Bytes,
            Self::Array | Self::Struct | Self::Distinct | Self::Ref | Self::Object | Self::Other => {
                ValueKind::Fallback
            }
        }
    }
}

/// Column name and native type, in result-set order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub native_type: NativeType,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, native_type: NativeType) -> Self {
        Self {
            name: name.into(),
            native_type,
        }
    }
}

// =============================================================================
// Raw and External Values
// =============================================================================

/// Value as read from the driver, before encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Bytes(Vec<u8>),
}

impl RawValue {
    /// The scalar a driver returns for SQL NULL of the given type.
    pub fn default_for(tag: NativeType) -> Self {
        match tag.kind() {
            ValueKind::Integer => Self::Int(0),
            ValueKind::Float => Self::Float(0.0),
            ValueKind::Boolean => Self::Bool(false),
            ValueKind::Bytes => Self::Bytes(Vec::new()),
            ValueKind::Decimal | ValueKind::String | ValueKind::Fallback => {
                Self::Text(String::new())
            }
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bool(_) => "boolean",
            Self::Bytes(_) => "bytes",
        }
    }
}

/// Raw value together with the driver's null flag.
///
/// `native_type` is usually the column's declared tag. Dynamically typed
/// backends (SQLite expression columns) refine it from the stored value.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCell {
    pub native_type: NativeType,
    pub value: RawValue,
    pub was_null: bool,
}

impl RawCell {
    pub fn value(native_type: NativeType, value: RawValue) -> Self {
        Self {
            native_type,
            value,
            was_null: false,
        }
    }

    pub fn null(native_type: NativeType) -> Self {
        Self {
            native_type,
            value: RawValue::default_for(native_type),
            was_null: true,
        }
    }

    pub fn encode(self) -> Result<ExternalValue, CodecError> {
        encode(self.native_type, self.value, self.was_null)
    }
}

/// External serializable value.
#[derive(Debug, Clone, PartialEq)]
pub enum ExternalValue {
    Null,
    Integer(i64),
    Float(f64),
    /// Exact decimal text, never routed through binary floating point.
    Decimal(String),
    String(String),
    Boolean(bool),
    Bytes(Vec<u8>),
}

/// A raw value that cannot be encoded as its column's kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecError {
    pub tag: NativeType,
    pub message: String,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot encode {:?} value: {}", self.tag, self.message)
    }
}

impl std::error::Error for CodecError {}

// =============================================================================
// Encoding
// =============================================================================

/// Encode one column value.
///
/// Total over [`NativeType`]: unrecognized tags take the fallback branch. An
/// error is only returned when the raw value contradicts its tag (e.g. `"abc"`
/// in a DOUBLE column).
pub fn encode(tag: NativeType, raw: RawValue, was_null: bool) -> Result<ExternalValue, CodecError> {
    if was_null {
        return Ok(ExternalValue::Null);
    }

    let mismatch = |raw: &RawValue| CodecError {
        tag,
        message: format!("unexpected {} value", raw.type_name()),
    };

    match tag.kind() {
        ValueKind::Integer => match raw {
            RawValue::Int(v) => Ok(ExternalValue::Integer(v)),
            RawValue::Bool(b) => Ok(ExternalValue::Integer(i64::from(b))),
            RawValue::Text(s) => encode_integer_text(tag, s),
            other => Err(mismatch(&other)),
        },
        ValueKind::Decimal => match raw {
            RawValue::Text(s) => Ok(ExternalValue::Decimal(s.trim().to_string())),
            RawValue::Int(v) => Ok(ExternalValue::Decimal(v.to_string())),
            RawValue::Float(v) => Ok(ExternalValue::Decimal(v.to_string())),
            other => Err(mismatch(&other)),
        },
        ValueKind::Float => match raw {
            RawValue::Float(v) => Ok(ExternalValue::Float(v)),
            RawValue::Int(v) => Ok(ExternalValue::Float(v as f64)),
            RawValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .map(ExternalValue::Float)
                .map_err(|e| CodecError {
                    tag,
                    message: e.to_string(),
                }),
            other => Err(mismatch(&other)),
        },
        ValueKind::String => match raw {
            RawValue::Text(s) => Ok(ExternalValue::String(s)),
            RawValue::Int(v) => Ok(ExternalValue::String(v.to_string())),
            RawValue::Float(v) => Ok(ExternalValue::String(v.to_string())),
            RawValue::Bool(b) => Ok(ExternalValue::String(b.to_string())),
            RawValue::Bytes(bytes) => String::from_utf8(bytes)
                .map(ExternalValue::String)
                .map_err(|e| CodecError {
                    tag,
                    message: e.to_string(),
                }),
        },
        ValueKind::Boolean => match raw {
            RawValue::Bool(b) => Ok(ExternalValue::Boolean(b)),
            RawValue::Int(v) => Ok(ExternalValue::Boolean(v != 0)),
            RawValue::Text(s) => parse_bool(&s)
                .map(ExternalValue::Boolean)
                .ok_or_else(|| CodecError {
                    tag,
                    message: format!("'{}' is not a boolean", s),
                }),
            other => Err(mismatch(&other)),
        },
        ValueKind::Bytes => match raw {
            RawValue::Bytes(bytes) => Ok(ExternalValue::Bytes(bytes)),
            RawValue::Text(s) => Ok(ExternalValue::Bytes(s.into_bytes())),
            other => Err(mismatch(&other)),
        },
        ValueKind::Fallback => Ok(ExternalValue::String(fallback_text(raw))),
    }
}

/// Integer text from a text-protocol read. Values beyond `i64` (MySQL
/// `BIGINT UNSIGNED`) are kept exact as decimal text.
fn encode_integer_text(tag: NativeType, text: String) -> Result<ExternalValue, CodecError> {
    let trimmed = text.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Ok(ExternalValue::Integer(v));
    }
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(ExternalValue::Decimal(trimmed.to_string()));
    }
    match trimmed {
        "t" | "true" => Ok(ExternalValue::Integer(1)),
        "f" | "false" => Ok(ExternalValue::Integer(0)),
        _ => Err(CodecError {
            tag,
            message: format!("'{}' is not an integer", text),
        }),
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "1" | "y" | "yes" | "on" => Some(true),
        "f" | "false" | "0" | "n" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn fallback_text(raw: RawValue) -> String {
    match raw {
        RawValue::Int(v) => v.to_string(),
        RawValue::Float(v) => v.to_string(),
        RawValue::Text(s) => s,
        RawValue::Bool(b) => b.to_string(),
        RawValue::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => STANDARD.encode(e.into_bytes()),
        },
    }
}

// =============================================================================
// Serialization
// =============================================================================

impl Serialize for ExternalValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Integer(v) => serializer.serialize_i64(*v),
            Self::Float(v) if v.is_finite() => serializer.serialize_f64(*v),
            // JSON has no NaN/Infinity
            Self::Float(v) => serializer.serialize_str(&v.to_string()),
            Self::Decimal(text) => match decimal_number(text) {
                Some(raw) => raw.serialize(serializer),
                None => serializer.serialize_str(text),
            },
            Self::String(s) => serializer.serialize_str(s),
            Self::Boolean(b) => serializer.serialize_bool(*b),
            Self::Bytes(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
        }
    }
}

/// Decimal text as a raw JSON number token, if it is one.
fn decimal_number(text: &str) -> Option<Box<serde_json::value::RawValue>> {
    let first = text.bytes().next()?;
    if first != b'-' && !first.is_ascii_digit() {
        return None;
    }
    serde_json::value::RawValue::from_string(text.to_string()).ok()
}

/// One encoded row, serialized as a JSON object in column order.
pub struct EncodedRow<'a> {
    pub columns: &'a [ColumnDescriptor],
    pub values: &'a [ExternalValue],
}

impl Serialize for EncodedRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.columns.iter().zip(self.values) {
            map.serialize_entry(&column.name, value)?;
        }
        map.end()
    }
}

impl EncodedRow<'_> {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_TAGS: [NativeType; 30] = [
        NativeType::Integer,
        NativeType::Bit,
        NativeType::BigInt,
        NativeType::TinyInt,
        NativeType::SmallInt,
        NativeType::Decimal,
        NativeType::Numeric,
        NativeType::Float,
        NativeType::Real,
        NativeType::Double,
        NativeType::Char,
        NativeType::VarChar,
        NativeType::NVarChar,
        NativeType::LongVarChar,
        NativeType::LongNVarChar,
        NativeType::Date,
        NativeType::Time,
        NativeType::Timestamp,
        NativeType::Boolean,
        NativeType::Binary,
        NativeType::VarBinary,
        NativeType::LongVarBinary,
        NativeType::Blob,
        NativeType::Clob,
        NativeType::Array,
        NativeType::Struct,
        NativeType::Distinct,
        NativeType::Ref,
        NativeType::Object,
        NativeType::Other,
    ];

    fn to_json(value: &ExternalValue) -> String {
        serde_json::to_string(value).unwrap()
    }

    #[test]
    fn test_null_of_every_tag_encodes_to_null() {
        for tag in ALL_TAGS {
            let value = RawCell::null(tag).encode().unwrap();
            assert_eq!(value, ExternalValue::Null, "tag {:?}", tag);
        }
    }

    #[test]
    fn test_null_integer_does_not_surface_as_zero() {
        let value = encode(NativeType::Integer, RawValue::Int(0), true).unwrap();
        assert_eq!(to_json(&value), "null");

        let value = encode(NativeType::Integer, RawValue::Int(0), false).unwrap();
        assert_eq!(to_json(&value), "0");
    }

    #[test]
    fn test_integer_family_widens_to_i64() {
        let value = encode(NativeType::SmallInt, RawValue::Int(-7), false).unwrap();
        assert_eq!(value, ExternalValue::Integer(-7));

        let value = encode(NativeType::Bit, RawValue::Bool(true), false).unwrap();
        assert_eq!(value, ExternalValue::Integer(1));

        let value = encode(NativeType::BigInt, RawValue::Text("9007199254740993".into()), false)
            .unwrap();
        assert_eq!(value, ExternalValue::Integer(9_007_199_254_740_993));
    }

    #[test]
    fn test_unsigned_overflow_kept_exact() {
        let value =
            encode(NativeType::BigInt, RawValue::Text("18446744073709551615".into()), false)
                .unwrap();
        assert_eq!(to_json(&value), "18446744073709551615");
    }

    #[test]
    fn test_decimal_preserves_exact_text() {
        let text = "12345678901234567890.000000000000000001";
        let value = encode(NativeType::Decimal, RawValue::Text(text.into()), false).unwrap();
        assert_eq!(value, ExternalValue::Decimal(text.into()));
        assert_eq!(to_json(&value), text);
    }

    #[test]
    fn test_decimal_trailing_zeros_survive() {
        let value = encode(NativeType::Numeric, RawValue::Text("10.50".into()), false).unwrap();
        assert_eq!(to_json(&value), "10.50");
    }

    #[test]
    fn test_decimal_that_is_not_a_json_number_is_quoted() {
        let value = encode(NativeType::Numeric, RawValue::Text("NaN".into()), false).unwrap();
        assert_eq!(to_json(&value), "\"NaN\"");
    }

    #[test]
    fn test_float_family() {
        let value = encode(NativeType::Real, RawValue::Float(1.5), false).unwrap();
        assert_eq!(to_json(&value), "1.5");

        let value = encode(NativeType::Double, RawValue::Text("2.25".into()), false).unwrap();
        assert_eq!(value, ExternalValue::Float(2.25));

        let value = encode(NativeType::Double, RawValue::Float(f64::INFINITY), false).unwrap();
        assert_eq!(to_json(&value), "\"inf\"");
    }

    #[test]
    fn test_float_rejects_non_numeric_text() {
        let err = encode(NativeType::Double, RawValue::Text("abc".into()), false).unwrap_err();
        assert_eq!(err.tag, NativeType::Double);
    }

    #[test]
    fn test_date_and_timestamp_use_driver_text() {
        let value = encode(
            NativeType::Timestamp,
            RawValue::Text("2024-01-31 13:45:00".into()),
            false,
        )
        .unwrap();
        assert_eq!(value, ExternalValue::String("2024-01-31 13:45:00".into()));
    }

    #[test]
    fn test_boolean_from_text_protocol() {
        let value = encode(NativeType::Boolean, RawValue::Text("t".into()), false).unwrap();
        assert_eq!(value, ExternalValue::Boolean(true));

        let value = encode(NativeType::Boolean, RawValue::Int(0), false).unwrap();
        assert_eq!(value, ExternalValue::Boolean(false));
    }

    #[test]
    fn test_binary_is_base64() {
        let value = encode(NativeType::VarBinary, RawValue::Bytes(b"hello world".to_vec()), false)
            .unwrap();
        assert_eq!(to_json(&value), "\"aGVsbG8gd29ybGQ=\"");
    }

    #[test]
    fn test_large_objects() {
        let blob = vec![0xFF, 0xFE, 0x00, 0x01];
        let value = encode(NativeType::Blob, RawValue::Bytes(blob.clone()), false).unwrap();
        assert_eq!(value, ExternalValue::Bytes(blob));

        let value = encode(NativeType::Clob, RawValue::Text("long text".into()), false).unwrap();
        assert_eq!(value, ExternalValue::String("long text".into()));
    }

    #[test]
    fn test_unrecognized_types_fall_back_to_text() {
        let value = encode(NativeType::Other, RawValue::Int(42), false).unwrap();
        assert_eq!(value, ExternalValue::String("42".into()));

        let value = encode(NativeType::Array, RawValue::Text("{1,2,3}".into()), false).unwrap();
        assert_eq!(value, ExternalValue::String("{1,2,3}".into()));

        let value = encode(NativeType::Object, RawValue::Bytes(vec![0xFF, 0x00]), false).unwrap();
        assert_eq!(value, ExternalValue::String("/wA=".into()));
    }

    #[test]
    fn test_every_tag_has_a_kind() {
        for tag in ALL_TAGS {
            let raw = RawValue::default_for(tag);
            assert!(encode(tag, raw, false).is_ok(), "tag {:?}", tag);
        }
    }

    #[test]
    fn test_encoded_row_keeps_column_order() {
        let columns = vec![
            ColumnDescriptor::new("z", NativeType::Integer),
            ColumnDescriptor::new("a", NativeType::VarChar),
            ColumnDescriptor::new("m", NativeType::Decimal),
        ];
        let values = vec![
            ExternalValue::Integer(1),
            ExternalValue::Null,
            ExternalValue::Decimal("0.10".into()),
        ];
        let row = EncodedRow {
            columns: &columns,
            values: &values,
        };
        assert_eq!(row.to_json().unwrap(), r#"{"z":1,"a":null,"m":0.10}"#);
    }
}
