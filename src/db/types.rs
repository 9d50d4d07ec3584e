//! Backend type mappings.
//!
//! Maps driver type names onto the closed [`NativeType`] set and reads column
//! values into [`RawCell`]s for the value codec.
//!
//! # Architecture
//!
//! Reading a cell is a two-phase process:
//! 1. `native_type` classifies the column from its metadata using an exact-match
//!    table per backend
//! 2. The backend decoder picks the driver read for that tag's [`ValueKind`],
//!    checking the null flag before touching the value
//!
//! Reads issued through [`crate::db::pool::SqlxSession`] use the text protocol on
//! MySQL and PostgreSQL, so every decoder keeps a text fallback.

use crate::db::codec::{ColumnDescriptor, NativeType, RawCell, RawValue, ValueKind};
use crate::error::{DbError, DbResult};
use crate::models::DatabaseType;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};

// =============================================================================
// Type Classification
// =============================================================================

/// Classify a driver type name.
///
/// Names the backend does not list map to [`NativeType::Other`] and take the
/// codec's fallback branch.
pub fn native_type(type_name: &str, db: DatabaseType) -> NativeType {
    let upper = type_name.trim().to_ascii_uppercase();
    match db {
        DatabaseType::PostgreSQL => postgres_type(&upper),
        DatabaseType::MySQL => mysql_type(upper.trim_end_matches(" UNSIGNED")),
        DatabaseType::SQLite => sqlite_type(&upper),
    }
}

fn postgres_type(name: &str) -> NativeType {
    if name.ends_with("[]") {
        return NativeType::Array;
    }
    match name {
        "INT2" => NativeType::SmallInt,
        "INT4" => NativeType::Integer,
        "INT8" | "OID" => NativeType::BigInt,
        "NUMERIC" => NativeType::Numeric,
        "FLOAT4" => NativeType::Real,
        "FLOAT8" => NativeType::Double,
        "CHAR" | "BPCHAR" => NativeType::Char,
        "VARCHAR" | "NAME" => NativeType::VarChar,
        "TEXT" | "CITEXT" => NativeType::LongVarChar,
        "DATE" => NativeType::Date,
        "TIME" | "TIMETZ" => NativeType::Time,
        "TIMESTAMP" | "TIMESTAMPTZ" => NativeType::Timestamp,
        "BOOL" => NativeType::Boolean,
        "BYTEA" => NativeType::LongVarBinary,
        "RECORD" => NativeType::Struct,
        _ => NativeType::Other,
    }
}

fn mysql_type(name: &str) -> NativeType {
    match name {
        "TINYINT" => NativeType::TinyInt,
        "SMALLINT" | "YEAR" => NativeType::SmallInt,
        "MEDIUMINT" | "INT" => NativeType::Integer,
        "BIGINT" => NativeType::BigInt,
        "BIT" => NativeType::Bit,
        "BOOLEAN" => NativeType::Boolean,
        "DECIMAL" => NativeType::Decimal,
        "FLOAT" => NativeType::Real,
        "DOUBLE" => NativeType::Double,
        "CHAR" | "ENUM" | "SET" => NativeType::Char,
        "VARCHAR" => NativeType::VarChar,
        "TINYTEXT" | "TEXT" => NativeType::LongVarChar,
        "MEDIUMTEXT" | "LONGTEXT" => NativeType::Clob,
        "DATE" => NativeType::Date,
        "TIME" => NativeType::Time,
        "DATETIME" | "TIMESTAMP" => NativeType::Timestamp,
        "BINARY" => NativeType::Binary,
        "VARBINARY" => NativeType::VarBinary,
        "TINYBLOB" | "BLOB" => NativeType::LongVarBinary,
        "MEDIUMBLOB" | "LONGBLOB" => NativeType::Blob,
        _ => NativeType::Other,
    }
}

/// SQLite reports declared affinities; `NUMERIC` and undeclared columns are
/// typed per value.
fn sqlite_type(name: &str) -> NativeType {
    match name {
        "INTEGER" => NativeType::BigInt,
        "REAL" => NativeType::Double,
        "TEXT" => NativeType::LongVarChar,
        "BLOB" => NativeType::Blob,
        "BOOLEAN" => NativeType::Boolean,
        "DATE" => NativeType::Date,
        "TIME" => NativeType::Time,
        "DATETIME" => NativeType::Timestamp,
        _ => NativeType::Other,
    }
}

/// Column descriptors for a result row, in column order.
pub fn describe<R>(row: &R, db: DatabaseType) -> Vec<ColumnDescriptor>
where
    R: Row,
{
    row.columns()
        .iter()
        .map(|col| ColumnDescriptor::new(col.name(), native_type(col.type_info().name(), db)))
        .collect()
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        ty.name().eq_ignore_ascii_case("DECIMAL")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        ty.name().eq_ignore_ascii_case("NUMERIC")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

// =============================================================================
// Row Decoding
// =============================================================================

/// Read every cell of a row according to its column descriptor.
pub trait DecodeRow: Row {
    fn decode_cells(&self, columns: &[ColumnDescriptor]) -> DbResult<Vec<RawCell>>;
}

fn column_error(column: &ColumnDescriptor) -> impl Fn(sqlx::Error) -> DbError + '_ {
    move |e| DbError::serialization(column.name.clone(), e.to_string())
}

impl DecodeRow for MySqlRow {
    fn decode_cells(&self, columns: &[ColumnDescriptor]) -> DbResult<Vec<RawCell>> {
        columns
            .iter()
            .enumerate()
            .map(|(idx, col)| mysql::decode_column(self, idx, col.native_type).map_err(column_error(col)))
            .collect()
    }
}

impl DecodeRow for PgRow {
    fn decode_cells(&self, columns: &[ColumnDescriptor]) -> DbResult<Vec<RawCell>> {
        columns
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                postgres::decode_column(self, idx, col.native_type).map_err(column_error(col))
            })
            .collect()
    }
}

impl DecodeRow for SqliteRow {
    fn decode_cells(&self, columns: &[ColumnDescriptor]) -> DbResult<Vec<RawCell>> {
        columns
            .iter()
            .enumerate()
            .map(|(idx, col)| sqlite::decode_column(self, idx, col.native_type).map_err(column_error(col)))
            .collect()
    }
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod mysql {
    use super::*;

    pub fn decode_column(row: &MySqlRow, idx: usize, tag: NativeType) -> Result<RawCell, sqlx::Error> {
        if row.try_get_raw(idx)?.is_null() {
            return Ok(RawCell::null(tag));
        }

        let value = match tag.kind() {
            ValueKind::Integer if tag == NativeType::Bit => decode_bit(row, idx)?,
            ValueKind::Integer => decode_integer(row, idx)?,
            ValueKind::Decimal => RawValue::Text(row.try_get::<RawDecimal, _>(idx)?.0),
            ValueKind::Float => decode_float(row, idx)?,
            ValueKind::Boolean => match row.try_get::<bool, _>(idx) {
                Ok(v) => RawValue::Bool(v),
                Err(_) => decode_integer(row, idx)?,
            },
            ValueKind::Bytes => RawValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
            ValueKind::String | ValueKind::Fallback => decode_text(row, idx)?,
        };
        Ok(RawCell::value(tag, value))
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> Result<RawValue, sqlx::Error> {
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Ok(RawValue::Int(v));
        }
        if let Ok(v) = row.try_get::<u64, _>(idx) {
            return Ok(match i64::try_from(v) {
                Ok(v) => RawValue::Int(v),
                Err(_) => RawValue::Text(v.to_string()),
            });
        }
        Ok(RawValue::Text(row.try_get_unchecked::<String, _>(idx)?))
    }

    /// BIT(n) arrives as big-endian bytes on the text protocol.
    fn decode_bit(row: &MySqlRow, idx: usize) -> Result<RawValue, sqlx::Error> {
        let bytes = row.try_get_unchecked::<Vec<u8>, _>(idx)?;
        let value = bytes
            .iter()
            .take(8)
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
        Ok(match i64::try_from(value) {
            Ok(v) => RawValue::Int(v),
            Err(_) => RawValue::Text(value.to_string()),
        })
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> Result<RawValue, sqlx::Error> {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Ok(RawValue::Float(v));
        }
        if let Ok(v) = row.try_get::<f32, _>(idx) {
            return Ok(RawValue::Float(f64::from(v)));
        }
        Ok(RawValue::Text(row.try_get_unchecked::<String, _>(idx)?))
    }

    fn decode_text(row: &MySqlRow, idx: usize) -> Result<RawValue, sqlx::Error> {
        match row.try_get_unchecked::<String, _>(idx) {
            Ok(v) => Ok(RawValue::Text(v)),
            // GEOMETRY and friends are not UTF-8
            Err(_) => Ok(RawValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(idx)?)),
        }
    }
}

mod postgres {
    use super::*;

    pub fn decode_column(row: &PgRow, idx: usize, tag: NativeType) -> Result<RawCell, sqlx::Error> {
        if row.try_get_raw(idx)?.is_null() {
            return Ok(RawCell::null(tag));
        }

        let value = match tag.kind() {
            ValueKind::Integer => decode_integer(row, idx)?,
            ValueKind::Decimal => RawValue::Text(row.try_get::<RawDecimal, _>(idx)?.0),
            ValueKind::Float => decode_float(row, idx)?,
            ValueKind::Boolean => RawValue::Bool(row.try_get::<bool, _>(idx)?),
            ValueKind::Bytes => RawValue::Bytes(row.try_get::<Vec<u8>, _>(idx)?),
            ValueKind::String | ValueKind::Fallback => {
                RawValue::Text(row.try_get_unchecked::<String, _>(idx)?)
            }
        };
        Ok(RawCell::value(tag, value))
    }

    fn decode_integer(row: &PgRow, idx: usize) -> Result<RawValue, sqlx::Error> {
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Ok(RawValue::Int(v));
        }
        if let Ok(v) = row.try_get::<i32, _>(idx) {
            return Ok(RawValue::Int(i64::from(v)));
        }
        if let Ok(v) = row.try_get::<i16, _>(idx) {
            return Ok(RawValue::Int(i64::from(v)));
        }
        Ok(RawValue::Text(row.try_get_unchecked::<String, _>(idx)?))
    }

    fn decode_float(row: &PgRow, idx: usize) -> Result<RawValue, sqlx::Error> {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Ok(RawValue::Float(v));
        }
        Ok(RawValue::Float(f64::from(row.try_get::<f32, _>(idx)?)))
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(
        row: &SqliteRow,
        idx: usize,
        declared: NativeType,
    ) -> Result<RawCell, sqlx::Error> {
        let value_ref = row.try_get_raw(idx)?;
        if value_ref.is_null() {
            return Ok(RawCell::null(declared));
        }

        // Storage class of this particular value
        let storage = value_ref.type_info().name().to_ascii_uppercase();
        let tag = match declared {
            NativeType::Other => sqlite_type(&storage),
            tag => tag,
        };

        let value = match storage.as_str() {
            "INTEGER" => RawValue::Int(row.try_get_unchecked::<i64, _>(idx)?),
            "REAL" => RawValue::Float(row.try_get_unchecked::<f64, _>(idx)?),
            "BLOB" => RawValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
            _ => RawValue::Text(row.try_get_unchecked::<String, _>(idx)?),
        };
        Ok(RawCell::value(tag, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_type_integer() {
        assert_eq!(native_type("INT4", DatabaseType::PostgreSQL), NativeType::Integer);
        assert_eq!(native_type("INT8", DatabaseType::PostgreSQL), NativeType::BigInt);
        assert_eq!(native_type("TINYINT", DatabaseType::MySQL), NativeType::TinyInt);
        assert_eq!(
            native_type("BIGINT UNSIGNED", DatabaseType::MySQL),
            NativeType::BigInt
        );
        assert_eq!(native_type("INTEGER", DatabaseType::SQLite), NativeType::BigInt);
    }

    #[test]
    fn test_native_type_decimal() {
        assert_eq!(native_type("DECIMAL", DatabaseType::MySQL), NativeType::Decimal);
        assert_eq!(native_type("NUMERIC", DatabaseType::PostgreSQL), NativeType::Numeric);
        // SQLite NUMERIC affinity is typed per value
        assert_eq!(native_type("NUMERIC", DatabaseType::SQLite), NativeType::Other);
    }

    #[test]
    fn test_native_type_uses_exact_names() {
        // "POINT" contains "INT" but is not an integer
        assert_eq!(native_type("POINT", DatabaseType::PostgreSQL), NativeType::Other);
        assert_eq!(native_type("INTERVAL", DatabaseType::PostgreSQL), NativeType::Other);
    }

    #[test]
    fn test_native_type_text_and_temporal() {
        assert_eq!(native_type("varchar", DatabaseType::PostgreSQL), NativeType::VarChar);
        assert_eq!(native_type("LONGTEXT", DatabaseType::MySQL), NativeType::Clob);
        assert_eq!(native_type("DATETIME", DatabaseType::MySQL), NativeType::Timestamp);
        assert_eq!(native_type("TIMESTAMPTZ", DatabaseType::PostgreSQL), NativeType::Timestamp);
    }

    #[test]
    fn test_native_type_binary_and_structured() {
        assert_eq!(native_type("BYTEA", DatabaseType::PostgreSQL), NativeType::LongVarBinary);
        assert_eq!(native_type("LONGBLOB", DatabaseType::MySQL), NativeType::Blob);
        assert_eq!(native_type("INT4[]", DatabaseType::PostgreSQL), NativeType::Array);
        assert_eq!(native_type("JSONB", DatabaseType::PostgreSQL), NativeType::Other);
        assert_eq!(native_type("BIT", DatabaseType::PostgreSQL), NativeType::Other);
        assert_eq!(native_type("BIT", DatabaseType::MySQL), NativeType::Bit);
    }
}
