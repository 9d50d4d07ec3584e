//! Database layer.
//!
//! Leaf-first:
//! - `codec`: native type tags and value encoding
//! - `types`: backend type mapping and cell decoding
//! - `driver`: the `Driver`/`Session` seam
//! - `pool`: sqlx-backed driver
//! - `serializer`: renders one chunk of rows
//! - `lifecycle`: owns the live session and classifies errors
//! - `gateway`: chunked reads and retried writes

pub mod codec;
pub mod driver;
pub mod gateway;
pub mod lifecycle;
#[macro_use]
pub mod macros;
pub mod pool;
pub mod serializer;
pub mod types;

pub use codec::{ColumnDescriptor, ExternalValue, NativeType, RawCell, RawValue, encode};
pub use driver::{Driver, RawRow, RowCursor, Session};
pub use gateway::{QueryGateway, chunk_offsets};
pub use lifecycle::{ConnectionManager, ErrorClass, TRANSIENT_SQL_STATES, classify};
pub use pool::{DbPool, SqlxDriver, SqlxSession};
pub use serializer::render_chunk;
