//! Query-related data models.
//!
//! This module defines the value objects that flow through a chunked read and
//! the results handed back across the dispatch boundary.

use serde::{Deserialize, Serialize};

/// One slice of a chunked read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkTask {
    pub query: String,
    /// Rows to skip before the first emitted row.
    pub start_row: u64,
    pub chunk_size: u64,
}

impl ChunkTask {
    pub fn new(query: impl Into<String>, start_row: u64, chunk_size: u64) -> Self {
        Self {
            query: query.into(),
            start_row,
            chunk_size,
        }
    }
}

/// Serialized rows produced by one [`ChunkTask`].
///
/// Each entry in `rows` is a complete JSON object keyed by column label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkFragment {
    pub start_row: u64,
    pub rows: Vec<String>,
}

impl ChunkFragment {
    pub fn new(start_row: u64) -> Self {
        Self {
            start_row,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render the fragment as a JSON array of row objects.
    pub fn to_json(&self) -> String {
        let body_len: usize = self.rows.iter().map(|r| r.len() + 1).sum();
        let mut out = String::with_capacity(body_len + 2);
        out.push('[');
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(row);
        }
        out.push(']');
        out
    }
}

/// Outcome of a chunked read, fragments in ascending offset order.
#[derive(Debug, Clone, Default)]
pub struct ReadResult {
    pub total_rows: u64,
    pub chunk_size: u64,
    pub fragments: Vec<ChunkFragment>,
}

impl ReadResult {
    /// All serialized rows in result-set order.
    pub fn rows(&self) -> impl Iterator<Item = &str> {
        self.fragments
            .iter()
            .flat_map(|f| f.rows.iter().map(String::as_str))
    }

    pub fn into_json_fragments(self) -> Vec<String> {
        self.fragments.iter().map(ChunkFragment::to_json).collect()
    }
}

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    pub affected_rows: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_fragment_renders_empty_array() {
        assert_eq!(ChunkFragment::new(0).to_json(), "[]");
    }

    #[test]
    fn test_fragment_to_json_is_valid_array() {
        let fragment = ChunkFragment {
            start_row: 5,
            rows: vec![r#"{"id":6}"#.to_string(), r#"{"id":7}"#.to_string()],
        };
        let json = fragment.to_json();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, serde_json::json!([{"id": 6}, {"id": 7}]));
    }

    #[test]
    fn test_read_result_rows_follow_fragment_order() {
        let result = ReadResult {
            total_rows: 3,
            chunk_size: 2,
            fragments: vec![
                ChunkFragment {
                    start_row: 0,
                    rows: vec!["a".into(), "b".into()],
                },
                ChunkFragment {
                    start_row: 2,
                    rows: vec!["c".into()],
                },
            ],
        };
        assert_eq!(result.rows().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_write_result_uses_camel_case() {
        let json = serde_json::to_string(&WriteResult { affected_rows: 1 }).unwrap();
        assert_eq!(json, r#"{"affectedRows":1}"#);
    }
}
