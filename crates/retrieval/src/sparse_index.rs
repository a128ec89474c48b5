//! Sparse inverted-index scoring over SQLite
//!
//! The index is built offline and opened strictly read-only here. Schema:
//!
//! ```sql
//! documents(id INTEGER PRIMARY KEY, filename TEXT UNIQUE NOT NULL)
//! inverted_index(term INTEGER NOT NULL,
//!                document_id INTEGER NOT NULL REFERENCES documents(id),
//!                score REAL NOT NULL)   -- indexed on term
//! ```
//!
//! Scoring is a single weighted join: the query's (term, weight) pairs are
//! bound as a VALUES relation and summed against matching postings.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};

use paperdex_core::ScoredDoc;
use paperdex_encoder::SparseVector;

use crate::RetrievalError;

/// Handle to the sparse index database.
///
/// Holds only the path: every query opens its own read-only connection, so
/// concurrent searches fan out across SQLite's multi-reader mode instead of
/// serializing on one connection.
#[derive(Debug, Clone)]
pub struct SparseIndex {
    path: PathBuf,
}

impl SparseIndex {
    /// Open the index and verify the expected tables exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RetrievalError> {
        let path = path.as_ref().to_path_buf();
        let index = Self { path };

        let conn = index.connection()?;
        for table in ["documents", "inverted_index"] {
            let present: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
                    [table],
                    |row| row.get(0),
                )
                .map_err(RetrievalError::Sql)?;
            if !present {
                return Err(RetrievalError::Index(format!(
                    "sparse index at {:?} is missing the {} table",
                    index.path, table
                )));
            }
        }

        Ok(index)
    }

    fn connection(&self) -> Result<Connection, RetrievalError> {
        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(RetrievalError::Sql)
    }

    /// Top-k weighted-sum scoring for an encoded query.
    ///
    /// Returns documents sharing at least one term with the query, ordered
    /// by `SUM(posting.score * query.weight)` descending. An empty query
    /// vector yields an empty result without touching the database.
    pub fn search_blocking(
        &self,
        query: &SparseVector,
        k: usize,
    ) -> Result<Vec<ScoredDoc>, RetrievalError> {
        if query.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let placeholders = vec!["(?,?)"; query.len()].join(", ");
        let sql = format!(
            "WITH query_terms(term, score) AS (VALUES {placeholders}) \
             SELECT d.filename AS document, SUM(idx.score * q.score) AS total_score \
             FROM inverted_index AS idx \
             JOIN query_terms AS q ON idx.term = q.term \
             JOIN documents AS d ON idx.document_id = d.id \
             GROUP BY idx.document_id, d.filename \
             ORDER BY total_score DESC \
             LIMIT ?"
        );

        let mut params: Vec<rusqlite::types::Value> = Vec::with_capacity(query.len() * 2 + 1);
        for (term, weight) in &query.entries {
            params.push(rusqlite::types::Value::Integer(i64::from(*term)));
            params.push(rusqlite::types::Value::Real(f64::from(*weight)));
        }
        params.push(rusqlite::types::Value::Integer(k as i64));

        let conn = self.connection()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
            Ok(ScoredDoc {
                document_id: row.get(0)?,
                score: row.get(1)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Async wrapper running the SQL read on a blocking thread
    pub async fn search(
        &self,
        query: SparseVector,
        k: usize,
    ) -> Result<Vec<ScoredDoc>, RetrievalError> {
        let index = self.clone();
        tokio::task::spawn_blocking(move || index.search_blocking(&query, k))
            .await
            .map_err(|e| RetrievalError::Task(e.to_string()))?
    }

    /// Read the full `(id, filename)` mapping from the documents table.
    /// The loader uses it to translate ANN slot ids back to document ids.
    pub fn document_map(&self) -> Result<HashMap<usize, String>, RetrievalError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare("SELECT id, filename FROM documents")?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let filename: String = row.get(1)?;
            Ok((id as usize, filename))
        })?;

        let mut map = HashMap::new();
        for row in rows {
            let (id, filename) = row?;
            map.insert(id, filename);
        }
        Ok(map)
    }
}
