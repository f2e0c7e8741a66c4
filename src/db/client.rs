use crate::types::{AppError, Result};
use libsql::params::Params;
use libsql::{Builder, Connection, Database, Row, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A local SQLite database opened through libsql.
///
/// One connection is opened up front and shared by every clone so that
/// `:memory:` databases keep their contents for the life of the client.
#[derive(Clone)]
pub struct SqliteClient {
    _db: std::sync::Arc<Database>,
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteClient {
    /// Open (or create) a database file, creating parent directories.
    pub async fn new_local(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let db = Builder::new_local(&path)
            .build()
            .await
            .map_err(|e| AppError::Database(format!("Failed to open {:?}: {}", path, e)))?;

        Self::from_database(db, Some(path)).await
    }

    /// Open a private in-memory database.
    pub async fn new_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| AppError::Database(format!("Failed to open in-memory database: {}", e)))?;

        Self::from_database(db, None).await
    }

    async fn from_database(db: Database, path: Option<PathBuf>) -> Result<Self> {
        let conn = db
            .connect()
            .map_err(|e| AppError::Database(format!("Failed to get connection: {}", e)))?;

        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| AppError::Database(format!("Failed to enable foreign keys: {}", e)))?;

        debug!(path = ?path, "Opened database");
        Ok(Self {
            _db: std::sync::Arc::new(db),
            conn,
            path,
        })
    }

    pub fn connection(&self) -> Connection {
        self.conn.clone()
    }

    /// File backing this database, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Display form of the path for health reports.
    pub fn display_path(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ":memory:".to_string())
    }

    /// Size of the database file in bytes (0 for in-memory databases).
    pub async fn file_size(&self) -> u64 {
        match self.path {
            Some(ref p) => tokio::fs::metadata(p).await.map(|m| m.len()).unwrap_or(0),
            None => 0,
        }
    }

    /// Execute a statement, returning the number of affected rows.
    pub async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64> {
        self.conn
            .execute(sql, Params::Positional(params))
            .await
            .map_err(|e| AppError::Database(format!("Failed to execute `{}`: {}", first_line(sql), e)))
    }

    /// Execute several `;`-separated statements without parameters.
    pub async fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn
            .execute_batch(sql)
            .await
            .map_err(|e| AppError::Database(format!("Failed to execute batch: {}", e)))?;
        Ok(())
    }

    /// Run a query and map every row while the cursor is positioned on it.
    pub async fn query_map<T, F>(&self, sql: &str, params: Vec<Value>, mut f: F) -> Result<Vec<T>>
    where
        F: FnMut(&Row) -> Result<T>,
    {
        let mut rows = self
            .conn
            .query(sql, Params::Positional(params))
            .await
            .map_err(|e| AppError::Database(format!("Failed to query `{}`: {}", first_line(sql), e)))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            out.push(f(&row)?);
        }
        Ok(out)
    }

    /// First mapped row, if any.
    pub async fn query_opt<T, F>(&self, sql: &str, params: Vec<Value>, f: F) -> Result<Option<T>>
    where
        F: FnMut(&Row) -> Result<T>,
    {
        Ok(self.query_map(sql, params, f).await?.into_iter().next())
    }

    /// Single integer result, e.g. `SELECT COUNT(*) ...`.
    pub async fn count(&self, sql: &str, params: Vec<Value>) -> Result<i64> {
        Ok(self
            .query_opt(sql, params, |row| row.int(0))
            .await?
            .unwrap_or(0))
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        let n = self
            .count(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                vec![text(table)],
            )
            .await?;
        Ok(n > 0)
    }

    pub async fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        let n = self
            .count(
                "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
                vec![text(table), text(column)],
            )
            .await?;
        Ok(n > 0)
    }
}

fn first_line(sql: &str) -> &str {
    sql.trim().lines().next().unwrap_or("")
}

// ============= Parameter helpers =============

pub fn text(value: impl Into<String>) -> Value {
    Value::Text(value.into())
}

pub fn opt_text<S: Into<String>>(value: Option<S>) -> Value {
    value.map(|v| Value::Text(v.into())).unwrap_or(Value::Null)
}

pub fn int(value: i64) -> Value {
    Value::Integer(value)
}

pub fn real(value: f64) -> Value {
    Value::Real(value)
}

pub fn opt_real(value: Option<f64>) -> Value {
    value.map(Value::Real).unwrap_or(Value::Null)
}

pub fn blob(value: Vec<u8>) -> Value {
    Value::Blob(value)
}

/// Serialize a value to a JSON text column.
pub fn json<T: serde::Serialize>(value: &T) -> Result<Value> {
    Ok(Value::Text(serde_json::to_string(value)?))
}

pub fn opt_json<T: serde::Serialize>(value: Option<&T>) -> Result<Value> {
    match value {
        Some(v) => json(v),
        None => Ok(Value::Null),
    }
}

// ============= Row helpers =============

/// Typed column access with errors mapped to [`AppError::Database`].
pub trait RowExt {
    fn value(&self, idx: i32) -> Result<Value>;

    fn text(&self, idx: i32) -> Result<String> {
        self.opt_text(idx)?
            .ok_or_else(|| AppError::Database(format!("Column {} is NULL", idx)))
    }

    fn opt_text(&self, idx: i32) -> Result<Option<String>> {
        match self.value(idx)? {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s)),
            Value::Integer(i) => Ok(Some(i.to_string())),
            Value::Real(r) => Ok(Some(r.to_string())),
            Value::Blob(b) => Ok(Some(String::from_utf8_lossy(&b).into_owned())),
        }
    }

    fn int(&self, idx: i32) -> Result<i64> {
        self.opt_int(idx)?
            .ok_or_else(|| AppError::Database(format!("Column {} is NULL", idx)))
    }

    fn opt_int(&self, idx: i32) -> Result<Option<i64>> {
        match self.value(idx)? {
            Value::Null => Ok(None),
            Value::Integer(i) => Ok(Some(i)),
            Value::Real(r) => Ok(Some(r as i64)),
            Value::Text(s) => s
                .parse()
                .map(Some)
                .map_err(|_| AppError::Database(format!("Column {} is not an integer", idx))),
            Value::Blob(_) => Err(AppError::Database(format!("Column {} is a blob", idx))),
        }
    }

    fn opt_real(&self, idx: i32) -> Result<Option<f64>> {
        match self.value(idx)? {
            Value::Null => Ok(None),
            Value::Real(r) => Ok(Some(r)),
            Value::Integer(i) => Ok(Some(i as f64)),
            Value::Text(s) => s
                .parse()
                .map(Some)
                .map_err(|_| AppError::Database(format!("Column {} is not a number", idx))),
            Value::Blob(_) => Err(AppError::Database(format!("Column {} is a blob", idx))),
        }
    }

    fn real(&self, idx: i32) -> Result<f64> {
        Ok(self.opt_real(idx)?.unwrap_or(0.0))
    }

    fn opt_blob(&self, idx: i32) -> Result<Option<Vec<u8>>> {
        match self.value(idx)? {
            Value::Null => Ok(None),
            Value::Blob(b) => Ok(Some(b)),
            _ => Err(AppError::Database(format!("Column {} is not a blob", idx))),
        }
    }

    /// JSON text column; NULL or malformed text decodes to `None`.
    fn opt_json(&self, idx: i32) -> Result<Option<serde_json::Value>> {
        Ok(self
            .opt_text(idx)?
            .and_then(|s| serde_json::from_str(&s).ok()))
    }

    /// JSON string-array column; NULL or malformed text decodes to empty.
    fn string_list(&self, idx: i32) -> Result<Vec<String>> {
        Ok(self
            .opt_text(idx)?
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default())
    }

    /// Embedding blob column decoded to floats.
    fn embedding(&self, idx: i32) -> Result<Option<Vec<f32>>> {
        match self.opt_blob(idx)? {
            Some(bytes) => Ok(Some(memoria_vector::decode_embedding(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl RowExt for Row {
    fn value(&self, idx: i32) -> Result<Value> {
        self.get_value(idx)
            .map_err(|e| AppError::Database(format!("Failed to read column {}: {}", idx, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_database_keeps_state() {
        let client = SqliteClient::new_memory().await.unwrap();
        client
            .execute_batch("CREATE TABLE t (id TEXT PRIMARY KEY, n INTEGER, data BLOB)")
            .await
            .unwrap();
        client
            .execute(
                "INSERT INTO t (id, n, data) VALUES (?1, ?2, ?3)",
                vec![text("a"), int(3), blob(memoria_vector::encode_embedding(&[1.0, 2.0]))],
            )
            .await
            .unwrap();

        let rows = client
            .query_map("SELECT id, n, data FROM t", vec![], |row| {
                Ok((row.text(0)?, row.int(1)?, row.embedding(2)?))
            })
            .await
            .unwrap();
        assert_eq!(rows, vec![("a".to_string(), 3, Some(vec![1.0, 2.0]))]);
    }

    #[tokio::test]
    async fn test_count_and_column_exists() {
        let client = SqliteClient::new_memory().await.unwrap();
        client
            .execute_batch("CREATE TABLE t (id TEXT, note TEXT)")
            .await
            .unwrap();
        assert!(client.table_exists("t").await.unwrap());
        assert!(!client.table_exists("missing").await.unwrap());
        assert!(client.column_exists("t", "note").await.unwrap());
        assert!(!client.column_exists("t", "other").await.unwrap());
        assert_eq!(client.count("SELECT COUNT(*) FROM t", vec![]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_null_handling() {
        let client = SqliteClient::new_memory().await.unwrap();
        client
            .execute_batch("CREATE TABLE t (a TEXT, b REAL)")
            .await
            .unwrap();
        client
            .execute(
                "INSERT INTO t (a, b) VALUES (?1, ?2)",
                vec![opt_text(None::<String>), opt_real(None)],
            )
            .await
            .unwrap();
        let row = client
            .query_opt("SELECT a, b FROM t", vec![], |row| {
                Ok((row.opt_text(0)?, row.opt_real(1)?))
            })
            .await
            .unwrap();
        assert_eq!(row, Some((None, None)));
    }

    #[tokio::test]
    async fn test_local_file_created_with_parents() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("test.db");
        let client = SqliteClient::new_local(&path).await.unwrap();
        client.execute_batch("CREATE TABLE t (x INTEGER)").await.unwrap();
        assert!(path.exists());
        assert!(client.file_size().await > 0);
        assert_eq!(client.path(), Some(path.as_path()));
    }
}
