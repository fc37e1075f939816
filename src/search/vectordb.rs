//! Vector store using SQLite
//!
//! One table per namespace, embeddings stored as little-endian f32 BLOBs.
//! Similarity is computed in Rust over a full scan (see `ranking`).
//!
//! Every operation opens its own connection and runs inside a transaction,
//! committed before returning. The database runs in WAL mode so readers
//! never block on, or observe half of, a concurrent upsert.

use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Transaction, TransactionBehavior,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::core::error::{Result, SearchError};
use crate::core::record::{Namespace, Record};

const META_MODEL_ID: &str = "model_id";
const META_EMBEDDING_DIM: &str = "embedding_dim";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A record as persisted, with its embedding
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord<R> {
    pub record: R,
    pub embedding: Vec<f32>,
}

/// Row counts and freshness per namespace
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceStats {
    pub namespace: Namespace,
    pub count: usize,
    pub last_indexed: Option<i64>,
}

/// Index statistics
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStats {
    pub namespaces: Vec<NamespaceStats>,
    pub model_id: Option<String>,
    pub dimension: Option<usize>,
}

/// Durable id → (metadata, embedding) mapping
#[derive(Debug, Clone)]
pub struct VectorStore {
    db_path: PathBuf,
}

impl VectorStore {
    /// Open or create the database at path, creating parent directories
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let store = Self {
            db_path: db_path.to_path_buf(),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        Ok(conn)
    }

    /// Run `f` in a fresh transaction. Commits on success; on any error the
    /// transaction is dropped, which rolls it back.
    fn with_transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        self.with_transaction_behavior(TransactionBehavior::Deferred, f)
    }

    fn with_transaction_behavior<T>(
        &self,
        behavior: TransactionBehavior,
        f: impl FnOnce(&Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(behavior)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    fn init_schema(&self) -> Result<()> {
        self.with_transaction(|tx| {
            for namespace in Namespace::all() {
                let columns: String = namespace
                    .columns()
                    .iter()
                    .map(|c| {
                        if *c == "name" {
                            format!("{} TEXT NOT NULL,", c)
                        } else {
                            format!("{} TEXT,", c)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n                ");

                tx.execute_batch(&format!(
                    r#"
                    CREATE TABLE IF NOT EXISTS {table} (
                        id TEXT PRIMARY KEY,
                        {columns}
                        embedding BLOB NOT NULL,
                        dim INTEGER NOT NULL,
                        indexed_at INTEGER NOT NULL
                    );
                    "#,
                    table = namespace.table(),
                    columns = columns,
                ))?;
            }

            tx.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS index_meta (
                    key TEXT PRIMARY KEY,
                    value TEXT
                );
                "#,
            )?;
            Ok(())
        })
    }

    /// Insert the record, or replace every field and the embedding if the id exists
    pub fn upsert<R: Record>(&self, record: &R, embedding: &[f32]) -> Result<()> {
        let namespace = R::NAMESPACE;
        let columns = namespace.columns();

        let mut values: Vec<Value> = Vec::with_capacity(columns.len() + 4);
        values.push(Value::Text(record.id().to_string()));
        values.extend(
            record
                .fields()
                .into_iter()
                .map(|f| Value::Text(f.unwrap_or("").to_string())),
        );
        values.push(Value::Blob(embedding_to_blob(embedding)));
        values.push(Value::Integer(embedding.len() as i64));
        values.push(Value::Integer(chrono::Utc::now().timestamp()));

        let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{}", i)).collect();
        let updates: Vec<String> = columns
            .iter()
            .chain(["embedding", "dim", "indexed_at"].iter())
            .map(|c| format!("{c} = excluded.{c}"))
            .collect();

        let sql = format!(
            "INSERT INTO {table} (id, {columns}, embedding, dim, indexed_at) VALUES ({placeholders}) \
             ON CONFLICT(id) DO UPDATE SET {updates}",
            table = namespace.table(),
            columns = columns.join(", "),
            placeholders = placeholders.join(", "),
            updates = updates.join(", "),
        );

        self.with_transaction(|tx| {
            tx.execute(&sql, params_from_iter(values))?;
            Ok(())
        })?;

        debug!("Upserted {} '{}' ({} dims)", namespace, record.id(), embedding.len());
        Ok(())
    }

    /// Get one record by id
    pub fn get<R: Record>(&self, id: &str) -> Result<Option<StoredRecord<R>>> {
        let namespace = R::NAMESPACE;
        let sql = format!(
            "SELECT id, {columns}, embedding, dim FROM {table} WHERE id = ?1",
            columns = namespace.columns().join(", "),
            table = namespace.table(),
        );

        let raw = self.with_transaction(|tx| {
            Ok(tx
                .query_row(&sql, params![id], |row| read_row(row, namespace))
                .optional()?)
        })?;

        raw.map(decode_row::<R>).transpose()
    }

    /// All records of the namespace, in storage order
    pub fn get_all<R: Record>(&self) -> Result<Vec<StoredRecord<R>>> {
        let namespace = R::NAMESPACE;
        let sql = format!(
            "SELECT id, {columns}, embedding, dim FROM {table} ORDER BY rowid",
            columns = namespace.columns().join(", "),
            table = namespace.table(),
        );

        let rows = self.with_transaction(|tx| {
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| read_row(row, namespace))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        rows.into_iter().map(decode_row::<R>).collect()
    }

    pub fn count(&self, namespace: Namespace) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", namespace.table());
        let count: i64 = self.with_transaction(|tx| Ok(tx.query_row(&sql, [], |row| row.get(0))?))?;
        Ok(count as usize)
    }

    /// Get index statistics
    pub fn stats(&self) -> Result<IndexStats> {
        self.with_transaction(|tx| {
            let mut namespaces = Vec::new();
            for namespace in Namespace::all() {
                let (count, last_indexed): (i64, Option<i64>) = tx.query_row(
                    &format!("SELECT COUNT(*), MAX(indexed_at) FROM {}", namespace.table()),
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                namespaces.push(NamespaceStats {
                    namespace: *namespace,
                    count: count as usize,
                    last_indexed,
                });
            }

            Ok(IndexStats {
                namespaces,
                model_id: get_meta(tx, META_MODEL_ID)?,
                dimension: get_meta(tx, META_EMBEDDING_DIM)?.and_then(|d| d.parse().ok()),
            })
        })
    }

    /// Record which model produces this store's vectors.
    ///
    /// The first binding is stored; later bindings must name the same model
    /// and dimension, otherwise `ModelMismatch` is returned and nothing changes.
    /// Takes the write lock up front so concurrent first bindings serialize.
    pub fn bind_model(&self, model_id: &str, dimension: usize) -> Result<()> {
        self.with_transaction_behavior(TransactionBehavior::Immediate, |tx| {
            let stored_model = get_meta(tx, META_MODEL_ID)?;
            let stored_dim = get_meta(tx, META_EMBEDDING_DIM)?;

            match (stored_model, stored_dim) {
                (Some(model), Some(dim)) => {
                    if model != model_id || dim != dimension.to_string() {
                        return Err(SearchError::ModelMismatch {
                            stored: format!("{} ({} dims)", model, dim),
                            current: format!("{} ({} dims)", model_id, dimension),
                        });
                    }
                }
                _ => {
                    set_meta(tx, META_MODEL_ID, model_id)?;
                    set_meta(tx, META_EMBEDDING_DIM, &dimension.to_string())?;
                }
            }
            Ok(())
        })
    }
}

/// Row before blob decoding
struct RawRow {
    id: String,
    fields: Vec<Option<String>>,
    blob: Vec<u8>,
    dim: i64,
}

fn read_row(row: &rusqlite::Row<'_>, namespace: Namespace) -> rusqlite::Result<RawRow> {
    let width = namespace.columns().len();
    let mut fields = Vec::with_capacity(width);
    for i in 1..=width {
        fields.push(row.get::<_, Option<String>>(i)?);
    }
    Ok(RawRow {
        id: row.get(0)?,
        fields,
        blob: row.get(width + 1)?,
        dim: row.get(width + 2)?,
    })
}

fn decode_row<R: Record>(RawRow { id, fields, blob, dim }: RawRow) -> Result<StoredRecord<R>> {
    let embedding = blob_to_embedding(&id, &blob)?;
    if embedding.len() as i64 != dim {
        return Err(SearchError::CorruptEmbedding { id, len: blob.len() });
    }
    Ok(StoredRecord {
        record: R::from_fields(id, fields),
        embedding,
    })
}

fn get_meta(tx: &Transaction<'_>, key: &str) -> Result<Option<String>> {
    Ok(tx
        .query_row(
            "SELECT value FROM index_meta WHERE key = ?1",
            params![key],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()?
        .flatten())
}

fn set_meta(tx: &Transaction<'_>, key: &str, value: &str) -> Result<()> {
    tx.execute(
        "INSERT INTO index_meta (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

/// Convert f32 embedding to BLOB
pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Convert BLOB to f32 embedding; the dimension is the byte length / 4
pub fn blob_to_embedding(id: &str, blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(SearchError::CorruptEmbedding {
            id: id.to_string(),
            len: blob.len(),
        });
    }
    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
