//! SQLite metadata index
//!
//! Schema: `documents` (one row per stored document) + `entities` (one row
//! per (doc, kind, value)). Uses r2d2 connection pooling so filter queries
//! run concurrently; writes are serialised through a write gate and each
//! store is a single delete-then-insert transaction.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use parking_lot::Mutex;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use rusqlite::types::Value;
use tracing::debug;

use crate::interface::{DateRange, EntityCriteria, EntityKind};
use crate::metadata::{MetadataIndex, MetadataResult, TagCount};
use crate::models::EntitySet;

/// Bound on `IN (...)` list sizes per statement.
const MAX_IN_LIST: usize = 500;

/// Per-list chunk when a statement carries two `IN` lists plus the kind and
/// a date range, keeping the whole statement within `MAX_IN_LIST` parameters.
const PAIRED_IN_CHUNK: usize = (MAX_IN_LIST - 3) / 2;

/// Thread-safe metadata store using connection pooling
///
/// WAL mode lets readers proceed while a batch ingest is writing.
pub struct SqliteMetadataIndex {
    pool: Pool<SqliteConnectionManager>,
    write_gate: Mutex<()>,
}

impl SqliteMetadataIndex {
    /// Open or create a metadata database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> MetadataResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let manager = SqliteConnectionManager::file(path)
            .with_init(|conn| {
                conn.execute_batch("
                    PRAGMA journal_mode=WAL;
                    PRAGMA synchronous=NORMAL;
                    PRAGMA foreign_keys=ON;
                    PRAGMA cache_size=-16000;
                ")?;
                Ok(())
            });

        let pool = Pool::builder()
            .max_size(8)
            .build(manager)?;

        let index = Self { pool, write_gate: Mutex::new(()) };
        index.setup_schema()?;
        Ok(index)
    }

    /// Open an in-memory database (tests, throwaway corpora)
    pub fn open_in_memory() -> MetadataResult<Self> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| {
                conn.execute_batch("PRAGMA foreign_keys=ON;")?;
                Ok(())
            });

        // In-memory needs single connection to maintain state
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)?;

        let index = Self { pool, write_gate: Mutex::new(()) };
        index.setup_schema()?;
        Ok(index)
    }

    fn get_conn(&self) -> MetadataResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn setup_schema(&self) -> MetadataResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS documents (
                doc_id TEXT PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS entities (
                doc_id TEXT NOT NULL REFERENCES documents(doc_id) ON DELETE CASCADE,
                kind TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (doc_id, kind, value)
            );

            CREATE INDEX IF NOT EXISTS idx_entities_kind_value ON entities(kind, value);
        "#)?;
        Ok(())
    }

    fn row_to_entity(row: &rusqlite::Row) -> rusqlite::Result<(String, String)> {
        Ok((row.get(0)?, row.get(1)?))
    }

    fn insert_entity(set: &mut EntitySet, kind: &str, value: String) {
        match EntityKind::from_database(kind) {
            Some(kind) => {
                set.insert(kind, value);
            }
            None => debug!(kind, "skipping entity row with unknown kind"),
        }
    }

    /// Subset of `doc_ids` having at least one entity of `kind` equal to one
    /// of `values`, or (for dates) inside `range`.
    fn matching_doc_ids(
        conn: &rusqlite::Connection,
        doc_ids: &[String],
        kind: EntityKind,
        values: Option<&[String]>,
        range: Option<&DateRange>,
    ) -> MetadataResult<HashSet<String>> {
        let mut matched = HashSet::new();
        let value_chunks: Vec<Option<&[String]>> = match values {
            Some(values) => values.chunks(PAIRED_IN_CHUNK).map(Some).collect(),
            None => vec![None],
        };

        for id_chunk in doc_ids.chunks(PAIRED_IN_CHUNK) {
            let id_placeholders = id_chunk.iter().map(|_| "?").collect::<Vec<_>>().join(",");

            // Value chunks are alternatives, so their hits are unioned.
            for value_chunk in &value_chunks {
                let mut params: Vec<Value> = vec![kind.as_str().to_string().into()];
                let mut sql = String::from("SELECT DISTINCT doc_id FROM entities WHERE kind = ?");

                if let Some(values) = value_chunk {
                    let value_placeholders = values.iter().map(|_| "?").collect::<Vec<_>>().join(",");
                    sql.push_str(&format!(" AND value IN ({})", value_placeholders));
                    params.extend(values.iter().map(|v| Value::from(v.clone())));
                }
                if let Some(range) = range {
                    sql.push_str(" AND value BETWEEN ? AND ?");
                    params.push(range.start.clone().into());
                    params.push(range.end.clone().into());
                }
                sql.push_str(&format!(" AND doc_id IN ({})", id_placeholders));
                params.extend(id_chunk.iter().map(|id| Value::from(id.clone())));

                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| row.get::<_, String>(0))?;
                for row in rows {
                    matched.insert(row?);
                }
            }
        }

        Ok(matched)
    }
}

impl MetadataIndex for SqliteMetadataIndex {
    fn store(&self, doc_id: &str, entities: &EntitySet) -> MetadataResult<()> {
        let _guard = self.write_gate.lock();
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute("DELETE FROM entities WHERE doc_id = ?1", [doc_id])?;
        tx.execute("DELETE FROM documents WHERE doc_id = ?1", [doc_id])?;
        tx.execute("INSERT INTO documents (doc_id) VALUES (?1)", [doc_id])?;
        {
            let mut stmt = tx.prepare("INSERT INTO entities (doc_id, kind, value) VALUES (?1, ?2, ?3)")?;
            for (kind, value) in entities.iter() {
                stmt.execute(params![doc_id, kind.as_str(), value])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn get(&self, doc_id: &str) -> MetadataResult<Option<EntitySet>> {
        let conn = self.get_conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE doc_id = ?1)",
            [doc_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Ok(None);
        }

        let mut stmt = conn.prepare("SELECT kind, value FROM entities WHERE doc_id = ?1")?;
        let rows = stmt.query_map([doc_id], Self::row_to_entity)?;
        let mut set = EntitySet::new();
        for row in rows {
            let (kind, value) = row?;
            Self::insert_entity(&mut set, &kind, value);
        }
        Ok(Some(set))
    }

    fn get_many(&self, doc_ids: &[String]) -> MetadataResult<HashMap<String, EntitySet>> {
        let conn = self.get_conn()?;
        let mut out: HashMap<String, EntitySet> = HashMap::with_capacity(doc_ids.len());

        for chunk in doc_ids.chunks(MAX_IN_LIST) {
            let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let params: Vec<Value> = chunk.iter().map(|id| Value::from(id.clone())).collect();

            let sql = format!("SELECT doc_id FROM documents WHERE doc_id IN ({})", placeholders);
            let mut stmt = conn.prepare(&sql)?;
            let ids = stmt.query_map(rusqlite::params_from_iter(params.iter()), |row| row.get::<_, String>(0))?;
            for id in ids {
                out.insert(id?, EntitySet::new());
            }

            let sql = format!("SELECT doc_id, kind, value FROM entities WHERE doc_id IN ({})", placeholders);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })?;
            for row in rows {
                let (doc_id, kind, value) = row?;
                Self::insert_entity(out.entry(doc_id).or_default(), &kind, value);
            }
        }

        Ok(out)
    }

    fn remove(&self, doc_id: &str) -> MetadataResult<bool> {
        let _guard = self.write_gate.lock();
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM entities WHERE doc_id = ?1", [doc_id])?;
        let removed = tx.execute("DELETE FROM documents WHERE doc_id = ?1", [doc_id])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    fn count(&self) -> MetadataResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn doc_ids(&self) -> MetadataResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT doc_id FROM documents ORDER BY doc_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    fn all_entities(&self) -> MetadataResult<BTreeMap<EntityKind, Vec<String>>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT DISTINCT kind, value FROM entities ORDER BY kind, value")?;
        let rows = stmt.query_map([], Self::row_to_entity)?;

        let mut out: BTreeMap<EntityKind, Vec<String>> = BTreeMap::new();
        for row in rows {
            let (kind, value) = row?;
            if let Some(kind) = EntityKind::from_database(&kind) {
                out.entry(kind).or_default().push(value);
            }
        }
        Ok(out)
    }

    fn filter_exact(&self, doc_ids: &[String], criteria: &EntityCriteria) -> MetadataResult<Vec<String>> {
        if criteria.is_empty() || doc_ids.is_empty() {
            return Ok(doc_ids.to_vec());
        }
        let conn = self.get_conn()?;

        let mut remaining: HashSet<String> = doc_ids.iter().cloned().collect();
        for (kind, values) in criteria.named() {
            let candidates: Vec<String> = doc_ids.iter().filter(|id| remaining.contains(*id)).cloned().collect();
            remaining = Self::matching_doc_ids(&conn, &candidates, kind, Some(values), None)?;
            if remaining.is_empty() {
                return Ok(Vec::new());
            }
        }
        if let Some(range) = &criteria.date_range {
            let candidates: Vec<String> = doc_ids.iter().filter(|id| remaining.contains(*id)).cloned().collect();
            remaining = Self::matching_doc_ids(&conn, &candidates, EntityKind::Date, None, Some(range))?;
        }

        Ok(doc_ids.iter().filter(|id| remaining.contains(*id)).cloned().collect())
    }

    fn tag_frequencies(&self, kind: EntityKind) -> MetadataResult<Vec<TagCount>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT value, COUNT(DISTINCT doc_id) AS n FROM entities WHERE kind = ?1 GROUP BY value ORDER BY n DESC, value",
        )?;
        let tags = stmt
            .query_map([kind.as_str()], |row| {
                Ok(TagCount { tag: row.get(0)?, count: row.get::<_, i64>(1)? as usize })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    fn co_occurring_tags(&self, tag: &str, kind: EntityKind, limit: usize) -> MetadataResult<Vec<TagCount>> {
        if !EntityKind::NAMED.contains(&kind) {
            debug!(%kind, "co-occurrence not supported for kind");
            return Ok(Vec::new());
        }
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT value, COUNT(*) AS n FROM entities
               WHERE kind = ?1 AND value != ?2
                 AND doc_id IN (SELECT doc_id FROM entities WHERE kind = ?1 AND value = ?2)
               GROUP BY value
               ORDER BY n DESC, value
               LIMIT ?3"#,
        )?;
        let tags = stmt
            .query_map(params![kind.as_str(), tag, limit as i64], |row| {
                Ok(TagCount { tag: row.get(0)?, count: row.get::<_, i64>(1)? as usize })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }
}
