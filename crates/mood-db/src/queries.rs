use crate::Database;
use crate::models::DocumentRow;
use anyhow::{Result, bail};
use mood_types::documents::{Direction, Document, Fields, Query, apply_fields};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, TransactionBehavior};
use serde_json::{Map, Value};
use uuid::Uuid;

const NEXT_SEQ: &str = "(SELECT COALESCE(MAX(seq), 0) + 1 FROM documents)";

impl Database {
    pub fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.with_conn(|conn| query_document(conn, collection, id))?
            .map(DocumentRow::into_document)
            .transpose()
    }

    pub fn query_documents(&self, query: &Query) -> Result<Vec<Document>> {
        let rows = self.with_conn(|conn| run_query(conn, query))?;
        rows.into_iter().map(DocumentRow::into_document).collect()
    }

    /// Insert a new document under a generated id.
    pub fn insert_document(&self, collection: &str, fields: Fields) -> Result<Document> {
        let id = Uuid::new_v4().to_string();
        let mut body = Map::new();
        apply_fields(&mut body, fields, self.clock.now());
        let text = Value::Object(body.clone()).to_string();

        self.with_conn_mut(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO documents (collection, id, body, seq) VALUES (?1, ?2, ?3, {})",
                    NEXT_SEQ
                ),
                (collection, &id, &text),
            )?;
            Ok(())
        })?;

        Ok(Document::new(id, body))
    }

    /// Read-modify-write under an immediate transaction so concurrent list
    /// unions against the same document serialize.
    pub fn merge_document(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let mut body = match query_document(&tx, collection, id)? {
                Some(row) => row.into_document()?.fields,
                None => Map::new(),
            };
            apply_fields(&mut body, fields, self.clock.now());

            tx.execute(
                &format!(
                    "INSERT INTO documents (collection, id, body, seq) VALUES (?1, ?2, ?3, {})
                     ON CONFLICT(collection, id)
                     DO UPDATE SET body = excluded.body",
                    NEXT_SEQ
                ),
                (collection, id, Value::Object(body).to_string()),
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Returns whether a document was actually removed.
    pub fn delete_document(&self, collection: &str, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                (collection, id),
            )?;
            Ok(n > 0)
        })
    }
}

fn query_document(conn: &Connection, collection: &str, id: &str) -> Result<Option<DocumentRow>> {
    let mut stmt =
        conn.prepare("SELECT collection, id, body FROM documents WHERE collection = ?1 AND id = ?2")?;

    let row = stmt
        .query_row((collection, id), |row| {
            Ok(DocumentRow {
                collection: row.get(0)?,
                id: row.get(1)?,
                body: row.get(2)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn run_query(conn: &Connection, query: &Query) -> Result<Vec<DocumentRow>> {
    let mut sql = String::from("SELECT collection, id, body FROM documents WHERE collection = ?");
    let mut params: Vec<SqlValue> = vec![SqlValue::Text(query.collection.clone())];

    if let Some((field, value)) = &query.filter {
        sql.push_str(" AND json_extract(body, ?) = ?");
        params.push(SqlValue::Text(json_path(field)?));
        params.push(to_sql_value(value)?);
    }

    match &query.order_by {
        Some((field, direction)) => {
            let path = json_path(field)?;
            sql.push_str(" AND json_extract(body, ?) IS NOT NULL");
            params.push(SqlValue::Text(path.clone()));
            let dir = match direction {
                Direction::Ascending => "ASC",
                Direction::Descending => "DESC",
            };
            sql.push_str(&format!(" ORDER BY json_extract(body, ?) {}, seq ASC", dir));
            params.push(SqlValue::Text(path));
        }
        None => sql.push_str(" ORDER BY seq ASC"),
    }

    if let Some(limit) = query.limit {
        sql.push_str(" LIMIT ?");
        params.push(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params), |row| {
            Ok(DocumentRow {
                collection: row.get(0)?,
                id: row.get(1)?,
                body: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// JSON path for a top-level field. Field names are quoted so that emoji
/// keys resolve.
fn json_path(field: &str) -> Result<String> {
    if field.is_empty() || field.contains('"') {
        bail!("Unsupported field name in query: {:?}", field);
    }
    Ok(format!("$.\"{}\"", field))
}

/// `json_extract` yields SQL scalars; map the comparison value the same way.
fn to_sql_value(value: &Value) -> Result<SqlValue> {
    Ok(match value {
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
        },
        other => bail!("Unsupported equality filter value: {}", other),
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
