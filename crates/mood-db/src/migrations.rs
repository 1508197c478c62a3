use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Document DB: running migration v1 (initial schema)");
        let tx = conn.transaction()?;
        tx.execute_batch(
            "
            CREATE TABLE documents (
                collection  TEXT NOT NULL,
                id          TEXT NOT NULL,
                body        TEXT NOT NULL,
                seq         INTEGER NOT NULL,
                PRIMARY KEY (collection, id)
            );

            CREATE INDEX idx_documents_collection
                ON documents(collection, seq);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
        tx.commit()?;
    }

    info!("Document DB migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();
        run(&mut conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn documents_table_layout() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();

        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('documents')").unwrap();
        let columns: Vec<String> = stmt
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(columns, vec!["collection", "id", "body", "seq"]);
    }
}
