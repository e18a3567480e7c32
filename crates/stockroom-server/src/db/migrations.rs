use rusqlite::Connection;

const SCHEMA: &str = include_str!("schema.sql");

pub fn run(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)?;

    // Databases created before optimistic locking lack the revision column.
    for table in ["products", "arrivals"] {
        if !has_column(conn, table, "revision")? {
            conn.execute_batch(&format!(
                "ALTER TABLE {table} ADD COLUMN revision INTEGER NOT NULL DEFAULT 0;"
            ))?;
        }
    }

    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        rusqlite::params![table, column],
        |row| row.get::<_, i64>(0),
    )
    .map(|c| c > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restores_revision_on_legacy_tables() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        conn.execute_batch(
            "ALTER TABLE products DROP COLUMN revision;
             ALTER TABLE arrivals DROP COLUMN revision;",
        )
        .unwrap();
        assert!(!has_column(&conn, "products", "revision").unwrap());

        run(&conn).unwrap();
        assert!(has_column(&conn, "products", "revision").unwrap());
        assert!(has_column(&conn, "arrivals", "revision").unwrap());
    }
}
