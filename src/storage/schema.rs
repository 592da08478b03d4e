use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn apply(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sheet_rows (
            id INTEGER PRIMARY KEY,
            sheet TEXT NOT NULL,
            position INTEGER NOT NULL,
            cells TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS sheet_rows_position
            ON sheet_rows (sheet, position);
        "#,
    )
    .context("applying schema migrations")?;
    Ok(())
}
