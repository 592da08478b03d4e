use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use crate::config::{ConfigPaths, StorageOptions};
use crate::model::header_row;

#[cfg(test)]
pub(crate) mod memory;
mod schema;
mod table;

pub use table::{ReviewTable, SchemaError, SchemaStatus, SheetSchema, StoredRow};

/// Inclusive, 1-based span of sheet rows. Row 1 holds the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowSpan {
    pub first: usize,
    pub last: usize,
}

impl RowSpan {
    pub fn new(first: usize, last: usize) -> Self {
        Self { first, last }
    }

    pub fn single(row: usize) -> Self {
        Self {
            first: row,
            last: row,
        }
    }

    pub fn len(&self) -> usize {
        self.last + 1 - self.first
    }

    pub fn is_valid(&self) -> bool {
        self.first >= 1 && self.first <= self.last
    }

    fn overlaps(&self, other: &RowSpan) -> bool {
        self.first <= other.last && other.first <= self.last
    }

    /// Groups row numbers into ascending runs of consecutive rows.
    pub fn coalesce(rows: impl IntoIterator<Item = usize>) -> Vec<RowSpan> {
        let mut sorted: Vec<usize> = rows.into_iter().collect();
        sorted.sort_unstable();
        sorted.dedup();
        let mut spans: Vec<RowSpan> = Vec::new();
        for row in sorted {
            match spans.last_mut() {
                Some(span) if span.last + 1 == row => span.last = row,
                _ => spans.push(RowSpan::single(row)),
            }
        }
        spans
    }
}

impl fmt::Display for RowSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first == self.last {
            write!(f, "{}", self.first)
        } else {
            write!(f, "{}:{}", self.first, self.last)
        }
    }
}

/// Rectangular block of cells: 1-based rows, 0-based columns (both inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub rows: RowSpan,
    pub first_column: usize,
    pub last_column: usize,
}

impl CellRange {
    pub fn cell(row: usize, column: usize) -> Self {
        Self {
            rows: RowSpan::single(row),
            first_column: column,
            last_column: column,
        }
    }

    pub fn rows(rows: RowSpan, width: usize) -> Self {
        Self {
            rows,
            first_column: 0,
            last_column: width.saturating_sub(1),
        }
    }

    pub fn width(&self) -> usize {
        self.last_column + 1 - self.first_column
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}:{}{}",
            column_letter(self.first_column),
            self.rows.first,
            column_letter(self.last_column),
            self.rows.last
        )
    }
}

/// Spreadsheet column name for a 0-based index (`0 -> A`, `26 -> AA`).
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("sheet database error")]
    Database(#[from] rusqlite::Error),
    #[error("malformed row payload")]
    Encoding(#[from] serde_json::Error),
    #[error("row {row} is outside the sheet ({rows} rows)")]
    RowOutOfRange { row: usize, rows: usize },
    #[error("invalid row span {0}")]
    InvalidSpan(RowSpan),
    #[error("range {range} expects {expected} rows of values, got {actual}")]
    ShapeMismatch {
        range: String,
        expected: usize,
        actual: usize,
    },
    #[error("sheet unavailable: {0}")]
    Transport(String),
}

/// Row-addressable table the reconciliation engine reads and writes.
pub trait SheetGateway {
    /// Every row including the header, in storage order.
    fn bulk_read(&self) -> Result<Vec<Vec<String>>, GatewayError>;

    /// Overwrites exactly the addressed cells, one value row per sheet row.
    fn update_range(&self, range: &CellRange, values: &[Vec<String>]) -> Result<(), GatewayError>;

    fn append_rows(&self, values: &[Vec<String>]) -> Result<(), GatewayError>;

    /// Blanks the cells of the given rows without shifting later rows.
    fn clear_range(&self, rows: RowSpan) -> Result<(), GatewayError>;

    /// Physically removes rows as one request; later rows shift up.
    fn batch_delete_rows(&self, spans: &[RowSpan]) -> Result<(), GatewayError>;
}

/// SQLite-backed sheet with spreadsheet row semantics.
#[derive(Clone)]
pub struct SheetHandle {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

impl SheetHandle {
    pub fn connect(&self) -> Result<Connection, GatewayError> {
        let conn = Connection::open(&*self.db_path)?;
        prepare_connection(&conn, &self.options)?;
        Ok(conn)
    }

    fn with_transaction<F, T>(&self, f: F) -> Result<T, GatewayError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, GatewayError>,
    {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    pub fn sheet_name(&self) -> &str {
        &self.options.sheet_name
    }

    pub fn row_count(&self) -> Result<usize, GatewayError> {
        let conn = self.connect()?;
        count_rows(&conn, self.sheet_name())
    }
}

impl SheetGateway for SheetHandle {
    fn bulk_read(&self) -> Result<Vec<Vec<String>>, GatewayError> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT cells FROM sheet_rows WHERE sheet = ?1 ORDER BY position, id")?;
        let raw = stmt
            .query_map(params![self.sheet_name()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        let mut rows = Vec::with_capacity(raw.len());
        for cells in raw {
            rows.push(serde_json::from_str::<Vec<String>>(&cells)?);
        }
        Ok(rows)
    }

    fn update_range(&self, range: &CellRange, values: &[Vec<String>]) -> Result<(), GatewayError> {
        if !range.rows.is_valid() || range.first_column > range.last_column {
            return Err(GatewayError::InvalidSpan(range.rows));
        }
        if values.len() != range.rows.len() {
            return Err(GatewayError::ShapeMismatch {
                range: range.to_string(),
                expected: range.rows.len(),
                actual: values.len(),
            });
        }
        let sheet = self.sheet_name();
        self.with_transaction(|tx| {
            let rows = count_rows(tx, sheet)?;
            for (offset, row_values) in values.iter().enumerate() {
                let row = range.rows.first + offset;
                let mut cells = read_row(tx, sheet, row)?
                    .ok_or(GatewayError::RowOutOfRange { row, rows })?;
                if cells.len() <= range.last_column {
                    cells.resize(range.last_column + 1, String::new());
                }
                for column in range.first_column..=range.last_column {
                    cells[column] = row_values
                        .get(column - range.first_column)
                        .cloned()
                        .unwrap_or_default();
                }
                write_row(tx, sheet, row, &cells)?;
            }
            Ok(())
        })
    }

    fn append_rows(&self, values: &[Vec<String>]) -> Result<(), GatewayError> {
        let sheet = self.sheet_name();
        self.with_transaction(|tx| {
            let mut next = count_rows(tx, sheet)? + 1;
            for cells in values {
                tx.execute(
                    "INSERT INTO sheet_rows (sheet, position, cells) VALUES (?1, ?2, ?3)",
                    params![sheet, next as i64, serde_json::to_string(cells)?],
                )?;
                next += 1;
            }
            Ok(())
        })
    }

    fn clear_range(&self, rows: RowSpan) -> Result<(), GatewayError> {
        if !rows.is_valid() {
            return Err(GatewayError::InvalidSpan(rows));
        }
        let sheet = self.sheet_name();
        self.with_transaction(|tx| {
            let total = count_rows(tx, sheet)?;
            for row in rows.first..=rows.last {
                let cells = read_row(tx, sheet, row)?
                    .ok_or(GatewayError::RowOutOfRange { row, rows: total })?;
                let blank = vec![String::new(); cells.len()];
                write_row(tx, sheet, row, &blank)?;
            }
            Ok(())
        })
    }

    fn batch_delete_rows(&self, spans: &[RowSpan]) -> Result<(), GatewayError> {
        let ordered = validate_delete_spans(spans)?;
        let sheet = self.sheet_name();
        self.with_transaction(|tx| {
            let total = count_rows(tx, sheet)?;
            if let Some(span) = ordered.iter().find(|span| span.last > total) {
                return Err(GatewayError::RowOutOfRange {
                    row: span.last,
                    rows: total,
                });
            }
            for span in &ordered {
                tx.execute(
                    "DELETE FROM sheet_rows WHERE sheet = ?1 AND position BETWEEN ?2 AND ?3",
                    params![sheet, span.first as i64, span.last as i64],
                )?;
                tx.execute(
                    "UPDATE sheet_rows SET position = position - ?1 WHERE sheet = ?2 AND position > ?3",
                    params![span.len() as i64, sheet, span.last as i64],
                )?;
            }
            Ok(())
        })
    }
}

/// Validates delete spans and orders them highest-first so earlier removals
/// never shift a later span.
pub(crate) fn validate_delete_spans(spans: &[RowSpan]) -> Result<Vec<RowSpan>, GatewayError> {
    let mut ordered = spans.to_vec();
    if let Some(bad) = ordered.iter().find(|span| !span.is_valid()) {
        return Err(GatewayError::InvalidSpan(*bad));
    }
    ordered.sort_by(|a, b| b.first.cmp(&a.first));
    for pair in ordered.windows(2) {
        if pair[0].overlaps(&pair[1]) {
            return Err(GatewayError::InvalidSpan(pair[1]));
        }
    }
    Ok(ordered)
}

fn count_rows(conn: &Connection, sheet: &str) -> Result<usize, GatewayError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sheet_rows WHERE sheet = ?1",
        params![sheet],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

fn read_row(conn: &Connection, sheet: &str, row: usize) -> Result<Option<Vec<String>>, GatewayError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT cells FROM sheet_rows WHERE sheet = ?1 AND position = ?2",
            params![sheet, row as i64],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(cells) => Ok(Some(serde_json::from_str(&cells)?)),
        None => Ok(None),
    }
}

fn write_row(conn: &Connection, sheet: &str, row: usize, cells: &[String]) -> Result<(), GatewayError> {
    conn.execute(
        "UPDATE sheet_rows SET cells = ?1 WHERE sheet = ?2 AND position = ?3",
        params![serde_json::to_string(cells)?, sheet, row as i64],
    )?;
    Ok(())
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> Result<SheetHandle> {
    let db_path = &paths.database_path;
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening sheet database {}", db_path.display()))?;
    prepare_connection(&conn, storage).context("configuring sheet connection")?;
    schema::apply(&conn)?;
    seed_header(&conn, &storage.sheet_name)?;
    Ok(SheetHandle {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(storage.clone()),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )?;
    Ok(())
}

fn seed_header(conn: &Connection, sheet: &str) -> Result<()> {
    let rows = count_rows(conn, sheet).context("checking for an existing header row")?;
    if rows > 0 {
        return Ok(());
    }

    tracing::info!(sheet, "creating review sheet header");
    let header = serde_json::to_string(&header_row()).context("encoding header row")?;
    conn.execute(
        "INSERT INTO sheet_rows (sheet, position, cells) VALUES (?1, 1, ?2)",
        params![sheet, header],
    )
    .context("inserting header row")?;
    Ok(())
}
