use rusqlite::{params, Connection};
use tracing::debug;

use crate::{database::tables::*, errors::WatchlistError};

pub mod db_loader;
pub mod episodes;
pub mod migration;
pub mod models;
pub mod movies;
pub mod shows;
pub mod tables;
pub mod tracked;
pub mod users;

pub fn init_table(name: &str, cols: &str) -> String {
    format!("CREATE TABLE IF NOT EXISTS {name} ({cols})")
}

/// Create every table and index of the multi-user schema that is missing
pub fn init(conn: &Connection) -> Result<(), WatchlistError> {
    for (name, cols) in SCHEMA_TABLES {
        conn.execute(&init_table(name, cols), [])?;
    }
    for index in SCHEMA_INDEXES {
        conn.execute(index, [])?;
    }
    debug!("Schema tables ensured");
    Ok(())
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool, WatchlistError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Column names of a table, in declaration order. Empty when the table is absent.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, WatchlistError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<i64, WatchlistError> {
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
    Ok(count)
}
