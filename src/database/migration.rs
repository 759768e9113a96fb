use rusqlite::{params, Connection, Transaction};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::database::{count_rows, episodes, init, init_table, table_columns, table_exists, tables::*};
use crate::errors::WatchlistError;

/// The profile that inherits every row of a single-user database
pub const SEED_USER_ID: i64 = 1;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct MigrationReport {
    pub upgraded_to_multi_user: bool,
    pub rebuilt_tables: Vec<String>,
    /// Shows created for legacy episodes whose show was never tracked
    pub placeholder_shows: Vec<i64>,
    pub added_columns: Vec<String>,
}

/// Brings any database (empty, single-user, or already multi-user) to the
/// current schema. Safe to call on every startup.
pub fn run_migrations(conn: &mut Connection, seed_name: &str) -> Result<MigrationReport, WatchlistError> {
    let mut report = migrate_to_multi_user(conn, seed_name)?;
    init(conn).map_err(into_migration_error)?;
    report.added_columns = migrate_added_columns(conn)?;
    Ok(report)
}

/// Rebuilds the single-column-key tracking tables into composite-key tables
/// owned by the seed user. Runs as one transaction; nothing is committed
/// unless every table made it across.
pub fn migrate_to_multi_user(conn: &mut Connection, seed_name: &str) -> Result<MigrationReport, WatchlistError> {
    if table_exists(conn, DB_USERS_NAME)? && count_rows(conn, DB_USERS_NAME)? > 0 {
        debug!("Users present, multi-user schema already in place");
        return Ok(MigrationReport::default());
    }

    info!("Upgrading database to the multi-user schema (seed profile '{seed_name}')");

    // Has no effect inside a transaction, so it brackets it instead
    conn.execute_batch("PRAGMA foreign_keys = OFF")?;
    let result = rebuild_for_multi_user(conn, seed_name);
    let restored = conn.execute_batch("PRAGMA foreign_keys = ON");

    let report = result.map_err(into_migration_error)?;
    restored?;

    info!(
        "Multi-user migration complete, rebuilt tables: {:?}",
        report.rebuilt_tables
    );
    Ok(report)
}

fn rebuild_for_multi_user(conn: &mut Connection, seed_name: &str) -> Result<MigrationReport, WatchlistError> {
    let tx = conn.transaction()?;

    tx.execute(&init_table(DB_USERS_NAME, DB_USERS_COLS), [])?;
    tx.execute(
        &format!("INSERT OR IGNORE INTO {DB_USERS_NAME} (id, name) VALUES (?1, ?2)"),
        params![SEED_USER_ID, seed_name],
    )?;

    let mut report = MigrationReport {
        upgraded_to_multi_user: true,
        ..Default::default()
    };

    // Shows must be in their new shape before episodes reference them
    for (table, cols) in [(DB_MOVIES_NAME, DB_MOVIES_COLS), (DB_SHOWS_NAME, DB_SHOWS_COLS)] {
        if rebuild_legacy_table(&tx, table, cols)?.is_some() {
            report.rebuilt_tables.push(table.to_string());
        }
    }

    if is_legacy_table(&tx, DB_EPISODES_NAME)? {
        tx.execute(&init_table(DB_SHOWS_NAME, DB_SHOWS_COLS), [])?;
        // Every legacy episode must find its parent under the composite key
        let placeholders = insert_placeholder_shows(&tx)?;

        if rebuild_legacy_table(&tx, DB_EPISODES_NAME, DB_EPISODES_COLS)?.is_some() {
            report.rebuilt_tables.push(DB_EPISODES_NAME.to_string());
        }
        for show_id in &placeholders {
            episodes::recompute_watched_episodes(&tx, SEED_USER_ID, *show_id)?;
        }
        if !placeholders.is_empty() {
            warn!(
                "Created {} placeholder shows for legacy episodes without a tracked show: {:?}",
                placeholders.len(),
                placeholders
            );
        }
        report.placeholder_shows = placeholders;
    }

    check_foreign_keys(&tx)?;
    tx.commit()?;
    Ok(report)
}

/// Tracks, for the seed user, every show that legacy episode rows point at
/// but that has no row of its own. Returns the ids that were added.
fn insert_placeholder_shows(tx: &Transaction) -> Result<Vec<i64>, WatchlistError> {
    let mut stmt = tx.prepare(&format!(
        "SELECT DISTINCT e.tmdb_show_id FROM {DB_EPISODES_NAME} e
         WHERE NOT EXISTS (
             SELECT 1 FROM {DB_SHOWS_NAME} s WHERE s.user_id = ?1 AND s.tmdb_show_id = e.tmdb_show_id
         )
         ORDER BY e.tmdb_show_id"
    ))?;
    let missing = stmt
        .query_map(params![SEED_USER_ID], |row| row.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    for show_id in &missing {
        tx.execute(
            &format!(
                "INSERT INTO {DB_SHOWS_NAME} (user_id, tmdb_show_id, added_at, updated_at)
                 VALUES (?1, ?2, {NOW_SQL}, {NOW_SQL})"
            ),
            params![SEED_USER_ID, show_id],
        )?;
    }
    Ok(missing)
}

/// A legacy table exists but has no owner column
fn is_legacy_table(conn: &Connection, table: &str) -> Result<bool, WatchlistError> {
    let columns = table_columns(conn, table)?;
    Ok(!columns.is_empty() && !columns.iter().any(|c| c == "user_id"))
}

/// Build-new-shape, copy, drop, rename. Returns the number of copied rows,
/// or None when the table was absent or already owned.
fn rebuild_legacy_table(
    tx: &Transaction,
    table: &str,
    cols: &str,
) -> Result<Option<usize>, WatchlistError> {
    let legacy_columns = table_columns(tx, table)?;
    if legacy_columns.is_empty() {
        debug!("No {table} table to migrate");
        return Ok(None);
    }
    if legacy_columns.iter().any(|c| c == "user_id") {
        debug!("{table} already has an owner column");
        return Ok(None);
    }

    let new_table = format!("{table}_new");
    tx.execute(&init_table(&new_table, cols), [])?;

    // Columns the legacy table never had keep their defaults
    let shared: Vec<String> = table_columns(tx, &new_table)?
        .into_iter()
        .filter(|c| c != "user_id" && legacy_columns.contains(c))
        .collect();

    let insert_cols = std::iter::once("user_id".to_string())
        .chain(shared.iter().cloned())
        .collect::<Vec<_>>()
        .join(", ");
    let select_cols = std::iter::once("?1".to_string())
        .chain(shared.iter().map(|c| copy_expression(c)))
        .collect::<Vec<_>>()
        .join(", ");

    let copied = tx.execute(
        &format!(
            "INSERT INTO {new_table} ({insert_cols}) SELECT {select_cols} FROM {table}"
        ),
        params![SEED_USER_ID],
    )?;
    tx.execute(&format!("DROP TABLE {table}"), [])?;
    tx.execute(&format!("ALTER TABLE {new_table} RENAME TO {table}"), [])?;

    info!("Rebuilt {table} with a composite key, {copied} rows assigned to user {SEED_USER_ID}");
    Ok(Some(copied))
}

fn copy_expression(column: &str) -> String {
    match column {
        // The new tables enforce the 0-5 range
        "rating" => "MIN(MAX(COALESCE(rating, 0), 0), 5)".to_string(),
        other => other.to_string(),
    }
}

fn check_foreign_keys(conn: &Connection) -> Result<(), WatchlistError> {
    let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
    let violations = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    if let Some((table, parent)) = violations.first() {
        return Err(WatchlistError::Migration(format!(
            "{} foreign key violations after rebuild (first: {table} -> {parent})",
            violations.len()
        )));
    }
    Ok(())
}

/// Adds optional columns introduced after the multi-user layout. Each column
/// is checked and added on its own, so one failure never blocks the others.
pub fn migrate_added_columns(conn: &Connection) -> Result<Vec<String>, WatchlistError> {
    let mut added = vec![];
    let mut failures = vec![];

    for (table, column, definition) in ADDED_COLUMNS {
        match add_column_if_missing(conn, table, column, definition) {
            Ok(true) => {
                info!("Added column {table}.{column}");
                added.push(format!("{table}.{column}"));
            }
            Ok(false) => {}
            Err(e) => {
                warn!("Could not add column {table}.{column}: {e}");
                failures.push(format!("{table}.{column}: {e}"));
            }
        }
    }

    if !failures.is_empty() {
        return Err(WatchlistError::Migration(failures.join("; ")));
    }
    Ok(added)
}

fn add_column_if_missing(
    conn: &Connection,
    table: &str,
    column: &str,
    definition: &str,
) -> Result<bool, WatchlistError> {
    let columns = table_columns(conn, table)?;
    if columns.is_empty() || columns.iter().any(|c| c == column) {
        return Ok(false);
    }

    conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {column} {definition}"), [])?;
    Ok(true)
}

fn into_migration_error(e: WatchlistError) -> WatchlistError {
    match e {
        WatchlistError::Migration(_) => e,
        other => WatchlistError::Migration(other.to_string()),
    }
}
