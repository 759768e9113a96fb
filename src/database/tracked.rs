use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::database::{models::ListFilter, tables::NOW_SQL, users::ensure_user_exists};
use crate::errors::WatchlistError;

pub type ColumnValues = Vec<(&'static str, Value)>;

/// A kind of title a profile can track. Rows are keyed by
/// (user_id, ID_COLUMN) and carry the shared favourite/watchlist/rating/comment
/// columns plus whatever the kind adds.
pub trait TrackedKind {
    const TABLE: &'static str;
    const ID_COLUMN: &'static str;
    const LABEL: &'static str;
    /// Whether the table has its own `watched` column
    const SUPPORTS_WATCHED: bool;
    const SELECT_COLUMNS: &'static str;

    type Record;
    type Fields;
    type Patch;

    fn from_row(row: &Row) -> rusqlite::Result<Self::Record>;

    /// Every writable column, validated
    fn field_values(fields: &Self::Fields) -> Result<ColumnValues, WatchlistError>;

    /// Only the supplied columns, validated
    fn patch_values(patch: &Self::Patch) -> Result<ColumnValues, WatchlistError>;
}

pub fn not_tracked<K: TrackedKind>(user_id: i64, external_id: i64) -> WatchlistError {
    WatchlistError::NotFound(format!(
        "{} with TMDB ID {external_id} is not tracked by user {user_id}",
        K::LABEL
    ))
}

/// A profile's library, most recently updated first
pub fn list<K: TrackedKind>(
    conn: &Connection,
    user_id: i64,
    filter: &ListFilter,
) -> Result<Vec<K::Record>, WatchlistError> {
    if filter.watched.is_some() && !K::SUPPORTS_WATCHED {
        return Err(WatchlistError::Validation(format!(
            "{} entries cannot be filtered on watched",
            K::LABEL
        )));
    }

    let mut clauses = vec!["user_id = ?1".to_string()];
    let mut values: Vec<Value> = vec![user_id.into()];
    for (column, wanted) in [
        ("watched", filter.watched),
        ("favourited", filter.favourited),
        ("watchlisted", filter.watchlisted),
    ] {
        if let Some(wanted) = wanted {
            values.push(wanted.into());
            clauses.push(format!("{column} = ?{}", values.len()));
        }
    }
    match filter.rated {
        Some(true) => clauses.push("rating > 0".to_string()),
        Some(false) => clauses.push("rating = 0".to_string()),
        None => {}
    }

    let sql = format!(
        "SELECT {} FROM {} WHERE {} ORDER BY updated_at DESC, rowid DESC",
        K::SELECT_COLUMNS,
        K::TABLE,
        clauses.join(" AND ")
    );
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(params_from_iter(values.iter()), K::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

/// None is the normal answer for anything the profile never tracked
pub fn get<K: TrackedKind>(
    conn: &Connection,
    user_id: i64,
    external_id: i64,
) -> Result<Option<K::Record>, WatchlistError> {
    let record = conn
        .query_row(
            &format!(
                "SELECT {} FROM {} WHERE user_id = ?1 AND {} = ?2",
                K::SELECT_COLUMNS,
                K::TABLE,
                K::ID_COLUMN
            ),
            params![user_id, external_id],
            K::from_row,
        )
        .optional()?;
    Ok(record)
}

pub fn upsert<K: TrackedKind>(
    conn: &mut Connection,
    user_id: i64,
    external_id: i64,
    fields: &K::Fields,
) -> Result<K::Record, WatchlistError> {
    upsert_with::<K>(conn, user_id, external_id, fields, vec![])
}

/// Overwrites every writable column of an existing row, or inserts a new one.
/// `insert_only` columns are written on insert and ignored on update.
pub fn upsert_with<K: TrackedKind>(
    conn: &mut Connection,
    user_id: i64,
    external_id: i64,
    fields: &K::Fields,
    insert_only: ColumnValues,
) -> Result<K::Record, WatchlistError> {
    let values = K::field_values(fields)?;

    let tx = conn.transaction()?;
    ensure_user_exists(&tx, user_id)?;

    if get::<K>(&tx, user_id, external_id)?.is_some() {
        update_columns::<K>(&tx, user_id, external_id, &values)?;
        debug!("Updated {} {external_id} for user {user_id}", K::LABEL);
    } else {
        insert_row::<K>(&tx, user_id, external_id, values.into_iter().chain(insert_only).collect())?;
        info!("User {user_id} now tracks {} {external_id}", K::LABEL);
    }

    let record = get::<K>(&tx, user_id, external_id)?.ok_or_else(|| not_tracked::<K>(user_id, external_id))?;
    tx.commit()?;
    Ok(record)
}

/// Writes only the supplied fields. Never creates a row.
pub fn patch<K: TrackedKind>(
    conn: &mut Connection,
    user_id: i64,
    external_id: i64,
    patch: &K::Patch,
) -> Result<K::Record, WatchlistError> {
    let values = K::patch_values(patch)?;

    let tx = conn.transaction()?;
    if values.is_empty() {
        return get::<K>(&tx, user_id, external_id)?.ok_or_else(|| not_tracked::<K>(user_id, external_id));
    }

    let rows = update_columns::<K>(&tx, user_id, external_id, &values)?;
    if rows == 0 {
        return Err(not_tracked::<K>(user_id, external_id));
    }

    let record = get::<K>(&tx, user_id, external_id)?.ok_or_else(|| not_tracked::<K>(user_id, external_id))?;
    tx.commit()?;
    Ok(record)
}

pub fn delete<K: TrackedKind>(conn: &mut Connection, user_id: i64, external_id: i64) -> Result<(), WatchlistError> {
    let tx = conn.transaction()?;
    let rows = tx.execute(
        &format!("DELETE FROM {} WHERE user_id = ?1 AND {} = ?2", K::TABLE, K::ID_COLUMN),
        params![user_id, external_id],
    )?;
    if rows == 0 {
        return Err(not_tracked::<K>(user_id, external_id));
    }
    tx.commit()?;
    info!("User {user_id} untracked {} {external_id}", K::LABEL);
    Ok(())
}

fn update_columns<K: TrackedKind>(
    conn: &Connection,
    user_id: i64,
    external_id: i64,
    values: &[(&'static str, Value)],
) -> Result<usize, WatchlistError> {
    let assignments: Vec<String> = values
        .iter()
        .enumerate()
        .map(|(i, (column, _))| format!("{column} = ?{}", i + 1))
        .chain(std::iter::once(format!("updated_at = {NOW_SQL}")))
        .collect();
    let n = values.len();

    let sql = format!(
        "UPDATE {} SET {} WHERE user_id = ?{} AND {} = ?{}",
        K::TABLE,
        assignments.join(", "),
        n + 1,
        K::ID_COLUMN,
        n + 2
    );
    let params = values
        .iter()
        .map(|(_, v)| v.clone())
        .chain([Value::from(user_id), Value::from(external_id)]);
    let rows = conn.execute(&sql, params_from_iter(params))?;
    Ok(rows)
}

fn insert_row<K: TrackedKind>(
    conn: &Connection,
    user_id: i64,
    external_id: i64,
    values: ColumnValues,
) -> Result<(), WatchlistError> {
    let columns: Vec<&str> = ["user_id", K::ID_COLUMN]
        .into_iter()
        .chain(values.iter().map(|(column, _)| *column))
        .collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();

    let sql = format!(
        "INSERT INTO {} ({}, added_at, updated_at) VALUES ({}, {NOW_SQL}, {NOW_SQL})",
        K::TABLE,
        columns.join(", "),
        placeholders.join(", ")
    );
    let params = [Value::from(user_id), Value::from(external_id)]
        .into_iter()
        .chain(values.into_iter().map(|(_, v)| v));
    conn.execute(&sql, params_from_iter(params))?;
    Ok(())
}
