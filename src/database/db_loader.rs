use std::{fs, path::Path, time::Duration};

use rusqlite::Connection;
use tracing::debug;

use crate::{config::Config, errors::WatchlistError};

pub fn get_default_db_path() -> Result<String, WatchlistError> {
    let dir = Config::get_config_dir()?;
    let db_path = dir
        .to_str()
        .ok_or_else(|| WatchlistError::Config(format!("Non UTF-8 path : {}", dir.display())))?
        .to_string();
    Ok(format!("{db_path}/watchlist.db"))
}

pub fn open_db(custom_path: Option<&str>, busy_timeout: Duration) -> Result<Connection, WatchlistError> {
    let path = match custom_path {
        Some(p) => p.to_string(),
        None => get_default_db_path()?,
    };

    if let Some(parent) = Path::new(&path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    debug!("Opening database at {path}");
    let conn = Connection::open(&path)?;
    configure(&conn, busy_timeout)?;
    Ok(conn)
}

/// Connection settings every handle needs, whatever opened it
pub fn configure(conn: &Connection, busy_timeout: Duration) -> Result<(), WatchlistError> {
    // SQLite disables foreign keys by default; the cascades depend on them
    conn.execute_batch("PRAGMA foreign_keys = ON")?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_db_creates_parent_and_enables_foreign_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("watchlist.db");
        let conn = open_db(path.to_str(), Duration::from_millis(100)).unwrap();

        let fk: i64 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0)).unwrap();
        assert_eq!(fk, 1);
        assert!(path.exists());
    }
}
