use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use crate::database::{models::User, tables::*};
use crate::errors::WatchlistError;

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        avatar_path: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// All profiles, oldest first
pub fn list_users(conn: &Connection) -> Result<Vec<User>, WatchlistError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, name, avatar_path, created_at FROM {DB_USERS_NAME} ORDER BY id"
    ))?;
    let users = stmt
        .query_map([], user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn get_user(conn: &Connection, user_id: i64) -> Result<Option<User>, WatchlistError> {
    let user = conn
        .query_row(
            &format!("SELECT id, name, avatar_path, created_at FROM {DB_USERS_NAME} WHERE id = ?1"),
            params![user_id],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

pub fn ensure_user_exists(conn: &Connection, user_id: i64) -> Result<(), WatchlistError> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {DB_USERS_NAME} WHERE id = ?1"),
        params![user_id],
        |row| row.get(0),
    )?;
    if count == 0 {
        return Err(WatchlistError::NotFound(format!("User {user_id} not found")));
    }
    Ok(())
}

pub fn create_user(conn: &Connection, name: &str) -> Result<User, WatchlistError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(WatchlistError::Validation("profile name cannot be empty".to_string()));
    }

    conn.execute(
        &format!("INSERT INTO {DB_USERS_NAME} (name) VALUES (?1)"),
        params![name],
    )?;
    let id = conn.last_insert_rowid();
    info!("Created profile {id} ({name})");

    get_user(conn, id)?.ok_or_else(|| WatchlistError::NotFound(format!("User {id} not found")))
}

/// Removes a profile and, through the cascades, everything it tracked
pub fn delete_user(conn: &Connection, user_id: i64) -> Result<(), WatchlistError> {
    let rows = conn.execute(
        &format!("DELETE FROM {DB_USERS_NAME} WHERE id = ?1"),
        params![user_id],
    )?;
    if rows == 0 {
        return Err(WatchlistError::NotFound(format!("User {user_id} not found")));
    }
    info!("Deleted profile {user_id}");
    Ok(())
}

/// Stores the avatar reference. The file itself lives outside the database.
pub fn set_avatar_path(conn: &Connection, user_id: i64, avatar_path: Option<&str>) -> Result<User, WatchlistError> {
    let rows = conn.execute(
        &format!("UPDATE {DB_USERS_NAME} SET avatar_path = ?1 WHERE id = ?2"),
        params![avatar_path, user_id],
    )?;
    if rows == 0 {
        return Err(WatchlistError::NotFound(format!("User {user_id} not found")));
    }
    get_user(conn, user_id)?.ok_or_else(|| WatchlistError::NotFound(format!("User {user_id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{count_rows, migration::run_migrations};

    fn db() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON").unwrap();
        run_migrations(&mut conn, "Frank").unwrap();
        conn
    }

    #[test]
    fn test_create_and_list() {
        let conn = db();
        let anna = create_user(&conn, "  Anna ").unwrap();
        assert_eq!(anna.name, "Anna");
        assert!(anna.created_at.is_some());

        let names: Vec<String> = list_users(&conn).unwrap().into_iter().map(|u| u.name).collect();
        assert_eq!(names, vec!["Frank", "Anna"]);
    }

    #[test]
    fn test_empty_name_rejected() {
        let conn = db();
        assert!(matches!(create_user(&conn, "   "), Err(WatchlistError::Validation(_))));
    }

    #[test]
    fn test_delete_unknown_user() {
        let conn = db();
        assert!(delete_user(&conn, 42).unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_cascades_only_own_rows() {
        let conn = db();
        let anna = create_user(&conn, "Anna").unwrap();
        conn.execute_batch(&format!(
            "INSERT INTO tracked_movies (user_id, tmdb_movie_id) VALUES (1, 550), ({id}, 550);
             INSERT INTO tracked_shows (user_id, tmdb_show_id) VALUES (1, 1396), ({id}, 1396);
             INSERT INTO tracked_episodes (user_id, tmdb_show_id, season_number, episode_number, watched)
                 VALUES (1, 1396, 1, 1, 1), ({id}, 1396, 1, 1, 1), ({id}, 1396, 1, 2, 0);",
            id = anna.id
        ))
        .unwrap();

        delete_user(&conn, anna.id).unwrap();

        assert!(get_user(&conn, anna.id).unwrap().is_none());
        assert_eq!(count_rows(&conn, DB_MOVIES_NAME).unwrap(), 1);
        assert_eq!(count_rows(&conn, DB_SHOWS_NAME).unwrap(), 1);
        assert_eq!(count_rows(&conn, DB_EPISODES_NAME).unwrap(), 1);
        let owner: i64 = conn
            .query_row("SELECT user_id FROM tracked_episodes", [], |row| row.get(0))
            .unwrap();
        assert_eq!(owner, 1);
    }

    #[test]
    fn test_avatar_reference() {
        let conn = db();
        let frank = set_avatar_path(&conn, 1, Some("avatars/frank.png")).unwrap();
        assert_eq!(frank.avatar_path.as_deref(), Some("avatars/frank.png"));

        let cleared = set_avatar_path(&conn, 1, None).unwrap();
        assert!(cleared.avatar_path.is_none());

        assert!(set_avatar_path(&conn, 9, None).unwrap_err().is_not_found());
    }

    #[test]
    fn test_ensure_user_exists() {
        let conn = db();
        assert!(ensure_user_exists(&conn, 1).is_ok());
        assert!(ensure_user_exists(&conn, 2).unwrap_err().is_not_found());
    }
}
