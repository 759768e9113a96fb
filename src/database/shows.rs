use rusqlite::Row;

use crate::database::{
    models::{check_rating, ShowFields, ShowPatch, TrackedShow},
    tables::*,
    tracked::{ColumnValues, TrackedKind},
};
use crate::errors::WatchlistError;

/// TV shows, keyed by TMDB show id. Watched state lives on the episodes;
/// `watched_episodes` is derived from them and is not writable here.
pub struct Show;

impl TrackedKind for Show {
    const TABLE: &'static str = DB_SHOWS_NAME;
    const ID_COLUMN: &'static str = "tmdb_show_id";
    const LABEL: &'static str = "TV show";
    const SUPPORTS_WATCHED: bool = false;
    const SELECT_COLUMNS: &'static str = "user_id, tmdb_show_id, favourited, watchlisted, rating, comment, \
        total_episodes, watched_episodes, added_at, updated_at";

    type Record = TrackedShow;
    type Fields = ShowFields;
    type Patch = ShowPatch;

    fn from_row(row: &Row) -> rusqlite::Result<TrackedShow> {
        Ok(TrackedShow {
            user_id: row.get(0)?,
            tmdb_show_id: row.get(1)?,
            favourited: row.get(2)?,
            watchlisted: row.get(3)?,
            rating: row.get(4)?,
            comment: row.get(5)?,
            total_episodes: row.get(6)?,
            watched_episodes: row.get(7)?,
            added_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn field_values(fields: &ShowFields) -> Result<ColumnValues, WatchlistError> {
        Ok(vec![
            ("favourited", fields.favourited.into()),
            ("watchlisted", fields.watchlisted.into()),
            ("rating", check_rating(fields.rating)?.into()),
            ("comment", fields.comment.clone().into()),
        ])
    }

    fn patch_values(patch: &ShowPatch) -> Result<ColumnValues, WatchlistError> {
        let mut values: ColumnValues = vec![];
        if let Some(favourited) = patch.favourited {
            values.push(("favourited", favourited.into()));
        }
        if let Some(watchlisted) = patch.watchlisted {
            values.push(("watchlisted", watchlisted.into()));
        }
        if let Some(rating) = patch.rating {
            values.push(("rating", check_rating(rating)?.into()));
        }
        if let Some(comment) = &patch.comment {
            values.push(("comment", comment.clone().into()));
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{count_rows, migration::run_migrations, models::ListFilter, tracked};
    use rusqlite::{types::Value, Connection};

    fn db() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON").unwrap();
        run_migrations(&mut conn, "Frank").unwrap();
        conn
    }

    #[test]
    fn test_watched_filter_rejected_for_shows() {
        let conn = db();
        let filter = ListFilter {
            watched: Some(true),
            ..Default::default()
        };
        assert!(matches!(
            tracked::list::<Show>(&conn, 1, &filter),
            Err(WatchlistError::Validation(_))
        ));
    }

    #[test]
    fn test_new_show_starts_without_progress() {
        let mut conn = db();
        let show = tracked::upsert::<Show>(
            &mut conn,
            1,
            1396,
            &ShowFields {
                rating: 4,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(show.rating, 4);
        assert_eq!(show.watched_episodes, 0);
        assert!(show.total_episodes.is_none());
    }

    #[test]
    fn test_insert_only_columns_ignored_on_update() {
        let mut conn = db();
        tracked::upsert_with::<Show>(&mut conn, 1, 1396, &ShowFields::default(), vec![("total_episodes", Value::from(62i64))])
            .unwrap();
        let updated = tracked::upsert_with::<Show>(
            &mut conn,
            1,
            1396,
            &ShowFields {
                favourited: true,
                ..Default::default()
            },
            vec![("total_episodes", Value::from(10i64))],
        )
        .unwrap();
        assert!(updated.favourited);
        assert_eq!(updated.total_episodes, Some(62));
    }

    #[test]
    fn test_untrack_cascades_to_episodes() {
        let mut conn = db();
        tracked::upsert::<Show>(&mut conn, 1, 1396, &ShowFields::default()).unwrap();
        conn.execute(
            "INSERT INTO tracked_episodes (user_id, tmdb_show_id, season_number, episode_number, watched) VALUES (1, 1396, 1, 1, 1)",
            [],
        )
        .unwrap();

        tracked::delete::<Show>(&mut conn, 1, 1396).unwrap();
        assert_eq!(count_rows(&conn, DB_EPISODES_NAME).unwrap(), 0);
    }

    #[test]
    fn test_patch_show() {
        let mut conn = db();
        let patch = ShowPatch {
            watchlisted: Some(true),
            ..Default::default()
        };
        assert!(tracked::patch::<Show>(&mut conn, 1, 1396, &patch).unwrap_err().is_not_found());

        tracked::upsert::<Show>(&mut conn, 1, 1396, &ShowFields::default()).unwrap();
        let patched = tracked::patch::<Show>(&mut conn, 1, 1396, &patch).unwrap();
        assert!(patched.watchlisted);
        assert!(!patched.favourited);
    }
}
