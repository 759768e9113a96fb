use rusqlite::{params, Connection, Row};

use crate::database::{
    models::{check_rating, MovieFields, MoviePatch, MovieStats, TrackedMovie},
    tables::*,
    tracked::{ColumnValues, TrackedKind},
};
use crate::errors::WatchlistError;

/// Films, keyed by TMDB movie id
pub struct Movie;

impl TrackedKind for Movie {
    const TABLE: &'static str = DB_MOVIES_NAME;
    const ID_COLUMN: &'static str = "tmdb_movie_id";
    const LABEL: &'static str = "Movie";
    const SUPPORTS_WATCHED: bool = true;
    const SELECT_COLUMNS: &'static str =
        "user_id, tmdb_movie_id, watched, favourited, watchlisted, rating, comment, added_at, updated_at";

    type Record = TrackedMovie;
    type Fields = MovieFields;
    type Patch = MoviePatch;

    fn from_row(row: &Row) -> rusqlite::Result<TrackedMovie> {
        Ok(TrackedMovie {
            user_id: row.get(0)?,
            tmdb_movie_id: row.get(1)?,
            watched: row.get(2)?,
            favourited: row.get(3)?,
            watchlisted: row.get(4)?,
            rating: row.get(5)?,
            comment: row.get(6)?,
            added_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn field_values(fields: &MovieFields) -> Result<ColumnValues, WatchlistError> {
        Ok(vec![
            ("watched", fields.watched.into()),
            ("favourited", fields.favourited.into()),
            ("watchlisted", fields.watchlisted.into()),
            ("rating", check_rating(fields.rating)?.into()),
            ("comment", fields.comment.clone().into()),
        ])
    }

    fn patch_values(patch: &MoviePatch) -> Result<ColumnValues, WatchlistError> {
        let mut values: ColumnValues = vec![];
        if let Some(watched) = patch.watched {
            values.push(("watched", watched.into()));
        }
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

/// Dashboard counters for a profile's films
pub fn get_stats(conn: &Connection, user_id: i64) -> Result<MovieStats, WatchlistError> {
    let stats = conn.query_row(
        &format!(
            "SELECT COUNT(*),
                    COALESCE(SUM(watched), 0),
                    COALESCE(SUM(favourited), 0),
                    COALESCE(SUM(watchlisted), 0),
                    COALESCE(SUM(rating > 0), 0)
             FROM {DB_MOVIES_NAME}
             WHERE user_id = ?1"
        ),
        params![user_id],
        |row| {
            Ok(MovieStats {
                total_tracked: row.get(0)?,
                watched: row.get(1)?,
                favourited: row.get(2)?,
                watchlisted: row.get(3)?,
                rated: row.get(4)?,
            })
        },
    )?;
    Ok(stats)
}
