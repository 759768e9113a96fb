use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::database::{
    models::{EpisodeMark, SeasonProgress, TrackedEpisode},
    tables::*,
};
use crate::errors::WatchlistError;

fn episode_from_row(row: &Row) -> rusqlite::Result<TrackedEpisode> {
    Ok(TrackedEpisode {
        season_number: row.get(0)?,
        episode_number: row.get(1)?,
        watched: row.get(2)?,
        watched_at: row.get(3)?,
    })
}

/// Creates the episode row on first mark, otherwise overwrites its state.
/// watched_at follows the flag: stamped when watched, cleared when not.
pub fn upsert_episode(
    conn: &Connection,
    user_id: i64,
    show_id: i64,
    mark: &EpisodeMark,
) -> Result<TrackedEpisode, WatchlistError> {
    let episode = conn.query_row(
        &format!(
            "INSERT INTO {DB_EPISODES_NAME}
                 (user_id, tmdb_show_id, season_number, episode_number, watched, watched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, CASE WHEN ?5 THEN {NOW_SQL} ELSE NULL END)
             ON CONFLICT (user_id, tmdb_show_id, season_number, episode_number)
             DO UPDATE SET watched = excluded.watched, watched_at = excluded.watched_at
             RETURNING season_number, episode_number, watched, watched_at"
        ),
        params![user_id, show_id, mark.season_number, mark.episode_number, mark.watched],
        episode_from_row,
    )?;
    Ok(episode)
}

/// Explicitly marked episodes of a show, in airing order
pub fn list_episodes(conn: &Connection, user_id: i64, show_id: i64) -> Result<Vec<TrackedEpisode>, WatchlistError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT season_number, episode_number, watched, watched_at
         FROM {DB_EPISODES_NAME}
         WHERE user_id = ?1 AND tmdb_show_id = ?2
         ORDER BY season_number, episode_number"
    ))?;
    let episodes = stmt
        .query_map(params![user_id, show_id], episode_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(episodes)
}

/// Rewrites the show's watched_episodes from its episode rows and returns it.
/// Always a full recount, never an adjustment of the stored value.
pub fn recompute_watched_episodes(conn: &Connection, user_id: i64, show_id: i64) -> Result<i64, WatchlistError> {
    let watched = conn
        .query_row(
            &format!(
                "UPDATE {DB_SHOWS_NAME}
                 SET watched_episodes = (
                         SELECT COUNT(*) FROM {DB_EPISODES_NAME}
                         WHERE user_id = ?1 AND tmdb_show_id = ?2 AND watched = 1
                     ),
                     updated_at = {NOW_SQL}
                 WHERE user_id = ?1 AND tmdb_show_id = ?2
                 RETURNING watched_episodes"
            ),
            params![user_id, show_id],
            |row| row.get(0),
        )
        .optional()?;

    watched.ok_or_else(|| {
        WatchlistError::NotFound(format!(
            "TV show with TMDB ID {show_id} is not tracked by user {user_id}"
        ))
    })
}

/// watched/total per season, only for seasons with at least one row
pub fn season_progress(conn: &Connection, user_id: i64, show_id: i64) -> Result<Vec<SeasonProgress>, WatchlistError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT season_number, COUNT(*), COALESCE(SUM(watched), 0)
         FROM {DB_EPISODES_NAME}
         WHERE user_id = ?1 AND tmdb_show_id = ?2
         GROUP BY season_number
         ORDER BY season_number"
    ))?;
    let seasons = stmt
        .query_map(params![user_id, show_id], |row| {
            Ok(SeasonProgress {
                season_number: row.get(0)?,
                total_episodes: row.get(1)?,
                watched_episodes: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(seasons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{count_rows, migration::run_migrations};

    fn db_with_show() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON").unwrap();
        run_migrations(&mut conn, "Frank").unwrap();
        conn.execute("INSERT INTO tracked_shows (user_id, tmdb_show_id) VALUES (1, 1396)", [])
            .unwrap();
        conn
    }

    fn mark(season: i64, episode: i64, watched: bool) -> EpisodeMark {
        EpisodeMark {
            season_number: season,
            episode_number: episode,
            watched,
        }
    }

    #[test]
    fn test_upsert_stamps_and_clears_watched_at() {
        let conn = db_with_show();
        let first = upsert_episode(&conn, 1, 1396, &mark(1, 1, true)).unwrap();
        assert!(first.watched);
        assert!(first.watched_at.is_some());

        let second = upsert_episode(&conn, 1, 1396, &mark(1, 1, false)).unwrap();
        assert!(!second.watched);
        assert!(second.watched_at.is_none());
        assert_eq!(count_rows(&conn, DB_EPISODES_NAME).unwrap(), 1);
    }

    #[test]
    fn test_unwatched_mark_creates_row() {
        let conn = db_with_show();
        upsert_episode(&conn, 1, 1396, &mark(2, 3, false)).unwrap();
        assert_eq!(
            list_episodes(&conn, 1, 1396).unwrap(),
            vec![TrackedEpisode {
                season_number: 2,
                episode_number: 3,
                watched: false,
                watched_at: None,
            }]
        );
    }

    #[test]
    fn test_episode_requires_tracked_show() {
        let conn = db_with_show();
        assert!(upsert_episode(&conn, 1, 9999, &mark(1, 1, true)).is_err());
    }

    #[test]
    fn test_recompute_counts_only_watched_rows() {
        let conn = db_with_show();
        conn.execute("UPDATE tracked_shows SET watched_episodes = 40", []).unwrap();
        upsert_episode(&conn, 1, 1396, &mark(1, 1, true)).unwrap();
        upsert_episode(&conn, 1, 1396, &mark(1, 2, false)).unwrap();
        upsert_episode(&conn, 1, 1396, &mark(2, 1, true)).unwrap();

        assert_eq!(recompute_watched_episodes(&conn, 1, 1396).unwrap(), 2);
        assert!(recompute_watched_episodes(&conn, 1, 5).unwrap_err().is_not_found());
    }

    #[test]
    fn test_season_progress_skips_unmarked_seasons() {
        let conn = db_with_show();
        upsert_episode(&conn, 1, 1396, &mark(3, 1, true)).unwrap();
        upsert_episode(&conn, 1, 1396, &mark(1, 2, false)).unwrap();
        upsert_episode(&conn, 1, 1396, &mark(1, 1, true)).unwrap();

        assert_eq!(
            season_progress(&conn, 1, 1396).unwrap(),
            vec![
                SeasonProgress {
                    season_number: 1,
                    total_episodes: 2,
                    watched_episodes: 1,
                },
                SeasonProgress {
                    season_number: 3,
                    total_episodes: 1,
                    watched_episodes: 1,
                },
            ]
        );
    }
}
