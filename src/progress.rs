use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    database::{
        episodes,
        models::{EpisodeMark, ShowProgress, TrackedEpisode, TrackedShow},
        shows::Show,
        tracked,
    },
    errors::WatchlistError,
    tmdb::MetadataSource,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkResult {
    pub episodes: Vec<TrackedEpisode>,
    pub watched_episodes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonMarkResult {
    pub season_number: i64,
    pub updated: usize,
    pub watched_episodes: i64,
}

fn track_first(user_id: i64, show_id: i64) -> WatchlistError {
    WatchlistError::NotFound(format!(
        "TV show with TMDB ID {show_id} is not tracked by user {user_id}, track the show first"
    ))
}

fn tracked_show(conn: &Connection, user_id: i64, show_id: i64) -> Result<TrackedShow, WatchlistError> {
    tracked::get::<Show>(conn, user_id, show_id)?.ok_or_else(|| track_first(user_id, show_id))
}

fn check_mark(mark: &EpisodeMark) -> Result<(), WatchlistError> {
    if mark.season_number < 0 || mark.episode_number < 0 {
        return Err(WatchlistError::Validation(format!(
            "invalid episode reference S{}E{}",
            mark.season_number, mark.episode_number
        )));
    }
    Ok(())
}

/// Writes every mark and recomputes the show's counter, all or nothing
pub fn mark_episodes(
    conn: &mut Connection,
    user_id: i64,
    show_id: i64,
    marks: &[EpisodeMark],
) -> Result<MarkResult, WatchlistError> {
    for mark in marks {
        check_mark(mark)?;
    }

    let tx = conn.transaction()?;
    tracked_show(&tx, user_id, show_id)?;

    let episodes = marks
        .iter()
        .map(|mark| episodes::upsert_episode(&tx, user_id, show_id, mark))
        .collect::<Result<Vec<_>, _>>()?;
    let watched_episodes = episodes::recompute_watched_episodes(&tx, user_id, show_id)?;
    tx.commit()?;

    debug!(
        "User {user_id} marked {} episodes of TV show {show_id}, {watched_episodes} watched",
        episodes.len()
    );
    Ok(MarkResult {
        episodes,
        watched_episodes,
    })
}

/// Marks every episode the metadata source lists for the season. The source
/// is asked before the write transaction opens.
pub async fn mark_season<S: MetadataSource>(
    conn: &mut Connection,
    source: &S,
    user_id: i64,
    show_id: i64,
    season_number: i64,
    watched: bool,
) -> Result<SeasonMarkResult, WatchlistError> {
    if season_number < 0 {
        return Err(WatchlistError::Validation(format!("invalid season number {season_number}")));
    }
    tracked_show(conn, user_id, show_id)?;

    let numbers = source
        .season_episode_numbers(show_id, season_number)
        .await
        .map_err(|e| match e {
            WatchlistError::UpstreamUnavailable(_) => e,
            other => WatchlistError::UpstreamUnavailable(other.to_string()),
        })?;
    if numbers.is_empty() {
        return Err(WatchlistError::NotFound(format!(
            "Season {season_number} of TV show {show_id} has no episodes"
        )));
    }

    let marks: Vec<EpisodeMark> = numbers
        .into_iter()
        .map(|episode_number| EpisodeMark {
            season_number,
            episode_number: i64::from(episode_number),
            watched,
        })
        .collect();
    let result = mark_episodes(conn, user_id, show_id, &marks)?;

    info!(
        "User {user_id} marked season {season_number} of TV show {show_id} as {}",
        if watched { "watched" } else { "unwatched" }
    );
    Ok(SeasonMarkResult {
        season_number,
        updated: result.episodes.len(),
        watched_episodes: result.watched_episodes,
    })
}

/// Per-season counts cover only seasons with marked episodes. The overall
/// total prefers the stored count and falls back to what was observed.
pub fn get_progress(conn: &Connection, user_id: i64, show_id: i64) -> Result<ShowProgress, WatchlistError> {
    let show = tracked_show(conn, user_id, show_id)?;
    let seasons = episodes::season_progress(conn, user_id, show_id)?;

    let total_episodes = match show.total_episodes {
        Some(total) if total > 0 => total,
        _ => seasons.iter().map(|s| s.total_episodes).sum(),
    };

    Ok(ShowProgress {
        tmdb_show_id: show_id,
        total_episodes,
        watched_episodes: show.watched_episodes,
        seasons,
    })
}

pub fn list_episodes(conn: &Connection, user_id: i64, show_id: i64) -> Result<Vec<TrackedEpisode>, WatchlistError> {
    tracked_show(conn, user_id, show_id)?;
    episodes::list_episodes(conn, user_id, show_id)
}

/// Rebuilds a counter that drifted, e.g. after manual edits to the file
pub fn recount(conn: &mut Connection, user_id: i64, show_id: i64) -> Result<i64, WatchlistError> {
    let tx = conn.transaction()?;
    tracked_show(&tx, user_id, show_id)?;
    let watched = episodes::recompute_watched_episodes(&tx, user_id, show_id)?;
    tx.commit()?;
    info!("Recounted TV show {show_id} for user {user_id}: {watched} watched");
    Ok(watched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{
        count_rows,
        migration::run_migrations,
        models::{SeasonProgress, ShowFields},
        tables::DB_EPISODES_NAME,
        users::create_user,
    };
    use crate::tmdb::testing::FakeSource;

    fn db() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON").unwrap();
        run_migrations(&mut conn, "Frank").unwrap();
        conn
    }

    fn track(conn: &mut Connection, user_id: i64, show_id: i64) {
        tracked::upsert::<Show>(conn, user_id, show_id, &ShowFields::default()).unwrap();
    }

    fn mark(season: i64, episode: i64, watched: bool) -> EpisodeMark {
        EpisodeMark {
            season_number: season,
            episode_number: episode,
            watched,
        }
    }

    #[test]
    fn test_mark_two_episodes() {
        let mut conn = db();
        track(&mut conn, 1, 1396);

        let result = mark_episodes(&mut conn, 1, 1396, &[mark(1, 1, true), mark(1, 2, true)]).unwrap();
        assert_eq!(result.watched_episodes, 2);
        assert_eq!(result.episodes.len(), 2);

        let progress = get_progress(&conn, 1, 1396).unwrap();
        assert_eq!(progress.watched_episodes, 2);
        assert_eq!(
            progress.seasons,
            vec![SeasonProgress {
                season_number: 1,
                total_episodes: 2,
                watched_episodes: 2,
            }]
        );
        assert_eq!(progress.total_episodes, 2);
    }

    #[test]
    fn test_unmark_decrements_counter() {
        let mut conn = db();
        track(&mut conn, 1, 1396);
        mark_episodes(&mut conn, 1, 1396, &[mark(1, 1, true), mark(1, 2, true)]).unwrap();

        let result = mark_episodes(&mut conn, 1, 1396, &[mark(1, 2, false)]).unwrap();
        assert_eq!(result.watched_episodes, 1);
        assert!(result.episodes[0].watched_at.is_none());
        assert_eq!(get_progress(&conn, 1, 1396).unwrap().seasons[0].total_episodes, 2);
    }

    #[test]
    fn test_marks_require_tracked_show() {
        let mut conn = db();
        let err = mark_episodes(&mut conn, 1, 1396, &[mark(1, 1, true)]).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(count_rows(&conn, DB_EPISODES_NAME).unwrap(), 0);
        assert!(get_progress(&conn, 1, 1396).unwrap_err().is_not_found());
        assert!(list_episodes(&conn, 1, 1396).unwrap_err().is_not_found());
    }

    #[test]
    fn test_invalid_mark_writes_nothing() {
        let mut conn = db();
        track(&mut conn, 1, 1396);
        let err = mark_episodes(&mut conn, 1, 1396, &[mark(1, 1, true), mark(-1, 2, true)]).unwrap_err();
        assert!(matches!(err, WatchlistError::Validation(_)));
        assert_eq!(count_rows(&conn, DB_EPISODES_NAME).unwrap(), 0);
    }

    #[test]
    fn test_counters_are_per_user() {
        let mut conn = db();
        let anna = create_user(&conn, "Anna").unwrap();
        track(&mut conn, 1, 1396);
        track(&mut conn, anna.id, 1396);

        mark_episodes(&mut conn, 1, 1396, &[mark(1, 1, true), mark(1, 2, true), mark(1, 3, true)]).unwrap();
        mark_episodes(&mut conn, anna.id, 1396, &[mark(1, 1, true)]).unwrap();

        assert_eq!(get_progress(&conn, 1, 1396).unwrap().watched_episodes, 3);
        assert_eq!(get_progress(&conn, anna.id, 1396).unwrap().watched_episodes, 1);
        assert_eq!(list_episodes(&conn, anna.id, 1396).unwrap().len(), 1);
    }

    #[test]
    fn test_stored_total_wins_over_observed() {
        let mut conn = db();
        track(&mut conn, 1, 1396);
        mark_episodes(&mut conn, 1, 1396, &[mark(1, 1, true)]).unwrap();
        assert_eq!(get_progress(&conn, 1, 1396).unwrap().total_episodes, 1);

        conn.execute("UPDATE tracked_shows SET total_episodes = 62", []).unwrap();
        assert_eq!(get_progress(&conn, 1, 1396).unwrap().total_episodes, 62);

        conn.execute("UPDATE tracked_shows SET total_episodes = 0", []).unwrap();
        assert_eq!(get_progress(&conn, 1, 1396).unwrap().total_episodes, 1);
    }

    #[test]
    fn test_recount_heals_drift() {
        let mut conn = db();
        track(&mut conn, 1, 1396);
        mark_episodes(&mut conn, 1, 1396, &[mark(1, 1, true), mark(2, 1, true)]).unwrap();
        conn.execute("UPDATE tracked_shows SET watched_episodes = 99", []).unwrap();

        assert_eq!(recount(&mut conn, 1, 1396).unwrap(), 2);
        assert_eq!(get_progress(&conn, 1, 1396).unwrap().watched_episodes, 2);
        assert!(recount(&mut conn, 1, 7).unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_mark_season() {
        let mut conn = db();
        track(&mut conn, 1, 1396);
        let source = FakeSource::with_season(1396, 2, vec![1, 2, 3, 4]);

        let result = mark_season(&mut conn, &source, 1, 1396, 2, true).await.unwrap();
        assert_eq!(result.updated, 4);
        assert_eq!(result.watched_episodes, 4);

        let result = mark_season(&mut conn, &source, 1, 1396, 2, false).await.unwrap();
        assert_eq!(result.updated, 4);
        assert_eq!(result.watched_episodes, 0);
        assert_eq!(count_rows(&conn, DB_EPISODES_NAME).unwrap(), 4);
    }

    #[tokio::test]
    async fn test_empty_season_writes_nothing() {
        let mut conn = db();
        track(&mut conn, 1, 1396);
        let source = FakeSource::default();

        let err = mark_season(&mut conn, &source, 1, 1396, 9, true).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(count_rows(&conn, DB_EPISODES_NAME).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_season_mark_surfaces_upstream_failure() {
        let mut conn = db();
        track(&mut conn, 1, 1396);
        let source = FakeSource::unavailable();

        let err = mark_season(&mut conn, &source, 1, 1396, 1, true).await.unwrap_err();
        assert!(matches!(err, WatchlistError::UpstreamUnavailable(_)));
        assert_eq!(count_rows(&conn, DB_EPISODES_NAME).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_season_mark_on_untracked_show_skips_source() {
        let mut conn = db();
        let source = FakeSource::with_season(1396, 1, vec![1, 2]);

        let err = mark_season(&mut conn, &source, 1, 1396, 1, true).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(source.calls.get(), 0);
    }
}
