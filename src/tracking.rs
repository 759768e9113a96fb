use std::collections::HashSet;

use rusqlite::{types::Value, Connection};
use tracing::{debug, info, warn};

use crate::{
    database::{
        models::{ListFilter, ShowFields, TrackedShow},
        movies::Movie,
        shows::Show,
        tracked::{self, TrackedKind},
    },
    errors::WatchlistError,
    tmdb::{types::SimilarMovie, MetadataSource},
};

/// Movies rated at least this high seed the recommendations
pub const RECOMMEND_MIN_RATING: i64 = 4;
pub const MAX_RECOMMENDATIONS: usize = 20;

/// Upsert for shows. A show seen for the first time gets its total episode
/// count from the metadata source; an unreachable source leaves it unknown.
pub async fn track_show<S: MetadataSource>(
    conn: &mut Connection,
    source: &S,
    user_id: i64,
    show_id: i64,
    fields: &ShowFields,
) -> Result<TrackedShow, WatchlistError> {
    // reject bad input before going to the network
    Show::field_values(fields)?;

    let insert_only = if tracked::get::<Show>(conn, user_id, show_id)?.is_none() {
        let total = fetch_total_episodes(source, show_id).await;
        vec![("total_episodes", Value::from(total.map(i64::from)))]
    } else {
        vec![]
    };

    tracked::upsert_with::<Show>(conn, user_id, show_id, fields, insert_only)
}

async fn fetch_total_episodes<S: MetadataSource>(source: &S, show_id: i64) -> Option<u32> {
    match source.show_episode_count(show_id).await {
        Ok(Some(count)) => {
            debug!("TV show {show_id} has {count} episodes");
            Some(count)
        }
        Ok(None) => {
            debug!("No episode count known for TV show {show_id}");
            None
        }
        Err(e) => {
            warn!("Could not fetch episode count for TV show {show_id}, leaving it unknown : {e}");
            None
        }
    }
}

/// Titles similar to the profile's best-rated movies that it does not track
/// yet, first seen first kept. A movie whose lookup fails is skipped.
pub async fn recommend_movies<S: MetadataSource>(
    conn: &Connection,
    source: &S,
    user_id: i64,
) -> Result<Vec<SimilarMovie>, WatchlistError> {
    let library = tracked::list::<Movie>(conn, user_id, &ListFilter::default())?;
    let tracked_ids: HashSet<i64> = library.iter().map(|m| m.tmdb_movie_id).collect();
    let seeds: Vec<i64> = library
        .iter()
        .filter(|m| m.rating >= RECOMMEND_MIN_RATING)
        .map(|m| m.tmdb_movie_id)
        .collect();

    let mut seen = HashSet::new();
    let mut recommendations = vec![];
    for movie_id in seeds {
        if recommendations.len() >= MAX_RECOMMENDATIONS {
            break;
        }
        let similar = match source.similar_movies(movie_id).await {
            Ok(similar) => similar,
            Err(e) => {
                warn!("Skipping similar titles for movie {movie_id} : {e}");
                continue;
            }
        };
        for movie in similar {
            if !tracked_ids.contains(&movie.id) && seen.insert(movie.id) {
                recommendations.push(movie);
            }
        }
    }

    recommendations.truncate(MAX_RECOMMENDATIONS);
    info!("{} recommendations for user {user_id}", recommendations.len());
    Ok(recommendations)
}
