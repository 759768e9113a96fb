use serde::Serialize;

use crate::errors::WatchlistError;

pub const MAX_RATING: i64 = 5;

/// Ratings are whole stars, 0 meaning "not rated"
pub fn check_rating(rating: i64) -> Result<i64, WatchlistError> {
    if (0..=MAX_RATING).contains(&rating) {
        Ok(rating)
    } else {
        Err(WatchlistError::Validation(format!(
            "rating must be between 0 and {MAX_RATING}, got {rating}"
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub avatar_path: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedMovie {
    pub user_id: i64,
    pub tmdb_movie_id: i64,
    pub watched: bool,
    pub favourited: bool,
    pub watchlisted: bool,
    pub rating: i64,
    pub comment: String,
    pub added_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedShow {
    pub user_id: i64,
    pub tmdb_show_id: i64,
    pub favourited: bool,
    pub watchlisted: bool,
    pub rating: i64,
    pub comment: String,
    /// Unknown until the metadata source has been asked
    pub total_episodes: Option<i64>,
    pub watched_episodes: i64,
    pub added_at: Option<String>,
    pub updated_at: Option<String>,
}

/// An episode somebody explicitly marked. Episodes without a row have no
/// recorded state, which is not the same as "unwatched".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedEpisode {
    pub season_number: i64,
    pub episode_number: i64,
    pub watched: bool,
    pub watched_at: Option<String>,
}

/// Full replacement values for a movie upsert
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovieFields {
    pub watched: bool,
    pub favourited: bool,
    pub watchlisted: bool,
    pub rating: i64,
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MoviePatch {
    pub watched: Option<bool>,
    pub favourited: Option<bool>,
    pub watchlisted: Option<bool>,
    pub rating: Option<i64>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShowFields {
    pub favourited: bool,
    pub watchlisted: bool,
    pub rating: i64,
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShowPatch {
    pub favourited: Option<bool>,
    pub watchlisted: Option<bool>,
    pub rating: Option<i64>,
    pub comment: Option<String>,
}

/// Library filters. `None` means "don't filter on this".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListFilter {
    pub watched: Option<bool>,
    pub favourited: Option<bool>,
    pub watchlisted: Option<bool>,
    /// true: rating > 0, false: rating = 0
    pub rated: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodeMark {
    pub season_number: i64,
    pub episode_number: i64,
    pub watched: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonProgress {
    pub season_number: i64,
    pub total_episodes: i64,
    pub watched_episodes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShowProgress {
    pub tmdb_show_id: i64,
    pub total_episodes: i64,
    pub watched_episodes: i64,
    pub seasons: Vec<SeasonProgress>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MovieStats {
    pub total_tracked: i64,
    pub watched: i64,
    pub favourited: i64,
    pub watchlisted: i64,
    pub rated: i64,
}
