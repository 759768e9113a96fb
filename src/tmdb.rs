use crate::errors::WatchlistError;

use self::types::SimilarMovie;

pub mod api;
pub mod types;

pub use api::TmdbClient;

/// Where episode counts and season listings come from. Callers must finish
/// talking to the source before opening a write transaction.
#[allow(async_fn_in_trait)]
pub trait MetadataSource {
    /// Total episode count of a show, `None` when the source does not know it
    async fn show_episode_count(&self, show_id: i64) -> Result<Option<u32>, WatchlistError>;

    /// Episode numbers of one season, in airing order
    async fn season_episode_numbers(&self, show_id: i64, season: i64) -> Result<Vec<u32>, WatchlistError>;

    /// Titles the source considers close to the given movie
    async fn similar_movies(&self, movie_id: i64) -> Result<Vec<SimilarMovie>, WatchlistError>;
}
