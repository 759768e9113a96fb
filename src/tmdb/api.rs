use reqwest::StatusCode;
use tracing::debug;

use crate::{config::MetadataConfig, errors::WatchlistError};

use super::{
    types::{SeasonDetail, SimilarMovie, SimilarMoviesPage, TvShowDetail},
    MetadataSource,
};

pub struct TmdbClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TmdbClient {
    pub fn new(config: &MetadataConfig) -> Result<Self, WatchlistError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self::with_client(client, &config.base_url, &config.api_key))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn show_detail(&self, show_id: i64) -> Result<TvShowDetail, WatchlistError> {
        let url = self.endpoint(&format!("tv/{show_id}"));
        debug!("Querying TMDB: {url}");

        let detail = self
            .client
            .get(&url)
            .query(&[("api_key", &self.api_key)])
            .send()
            .await?
            .error_for_status()?
            .json::<TvShowDetail>()
            .await?;
        Ok(detail)
    }

    /// `None` when TMDB has no such season
    pub async fn season_detail(&self, show_id: i64, season: i64) -> Result<Option<SeasonDetail>, WatchlistError> {
        let url = self.endpoint(&format!("tv/{show_id}/season/{season}"));
        debug!("Querying TMDB: {url}");

        let resp = self
            .client
            .get(&url)
            .query(&[("api_key", &self.api_key)])
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let season = resp.error_for_status()?.json::<SeasonDetail>().await?;
        Ok(Some(season))
    }

    /// First page of TMDB's "similar" list, English-language titles only
    pub async fn similar_movie_page(&self, movie_id: i64) -> Result<SimilarMoviesPage, WatchlistError> {
        let url = self.endpoint(&format!("movie/{movie_id}/similar"));
        debug!("Querying TMDB: {url}");

        let page = self
            .client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("page", "1"),
                ("with_original_language", "en"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<SimilarMoviesPage>()
            .await?;
        Ok(page)
    }
}

impl MetadataSource for TmdbClient {
    async fn show_episode_count(&self, show_id: i64) -> Result<Option<u32>, WatchlistError> {
        let detail = self.show_detail(show_id).await?;
        debug!(
            "TMDB show {} ({}) lists {:?} episodes",
            detail.id,
            detail.name.as_deref().unwrap_or("?"),
            detail.number_of_episodes
        );
        Ok(detail.number_of_episodes)
    }

    async fn season_episode_numbers(&self, show_id: i64, season: i64) -> Result<Vec<u32>, WatchlistError> {
        Ok(self
            .season_detail(show_id, season)
            .await?
            .map(|s| s.episode_numbers())
            .unwrap_or_default())
    }

    async fn similar_movies(&self, movie_id: i64) -> Result<Vec<SimilarMovie>, WatchlistError> {
        Ok(self.similar_movie_page(movie_id).await?.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_endpoint_joins_cleanly() {
        let client = TmdbClient::with_client(reqwest::Client::new(), "https://api.themoviedb.org/3/", "k");
        assert_eq!(client.endpoint("tv/1396"), "https://api.themoviedb.org/3/tv/1396");
        assert_eq!(
            client.endpoint("/tv/1396/season/2"),
            "https://api.themoviedb.org/3/tv/1396/season/2"
        );
    }

    #[tokio::test]
    async fn test_unreachable_source_is_upstream_unavailable() {
        let config = MetadataConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: String::new(),
            timeout_secs: 2,
        };
        let client = TmdbClient::new(&config).unwrap();

        let err = client.season_episode_numbers(1396, 1).await.unwrap_err();
        assert!(matches!(err, WatchlistError::UpstreamUnavailable(_)));
        assert_eq!(config.timeout(), Duration::from_secs(2));
    }
}
