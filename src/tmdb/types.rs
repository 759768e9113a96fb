use serde::{Deserialize, Serialize};

/// The slice of `GET /tv/{id}` we read
#[derive(Deserialize, Debug)]
pub struct TvShowDetail {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub number_of_episodes: Option<u32>,
}

/// The slice of `GET /tv/{id}/season/{n}` we read
#[derive(Deserialize, Debug)]
pub struct SeasonDetail {
    #[serde(default)]
    pub episodes: Vec<SeasonEpisode>,
}

#[derive(Deserialize, Debug)]
pub struct SeasonEpisode {
    pub episode_number: u32,
}

/// One entry of `GET /movie/{id}/similar`
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SimilarMovie {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f64>,
}

#[derive(Deserialize, Debug)]
pub struct SimilarMoviesPage {
    #[serde(default)]
    pub results: Vec<SimilarMovie>,
}

impl SeasonDetail {
    /// Episode numbers sorted ascending, duplicates dropped
    pub fn episode_numbers(&self) -> Vec<u32> {
        let mut numbers: Vec<u32> = self.episodes.iter().map(|e| e.episode_number).collect();
        numbers.sort_unstable();
        numbers.dedup();
        numbers
    }
}
