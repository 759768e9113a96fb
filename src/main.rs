use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    config::Config,
    database::{
        db_loader::open_db,
        migration::{run_migrations, MigrationReport},
        models::{EpisodeMark, ListFilter, MovieFields, MoviePatch, ShowFields, ShowPatch},
        movies::{self, Movie},
        shows::Show,
        tracked, users,
    },
    errors::WatchlistError,
    tmdb::TmdbClient,
};

mod config;
mod database;
mod errors;
mod profile_manager;
mod progress;
mod tmdb;
mod tracking;

#[derive(Parser, Debug)]
#[command(name = "watchlist", about = "Per-profile movie and TV tracking")]
struct PrgmArgs {
    /// Config file (defaults to ~/.watchlist/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite file, overrides the config and DATABASE_PATH
    #[arg(long, global = true)]
    db: Option<String>,

    /// Profile the command acts for
    #[arg(long, global = true, default_value_t = 1)]
    user: i64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upgrade the database schema and print what was done
    Migrate,

    /// Write a sample config file
    InitConfig,

    /// Interactive profile manager
    Profiles,

    #[command(subcommand)]
    Users(UsersCommand),

    #[command(subcommand)]
    Movies(MoviesCommand),

    #[command(subcommand)]
    Shows(ShowsCommand),
}

#[derive(Subcommand, Debug)]
enum UsersCommand {
    List,
    Create { name: String },
    /// Deletes the profile and everything it tracks
    Delete { id: i64 },
    /// Sets the avatar reference, or clears it when no path is given
    Avatar { id: i64, path: Option<String> },
}

#[derive(Subcommand, Debug)]
enum MoviesCommand {
    List(FilterArgs),
    Get { id: i64 },
    /// Create or fully replace the entry
    Track {
        id: i64,
        #[command(flatten)]
        fields: MovieFieldArgs,
    },
    /// Change only the given fields of an existing entry
    Update {
        id: i64,
        #[command(flatten)]
        patch: MoviePatchArgs,
    },
    Untrack { id: i64 },
    Stats,
    /// Titles similar to the profile's best-rated movies
    Recommend,
}

#[derive(Subcommand, Debug)]
enum ShowsCommand {
    List(FilterArgs),
    Get { id: i64 },
    /// Create or fully replace the entry
    Track {
        id: i64,
        #[command(flatten)]
        fields: ShowFieldArgs,
    },
    /// Change only the given fields of an existing entry
    Update {
        id: i64,
        #[command(flatten)]
        patch: ShowPatchArgs,
    },
    Untrack { id: i64 },
    /// Explicitly marked episodes
    Episodes { id: i64 },
    /// Mark episodes given as SEASON:EPISODE
    Mark {
        id: i64,
        #[arg(required = true, value_parser = parse_episode_ref)]
        episodes: Vec<(i64, i64)>,
        #[arg(long)]
        unwatched: bool,
    },
    /// Mark every episode of a season
    MarkSeason {
        id: i64,
        season: i64,
        #[arg(long)]
        unwatched: bool,
    },
    Progress { id: i64 },
    /// Recompute the watched episode counter from the episode rows
    Recount { id: i64 },
}

#[derive(Args, Debug)]
struct FilterArgs {
    #[arg(long)]
    watched: Option<bool>,
    #[arg(long)]
    favourited: Option<bool>,
    #[arg(long)]
    watchlisted: Option<bool>,
    /// true: rating above 0, false: unrated
    #[arg(long)]
    rated: Option<bool>,
}

impl From<FilterArgs> for ListFilter {
    fn from(args: FilterArgs) -> Self {
        ListFilter {
            watched: args.watched,
            favourited: args.favourited,
            watchlisted: args.watchlisted,
            rated: args.rated,
        }
    }
}

#[derive(Args, Debug)]
struct MovieFieldArgs {
    #[arg(long)]
    watched: bool,
    #[arg(long)]
    favourited: bool,
    #[arg(long)]
    watchlisted: bool,
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    rating: i64,
    #[arg(long, default_value = "")]
    comment: String,
}

#[derive(Args, Debug)]
struct ShowFieldArgs {
    #[arg(long)]
    favourited: bool,
    #[arg(long)]
    watchlisted: bool,
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    rating: i64,
    #[arg(long, default_value = "")]
    comment: String,
}

#[derive(Args, Debug)]
struct MoviePatchArgs {
    #[arg(long)]
    watched: Option<bool>,
    #[arg(long)]
    favourited: Option<bool>,
    #[arg(long)]
    watchlisted: Option<bool>,
    #[arg(long, allow_negative_numbers = true)]
    rating: Option<i64>,
    #[arg(long)]
    comment: Option<String>,
}

#[derive(Args, Debug)]
struct ShowPatchArgs {
    #[arg(long)]
    favourited: Option<bool>,
    #[arg(long)]
    watchlisted: Option<bool>,
    #[arg(long, allow_negative_numbers = true)]
    rating: Option<i64>,
    #[arg(long)]
    comment: Option<String>,
}

/// "2:5" or "S02E05" (case insensitive)
fn parse_episode_ref(s: &str) -> Result<(i64, i64), String> {
    let lower = s.trim().to_lowercase();
    let (season, episode) = match lower.split_once(':') {
        Some(parts) => parts,
        None => lower
            .strip_prefix('s')
            .and_then(|rest| rest.split_once('e'))
            .ok_or_else(|| format!("expected SEASON:EPISODE or SxxEyy, got '{s}'"))?,
    };

    let season = season
        .parse::<i64>()
        .map_err(|e| format!("bad season in '{s}' : {e}"))?;
    let episode = episode
        .parse::<i64>()
        .map_err(|e| format!("bad episode in '{s}' : {e}"))?;
    if season < 0 || episode < 0 {
        return Err(format!("episode reference '{s}' cannot be negative"));
    }
    Ok((season, episode))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), WatchlistError> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|e| WatchlistError::Parse(format!("Failed to serialize output: {}", e)))?;
    println!("{out}");
    Ok(())
}

fn metadata_client(config: &Config) -> Result<TmdbClient, WatchlistError> {
    if config.metadata.api_key.is_empty() {
        warn!("No TMDB API key configured, metadata requests will likely be rejected");
    }
    TmdbClient::new(&config.metadata)
}

async fn run_movies(
    conn: &mut Connection,
    config: &Config,
    user_id: i64,
    command: MoviesCommand,
) -> Result<(), WatchlistError> {
    match command {
        MoviesCommand::List(filter) => print_json(&tracked::list::<Movie>(conn, user_id, &filter.into())?),
        MoviesCommand::Get { id } => print_json(&tracked::get::<Movie>(conn, user_id, id)?),
        MoviesCommand::Track { id, fields } => {
            let fields = MovieFields {
                watched: fields.watched,
                favourited: fields.favourited,
                watchlisted: fields.watchlisted,
                rating: fields.rating,
                comment: fields.comment,
            };
            print_json(&tracked::upsert::<Movie>(conn, user_id, id, &fields)?)
        }
        MoviesCommand::Update { id, patch } => {
            let patch = MoviePatch {
                watched: patch.watched,
                favourited: patch.favourited,
                watchlisted: patch.watchlisted,
                rating: patch.rating,
                comment: patch.comment,
            };
            print_json(&tracked::patch::<Movie>(conn, user_id, id, &patch)?)
        }
        MoviesCommand::Untrack { id } => {
            tracked::delete::<Movie>(conn, user_id, id)?;
            println!("Movie {id} untracked");
            Ok(())
        }
        MoviesCommand::Stats => print_json(&movies::get_stats(conn, user_id)?),
        MoviesCommand::Recommend => {
            let source = metadata_client(config)?;
            print_json(&tracking::recommend_movies(conn, &source, user_id).await?)
        }
    }
}

async fn run_shows(
    conn: &mut Connection,
    config: &Config,
    user_id: i64,
    command: ShowsCommand,
) -> Result<(), WatchlistError> {
    match command {
        ShowsCommand::List(filter) => print_json(&tracked::list::<Show>(conn, user_id, &filter.into())?),
        ShowsCommand::Get { id } => print_json(&tracked::get::<Show>(conn, user_id, id)?),
        ShowsCommand::Track { id, fields } => {
            let fields = ShowFields {
                favourited: fields.favourited,
                watchlisted: fields.watchlisted,
                rating: fields.rating,
                comment: fields.comment,
            };
            let source = metadata_client(config)?;
            print_json(&tracking::track_show(conn, &source, user_id, id, &fields).await?)
        }
        ShowsCommand::Update { id, patch } => {
            let patch = ShowPatch {
                favourited: patch.favourited,
                watchlisted: patch.watchlisted,
                rating: patch.rating,
                comment: patch.comment,
            };
            print_json(&tracked::patch::<Show>(conn, user_id, id, &patch)?)
        }
        ShowsCommand::Untrack { id } => {
            tracked::delete::<Show>(conn, user_id, id)?;
            println!("TV show {id} untracked");
            Ok(())
        }
        ShowsCommand::Episodes { id } => print_json(&progress::list_episodes(conn, user_id, id)?),
        ShowsCommand::Mark {
            id,
            episodes,
            unwatched,
        } => {
            let marks: Vec<EpisodeMark> = episodes
                .into_iter()
                .map(|(season_number, episode_number)| EpisodeMark {
                    season_number,
                    episode_number,
                    watched: !unwatched,
                })
                .collect();
            print_json(&progress::mark_episodes(conn, user_id, id, &marks)?)
        }
        ShowsCommand::MarkSeason { id, season, unwatched } => {
            let source = metadata_client(config)?;
            print_json(&progress::mark_season(conn, &source, user_id, id, season, !unwatched).await?)
        }
        ShowsCommand::Progress { id } => print_json(&progress::get_progress(conn, user_id, id)?),
        ShowsCommand::Recount { id } => {
            let watched = progress::recount(conn, user_id, id)?;
            print_json(&serde_json::json!({ "tmdb_show_id": id, "watched_episodes": watched }))
        }
    }
}

fn run_users(conn: &Connection, command: UsersCommand) -> Result<(), WatchlistError> {
    match command {
        UsersCommand::List => print_json(&users::list_users(conn)?),
        UsersCommand::Create { name } => print_json(&users::create_user(conn, &name)?),
        UsersCommand::Delete { id } => {
            users::delete_user(conn, id)?;
            println!("Profile {id} deleted");
            Ok(())
        }
        UsersCommand::Avatar { id, path } => print_json(&users::set_avatar_path(conn, id, path.as_deref())?),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the JSON results
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = PrgmArgs::parse();

    if let Command::InitConfig = args.command {
        let path = Config::create_sample(args.config.as_deref())?;
        println!("Sample config written to {}", path.display());
        return Ok(());
    }

    let config = Config::load(args.config.as_deref())?;
    let db_path = args.db.clone().or_else(|| config.database.path.clone());
    let mut db = open_db(db_path.as_deref(), config.database.busy_timeout())?;

    // every command sees the multi-user schema
    let report: MigrationReport = run_migrations(&mut db, &config.profiles.seed_name)?;

    match args.command {
        Command::Migrate => print_json(&report)?,
        Command::InitConfig => {}
        Command::Profiles => profile_manager::run_interactive_profile_manager(&db)?,
        Command::Users(command) => run_users(&db, command)?,
        Command::Movies(command) => run_movies(&mut db, &config, args.user, command).await?,
        Command::Shows(command) => run_shows(&mut db, &config, args.user, command).await?,
    }

    info!("Done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_episode_ref() {
        assert_eq!(parse_episode_ref("1:2").unwrap(), (1, 2));
        assert_eq!(parse_episode_ref("S02E05").unwrap(), (2, 5));
        assert_eq!(parse_episode_ref("s0e1").unwrap(), (0, 1));
        assert!(parse_episode_ref("12").is_err());
        assert!(parse_episode_ref("1:x").is_err());
        assert!(parse_episode_ref("-1:2").is_err());
    }

    #[test]
    fn test_cli_parses_mark() {
        let args = PrgmArgs::try_parse_from(["watchlist", "--user", "2", "shows", "mark", "1396", "1:1", "S01E02"]).unwrap();
        assert_eq!(args.user, 2);
        match args.command {
            Command::Shows(ShowsCommand::Mark {
                id,
                episodes,
                unwatched,
            }) => {
                assert_eq!(id, 1396);
                assert_eq!(episodes, vec![(1, 1), (1, 2)]);
                assert!(!unwatched);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_patch_only_carries_given_fields() {
        let args = PrgmArgs::try_parse_from(["watchlist", "movies", "update", "550", "--rating", "3"]).unwrap();
        match args.command {
            Command::Movies(MoviesCommand::Update { id, patch }) => {
                assert_eq!(id, 550);
                assert_eq!(patch.rating, Some(3));
                assert!(patch.watched.is_none());
                assert!(patch.comment.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parses_recommend() {
        let args = PrgmArgs::try_parse_from(["watchlist", "movies", "recommend", "--user", "3"]).unwrap();
        assert_eq!(args.user, 3);
        assert!(matches!(args.command, Command::Movies(MoviesCommand::Recommend)));
    }

    #[test]
    fn test_cli_user_defaults_to_seed() {
        let args = PrgmArgs::try_parse_from(["watchlist", "movies", "stats"]).unwrap();
        assert_eq!(args.user, 1);
    }
}
