// Multi-user schema. Every tracking table is owned by a profile in `users`;
// episode rows hang off their show through a composite foreign key so that
// untracking a show (or deleting a profile) removes its episodes too.

pub const DB_USERS_NAME: &str = "users";
pub const DB_USERS_COLS: &str = "id INTEGER PRIMARY KEY AUTOINCREMENT, \
    name TEXT NOT NULL, \
    avatar_path TEXT NULL, \
    created_at TEXT DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))";

pub const DB_MOVIES_NAME: &str = "tracked_movies";
pub const DB_MOVIES_COLS: &str = "user_id INTEGER NOT NULL, \
    tmdb_movie_id INTEGER NOT NULL, \
    watched BOOLEAN DEFAULT 0 NOT NULL, \
    favourited BOOLEAN DEFAULT 0 NOT NULL, \
    watchlisted BOOLEAN DEFAULT 0 NOT NULL, \
    rating INTEGER DEFAULT 0 NOT NULL CHECK (rating BETWEEN 0 AND 5), \
    comment TEXT DEFAULT '' NOT NULL, \
    added_at TEXT, \
    updated_at TEXT, \
    PRIMARY KEY (user_id, tmdb_movie_id), \
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE";

pub const DB_SHOWS_NAME: &str = "tracked_shows";
pub const DB_SHOWS_COLS: &str = "user_id INTEGER NOT NULL, \
    tmdb_show_id INTEGER NOT NULL, \
    favourited BOOLEAN DEFAULT 0 NOT NULL, \
    watchlisted BOOLEAN DEFAULT 0 NOT NULL, \
    rating INTEGER DEFAULT 0 NOT NULL CHECK (rating BETWEEN 0 AND 5), \
    comment TEXT DEFAULT '' NOT NULL, \
    total_episodes INTEGER NULL, \
    watched_episodes INTEGER DEFAULT 0 NOT NULL, \
    added_at TEXT, \
    updated_at TEXT, \
    PRIMARY KEY (user_id, tmdb_show_id), \
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE";

pub const DB_EPISODES_NAME: &str = "tracked_episodes";
pub const DB_EPISODES_COLS: &str = "id INTEGER PRIMARY KEY AUTOINCREMENT, \
    user_id INTEGER NOT NULL, \
    tmdb_show_id INTEGER NOT NULL, \
    season_number INTEGER NOT NULL, \
    episode_number INTEGER NOT NULL, \
    watched BOOLEAN DEFAULT 0 NOT NULL, \
    watched_at TEXT NULL, \
    UNIQUE (user_id, tmdb_show_id, season_number, episode_number), \
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE, \
    FOREIGN KEY (user_id, tmdb_show_id) \
        REFERENCES tracked_shows(user_id, tmdb_show_id) ON DELETE CASCADE";

// Indexes
pub const DB_MOVIES_INDEX_UPDATED: &str =
    "CREATE INDEX IF NOT EXISTS idx_tracked_movies_updated ON tracked_movies(user_id, updated_at)";
pub const DB_SHOWS_INDEX_UPDATED: &str =
    "CREATE INDEX IF NOT EXISTS idx_tracked_shows_updated ON tracked_shows(user_id, updated_at)";

/// Creation order matters: parents before the tables referencing them
pub const SCHEMA_TABLES: &[(&str, &str)] = &[
    (DB_USERS_NAME, DB_USERS_COLS),
    (DB_MOVIES_NAME, DB_MOVIES_COLS),
    (DB_SHOWS_NAME, DB_SHOWS_COLS),
    (DB_EPISODES_NAME, DB_EPISODES_COLS),
];

pub const SCHEMA_INDEXES: &[&str] = &[DB_MOVIES_INDEX_UPDATED, DB_SHOWS_INDEX_UPDATED];

/// Columns introduced after the multi-user layout shipped.
/// (table, column, definition used by ALTER TABLE ADD COLUMN)
pub const ADDED_COLUMNS: &[(&str, &str, &str)] = &[
    (DB_MOVIES_NAME, "watchlisted", "BOOLEAN DEFAULT 0 NOT NULL"),
    (DB_SHOWS_NAME, "watchlisted", "BOOLEAN DEFAULT 0 NOT NULL"),
];

/// SQLite expression for "now" as ISO-8601 UTC with milliseconds
pub const NOW_SQL: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";
