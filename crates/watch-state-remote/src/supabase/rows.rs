use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use watch_state_models::{
    EntryKey, FavoriteEntry, KeyError, Owner, TitleKey, WatchEntry, WatchlistEntry,
};
use watch_state_models::keys::{RawEntryKey, RawTitleKey};

/// Wire row of the `continue_watching` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinueWatchingRow {
    pub user_id: String,
    #[serde(flatten)]
    pub key: RawEntryKey,
    pub title: String,
    pub poster: String,
    #[serde(default)]
    pub progress: Option<f32>,
    #[serde(default)]
    pub episode_title: Option<String>,
    #[serde(default)]
    pub total_episodes: Option<u32>,
    pub last_watched_at: DateTime<Utc>,
}

impl ContinueWatchingRow {
    pub fn from_entry(owner: &Owner, entry: &WatchEntry) -> Self {
        Self {
            user_id: owner.as_str().to_string(),
            key: RawEntryKey::from(entry.key.clone()),
            title: entry.title.clone(),
            poster: entry.poster.clone(),
            progress: entry.progress,
            episode_title: entry.episode_title.clone(),
            total_episodes: entry.total_episodes,
            last_watched_at: entry.last_watched_at,
        }
    }

    pub fn into_entry(self) -> Result<WatchEntry, KeyError> {
        let key = EntryKey::try_from(self.key)?;
        Ok(WatchEntry {
            key,
            title: self.title,
            poster: self.poster,
            progress: self.progress,
            episode_title: self.episode_title,
            total_episodes: self.total_episodes,
            last_watched_at: self.last_watched_at,
        })
    }
}

/// Wire row shared by the `watchlist` and `favorites` tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleRow {
    pub user_id: String,
    #[serde(flatten)]
    pub key: RawTitleKey,
    pub title: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f32>,
    pub added_at: DateTime<Utc>,
}

impl TitleRow {
    pub fn from_watchlist(owner: &Owner, entry: &WatchlistEntry) -> Self {
        Self {
            user_id: owner.as_str().to_string(),
            key: RawTitleKey::from(entry.key.clone()),
            title: entry.title.clone(),
            poster_path: entry.poster_path.clone(),
            release_date: entry.release_date.clone(),
            vote_average: entry.vote_average,
            added_at: entry.added_at,
        }
    }

    pub fn from_favorite(owner: &Owner, entry: &FavoriteEntry) -> Self {
        Self {
            user_id: owner.as_str().to_string(),
            key: RawTitleKey::from(entry.key.clone()),
            title: entry.title.clone(),
            poster_path: entry.poster_path.clone(),
            release_date: entry.release_date.clone(),
            vote_average: entry.vote_average,
            added_at: entry.added_at,
        }
    }

    pub fn into_watchlist(self) -> Result<WatchlistEntry, KeyError> {
        let key = TitleKey::try_from(self.key)?;
        Ok(WatchlistEntry {
            key,
            title: self.title,
            poster_path: self.poster_path,
            release_date: self.release_date,
            vote_average: self.vote_average,
            added_at: self.added_at,
        })
    }

    pub fn into_favorite(self) -> Result<FavoriteEntry, KeyError> {
        let key = TitleKey::try_from(self.key)?;
        Ok(FavoriteEntry {
            key,
            title: self.title,
            poster_path: self.poster_path,
            release_date: self.release_date,
            vote_average: self.vote_average,
            added_at: self.added_at,
        })
    }
}

fn id_filter(column: &str, value: Option<u32>) -> (String, String) {
    match value {
        Some(v) => (column.to_string(), format!("eq.{}", v)),
        None => (column.to_string(), "is.null".to_string()),
    }
}

/// PostgREST filter pairs selecting exactly one continue-watching identity.
///
/// Null coordinates filter with `is.null` so a movie row (no season/episode)
/// matches only movie rows.
pub fn entry_key_filters(key: &EntryKey) -> Vec<(String, String)> {
    let raw = RawEntryKey::from(key.clone());
    vec![
        ("content_type".to_string(), format!("eq.{}", raw.content_type)),
        id_filter("tmdb_id", raw.tmdb_id),
        id_filter("anilist_id", raw.anilist_id),
        id_filter("season", raw.season),
        id_filter("episode", raw.episode),
        ("is_dub".to_string(), format!("eq.{}", raw.is_dub)),
    ]
}

/// PostgREST filter pairs selecting exactly one watchlist/favorites identity.
pub fn title_key_filters(key: &TitleKey) -> Vec<(String, String)> {
    let raw = RawTitleKey::from(key.clone());
    vec![
        ("content_type".to_string(), format!("eq.{}", raw.content_type)),
        id_filter("tmdb_id", raw.tmdb_id),
        id_filter("anilist_id", raw.anilist_id),
    ]
}
