use crate::keys::EntryKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last known playback position for one piece of content for one viewer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchEntry {
    #[serde(flatten)]
    pub key: EntryKey,
    /// Display cache, not authoritative metadata.
    pub title: String,
    pub poster: String,
    /// Percent watched, 0-100. Advisory only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_episodes: Option<u32>,
    pub last_watched_at: DateTime<Utc>,
}

impl WatchEntry {
    pub fn new(key: EntryKey, title: impl Into<String>, poster: impl Into<String>) -> Self {
        Self {
            key,
            title: title.into(),
            poster: poster.into(),
            progress: None,
            episode_title: None,
            total_episodes: None,
            last_watched_at: Utc::now(),
        }
    }

    pub fn with_progress(mut self, percent: f32) -> Self {
        self.progress = Some(percent.clamp(0.0, 100.0));
        self
    }

    pub fn with_episode_title(mut self, episode_title: impl Into<String>) -> Self {
        self.episode_title = Some(episode_title.into());
        self
    }

    pub fn with_total_episodes(mut self, total_episodes: u32) -> Self {
        self.total_episodes = Some(total_episodes);
        self
    }

    /// Bump the watch timestamp to now.
    pub fn touch(&mut self) {
        self.last_watched_at = Utc::now();
    }

    /// The (season, episode) pair that follows this entry, for TV shows.
    pub fn next_episode(&self) -> Option<(u32, u32)> {
        use crate::media::MediaKind;
        match (self.key.kind(), self.key.season(), self.key.episode()) {
            (MediaKind::Tv, Some(season), Some(episode)) => Some((season, episode + 1)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_clamped_to_percent_range() {
        let entry = WatchEntry::new(EntryKey::movie(603), "The Matrix", "/poster.jpg")
            .with_progress(140.0);
        assert_eq!(entry.progress, Some(100.0));

        let entry = WatchEntry::new(EntryKey::movie(603), "The Matrix", "/poster.jpg")
            .with_progress(-3.0);
        assert_eq!(entry.progress, Some(0.0));
    }

    #[test]
    fn next_episode_only_for_tv() {
        let tv = WatchEntry::new(EntryKey::tv_episode(1399, 1, 3), "GoT", "/p.jpg");
        assert_eq!(tv.next_episode(), Some((1, 4)));

        let movie = WatchEntry::new(EntryKey::movie(603), "The Matrix", "/p.jpg");
        assert_eq!(movie.next_episode(), None);

        let anime = WatchEntry::new(EntryKey::anime_episode(21, 5, false), "One Piece", "/p.jpg");
        assert_eq!(anime.next_episode(), None);
    }

    #[test]
    fn serializes_with_flattened_identity_columns() {
        let entry = WatchEntry::new(EntryKey::tv_episode(1399, 1, 1), "GoT", "/p.jpg")
            .with_progress(42.0);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["content_type"], "tv");
        assert_eq!(value["tmdb_id"], 1399);
        assert_eq!(value["season"], 1);
        assert_eq!(value["progress"], 42.0);
        assert!(value.get("episode_title").is_none());
    }
}
