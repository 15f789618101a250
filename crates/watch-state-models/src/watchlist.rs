use crate::keys::TitleKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One title the user intends to watch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchlistEntry {
    #[serde(flatten)]
    pub key: TitleKey,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster_path: Option<String>,
    /// Release date (movies) or first air date (shows), as the catalog
    /// reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vote_average: Option<f32>,
    pub added_at: DateTime<Utc>,
}

impl WatchlistEntry {
    pub fn new(key: TitleKey, title: impl Into<String>) -> Self {
        Self {
            key,
            title: title.into(),
            poster_path: None,
            release_date: None,
            vote_average: None,
            added_at: Utc::now(),
        }
    }

    pub fn with_poster_path(mut self, poster_path: impl Into<String>) -> Self {
        self.poster_path = Some(poster_path.into());
        self
    }

    pub fn with_release_date(mut self, release_date: impl Into<String>) -> Self {
        self.release_date = Some(release_date.into());
        self
    }

    pub fn with_vote_average(mut self, vote_average: f32) -> Self {
        self.vote_average = Some(vote_average);
        self
    }
}
