pub mod auth;
pub mod rows;

use crate::error::RemoteError;
use crate::traits::WatchStateBackend;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use watch_state_config::RemoteConfig;
use watch_state_models::{EntryKey, FavoriteEntry, Owner, TitleKey, WatchEntry, WatchlistEntry};

pub use auth::{Session, SessionTokens};
use rows::{entry_key_filters, title_key_filters, ContinueWatchingRow, TitleRow};

const CONTINUE_WATCHING_TABLE: &str = "continue_watching";
const WATCHLIST_TABLE: &str = "watchlist";
const FAVORITES_TABLE: &str = "favorites";

// Identity uniques on the remote tables are declared NULLS NOT DISTINCT, so a
// movie row's absent season/episode coordinates conflict as equal.
const CONTINUE_WATCHING_CONFLICT: &str =
    "user_id,content_type,tmdb_id,anilist_id,season,episode,is_dub";
const TITLE_CONFLICT: &str = "user_id,content_type,tmdb_id,anilist_id";

/// Remote tier over the hosted PostgREST + GoTrue backend.
///
/// All writes are single idempotent upserts keyed on the natural identity
/// columns; there is no check-then-write anywhere, so two tabs racing the
/// same identity converge instead of duplicating.
pub struct SupabaseStore {
    http: Client,
    base_url: String,
    anon_key: String,
    session: Session,
}

impl SupabaseStore {
    pub fn new(config: &RemoteConfig) -> Self {
        let http = Client::new();
        let session = Session::new(http.clone(), config.url.clone(), config.anon_key.clone());
        Self {
            http,
            base_url: config.url.clone(),
            anon_key: config.anon_key.clone(),
            session,
        }
    }

    /// The auth session; the embedding application feeds sign-in tokens into
    /// it and clears it on sign-out.
    pub fn session(&self) -> &Session {
        &self.session
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url.trim_end_matches('/'), table)
    }

    /// Bearer for REST calls: the session's access token when signed in, the
    /// anon key otherwise (owner-scoped tables return nothing for anon).
    async fn bearer(&self) -> String {
        self.session
            .access_token()
            .await
            .unwrap_or_else(|| self.anon_key.clone())
    }

    async fn check(response: reqwest::Response) -> Result<(), RemoteError> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(RemoteError::from_response(response).await)
        }
    }

    async fn upsert_rows<T: Serialize>(
        &self,
        table: &str,
        conflict: &str,
        rows: &[T],
    ) -> Result<(), RemoteError> {
        let response = self
            .http
            .post(self.rest_url(table))
            .query(&[("on_conflict", conflict)])
            .header("apikey", &self.anon_key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .bearer_auth(self.bearer().await)
            .json(&rows)
            .send()
            .await?;
        Self::check(response).await
    }

    async fn select_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(String, String)],
    ) -> Result<Vec<T>, RemoteError> {
        let response = self
            .http
            .get(self.rest_url(table))
            .query(query)
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer().await)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RemoteError::from_response(response).await);
        }
        Ok(response.json().await?)
    }

    async fn delete_rows(
        &self,
        table: &str,
        query: &[(String, String)],
    ) -> Result<(), RemoteError> {
        let response = self
            .http
            .delete(self.rest_url(table))
            .query(query)
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer().await)
            .send()
            .await?;
        Self::check(response).await
    }

    fn owner_filter(owner: &Owner) -> (String, String) {
        ("user_id".to_string(), format!("eq.{}", owner.as_str()))
    }

    /// The `last_watched_at` of the `cap`-th newest entry, if that many exist.
    async fn watch_cutoff(
        &self,
        owner: &Owner,
        cap: usize,
    ) -> Result<Option<DateTime<Utc>>, RemoteError> {
        #[derive(Deserialize)]
        struct Cutoff {
            last_watched_at: DateTime<Utc>,
        }

        if cap == 0 {
            return Ok(None);
        }

        let query = vec![
            Self::owner_filter(owner),
            ("select".to_string(), "last_watched_at".to_string()),
            ("order".to_string(), "last_watched_at.desc".to_string()),
            ("offset".to_string(), (cap - 1).to_string()),
            ("limit".to_string(), "1".to_string()),
        ];
        let rows: Vec<Cutoff> = self.select_rows(CONTINUE_WATCHING_TABLE, &query).await?;
        Ok(rows.into_iter().next().map(|row| row.last_watched_at))
    }
}

#[async_trait]
impl WatchStateBackend for SupabaseStore {
    async fn current_owner(&self) -> Option<Owner> {
        self.session.current_owner().await
    }

    async fn upsert_watch(&self, owner: &Owner, entry: &WatchEntry) {
        let row = ContinueWatchingRow::from_entry(owner, entry);
        if let Err(e) = self
            .upsert_rows(CONTINUE_WATCHING_TABLE, CONTINUE_WATCHING_CONFLICT, &[row])
            .await
        {
            warn!("Failed to upsert continue-watching {}: {}", entry.key.slug(), e);
        }
    }

    async fn list_watch(&self, owner: &Owner, cap: usize) -> Vec<WatchEntry> {
        let query = vec![
            Self::owner_filter(owner),
            ("select".to_string(), "*".to_string()),
            ("order".to_string(), "last_watched_at.desc".to_string()),
            ("limit".to_string(), cap.to_string()),
        ];
        let rows: Vec<ContinueWatchingRow> =
            match self.select_rows(CONTINUE_WATCHING_TABLE, &query).await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!("Failed to list continue-watching: {}", e);
                    return Vec::new();
                }
            };

        rows.into_iter()
            .filter_map(|row| match row.into_entry() {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping malformed continue-watching row: {}", e);
                    None
                }
            })
            .collect()
    }

    async fn trim_watch(&self, owner: &Owner, cap: usize) {
        let cutoff = match self.watch_cutoff(owner, cap).await {
            Ok(Some(cutoff)) => cutoff,
            Ok(None) => return,
            Err(e) => {
                warn!("Failed to resolve eviction cutoff: {}", e);
                return;
            }
        };

        let query = vec![
            Self::owner_filter(owner),
            (
                "last_watched_at".to_string(),
                format!("lt.{}", cutoff.to_rfc3339()),
            ),
        ];
        if let Err(e) = self.delete_rows(CONTINUE_WATCHING_TABLE, &query).await {
            warn!("Failed to evict continue-watching overflow: {}", e);
        } else {
            debug!("Evicted continue-watching entries older than {}", cutoff);
        }
    }

    async fn remove_watch(&self, owner: &Owner, key: &EntryKey) -> Result<(), RemoteError> {
        let mut query = vec![Self::owner_filter(owner)];
        query.extend(entry_key_filters(key));
        self.delete_rows(CONTINUE_WATCHING_TABLE, &query).await
    }

    async fn clear_watch(&self, owner: &Owner) -> Result<(), RemoteError> {
        self.delete_rows(CONTINUE_WATCHING_TABLE, &[Self::owner_filter(owner)])
            .await
    }

    async fn import_watch(
        &self,
        owner: &Owner,
        entries: &[WatchEntry],
    ) -> Result<usize, RemoteError> {
        if entries.is_empty() {
            return Ok(0);
        }
        let rows: Vec<ContinueWatchingRow> = entries
            .iter()
            .map(|entry| ContinueWatchingRow::from_entry(owner, entry))
            .collect();
        self.upsert_rows(CONTINUE_WATCHING_TABLE, CONTINUE_WATCHING_CONFLICT, &rows)
            .await?;
        Ok(rows.len())
    }

    async fn upsert_watchlist(&self, owner: &Owner, entry: &WatchlistEntry) {
        let row = TitleRow::from_watchlist(owner, entry);
        if let Err(e) = self.upsert_rows(WATCHLIST_TABLE, TITLE_CONFLICT, &[row]).await {
            warn!("Failed to upsert watchlist {}: {}", entry.key.slug(), e);
        }
    }

    async fn list_watchlist(&self, owner: &Owner) -> Vec<WatchlistEntry> {
        let query = vec![
            Self::owner_filter(owner),
            ("select".to_string(), "*".to_string()),
            ("order".to_string(), "added_at.desc".to_string()),
        ];
        let rows: Vec<TitleRow> = match self.select_rows(WATCHLIST_TABLE, &query).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Failed to list watchlist: {}", e);
                return Vec::new();
            }
        };

        rows.into_iter()
            .filter_map(|row| match row.into_watchlist() {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping malformed watchlist row: {}", e);
                    None
                }
            })
            .collect()
    }

    async fn remove_watchlist(&self, owner: &Owner, key: &TitleKey) -> Result<(), RemoteError> {
        let mut query = vec![Self::owner_filter(owner)];
        query.extend(title_key_filters(key));
        self.delete_rows(WATCHLIST_TABLE, &query).await
    }

    async fn clear_watchlist(&self, owner: &Owner) -> Result<(), RemoteError> {
        self.delete_rows(WATCHLIST_TABLE, &[Self::owner_filter(owner)])
            .await
    }

    async fn import_watchlist(
        &self,
        owner: &Owner,
        entries: &[WatchlistEntry],
    ) -> Result<usize, RemoteError> {
        if entries.is_empty() {
            return Ok(0);
        }
        let rows: Vec<TitleRow> = entries
            .iter()
            .map(|entry| TitleRow::from_watchlist(owner, entry))
            .collect();
        self.upsert_rows(WATCHLIST_TABLE, TITLE_CONFLICT, &rows).await?;
        Ok(rows.len())
    }

    async fn upsert_favorite(&self, owner: &Owner, entry: &FavoriteEntry) {
        let row = TitleRow::from_favorite(owner, entry);
        if let Err(e) = self.upsert_rows(FAVORITES_TABLE, TITLE_CONFLICT, &[row]).await {
            warn!("Failed to upsert favorite {}: {}", entry.key.slug(), e);
        }
    }

    async fn list_favorites(&self, owner: &Owner) -> Vec<FavoriteEntry> {
        let query = vec![
            Self::owner_filter(owner),
            ("select".to_string(), "*".to_string()),
            ("order".to_string(), "added_at.desc".to_string()),
        ];
        let rows: Vec<TitleRow> = match self.select_rows(FAVORITES_TABLE, &query).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Failed to list favorites: {}", e);
                return Vec::new();
            }
        };

        rows.into_iter()
            .filter_map(|row| match row.into_favorite() {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping malformed favorites row: {}", e);
                    None
                }
            })
            .collect()
    }

    async fn remove_favorite(&self, owner: &Owner, key: &TitleKey) -> Result<(), RemoteError> {
        let mut query = vec![Self::owner_filter(owner)];
        query.extend(title_key_filters(key));
        self.delete_rows(FAVORITES_TABLE, &query).await
    }

    async fn clear_favorites(&self, owner: &Owner) -> Result<(), RemoteError> {
        self.delete_rows(FAVORITES_TABLE, &[Self::owner_filter(owner)])
            .await
    }

    async fn import_favorites(
        &self,
        owner: &Owner,
        entries: &[FavoriteEntry],
    ) -> Result<usize, RemoteError> {
        if entries.is_empty() {
            return Ok(0);
        }
        let rows: Vec<TitleRow> = entries
            .iter()
            .map(|entry| TitleRow::from_favorite(owner, entry))
            .collect();
        self.upsert_rows(FAVORITES_TABLE, TITLE_CONFLICT, &rows).await?;
        Ok(rows.len())
    }
}
