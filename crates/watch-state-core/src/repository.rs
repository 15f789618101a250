use crate::local::{Collection, LocalStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use watch_state_config::{Config, PathManager};
use watch_state_models::{
    EntryKey, FavoriteEntry, TitleKey, WatchEntry, WatchlistEntry,
};
use watch_state_remote::{OfflineBackend, RemoteError, SupabaseStore, WatchStateBackend};

/// Continue-watching entries kept per owner.
pub const DEFAULT_WATCH_CAP: usize = 10;

/// Input for one watch action, before the repository stamps the watch time.
#[derive(Debug, Clone)]
pub struct WatchRecord {
    pub key: EntryKey,
    pub title: String,
    pub poster: String,
    pub progress: Option<f32>,
    pub episode_title: Option<String>,
    pub total_episodes: Option<u32>,
}

impl WatchRecord {
    pub fn new(key: EntryKey, title: impl Into<String>, poster: impl Into<String>) -> Self {
        Self {
            key,
            title: title.into(),
            poster: poster.into(),
            progress: None,
            episode_title: None,
            total_episodes: None,
        }
    }

    pub fn with_progress(mut self, percent: f32) -> Self {
        self.progress = Some(percent);
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

    fn into_entry(self) -> WatchEntry {
        let mut entry = WatchEntry::new(self.key, self.title, self.poster);
        if let Some(percent) = self.progress {
            entry = entry.with_progress(percent);
        }
        entry.episode_title = self.episode_title;
        entry.total_episodes = self.total_episodes;
        entry
    }
}

/// Per-collection counts moved by a sign-in migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationReport {
    pub continue_watching: usize,
    pub watchlist: usize,
    pub favorites: usize,
}

/// Entry point for all watch-state access.
///
/// Every operation resolves the owner first and then commits to exactly one
/// tier: the remote store when an owner is signed in, the local store
/// otherwise. The decision is per call, so sign-in and sign-out take effect
/// on the next operation, with no cached tier choice to go stale.
#[derive(Clone)]
pub struct WatchStateRepository {
    local: LocalStore,
    remote: Arc<dyn WatchStateBackend>,
    watch_cap: usize,
}

impl WatchStateRepository {
    pub fn new(local: LocalStore, remote: Arc<dyn WatchStateBackend>) -> Self {
        Self {
            local,
            remote,
            watch_cap: DEFAULT_WATCH_CAP,
        }
    }

    pub fn with_watch_cap(mut self, cap: usize) -> Self {
        self.watch_cap = cap.max(1);
        self
    }

    /// Assemble a repository from configuration: hosted backend when one is
    /// configured, the offline stub otherwise, local files under the
    /// configured or platform data directory.
    pub fn from_config(config: &Config, paths: &PathManager) -> anyhow::Result<Self> {
        let local = match &config.storage.data_dir {
            Some(dir) => LocalStore::with_dir(dir.join("watch-state"))?,
            None => LocalStore::new(paths)?,
        };
        let remote: Arc<dyn WatchStateBackend> = match &config.remote {
            Some(remote_config) => Arc::new(SupabaseStore::new(remote_config)),
            None => Arc::new(OfflineBackend),
        };
        Ok(Self::new(local, remote).with_watch_cap(config.retention.continue_watching_cap))
    }

    pub fn continue_watching(&self) -> ContinueWatchingRepository {
        ContinueWatchingRepository {
            local: self.local.clone(),
            remote: self.remote.clone(),
            watch_cap: self.watch_cap,
        }
    }

    pub fn watchlist(&self) -> WatchlistRepository {
        WatchlistRepository {
            local: self.local.clone(),
            remote: self.remote.clone(),
        }
    }

    pub fn favorites(&self) -> FavoritesRepository {
        FavoritesRepository {
            local: self.local.clone(),
            remote: self.remote.clone(),
        }
    }

    /// Merge anonymous device-local entries into the signed-in owner's remote
    /// collections, then clear the local tier.
    ///
    /// Called by the embedding application once sign-in completes; nothing
    /// invokes it implicitly. Upserts by identity tuple, so entries the owner
    /// already has remotely are overwritten, not duplicated. Returns `None`
    /// when no owner is signed in. Local state is only cleared after every
    /// import landed.
    pub async fn migrate_local_to_remote(&self) -> Result<Option<MigrationReport>, RemoteError> {
        let Some(owner) = self.remote.current_owner().await else {
            debug!("Skipping watch-state migration: no owner signed in");
            return Ok(None);
        };

        let watch: Vec<WatchEntry> = self.local.load(Collection::ContinueWatching);
        let watchlist: Vec<WatchlistEntry> = self.local.load(Collection::Watchlist);
        let favorites: Vec<FavoriteEntry> = self.local.load(Collection::Favorites);

        let (continue_watching, watchlist, favorites) = futures::try_join!(
            self.remote.import_watch(&owner, &watch),
            self.remote.import_watchlist(&owner, &watchlist),
            self.remote.import_favorites(&owner, &favorites),
        )?;

        self.local.clear(Collection::ContinueWatching);
        self.local.clear(Collection::Watchlist);
        self.local.clear(Collection::Favorites);

        // Imports can push the owner past the cap
        self.remote.trim_watch(&owner, self.watch_cap).await;

        let report = MigrationReport {
            continue_watching,
            watchlist,
            favorites,
        };
        info!(
            "Migrated local watch-state to owner {}: {} continue-watching, {} watchlist, {} favorites",
            owner, report.continue_watching, report.watchlist, report.favorites
        );
        Ok(Some(report))
    }
}

fn sort_by_watch_time(entries: &mut [WatchEntry]) {
    entries.sort_by(|a, b| b.last_watched_at.cmp(&a.last_watched_at));
}

/// Continue-watching: capped, most-recent-first playback positions.
pub struct ContinueWatchingRepository {
    local: LocalStore,
    remote: Arc<dyn WatchStateBackend>,
    watch_cap: usize,
}

impl ContinueWatchingRepository {
    /// Record a watch action. Upserts by identity tuple with the watch time
    /// set to now, then enforces the retention cap. Never fails: remote
    /// trouble is logged by the tier and the action is dropped.
    pub async fn record(&self, record: WatchRecord) {
        let entry = record.into_entry();

        match self.remote.current_owner().await {
            Some(owner) => {
                self.remote.upsert_watch(&owner, &entry).await;
                self.remote.trim_watch(&owner, self.watch_cap).await;
            }
            None => {
                let mut entries: Vec<WatchEntry> = self.local.load(Collection::ContinueWatching);
                entries.retain(|existing| existing.key != entry.key);
                entries.push(entry);
                sort_by_watch_time(&mut entries);
                entries.truncate(self.watch_cap);
                self.local.save(Collection::ContinueWatching, &entries);
            }
        }
    }

    /// Entries ordered by watch time descending, at most the retention cap.
    pub async fn list(&self) -> Vec<WatchEntry> {
        match self.remote.current_owner().await {
            Some(owner) => self.remote.list_watch(&owner, self.watch_cap).await,
            None => {
                let mut entries: Vec<WatchEntry> = self.local.load(Collection::ContinueWatching);
                sort_by_watch_time(&mut entries);
                entries.truncate(self.watch_cap);
                entries
            }
        }
    }

    /// Removing an absent key is a no-op, not an error.
    pub async fn remove(&self, key: &EntryKey) -> Result<(), RemoteError> {
        match self.remote.current_owner().await {
            Some(owner) => self.remote.remove_watch(&owner, key).await,
            None => {
                let mut entries: Vec<WatchEntry> = self.local.load(Collection::ContinueWatching);
                entries.retain(|existing| &existing.key != key);
                self.local.save(Collection::ContinueWatching, &entries);
                Ok(())
            }
        }
    }

    pub async fn clear(&self) -> Result<(), RemoteError> {
        match self.remote.current_owner().await {
            Some(owner) => self.remote.clear_watch(&owner).await,
            None => {
                self.local.clear(Collection::ContinueWatching);
                Ok(())
            }
        }
    }
}

/// Titles the user intends to watch.
pub struct WatchlistRepository {
    local: LocalStore,
    remote: Arc<dyn WatchStateBackend>,
}

impl WatchlistRepository {
    /// Upsert by title identity; `added_at` is refreshed to call time, so
    /// re-adding moves the title to the top.
    pub async fn add(&self, mut entry: WatchlistEntry) {
        entry.added_at = Utc::now();

        match self.remote.current_owner().await {
            Some(owner) => self.remote.upsert_watchlist(&owner, &entry).await,
            None => {
                let mut entries: Vec<WatchlistEntry> = self.local.load(Collection::Watchlist);
                entries.retain(|existing| existing.key != entry.key);
                entries.insert(0, entry);
                self.local.save(Collection::Watchlist, &entries);
            }
        }
    }

    /// Entries ordered by `added_at` descending.
    pub async fn list(&self) -> Vec<WatchlistEntry> {
        match self.remote.current_owner().await {
            Some(owner) => self.remote.list_watchlist(&owner).await,
            None => {
                let mut entries: Vec<WatchlistEntry> = self.local.load(Collection::Watchlist);
                entries.sort_by(|a, b| b.added_at.cmp(&a.added_at));
                entries
            }
        }
    }

    pub async fn contains(&self, key: &TitleKey) -> bool {
        self.list().await.iter().any(|entry| &entry.key == key)
    }

    pub async fn remove(&self, key: &TitleKey) -> Result<(), RemoteError> {
        match self.remote.current_owner().await {
            Some(owner) => self.remote.remove_watchlist(&owner, key).await,
            None => {
                let mut entries: Vec<WatchlistEntry> = self.local.load(Collection::Watchlist);
                entries.retain(|existing| &existing.key != key);
                self.local.save(Collection::Watchlist, &entries);
                Ok(())
            }
        }
    }

    pub async fn clear(&self) -> Result<(), RemoteError> {
        match self.remote.current_owner().await {
            Some(owner) => self.remote.clear_watchlist(&owner).await,
            None => {
                self.local.clear(Collection::Watchlist);
                Ok(())
            }
        }
    }
}

/// Titles the user marked as favorites.
pub struct FavoritesRepository {
    local: LocalStore,
    remote: Arc<dyn WatchStateBackend>,
}

impl FavoritesRepository {
    pub async fn add(&self, mut entry: FavoriteEntry) {
        entry.added_at = Utc::now();

        match self.remote.current_owner().await {
            Some(owner) => self.remote.upsert_favorite(&owner, &entry).await,
            None => {
                let mut entries: Vec<FavoriteEntry> = self.local.load(Collection::Favorites);
                entries.retain(|existing| existing.key != entry.key);
                entries.insert(0, entry);
                self.local.save(Collection::Favorites, &entries);
            }
        }
    }

    pub async fn list(&self) -> Vec<FavoriteEntry> {
        match self.remote.current_owner().await {
            Some(owner) => self.remote.list_favorites(&owner).await,
            None => {
                let mut entries: Vec<FavoriteEntry> = self.local.load(Collection::Favorites);
                entries.sort_by(|a, b| b.added_at.cmp(&a.added_at));
                entries
            }
        }
    }

    pub async fn contains(&self, key: &TitleKey) -> bool {
        self.list().await.iter().any(|entry| &entry.key == key)
    }

    pub async fn remove(&self, key: &TitleKey) -> Result<(), RemoteError> {
        match self.remote.current_owner().await {
            Some(owner) => self.remote.remove_favorite(&owner, key).await,
            None => {
                let mut entries: Vec<FavoriteEntry> = self.local.load(Collection::Favorites);
                entries.retain(|existing| &existing.key != key);
                self.local.save(Collection::Favorites, &entries);
                Ok(())
            }
        }
    }

    pub async fn clear(&self) -> Result<(), RemoteError> {
        match self.remote.current_owner().await {
            Some(owner) => self.remote.clear_favorites(&owner).await,
            None => {
                self.local.clear(Collection::Favorites);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use watch_state_models::Owner;

    /// Remote tier stand-in: per-owner collections behind mutexes, with a
    /// switchable signed-in owner.
    #[derive(Default)]
    struct MemoryBackend {
        owner: Mutex<Option<Owner>>,
        watch: Mutex<HashMap<String, Vec<WatchEntry>>>,
        watchlist: Mutex<HashMap<String, Vec<WatchlistEntry>>>,
        favorites: Mutex<HashMap<String, Vec<FavoriteEntry>>>,
    }

    impl MemoryBackend {
        fn sign_in(&self, id: &str) {
            *self.owner.lock().unwrap() = Some(Owner::new(id));
        }

        fn sign_out(&self) {
            *self.owner.lock().unwrap() = None;
        }
    }

    #[async_trait]
    impl WatchStateBackend for MemoryBackend {
        async fn current_owner(&self) -> Option<Owner> {
            self.owner.lock().unwrap().clone()
        }

        async fn upsert_watch(&self, owner: &Owner, entry: &WatchEntry) {
            let mut map = self.watch.lock().unwrap();
            let entries = map.entry(owner.as_str().to_string()).or_default();
            entries.retain(|existing| existing.key != entry.key);
            entries.push(entry.clone());
        }

        async fn list_watch(&self, owner: &Owner, cap: usize) -> Vec<WatchEntry> {
            let map = self.watch.lock().unwrap();
            let mut entries = map.get(owner.as_str()).cloned().unwrap_or_default();
            sort_by_watch_time(&mut entries);
            entries.truncate(cap);
            entries
        }

        async fn trim_watch(&self, owner: &Owner, cap: usize) {
            let mut map = self.watch.lock().unwrap();
            if let Some(entries) = map.get_mut(owner.as_str()) {
                sort_by_watch_time(entries);
                entries.truncate(cap);
            }
        }

        async fn remove_watch(&self, owner: &Owner, key: &EntryKey) -> Result<(), RemoteError> {
            let mut map = self.watch.lock().unwrap();
            if let Some(entries) = map.get_mut(owner.as_str()) {
                entries.retain(|existing| &existing.key != key);
            }
            Ok(())
        }

        async fn clear_watch(&self, owner: &Owner) -> Result<(), RemoteError> {
            self.watch.lock().unwrap().remove(owner.as_str());
            Ok(())
        }

        async fn import_watch(
            &self,
            owner: &Owner,
            entries: &[WatchEntry],
        ) -> Result<usize, RemoteError> {
            for entry in entries {
                self.upsert_watch(owner, entry).await;
            }
            Ok(entries.len())
        }

        async fn upsert_watchlist(&self, owner: &Owner, entry: &WatchlistEntry) {
            let mut map = self.watchlist.lock().unwrap();
            let entries = map.entry(owner.as_str().to_string()).or_default();
            entries.retain(|existing| existing.key != entry.key);
            entries.push(entry.clone());
        }

        async fn list_watchlist(&self, owner: &Owner) -> Vec<WatchlistEntry> {
            let map = self.watchlist.lock().unwrap();
            let mut entries = map.get(owner.as_str()).cloned().unwrap_or_default();
            entries.sort_by(|a, b| b.added_at.cmp(&a.added_at));
            entries
        }

        async fn remove_watchlist(
            &self,
            owner: &Owner,
            key: &TitleKey,
        ) -> Result<(), RemoteError> {
            let mut map = self.watchlist.lock().unwrap();
            if let Some(entries) = map.get_mut(owner.as_str()) {
                entries.retain(|existing| &existing.key != key);
            }
            Ok(())
        }

        async fn clear_watchlist(&self, owner: &Owner) -> Result<(), RemoteError> {
            self.watchlist.lock().unwrap().remove(owner.as_str());
            Ok(())
        }

        async fn import_watchlist(
            &self,
            owner: &Owner,
            entries: &[WatchlistEntry],
        ) -> Result<usize, RemoteError> {
            for entry in entries {
                self.upsert_watchlist(owner, entry).await;
            }
            Ok(entries.len())
        }

        async fn upsert_favorite(&self, owner: &Owner, entry: &FavoriteEntry) {
            let mut map = self.favorites.lock().unwrap();
            let entries = map.entry(owner.as_str().to_string()).or_default();
            entries.retain(|existing| existing.key != entry.key);
            entries.push(entry.clone());
        }

        async fn list_favorites(&self, owner: &Owner) -> Vec<FavoriteEntry> {
            let map = self.favorites.lock().unwrap();
            let mut entries = map.get(owner.as_str()).cloned().unwrap_or_default();
            entries.sort_by(|a, b| b.added_at.cmp(&a.added_at));
            entries
        }

        async fn remove_favorite(&self, owner: &Owner, key: &TitleKey) -> Result<(), RemoteError> {
            let mut map = self.favorites.lock().unwrap();
            if let Some(entries) = map.get_mut(owner.as_str()) {
                entries.retain(|existing| &existing.key != key);
            }
            Ok(())
        }

        async fn clear_favorites(&self, owner: &Owner) -> Result<(), RemoteError> {
            self.favorites.lock().unwrap().remove(owner.as_str());
            Ok(())
        }

        async fn import_favorites(
            &self,
            owner: &Owner,
            entries: &[FavoriteEntry],
        ) -> Result<usize, RemoteError> {
            for entry in entries {
                self.upsert_favorite(owner, entry).await;
            }
            Ok(entries.len())
        }
    }

    fn repo(dir: &tempfile::TempDir, backend: Arc<MemoryBackend>) -> WatchStateRepository {
        let local = LocalStore::with_dir(dir.path().join("watch-state")).unwrap();
        WatchStateRepository::new(local, backend)
    }

    #[tokio::test]
    async fn recording_the_same_identity_twice_updates_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::default());
        let cw = repo(&dir, backend).continue_watching();

        let key = EntryKey::tv_episode(1399, 1, 1);
        cw.record(WatchRecord::new(key.clone(), "GoT", "/got.jpg").with_progress(20.0))
            .await;
        let first = cw.list().await;
        cw.record(WatchRecord::new(key.clone(), "GoT", "/got.jpg").with_progress(80.0))
            .await;

        let entries = cw.list().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].progress, Some(80.0));
        assert!(entries[0].last_watched_at >= first[0].last_watched_at);
    }

    #[tokio::test]
    async fn cap_evicts_the_least_recently_watched() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::default());
        let cw = repo(&dir, backend).continue_watching();

        for tmdb_id in 1..=11u32 {
            cw.record(WatchRecord::new(EntryKey::movie(tmdb_id), "m", "/p.jpg"))
                .await;
        }

        let entries = cw.list().await;
        assert_eq!(entries.len(), DEFAULT_WATCH_CAP);
        // Movie 1 was watched first and must be the one evicted
        assert!(!entries.iter().any(|e| e.key == EntryKey::movie(1)));
        assert!(entries.iter().any(|e| e.key == EntryKey::movie(11)));
    }

    #[tokio::test]
    async fn cap_applies_on_the_remote_tier_too() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::default());
        backend.sign_in("u1");
        let cw = repo(&dir, backend.clone()).continue_watching();

        for tmdb_id in 1..=11u32 {
            cw.record(WatchRecord::new(EntryKey::movie(tmdb_id), "m", "/p.jpg"))
                .await;
        }

        let entries = cw.list().await;
        assert_eq!(entries.len(), DEFAULT_WATCH_CAP);
        assert!(!entries.iter().any(|e| e.key == EntryKey::movie(1)));
    }

    #[tokio::test]
    async fn list_is_ordered_most_recent_first() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::default());
        let cw = repo(&dir, backend).continue_watching();

        for tmdb_id in [10u32, 20, 30] {
            cw.record(WatchRecord::new(EntryKey::movie(tmdb_id), "m", "/p.jpg"))
                .await;
        }

        let entries = cw.list().await;
        let watched: Vec<_> = entries.iter().map(|e| e.last_watched_at).collect();
        let mut sorted = watched.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(watched, sorted);
        assert_eq!(entries[0].key, EntryKey::movie(30));
    }

    #[tokio::test]
    async fn anonymous_and_signed_in_state_never_mix() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::default());
        let repository = repo(&dir, backend.clone());
        let cw = repository.continue_watching();

        // Anonymous write lands only in the local tier
        cw.record(WatchRecord::new(EntryKey::movie(603), "The Matrix", "/m.jpg"))
            .await;

        // Signed in: the remote tier is authoritative and knows nothing local
        backend.sign_in("u1");
        assert!(cw.list().await.is_empty());
        cw.record(WatchRecord::new(EntryKey::movie(27205), "Inception", "/i.jpg"))
            .await;

        // Signed out again: only the anonymous entry is visible
        backend.sign_out();
        let entries = cw.list().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, EntryKey::movie(603));
    }

    #[tokio::test]
    async fn removing_twice_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::default());
        let cw = repo(&dir, backend).continue_watching();

        let key = EntryKey::movie(603);
        cw.record(WatchRecord::new(key.clone(), "The Matrix", "/m.jpg"))
            .await;
        cw.remove(&key).await.unwrap();
        cw.remove(&key).await.unwrap();
        assert!(cw.list().await.is_empty());
    }

    #[tokio::test]
    async fn dub_and_sub_tracks_are_separate_entries() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::default());
        let cw = repo(&dir, backend).continue_watching();

        cw.record(WatchRecord::new(
            EntryKey::anime_episode(21, 5, false),
            "One Piece",
            "/op.jpg",
        ))
        .await;
        cw.record(WatchRecord::new(
            EntryKey::anime_episode(21, 5, true),
            "One Piece",
            "/op.jpg",
        ))
        .await;

        assert_eq!(cw.list().await.len(), 2);
    }

    #[tokio::test]
    async fn anonymous_viewing_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::default());
        let cw = repo(&dir, backend).continue_watching();

        cw.record(WatchRecord::new(EntryKey::movie(603), "The Matrix", "/m.jpg").with_progress(42.0))
            .await;
        let entries = cw.list().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].progress, Some(42.0));

        cw.record(WatchRecord::new(EntryKey::tv_episode(1399, 1, 1), "GoT", "/g.jpg"))
            .await;
        let entries = cw.list().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, EntryKey::tv_episode(1399, 1, 1));

        // Re-watching the same episode updates in place
        cw.record(
            WatchRecord::new(EntryKey::tv_episode(1399, 1, 1), "GoT", "/g.jpg")
                .with_progress(80.0),
        )
        .await;
        let entries = cw.list().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].progress, Some(80.0));
    }

    #[tokio::test]
    async fn favorites_membership_is_shared_across_sessions_of_one_owner() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::default());
        backend.sign_in("u1");

        // Two repositories with different local stores stand in for two tabs
        let tab_a = repo(&dir_a, backend.clone());
        let tab_b = repo(&dir_b, backend.clone());

        tab_a
            .favorites()
            .add(FavoriteEntry::new(TitleKey::movie(27205), "Inception"))
            .await;
        assert!(tab_b.favorites().contains(&TitleKey::movie(27205)).await);
    }

    #[tokio::test]
    async fn watchlist_add_is_idempotent_and_membership_works() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::default());
        let watchlist = repo(&dir, backend).watchlist();

        let key = TitleKey::tv(1399);
        watchlist
            .add(WatchlistEntry::new(key.clone(), "GoT").with_vote_average(8.4))
            .await;
        watchlist.add(WatchlistEntry::new(key.clone(), "GoT")).await;

        assert_eq!(watchlist.list().await.len(), 1);
        assert!(watchlist.contains(&key).await);
        assert!(!watchlist.contains(&TitleKey::movie(603)).await);

        watchlist.remove(&key).await.unwrap();
        assert!(!watchlist.contains(&key).await);
    }

    #[tokio::test]
    async fn clear_empties_only_the_active_tier() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::default());
        let repository = repo(&dir, backend.clone());
        let favorites = repository.favorites();

        favorites
            .add(FavoriteEntry::new(TitleKey::movie(603), "The Matrix"))
            .await;

        backend.sign_in("u1");
        favorites
            .add(FavoriteEntry::new(TitleKey::movie(27205), "Inception"))
            .await;
        favorites.clear().await.unwrap();
        assert!(favorites.list().await.is_empty());

        // The anonymous entry survives the signed-in clear
        backend.sign_out();
        assert_eq!(favorites.list().await.len(), 1);
    }

    #[tokio::test]
    async fn migration_moves_local_state_remote_and_clears_it() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::default());
        let repository = repo(&dir, backend.clone());

        let cw = repository.continue_watching();
        cw.record(WatchRecord::new(EntryKey::movie(603), "The Matrix", "/m.jpg"))
            .await;
        cw.record(WatchRecord::new(EntryKey::tv_episode(1399, 1, 1), "GoT", "/g.jpg"))
            .await;
        repository
            .watchlist()
            .add(WatchlistEntry::new(TitleKey::movie(27205), "Inception"))
            .await;
        repository
            .favorites()
            .add(FavoriteEntry::new(TitleKey::anime(21), "One Piece"))
            .await;

        backend.sign_in("u1");
        let report = repository.migrate_local_to_remote().await.unwrap().unwrap();
        assert_eq!(
            report,
            MigrationReport {
                continue_watching: 2,
                watchlist: 1,
                favorites: 1,
            }
        );

        // Everything is now visible through the remote tier
        assert_eq!(cw.list().await.len(), 2);
        assert!(repository.favorites().contains(&TitleKey::anime(21)).await);

        // And the local tier was cleared: signing out shows nothing
        backend.sign_out();
        assert!(cw.list().await.is_empty());
        assert!(repository.watchlist().list().await.is_empty());
    }

    #[tokio::test]
    async fn migration_without_an_owner_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::default());
        let repository = repo(&dir, backend);

        let cw = repository.continue_watching();
        cw.record(WatchRecord::new(EntryKey::movie(603), "The Matrix", "/m.jpg"))
            .await;

        assert_eq!(repository.migrate_local_to_remote().await.unwrap(), None);
        assert_eq!(cw.list().await.len(), 1);
    }

    #[tokio::test]
    async fn from_config_without_a_remote_stays_local() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = Some(dir.path().to_path_buf());
        config.retention.continue_watching_cap = 2;

        let repository =
            WatchStateRepository::from_config(&config, &PathManager::default()).unwrap();
        let cw = repository.continue_watching();

        for tmdb_id in 1..=3u32 {
            cw.record(WatchRecord::new(EntryKey::movie(tmdb_id), "m", "/p.jpg"))
                .await;
        }
        assert_eq!(cw.list().await.len(), 2);

        // No owner ever resolves against the offline backend
        assert_eq!(repository.migrate_local_to_remote().await.unwrap(), None);
    }

    #[tokio::test]
    async fn custom_cap_is_honored() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::default());
        let local = LocalStore::with_dir(dir.path().join("watch-state")).unwrap();
        let cw = WatchStateRepository::new(local, backend)
            .with_watch_cap(3)
            .continue_watching();

        for tmdb_id in 1..=5u32 {
            cw.record(WatchRecord::new(EntryKey::movie(tmdb_id), "m", "/p.jpg"))
                .await;
        }
        let entries = cw.list().await;
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].key, EntryKey::movie(5));
    }
}
