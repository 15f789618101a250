use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, warn};
use watch_state_config::PathManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    ContinueWatching,
    Watchlist,
    Favorites,
}

impl Collection {
    fn file_name(&self) -> &'static str {
        match self {
            Collection::ContinueWatching => "continue_watching.json",
            Collection::Watchlist => "watchlist.json",
            Collection::Favorites => "favorites.json",
        }
    }
}

/// Device-local storage tier: one JSON file per collection, scoped to this
/// machine, no authentication involved.
///
/// Every operation is total. A missing or corrupt file loads as an empty
/// collection, and a failed write is logged and swallowed. Watch-state is
/// advisory, so a full disk must never fail a watch action.
#[derive(Clone)]
pub struct LocalStore {
    state_dir: PathBuf,
}

impl LocalStore {
    pub fn new(path_manager: &PathManager) -> Result<Self> {
        Self::with_dir(path_manager.watch_state_dir())
    }

    pub fn with_dir(state_dir: impl Into<PathBuf>) -> Result<Self> {
        let state_dir = state_dir.into();
        std::fs::create_dir_all(&state_dir)?;
        Ok(Self { state_dir })
    }

    fn collection_path(&self, collection: Collection) -> PathBuf {
        self.state_dir.join(collection.file_name())
    }

    pub fn load<T>(&self, collection: Collection) -> Vec<T>
    where
        T: DeserializeOwned,
    {
        let path = self.collection_path(collection);

        if !path.exists() {
            debug!("No stored {:?} collection yet", collection);
            return Vec::new();
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read {:?} collection: {}", collection, e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<T>>(&content) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    "Corrupt {:?} collection: {}. Deleting the stored file.",
                    collection, e
                );
                if let Err(rm_err) = std::fs::remove_file(&path) {
                    warn!("Failed to delete corrupt collection file: {}", rm_err);
                }
                Vec::new()
            }
        }
    }

    /// Replace the stored collection wholesale. There is no partial update;
    /// collections are small enough that read-modify-write is the contract.
    pub fn save<T>(&self, collection: Collection, entries: &[T])
    where
        T: Serialize,
    {
        let json = match serde_json::to_string_pretty(entries) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize {:?} collection: {}", collection, e);
                return;
            }
        };

        // Atomic write: write to temp file, then rename
        let path = self.collection_path(collection);
        let temp_path = path.with_extension("json.tmp");
        if let Err(e) = std::fs::write(&temp_path, json) {
            warn!("Failed to write {:?} collection: {}", collection, e);
            return;
        }
        if let Err(e) = std::fs::rename(&temp_path, &path) {
            warn!("Failed to replace {:?} collection: {}", collection, e);
            return;
        }

        debug!("Saved {:?} collection ({} entries)", collection, entries.len());
    }

    pub fn clear(&self, collection: Collection) {
        let path = self.collection_path(collection);
        if !path.exists() {
            return;
        }
        if let Err(e) = std::fs::remove_file(&path) {
            warn!("Failed to clear {:?} collection: {}", collection, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watch_state_models::{EntryKey, FavoriteEntry, TitleKey, WatchEntry};

    fn store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::with_dir(dir.path().join("watch-state")).unwrap();
        (dir, store)
    }

    #[test]
    fn missing_file_loads_empty() {
        let (_dir, store) = store();
        let entries: Vec<WatchEntry> = store.load(Collection::ContinueWatching);
        assert!(entries.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let (_dir, store) = store();
        let entries = vec![
            WatchEntry::new(EntryKey::movie(603), "The Matrix", "/matrix.jpg").with_progress(42.0),
            WatchEntry::new(EntryKey::tv_episode(1399, 1, 1), "GoT", "/got.jpg"),
        ];
        store.save(Collection::ContinueWatching, &entries);

        let loaded: Vec<WatchEntry> = store.load(Collection::ContinueWatching);
        assert_eq!(loaded, entries);
    }

    #[test]
    fn corrupt_file_loads_empty_and_is_deleted() {
        let (_dir, store) = store();
        let path = store.collection_path(Collection::Watchlist);
        std::fs::write(&path, "{not json").unwrap();

        let entries: Vec<WatchEntry> = store.load(Collection::Watchlist);
        assert!(entries.is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn entries_failing_the_key_decoder_poison_nothing_else() {
        // A stored array with one malformed key fails as a whole and resets
        // to empty rather than leaking undecoded fields.
        let (_dir, store) = store();
        let path = store.collection_path(Collection::ContinueWatching);
        std::fs::write(
            &path,
            r#"[{"content_type":"anime","tmdb_id":603,"episode":1,"title":"x","poster":"p","last_watched_at":"2026-08-06T12:00:00Z"}]"#,
        )
        .unwrap();

        let entries: Vec<WatchEntry> = store.load(Collection::ContinueWatching);
        assert!(entries.is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn clear_removes_the_file() {
        let (_dir, store) = store();
        store.save(
            Collection::Favorites,
            &[FavoriteEntry::new(TitleKey::movie(603), "The Matrix")],
        );
        store.clear(Collection::Favorites);
        let entries: Vec<FavoriteEntry> = store.load(Collection::Favorites);
        assert!(entries.is_empty());

        // Clearing again is a no-op
        store.clear(Collection::Favorites);
    }
}
