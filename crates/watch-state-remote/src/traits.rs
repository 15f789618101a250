use crate::error::RemoteError;
use async_trait::async_trait;
use watch_state_models::{EntryKey, FavoriteEntry, Owner, TitleKey, WatchEntry, WatchlistEntry};

/// Authenticated multi-device storage for the three watch-state collections.
///
/// Failure semantics follow the tier contract: reads degrade to empty,
/// upserts and trims degrade to silent no-ops (both log), while removes,
/// clears, and imports return `Result` so explicit destructive actions can be
/// surfaced to the user.
#[async_trait]
pub trait WatchStateBackend: Send + Sync {
    /// Resolve the authenticated owner for the current session.
    ///
    /// Re-resolved on every repository operation and never cached, since
    /// sign-in completing or a token expiring can change the answer between
    /// two calls. Any resolution failure is "no owner".
    async fn current_owner(&self) -> Option<Owner>;

    // Continue watching
    async fn upsert_watch(&self, owner: &Owner, entry: &WatchEntry);
    /// Entries ordered by `last_watched_at` descending, at most `cap`.
    async fn list_watch(&self, owner: &Owner, cap: usize) -> Vec<WatchEntry>;
    /// Evict entries older than the `cap`-th newest for this owner.
    async fn trim_watch(&self, owner: &Owner, cap: usize);
    async fn remove_watch(&self, owner: &Owner, key: &EntryKey) -> Result<(), RemoteError>;
    async fn clear_watch(&self, owner: &Owner) -> Result<(), RemoteError>;
    async fn import_watch(&self, owner: &Owner, entries: &[WatchEntry])
        -> Result<usize, RemoteError>;

    // Watchlist
    async fn upsert_watchlist(&self, owner: &Owner, entry: &WatchlistEntry);
    /// Entries ordered by `added_at` descending.
    async fn list_watchlist(&self, owner: &Owner) -> Vec<WatchlistEntry>;
    async fn remove_watchlist(&self, owner: &Owner, key: &TitleKey) -> Result<(), RemoteError>;
    async fn clear_watchlist(&self, owner: &Owner) -> Result<(), RemoteError>;
    async fn import_watchlist(
        &self,
        owner: &Owner,
        entries: &[WatchlistEntry],
    ) -> Result<usize, RemoteError>;

    // Favorites
    async fn upsert_favorite(&self, owner: &Owner, entry: &FavoriteEntry);
    async fn list_favorites(&self, owner: &Owner) -> Vec<FavoriteEntry>;
    async fn remove_favorite(&self, owner: &Owner, key: &TitleKey) -> Result<(), RemoteError>;
    async fn clear_favorites(&self, owner: &Owner) -> Result<(), RemoteError>;
    async fn import_favorites(
        &self,
        owner: &Owner,
        entries: &[FavoriteEntry],
    ) -> Result<usize, RemoteError>;
}

/// Stand-in backend for deployments with no remote endpoint configured.
///
/// Always anonymous, so the repository never leaves the local tier; every
/// remote operation is a harmless no-op.
pub struct OfflineBackend;

#[async_trait]
impl WatchStateBackend for OfflineBackend {
    async fn current_owner(&self) -> Option<Owner> {
        None
    }

    async fn upsert_watch(&self, _owner: &Owner, _entry: &WatchEntry) {}

    async fn list_watch(&self, _owner: &Owner, _cap: usize) -> Vec<WatchEntry> {
        Vec::new()
    }

    async fn trim_watch(&self, _owner: &Owner, _cap: usize) {}

    async fn remove_watch(&self, _owner: &Owner, _key: &EntryKey) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn clear_watch(&self, _owner: &Owner) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn import_watch(
        &self,
        _owner: &Owner,
        _entries: &[WatchEntry],
    ) -> Result<usize, RemoteError> {
        Ok(0)
    }

    async fn upsert_watchlist(&self, _owner: &Owner, _entry: &WatchlistEntry) {}

    async fn list_watchlist(&self, _owner: &Owner) -> Vec<WatchlistEntry> {
        Vec::new()
    }

    async fn remove_watchlist(&self, _owner: &Owner, _key: &TitleKey) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn clear_watchlist(&self, _owner: &Owner) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn import_watchlist(
        &self,
        _owner: &Owner,
        _entries: &[WatchlistEntry],
    ) -> Result<usize, RemoteError> {
        Ok(0)
    }

    async fn upsert_favorite(&self, _owner: &Owner, _entry: &FavoriteEntry) {}

    async fn list_favorites(&self, _owner: &Owner) -> Vec<FavoriteEntry> {
        Vec::new()
    }

    async fn remove_favorite(&self, _owner: &Owner, _key: &TitleKey) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn clear_favorites(&self, _owner: &Owner) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn import_favorites(
        &self,
        _owner: &Owner,
        _entries: &[FavoriteEntry],
    ) -> Result<usize, RemoteError> {
        Ok(0)
    }
}
