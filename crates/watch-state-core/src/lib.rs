pub mod local;
pub mod repository;

pub use local::{Collection, LocalStore};
pub use repository::{
    ContinueWatchingRepository, FavoritesRepository, MigrationReport, WatchRecord,
    WatchStateRepository, WatchlistRepository, DEFAULT_WATCH_CAP,
};
