pub mod favorite;
pub mod keys;
pub mod media;
pub mod owner;
pub mod watch_entry;
pub mod watchlist;

pub use favorite::FavoriteEntry;
pub use keys::{EntryKey, KeyError, TitleKey};
pub use media::{ExternalId, MediaKind};
pub use owner::Owner;
pub use watch_entry::WatchEntry;
pub use watchlist::WatchlistEntry;
