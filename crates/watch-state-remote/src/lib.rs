pub mod error;
pub mod stats;
pub mod supabase;
pub mod traits;

pub use error::RemoteError;
pub use stats::{StatsClient, VisitOutcome};
pub use supabase::{Session, SessionTokens, SupabaseStore};
pub use traits::{OfflineBackend, WatchStateBackend};
