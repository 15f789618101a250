pub mod config;
pub mod paths;

pub use config::{Config, RemoteConfig, RetentionConfig, StatsConfig, StorageConfig};
pub use paths::PathManager;
