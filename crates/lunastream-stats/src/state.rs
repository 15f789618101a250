use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::limit::RateLimiter;

const WATCH_STATS_FILE: &str = "watch-stats.json";
const UNIQUE_VISITORS_FILE: &str = "unique-visitors.json";

/// Watch events kept in the bounded log; the total keeps counting past it.
const MAX_WATCH_EVENTS: usize = 1000;

pub const RATE_LIMIT_MAX_PER_WINDOW: u32 = 100;
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
pub const RATE_LIMIT_BAN_STRIKES: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchEventRow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WatchStats {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub entries: Vec<WatchEventRow>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UniqueVisitors {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub ips: HashSet<String>,
}

/// Counter state owned by the service process and injected into handlers.
///
/// Counters persist to JSON files on every mutation and are reloaded on
/// startup, so a restart does not reset them. The mutexes are the
/// concurrency control: handlers run concurrently and increments must not
/// race.
pub struct AppState {
    data_dir: PathBuf,
    pub watch: Mutex<WatchStats>,
    pub visitors: Mutex<UniqueVisitors>,
    pub limiter: Mutex<RateLimiter>,
}

impl AppState {
    pub fn load(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let watch: WatchStats = load_json(&data_dir.join(WATCH_STATS_FILE));
        let visitors: UniqueVisitors = load_json(&data_dir.join(UNIQUE_VISITORS_FILE));
        debug!(
            "Loaded counter state: {} watch events, {} unique visitors",
            watch.total, visitors.total
        );

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            watch: Mutex::new(watch),
            visitors: Mutex::new(visitors),
            limiter: Mutex::new(RateLimiter::new(
                RATE_LIMIT_MAX_PER_WINDOW,
                RATE_LIMIT_WINDOW,
                RATE_LIMIT_BAN_STRIKES,
            )),
        })
    }

    /// Count one watch event. Returns the new total.
    pub fn record_watch(&self) -> u64 {
        let mut watch = self.watch.lock().unwrap();
        watch.total += 1;
        watch.entries.push(WatchEventRow {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
        });
        if watch.entries.len() > MAX_WATCH_EVENTS {
            let excess = watch.entries.len() - MAX_WATCH_EVENTS;
            watch.entries.drain(..excess);
        }
        save_json(&self.data_dir.join(WATCH_STATS_FILE), &*watch);
        watch.total
    }

    pub fn watch_total(&self) -> u64 {
        self.watch.lock().unwrap().total
    }

    /// Count a visit from `ip`. Returns whether it was a first visit, and the
    /// unique-visitor total.
    pub fn record_visit(&self, ip: &str) -> (bool, u64) {
        let mut visitors = self.visitors.lock().unwrap();
        let new_visitor = visitors.ips.insert(ip.to_string());
        if new_visitor {
            visitors.total += 1;
            save_json(&self.data_dir.join(UNIQUE_VISITORS_FILE), &*visitors);
        }
        (new_visitor, visitors.total)
    }

    pub fn unique_total(&self) -> u64 {
        self.visitors.lock().unwrap().total
    }
}

fn load_json<T>(path: &Path) -> T
where
    T: Default + DeserializeOwned,
{
    if !path.exists() {
        return T::default();
    }
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            return T::default();
        }
    };
    match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            warn!("Corrupt counter file {}: {}", path.display(), e);
            T::default()
        }
    }
}

fn save_json<T: Serialize>(path: &Path, value: &T) {
    let json = match serde_json::to_string_pretty(value) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize {}: {}", path.display(), e);
            return;
        }
    };
    if let Err(e) = std::fs::write(path, json) {
        warn!("Failed to persist {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_total_increments_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::load(dir.path()).unwrap();

        assert_eq!(state.watch_total(), 0);
        assert_eq!(state.record_watch(), 1);
        assert_eq!(state.record_watch(), 2);
        assert_eq!(state.watch_total(), 2);
    }

    #[test]
    fn event_log_stays_bounded_while_the_total_keeps_counting() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::load(dir.path()).unwrap();

        for _ in 0..(MAX_WATCH_EVENTS + 5) {
            state.record_watch();
        }

        let watch = state.watch.lock().unwrap();
        assert_eq!(watch.entries.len(), MAX_WATCH_EVENTS);
        assert_eq!(watch.total, (MAX_WATCH_EVENTS + 5) as u64);
    }

    #[test]
    fn repeat_visits_do_not_count_twice() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::load(dir.path()).unwrap();

        assert_eq!(state.record_visit("198.51.100.7"), (true, 1));
        assert_eq!(state.record_visit("198.51.100.7"), (false, 1));
        assert_eq!(state.record_visit("203.0.113.9"), (true, 2));
        assert_eq!(state.unique_total(), 2);
    }

    #[test]
    fn counters_survive_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let state = AppState::load(dir.path()).unwrap();
            state.record_watch();
            state.record_watch();
            state.record_visit("198.51.100.7");
        }

        let reloaded = AppState::load(dir.path()).unwrap();
        assert_eq!(reloaded.watch_total(), 2);
        assert_eq!(reloaded.unique_total(), 1);
        // The IP set is restored too, so the visitor stays deduplicated
        assert_eq!(reloaded.record_visit("198.51.100.7"), (false, 1));
    }

    #[test]
    fn corrupt_state_files_reset_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(WATCH_STATS_FILE), "{broken").unwrap();

        let state = AppState::load(dir.path()).unwrap();
        assert_eq!(state.watch_total(), 0);
    }
}
