use reqwest::Client;
use serde::Deserialize;
use tracing::warn;
use watch_state_config::StatsConfig;

#[derive(Debug, Deserialize)]
struct TotalResponse {
    #[allow(dead_code)]
    success: bool,
    total: u64,
}

/// Outcome of reporting a visit to the counter service.
#[derive(Debug, Clone, Deserialize)]
pub struct VisitOutcome {
    pub new_visitor: bool,
    pub total: u64,
}

/// Client for the counter service. Counters are vanity metrics; every call
/// here is total. Failures degrade to zero totals or skipped reports and
/// must never break a watch action.
pub struct StatsClient {
    http: Client,
    base_url: String,
}

impl StatsClient {
    pub fn new(config: &StatsConfig) -> Self {
        Self {
            http: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Report one watch event. Returns the new total when the service
    /// answered, `None` otherwise.
    pub async fn record_watch(&self) -> Option<u64> {
        let response = match self.http.post(self.url("/api/watch-stats")).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to record watch event: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("Watch event rejected with status {}", response.status());
            return None;
        }

        match response.json::<TotalResponse>().await {
            Ok(body) => Some(body.total),
            Err(e) => {
                warn!("Undecodable watch-stats response: {}", e);
                None
            }
        }
    }

    pub async fn watch_total(&self) -> u64 {
        match self.fetch_total("/api/watch-stats").await {
            Some(total) => total,
            None => 0,
        }
    }

    /// Report this client as a visitor. `None` when the service is down.
    pub async fn record_visit(&self) -> Option<VisitOutcome> {
        let response = match self.http.post(self.url("/api/unique")).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to record visit: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("Visit report rejected with status {}", response.status());
            return None;
        }

        match response.json::<VisitOutcome>().await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!("Undecodable unique-visitor response: {}", e);
                None
            }
        }
    }

    pub async fn unique_total(&self) -> u64 {
        match self.fetch_total("/api/unique").await {
            Some(total) => total,
            None => 0,
        }
    }

    async fn fetch_total(&self, path: &str) -> Option<u64> {
        let response = match self.http.get(self.url(path)).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to fetch {}: {}", path, e);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("{} returned status {}", path, response.status());
            return None;
        }

        match response.json::<TotalResponse>().await {
            Ok(body) => Some(body.total),
            Err(e) => {
                warn!("Undecodable counter response from {}: {}", path, e);
                None
            }
        }
    }
}
