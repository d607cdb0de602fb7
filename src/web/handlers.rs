//! HTTP request handlers.

use super::AppState;
use crate::db::{LatestSnapshot, ProbeOutcome, Target};
use crate::probe::Prober;
use crate::scheduler::RunError;
use crate::targets::TargetError;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Health
// ============================================================================

pub async fn handle_health() -> impl IntoResponse {
    Json("OK")
}

// ============================================================================
// API: Status
// ============================================================================

pub async fn handle_summary<P: Prober>(State(state): State<AppState<P>>) -> impl IntoResponse {
    Json(state.scheduler.summary().await)
}

#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    pub completed_at: Option<DateTime<Utc>>,
    pub results: Vec<ProbeOutcome>,
}

impl ResultsResponse {
    /// Outcomes in configured order, skipping targets not in the snapshot.
    fn new(snapshot: &LatestSnapshot, targets: &[Target]) -> Self {
        Self {
            completed_at: snapshot.completed_at,
            results: targets
                .iter()
                .filter_map(|t| snapshot.get(t).cloned())
                .collect(),
        }
    }
}

pub async fn handle_results<P: Prober>(State(state): State<AppState<P>>) -> impl IntoResponse {
    let targets = state.scheduler.targets().await;
    let snapshot = state.scheduler.latest_snapshot().await;
    Json(ResultsResponse::new(&snapshot, targets.as_slice()))
}

#[derive(Debug, Deserialize)]
pub struct HistoryRequest {
    #[serde(default)]
    pub targets: Vec<Target>,
}

pub async fn handle_history<P: Prober>(
    State(state): State<AppState<P>>,
    Json(req): Json<HistoryRequest>,
) -> impl IntoResponse {
    Json(state.scheduler.history(&req.targets).await)
}

pub async fn handle_check_now<P: Prober>(State(state): State<AppState<P>>) -> impl IntoResponse {
    match state.scheduler.run_all().await {
        Ok(snapshot) => {
            let targets = state.scheduler.targets().await;
            Json(ResultsResponse::new(&snapshot, targets.as_slice())).into_response()
        }
        Err(e @ RunError::AlreadyRunning) => (StatusCode::CONFLICT, e.to_string()).into_response(),
    }
}

// ============================================================================
// API: Targets
// ============================================================================

pub async fn handle_get_targets<P: Prober>(State(state): State<AppState<P>>) -> impl IntoResponse {
    Json(state.scheduler.targets().await)
}

#[derive(Debug, Deserialize)]
pub struct TargetRequest {
    pub url: String,
}

fn target_error_status(e: &TargetError) -> StatusCode {
    match e {
        TargetError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
        TargetError::Duplicate(_) => StatusCode::CONFLICT,
        TargetError::NotFound(_) => StatusCode::NOT_FOUND,
    }
}

pub async fn handle_add_target<P: Prober>(
    State(state): State<AppState<P>>,
    Json(req): Json<TargetRequest>,
) -> impl IntoResponse {
    match state.scheduler.add_target(&req.url).await {
        Ok(()) => (StatusCode::CREATED, Json(state.scheduler.targets().await)).into_response(),
        Err(e) => (target_error_status(&e), e.to_string()).into_response(),
    }
}

pub async fn handle_remove_target<P: Prober>(
    State(state): State<AppState<P>>,
    Json(req): Json<TargetRequest>,
) -> impl IntoResponse {
    match state.scheduler.remove_target(&req.url).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => (target_error_status(&e), e.to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ServerConfig;
    use crate::db::{HistoryLog, Store};
    use crate::probe::testing::ScriptedProber;
    use crate::scheduler::{RunSettings, Scheduler};
    use crate::targets::TargetList;
    use crate::web::Server;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct TestApp {
        base: String,
        client: reqwest::Client,
        _dir: TempDir,
    }

    async fn spawn_app(prober: ScriptedProber, urls: &[&str]) -> TestApp {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path().join("urls.json"), dir.path().join("history.json"));
        let scheduler = Arc::new(Scheduler::with_state(
            prober,
            store,
            RunSettings::default(),
            TargetList::from_vec(urls.iter().map(|u| u.to_string()).collect()),
            HistoryLog::new(),
        ));
        let router = Server::new(ServerConfig::default(), scheduler).routes();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        TestApp {
            base: format!("http://{}", addr),
            client: reqwest::Client::builder().no_proxy().build().unwrap(),
            _dir: dir,
        }
    }

    impl TestApp {
        async fn get(&self, path: &str) -> Value {
            self.client
                .get(format!("{}{}", self.base, path))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_check_then_summary_and_results() {
        let prober = ScriptedProber::new()
            .respond("http://a", 200)
            .fail("http://b", "request timed out after 10s");
        let app = spawn_app(prober, &["http://a", "http://b"]).await;

        assert_eq!(
            app.get("/api/summary").await,
            json!({"total": 2, "up": 0, "down": 2})
        );

        let resp = app
            .client
            .post(format!("{}/api/check", app.base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);

        assert_eq!(
            app.get("/api/summary").await,
            json!({"total": 2, "up": 1, "down": 1})
        );

        let results = app.get("/api/results").await;
        assert!(results["completed_at"].is_string());
        let results = results["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["target"], "http://a");
        assert_eq!(results[0]["status"], "UP");
        assert_eq!(results[1]["target"], "http://b");
        assert_eq!(results[1]["status"], "DOWN");
        assert!(results[1]["error"].as_str().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_target_management() {
        let app = spawn_app(ScriptedProber::new(), &["http://a"]).await;
        let url = format!("{}/api/targets", app.base);

        let resp = app
            .client
            .post(&url)
            .json(&json!({"url": "https://b.example"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::CREATED);

        let resp = app
            .client
            .post(&url)
            .json(&json!({"url": "https://b.example"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::CONFLICT);

        let resp = app
            .client
            .post(&url)
            .json(&json!({"url": "b.example"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

        assert_eq!(app.get("/api/targets").await, json!(["http://a", "https://b.example"]));

        let resp = app
            .client
            .delete(&url)
            .json(&json!({"url": "http://a"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NO_CONTENT);

        let resp = app
            .client
            .delete(&url)
            .json(&json!({"url": "http://a"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

        assert_eq!(app.get("/api/targets").await, json!(["https://b.example"]));
    }

    #[tokio::test]
    async fn test_history_query() {
        let prober = ScriptedProber::new().respond("http://a", 200);
        let app = spawn_app(prober, &["http://a"]).await;

        for _ in 0..3 {
            app.client
                .post(format!("{}/api/check", app.base))
                .send()
                .await
                .unwrap();
        }

        let history: Value = app
            .client
            .post(format!("{}/api/history", app.base))
            .json(&json!({"targets": ["http://a", "http://unknown"]}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(history["http://a"].as_array().unwrap().len(), 3);
        assert!(history.get("http://unknown").is_none());

        let empty: Value = app
            .client
            .post(format!("{}/api/history", app.base))
            .json(&json!({"targets": []}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(empty, json!({}));
    }

    #[tokio::test]
    async fn test_health() {
        let app = spawn_app(ScriptedProber::new(), &[]).await;
        assert_eq!(app.get("/health").await, json!("OK"));
    }
}
