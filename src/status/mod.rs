//! Operational status endpoint: is the tracker alive and what did the last
//! cycle do. Serves no runner data.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

use crate::tracker::CycleReport;

#[derive(Debug, Clone, Serialize)]
pub struct TrackerStatus {
    pub started_at: DateTime<Utc>,
    pub cycles_run: u64,
    /// Ticks that fell outside the active window
    pub cycles_skipped: u64,
    pub cycles_failed: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_report: Option<CycleReport>,
    pub last_error: Option<String>,
    pub cached_runners: usize,
}

/// Shared, cheaply clonable handle to the tracker status.
#[derive(Clone)]
pub struct StatusBoard {
    inner: Arc<RwLock<TrackerStatus>>,
}

impl StatusBoard {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        StatusBoard {
            inner: Arc::new(RwLock::new(TrackerStatus {
                started_at,
                cycles_run: 0,
                cycles_skipped: 0,
                cycles_failed: 0,
                last_cycle_at: None,
                last_report: None,
                last_error: None,
                cached_runners: 0,
            })),
        }
    }

    pub async fn snapshot(&self) -> TrackerStatus {
        self.inner.read().await.clone()
    }

    pub async fn record_completed(&self, at: DateTime<Utc>, report: Option<CycleReport>, cached_runners: usize) {
        let mut s = self.inner.write().await;
        s.cycles_run += 1;
        s.last_cycle_at = Some(at);
        if report.is_some() {
            s.last_report = report;
        }
        s.last_error = None;
        s.cached_runners = cached_runners;
    }

    pub async fn record_skipped(&self) {
        self.inner.write().await.cycles_skipped += 1;
    }

    pub async fn record_failed(&self, at: DateTime<Utc>, error: String) {
        let mut s = self.inner.write().await;
        s.cycles_run += 1;
        s.cycles_failed += 1;
        s.last_cycle_at = Some(at);
        s.last_error = Some(error);
    }
}

/// Build the Axum router for the status server.
pub fn router(board: StatusBoard) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/status", get(status_handler))
        .layer(CorsLayer::permissive())
        .with_state(board)
}

/// GET /health
async fn health_handler() -> &'static str {
    "ok"
}

/// GET /api/status
async fn status_handler(State(board): State<StatusBoard>) -> impl IntoResponse {
    Json(board.snapshot().await)
}
