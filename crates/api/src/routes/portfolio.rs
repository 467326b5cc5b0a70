use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use common::{Error, PortfolioSnapshot};
use indicators::sharpe_ratio;

use crate::AppState;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;

pub fn portfolio_router() -> Router<AppState> {
    Router::new()
        .route("/api/portfolio/history", get(get_history))
        .route("/api/portfolio/latest", get(get_latest))
        .route("/api/portfolio/performance", get(get_performance))
}

fn internal_error(e: Error) -> (StatusCode, Json<Value>) {
    error!(error = %e, "Portfolio query failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<i64>,
}

async fn get_history(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> ApiResult<Vec<PortfolioSnapshot>> {
    // limit=0 means no limit
    let limit = q.limit.filter(|&l| l > 0);
    let rows = state.store.history(limit).await.map_err(internal_error)?;
    Ok(Json(rows))
}

async fn get_latest(State(state): State<AppState>) -> ApiResult<Value> {
    let latest = state.store.latest().await.map_err(internal_error)?;
    let body = match latest {
        Some(snapshot) => serde_json::to_value(snapshot).map_err(|e| internal_error(e.into()))?,
        None => json!({ "timestamp": null, "total": 0, "available": 0 }),
    };
    Ok(Json(body))
}

async fn get_performance(State(state): State<AppState>) -> ApiResult<Value> {
    let totals = state.store.totals().await.map_err(internal_error)?;
    Ok(Json(json!({
        "sharpe_ratio": sharpe_ratio(&totals, 0.0),
        "samples": totals.len(),
    })))
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::{TimeZone, Utc};
    use common::{PortfolioStore, TradingMode};
    use sqlx::sqlite::SqlitePoolOptions;
    use tower::ServiceExt;

    use crate::{router, AppState};

    use super::*;

    async fn state() -> AppState {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = PortfolioStore::new(pool);
        store.migrate().await.unwrap();
        AppState {
            store,
            trading_mode: TradingMode::Paper,
        }
    }

    async fn seed(state: &AppState, totals: &[f64]) {
        for (i, &total) in totals.iter().enumerate() {
            let snapshot = PortfolioSnapshot {
                timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, i as u32, 0).unwrap(),
                total,
                available: total / 2.0,
            };
            state.store.save(&snapshot).await.unwrap();
        }
    }

    async fn get_json(state: AppState, uri: &str) -> (StatusCode, Value) {
        let resp = router(state, &["*".to_string()])
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn root_and_health() {
        let (status, body) = get_json(state().await, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": "Trader AI API Server" }));

        let (_, body) = get_json(state().await, "/healthz").await;
        assert_eq!(body, json!({ "status": "ok", "mode": "paper" }));
    }

    #[tokio::test]
    async fn latest_falls_back_when_empty() {
        let (status, body) = get_json(state().await, "/api/portfolio/latest").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "timestamp": null, "total": 0, "available": 0 }));
    }

    #[tokio::test]
    async fn latest_returns_most_recent_snapshot() {
        let state = state().await;
        seed(&state, &[100.0, 110.0, 105.0]).await;
        let (_, body) = get_json(state, "/api/portfolio/latest").await;
        assert_eq!(body["total"], 105.0);
        assert_eq!(body["available"], 52.5);
    }

    #[tokio::test]
    async fn history_limit_keeps_newest_in_ascending_order() {
        let state = state().await;
        seed(&state, &[100.0, 110.0, 105.0, 120.0]).await;

        let (_, body) = get_json(state.clone(), "/api/portfolio/history").await;
        assert_eq!(body.as_array().unwrap().len(), 4);

        let (_, body) = get_json(state, "/api/portfolio/history?limit=2").await;
        let totals: Vec<f64> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["total"].as_f64().unwrap())
            .collect();
        assert_eq!(totals, vec![105.0, 120.0]);
    }

    #[tokio::test]
    async fn performance_reports_sharpe_over_totals() {
        let state = state().await;
        let (_, body) = get_json(state.clone(), "/api/portfolio/performance").await;
        assert_eq!(body, json!({ "sharpe_ratio": 0.0, "samples": 0 }));

        seed(&state, &[100.0, 110.0, 105.0, 120.0]).await;
        let (_, body) = get_json(state.clone(), "/api/portfolio/performance").await;
        assert_eq!(body["samples"], 4);
        let expected = sharpe_ratio(&[100.0, 110.0, 105.0, 120.0], 0.0);
        assert_eq!(body["sharpe_ratio"].as_f64().unwrap(), expected);
    }
}
