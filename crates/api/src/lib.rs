pub mod routes;

use std::net::SocketAddr;

use axum::http::HeaderValue;
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use common::{PortfolioStore, Result, TradingMode};

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub store: PortfolioStore,
    pub trading_mode: TradingMode,
}

/// CORS layer for the configured origins; `*` allows any origin.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_headers(Any)
        .allow_methods(Any)
}

pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .merge(routes::portfolio_router())
        .merge(routes::health_router())
        .with_state(state)
        .layer(cors_layer(allowed_origins))
}

/// Build and run the Axum API server until the listener fails.
pub async fn serve(state: AppState, port: u16, allowed_origins: &[String]) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(state, allowed_origins);

    info!(%addr, "Portfolio API listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
