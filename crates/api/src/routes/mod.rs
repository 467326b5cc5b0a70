mod health;
mod portfolio;

pub use health::health_router;
pub use portfolio::portfolio_router;
