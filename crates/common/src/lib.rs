pub mod config;
pub mod error;
pub mod exchange;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::{Error, InsufficientDataError, Result};
pub use exchange::{CandleSource, ExchangeClient};
pub use store::PortfolioStore;
pub use types::*;
