pub mod agent;
pub mod binance;
pub mod cycle;
pub mod markets;
pub mod prompt;
pub mod tools;

pub use agent::{AgentMessage, DecisionAgent, OpenAiAgent};
pub use binance::BinanceClient;
pub use cycle::{CycleReport, RunContext, TradingCycle};
pub use markets::{Market, MarketFileConfig};
pub use tools::TradingTools;
