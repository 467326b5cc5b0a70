use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use common::{ExchangeClient, PositionSide};

pub const CREATE_POSITION: &str = "createPosition";
pub const CLOSE_ALL_POSITIONS: &str = "closeAllPosition";

/// The two actions the decision agent may take.
///
/// Tool failures are reported back to the agent as text instead of being
/// raised, so a rejected order never aborts the trading cycle.
#[derive(Clone)]
pub struct TradingTools {
    exchange: Arc<dyn ExchangeClient>,
}

#[derive(Debug, Deserialize)]
struct CreatePositionArgs {
    symbol: String,
    side: String,
    quantity: f64,
}

impl TradingTools {
    pub fn new(exchange: Arc<dyn ExchangeClient>) -> Self {
        Self { exchange }
    }

    /// Function-calling schema for the chat completions API.
    pub fn definitions(&self) -> Value {
        json!([
            {
                "type": "function",
                "function": {
                    "name": CREATE_POSITION,
                    "description": "Open a position in the given market.",
                    "parameters": {
                        "type": "object",
                        "properties": {
                            "symbol": {
                                "type": "string",
                                "description":
                                    "The symbol to open the position at (e.g. \"ETH/USDT\")"
                            },
                            "side": { "type": "string", "enum": ["LONG", "SHORT"] },
                            "quantity": {
                                "type": "number",
                                "description": "The quantity of the position to open"
                            }
                        },
                        "required": ["symbol", "side", "quantity"]
                    }
                }
            },
            {
                "type": "function",
                "function": {
                    "name": CLOSE_ALL_POSITIONS,
                    "description": "Close all the currently open positions.",
                    "parameters": { "type": "object", "properties": {} }
                }
            }
        ])
    }

    /// Dispatch a tool call by name. `arguments` is the raw JSON string sent by the model.
    pub async fn invoke(&self, name: &str, arguments: &str) -> String {
        match name {
            CREATE_POSITION => match serde_json::from_str::<CreatePositionArgs>(arguments) {
                Ok(args) => self.create_position(&args.symbol, &args.side, args.quantity).await,
                Err(e) => format!("Failed to open position: invalid arguments: {e}"),
            },
            CLOSE_ALL_POSITIONS => self.close_all_positions().await,
            other => {
                warn!(tool = other, "Agent requested an unknown tool");
                format!("Unknown tool '{other}'")
            }
        }
    }

    pub async fn create_position(&self, symbol: &str, side: &str, quantity: f64) -> String {
        let side: PositionSide = match side.parse() {
            Ok(side) => side,
            Err(e) => return format!("Failed to open position: {e}"),
        };
        if !(quantity > 0.0) {
            return format!("Failed to open position: quantity must be positive, got {quantity}");
        }

        // "ETH/USDT" → "ETHUSDT"
        let exchange_symbol = symbol.replace('/', "");
        match self.exchange.open_position(&exchange_symbol, side, quantity).await {
            Ok(fill) => {
                info!(
                    symbol = %exchange_symbol,
                    side = %side,
                    quantity,
                    price = fill.price,
                    "Position opened"
                );
                format!("Position opened successfully for {quantity} {symbol}")
            }
            Err(e) => {
                warn!(symbol = %exchange_symbol, error = %e, "Failed to open position");
                format!("Failed to open position: {e}")
            }
        }
    }

    pub async fn close_all_positions(&self) -> String {
        match self.exchange.close_all_positions().await {
            Ok(fills) if fills.is_empty() => "No open positions to close".to_string(),
            Ok(fills) => {
                info!(count = fills.len(), "Positions closed");
                format!(
                    "All positions closed successfully. Closed {} position(s).",
                    fills.len()
                )
            }
            Err(e) => {
                warn!(error = %e, "Failed to close positions");
                format!("Failed to close positions: {e}")
            }
        }
    }
}
