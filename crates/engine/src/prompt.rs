//! Prompt assembly for the decision agent.
//!
//! Everything here is plain string formatting over already computed values;
//! no I/O and no shared state.

use std::fmt::Write as _;

use common::{AccountSummary, Position};
use indicators::IndicatorBundle;

use crate::Market;

/// User message sent with every invocation.
pub const INSTRUCTION: &str = "Based on the current market conditions and indicators, make a trading decision. You can either create a position using the createPosition tool or close existing positions using the closeAllPosition tool.";

/// Everything the agent prompt needs for one invocation.
pub struct PromptContext<'a> {
    pub invocation_count: u64,
    pub starting_capital: f64,
    pub markets: &'a [Market],
    pub positions: &'a [Position],
    pub account: &'a AccountSummary,
    pub sharpe_ratio: f64,
    /// Concatenated output of [`market_section`] for every market.
    pub indicator_data: &'a str,
}

fn join(series: &[f64]) -> String {
    series
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn timeframe_block(out: &mut String, title: &str, bundle: &IndicatorBundle) {
    let _ = writeln!(out, "{title} (oldest → latest):");
    let _ = writeln!(out, "Mid prices - [{}]", join(&bundle.mid_prices));
    let _ = writeln!(out, "EMA20 - [{}]", join(&bundle.ema20));
    let _ = writeln!(out, "MACD - [{}]", join(&bundle.macd));
    let _ = writeln!(out, "RSI7 - [{}]", join(&bundle.rsi7));
    let _ = writeln!(out, "RSI14 - [{}]", join(&bundle.rsi14));
    let _ = writeln!(out, "ATR3 - [{}]", join(&bundle.atr3));
    let _ = writeln!(out, "ATR14 - [{}]", join(&bundle.atr14));
    let _ = writeln!(
        out,
        "Current volume - {} vs. average volume - {}",
        bundle.current_volume, bundle.average_volume
    );
}

/// Indicator block for one market.
pub fn market_section(
    market: &Market,
    intraday: &IndicatorBundle,
    long_term: &IndicatorBundle,
    open_interest: Option<f64>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "MARKET - {}", market.slug);
    if let Some(oi) = open_interest {
        // No open interest history is fetched, so the average is the latest reading.
        let _ = writeln!(out, "Open interest: latest {oi} average {oi}");
    }
    timeframe_block(&mut out, "Intraday (5m candles)", intraday);
    out.push('\n');
    timeframe_block(&mut out, "Long Term (4h candles)", long_term);
    out
}

/// Comma separated "{symbol} {qty} {side}" list, or "None".
pub fn open_positions_summary(positions: &[Position]) -> String {
    if positions.is_empty() {
        return "None".to_string();
    }
    positions
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn live_positions_detail(positions: &[Position]) -> String {
    if positions.is_empty() {
        return "No open positions".to_string();
    }
    positions
        .iter()
        .map(|p| {
            format!(
                "{} {} {} entry {} unrealized PnL {} liquidation {}",
                p.symbol, p.side, p.quantity, p.entry_price, p.unrealized_pnl, p.liquidation_price
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn markets_summary(markets: &[Market]) -> String {
    markets
        .iter()
        .map(|m| format!("{} ({}x leverage)", m.slug, m.leverage))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Full system prompt for one invocation.
pub fn agent_prompt(ctx: &PromptContext<'_>) -> String {
    format!(
        "You are an expert trader. You were given ${capital} dollars to trade with.
You are trading on the crypto market. You are given the following information:
You have been invoked {count} times.
The current open positions are: {open}
Your current portfolio value is: ${total}
You have the createPosition or the closeAllPosition tool to create or close a position.
You can open positions in these markets only: {markets}

You can create leveraged positions as well, so feel free to choose higher quantities based on the leverage per market.
Choose the quantity which lowers the risk and do not lose all money in any case. Your goal is to maximise the returns so play safe and don't risk it all.

You can only open one position at a time.
You can close all open positions at once with the closeAllPosition tool.
You can only create a position if you have enough money to cover the initial margin.

Financial information:
ALL OF THE PRICE OR SIGNAL DATA BELOW IS ORDERED: OLDEST → NEWEST
{data}
Here is your current performance
Available cash ${available}
Current account value ${total}
Sharpe ratio {sharpe}
Current live positions and performance - {live}
",
        capital = ctx.starting_capital,
        count = ctx.invocation_count,
        open = open_positions_summary(ctx.positions),
        total = ctx.account.total,
        markets = markets_summary(ctx.markets),
        data = ctx.indicator_data,
        available = ctx.account.available,
        sharpe = ctx.sharpe_ratio,
        live = live_positions_detail(ctx.positions),
    )
}

#[cfg(test)]
mod tests {
    use common::PositionSide;
    use indicators::Timeframe;

    use super::*;

    fn market() -> Market {
        Market {
            slug: "ETH/USDT".into(),
            symbol: "ETHUSDT".into(),
            leverage: 10,
        }
    }

    fn bundle(timeframe: Timeframe) -> IndicatorBundle {
        IndicatorBundle {
            symbol: "ETHUSDT".into(),
            timeframe,
            mid_prices: vec![100.5, 101.25],
            ema20: vec![99.0, 99.5],
            macd: vec![0.25, 0.3],
            rsi7: vec![60.0, 65.5],
            rsi14: vec![55.0, 57.25],
            atr3: vec![1.5],
            atr14: vec![1.25],
            current_volume: 12.0,
            average_volume: 10.5,
        }
    }

    fn position() -> Position {
        Position {
            symbol: "ETHUSDT".into(),
            side: PositionSide::Long,
            quantity: 0.5,
            entry_price: 2000.0,
            unrealized_pnl: 12.5,
            realized_pnl: 0.0,
            liquidation_price: 1800.0,
        }
    }

    #[test]
    fn market_section_lists_series_comma_joined() {
        let text = market_section(
            &market(),
            &bundle(Timeframe::Intraday),
            &bundle(Timeframe::LongTerm),
            None,
        );
        assert!(text.starts_with("MARKET - ETH/USDT\n"));
        assert!(text.contains("Intraday (5m candles) (oldest → latest):"));
        assert!(text.contains("Long Term (4h candles) (oldest → latest):"));
        assert!(text.contains("Mid prices - [100.5,101.25]"));
        assert!(text.contains("RSI14 - [55,57.25]"));
        assert!(text.contains("Current volume - 12 vs. average volume - 10.5"));
        assert!(!text.contains("Open interest"));
    }

    #[test]
    fn open_interest_average_mirrors_latest() {
        let text = market_section(
            &market(),
            &bundle(Timeframe::Intraday),
            &bundle(Timeframe::LongTerm),
            Some(1234.5),
        );
        assert!(text.contains("Open interest: latest 1234.5 average 1234.5"));
    }

    #[test]
    fn empty_positions_fall_back() {
        let account = AccountSummary {
            total: 5000.0,
            available: 4200.0,
        };
        let prompt = agent_prompt(&PromptContext {
            invocation_count: 3,
            starting_capital: 5000.0,
            markets: &[market()],
            positions: &[],
            account: &account,
            sharpe_ratio: 0.0,
            indicator_data: "MARKET - ETH/USDT\n",
        });
        assert!(prompt.contains("You have been invoked 3 times."));
        assert!(prompt.contains("The current open positions are: None"));
        assert!(prompt.contains("Current live positions and performance - No open positions"));
        assert!(prompt.contains("Available cash $4200"));
        assert!(prompt.contains("ETH/USDT (10x leverage)"));
        assert!(prompt.contains("Sharpe ratio 0"));
    }

    #[test]
    fn positions_are_summarised() {
        assert_eq!(open_positions_summary(&[position()]), "ETHUSDT 0.5 LONG");
        let detail = live_positions_detail(&[position()]);
        assert!(detail.contains("entry 2000"));
        assert!(detail.contains("unrealized PnL 12.5"));
    }
}
