use serde::{Deserialize, Serialize};

use common::Interval;

/// The two views of a market the agent is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Timeframe {
    /// 5-minute candles over the last three hours.
    Intraday,
    /// 4-hour candles over the last seven days.
    LongTerm,
}

impl Timeframe {
    pub const ALL: [Timeframe; 2] = [Timeframe::Intraday, Timeframe::LongTerm];

    pub fn interval(&self) -> Interval {
        match self {
            Timeframe::Intraday => Interval::FiveMinutes,
            Timeframe::LongTerm => Interval::FourHours,
        }
    }

    /// Number of trailing candles fetched for this timeframe.
    ///
    /// Both windows are wide enough that MACD (26 candles) still yields a full
    /// 10-value series after trimming.
    pub fn window_size(&self) -> usize {
        match self {
            Timeframe::Intraday => 36,
            Timeframe::LongTerm => 42,
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Timeframe::Intraday => write!(f, "intraday"),
            Timeframe::LongTerm => write!(f, "long-term"),
        }
    }
}
