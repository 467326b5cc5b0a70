use crate::TradingMode;

/// All configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Exchange credentials (only required for live trading)
    pub binance_api_key: Option<String>,
    pub binance_secret: Option<String>,
    pub binance_testnet: bool,

    // Decision agent
    pub openai_api_key: String,
    pub llm_model: String,
    pub llm_base_url: String,
    /// Sampling temperature; unset leaves the model default.
    pub llm_temperature: Option<f64>,

    // HTTP API
    pub api_port: u16,
    pub allowed_origins: Vec<String>,

    // Trading
    pub trading_mode: TradingMode,
    pub invocation_interval_secs: u64,
    pub paper_initial_balance: f64,
    pub paper_slippage_bps: f64,

    // Database
    pub database_url: String,

    // Markets config file path
    pub markets_config_path: String,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let required = |key: &str| {
            lookup(key).unwrap_or_else(|| {
                panic!("Required environment variable '{key}' is not set. Check your .env file.")
            })
        };

        let trading_mode = match required("TRADING_MODE").to_lowercase().as_str() {
            "paper" => TradingMode::Paper,
            "live" => TradingMode::Live,
            other => panic!("ERROR: TRADING_MODE must be 'paper' or 'live', got: '{other}'"),
        };

        let (binance_api_key, binance_secret) = match trading_mode {
            TradingMode::Live => (
                Some(required("BINANCE_API_KEY")),
                Some(required("BINANCE_SECRET")),
            ),
            TradingMode::Paper => (lookup("BINANCE_API_KEY"), lookup("BINANCE_SECRET")),
        };

        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Config {
            binance_api_key,
            binance_secret,
            binance_testnet: lookup("BINANCE_TESTNET")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(true),
            openai_api_key: required("OPENAI_API_KEY"),
            llm_model: lookup("LLM_MODEL").unwrap_or_else(|| "gpt-5-mini".to_string()),
            llm_base_url: lookup("LLM_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            llm_temperature: lookup("LLM_TEMPERATURE").and_then(|v| v.parse().ok()),
            api_port: lookup("API_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            allowed_origins,
            trading_mode,
            invocation_interval_secs: lookup("INVOCATION_INTERVAL_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            paper_initial_balance: lookup("PAPER_INITIAL_BALANCE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(5_000.0),
            paper_slippage_bps: lookup("PAPER_SLIPPAGE_BPS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(10.0),
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://portfolio.db?mode=rwc".to_string()),
            markets_config_path: lookup("MARKETS_CONFIG_PATH")
                .unwrap_or_else(|| "config/markets.toml".to_string()),
        }
    }
}
