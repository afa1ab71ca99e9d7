use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ledger: LedgerConfig,
    pub jobs: JobsConfig,
    pub payment: PaymentConfig,
    pub settlement: SettlementConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Credits granted when an account row is provisioned on first touch
    pub signup_grant: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    /// A job stuck in `processing` longer than this is presumed abandoned
    pub stale_after_minutes: i64,
    /// Cadence of the background sweep spawned in main.rs
    pub sweep_interval_secs: u64,
    /// Upper bound accepted from job-creation requests
    pub max_job_cost: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub currency: String,
    /// Human-readable prefix of generated transaction codes (e.g. "OPZ")
    pub code_prefix: String,
    /// Scheme marker stamped onto new orders; a pending order carrying an
    /// older version is cancelled and recreated instead of reused
    pub code_version: i16,
    pub payment_method: String,
    pub bank: BankConfig,
    pub plans: Vec<PlanConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BankConfig {
    pub bank_id: String,
    pub account_no: String,
    pub account_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanConfig {
    pub id: String,
    pub name: String,
    /// Minor currency units
    pub price: i64,
    pub credits: i32,
    /// Days added to subscription_end on settlement; 0 for pure top-ups
    #[serde(default)]
    pub extend_days: i64,
    pub order_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettlementConfig {
    /// Shared key the settlement webhook must present
    pub api_key: String,
    /// Optional provider endpoint polled as a webhook fallback
    #[serde(default)]
    pub poll_url: Option<String>,
    pub poll_interval_secs: u64,
}

impl PaymentConfig {
    pub fn plan(&self, plan_id: &str) -> Option<&PlanConfig> {
        self.plans.iter().find(|p| p.id == plan_id)
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for environment variable overrides)
        dotenvy::dotenv().ok();

        // Build config from config.yml (required) with environment variable overrides
        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(true))
            .add_source(
                config::Environment::with_prefix("OPZEN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
