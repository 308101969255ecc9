use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub metrics_port: Option<u16>,
    /// Consecutive lock-backend failures before the circuit opens.
    pub circuit_failure_threshold: u32,
    /// Seconds the circuit stays open before the recovery probe.
    pub circuit_open_timeout_secs: u64,
    /// Lease lifetime for distributed locks; renewed while the holder lives.
    pub lock_ttl_secs: u64,
    /// Cadence of the janitor sweep over the local permit registry.
    pub slot_janitor_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://motorpool.db?mode=rwc".to_string());

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let metrics_port = match env::var("METRICS_PORT") {
            Ok(raw) => Some(raw.parse().map_err(|_| ConfigError::InvalidPort)?),
            Err(_) => None,
        };

        let circuit_failure_threshold = env::var("CIRCUIT_FAILURE_THRESHOLD")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);

        let circuit_open_timeout_secs = env::var("CIRCUIT_OPEN_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let lock_ttl_secs = env::var("LOCK_TTL_SECONDS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let slot_janitor_interval_secs = env::var("SLOT_JANITOR_INTERVAL_SECONDS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .unwrap_or(3600);

        Ok(Config {
            database_url,
            server_host,
            server_port,
            metrics_port,
            circuit_failure_threshold,
            circuit_open_timeout_secs,
            lock_ttl_secs,
            slot_janitor_interval_secs,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port number")]
    InvalidPort,
}
