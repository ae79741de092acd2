use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub persist_interval: Duration,
    /// Process-wide secret for the custody codec. Empty = startup failure.
    pub encryption_key: String,
    pub jwt_secret: String,
    pub jwt_expiry: Duration,
    /// Base URL of the signer sidecar (account activation, sponsor funding)
    pub signer_url: String,
    pub sponsor_address: String,
    /// Lamport threshold below which the sponsor gets a dev-only top-up
    pub min_sponsor_balance: u64,
    /// Base URL of the minting service
    pub minting_url: String,
    pub minting_token: String,
    pub project_id: String,
    /// Timeout applied to every external signer/minting call
    pub external_timeout: Duration,
    pub max_batch_books: usize,
    /// "dev" enables sponsor airdrop top-ups
    pub environment: String,
    pub version: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            persist_interval: Duration::from_secs(
                env::var("PERSIST_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            encryption_key: env::var("ENC_KEY").unwrap_or_default(),
            jwt_secret: env::var("JWT_KEY").unwrap_or_else(|_| "dev-jwt-secret".into()),
            jwt_expiry: Duration::from_secs(
                env::var("JWT_EXPIRY_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(7 * 24 * 3600),
            ),
            signer_url: env::var("SIGNER_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:9090".into()),
            sponsor_address: env::var("SPONSOR_ADDRESS").unwrap_or_default(),
            min_sponsor_balance: env::var("MIN_SPONSOR_BALANCE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1_000_000),
            minting_url: env::var("MINTING_URL")
                .unwrap_or_else(|_| "https://devnet.underdogprotocol.com/v2/projects".into()),
            minting_token: env::var("MINTING_TOKEN").unwrap_or_default(),
            project_id: env::var("PROJECT_ID").unwrap_or_else(|_| "1".into()),
            external_timeout: Duration::from_secs(
                env::var("EXTERNAL_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(15),
            ),
            max_batch_books: env::var("MAX_BATCH_BOOKS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(20),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".into()),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn state_file_path(&self) -> PathBuf {
        self.data_dir.join("state.json")
    }

    pub fn is_dev(&self) -> bool {
        self.environment == "dev"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
