//! KeySigner capability: keypair generation and account activation.
//!
//! The concrete chain transport lives behind the trait. `HttpKeySigner`
//! talks to a signer sidecar that holds the sponsor key and submits the
//! actual activation transaction; this service never constructs chain
//! transactions itself.

use async_trait::async_trait;
use serde::Deserialize;

use crate::crypto::{self, Keypair};

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("signer unavailable: {0}")]
    Unavailable(String),
    #[error("signer rejected request: {0}")]
    Rejected(String),
}

pub type SignerResult<T> = Result<T, SignerError>;

#[async_trait]
pub trait KeySigner: Send + Sync {
    /// Generate a fresh keypair for a new custodial identity.
    fn generate_keypair(&self) -> SignerResult<Keypair>;

    /// Activate (fund) the account for a freshly generated public key.
    /// The sponsor pays rent/fees.
    async fn activate_account(&self, public_key: &str) -> SignerResult<()>;
}

/// HTTP-backed signer client.
pub struct HttpKeySigner {
    client: reqwest::Client,
    base_url: String,
    sponsor_address: String,
    min_sponsor_balance: u64,
    dev_topup: bool,
}

#[derive(Deserialize)]
struct BalanceResponse {
    balance: u64,
}

impl HttpKeySigner {
    pub fn new(
        client: reqwest::Client,
        base_url: String,
        sponsor_address: String,
        min_sponsor_balance: u64,
        dev_topup: bool,
    ) -> Self {
        Self {
            client,
            base_url,
            sponsor_address,
            min_sponsor_balance,
            dev_topup,
        }
    }

    async fn sponsor_balance(&self) -> SignerResult<u64> {
        let url = format!("{}/balance/{}", self.base_url, self.sponsor_address);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SignerError::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(SignerError::Unavailable(format!(
                "balance query returned {}",
                resp.status()
            )));
        }

        let body: BalanceResponse = resp
            .json()
            .await
            .map_err(|e| SignerError::Unavailable(e.to_string()))?;
        Ok(body.balance)
    }

    async fn request_airdrop(&self) -> SignerResult<()> {
        let url = format!("{}/airdrop", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "address": self.sponsor_address }))
            .send()
            .await
            .map_err(|e| SignerError::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(SignerError::Unavailable(format!(
                "airdrop returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl KeySigner for HttpKeySigner {
    fn generate_keypair(&self) -> SignerResult<Keypair> {
        Ok(crypto::generate_keypair())
    }

    async fn activate_account(&self, public_key: &str) -> SignerResult<()> {
        // Dev environments run against a faucet; keep the sponsor topped up
        // so activation transactions do not bounce on rent.
        if self.dev_topup {
            let balance = self.sponsor_balance().await?;
            if balance <= self.min_sponsor_balance {
                tracing::info!(balance, "sponsor balance low, requesting airdrop");
                self.request_airdrop().await?;
            }
        }

        let url = format!("{}/accounts", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "public_key": public_key }))
            .send()
            .await
            .map_err(|e| SignerError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(SignerError::Unavailable(format!(
                "activation returned {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(SignerError::Rejected(format!(
                "activation returned {}",
                status
            )));
        }

        tracing::debug!(public_key, "account activated");
        Ok(())
    }
}
