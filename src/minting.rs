//! MintingService capability: external token mint and lookup.
//!
//! `HttpMintingService` speaks the minting provider's REST API. Every mint
//! carries a deterministic idempotency key derived from (owner, isbn) so a
//! retried request after a timeout cannot create a second token.

use async_trait::async_trait;
use serde::Deserialize;

use crate::crypto::mint_idempotency_key;
use crate::types::{BookRequest, TokenId};

#[derive(Debug, thiserror::Error)]
pub enum MintError {
    #[error("minting service unavailable: {0}")]
    Unavailable(String),
    #[error("minting service rejected request: {0}")]
    Rejected(String),
}

pub type MintResult<T> = Result<T, MintError>;

/// Result of a successful mint
#[derive(Debug, Clone)]
pub struct MintReceipt {
    pub token_id: TokenId,
    pub transaction_id: String,
}

/// Current external state of a minted token
#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub token_id: TokenId,
    pub mint_address: Option<String>,
    pub owner_address: Option<String>,
}

#[async_trait]
pub trait MintingService: Send + Sync {
    /// Mint one token for `owner_public_key` against the given book.
    async fn mint(&self, owner_public_key: &str, book: &BookRequest) -> MintResult<MintReceipt>;

    /// Fetch current external state of a token.
    async fn lookup(&self, token_id: TokenId) -> MintResult<TokenInfo>;
}

/// HTTP-backed minting client (bearer credential + project id)
pub struct HttpMintingService {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MintApiResponse {
    #[serde(alias = "id")]
    nft_id: TokenId,
    transaction_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupApiResponse {
    id: TokenId,
    #[serde(default)]
    mint_address: Option<String>,
    #[serde(default)]
    owner_address: Option<String>,
}

impl HttpMintingService {
    pub fn new(client: reqwest::Client, base_url: String, project_id: String, token: String) -> Self {
        Self {
            client,
            base_url,
            project_id,
            token,
        }
    }
}

#[async_trait]
impl MintingService for HttpMintingService {
    async fn mint(&self, owner_public_key: &str, book: &BookRequest) -> MintResult<MintReceipt> {
        let url = format!("{}/{}/nfts", self.base_url, self.project_id);

        let body = serde_json::json!({
            "attributes": {
                "isbn": book.isbn,
                "title": book.title,
                "author": book.author,
            },
            "receiverAddress": owner_public_key,
            "name": book.title.clone().unwrap_or_default(),
            "symbol": book.symbol.clone().unwrap_or_default(),
            "description": book.description.clone().unwrap_or_default(),
            "image": book.image_url.clone().unwrap_or_default(),
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header(
                "Idempotency-Key",
                mint_idempotency_key(owner_public_key, &book.isbn),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| MintError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(MintError::Unavailable(format!("mint returned {}", status)));
        }
        if !status.is_success() {
            return Err(MintError::Rejected(format!("mint returned {}", status)));
        }

        let parsed: MintApiResponse = resp
            .json()
            .await
            .map_err(|e| MintError::Unavailable(e.to_string()))?;

        tracing::info!(
            token_id = parsed.nft_id,
            isbn = %book.isbn,
            "token minted"
        );

        Ok(MintReceipt {
            token_id: parsed.nft_id,
            transaction_id: parsed.transaction_id,
        })
    }

    async fn lookup(&self, token_id: TokenId) -> MintResult<TokenInfo> {
        let url = format!("{}/{}/nfts/{}", self.base_url, self.project_id, token_id);

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| MintError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(MintError::Unavailable(format!(
                "lookup returned {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(MintError::Rejected(format!("lookup returned {}", status)));
        }

        let parsed: LookupApiResponse = resp
            .json()
            .await
            .map_err(|e| MintError::Unavailable(e.to_string()))?;

        Ok(TokenInfo {
            token_id: parsed.id,
            mint_address: parsed.mint_address,
            owner_address: parsed.owner_address,
        })
    }
}
