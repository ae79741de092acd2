use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use shelfmint::api::create_router;
use shelfmint::config::Config;
use shelfmint::crypto::{self, Keypair};
use shelfmint::minting::{MintError, MintReceipt, MintResult, MintingService, TokenInfo};
use shelfmint::signer::{KeySigner, SignerResult};
use shelfmint::state::AppState;
use shelfmint::types::{BookRequest, TokenId};

/// Signer stub: local keygen, activation always succeeds
pub struct MockSigner {
    pub activations: AtomicU64,
}

#[async_trait]
impl KeySigner for MockSigner {
    fn generate_keypair(&self) -> SignerResult<Keypair> {
        Ok(crypto::generate_keypair())
    }

    async fn activate_account(&self, _public_key: &str) -> SignerResult<()> {
        self.activations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Minting stub: sequential token ids, optional per-ISBN failure injection
pub struct MockMinting {
    next_token: AtomicU64,
    pub mint_calls: AtomicU64,
    pub fail_isbn: Option<String>,
}

impl MockMinting {
    pub fn new(fail_isbn: Option<String>) -> Self {
        Self {
            next_token: AtomicU64::new(1),
            mint_calls: AtomicU64::new(0),
            fail_isbn,
        }
    }
}

#[async_trait]
impl MintingService for MockMinting {
    async fn mint(&self, _owner: &str, book: &BookRequest) -> MintResult<MintReceipt> {
        if self.fail_isbn.as_deref() == Some(book.isbn.as_str()) {
            return Err(MintError::Unavailable("injected failure".into()));
        }
        self.mint_calls.fetch_add(1, Ordering::SeqCst);
        let token_id = self.next_token.fetch_add(1, Ordering::SeqCst);
        Ok(MintReceipt {
            token_id,
            transaction_id: format!("tx-{}", token_id),
        })
    }

    async fn lookup(&self, token_id: TokenId) -> MintResult<TokenInfo> {
        Ok(TokenInfo {
            token_id,
            mint_address: Some(format!("mint-{}", token_id)),
            owner_address: Some(format!("owner-{}", token_id)),
        })
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Arc<AppState>,
    pub minting: Arc<MockMinting>,
    pub signer: Arc<MockSigner>,
    _data_dir: TempDir,
}

pub async fn spawn_test_server() -> TestServer {
    spawn_test_server_with(None).await
}

pub async fn spawn_test_server_with(fail_isbn: Option<String>) -> TestServer {
    let data_dir = TempDir::new().expect("Failed to create temp dir");

    let config = Config {
        host: "127.0.0.1".into(),
        port: 0, // Random port
        data_dir: data_dir.path().to_path_buf(),
        encryption_key: "integration-test-encryption-key".into(),
        jwt_secret: "integration-test-jwt-secret".into(),
        ..Config::default()
    };

    let signer = Arc::new(MockSigner {
        activations: AtomicU64::new(0),
    });
    let minting = Arc::new(MockMinting::new(fail_isbn));

    let state = AppState::new(
        config,
        Arc::clone(&signer) as Arc<dyn KeySigner>,
        Arc::clone(&minting) as Arc<dyn MintingService>,
    )
    .expect("Failed to build state");

    let app = create_router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give server time to start
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    TestServer {
        addr,
        state,
        minting,
        signer,
        _data_dir: data_dir,
    }
}

/// Log in and return (identity id as string, session token)
pub async fn login(server: &TestServer, username: &str) -> (String, String) {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{}/users/login", server.addr))
        .json(&serde_json::json!({ "username": username }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let body: serde_json::Value = resp.json().await.unwrap();
    (
        body["data"]["id"].as_str().unwrap().to_string(),
        body["data"]["token"].as_str().unwrap().to_string(),
    )
}
