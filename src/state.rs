//! Application state for shelfmint.
//!
//! Holds the identity, catalog, and ownership stores plus the mint
//! orchestrator. Uniqueness (username, ISBN, ownership pair) is enforced by
//! atomic entry operations on the index maps, the storage layer of this
//! design.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::time::interval;
use uuid::Uuid;

use crate::auth::{AuthUser, TokenIssuer};
use crate::config::Config;
use crate::custody::SecretCodec;
use crate::error::{ApiError, ApiResult};
use crate::minting::MintingService;
use crate::signer::KeySigner;
use crate::types::*;

/// Global application state
pub struct AppState {
    /// All identities indexed by ID
    pub identities: DashMap<IdentityId, Identity>,
    /// Username -> identity ID lookup (unique index)
    pub username_index: DashMap<String, IdentityId>,
    /// Catalog entries indexed by ID
    pub books: DashMap<BookId, Book>,
    /// ISBN -> book ID lookup (unique index)
    pub isbn_index: DashMap<String, BookId>,
    /// Ownership records indexed by ID
    pub ownerships: DashMap<Uuid, OwnershipRecord>,
    /// (identity, book) -> ownership ID lookup (unique index, one record per pair)
    pub pair_index: DashMap<(IdentityId, BookId), Uuid>,
    /// Token ID -> ownership ID reverse lookup
    pub token_index: DashMap<TokenId, Uuid>,
    /// Custody codec for key material at rest
    pub codec: SecretCodec,
    /// Session token issuer
    pub tokens: TokenIssuer,
    /// External signer capability
    signer: Arc<dyn KeySigner>,
    /// External minting capability
    minting: Arc<dyn MintingService>,
    /// Configuration
    pub config: Config,
    /// Start time for uptime calculation
    pub start_time: Instant,
    /// Persistence dirty flag
    dirty: AtomicBool,
    /// Notify for immediate save
    persist_notify: Notify,
    /// Shutdown flag
    shutdown: AtomicBool,
    /// Last persist time
    pub last_persist: std::sync::RwLock<Option<DateTime<Utc>>>,
}

impl AppState {
    pub fn new(
        config: Config,
        signer: Arc<dyn KeySigner>,
        minting: Arc<dyn MintingService>,
    ) -> anyhow::Result<Arc<Self>> {
        let codec = SecretCodec::new(&config.encryption_key)
            .map_err(|e| anyhow::anyhow!("ENC_KEY: {}", e))?;
        let tokens = TokenIssuer::new(&config.jwt_secret, config.jwt_expiry);

        Ok(Arc::new(Self {
            identities: DashMap::new(),
            username_index: DashMap::new(),
            books: DashMap::new(),
            isbn_index: DashMap::new(),
            ownerships: DashMap::new(),
            pair_index: DashMap::new(),
            token_index: DashMap::new(),
            codec,
            tokens,
            signer,
            minting,
            config,
            start_time: Instant::now(),
            dirty: AtomicBool::new(false),
            persist_notify: Notify::new(),
            shutdown: AtomicBool::new(false),
            last_persist: std::sync::RwLock::new(None),
        }))
    }

    // ============ Persistence ============

    /// Load state from disk
    pub async fn load_from_disk(self: &Arc<Self>) -> anyhow::Result<()> {
        let path = self.config.state_file_path();

        if path.exists() {
            let json = tokio::fs::read_to_string(&path).await?;
            let snapshot: StateSnapshot = serde_json::from_str(&json)?;

            for identity in snapshot.identities {
                self.username_index
                    .insert(identity.username.clone(), identity.id);
                self.identities.insert(identity.id, identity);
            }

            for book in snapshot.books {
                self.isbn_index.insert(book.isbn.clone(), book.id);
                self.books.insert(book.id, book);
            }

            for record in snapshot.ownerships {
                self.pair_index
                    .insert((record.identity_id, record.book_id), record.id);
                if let Some(token_id) = record.token_id {
                    self.token_index.insert(token_id, record.id);
                }
                self.ownerships.insert(record.id, record);
            }

            tracing::info!(
                "Loaded state: {} identities, {} books, {} ownerships",
                self.identities.len(),
                self.books.len(),
                self.ownerships.len()
            );
        } else {
            tracing::info!("No existing state file, starting fresh");
        }

        Ok(())
    }

    /// Start background persistence worker
    pub fn spawn_persister(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let state = Arc::clone(self);
        let persist_interval = state.config.persist_interval;

        tokio::spawn(async move {
            let mut ticker = interval(persist_interval);

            loop {
                if state.shutdown.load(Ordering::SeqCst) {
                    tracing::info!("Persister shutting down, final save...");
                    if let Err(e) = state.save_to_disk().await {
                        tracing::error!("Failed final persist: {}", e);
                    }
                    break;
                }

                tokio::select! {
                    _ = ticker.tick() => {
                        if state.dirty.swap(false, Ordering::SeqCst) {
                            if let Err(e) = state.save_to_disk().await {
                                tracing::error!("Failed to persist state: {}", e);
                            }
                        }
                    }
                    _ = state.persist_notify.notified() => {
                        state.dirty.store(false, Ordering::SeqCst);
                        if let Err(e) = state.save_to_disk().await {
                            tracing::error!("Failed to persist state: {}", e);
                        }
                    }
                }
            }
        })
    }

    /// Signal shutdown
    pub fn signal_shutdown(&self) {
        tracing::info!("Shutdown signaled");
        self.shutdown.store(true, Ordering::SeqCst);
        self.persist_notify.notify_one();
    }

    /// Save state to disk
    async fn save_to_disk(&self) -> anyhow::Result<()> {
        let snapshot = StateSnapshot {
            identities: self.identities.iter().map(|r| r.value().clone()).collect(),
            books: self.books.iter().map(|r| r.value().clone()).collect(),
            ownerships: self.ownerships.iter().map(|r| r.value().clone()).collect(),
            saved_at: Utc::now(),
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        tokio::fs::create_dir_all(&self.config.data_dir).await?;

        let path = self.config.state_file_path();
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &json).await?;
        tokio::fs::rename(&temp_path, &path).await?;

        *self.last_persist.write().unwrap() = Some(Utc::now());
        tracing::info!("State persisted: {} identities", snapshot.identities.len());
        Ok(())
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    // ============ Identity Provisioner ============

    /// Provision an identity: idempotent by username.
    ///
    /// An existing username returns the stored identity unchanged with a
    /// fresh session token; keys are never regenerated. A new username gets
    /// a keypair, an activated account (sponsor-funded), and both keys
    /// encrypted at rest.
    pub async fn provision(&self, req: LoginRequest) -> ApiResult<SessionResponse> {
        if let Some(id) = self.username_index.get(&req.username).map(|r| *r.value()) {
            let identity = self.get_identity(&id)?;
            return self.session_for(&identity);
        }

        let keypair = self.signer.generate_keypair()?;
        self.signer.activate_account(&keypair.public_key).await?;

        let identity = Identity {
            id: Uuid::new_v4(),
            username: req.username.clone(),
            name: req.name,
            email: req.email,
            profile_picture: req.profile_picture,
            location: match (req.longitude, req.latitude) {
                (Some(longitude), Some(latitude)) => Some(GeoPoint {
                    longitude,
                    latitude,
                }),
                _ => None,
            },
            public_key_enc: self.codec.encrypt(&keypair.public_key)?,
            private_key_enc: self.codec.encrypt(&keypair.secret_key)?,
            created_at: Utc::now(),
        };

        // Atomic uniqueness check: a lost creation race discards our keypair
        // and falls back to the winner's identity.
        match self.username_index.entry(req.username.clone()) {
            Entry::Occupied(e) => {
                let winner = *e.get();
                drop(e);
                tracing::warn!(username = %req.username, "lost provisioning race");
                let identity = self.get_identity(&winner)?;
                return self.session_for(&identity);
            }
            Entry::Vacant(v) => {
                v.insert(identity.id);
            }
        }

        self.identities.insert(identity.id, identity.clone());
        self.mark_dirty();
        tracing::info!(username = %identity.username, id = %identity.id, "identity provisioned");

        self.session_for(&identity)
    }

    fn session_for(&self, identity: &Identity) -> ApiResult<SessionResponse> {
        let public_key = self.codec.decrypt(&identity.public_key_enc)?;
        let token = self.tokens.issue(identity.id, &public_key)?;

        Ok(SessionResponse {
            id: identity.id,
            username: identity.username.clone(),
            public_key,
            token,
            name: identity.name.clone(),
            email: identity.email.clone(),
            profile_picture: identity.profile_picture.clone(),
            longitude: identity.location.map(|l| l.longitude).unwrap_or(0.0),
            latitude: identity.location.map(|l| l.latitude).unwrap_or(0.0),
        })
    }

    /// Get identity by ID
    pub fn get_identity(&self, id: &IdentityId) -> ApiResult<Identity> {
        self.identities
            .get(id)
            .map(|r| r.value().clone())
            .ok_or_else(|| ApiError::NotFound("Identity not found".into()))
    }

    /// Update optional profile fields; absent fields are left unchanged
    pub fn update_profile(
        &self,
        id: &IdentityId,
        name: Option<String>,
        email: Option<String>,
        profile_picture: Option<String>,
        longitude: Option<f64>,
        latitude: Option<f64>,
    ) -> ApiResult<Identity> {
        let mut identity = self
            .identities
            .get_mut(id)
            .ok_or_else(|| ApiError::NotFound("Identity not found".into()))?;

        if name.is_some() {
            identity.name = name;
        }
        if email.is_some() {
            identity.email = email;
        }
        if profile_picture.is_some() {
            identity.profile_picture = profile_picture;
        }
        if let (Some(longitude), Some(latitude)) = (longitude, latitude) {
            identity.location = Some(GeoPoint {
                longitude,
                latitude,
            });
        }

        let updated = identity.clone();
        drop(identity);
        self.mark_dirty();
        Ok(updated)
    }

    /// Export the decrypted private key to its owner.
    ///
    /// The plaintext exists only in the response; nothing is persisted.
    pub fn export_private_key(&self, id: &IdentityId) -> ApiResult<String> {
        let identity = self.get_identity(id)?;
        Ok(self.codec.decrypt(&identity.private_key_enc)?)
    }

    // ============ Book Catalog ============

    /// Look up a book by ISBN, creating it if absent. Returns the entry and
    /// whether it was created. Metadata of an existing entry is preserved
    /// (first writer wins).
    pub fn find_or_create_book(&self, req: &BookRequest) -> ApiResult<(Book, bool)> {
        match self.isbn_index.entry(req.isbn.clone()) {
            Entry::Occupied(e) => {
                let id = *e.get();
                drop(e);
                let book = self
                    .books
                    .get(&id)
                    .map(|r| r.value().clone())
                    .ok_or_else(|| ApiError::internal("isbn index out of sync"))?;
                Ok((book, false))
            }
            Entry::Vacant(v) => {
                let book = Book {
                    id: Uuid::new_v4(),
                    isbn: req.isbn.clone(),
                    title: req.title.clone().unwrap_or_default(),
                    author: req.author.clone().unwrap_or_default(),
                    description: req.description.clone(),
                    image_url: req.image_url.clone(),
                    symbol: req.symbol.clone(),
                    token_ids: Vec::new(),
                    created_at: Utc::now(),
                };
                self.books.insert(book.id, book.clone());
                v.insert(book.id);
                self.mark_dirty();
                tracing::info!(isbn = %book.isbn, id = %book.id, "catalog entry created");
                Ok((book, true))
            }
        }
    }

    /// Append a freshly minted token to the book's sequence. Append-only.
    pub fn append_token(&self, book_id: &BookId, token_id: TokenId) -> ApiResult<()> {
        let mut book = self
            .books
            .get_mut(book_id)
            .ok_or_else(|| ApiError::NotFound("Book not found".into()))?;
        book.token_ids.push(token_id);
        drop(book);
        self.mark_dirty();
        Ok(())
    }

    pub fn get_book(&self, id: &BookId) -> ApiResult<Book> {
        self.books
            .get(id)
            .map(|r| r.value().clone())
            .ok_or_else(|| ApiError::NotFound("Book not found".into()))
    }

    pub fn find_book_by_isbn(&self, isbn: &str) -> Option<Book> {
        let id = self.isbn_index.get(isbn).map(|r| *r.value())?;
        self.books.get(&id).map(|r| r.value().clone())
    }

    // ============ Ownership Ledger ============

    /// Any record (active or inactive) for the pair
    pub fn find_any(&self, identity_id: &IdentityId, book_id: &BookId) -> Option<OwnershipRecord> {
        let rec_id = self
            .pair_index
            .get(&(*identity_id, *book_id))
            .map(|r| *r.value())?;
        self.ownerships.get(&rec_id).map(|r| r.value().clone())
    }

    /// Active record for the pair, if one exists
    pub fn find_active(
        &self,
        identity_id: &IdentityId,
        book_id: &BookId,
    ) -> Option<OwnershipRecord> {
        self.find_any(identity_id, book_id).filter(|r| r.active)
    }

    /// Reverse lookup from a minted token to its ownership record
    pub fn find_by_token(&self, token_id: TokenId) -> Option<OwnershipRecord> {
        let rec_id = self.token_index.get(&token_id).map(|r| *r.value())?;
        self.ownerships.get(&rec_id).map(|r| r.value().clone())
    }

    /// Activate the pair's claim. An existing record flips active in place,
    /// preserving its original token/transaction ids; otherwise a new active
    /// record is created with the given mint result.
    pub fn activate_ownership(
        &self,
        identity_id: IdentityId,
        book_id: BookId,
        minted: Option<(TokenId, String)>,
    ) -> ApiResult<OwnershipRecord> {
        let now = Utc::now();

        let record = match self.pair_index.entry((identity_id, book_id)) {
            Entry::Occupied(e) => {
                let rec_id = *e.get();
                drop(e);
                let mut record = self
                    .ownerships
                    .get_mut(&rec_id)
                    .ok_or_else(|| ApiError::internal("pair index out of sync"))?;
                record.active = true;
                record.updated_at = now;
                // Token ids are immutable once minted; only a record that
                // never got one (should not happen in practice) is filled in.
                if record.token_id.is_none() {
                    if let Some((token_id, transaction_id)) = minted {
                        record.token_id = Some(token_id);
                        record.transaction_id = Some(transaction_id);
                        self.token_index.insert(token_id, rec_id);
                    }
                }
                record.clone()
            }
            Entry::Vacant(v) => {
                let record = OwnershipRecord {
                    id: Uuid::new_v4(),
                    identity_id,
                    book_id,
                    token_id: minted.as_ref().map(|(t, _)| *t),
                    transaction_id: minted.map(|(_, tx)| tx),
                    active: true,
                    mint_address: None,
                    owner_address: None,
                    created_at: now,
                    updated_at: now,
                };
                if let Some(token_id) = record.token_id {
                    self.token_index.insert(token_id, record.id);
                }
                self.ownerships.insert(record.id, record.clone());
                v.insert(record.id);
                record
            }
        };

        self.mark_dirty();
        Ok(record)
    }

    /// Soft delete: flip the active claim to inactive. The record and its
    /// mint history are retained permanently.
    pub fn deactivate_ownership(
        &self,
        identity_id: &IdentityId,
        book_id: &BookId,
    ) -> ApiResult<()> {
        let rec_id = self
            .pair_index
            .get(&(*identity_id, *book_id))
            .map(|r| *r.value());

        let Some(rec_id) = rec_id else {
            return Err(ApiError::NotOwned("First add a book".into()));
        };

        let mut record = self
            .ownerships
            .get_mut(&rec_id)
            .ok_or_else(|| ApiError::internal("pair index out of sync"))?;

        if !record.active {
            return Err(ApiError::NotOwned("First add a book".into()));
        }

        record.active = false;
        record.updated_at = Utc::now();
        drop(record);
        self.mark_dirty();
        Ok(())
    }

    /// Active ownerships joined with their books, in insertion order
    pub fn my_books(&self, identity_id: &IdentityId) -> Vec<MyBookEntry> {
        let mut records: Vec<OwnershipRecord> = self
            .ownerships
            .iter()
            .filter(|r| r.value().identity_id == *identity_id && r.value().active)
            .map(|r| r.value().clone())
            .collect();
        records.sort_by_key(|r| r.created_at);

        records
            .into_iter()
            .filter_map(|record| {
                let book = self.books.get(&record.book_id)?;
                Some(MyBookEntry {
                    book: BookPublic::from(book.value()),
                    token_id: record.token_id,
                    transaction_id: record.transaction_id,
                    added_at: record.created_at,
                })
            })
            .collect()
    }

    // ============ Mint Orchestrator ============

    /// Add one book to the caller's collection with at most one external
    /// mint per (identity, ISBN), tolerating retries and repeats.
    pub async fn add_book(&self, auth: &AuthUser, req: &BookRequest) -> ApiResult<AddBookResponse> {
        let (book, _created) = self.find_or_create_book(req)?;

        if let Some(existing) = self.find_any(&auth.id, &book.id) {
            if existing.active {
                // Pure idempotent no-op, no external call
                return Ok(AddBookResponse {
                    book: BookPublic::from(&book),
                    status: MintStatus::AlreadyOwned,
                    token_id: existing.token_id,
                });
            }

            // Reactivate in place, reusing the original token
            let record = self.activate_ownership(auth.id, book.id, None)?;
            tracing::info!(isbn = %book.isbn, identity = %auth.id, "ownership reactivated");
            return Ok(AddBookResponse {
                book: BookPublic::from(&book),
                status: MintStatus::Reactivated,
                token_id: record.token_id,
            });
        }

        // No prior record: this is the only path that reaches the external
        // minting service. The mint precedes the ledger write; the
        // idempotency key on the mint request covers the gap between them.
        let receipt = self.minting.mint(&auth.public_key, req).await?;
        self.append_token(&book.id, receipt.token_id)?;
        let record = self.activate_ownership(
            auth.id,
            book.id,
            Some((receipt.token_id, receipt.transaction_id)),
        )?;

        tracing::info!(
            isbn = %book.isbn,
            identity = %auth.id,
            token_id = ?record.token_id,
            "book minted and recorded"
        );

        Ok(AddBookResponse {
            book: BookPublic::from(&book),
            status: MintStatus::Minted,
            token_id: record.token_id,
        })
    }

    /// Remove a book from the caller's collection. Soft delete only; the
    /// mint history survives for reactivation.
    pub fn remove_book(&self, auth: &AuthUser, book_id: &BookId) -> ApiResult<()> {
        self.deactivate_ownership(&auth.id, book_id)
    }

    /// Apply add_book to each request independently and concurrently.
    /// A failed item never blocks the others.
    pub async fn mint_batch(
        &self,
        auth: &AuthUser,
        books: Vec<BookRequest>,
    ) -> MintBatchResponse {
        let futures = books.iter().map(|book| async move {
            let isbn = book.isbn.clone();
            match self.add_book(auth, book).await {
                Ok(resp) => MintOutcome {
                    isbn,
                    success: true,
                    status: Some(resp.status),
                    token_id: resp.token_id,
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(isbn = %isbn, error = %e, "batch item failed");
                    MintOutcome {
                        isbn,
                        success: false,
                        status: None,
                        token_id: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        });

        MintBatchResponse {
            results: futures::future::join_all(futures).await,
        }
    }

    /// Fetch a book with the current holder of every minted token.
    ///
    /// Token lookups fan out concurrently. A token with no ledger record is
    /// dropped from the result (stale external state, not a fatal error).
    pub async fn book_details(&self, isbn: &str) -> ApiResult<BookDetailsResponse> {
        let book = self
            .find_book_by_isbn(isbn)
            .ok_or_else(|| ApiError::NotFound("Book not found".into()))?;

        let lookups = book.token_ids.iter().map(|t| self.minting.lookup(*t));
        let infos = futures::future::try_join_all(lookups).await?;

        let mut users = Vec::with_capacity(infos.len());
        for info in infos {
            let Some(record) = self.find_by_token(info.token_id) else {
                tracing::warn!(token_id = info.token_id, "token has no ledger record, dropped");
                continue;
            };
            let Some(identity) = self.identities.get(&record.identity_id) else {
                continue;
            };

            // Refresh the denormalized external-state cache
            if let Some(mut rec) = self.ownerships.get_mut(&record.id) {
                rec.mint_address = info.mint_address.clone();
                rec.owner_address = info.owner_address.clone();
            }
            self.mark_dirty();

            users.push(TokenHolder {
                token_id: info.token_id,
                mint_address: info.mint_address,
                owner_address: info.owner_address,
                user: IdentityProfile::from(identity.value()),
            });
        }

        Ok(BookDetailsResponse {
            isbn: book.isbn,
            title: book.title,
            author: book.author,
            description: book.description,
            users,
        })
    }

    // ============ Health & Stats ============

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "healthy".into(),
            version: self.config.version.clone(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            identities_count: self.identities.len(),
            books_count: self.books.len(),
        }
    }

    pub fn stats(&self) -> StatsResponse {
        let active = self
            .ownerships
            .iter()
            .filter(|r| r.value().active)
            .count();

        let total_tokens: usize = self.books.iter().map(|r| r.value().token_ids.len()).sum();
        let orphaned = self
            .books
            .iter()
            .flat_map(|r| r.value().token_ids.clone())
            .filter(|t| !self.token_index.contains_key(t))
            .count();

        StatsResponse {
            total_identities: self.identities.len(),
            total_books: self.books.len(),
            total_ownerships: self.ownerships.len(),
            active_ownerships: active,
            total_tokens_minted: total_tokens,
            orphaned_tokens: orphaned,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct StateSnapshot {
    identities: Vec<Identity>,
    books: Vec<Book>,
    ownerships: Vec<OwnershipRecord>,
    saved_at: DateTime<Utc>,
}
