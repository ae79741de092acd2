//! Core types for shelfmint.
//!
//! Persisted records (Identity, Book, OwnershipRecord) plus the API
//! request/response DTOs. Key material on Identity is always the custody
//! codec's ciphertext, never plaintext.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identity identifier (UUID v4)
pub type IdentityId = Uuid;

/// Unique catalog entry identifier (UUID v4)
pub type BookId = Uuid;

/// Token identifier assigned by the external minting service
pub type TokenId = u64;

// ============ Persisted Records ============

/// Geolocation point (longitude first, like GeoJSON)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

/// Custodial identity record.
///
/// `public_key_enc` / `private_key_enc` hold custody-codec ciphertext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    /// External username (unique, the provisioning key)
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    pub public_key_enc: String,
    pub private_key_enc: String,
    pub created_at: DateTime<Utc>,
}

/// Shared, deduplicated book record keyed by ISBN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub isbn: String,
    pub title: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// Every token ever minted against this ISBN, across all owners.
    /// Append-only.
    pub token_ids: Vec<TokenId>,
    pub created_at: DateTime<Utc>,
}

/// One identity's claim to one book.
///
/// Token and transaction ids are immutable once minted; removal only flips
/// `active`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnershipRecord {
    pub id: Uuid,
    pub identity_id: IdentityId,
    pub book_id: BookId,
    pub token_id: Option<TokenId>,
    pub transaction_id: Option<String>,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mint_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============ API Request Types ============

/// Login / signup request. Provisioning is idempotent by username.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub latitude: Option<f64>,
}

/// A requested book (ISBN plus optional metadata for first-time entries)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookRequest {
    pub isbn: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

/// Batch mint request: optional profile refresh plus a list of books
#[derive(Debug, Deserialize)]
pub struct MintBooksRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub latitude: Option<f64>,
    pub books: Vec<BookRequest>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveBookRequest {
    pub book_id: BookId,
}

// ============ API Response Types ============

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            hint: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            hint: None,
        }
    }

    pub fn error_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            hint: Some(hint.into()),
        }
    }
}

/// Login response: identity plus a session credential. The public key is
/// decrypted for output; the private key never appears here.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: IdentityId,
    pub username: String,
    pub public_key: String,
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    pub longitude: f64,
    pub latitude: f64,
}

/// Identity public profile (safe for book-details responses)
#[derive(Debug, Clone, Serialize)]
pub struct IdentityProfile {
    pub id: IdentityId,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
}

impl From<&Identity> for IdentityProfile {
    fn from(i: &Identity) -> Self {
        Self {
            id: i.id,
            username: i.username.clone(),
            name: i.name.clone(),
            profile_picture: i.profile_picture.clone(),
        }
    }
}

/// Book public view
#[derive(Debug, Clone, Serialize)]
pub struct BookPublic {
    pub id: BookId,
    pub isbn: String,
    pub title: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl From<&Book> for BookPublic {
    fn from(b: &Book) -> Self {
        Self {
            id: b.id,
            isbn: b.isbn.clone(),
            title: b.title.clone(),
            author: b.author.clone(),
            description: b.description.clone(),
            image_url: b.image_url.clone(),
        }
    }
}

/// How a single add-book request was resolved
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MintStatus {
    /// A new token was minted externally
    Minted,
    /// A prior inactive claim was reactivated, original token reused
    Reactivated,
    /// An active claim already existed; pure no-op
    AlreadyOwned,
}

/// Result of a single add-book operation
#[derive(Debug, Serialize)]
pub struct AddBookResponse {
    pub book: BookPublic,
    pub status: MintStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<TokenId>,
}

/// Per-item outcome of a batch mint. Failures are isolated per item.
#[derive(Debug, Serialize)]
pub struct MintOutcome {
    pub isbn: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MintStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<TokenId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MintBatchResponse {
    pub results: Vec<MintOutcome>,
}

/// One entry in the "my books" view
#[derive(Debug, Serialize)]
pub struct MyBookEntry {
    pub book: BookPublic,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<TokenId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    pub added_at: DateTime<Utc>,
}

/// One live token and its holder, joined for book-details
#[derive(Debug, Serialize)]
pub struct TokenHolder {
    pub token_id: TokenId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mint_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_address: Option<String>,
    pub user: IdentityProfile,
}

#[derive(Debug, Serialize)]
pub struct BookDetailsResponse {
    pub isbn: String,
    pub title: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub users: Vec<TokenHolder>,
}

/// Private key export, owner only
#[derive(Debug, Serialize)]
pub struct ExportKeyResponse {
    pub private_key: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub identities_count: usize,
    pub books_count: usize,
}

/// Public stats response
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_identities: usize,
    pub total_books: usize,
    pub total_ownerships: usize,
    pub active_ownerships: usize,
    pub total_tokens_minted: usize,
    /// Catalog tokens with no ledger record; nonzero means the out-of-band
    /// mint/ledger audit has work to do.
    pub orphaned_tokens: usize,
}
