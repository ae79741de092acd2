//! Shelfmint
//!
//! Custodial identity and book-minting service.
//!
//! ## Architecture
//!
//! - **Identity**: each user gets a custodial ed25519 keypair on first login,
//!   encrypted at rest and decrypted only on demand
//! - **Catalog**: books are shared, deduplicated records keyed by ISBN
//! - **Ledger**: per-(user, book) ownership with an active/inactive lifecycle;
//!   removal is a soft delete, mint history is never lost
//! - **Minting**: at most one external mint per (user, book) pair; repeats and
//!   re-adds reuse the original token

pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod custody;
pub mod error;
pub mod minting;
pub mod signer;
pub mod state;
pub mod types;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
