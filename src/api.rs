use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::auth::{validate_batch_len, validate_isbn, validate_username, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::types::*;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health & stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        // Identity
        .route("/users/login", post(login))
        .route("/users/export-private-key", get(export_private_key))
        // Books
        .route("/users/add-book", post(add_book))
        .route("/users/remove-book", post(remove_book))
        .route("/users/mint-books", post(mint_books))
        .route("/users/my-books", get(my_books))
        .route("/users/book-details/:isbn", get(book_details))
        .with_state(state)
}

// ============ Auth Helpers ============

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> ApiResult<AuthUser> {
    let token = extract_bearer(headers).ok_or(ApiError::Unauthorized)?;
    state.tokens.verify(token)
}

// ============ Health Endpoints ============

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::success(state.health()))
}

async fn stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::success(state.stats()))
}

// ============ Identity Endpoints ============

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_username(&req.username)
        .map_err(|e| ApiError::bad_request_with_hint(e, "Username: 3-32 chars"))?;

    let resp = state.provision(req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(resp))))
}

async fn export_private_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let auth = authenticate(&state, &headers)?;
    let private_key = state.export_private_key(&auth.id)?;
    Ok(Json(ApiResponse::success(ExportKeyResponse { private_key })))
}

// ============ Book Endpoints ============

fn validate_book_request(req: &BookRequest) -> ApiResult<()> {
    validate_isbn(&req.isbn)
        .map_err(|e| ApiError::bad_request_with_hint(e, "ISBN: digits, dashes, and X"))?;
    Ok(())
}

async fn add_book(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<BookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let auth = authenticate(&state, &headers)?;
    validate_book_request(&req)?;

    let resp = state.add_book(&auth, &req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(resp))))
}

async fn remove_book(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<RemoveBookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let auth = authenticate(&state, &headers)?;
    state.remove_book(&auth, &req.book_id)?;
    Ok(Json(ApiResponse::<()> {
        success: true,
        data: None,
        error: None,
        hint: None,
    }))
}

async fn mint_books(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<MintBooksRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let auth = authenticate(&state, &headers)?;

    validate_batch_len(req.books.len(), state.config.max_batch_books)
        .map_err(|e| ApiError::BadRequest(e.into()))?;
    for book in &req.books {
        validate_book_request(book)?;
    }

    // Profile refresh first, then the batch
    state.update_profile(
        &auth.id,
        req.name,
        req.email,
        req.profile_picture,
        req.longitude,
        req.latitude,
    )?;

    let resp = state.mint_batch(&auth, req.books).await;
    Ok(Json(ApiResponse::success(resp)))
}

async fn my_books(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let auth = authenticate(&state, &headers)?;
    let books = state.my_books(&auth.id);
    Ok(Json(ApiResponse::success(books)))
}

async fn book_details(
    State(state): State<Arc<AppState>>,
    Path(isbn): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let resp = state.book_details(&isbn).await?;
    Ok(Json(ApiResponse::success(resp)))
}
