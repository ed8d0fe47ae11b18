// handlers/catalog.rs - /api/v1/books, /api/v1/chapters, /api/v1/verses
//
// Every handler takes the request's TenantScope explicitly and hands it to
// the catalog service; nothing here reads the tenant from anywhere else.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::database::models::{Book, Chapter, Verse};
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;
use crate::services::catalog_service::{
    BookChanges, ChapterChanges, NewBook, NewChapter, NewVerse, VerseChanges,
};
use crate::services::Page;
use crate::tenant::TenantScope;

#[derive(Debug, Default, Deserialize)]
pub struct ChapterFilter {
    pub book: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerseFilter {
    pub chapter: Option<i64>,
}

/// GET /api/v1/books
pub async fn list_books(
    State(state): State<AppState>,
    scope: TenantScope,
    Query(page): Query<Page>,
) -> ApiResult<Vec<Book>> {
    Ok(ApiResponse::success(state.catalog.list_books(&scope, page).await?))
}

/// POST /api/v1/books
pub async fn create_book(
    State(state): State<AppState>,
    scope: TenantScope,
    Json(input): Json<NewBook>,
) -> ApiResult<Book> {
    Ok(ApiResponse::created(state.catalog.create_book(&scope, input).await?))
}

/// GET /api/v1/books/:id
pub async fn get_book(State(state): State<AppState>, scope: TenantScope, Path(id): Path<i64>) -> ApiResult<Book> {
    Ok(ApiResponse::success(state.catalog.get_book(&scope, id).await?))
}

/// PUT|PATCH /api/v1/books/:id
pub async fn update_book(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<i64>,
    Json(changes): Json<BookChanges>,
) -> ApiResult<Book> {
    Ok(ApiResponse::success(state.catalog.update_book(&scope, id, changes).await?))
}

/// DELETE /api/v1/books/:id
pub async fn delete_book(State(state): State<AppState>, scope: TenantScope, Path(id): Path<i64>) -> ApiResult<()> {
    state.catalog.delete_book(&scope, id).await?;
    Ok(ApiResponse::no_content())
}

/// GET /api/v1/chapters?book=
pub async fn list_chapters(
    State(state): State<AppState>,
    scope: TenantScope,
    Query(filter): Query<ChapterFilter>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<Chapter>> {
    Ok(ApiResponse::success(
        state.catalog.list_chapters(&scope, filter.book, page).await?,
    ))
}

/// POST /api/v1/chapters
pub async fn create_chapter(
    State(state): State<AppState>,
    scope: TenantScope,
    Json(input): Json<NewChapter>,
) -> ApiResult<Chapter> {
    Ok(ApiResponse::created(state.catalog.create_chapter(&scope, input).await?))
}

/// GET /api/v1/chapters/:id
pub async fn get_chapter(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<i64>,
) -> ApiResult<Chapter> {
    Ok(ApiResponse::success(state.catalog.get_chapter(&scope, id).await?))
}

/// PUT|PATCH /api/v1/chapters/:id
pub async fn update_chapter(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<i64>,
    Json(changes): Json<ChapterChanges>,
) -> ApiResult<Chapter> {
    Ok(ApiResponse::success(
        state.catalog.update_chapter(&scope, id, changes).await?,
    ))
}

/// DELETE /api/v1/chapters/:id
pub async fn delete_chapter(State(state): State<AppState>, scope: TenantScope, Path(id): Path<i64>) -> ApiResult<()> {
    state.catalog.delete_chapter(&scope, id).await?;
    Ok(ApiResponse::no_content())
}

/// GET /api/v1/verses?chapter=
pub async fn list_verses(
    State(state): State<AppState>,
    scope: TenantScope,
    Query(filter): Query<VerseFilter>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<Verse>> {
    Ok(ApiResponse::success(
        state.catalog.list_verses(&scope, filter.chapter, page).await?,
    ))
}

/// POST /api/v1/verses
pub async fn create_verse(
    State(state): State<AppState>,
    scope: TenantScope,
    Json(input): Json<NewVerse>,
) -> ApiResult<Verse> {
    Ok(ApiResponse::created(state.catalog.create_verse(&scope, input).await?))
}

/// GET /api/v1/verses/:id
pub async fn get_verse(State(state): State<AppState>, scope: TenantScope, Path(id): Path<i64>) -> ApiResult<Verse> {
    Ok(ApiResponse::success(state.catalog.get_verse(&scope, id).await?))
}

/// PUT|PATCH /api/v1/verses/:id
pub async fn update_verse(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<i64>,
    Json(changes): Json<VerseChanges>,
) -> ApiResult<Verse> {
    Ok(ApiResponse::success(state.catalog.update_verse(&scope, id, changes).await?))
}

/// DELETE /api/v1/verses/:id
pub async fn delete_verse(State(state): State<AppState>, scope: TenantScope, Path(id): Path<i64>) -> ApiResult<()> {
    state.catalog.delete_verse(&scope, id).await?;
    Ok(ApiResponse::no_content())
}
