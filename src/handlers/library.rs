// handlers/library.rs - /api/v1/notes/{notes,bookmarks,history}
//
// All routes require a bearer token issued under the resolved tenant.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::database::models::{Bookmark, PlayHistory, UserNote};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::server::AppState;
use crate::services::library_service::{
    LibraryFilter, NewBookmark, NewNote, NewPlayHistory, NoteChanges, PlayHistoryChanges,
};
use crate::services::Page;
use crate::tenant::TenantScope;

/// GET /api/v1/notes/notes?verse=
pub async fn list_notes(
    State(state): State<AppState>,
    user: AuthUser,
    scope: TenantScope,
    Query(filter): Query<LibraryFilter>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<UserNote>> {
    Ok(ApiResponse::success(
        state.library.list_notes(&scope, &user, filter, page).await?,
    ))
}

/// POST /api/v1/notes/notes
pub async fn create_note(
    State(state): State<AppState>,
    user: AuthUser,
    scope: TenantScope,
    Json(input): Json<NewNote>,
) -> ApiResult<UserNote> {
    Ok(ApiResponse::created(state.library.create_note(&scope, &user, input).await?))
}

/// GET /api/v1/notes/notes/:id
pub async fn get_note(
    State(state): State<AppState>,
    user: AuthUser,
    scope: TenantScope,
    Path(id): Path<i64>,
) -> ApiResult<UserNote> {
    Ok(ApiResponse::success(state.library.get_note(&scope, &user, id).await?))
}

/// PUT|PATCH /api/v1/notes/notes/:id
pub async fn update_note(
    State(state): State<AppState>,
    user: AuthUser,
    scope: TenantScope,
    Path(id): Path<i64>,
    Json(changes): Json<NoteChanges>,
) -> ApiResult<UserNote> {
    Ok(ApiResponse::success(
        state.library.update_note(&scope, &user, id, changes).await?,
    ))
}

/// DELETE /api/v1/notes/notes/:id
pub async fn delete_note(
    State(state): State<AppState>,
    user: AuthUser,
    scope: TenantScope,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    state.library.delete_note(&scope, &user, id).await?;
    Ok(ApiResponse::no_content())
}

/// GET /api/v1/notes/bookmarks?book=
pub async fn list_bookmarks(
    State(state): State<AppState>,
    user: AuthUser,
    scope: TenantScope,
    Query(filter): Query<LibraryFilter>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<Bookmark>> {
    Ok(ApiResponse::success(
        state.library.list_bookmarks(&scope, &user, filter, page).await?,
    ))
}

/// POST /api/v1/notes/bookmarks
pub async fn create_bookmark(
    State(state): State<AppState>,
    user: AuthUser,
    scope: TenantScope,
    Json(input): Json<NewBookmark>,
) -> ApiResult<Bookmark> {
    Ok(ApiResponse::created(
        state.library.create_bookmark(&scope, &user, input).await?,
    ))
}

/// GET /api/v1/notes/bookmarks/:id
pub async fn get_bookmark(
    State(state): State<AppState>,
    user: AuthUser,
    scope: TenantScope,
    Path(id): Path<i64>,
) -> ApiResult<Bookmark> {
    Ok(ApiResponse::success(state.library.get_bookmark(&scope, &user, id).await?))
}

/// DELETE /api/v1/notes/bookmarks/:id
pub async fn delete_bookmark(
    State(state): State<AppState>,
    user: AuthUser,
    scope: TenantScope,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    state.library.delete_bookmark(&scope, &user, id).await?;
    Ok(ApiResponse::no_content())
}

/// GET /api/v1/notes/history?chapter_audio=
pub async fn list_history(
    State(state): State<AppState>,
    user: AuthUser,
    scope: TenantScope,
    Query(filter): Query<LibraryFilter>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<PlayHistory>> {
    Ok(ApiResponse::success(
        state.library.list_history(&scope, &user, filter, page).await?,
    ))
}

/// POST /api/v1/notes/history
pub async fn create_history(
    State(state): State<AppState>,
    user: AuthUser,
    scope: TenantScope,
    Json(input): Json<NewPlayHistory>,
) -> ApiResult<PlayHistory> {
    Ok(ApiResponse::created(
        state.library.create_history(&scope, &user, input).await?,
    ))
}

/// GET /api/v1/notes/history/:id
pub async fn get_history(
    State(state): State<AppState>,
    user: AuthUser,
    scope: TenantScope,
    Path(id): Path<i64>,
) -> ApiResult<PlayHistory> {
    Ok(ApiResponse::success(state.library.get_history(&scope, &user, id).await?))
}

/// PUT|PATCH /api/v1/notes/history/:id
pub async fn update_history(
    State(state): State<AppState>,
    user: AuthUser,
    scope: TenantScope,
    Path(id): Path<i64>,
    Json(changes): Json<PlayHistoryChanges>,
) -> ApiResult<PlayHistory> {
    Ok(ApiResponse::success(
        state.library.update_history(&scope, &user, id, changes).await?,
    ))
}

/// DELETE /api/v1/notes/history/:id
pub async fn delete_history(
    State(state): State<AppState>,
    user: AuthUser,
    scope: TenantScope,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    state.library.delete_history(&scope, &user, id).await?;
    Ok(ApiResponse::no_content())
}
