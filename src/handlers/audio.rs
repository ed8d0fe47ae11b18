// handlers/audio.rs - /api/v1/audio/{reciters,chapter-audios,timestamps}

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::database::models::{AudioTimestamp, ChapterAudio, Reciter};
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;
use crate::services::audio_service::{
    ChapterAudioChanges, NewChapterAudio, NewReciter, NewTimestamp, ReciterChanges, TimestampChanges,
};
use crate::services::Page;
use crate::tenant::TenantScope;

#[derive(Debug, Default, Deserialize)]
pub struct ChapterAudioFilter {
    pub chapter: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TimestampFilter {
    pub chapter_audio: Option<i64>,
}

/// GET /api/v1/audio/reciters
pub async fn list_reciters(
    State(state): State<AppState>,
    scope: TenantScope,
    Query(page): Query<Page>,
) -> ApiResult<Vec<Reciter>> {
    Ok(ApiResponse::success(state.audio.list_reciters(&scope, page).await?))
}

/// POST /api/v1/audio/reciters
pub async fn create_reciter(
    State(state): State<AppState>,
    scope: TenantScope,
    Json(input): Json<NewReciter>,
) -> ApiResult<Reciter> {
    Ok(ApiResponse::created(state.audio.create_reciter(&scope, input).await?))
}

/// GET /api/v1/audio/reciters/:id
pub async fn get_reciter(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<i64>,
) -> ApiResult<Reciter> {
    Ok(ApiResponse::success(state.audio.get_reciter(&scope, id).await?))
}

/// PUT|PATCH /api/v1/audio/reciters/:id
pub async fn update_reciter(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<i64>,
    Json(changes): Json<ReciterChanges>,
) -> ApiResult<Reciter> {
    Ok(ApiResponse::success(state.audio.update_reciter(&scope, id, changes).await?))
}

/// DELETE /api/v1/audio/reciters/:id
pub async fn delete_reciter(State(state): State<AppState>, scope: TenantScope, Path(id): Path<i64>) -> ApiResult<()> {
    state.audio.delete_reciter(&scope, id).await?;
    Ok(ApiResponse::no_content())
}

/// GET /api/v1/audio/chapter-audios?chapter=
pub async fn list_chapter_audios(
    State(state): State<AppState>,
    scope: TenantScope,
    Query(filter): Query<ChapterAudioFilter>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<ChapterAudio>> {
    Ok(ApiResponse::success(
        state.audio.list_chapter_audios(&scope, filter.chapter, page).await?,
    ))
}

/// POST /api/v1/audio/chapter-audios
pub async fn create_chapter_audio(
    State(state): State<AppState>,
    scope: TenantScope,
    Json(input): Json<NewChapterAudio>,
) -> ApiResult<ChapterAudio> {
    Ok(ApiResponse::created(state.audio.create_chapter_audio(&scope, input).await?))
}

/// GET /api/v1/audio/chapter-audios/:id
pub async fn get_chapter_audio(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<i64>,
) -> ApiResult<ChapterAudio> {
    Ok(ApiResponse::success(state.audio.get_chapter_audio(&scope, id).await?))
}

/// PUT|PATCH /api/v1/audio/chapter-audios/:id
pub async fn update_chapter_audio(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<i64>,
    Json(changes): Json<ChapterAudioChanges>,
) -> ApiResult<ChapterAudio> {
    Ok(ApiResponse::success(
        state.audio.update_chapter_audio(&scope, id, changes).await?,
    ))
}

/// DELETE /api/v1/audio/chapter-audios/:id
pub async fn delete_chapter_audio(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    state.audio.delete_chapter_audio(&scope, id).await?;
    Ok(ApiResponse::no_content())
}

/// GET /api/v1/audio/timestamps?chapter_audio=
pub async fn list_timestamps(
    State(state): State<AppState>,
    scope: TenantScope,
    Query(filter): Query<TimestampFilter>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<AudioTimestamp>> {
    Ok(ApiResponse::success(
        state.audio.list_timestamps(&scope, filter.chapter_audio, page).await?,
    ))
}

/// POST /api/v1/audio/timestamps
pub async fn create_timestamp(
    State(state): State<AppState>,
    scope: TenantScope,
    Json(input): Json<NewTimestamp>,
) -> ApiResult<AudioTimestamp> {
    Ok(ApiResponse::created(state.audio.create_timestamp(&scope, input).await?))
}

/// GET /api/v1/audio/timestamps/:id
pub async fn get_timestamp(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<i64>,
) -> ApiResult<AudioTimestamp> {
    Ok(ApiResponse::success(state.audio.get_timestamp(&scope, id).await?))
}

/// PUT|PATCH /api/v1/audio/timestamps/:id
pub async fn update_timestamp(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<i64>,
    Json(changes): Json<TimestampChanges>,
) -> ApiResult<AudioTimestamp> {
    Ok(ApiResponse::success(
        state.audio.update_timestamp(&scope, id, changes).await?,
    ))
}

/// DELETE /api/v1/audio/timestamps/:id
pub async fn delete_timestamp(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    state.audio.delete_timestamp(&scope, id).await?;
    Ok(ApiResponse::no_content())
}
