//! Reciters, chapter recordings and verse timestamps.
//!
//! Reciters carry `tenant_id`. A chapter recording belongs to its reciter's
//! tenant and its chapter is re-checked against the same tenant on create.

use serde::Deserialize;
use sqlx::PgPool;

use crate::database::models::{AudioTimestamp, ChapterAudio, Reciter};
use crate::tenant::TenantScope;

use super::catalog_service::{CHAPTER_OWNER, VERSE_OWNER};
use super::{invalid, owner_of, require_text, Page, ServiceError, ServiceResult};

const RECITER_OWNER: &str = "SELECT tenant_id FROM reciters WHERE id = $1";
pub(crate) const CHAPTER_AUDIO_OWNER: &str =
    "SELECT r.tenant_id FROM chapter_audios a JOIN reciters r ON r.id = a.reciter_id WHERE a.id = $1";

const AUDIO_COLUMNS: &str =
    "a.id, a.chapter_id, a.reciter_id, a.external_url, a.file_path, a.duration_seconds, a.created_at";
const TIMESTAMP_COLUMNS: &str = "t.id, t.chapter_audio_id, t.verse_id, t.start_time, t.end_time";

#[derive(Debug, Deserialize)]
pub struct NewReciter {
    pub name: String,
    pub language: Option<String>,
    #[serde(default)]
    pub bio: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReciterChanges {
    pub name: Option<String>,
    pub language: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewChapterAudio {
    pub chapter: i64,
    pub reciter: i64,
    pub external_url: Option<String>,
    pub file_path: Option<String>,
    pub duration_seconds: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChapterAudioChanges {
    pub external_url: Option<String>,
    pub file_path: Option<String>,
    pub duration_seconds: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct NewTimestamp {
    pub chapter_audio: i64,
    pub verse: i64,
    pub start_time: f64,
    pub end_time: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TimestampChanges {
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
}

impl NewReciter {
    pub fn validate(&self) -> ServiceResult<()> {
        require_text("name", &self.name)
    }
}

impl ReciterChanges {
    pub fn validate(&self) -> ServiceResult<()> {
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        Ok(())
    }
}

impl NewChapterAudio {
    pub fn validate(&self) -> ServiceResult<()> {
        validate_external_url(self.external_url.as_deref())?;
        validate_duration(self.duration_seconds)
    }
}

impl ChapterAudioChanges {
    pub fn validate(&self) -> ServiceResult<()> {
        validate_external_url(self.external_url.as_deref())?;
        validate_duration(self.duration_seconds)
    }
}

impl NewTimestamp {
    pub fn validate(&self) -> ServiceResult<()> {
        validate_times(self.start_time, self.end_time)
    }
}

fn validate_external_url(value: Option<&str>) -> ServiceResult<()> {
    match value {
        Some(raw) => url::Url::parse(raw)
            .map(|_| ())
            .map_err(|e| invalid("external_url", format!("not a valid absolute URL ({})", e))),
        None => Ok(()),
    }
}

fn validate_duration(duration: Option<i32>) -> ServiceResult<()> {
    match duration {
        Some(d) if d < 0 => Err(invalid("duration_seconds", "must not be negative")),
        _ => Ok(()),
    }
}

fn validate_times(start: f64, end: Option<f64>) -> ServiceResult<()> {
    if !start.is_finite() || start < 0.0 {
        return Err(invalid("start_time", "must be a non-negative number of seconds"));
    }
    match end {
        Some(end) if !end.is_finite() || end < start => {
            Err(invalid("end_time", "must not be earlier than start_time"))
        }
        _ => Ok(()),
    }
}

/// Tenant-scoped access to reciters and their recordings
#[derive(Clone)]
pub struct AudioService {
    pool: PgPool,
}

impl AudioService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Reciters

    pub async fn list_reciters(&self, scope: &TenantScope, page: Page) -> ServiceResult<Vec<Reciter>> {
        let Some(tenant_id) = scope.read_filter() else {
            return Ok(Vec::new());
        };

        let reciters = sqlx::query_as::<_, Reciter>(
            "SELECT id, tenant_id, name, language, bio, created_at FROM reciters
             WHERE tenant_id = $1 ORDER BY name, id LIMIT $2 OFFSET $3",
        )
        .bind(tenant_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(reciters)
    }

    pub async fn get_reciter(&self, scope: &TenantScope, id: i64) -> ServiceResult<Reciter> {
        let not_found = ServiceError::NotFound { entity: "Reciter", id };
        let Some(tenant_id) = scope.read_filter() else {
            return Err(not_found);
        };

        sqlx::query_as::<_, Reciter>(
            "SELECT id, tenant_id, name, language, bio, created_at FROM reciters
             WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(not_found)
    }

    pub async fn create_reciter(&self, scope: &TenantScope, input: NewReciter) -> ServiceResult<Reciter> {
        let tenant_id = scope.require_for_write()?;
        input.validate()?;

        let reciter = sqlx::query_as::<_, Reciter>(
            "INSERT INTO reciters (tenant_id, name, language, bio)
             VALUES ($1, $2, COALESCE($3, 'ar'), $4)
             RETURNING id, tenant_id, name, language, bio, created_at",
        )
        .bind(tenant_id)
        .bind(&input.name)
        .bind(&input.language)
        .bind(&input.bio)
        .fetch_one(&self.pool)
        .await?;
        Ok(reciter)
    }

    pub async fn update_reciter(
        &self,
        scope: &TenantScope,
        id: i64,
        changes: ReciterChanges,
    ) -> ServiceResult<Reciter> {
        let tenant_id = scope.require_for_write()?;
        changes.validate()?;

        sqlx::query_as::<_, Reciter>(
            "UPDATE reciters SET
                 name = COALESCE($3, name),
                 language = COALESCE($4, language),
                 bio = COALESCE($5, bio)
             WHERE id = $1 AND tenant_id = $2
             RETURNING id, tenant_id, name, language, bio, created_at",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(&changes.name)
        .bind(&changes.language)
        .bind(&changes.bio)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ServiceError::NotFound { entity: "Reciter", id })
    }

    pub async fn delete_reciter(&self, scope: &TenantScope, id: i64) -> ServiceResult<()> {
        let tenant_id = scope.require_for_write()?;

        let result = sqlx::query("DELETE FROM reciters WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound { entity: "Reciter", id });
        }
        Ok(())
    }

    // Chapter audio

    pub async fn list_chapter_audios(
        &self,
        scope: &TenantScope,
        chapter: Option<i64>,
        page: Page,
    ) -> ServiceResult<Vec<ChapterAudio>> {
        let Some(tenant_id) = scope.read_filter() else {
            return Ok(Vec::new());
        };

        let sql = format!(
            "SELECT {} FROM chapter_audios a JOIN reciters r ON r.id = a.reciter_id
             WHERE r.tenant_id = $1 AND ($2::BIGINT IS NULL OR a.chapter_id = $2)
             ORDER BY a.chapter_id, a.id LIMIT $3 OFFSET $4",
            AUDIO_COLUMNS
        );
        let audios = sqlx::query_as::<_, ChapterAudio>(&sql)
            .bind(tenant_id)
            .bind(chapter)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;
        Ok(audios)
    }

    pub async fn get_chapter_audio(&self, scope: &TenantScope, id: i64) -> ServiceResult<ChapterAudio> {
        let not_found = ServiceError::NotFound { entity: "Chapter audio", id };
        let Some(tenant_id) = scope.read_filter() else {
            return Err(not_found);
        };

        let sql = format!(
            "SELECT {} FROM chapter_audios a JOIN reciters r ON r.id = a.reciter_id
             WHERE a.id = $1 AND r.tenant_id = $2",
            AUDIO_COLUMNS
        );
        sqlx::query_as::<_, ChapterAudio>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(not_found)
    }

    pub async fn create_chapter_audio(
        &self,
        scope: &TenantScope,
        input: NewChapterAudio,
    ) -> ServiceResult<ChapterAudio> {
        scope.require_for_write()?;
        input.validate()?;
        scope.ensure_owned(
            "chapter",
            input.chapter,
            owner_of(&self.pool, CHAPTER_OWNER, input.chapter).await?,
        )?;
        scope.ensure_owned(
            "reciter",
            input.reciter,
            owner_of(&self.pool, RECITER_OWNER, input.reciter).await?,
        )?;

        let audio = sqlx::query_as::<_, ChapterAudio>(
            "INSERT INTO chapter_audios (chapter_id, reciter_id, external_url, file_path, duration_seconds)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, chapter_id, reciter_id, external_url, file_path, duration_seconds, created_at",
        )
        .bind(input.chapter)
        .bind(input.reciter)
        .bind(&input.external_url)
        .bind(&input.file_path)
        .bind(input.duration_seconds)
        .fetch_one(&self.pool)
        .await?;
        Ok(audio)
    }

    pub async fn update_chapter_audio(
        &self,
        scope: &TenantScope,
        id: i64,
        changes: ChapterAudioChanges,
    ) -> ServiceResult<ChapterAudio> {
        let tenant_id = scope.require_for_write()?;
        changes.validate()?;

        let sql = format!(
            "UPDATE chapter_audios a SET
                 external_url = COALESCE($3, a.external_url),
                 file_path = COALESCE($4, a.file_path),
                 duration_seconds = COALESCE($5, a.duration_seconds)
             FROM reciters r
             WHERE a.id = $1 AND r.id = a.reciter_id AND r.tenant_id = $2
             RETURNING {}",
            AUDIO_COLUMNS
        );
        sqlx::query_as::<_, ChapterAudio>(&sql)
            .bind(id)
            .bind(tenant_id)
            .bind(&changes.external_url)
            .bind(&changes.file_path)
            .bind(changes.duration_seconds)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServiceError::NotFound { entity: "Chapter audio", id })
    }

    pub async fn delete_chapter_audio(&self, scope: &TenantScope, id: i64) -> ServiceResult<()> {
        let tenant_id = scope.require_for_write()?;

        let result = sqlx::query(
            "DELETE FROM chapter_audios a USING reciters r
             WHERE a.id = $1 AND r.id = a.reciter_id AND r.tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound { entity: "Chapter audio", id });
        }
        Ok(())
    }

    // Timestamps

    pub async fn list_timestamps(
        &self,
        scope: &TenantScope,
        chapter_audio: Option<i64>,
        page: Page,
    ) -> ServiceResult<Vec<AudioTimestamp>> {
        let Some(tenant_id) = scope.read_filter() else {
            return Ok(Vec::new());
        };

        let sql = format!(
            "SELECT {} FROM audio_timestamps t
             JOIN chapter_audios a ON a.id = t.chapter_audio_id
             JOIN reciters r ON r.id = a.reciter_id
             WHERE r.tenant_id = $1 AND ($2::BIGINT IS NULL OR t.chapter_audio_id = $2)
             ORDER BY t.chapter_audio_id, t.start_time, t.id LIMIT $3 OFFSET $4",
            TIMESTAMP_COLUMNS
        );
        let timestamps = sqlx::query_as::<_, AudioTimestamp>(&sql)
            .bind(tenant_id)
            .bind(chapter_audio)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;
        Ok(timestamps)
    }

    pub async fn get_timestamp(&self, scope: &TenantScope, id: i64) -> ServiceResult<AudioTimestamp> {
        let not_found = ServiceError::NotFound { entity: "Timestamp", id };
        let Some(tenant_id) = scope.read_filter() else {
            return Err(not_found);
        };

        let sql = format!(
            "SELECT {} FROM audio_timestamps t
             JOIN chapter_audios a ON a.id = t.chapter_audio_id
             JOIN reciters r ON r.id = a.reciter_id
             WHERE t.id = $1 AND r.tenant_id = $2",
            TIMESTAMP_COLUMNS
        );
        sqlx::query_as::<_, AudioTimestamp>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(not_found)
    }

    pub async fn create_timestamp(&self, scope: &TenantScope, input: NewTimestamp) -> ServiceResult<AudioTimestamp> {
        scope.require_for_write()?;
        input.validate()?;
        scope.ensure_owned(
            "chapter_audio",
            input.chapter_audio,
            owner_of(&self.pool, CHAPTER_AUDIO_OWNER, input.chapter_audio).await?,
        )?;
        scope.ensure_owned("verse", input.verse, owner_of(&self.pool, VERSE_OWNER, input.verse).await?)?;

        let timestamp = sqlx::query_as::<_, AudioTimestamp>(
            "INSERT INTO audio_timestamps (chapter_audio_id, verse_id, start_time, end_time)
             VALUES ($1, $2, $3, $4)
             RETURNING id, chapter_audio_id, verse_id, start_time, end_time",
        )
        .bind(input.chapter_audio)
        .bind(input.verse)
        .bind(input.start_time)
        .bind(input.end_time)
        .fetch_one(&self.pool)
        .await?;
        Ok(timestamp)
    }

    pub async fn update_timestamp(
        &self,
        scope: &TenantScope,
        id: i64,
        changes: TimestampChanges,
    ) -> ServiceResult<AudioTimestamp> {
        let tenant_id = scope.require_for_write()?;
        // Validate against the merged row so a lone start_time cannot pass end_time
        let current = self.get_timestamp(scope, id).await?;
        let start = changes.start_time.unwrap_or(current.start_time);
        let end = changes.end_time.or(current.end_time);
        validate_times(start, end)?;

        let sql = format!(
            "UPDATE audio_timestamps t SET start_time = $3, end_time = $4
             FROM chapter_audios a JOIN reciters r ON r.id = a.reciter_id
             WHERE t.id = $1 AND a.id = t.chapter_audio_id AND r.tenant_id = $2
             RETURNING {}",
            TIMESTAMP_COLUMNS
        );
        sqlx::query_as::<_, AudioTimestamp>(&sql)
            .bind(id)
            .bind(tenant_id)
            .bind(start)
            .bind(end)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServiceError::NotFound { entity: "Timestamp", id })
    }

    pub async fn delete_timestamp(&self, scope: &TenantScope, id: i64) -> ServiceResult<()> {
        let tenant_id = scope.require_for_write()?;

        let result = sqlx::query(
            "DELETE FROM audio_timestamps t USING chapter_audios a, reciters r
             WHERE t.id = $1 AND a.id = t.chapter_audio_id AND r.id = a.reciter_id AND r.tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound { entity: "Timestamp", id });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_url_must_be_absolute() {
        assert!(validate_external_url(Some("https://cdn.example.com/001.mp3")).is_ok());
        assert!(validate_external_url(None).is_ok());
        assert!(matches!(
            validate_external_url(Some("/audio/001.mp3")),
            Err(ServiceError::Validation { field: "external_url", .. })
        ));
    }

    #[test]
    fn end_time_not_before_start() {
        assert!(validate_times(1.5, Some(3.0)).is_ok());
        assert!(validate_times(1.5, Some(1.5)).is_ok());
        assert!(validate_times(1.5, None).is_ok());
        assert!(matches!(
            validate_times(3.0, Some(1.0)),
            Err(ServiceError::Validation { field: "end_time", .. })
        ));
        assert!(validate_times(-1.0, None).is_err());
        assert!(validate_times(f64::NAN, None).is_err());
    }

    #[test]
    fn negative_duration_rejected() {
        let audio = NewChapterAudio {
            chapter: 1,
            reciter: 1,
            external_url: None,
            file_path: Some("audio/001.mp3".into()),
            duration_seconds: Some(-4),
        };
        assert!(audio.validate().is_err());
    }
}
