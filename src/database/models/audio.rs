use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reciter {
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
    pub language: String,
    pub bio: String,
    pub created_at: DateTime<Utc>,
}

/// One reciter's recording of one chapter.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChapterAudio {
    pub id: i64,
    pub chapter_id: i64,
    pub reciter_id: i64,
    pub external_url: Option<String>,
    pub file_path: Option<String>,
    pub duration_seconds: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Offset of a verse inside a chapter recording, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AudioTimestamp {
    pub id: i64,
    pub chapter_audio_id: i64,
    pub verse_id: i64,
    pub start_time: f64,
    pub end_time: Option<f64>,
}
