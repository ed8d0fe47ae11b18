use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: i64,
    pub tenant_id: i64,
    pub title: String,
    pub description: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Chapter {
    pub id: i64,
    pub book_id: i64,
    pub title: String,
    pub number: i32,
    pub juz: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Verse {
    pub id: i64,
    pub chapter_id: i64,
    pub number: i32,
    pub text: String,
    pub translation: String,
}
