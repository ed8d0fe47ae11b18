//! Idempotent DDL for the shared database. Every tenant-owned table either
//! carries `tenant_id` or hangs off a table that does.

use sqlx::PgPool;
use tracing::info;

use super::manager::DatabaseError;

const SCHEMA: &[(&str, &str)] = &[
    (
        "tenants",
        r#"
        CREATE TABLE IF NOT EXISTS tenants (
            id BIGSERIAL PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE,
            domain VARCHAR(255) NOT NULL UNIQUE,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "books",
        r#"
        CREATE TABLE IF NOT EXISTS books (
            id BIGSERIAL PRIMARY KEY,
            tenant_id BIGINT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
            title VARCHAR(255) NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            language VARCHAR(50) NOT NULL DEFAULT 'ar',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "chapters",
        r#"
        CREATE TABLE IF NOT EXISTS chapters (
            id BIGSERIAL PRIMARY KEY,
            book_id BIGINT NOT NULL REFERENCES books(id) ON DELETE CASCADE,
            title VARCHAR(255) NOT NULL,
            number INTEGER NOT NULL CHECK (number >= 1),
            juz INTEGER CHECK (juz >= 0)
        )
        "#,
    ),
    (
        "verses",
        r#"
        CREATE TABLE IF NOT EXISTS verses (
            id BIGSERIAL PRIMARY KEY,
            chapter_id BIGINT NOT NULL REFERENCES chapters(id) ON DELETE CASCADE,
            number INTEGER NOT NULL CHECK (number >= 0),
            text TEXT NOT NULL,
            translation TEXT NOT NULL DEFAULT '',
            UNIQUE (chapter_id, number)
        )
        "#,
    ),
    (
        "reciters",
        r#"
        CREATE TABLE IF NOT EXISTS reciters (
            id BIGSERIAL PRIMARY KEY,
            tenant_id BIGINT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
            name VARCHAR(255) NOT NULL,
            language VARCHAR(50) NOT NULL DEFAULT 'ar',
            bio TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (tenant_id, name)
        )
        "#,
    ),
    (
        "chapter_audios",
        r#"
        CREATE TABLE IF NOT EXISTS chapter_audios (
            id BIGSERIAL PRIMARY KEY,
            chapter_id BIGINT NOT NULL REFERENCES chapters(id) ON DELETE CASCADE,
            reciter_id BIGINT NOT NULL REFERENCES reciters(id) ON DELETE CASCADE,
            external_url TEXT,
            file_path TEXT,
            duration_seconds INTEGER CHECK (duration_seconds >= 0),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (chapter_id, reciter_id)
        )
        "#,
    ),
    (
        "audio_timestamps",
        r#"
        CREATE TABLE IF NOT EXISTS audio_timestamps (
            id BIGSERIAL PRIMARY KEY,
            chapter_audio_id BIGINT NOT NULL REFERENCES chapter_audios(id) ON DELETE CASCADE,
            verse_id BIGINT NOT NULL REFERENCES verses(id) ON DELETE CASCADE,
            start_time DOUBLE PRECISION NOT NULL,
            end_time DOUBLE PRECISION,
            UNIQUE (chapter_audio_id, verse_id)
        )
        "#,
    ),
    (
        "users",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id BIGSERIAL PRIMARY KEY,
            tenant_id BIGINT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
            username VARCHAR(150) NOT NULL,
            email VARCHAR(254) NOT NULL DEFAULT '',
            bio TEXT NOT NULL DEFAULT '',
            password_hash TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (tenant_id, username)
        )
        "#,
    ),
    (
        "user_notes",
        r#"
        CREATE TABLE IF NOT EXISTS user_notes (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            verse_id BIGINT NOT NULL REFERENCES verses(id) ON DELETE CASCADE,
            text TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (user_id, verse_id)
        )
        "#,
    ),
    (
        "bookmarks",
        r#"
        CREATE TABLE IF NOT EXISTS bookmarks (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            book_id BIGINT NOT NULL REFERENCES books(id) ON DELETE CASCADE,
            chapter_id BIGINT REFERENCES chapters(id) ON DELETE CASCADE,
            verse_id BIGINT REFERENCES verses(id) ON DELETE CASCADE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "play_history",
        r#"
        CREATE TABLE IF NOT EXISTS play_history (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            chapter_audio_id BIGINT NOT NULL REFERENCES chapter_audios(id) ON DELETE CASCADE,
            last_position DOUBLE PRECISION NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (user_id, chapter_audio_id)
        )
        "#,
    ),
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS books_tenant_idx ON books (tenant_id)",
    "CREATE INDEX IF NOT EXISTS chapters_book_idx ON chapters (book_id)",
    "CREATE INDEX IF NOT EXISTS reciters_tenant_idx ON reciters (tenant_id)",
    "CREATE INDEX IF NOT EXISTS users_tenant_idx ON users (tenant_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS bookmarks_target_idx ON bookmarks \
     (user_id, book_id, COALESCE(chapter_id, 0), COALESCE(verse_id, 0))",
];

/// Advisory lock key held while the schema is applied.
const SCHEMA_LOCK_KEY: i64 = 0x6c65_6374_6572_6e;

/// Create all tables and indexes if they do not exist yet.
///
/// Concurrent callers are serialized on a transaction-scoped advisory lock.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), DatabaseError> {
    let mut tx = pool.begin().await?;
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(SCHEMA_LOCK_KEY)
        .execute(&mut *tx)
        .await?;
    for (table, ddl) in SCHEMA {
        sqlx::query(ddl).execute(&mut *tx).await?;
        tracing::debug!("ensured table {}", table);
    }
    for ddl in INDEXES {
        sqlx::query(ddl).execute(&mut *tx).await?;
    }
    tx.commit().await?;

    info!("Database schema ready ({} tables)", SCHEMA.len());
    Ok(())
}

/// Table names in creation order.
pub fn tables() -> impl Iterator<Item = &'static str> {
    SCHEMA.iter().map(|(table, _)| *table)
}
