//! Books, chapters and verses.
//!
//! Books carry `tenant_id`; chapters and verses are scoped by joining up to
//! their book.

use serde::Deserialize;
use sqlx::PgPool;

use crate::database::models::{Book, Chapter, Verse};
use crate::tenant::TenantScope;

use super::{invalid, owner_of, require_min, require_text, Page, ServiceError, ServiceResult};

pub(crate) const BOOK_OWNER: &str = "SELECT tenant_id FROM books WHERE id = $1";
pub(crate) const CHAPTER_OWNER: &str =
    "SELECT b.tenant_id FROM chapters c JOIN books b ON b.id = c.book_id WHERE c.id = $1";
pub(crate) const VERSE_OWNER: &str = "SELECT b.tenant_id FROM verses v \
     JOIN chapters c ON c.id = v.chapter_id JOIN books b ON b.id = c.book_id WHERE v.id = $1";

#[derive(Debug, Deserialize)]
pub struct NewBook {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub language: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BookChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewChapter {
    pub book: i64,
    pub title: String,
    pub number: i32,
    pub juz: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChapterChanges {
    pub title: Option<String>,
    pub number: Option<i32>,
    pub juz: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct NewVerse {
    pub chapter: i64,
    pub number: i32,
    pub text: String,
    #[serde(default)]
    pub translation: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerseChanges {
    pub number: Option<i32>,
    pub text: Option<String>,
    pub translation: Option<String>,
}

impl NewBook {
    pub fn validate(&self) -> ServiceResult<()> {
        require_text("title", &self.title)?;
        validate_language(self.language.as_deref())
    }
}

impl BookChanges {
    pub fn validate(&self) -> ServiceResult<()> {
        if let Some(title) = &self.title {
            require_text("title", title)?;
        }
        validate_language(self.language.as_deref())
    }
}

impl NewChapter {
    pub fn validate(&self) -> ServiceResult<()> {
        require_text("title", &self.title)?;
        require_min("number", self.number.into(), 1)?;
        if let Some(juz) = self.juz {
            require_min("juz", juz.into(), 0)?;
        }
        Ok(())
    }
}

impl ChapterChanges {
    pub fn validate(&self) -> ServiceResult<()> {
        if let Some(title) = &self.title {
            require_text("title", title)?;
        }
        if let Some(number) = self.number {
            require_min("number", number.into(), 1)?;
        }
        if let Some(juz) = self.juz {
            require_min("juz", juz.into(), 0)?;
        }
        Ok(())
    }
}

impl NewVerse {
    pub fn validate(&self) -> ServiceResult<()> {
        require_text("text", &self.text)?;
        require_min("number", self.number.into(), 0)
    }
}

impl VerseChanges {
    pub fn validate(&self) -> ServiceResult<()> {
        if let Some(text) = &self.text {
            require_text("text", text)?;
        }
        if let Some(number) = self.number {
            require_min("number", number.into(), 0)?;
        }
        Ok(())
    }
}

fn validate_language(language: Option<&str>) -> ServiceResult<()> {
    match language {
        Some(l) if l.trim().is_empty() || l.len() > 50 => Err(invalid("language", "must be 1 to 50 characters")),
        _ => Ok(()),
    }
}

/// Tenant-scoped access to the book catalog
#[derive(Clone)]
pub struct CatalogService {
    pool: PgPool,
}

impl CatalogService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Books

    pub async fn list_books(&self, scope: &TenantScope, page: Page) -> ServiceResult<Vec<Book>> {
        let Some(tenant_id) = scope.read_filter() else {
            return Ok(Vec::new());
        };

        let books = sqlx::query_as::<_, Book>(
            "SELECT id, tenant_id, title, description, language, created_at FROM books
             WHERE tenant_id = $1 ORDER BY id LIMIT $2 OFFSET $3",
        )
        .bind(tenant_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    pub async fn get_book(&self, scope: &TenantScope, id: i64) -> ServiceResult<Book> {
        let not_found = ServiceError::NotFound { entity: "Book", id };
        let Some(tenant_id) = scope.read_filter() else {
            return Err(not_found);
        };

        sqlx::query_as::<_, Book>(
            "SELECT id, tenant_id, title, description, language, created_at FROM books
             WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(not_found)
    }

    pub async fn create_book(&self, scope: &TenantScope, input: NewBook) -> ServiceResult<Book> {
        let tenant_id = scope.require_for_write()?;
        input.validate()?;

        let book = sqlx::query_as::<_, Book>(
            "INSERT INTO books (tenant_id, title, description, language)
             VALUES ($1, $2, $3, COALESCE($4, 'ar'))
             RETURNING id, tenant_id, title, description, language, created_at",
        )
        .bind(tenant_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.language)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("Created book {} for tenant {}", book.id, tenant_id);
        Ok(book)
    }

    pub async fn update_book(&self, scope: &TenantScope, id: i64, changes: BookChanges) -> ServiceResult<Book> {
        let tenant_id = scope.require_for_write()?;
        changes.validate()?;

        sqlx::query_as::<_, Book>(
            "UPDATE books SET
                 title = COALESCE($3, title),
                 description = COALESCE($4, description),
                 language = COALESCE($5, language)
             WHERE id = $1 AND tenant_id = $2
             RETURNING id, tenant_id, title, description, language, created_at",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(&changes.language)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ServiceError::NotFound { entity: "Book", id })
    }

    pub async fn delete_book(&self, scope: &TenantScope, id: i64) -> ServiceResult<()> {
        let tenant_id = scope.require_for_write()?;

        let result = sqlx::query("DELETE FROM books WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound { entity: "Book", id });
        }
        Ok(())
    }

    // Chapters

    pub async fn list_chapters(
        &self,
        scope: &TenantScope,
        book: Option<i64>,
        page: Page,
    ) -> ServiceResult<Vec<Chapter>> {
        let Some(tenant_id) = scope.read_filter() else {
            return Ok(Vec::new());
        };

        let chapters = sqlx::query_as::<_, Chapter>(
            "SELECT c.id, c.book_id, c.title, c.number, c.juz
             FROM chapters c JOIN books b ON b.id = c.book_id
             WHERE b.tenant_id = $1 AND ($2::BIGINT IS NULL OR c.book_id = $2)
             ORDER BY c.book_id, c.number, c.id LIMIT $3 OFFSET $4",
        )
        .bind(tenant_id)
        .bind(book)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(chapters)
    }

    pub async fn get_chapter(&self, scope: &TenantScope, id: i64) -> ServiceResult<Chapter> {
        let not_found = ServiceError::NotFound { entity: "Chapter", id };
        let Some(tenant_id) = scope.read_filter() else {
            return Err(not_found);
        };

        sqlx::query_as::<_, Chapter>(
            "SELECT c.id, c.book_id, c.title, c.number, c.juz
             FROM chapters c JOIN books b ON b.id = c.book_id
             WHERE c.id = $1 AND b.tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(not_found)
    }

    pub async fn create_chapter(&self, scope: &TenantScope, input: NewChapter) -> ServiceResult<Chapter> {
        scope.require_for_write()?;
        input.validate()?;
        scope.ensure_owned("book", input.book, owner_of(&self.pool, BOOK_OWNER, input.book).await?)?;

        let chapter = sqlx::query_as::<_, Chapter>(
            "INSERT INTO chapters (book_id, title, number, juz) VALUES ($1, $2, $3, $4)
             RETURNING id, book_id, title, number, juz",
        )
        .bind(input.book)
        .bind(&input.title)
        .bind(input.number)
        .bind(input.juz)
        .fetch_one(&self.pool)
        .await?;
        Ok(chapter)
    }

    pub async fn update_chapter(
        &self,
        scope: &TenantScope,
        id: i64,
        changes: ChapterChanges,
    ) -> ServiceResult<Chapter> {
        let tenant_id = scope.require_for_write()?;
        changes.validate()?;

        sqlx::query_as::<_, Chapter>(
            "UPDATE chapters c SET
                 title = COALESCE($3, c.title),
                 number = COALESCE($4, c.number),
                 juz = COALESCE($5, c.juz)
             FROM books b
             WHERE c.id = $1 AND b.id = c.book_id AND b.tenant_id = $2
             RETURNING c.id, c.book_id, c.title, c.number, c.juz",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(&changes.title)
        .bind(changes.number)
        .bind(changes.juz)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ServiceError::NotFound { entity: "Chapter", id })
    }

    pub async fn delete_chapter(&self, scope: &TenantScope, id: i64) -> ServiceResult<()> {
        let tenant_id = scope.require_for_write()?;

        let result = sqlx::query(
            "DELETE FROM chapters c USING books b
             WHERE c.id = $1 AND b.id = c.book_id AND b.tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound { entity: "Chapter", id });
        }
        Ok(())
    }

    // Verses

    pub async fn list_verses(
        &self,
        scope: &TenantScope,
        chapter: Option<i64>,
        page: Page,
    ) -> ServiceResult<Vec<Verse>> {
        let Some(tenant_id) = scope.read_filter() else {
            return Ok(Vec::new());
        };

        let verses = sqlx::query_as::<_, Verse>(
            "SELECT v.id, v.chapter_id, v.number, v.text, v.translation
             FROM verses v
             JOIN chapters c ON c.id = v.chapter_id
             JOIN books b ON b.id = c.book_id
             WHERE b.tenant_id = $1 AND ($2::BIGINT IS NULL OR v.chapter_id = $2)
             ORDER BY v.chapter_id, v.number LIMIT $3 OFFSET $4",
        )
        .bind(tenant_id)
        .bind(chapter)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(verses)
    }

    pub async fn get_verse(&self, scope: &TenantScope, id: i64) -> ServiceResult<Verse> {
        let not_found = ServiceError::NotFound { entity: "Verse", id };
        let Some(tenant_id) = scope.read_filter() else {
            return Err(not_found);
        };

        sqlx::query_as::<_, Verse>(
            "SELECT v.id, v.chapter_id, v.number, v.text, v.translation
             FROM verses v
             JOIN chapters c ON c.id = v.chapter_id
             JOIN books b ON b.id = c.book_id
             WHERE v.id = $1 AND b.tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(not_found)
    }

    pub async fn create_verse(&self, scope: &TenantScope, input: NewVerse) -> ServiceResult<Verse> {
        scope.require_for_write()?;
        input.validate()?;
        scope.ensure_owned(
            "chapter",
            input.chapter,
            owner_of(&self.pool, CHAPTER_OWNER, input.chapter).await?,
        )?;

        let verse = sqlx::query_as::<_, Verse>(
            "INSERT INTO verses (chapter_id, number, text, translation) VALUES ($1, $2, $3, $4)
             RETURNING id, chapter_id, number, text, translation",
        )
        .bind(input.chapter)
        .bind(input.number)
        .bind(&input.text)
        .bind(&input.translation)
        .fetch_one(&self.pool)
        .await?;
        Ok(verse)
    }

    pub async fn update_verse(&self, scope: &TenantScope, id: i64, changes: VerseChanges) -> ServiceResult<Verse> {
        let tenant_id = scope.require_for_write()?;
        changes.validate()?;

        sqlx::query_as::<_, Verse>(
            "UPDATE verses v SET
                 number = COALESCE($3, v.number),
                 text = COALESCE($4, v.text),
                 translation = COALESCE($5, v.translation)
             FROM chapters c JOIN books b ON b.id = c.book_id
             WHERE v.id = $1 AND c.id = v.chapter_id AND b.tenant_id = $2
             RETURNING v.id, v.chapter_id, v.number, v.text, v.translation",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(changes.number)
        .bind(&changes.text)
        .bind(&changes.translation)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ServiceError::NotFound { entity: "Verse", id })
    }

    pub async fn delete_verse(&self, scope: &TenantScope, id: i64) -> ServiceResult<()> {
        let tenant_id = scope.require_for_write()?;

        let result = sqlx::query(
            "DELETE FROM verses v USING chapters c, books b
             WHERE v.id = $1 AND c.id = v.chapter_id AND b.id = c.book_id AND b.tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound { entity: "Verse", id });
        }
        Ok(())
    }
}
