//! Per-user notes, bookmarks and play history.
//!
//! Every query is narrowed twice: to the signed-in user and to the user's
//! tenant through `users.tenant_id`.

use serde::Deserialize;
use sqlx::PgPool;

use crate::database::models::{Bookmark, PlayHistory, UserNote};
use crate::middleware::AuthUser;
use crate::tenant::TenantScope;

use super::audio_service::CHAPTER_AUDIO_OWNER;
use super::catalog_service::{BOOK_OWNER, CHAPTER_OWNER, VERSE_OWNER};
use super::{invalid, owner_of, require_text, Page, ServiceError, ServiceResult};

const NOTE_COLUMNS: &str = "n.id, n.user_id, n.verse_id, n.text, n.created_at, n.updated_at";
const BOOKMARK_COLUMNS: &str = "m.id, m.user_id, m.book_id, m.chapter_id, m.verse_id, m.created_at";
const HISTORY_COLUMNS: &str = "h.id, h.user_id, h.chapter_audio_id, h.last_position, h.created_at, h.updated_at";

#[derive(Debug, Deserialize)]
pub struct NewNote {
    pub verse: i64,
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NoteChanges {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewBookmark {
    pub book: i64,
    pub chapter: Option<i64>,
    pub verse: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct NewPlayHistory {
    pub chapter_audio: i64,
    #[serde(default)]
    pub last_position: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlayHistoryChanges {
    pub last_position: Option<f64>,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct LibraryFilter {
    pub verse: Option<i64>,
    pub book: Option<i64>,
    pub chapter_audio: Option<i64>,
}

const CHAPTER_BOOK: &str = "SELECT book_id FROM chapters WHERE id = $1";
const VERSE_PARENTS: &str =
    "SELECT v.chapter_id, c.book_id FROM verses v JOIN chapters c ON c.id = v.chapter_id WHERE v.id = $1";

/// A bookmark's chapter must sit in its book, and its verse in its chapter
/// (or in its book when no chapter is given).
///
/// `chapter_book` is the chapter's `book_id`; `verse_parents` is the verse's
/// `(chapter_id, book_id)`.
fn check_bookmark_path(
    input: &NewBookmark,
    chapter_book: Option<i64>,
    verse_parents: Option<(i64, i64)>,
) -> ServiceResult<()> {
    if let Some(chapter) = input.chapter {
        if chapter_book != Some(input.book) {
            return Err(invalid("chapter", format!("{} is not part of book {}", chapter, input.book)));
        }
    }
    if let Some(verse) = input.verse {
        let fits = match (input.chapter, verse_parents) {
            (Some(chapter), Some((verse_chapter, _))) => verse_chapter == chapter,
            (None, Some((_, verse_book))) => verse_book == input.book,
            (_, None) => false,
        };
        if !fits {
            return Err(invalid("verse", format!("{} is not part of the bookmarked chapter or book", verse)));
        }
    }
    Ok(())
}

fn validate_position(position: f64) -> ServiceResult<()> {
    if !position.is_finite() || position < 0.0 {
        return Err(invalid("last_position", "must be a non-negative number of seconds"));
    }
    Ok(())
}

/// Tenant and user scoped annotations
#[derive(Clone)]
pub struct LibraryService {
    pool: PgPool,
}

impl LibraryService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Notes

    pub async fn list_notes(
        &self,
        scope: &TenantScope,
        user: &AuthUser,
        filter: LibraryFilter,
        page: Page,
    ) -> ServiceResult<Vec<UserNote>> {
        let Some(tenant_id) = scope.read_filter() else {
            return Ok(Vec::new());
        };

        let sql = format!(
            "SELECT {} FROM user_notes n JOIN users u ON u.id = n.user_id
             WHERE u.tenant_id = $1 AND n.user_id = $2 AND ($3::BIGINT IS NULL OR n.verse_id = $3)
             ORDER BY n.updated_at DESC, n.id LIMIT $4 OFFSET $5",
            NOTE_COLUMNS
        );
        let notes = sqlx::query_as::<_, UserNote>(&sql)
            .bind(tenant_id)
            .bind(user.user_id)
            .bind(filter.verse)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;
        Ok(notes)
    }

    pub async fn get_note(&self, scope: &TenantScope, user: &AuthUser, id: i64) -> ServiceResult<UserNote> {
        let not_found = ServiceError::NotFound { entity: "Note", id };
        let Some(tenant_id) = scope.read_filter() else {
            return Err(not_found);
        };

        let sql = format!(
            "SELECT {} FROM user_notes n JOIN users u ON u.id = n.user_id
             WHERE n.id = $1 AND u.tenant_id = $2 AND n.user_id = $3",
            NOTE_COLUMNS
        );
        sqlx::query_as::<_, UserNote>(&sql)
            .bind(id)
            .bind(tenant_id)
            .bind(user.user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(not_found)
    }

    pub async fn create_note(&self, scope: &TenantScope, user: &AuthUser, input: NewNote) -> ServiceResult<UserNote> {
        scope.require_for_write()?;
        require_text("text", &input.text)?;
        scope.ensure_owned("verse", input.verse, owner_of(&self.pool, VERSE_OWNER, input.verse).await?)?;

        let note = sqlx::query_as::<_, UserNote>(
            "INSERT INTO user_notes (user_id, verse_id, text) VALUES ($1, $2, $3)
             RETURNING id, user_id, verse_id, text, created_at, updated_at",
        )
        .bind(user.user_id)
        .bind(input.verse)
        .bind(&input.text)
        .fetch_one(&self.pool)
        .await?;
        Ok(note)
    }

    pub async fn update_note(
        &self,
        scope: &TenantScope,
        user: &AuthUser,
        id: i64,
        changes: NoteChanges,
    ) -> ServiceResult<UserNote> {
        let tenant_id = scope.require_for_write()?;
        if let Some(text) = &changes.text {
            require_text("text", text)?;
        }

        let sql = format!(
            "UPDATE user_notes n SET text = COALESCE($4, n.text), updated_at = NOW()
             FROM users u
             WHERE n.id = $1 AND u.id = n.user_id AND u.tenant_id = $2 AND n.user_id = $3
             RETURNING {}",
            NOTE_COLUMNS
        );
        sqlx::query_as::<_, UserNote>(&sql)
            .bind(id)
            .bind(tenant_id)
            .bind(user.user_id)
            .bind(&changes.text)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServiceError::NotFound { entity: "Note", id })
    }

    pub async fn delete_note(&self, scope: &TenantScope, user: &AuthUser, id: i64) -> ServiceResult<()> {
        let tenant_id = scope.require_for_write()?;

        let result = sqlx::query(
            "DELETE FROM user_notes n USING users u
             WHERE n.id = $1 AND u.id = n.user_id AND u.tenant_id = $2 AND n.user_id = $3",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(user.user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound { entity: "Note", id });
        }
        Ok(())
    }

    // Bookmarks

    pub async fn list_bookmarks(
        &self,
        scope: &TenantScope,
        user: &AuthUser,
        filter: LibraryFilter,
        page: Page,
    ) -> ServiceResult<Vec<Bookmark>> {
        let Some(tenant_id) = scope.read_filter() else {
            return Ok(Vec::new());
        };

        let sql = format!(
            "SELECT {} FROM bookmarks m JOIN users u ON u.id = m.user_id
             WHERE u.tenant_id = $1 AND m.user_id = $2 AND ($3::BIGINT IS NULL OR m.book_id = $3)
             ORDER BY m.created_at DESC, m.id LIMIT $4 OFFSET $5",
            BOOKMARK_COLUMNS
        );
        let bookmarks = sqlx::query_as::<_, Bookmark>(&sql)
            .bind(tenant_id)
            .bind(user.user_id)
            .bind(filter.book)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;
        Ok(bookmarks)
    }

    pub async fn get_bookmark(&self, scope: &TenantScope, user: &AuthUser, id: i64) -> ServiceResult<Bookmark> {
        let not_found = ServiceError::NotFound { entity: "Bookmark", id };
        let Some(tenant_id) = scope.read_filter() else {
            return Err(not_found);
        };

        let sql = format!(
            "SELECT {} FROM bookmarks m JOIN users u ON u.id = m.user_id
             WHERE m.id = $1 AND u.tenant_id = $2 AND m.user_id = $3",
            BOOKMARK_COLUMNS
        );
        sqlx::query_as::<_, Bookmark>(&sql)
            .bind(id)
            .bind(tenant_id)
            .bind(user.user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(not_found)
    }

    pub async fn create_bookmark(
        &self,
        scope: &TenantScope,
        user: &AuthUser,
        input: NewBookmark,
    ) -> ServiceResult<Bookmark> {
        scope.require_for_write()?;
        scope.ensure_owned("book", input.book, owner_of(&self.pool, BOOK_OWNER, input.book).await?)?;
        if let Some(chapter) = input.chapter {
            scope.ensure_owned("chapter", chapter, owner_of(&self.pool, CHAPTER_OWNER, chapter).await?)?;
        }
        if let Some(verse) = input.verse {
            scope.ensure_owned("verse", verse, owner_of(&self.pool, VERSE_OWNER, verse).await?)?;
        }

        let chapter_book = match input.chapter {
            Some(chapter) => sqlx::query_scalar::<_, i64>(CHAPTER_BOOK)
                .bind(chapter)
                .fetch_optional(&self.pool)
                .await?,
            None => None,
        };
        let verse_parents = match input.verse {
            Some(verse) => sqlx::query_as::<_, (i64, i64)>(VERSE_PARENTS)
                .bind(verse)
                .fetch_optional(&self.pool)
                .await?,
            None => None,
        };
        check_bookmark_path(&input, chapter_book, verse_parents)?;

        let bookmark = sqlx::query_as::<_, Bookmark>(
            "INSERT INTO bookmarks (user_id, book_id, chapter_id, verse_id) VALUES ($1, $2, $3, $4)
             RETURNING id, user_id, book_id, chapter_id, verse_id, created_at",
        )
        .bind(user.user_id)
        .bind(input.book)
        .bind(input.chapter)
        .bind(input.verse)
        .fetch_one(&self.pool)
        .await?;
        Ok(bookmark)
    }

    pub async fn delete_bookmark(&self, scope: &TenantScope, user: &AuthUser, id: i64) -> ServiceResult<()> {
        let tenant_id = scope.require_for_write()?;

        let result = sqlx::query(
            "DELETE FROM bookmarks m USING users u
             WHERE m.id = $1 AND u.id = m.user_id AND u.tenant_id = $2 AND m.user_id = $3",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(user.user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound { entity: "Bookmark", id });
        }
        Ok(())
    }

    // Play history

    pub async fn list_history(
        &self,
        scope: &TenantScope,
        user: &AuthUser,
        filter: LibraryFilter,
        page: Page,
    ) -> ServiceResult<Vec<PlayHistory>> {
        let Some(tenant_id) = scope.read_filter() else {
            return Ok(Vec::new());
        };

        let sql = format!(
            "SELECT {} FROM play_history h JOIN users u ON u.id = h.user_id
             WHERE u.tenant_id = $1 AND h.user_id = $2 AND ($3::BIGINT IS NULL OR h.chapter_audio_id = $3)
             ORDER BY h.updated_at DESC, h.id LIMIT $4 OFFSET $5",
            HISTORY_COLUMNS
        );
        let history = sqlx::query_as::<_, PlayHistory>(&sql)
            .bind(tenant_id)
            .bind(user.user_id)
            .bind(filter.chapter_audio)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;
        Ok(history)
    }

    pub async fn get_history(&self, scope: &TenantScope, user: &AuthUser, id: i64) -> ServiceResult<PlayHistory> {
        let not_found = ServiceError::NotFound { entity: "Play history", id };
        let Some(tenant_id) = scope.read_filter() else {
            return Err(not_found);
        };

        let sql = format!(
            "SELECT {} FROM play_history h JOIN users u ON u.id = h.user_id
             WHERE h.id = $1 AND u.tenant_id = $2 AND h.user_id = $3",
            HISTORY_COLUMNS
        );
        sqlx::query_as::<_, PlayHistory>(&sql)
            .bind(id)
            .bind(tenant_id)
            .bind(user.user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(not_found)
    }

    pub async fn create_history(
        &self,
        scope: &TenantScope,
        user: &AuthUser,
        input: NewPlayHistory,
    ) -> ServiceResult<PlayHistory> {
        scope.require_for_write()?;
        validate_position(input.last_position)?;
        scope.ensure_owned(
            "chapter_audio",
            input.chapter_audio,
            owner_of(&self.pool, CHAPTER_AUDIO_OWNER, input.chapter_audio).await?,
        )?;

        let entry = sqlx::query_as::<_, PlayHistory>(
            "INSERT INTO play_history (user_id, chapter_audio_id, last_position) VALUES ($1, $2, $3)
             RETURNING id, user_id, chapter_audio_id, last_position, created_at, updated_at",
        )
        .bind(user.user_id)
        .bind(input.chapter_audio)
        .bind(input.last_position)
        .fetch_one(&self.pool)
        .await?;
        Ok(entry)
    }

    pub async fn update_history(
        &self,
        scope: &TenantScope,
        user: &AuthUser,
        id: i64,
        changes: PlayHistoryChanges,
    ) -> ServiceResult<PlayHistory> {
        let tenant_id = scope.require_for_write()?;
        if let Some(position) = changes.last_position {
            validate_position(position)?;
        }

        let sql = format!(
            "UPDATE play_history h SET last_position = COALESCE($4, h.last_position), updated_at = NOW()
             FROM users u
             WHERE h.id = $1 AND u.id = h.user_id AND u.tenant_id = $2 AND h.user_id = $3
             RETURNING {}",
            HISTORY_COLUMNS
        );
        sqlx::query_as::<_, PlayHistory>(&sql)
            .bind(id)
            .bind(tenant_id)
            .bind(user.user_id)
            .bind(changes.last_position)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServiceError::NotFound { entity: "Play history", id })
    }

    pub async fn delete_history(&self, scope: &TenantScope, user: &AuthUser, id: i64) -> ServiceResult<()> {
        let tenant_id = scope.require_for_write()?;

        let result = sqlx::query(
            "DELETE FROM play_history h USING users u
             WHERE h.id = $1 AND u.id = h.user_id AND u.tenant_id = $2 AND h.user_id = $3",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(user.user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound { entity: "Play history", id });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_must_be_non_negative() {
        assert!(validate_position(0.0).is_ok());
        assert!(validate_position(12.5).is_ok());
        assert!(validate_position(-0.1).is_err());
        assert!(validate_position(f64::INFINITY).is_err());
    }

    fn bookmark(book: i64, chapter: Option<i64>, verse: Option<i64>) -> NewBookmark {
        NewBookmark { book, chapter, verse }
    }

    #[test]
    fn bookmark_chapter_must_belong_to_book() {
        assert!(check_bookmark_path(&bookmark(1, Some(10), None), Some(1), None).is_ok());

        let err = check_bookmark_path(&bookmark(1, Some(20), None), Some(2), None).unwrap_err();
        assert!(matches!(err, ServiceError::Validation { field: "chapter", .. }));
    }

    #[test]
    fn bookmark_verse_must_belong_to_chapter_or_book() {
        assert!(check_bookmark_path(&bookmark(1, Some(10), Some(100)), Some(1), Some((10, 1))).is_ok());
        assert!(check_bookmark_path(&bookmark(1, None, Some(100)), None, Some((10, 1))).is_ok());

        let err = check_bookmark_path(&bookmark(1, Some(10), Some(200)), Some(1), Some((20, 1))).unwrap_err();
        assert!(matches!(err, ServiceError::Validation { field: "verse", .. }));

        let err = check_bookmark_path(&bookmark(1, None, Some(200)), None, Some((20, 2))).unwrap_err();
        assert!(matches!(err, ServiceError::Validation { field: "verse", .. }));
    }

    #[test]
    fn bookmark_target_is_optional_below_book() {
        let bookmark: NewBookmark = serde_json::from_str(r#"{"book": 3}"#).unwrap();
        assert_eq!(bookmark.book, 3);
        assert_eq!(bookmark.chapter, None);
        assert_eq!(bookmark.verse, None);
    }
}
