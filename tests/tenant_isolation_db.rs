//! Tenant isolation against a live PostgreSQL database.
//!
//! Every test returns early when `DATABASE_URL` is unset. Tenants get fresh
//! domains per run, so the suite can share a database with other runs.

mod common;

use anyhow::{Context, Result};
use axum::{http::StatusCode, Router};
use serde_json::{json, Value};

use common::{db_app, delete, fresh_tenant, get, post_json, put_json, send};
use lectern_api::tenant::TenantDirectory;

/// POST that must return 201; yields the new row's id.
async fn create(app: &Router, uri: &str, headers: &[(&str, &str)], body: Value) -> Result<i64> {
    let (status, body) = send(app, post_json(uri, headers, body)).await?;
    assert_eq!(status, StatusCode::CREATED, "POST {} returned {}", uri, body);
    body["data"]["id"].as_i64().context("created row has no id")
}

async fn assert_rejected_reference(
    app: &Router,
    uri: &str,
    headers: &[(&str, &str)],
    body: Value,
    field: &str,
) -> Result<()> {
    let (status, body) = send(app, post_json(uri, headers, body)).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "POST {} returned {}", uri, body);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["field_errors"][field].is_string(), "no field error for {}: {}", field, body);
    Ok(())
}

/// One tenant's book with a chapter, a verse and a recitation of it.
struct Catalog {
    book: i64,
    chapter: i64,
    verse: i64,
    reciter: i64,
    audio: i64,
}

async fn seed_catalog(app: &Router, domain: &str, reciter: &str) -> Result<Catalog> {
    let headers = [("x-tenant-domain", domain)];
    let book = create(app, "/api/v1/books", &headers, json!({ "title": "Mushaf" })).await?;
    let chapter = create(
        app,
        "/api/v1/chapters",
        &headers,
        json!({ "book": book, "title": "Al-Fatiha", "number": 1 }),
    )
    .await?;
    let verse = create(
        app,
        "/api/v1/verses",
        &headers,
        json!({ "chapter": chapter, "number": 1, "text": "bismillah" }),
    )
    .await?;
    let reciter = create(app, "/api/v1/audio/reciters", &headers, json!({ "name": reciter })).await?;
    let audio = create(
        app,
        "/api/v1/audio/chapter-audios",
        &headers,
        json!({ "chapter": chapter, "reciter": reciter, "external_url": "https://cdn.example.com/1.mp3" }),
    )
    .await?;
    Ok(Catalog {
        book,
        chapter,
        verse,
        reciter,
        audio,
    })
}

/// Register a reader in `domain` and log them in; returns the bearer header value.
async fn login(app: &Router, domain: &str) -> Result<String> {
    let headers = [("x-tenant-domain", domain)];
    let credentials = json!({ "username": "reader", "password": "long-enough" });

    create(app, "/api/v1/auth/register", &headers, credentials.clone()).await?;
    let (status, body) = send(app, post_json("/api/v1/auth/login", &headers, credentials)).await?;
    assert_eq!(status, StatusCode::OK, "login returned {}", body);
    let token = body["data"]["token"].as_str().context("login returned no token")?;
    Ok(format!("Bearer {}", token))
}

#[tokio::test]
async fn create_or_get_is_idempotent() -> Result<()> {
    let Some(db) = db_app().await? else {
        return Ok(());
    };

    let tenant = fresh_tenant(&db.directory, "idem").await?;
    let (again, created) = db.directory.create_or_get(&tenant.name, &tenant.domain).await?;
    assert!(!created);
    assert_eq!(again.id, tenant.id);

    let renamed = format!("{} Renamed", tenant.name);
    let (third, created) = db.directory.create_or_get(&renamed, &tenant.domain).await?;
    assert!(!created);
    assert_eq!(third.id, tenant.id);
    assert_eq!(third.name, tenant.name);
    Ok(())
}

#[tokio::test]
async fn deactivated_tenant_stops_resolving() -> Result<()> {
    let Some(db) = db_app().await? else {
        return Ok(());
    };

    let tenant = fresh_tenant(&db.directory, "dormant").await?;
    let headers = [("x-tenant-domain", tenant.domain.as_str())];

    let (_, body) = send(&db.router, get("/api/v1/tenant", &headers)).await?;
    assert_eq!(body["data"]["tenant"]["id"], tenant.id);

    let updated = db.directory.set_active(&tenant.domain, false).await?;
    assert_eq!(updated.map(|t| t.is_active), Some(false));

    let (status, body) = send(&db.router, get("/api/v1/tenant", &headers)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["tenant"], json!(null));

    let (status, body) = send(&db.router, post_json("/api/v1/books", &headers, json!({ "title": "x" }))).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "TENANT_REQUIRED");
    Ok(())
}

#[tokio::test]
async fn other_tenants_rows_are_invisible_and_untouchable() -> Result<()> {
    let Some(db) = db_app().await? else {
        return Ok(());
    };
    let app = &db.router;

    let acme = fresh_tenant(&db.directory, "acme").await?;
    let globex = fresh_tenant(&db.directory, "globex").await?;
    let as_acme = [("x-tenant-domain", acme.domain.as_str())];
    let as_globex = [("x-tenant-domain", globex.domain.as_str())];

    let theirs = seed_catalog(app, &acme.domain, "Alafasy").await?;
    let ours = create(app, "/api/v1/books", &as_globex, json!({ "title": "Tafsir" })).await?;

    let (_, body) = send(app, get("/api/v1/books?limit=100", &as_globex)).await?;
    let ids: Vec<i64> = body["data"]
        .as_array()
        .context("books list is not an array")?
        .iter()
        .filter_map(|b| b["id"].as_i64())
        .collect();
    assert_eq!(ids, vec![ours]);

    let (_, body) = send(app, get("/api/v1/audio/reciters", &as_globex)).await?;
    assert_eq!(body["data"], json!([]));

    let book_uri = format!("/api/v1/books/{}", theirs.book);
    let (status, _) = send(app, get(&book_uri, &as_globex)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(app, put_json(&book_uri, &as_globex, json!({ "title": "Stolen" }))).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(app, delete(&book_uri, &as_globex)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(app, delete(&format!("/api/v1/chapters/{}", theirs.chapter), &as_globex)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(app, get(&book_uri, &as_acme)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Mushaf");

    let (status, _) = send(app, get(&format!("/api/v1/chapters/{}", theirs.chapter), &as_acme)).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn references_to_other_tenants_rows_are_rejected() -> Result<()> {
    let Some(db) = db_app().await? else {
        return Ok(());
    };
    let app = &db.router;

    let acme = fresh_tenant(&db.directory, "acme").await?;
    let globex = fresh_tenant(&db.directory, "globex").await?;
    let theirs = seed_catalog(app, &acme.domain, "Alafasy").await?;
    let ours = seed_catalog(app, &globex.domain, "Alafasy").await?;
    let as_globex = [("x-tenant-domain", globex.domain.as_str())];

    assert_rejected_reference(
        app,
        "/api/v1/chapters",
        &as_globex,
        json!({ "book": theirs.book, "title": "Al-Baqara", "number": 2 }),
        "book",
    )
    .await?;

    assert_rejected_reference(
        app,
        "/api/v1/verses",
        &as_globex,
        json!({ "chapter": theirs.chapter, "number": 2, "text": "alhamdulillah" }),
        "chapter",
    )
    .await?;

    assert_rejected_reference(
        app,
        "/api/v1/audio/chapter-audios",
        &as_globex,
        json!({ "chapter": theirs.chapter, "reciter": ours.reciter }),
        "chapter",
    )
    .await?;

    assert_rejected_reference(
        app,
        "/api/v1/audio/chapter-audios",
        &as_globex,
        json!({ "chapter": ours.chapter, "reciter": theirs.reciter }),
        "reciter",
    )
    .await?;

    assert_rejected_reference(
        app,
        "/api/v1/audio/timestamps",
        &as_globex,
        json!({ "chapter_audio": theirs.audio, "verse": ours.verse, "start_time": 0.0 }),
        "chapter_audio",
    )
    .await?;

    assert_rejected_reference(
        app,
        "/api/v1/audio/timestamps",
        &as_globex,
        json!({ "chapter_audio": ours.audio, "verse": theirs.verse, "start_time": 0.0 }),
        "verse",
    )
    .await?;

    let bearer = login(app, &globex.domain).await?;
    let as_reader = [("x-tenant-domain", globex.domain.as_str()), ("authorization", bearer.as_str())];

    assert_rejected_reference(
        app,
        "/api/v1/notes/notes",
        &as_reader,
        json!({ "verse": theirs.verse, "text": "reflection" }),
        "verse",
    )
    .await?;

    assert_rejected_reference(app, "/api/v1/notes/bookmarks", &as_reader, json!({ "book": theirs.book }), "book")
        .await?;

    assert_rejected_reference(
        app,
        "/api/v1/notes/bookmarks",
        &as_reader,
        json!({ "book": ours.book, "chapter": theirs.chapter }),
        "chapter",
    )
    .await?;

    assert_rejected_reference(
        app,
        "/api/v1/notes/history",
        &as_reader,
        json!({ "chapter_audio": theirs.audio }),
        "chapter_audio",
    )
    .await?;

    create(app, "/api/v1/notes/notes", &as_reader, json!({ "verse": ours.verse, "text": "reflection" })).await?;
    create(
        app,
        "/api/v1/notes/bookmarks",
        &as_reader,
        json!({ "book": ours.book, "chapter": ours.chapter, "verse": ours.verse }),
    )
    .await?;
    Ok(())
}

#[tokio::test]
async fn bookmark_path_must_nest_within_one_tenant() -> Result<()> {
    let Some(db) = db_app().await? else {
        return Ok(());
    };
    let app = &db.router;

    let tenant = fresh_tenant(&db.directory, "nest").await?;
    let first = seed_catalog(app, &tenant.domain, "Alafasy").await?;
    let second = seed_catalog(app, &tenant.domain, "Husary").await?;

    let bearer = login(app, &tenant.domain).await?;
    let as_reader = [("x-tenant-domain", tenant.domain.as_str()), ("authorization", bearer.as_str())];

    assert_rejected_reference(
        app,
        "/api/v1/notes/bookmarks",
        &as_reader,
        json!({ "book": first.book, "chapter": second.chapter }),
        "chapter",
    )
    .await?;

    assert_rejected_reference(
        app,
        "/api/v1/notes/bookmarks",
        &as_reader,
        json!({ "book": first.book, "chapter": first.chapter, "verse": second.verse }),
        "verse",
    )
    .await?;

    assert_rejected_reference(
        app,
        "/api/v1/notes/bookmarks",
        &as_reader,
        json!({ "book": first.book, "verse": second.verse }),
        "verse",
    )
    .await?;

    create(app, "/api/v1/notes/bookmarks", &as_reader, json!({ "book": first.book, "verse": first.verse })).await?;
    Ok(())
}

#[tokio::test]
async fn chapter_number_zero_is_refused_by_the_database() -> Result<()> {
    let Some(db) = db_app().await? else {
        return Ok(());
    };

    let tenant = fresh_tenant(&db.directory, "check").await?;
    let book = create(
        &db.router,
        "/api/v1/books",
        &[("x-tenant-domain", tenant.domain.as_str())],
        json!({ "title": "Mushaf" }),
    )
    .await?;

    let result = sqlx::query("INSERT INTO chapters (book_id, title, number) VALUES ($1, 'Zero', 0)")
        .bind(book)
        .execute(&db.pool)
        .await;
    assert!(result.is_err());
    Ok(())
}
