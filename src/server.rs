use std::any::Any;
use std::sync::Arc;

use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{self, AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::config::{config, SecurityConfig, TenancyConfig};
use crate::error::ApiError;
use crate::handlers::{audio, auth, catalog, library, system};
use crate::middleware::resolve_tenant_middleware;
use crate::services::{AudioService, CatalogService, LibraryService, UserService};
use crate::tenant::{TenantDirectory, TenantResolver};

/// Shared handles every handler can reach through `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub directory: Arc<dyn TenantDirectory>,
    pub resolver: Arc<TenantResolver>,
    pub catalog: CatalogService,
    pub audio: AudioService,
    pub library: LibraryService,
    pub users: UserService,
}

impl AppState {
    pub fn new(pool: PgPool, directory: Arc<dyn TenantDirectory>, tenancy: &TenancyConfig) -> Self {
        let resolver = Arc::new(TenantResolver::new(directory.clone(), tenancy));
        Self {
            catalog: CatalogService::new(pool.clone()),
            audio: AudioService::new(pool.clone()),
            library: LibraryService::new(pool.clone()),
            users: UserService::new(pool.clone()),
            pool,
            directory,
            resolver,
        }
    }
}

/// Full application router.
///
/// Layer order, outermost first: CORS, body limit, HTTP trace, panic
/// catcher, tenant resolution. A panicking handler therefore unwinds out of
/// the tenant binding before it is turned into a 500.
pub fn app(state: AppState) -> Router {
    let resolver = state.resolver.clone();

    let routes = Router::new()
        .route("/", get(system::root))
        .route("/health", get(system::health))
        .route("/api/v1/tenant", get(system::current_tenant))
        .merge(auth_routes())
        .merge(catalog_routes())
        .merge(audio_routes())
        .merge(library_routes())
        .fallback(not_found);

    with_layers(routes, resolver).with_state(state)
}

fn with_layers(routes: Router<AppState>, resolver: Arc<TenantResolver>) -> Router<AppState> {
    routes
        .layer(from_fn_with_state(resolver, resolve_tenant_middleware))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config().api.max_request_size_bytes))
        .layer(cors_layer(&config().security))
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/auth/register", post(auth::register))
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/auth/whoami", get(auth::whoami))
}

fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/books", get(catalog::list_books).post(catalog::create_book))
        .route(
            "/api/v1/books/:id",
            get(catalog::get_book)
                .put(catalog::update_book)
                .patch(catalog::update_book)
                .delete(catalog::delete_book),
        )
        .route("/api/v1/chapters", get(catalog::list_chapters).post(catalog::create_chapter))
        .route(
            "/api/v1/chapters/:id",
            get(catalog::get_chapter)
                .put(catalog::update_chapter)
                .patch(catalog::update_chapter)
                .delete(catalog::delete_chapter),
        )
        .route("/api/v1/verses", get(catalog::list_verses).post(catalog::create_verse))
        .route(
            "/api/v1/verses/:id",
            get(catalog::get_verse)
                .put(catalog::update_verse)
                .patch(catalog::update_verse)
                .delete(catalog::delete_verse),
        )
}

fn audio_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/audio/reciters", get(audio::list_reciters).post(audio::create_reciter))
        .route(
            "/api/v1/audio/reciters/:id",
            get(audio::get_reciter)
                .put(audio::update_reciter)
                .patch(audio::update_reciter)
                .delete(audio::delete_reciter),
        )
        .route(
            "/api/v1/audio/chapter-audios",
            get(audio::list_chapter_audios).post(audio::create_chapter_audio),
        )
        .route(
            "/api/v1/audio/chapter-audios/:id",
            get(audio::get_chapter_audio)
                .put(audio::update_chapter_audio)
                .patch(audio::update_chapter_audio)
                .delete(audio::delete_chapter_audio),
        )
        .route("/api/v1/audio/timestamps", get(audio::list_timestamps).post(audio::create_timestamp))
        .route(
            "/api/v1/audio/timestamps/:id",
            get(audio::get_timestamp)
                .put(audio::update_timestamp)
                .patch(audio::update_timestamp)
                .delete(audio::delete_timestamp),
        )
}

fn library_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/notes/notes", get(library::list_notes).post(library::create_note))
        .route(
            "/api/v1/notes/notes/:id",
            get(library::get_note)
                .put(library::update_note)
                .patch(library::update_note)
                .delete(library::delete_note),
        )
        .route("/api/v1/notes/bookmarks", get(library::list_bookmarks).post(library::create_bookmark))
        .route(
            "/api/v1/notes/bookmarks/:id",
            get(library::get_bookmark).delete(library::delete_bookmark),
        )
        .route("/api/v1/notes/history", get(library::list_history).post(library::create_history))
        .route(
            "/api/v1/notes/history/:id",
            get(library::get_history)
                .put(library::update_history)
                .patch(library::update_history)
                .delete(library::delete_history),
        )
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }

    let origin = if security.cors_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = security
            .cors_origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(cors::Any)
        .allow_headers(cors::Any)
}

async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("Handler panicked: {}", detail);

    ApiError::internal_server_error("Internal server error").into_response()
}
