//! HTTP handlers for the books resource.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use bookstore_authz::{require_role, AuthenticatedUser, RoleGuard};
use bookstore_http::{ApiJson, ApiQuery, AppError, ValidatedJson};
use bookstore_kernel::ApiVersion;

use super::models::{Book, BookQuery, CreateBook, UpdateBook};
use super::service::BookService;

/// Response header carrying the size of the filtered set on v2 lists.
pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

#[derive(Clone)]
struct BooksState {
    service: BookService,
    version: ApiVersion,
}

/// Routes of the books module for one API version. Everything except
/// `/health` sits behind `guard`.
pub fn router(service: BookService, guard: RoleGuard, version: ApiVersion) -> Router {
    let list = match version {
        ApiVersion::V1 => get(list_books),
        ApiVersion::V2 => get(query_books),
    };

    let protected = Router::new()
        .route("/", list.post(create_book).put(update_book))
        .route(
            "/{id}",
            get(get_book).put(update_book_at).delete(delete_book),
        )
        .route_layer(middleware::from_fn_with_state(guard, require_role))
        .with_state(BooksState { service, version });

    Router::new()
        .route("/health", get(health_check))
        .merge(protected)
}

async fn health_check() -> &'static str {
    "books module is healthy"
}

async fn list_books(State(state): State<BooksState>) -> Result<Json<Vec<Book>>, AppError> {
    Ok(Json(state.service.list().await?))
}

async fn query_books(
    State(state): State<BooksState>,
    ApiQuery(query): ApiQuery<BookQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (books, total) = state.service.query(&query).await?;
    Ok(([(TOTAL_COUNT_HEADER, total.to_string())], Json(books)))
}

async fn get_book(
    State(state): State<BooksState>,
    Path(id): Path<String>,
) -> Result<Json<Book>, AppError> {
    Ok(Json(state.service.get(&id).await?))
}

async fn create_book(
    State(state): State<BooksState>,
    user: AuthenticatedUser,
    ValidatedJson(body): ValidatedJson<CreateBook>,
) -> Result<impl IntoResponse, AppError> {
    let title = body.title.unwrap_or_default();
    let author = body.author.unwrap_or_default();
    let book = state.service.create(&title, &author).await?;
    tracing::debug!(book_id = %book.id, user = %user.username, "create handled");

    let location = format!("{}/{}", state.version.mount_path("books"), book.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(book)))
}

async fn update_book(
    State(state): State<BooksState>,
    ApiJson(body): ApiJson<UpdateBook>,
) -> Result<StatusCode, AppError> {
    body.validate_with_id()?;
    let id = body.id.clone().unwrap_or_default();
    apply_update(&state, &id, body).await
}

async fn update_book_at(
    State(state): State<BooksState>,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<UpdateBook>,
) -> Result<StatusCode, AppError> {
    if let Some(body_id) = body.id.as_deref() {
        if body_id != id {
            return Err(AppError::bad_request(format!(
                "body id '{}' does not match path id '{}'",
                body_id, id
            )));
        }
    }
    apply_update(&state, &id, body).await
}

async fn apply_update(
    state: &BooksState,
    id: &str,
    body: UpdateBook,
) -> Result<StatusCode, AppError> {
    let title = body.title.unwrap_or_default();
    let author = body.author.unwrap_or_default();
    state.service.update(id, &title, &author).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_book(
    State(state): State<BooksState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.service.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
