pub mod models;
pub mod repository;
pub mod routes;
pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use bookstore_authz::RoleGuard;
use bookstore_kernel::{ApiVersion, InitCtx, Migration, Module};
use serde_json::{json, Value};
use utoipa::PartialSchema;

use models::{Book, CreateBook, UpdateBook};
use service::BookService;

/// Schema of the `books` table.
pub const BOOKS_MIGRATIONS: &[Migration] = &[Migration {
    id: "001_create_books",
    up: r#"
        CREATE TABLE IF NOT EXISTS books (
            id     TEXT PRIMARY KEY NOT NULL,
            title  TEXT NOT NULL CHECK (length(title) BETWEEN 1 AND 100),
            author TEXT NOT NULL CHECK (length(author) BETWEEN 1 AND 100)
        );
        CREATE INDEX IF NOT EXISTS books_title_idx ON books (title);
        CREATE INDEX IF NOT EXISTS books_author_idx ON books (author);
        "#,
}];

/// The books resource, served under `/api/{version}/books`.
pub struct BooksModule {
    service: BookService,
    guard: RoleGuard,
}

impl BooksModule {
    pub fn new(service: BookService, guard: RoleGuard) -> Self {
        Self { service, guard }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    fn api_versions(&self) -> &'static [ApiVersion] {
        ApiVersion::ALL
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self, version: ApiVersion) -> Router {
        routes::router(self.service.clone(), self.guard.clone(), version)
    }

    fn openapi(&self, version: ApiVersion) -> Option<Value> {
        Some(openapi_fragment(version))
    }

    fn migrations(&self) -> Vec<Migration> {
        BOOKS_MIGRATIONS.to_vec()
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create the books module around an existing service.
pub fn create_module(service: BookService, guard: RoleGuard) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(service, guard))
}

fn json_content(schema: Value) -> Value {
    json!({ "application/json": { "schema": schema } })
}

fn schema_ref(name: &str) -> Value {
    json!({ "$ref": format!("#/components/schemas/{}", name) })
}

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": json_content(schema_ref("ErrorResponse"))
    })
}

fn id_parameter() -> Value {
    json!({
        "name": "id",
        "in": "path",
        "required": true,
        "schema": { "type": "string" }
    })
}

fn list_operation(version: ApiVersion) -> Value {
    let array_of_books = json!({ "type": "array", "items": schema_ref("Book") });
    match version {
        ApiVersion::V1 => json!({
            "summary": "List all books",
            "tags": ["Books"],
            "security": [{ "bearerAuth": [] }],
            "responses": {
                "200": { "description": "All books", "content": json_content(array_of_books) },
                "401": { "description": "Missing or invalid token" },
                "403": { "description": "Admin role required" }
            }
        }),
        ApiVersion::V2 => json!({
            "summary": "Search, sort and page through books",
            "tags": ["Books"],
            "security": [{ "bearerAuth": [] }],
            "parameters": [
                { "name": "search", "in": "query", "schema": { "type": "string" },
                  "description": "Substring matched against title or author" },
                { "name": "sortBy", "in": "query",
                  "schema": { "type": "string", "enum": ["id", "title", "author"] } },
                { "name": "page", "in": "query",
                  "schema": { "type": "integer", "minimum": 1, "default": 1 } },
                { "name": "pageSize", "in": "query",
                  "schema": { "type": "integer", "minimum": 1, "default": 10 } }
            ],
            "responses": {
                "200": {
                    "description": "One page of matching books",
                    "headers": {
                        "X-Total-Count": {
                            "description": "Number of matching books across all pages",
                            "schema": { "type": "integer" }
                        }
                    },
                    "content": json_content(array_of_books)
                },
                "400": error_response("Malformed query string"),
                "401": { "description": "Missing or invalid token" },
                "403": { "description": "Admin role required" }
            }
        }),
    }
}

fn openapi_fragment(version: ApiVersion) -> Value {
    let denied = json!({
        "401": { "description": "Missing or invalid token" },
        "403": { "description": "Admin role required" }
    });
    let with_denied = |mut responses: Value| {
        if let (Some(target), Some(extra)) = (responses.as_object_mut(), denied.as_object()) {
            target.extend(extra.clone());
        }
        responses
    };

    json!({
        "paths": {
            "/": {
                "get": list_operation(version),
                "post": {
                    "summary": "Create a book",
                    "tags": ["Books"],
                    "security": [{ "bearerAuth": [] }],
                    "requestBody": {
                        "required": true,
                        "content": json_content(schema_ref("CreateBook"))
                    },
                    "responses": with_denied(json!({
                        "201": {
                            "description": "Book created",
                            "headers": {
                                "Location": {
                                    "description": "URL of the new book",
                                    "schema": { "type": "string" }
                                }
                            },
                            "content": json_content(schema_ref("Book"))
                        },
                        "400": error_response("Validation failed")
                    }))
                },
                "put": {
                    "summary": "Update the book named by the body id",
                    "tags": ["Books"],
                    "security": [{ "bearerAuth": [] }],
                    "requestBody": {
                        "required": true,
                        "content": json_content(schema_ref("UpdateBook"))
                    },
                    "responses": with_denied(json!({
                        "204": { "description": "Book updated" },
                        "400": error_response("Validation failed or id missing"),
                        "404": { "description": "Book not found" }
                    }))
                }
            },
            "/{id}": {
                "get": {
                    "summary": "Get a book by id",
                    "tags": ["Books"],
                    "security": [{ "bearerAuth": [] }],
                    "parameters": [id_parameter()],
                    "responses": with_denied(json!({
                        "200": { "description": "The book", "content": json_content(schema_ref("Book")) },
                        "404": { "description": "Book not found" }
                    }))
                },
                "put": {
                    "summary": "Update a book",
                    "tags": ["Books"],
                    "security": [{ "bearerAuth": [] }],
                    "parameters": [id_parameter()],
                    "requestBody": {
                        "required": true,
                        "content": json_content(schema_ref("UpdateBook"))
                    },
                    "responses": with_denied(json!({
                        "204": { "description": "Book updated" },
                        "400": error_response("Validation failed or ids differ"),
                        "404": { "description": "Book not found" }
                    }))
                },
                "delete": {
                    "summary": "Delete a book",
                    "tags": ["Books"],
                    "security": [{ "bearerAuth": [] }],
                    "parameters": [id_parameter()],
                    "responses": with_denied(json!({
                        "204": { "description": "Book deleted" },
                        "404": { "description": "Book not found" }
                    }))
                }
            },
            "/health": {
                "get": {
                    "summary": "Books health check",
                    "tags": ["Books"],
                    "responses": {
                        "200": {
                            "description": "OK",
                            "content": { "text/plain": { "schema": { "type": "string" } } }
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Book": serde_json::to_value(Book::schema()).ok(),
                "CreateBook": serde_json::to_value(CreateBook::schema()).ok(),
                "UpdateBook": serde_json::to_value(UpdateBook::schema()).ok(),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::repository::InMemoryBookRepository;
    use bookstore_authz::{TokenVerifier, ADMIN_ROLE};
    use bookstore_kernel::settings::AuthSettings;

    fn module() -> BooksModule {
        let guard = RoleGuard::new(
            TokenVerifier::from_settings(&AuthSettings::default()),
            ADMIN_ROLE,
        );
        BooksModule::new(
            BookService::new(Arc::new(InMemoryBookRepository::new())),
            guard,
        )
    }

    #[test]
    fn fragment_differs_by_version_only_in_list() {
        let module = module();
        let v1 = module.openapi(ApiVersion::V1).unwrap();
        let v2 = module.openapi(ApiVersion::V2).unwrap();
        assert!(v1["paths"]["/"]["get"].get("parameters").is_none());
        assert_eq!(v2["paths"]["/"]["get"]["parameters"][1]["name"], "sortBy");
        assert_eq!(v1["paths"]["/{id}"], v2["paths"]["/{id}"]);
    }

    #[test]
    fn fragment_carries_schemas_and_guard_responses() {
        let spec = module().openapi(ApiVersion::V1).unwrap();
        assert!(spec["components"]["schemas"]["Book"].is_object());
        assert!(spec["components"]["schemas"]["UpdateBook"].is_object());
        assert!(spec["paths"]["/{id}"]["delete"]["responses"]["403"].is_object());
    }

    #[test]
    fn contributes_books_table() {
        let migrations = module().migrations();
        assert_eq!(migrations.len(), 1);
        assert_eq!(migrations[0].id, "001_create_books");
        assert!(migrations[0].up.contains("CREATE TABLE IF NOT EXISTS books"));
    }
}
