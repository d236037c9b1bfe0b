use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

/// Upper bound on title and author length, in characters.
pub const MAX_FIELD_LEN: u64 = 100;

/// A book as stored and returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Book {
    /// Server-assigned identifier
    pub id: String,
    /// Title of the book
    pub title: String,
    /// Author of the book
    pub author: String,
}

/// Request body for creating a book.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    /// Title of the book, 1 to 100 characters
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        required(message = "title is required"),
        length(min = 1, max = 100, message = "title must be between 1 and 100 characters")
    )]
    pub title: Option<String>,
    /// Author of the book, 1 to 100 characters
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        required(message = "author is required"),
        length(min = 1, max = 100, message = "author must be between 1 and 100 characters")
    )]
    pub author: Option<String>,
}

/// Request body for replacing the mutable fields of a book.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    /// Identifier of the book; may be omitted when the path carries it
    #[serde(default)]
    pub id: Option<String>,
    /// New title, 1 to 100 characters
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        required(message = "title is required"),
        length(min = 1, max = 100, message = "title must be between 1 and 100 characters")
    )]
    pub title: Option<String>,
    /// New author, 1 to 100 characters
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        required(message = "author is required"),
        length(min = 1, max = 100, message = "author must be between 1 and 100 characters")
    )]
    pub author: Option<String>,
}

impl UpdateBook {
    /// Validate a body that must name the book itself, reporting a missing
    /// `id` alongside any field errors.
    pub fn validate_with_id(&self) -> Result<(), ValidationErrors> {
        let mut errors = self.validate().err().unwrap_or_else(ValidationErrors::new);
        if self.id.as_deref().map_or(true, |id| id.trim().is_empty()) {
            let mut error = ValidationError::new("required");
            error.message = Some("id is required".into());
            errors.add("id", error);
        }
        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Query string of the v2 list operation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookQuery {
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

fn trimmed<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.map(|s| s.trim().to_string()))
}
