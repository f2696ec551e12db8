//! Book (catalog entry) model and related types

use chrono::{DateTime, Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::enums::text_enum;
use crate::error::{AppError, AppResult};

static ISBN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(97(8|9))?\d{9}(\d|X)$").expect("valid regex"));
static COVER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://.+\.(jpg|jpeg|png|webp)$").expect("valid regex"));

/// Physical state of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum BookStatus {
    Available,
    Issued,
    Lost,
    Damaged,
}

text_enum!(BookStatus {
    Available => "Available",
    Issued => "Issued",
    Lost => "Lost",
    Damaged => "Damaged",
});

/// Catalog entry
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: Uuid,
    /// Human facing identifier, `<SECTION-INITIALS>-<4-digit-sequence>`. Never changes.
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub publisher: Option<String>,
    pub isbn: String,
    pub section: String,
    pub genre: Option<String>,
    pub language: String,
    pub publication_year: Option<i32>,
    pub cover_image: Option<String>,
    pub description: Option<String>,
    pub status: BookStatus,
    pub total_copies: i32,
    pub available_copies: i32,
    pub rack: Option<String>,
    pub shelf: Option<String>,
    pub tags: Vec<String>,
    pub rating_average: f64,
    pub rating_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Case-insensitive substring match over the searchable fields
    pub fn matches(&self, needle_lower: &str) -> bool {
        self.title.to_lowercase().contains(needle_lower)
            || self.author.to_lowercase().contains(needle_lower)
            || self.isbn.to_lowercase().contains(needle_lower)
            || self
                .publisher
                .as_ref()
                .map(|p| p.to_lowercase().contains(needle_lower))
                .unwrap_or(false)
    }
}

/// Short book representation embedded in borrow requests and fines
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookShort {
    pub id: Uuid,
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub available_copies: i32,
    pub total_copies: i32,
}

impl From<&Book> for BookShort {
    fn from(b: &Book) -> Self {
        Self {
            id: b.id,
            book_id: b.book_id.clone(),
            title: b.title.clone(),
            author: b.author.clone(),
            isbn: b.isbn.clone(),
            available_copies: b.available_copies,
            total_copies: b.total_copies,
        }
    }
}

/// Initials of every word of a section name: "Computer Science" -> "CS"
pub fn section_prefix(section: &str) -> AppResult<String> {
    let mut prefix = String::new();
    let mut prev_is_word = false;
    for c in section.chars() {
        let is_word = c.is_alphanumeric() || c == '_';
        if is_word && !prev_is_word {
            prefix.extend(c.to_uppercase());
        }
        prev_is_word = is_word;
    }
    if prefix.is_empty() {
        return Err(AppError::Validation(format!(
            "Section '{}' has no usable initials",
            section
        )));
    }
    Ok(prefix)
}

/// Format the identifier for the `seq`-th book under `prefix`
pub fn format_book_code(prefix: &str, seq: i64) -> String {
    format!("{}-{:04}", prefix, seq)
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "author is required"))]
    pub author: String,
    pub publisher: Option<String>,
    #[validate(length(min = 1, message = "isbn is required"))]
    pub isbn: String,
    #[validate(length(min = 1, message = "section is required"))]
    pub section: String,
    pub genre: Option<String>,
    pub language: Option<String>,
    pub publication_year: Option<i32>,
    pub cover_image: Option<String>,
    pub description: Option<String>,
    pub status: Option<BookStatus>,
    #[validate(range(min = 0, message = "total_copies cannot be negative"))]
    pub total_copies: Option<i32>,
    #[validate(range(min = 0, message = "available_copies cannot be negative"))]
    pub available_copies: Option<i32>,
    pub rack: Option<String>,
    pub shelf: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreateBook {
    pub fn check(&self) -> AppResult<()> {
        self.validate()?;
        check_isbn(&self.isbn)?;
        check_year(self.publication_year)?;
        check_cover(self.cover_image.as_deref())?;
        let total = self.total_copies.unwrap_or(1);
        let available = self.available_copies.unwrap_or(total);
        if available > total {
            return Err(AppError::Validation(
                "available_copies cannot exceed total_copies".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate and fill defaults. The identifier prefix is derived from the section.
    pub fn into_new_book(self) -> AppResult<NewBook> {
        self.check()?;
        let section = self.section.trim().to_string();
        let prefix = section_prefix(&section)?;
        let total_copies = self.total_copies.unwrap_or(1);

        Ok(NewBook {
            prefix,
            title: self.title.trim().to_string(),
            author: self.author.trim().to_string(),
            publisher: self.publisher,
            isbn: self.isbn,
            section,
            genre: self.genre,
            language: self.language.unwrap_or_else(|| "English".to_string()),
            publication_year: self.publication_year,
            cover_image: self.cover_image,
            description: self.description,
            status: self.status.unwrap_or(BookStatus::Available),
            total_copies,
            available_copies: self.available_copies.unwrap_or(total_copies),
            rack: self.rack,
            shelf: self.shelf,
            tags: self.tags,
        })
    }
}

/// Validated book ready to be stored; the store assigns `book_id` from `prefix`
#[derive(Debug, Clone)]
pub struct NewBook {
    pub prefix: String,
    pub title: String,
    pub author: String,
    pub publisher: Option<String>,
    pub isbn: String,
    pub section: String,
    pub genre: Option<String>,
    pub language: String,
    pub publication_year: Option<i32>,
    pub cover_image: Option<String>,
    pub description: Option<String>,
    pub status: BookStatus,
    pub total_copies: i32,
    pub available_copies: i32,
    pub rack: Option<String>,
    pub shelf: Option<String>,
    pub tags: Vec<String>,
}

/// Update book request. The generated identifier is not part of it.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub isbn: Option<String>,
    pub genre: Option<String>,
    pub language: Option<String>,
    pub publication_year: Option<i32>,
    pub cover_image: Option<String>,
    pub description: Option<String>,
    pub status: Option<BookStatus>,
    #[validate(range(min = 0))]
    pub total_copies: Option<i32>,
    #[validate(range(min = 0))]
    pub available_copies: Option<i32>,
    pub rack: Option<String>,
    pub shelf: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl UpdateBook {
    pub fn check(&self) -> AppResult<()> {
        self.validate()?;
        if let Some(ref isbn) = self.isbn {
            check_isbn(isbn)?;
        }
        check_year(self.publication_year)?;
        check_cover(self.cover_image.as_deref())
    }

    /// Apply the present fields onto `book`
    pub fn apply(&self, book: &mut Book) -> AppResult<()> {
        macro_rules! set {
            ($($field:ident),+) => {
                $(if let Some(ref v) = self.$field { book.$field = v.clone(); })+
            };
        }
        macro_rules! set_opt {
            ($($field:ident),+) => {
                $(if let Some(ref v) = self.$field { book.$field = Some(v.clone()); })+
            };
        }
        set!(title, author, isbn, language, tags);
        set_opt!(publisher, genre, publication_year, cover_image, description, rack, shelf);
        if let Some(status) = self.status {
            book.status = status;
        }
        if let Some(total) = self.total_copies {
            book.total_copies = total;
        }
        if let Some(available) = self.available_copies {
            book.available_copies = available;
        }
        if book.available_copies > book.total_copies {
            return Err(AppError::Validation(
                "available_copies cannot exceed total_copies".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_isbn(isbn: &str) -> AppResult<()> {
    if ISBN_RE.is_match(isbn) {
        Ok(())
    } else {
        Err(AppError::Validation("Invalid ISBN number".to_string()))
    }
}

fn check_year(year: Option<i32>) -> AppResult<()> {
    match year {
        Some(y) if y < 1500 || y > Utc::now().year() => Err(AppError::Validation(format!(
            "Invalid publication year: {}",
            y
        ))),
        _ => Ok(()),
    }
}

fn check_cover(url: Option<&str>) -> AppResult<()> {
    match url {
        Some(u) if !COVER_RE.is_match(u) => {
            Err(AppError::Validation("Invalid image URL".to_string()))
        }
        _ => Ok(()),
    }
}
