//! Book catalog endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        book::{CreateBook, UpdateBook},
        Book, Pagination, StockReport,
    },
};

use super::ApiJson;

/// Add a book; its identifier is generated from the section
#[utoipa::path(
    post,
    path = "/book",
    tag = "books",
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    ApiJson(request): ApiJson<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let book = state.services.catalog.create_book(request).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// List books, newest first
#[utoipa::path(
    get,
    path = "/book",
    tag = "books",
    params(Pagination),
    responses(
        (status = 200, description = "Books", body = Vec<Book>)
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.list_books(&pagination).await?;
    Ok(Json(books))
}

/// Get a book by internal ID or book identifier (e.g. `CS-0003`)
#[utoipa::path(
    get,
    path = "/book/{id}",
    tag = "books",
    params(
        ("id" = String, Path, description = "Book UUID or book identifier")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    Path(key): Path<String>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_book(&key).await?;
    Ok(Json(book))
}

/// Update a book
#[utoipa::path(
    put,
    path = "/book/{id}",
    tag = "books",
    params(
        ("id" = String, Path, description = "Book UUID or book identifier")
    ),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    Path(key): Path<String>,
    ApiJson(update): ApiJson<UpdateBook>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.update_book(&key, update).await?;
    Ok(Json(book))
}

/// Delete a book and return it
#[utoipa::path(
    delete,
    path = "/book/{id}",
    tag = "books",
    params(
        ("id" = String, Path, description = "Book UUID or book identifier")
    ),
    responses(
        (status = 200, description = "Book deleted", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn delete_book(
    State(state): State<crate::AppState>,
    Path(key): Path<String>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.delete_book(&key).await?;
    Ok(Json(book))
}

/// Stock report with issue counts, shelf visits and demand scores
#[utoipa::path(
    get,
    path = "/book/analytics/stock",
    tag = "books",
    responses(
        (status = 200, description = "Stock analytics", body = StockReport)
    )
)]
pub async fn stock_analytics(
    State(state): State<crate::AppState>,
) -> AppResult<Json<StockReport>> {
    let report = state.services.analytics.stock_report().await?;
    Ok(Json(report))
}
