//! Sections repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::SectionsStore;
use crate::{
    error::AppResult,
    models::{section::section_key, Section},
};

#[derive(Clone)]
pub struct SectionsRepository {
    pool: Pool<Postgres>,
}

impl SectionsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn bump(&self, section_name: &str, visits: i64, bought: i64) -> AppResult<Section> {
        let section = sqlx::query_as::<_, Section>(
            r#"
            INSERT INTO sections (section_name, visit_count, books_bought_count, shelf_count, created_at, updated_at)
            VALUES ($1, $2, $3, 0, NOW(), NOW())
            ON CONFLICT (section_name) DO UPDATE SET
                visit_count = sections.visit_count + EXCLUDED.visit_count,
                books_bought_count = sections.books_bought_count + EXCLUDED.books_bought_count,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(section_key(section_name))
        .bind(visits)
        .bind(bought)
        .fetch_one(&self.pool)
        .await?;
        Ok(section)
    }
}

#[async_trait]
impl SectionsStore for SectionsRepository {
    async fn increment_visits(&self, section_name: &str) -> AppResult<Section> {
        self.bump(section_name, 1, 0).await
    }

    async fn increment_books_bought(&self, section_name: &str) -> AppResult<Section> {
        self.bump(section_name, 0, 1).await
    }

    async fn list(&self) -> AppResult<Vec<Section>> {
        let sections = sqlx::query_as::<_, Section>("SELECT * FROM sections ORDER BY section_name")
            .fetch_all(&self.pool)
            .await?;
        Ok(sections)
    }
}
