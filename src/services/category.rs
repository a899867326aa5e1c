//! Category service
//!
//! Create, read, update and delete course categories. Titles are unique.

use crate::db::repositories::CategoryRepository;
use crate::models::{Category, CategoryInput};
use crate::services::validation::FieldErrors;
use anyhow::Context;
use std::sync::Arc;

pub const TITLE_TAKEN: &str = "category with this title already exists.";

/// Error types for category service operations
#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    #[error("Validation error: {0}")]
    ValidationError(FieldErrors),

    #[error("Category not found: {0}")]
    NotFound(i64),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Category service
pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, input: CategoryInput) -> Result<Category, CategoryServiceError> {
        let input = self.validate(input, None).await?;
        let category = self
            .repo
            .create(&input)
            .await
            .context("Failed to create category")?;
        tracing::info!(category_id = category.id, "Created category {}", category.title);
        Ok(category)
    }

    pub async fn get(&self, id: i64) -> Result<Category, CategoryServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get category")?
            .ok_or(CategoryServiceError::NotFound(id))
    }

    pub async fn list(&self) -> Result<Vec<Category>, CategoryServiceError> {
        Ok(self.repo.list().await.context("Failed to list categories")?)
    }

    pub async fn update(&self, id: i64, input: CategoryInput) -> Result<Category, CategoryServiceError> {
        let input = self.validate(input, Some(id)).await?;
        self.repo
            .update(id, &input)
            .await
            .context("Failed to update category")?
            .ok_or(CategoryServiceError::NotFound(id))
    }

    pub async fn delete(&self, id: i64) -> Result<(), CategoryServiceError> {
        if !self.repo.delete(id).await.context("Failed to delete category")? {
            return Err(CategoryServiceError::NotFound(id));
        }
        Ok(())
    }

    async fn validate(
        &self,
        mut input: CategoryInput,
        current: Option<i64>,
    ) -> Result<CategoryInput, CategoryServiceError> {
        input.title = input.title.trim().to_string();
        let mut errors = FieldErrors::new();
        errors.check_text("title", &input.title, 255);
        errors.check_text("description", &input.description, 10_000);
        errors.into_result().map_err(CategoryServiceError::ValidationError)?;

        let existing = self
            .repo
            .get_by_title(&input.title)
            .await
            .context("Failed to check category title")?;
        if let Some(existing) = existing {
            if Some(existing.id) != current {
                return Err(CategoryServiceError::ValidationError(FieldErrors::single(
                    "title",
                    TITLE_TAKEN,
                )));
            }
        }
        Ok(input)
    }
}
