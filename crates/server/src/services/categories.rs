//! Category administration and review criteria lookup.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::{debug, info, instrument};

use fydo_core::{CategoryId, CriterionId};

use crate::db::{self, RepositoryError};
use crate::error::AppError;
use crate::models::{Category, CategoryInput, CriterionInput, ReviewCriterion};

const CRITERIA_TTL: Duration = Duration::from_secs(300);

/// Manages categories and their weighted criteria.
///
/// Criteria lookups are cached for 5 minutes; every mutation clears the
/// cache, since a global criterion can back any number of categories.
#[derive(Clone)]
pub struct CategoryService {
    pool: PgPool,
    criteria_cache: Cache<Option<CategoryId>, Arc<Vec<ReviewCriterion>>>,
}

impl CategoryService {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let criteria_cache = Cache::builder()
            .max_capacity(1_000)
            .time_to_live(CRITERIA_TTL)
            .build();

        Self {
            pool,
            criteria_cache,
        }
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list(&self) -> Result<Vec<Category>, AppError> {
        Ok(db::categories::list(&self.pool).await?)
    }

    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for invalid input or `Conflict` for a
    /// duplicate name.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: CategoryInput) -> Result<Category, AppError> {
        let input = input.validate()?;
        let category = db::categories::insert(&self.pool, &input).await?;
        info!(category_id = %category.id, "Created category");
        Ok(category)
    }

    /// Rename or re-describe a category.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the category doesn't exist.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: CategoryId, input: CategoryInput) -> Result<Category, AppError> {
        let input = input.validate()?;
        Ok(db::categories::update(&self.pool, id, &input).await?)
    }

    /// Delete a category along with its own criteria.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Conflict` while products are filed under it.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: CategoryId) -> Result<(), AppError> {
        let products = db::products::count_in_category(&self.pool, id).await?;
        if products > 0 {
            return Err(AppError::Conflict(format!(
                "category still has {products} products"
            )));
        }

        db::categories::delete(&self.pool, id).await?;
        self.invalidate().await;
        info!("Deleted category");
        Ok(())
    }

    /// Criteria used to rate products of `category_id`.
    ///
    /// A category without criteria of its own, or no category at all, uses
    /// the global defaults.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn criteria_for_category(
        &self,
        category_id: Option<CategoryId>,
    ) -> Result<Arc<Vec<ReviewCriterion>>, RepositoryError> {
        if let Some(criteria) = self.criteria_cache.get(&category_id).await {
            debug!("Cache hit for criteria");
            return Ok(criteria);
        }

        let mut criteria = match category_id {
            Some(id) => db::categories::criteria(&self.pool, Some(id)).await?,
            None => Vec::new(),
        };
        if criteria.is_empty() {
            criteria = db::categories::criteria(&self.pool, None).await?;
        }

        let criteria = Arc::new(criteria);
        self.criteria_cache
            .insert(category_id, Arc::clone(&criteria))
            .await;
        Ok(criteria)
    }

    /// Add a criterion to a category, or a global one for `None`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for invalid input or `Conflict` if the
    /// key is taken or the category is missing.
    #[instrument(skip(self, input), fields(key = %input.key))]
    pub async fn add_criterion(
        &self,
        category_id: Option<CategoryId>,
        input: CriterionInput,
    ) -> Result<ReviewCriterion, AppError> {
        let input = input.validate()?;
        let criterion = db::categories::insert_criterion(&self.pool, category_id, &input).await?;
        self.invalidate().await;
        info!(criterion_id = %criterion.id, "Added review criterion");
        Ok(criterion)
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the criterion doesn't exist.
    #[instrument(skip(self, input))]
    pub async fn update_criterion(
        &self,
        id: CriterionId,
        input: CriterionInput,
    ) -> Result<ReviewCriterion, AppError> {
        let input = input.validate()?;
        let criterion = db::categories::update_criterion(&self.pool, id, &input).await?;
        self.invalidate().await;
        Ok(criterion)
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the criterion doesn't exist.
    #[instrument(skip(self))]
    pub async fn delete_criterion(&self, id: CriterionId) -> Result<(), AppError> {
        db::categories::delete_criterion(&self.pool, id).await?;
        self.invalidate().await;
        info!("Deleted review criterion");
        Ok(())
    }

    async fn invalidate(&self) {
        self.criteria_cache.invalidate_all();
        self.criteria_cache.run_pending_tasks().await;
    }
}
