//! Category and review criterion repository.

use sqlx::PgExecutor;

use fydo_core::{CategoryId, CriterionId};

use super::RepositoryError;
use crate::models::{Category, CategoryInput, CriterionInput, ReviewCriterion};

const CATEGORY_COLUMNS: &str = "id, name, description, created_at";

const CRITERION_COLUMNS: &str = "id, category_id, key, name, description, weight, display_order";

/// All categories by name.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list<'e>(db: impl PgExecutor<'e>) -> Result<Vec<Category>, RepositoryError> {
    let categories = sqlx::query_as::<_, Category>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM fydo.category ORDER BY name"
    ))
    .fetch_all(db)
    .await?;

    Ok(categories)
}

/// Get a category by ID.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_by_id<'e>(
    db: impl PgExecutor<'e>,
    id: CategoryId,
) -> Result<Option<Category>, RepositoryError> {
    let category = sqlx::query_as::<_, Category>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM fydo.category WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;

    Ok(category)
}

/// Create a category.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the name is taken.
pub async fn insert<'e>(
    db: impl PgExecutor<'e>,
    input: &CategoryInput,
) -> Result<Category, RepositoryError> {
    sqlx::query_as::<_, Category>(&format!(
        r"
        INSERT INTO fydo.category (name, description)
        VALUES ($1, $2)
        RETURNING {CATEGORY_COLUMNS}
        "
    ))
    .bind(&input.name)
    .bind(input.description.as_deref())
    .fetch_one(db)
    .await
    .map_err(|e| RepositoryError::from_constraint(e, "category name already exists"))
}

/// Rename or re-describe a category.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the category doesn't exist, or
/// `RepositoryError::Conflict` if the new name is taken.
pub async fn update<'e>(
    db: impl PgExecutor<'e>,
    id: CategoryId,
    input: &CategoryInput,
) -> Result<Category, RepositoryError> {
    sqlx::query_as::<_, Category>(&format!(
        r"
        UPDATE fydo.category SET name = $2, description = $3
        WHERE id = $1
        RETURNING {CATEGORY_COLUMNS}
        "
    ))
    .bind(id)
    .bind(&input.name)
    .bind(input.description.as_deref())
    .fetch_optional(db)
    .await
    .map_err(|e| RepositoryError::from_constraint(e, "category name already exists"))?
    .ok_or(RepositoryError::NotFound)
}

/// Delete a category and its criteria.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the category doesn't exist, or
/// `RepositoryError::Conflict` if products still reference it.
pub async fn delete<'e>(db: impl PgExecutor<'e>, id: CategoryId) -> Result<(), RepositoryError> {
    let result = sqlx::query("DELETE FROM fydo.category WHERE id = $1")
        .bind(id)
        .execute(db)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "category still has products"))?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Criteria attached to a category, or the global ones for `None`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn criteria<'e>(
    db: impl PgExecutor<'e>,
    category_id: Option<CategoryId>,
) -> Result<Vec<ReviewCriterion>, RepositoryError> {
    let criteria = sqlx::query_as::<_, ReviewCriterion>(&format!(
        r"
        SELECT {CRITERION_COLUMNS} FROM fydo.review_criterion
        WHERE category_id IS NOT DISTINCT FROM $1
        ORDER BY display_order, id
        "
    ))
    .bind(category_id)
    .fetch_all(db)
    .await?;

    Ok(criteria)
}

/// Add a criterion to a category, or a global one for `None`.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the key is already used in that
/// scope or the category doesn't exist.
pub async fn insert_criterion<'e>(
    db: impl PgExecutor<'e>,
    category_id: Option<CategoryId>,
    input: &CriterionInput,
) -> Result<ReviewCriterion, RepositoryError> {
    sqlx::query_as::<_, ReviewCriterion>(&format!(
        r"
        INSERT INTO fydo.review_criterion (category_id, key, name, description, weight, display_order)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {CRITERION_COLUMNS}
        "
    ))
    .bind(category_id)
    .bind(&input.key)
    .bind(&input.name)
    .bind(input.description.as_deref())
    .bind(input.weight)
    .bind(input.display_order)
    .fetch_one(db)
    .await
    .map_err(|e| RepositoryError::from_constraint(e, "criterion key exists or category missing"))
}

/// Replace a criterion's fields.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the criterion doesn't exist.
pub async fn update_criterion<'e>(
    db: impl PgExecutor<'e>,
    id: CriterionId,
    input: &CriterionInput,
) -> Result<ReviewCriterion, RepositoryError> {
    sqlx::query_as::<_, ReviewCriterion>(&format!(
        r"
        UPDATE fydo.review_criterion
        SET key = $2, name = $3, description = $4, weight = $5, display_order = $6
        WHERE id = $1
        RETURNING {CRITERION_COLUMNS}
        "
    ))
    .bind(id)
    .bind(&input.key)
    .bind(&input.name)
    .bind(input.description.as_deref())
    .bind(input.weight)
    .bind(input.display_order)
    .fetch_optional(db)
    .await
    .map_err(|e| RepositoryError::from_constraint(e, "criterion key already exists"))?
    .ok_or(RepositoryError::NotFound)
}

/// Delete a criterion.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the criterion doesn't exist.
pub async fn delete_criterion<'e>(
    db: impl PgExecutor<'e>,
    id: CriterionId,
) -> Result<(), RepositoryError> {
    let result = sqlx::query("DELETE FROM fydo.review_criterion WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}
