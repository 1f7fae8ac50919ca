//! Product repository, including favorites and scan history.

use sqlx::PgExecutor;

use fydo_core::{Barcode, CategoryId, ProductAggregate, ProductId, UserId};

use super::RepositoryError;
use crate::models::Product;

const PRODUCT_COLUMNS: &str = r"
    id, barcode, name, brand, category_id, image_url,
    average_rating, taste_rating, quantity_rating, price_rating,
    total_reviews, total_favorites, created_at
";

/// Get a product by ID.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_by_id<'e>(
    db: impl PgExecutor<'e>,
    id: ProductId,
) -> Result<Option<Product>, RepositoryError> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM fydo.product WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;

    Ok(product)
}

/// Get a product by barcode.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_by_barcode<'e>(
    db: impl PgExecutor<'e>,
    barcode: &Barcode,
) -> Result<Option<Product>, RepositoryError> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM fydo.product WHERE barcode = $1"
    ))
    .bind(barcode)
    .fetch_optional(db)
    .await?;

    Ok(product)
}

/// Lock a product row until the surrounding transaction ends.
///
/// Every write that reads-then-writes a product's reviews takes this lock
/// first, so concurrent submissions for the same product serialize.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the product doesn't exist.
pub async fn lock<'e>(db: impl PgExecutor<'e>, id: ProductId) -> Result<Product, RepositoryError> {
    sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM fydo.product WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?
    .ok_or(RepositoryError::NotFound)
}

/// Store recomputed rating aggregates.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the product doesn't exist.
pub async fn write_aggregate<'e>(
    db: impl PgExecutor<'e>,
    id: ProductId,
    aggregate: &ProductAggregate,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE fydo.product
        SET average_rating = $2, taste_rating = $3, quantity_rating = $4,
            price_rating = $5, total_reviews = $6
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(aggregate.average_rating)
    .bind(aggregate.taste_rating)
    .bind(aggregate.quantity_rating)
    .bind(aggregate.price_rating)
    .bind(aggregate.total_reviews)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Add `delta` to the favorites counter.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn bump_favorites<'e>(
    db: impl PgExecutor<'e>,
    id: ProductId,
    delta: i32,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE fydo.product SET total_favorites = GREATEST(total_favorites + $2, 0) WHERE id = $1",
    )
    .bind(id)
    .bind(delta)
    .execute(db)
    .await?;

    Ok(())
}

/// Number of products filed under a category.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn count_in_category<'e>(
    db: impl PgExecutor<'e>,
    category_id: CategoryId,
) -> Result<i64, RepositoryError> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM fydo.product WHERE category_id = $1")
            .bind(category_id)
            .fetch_one(db)
            .await?;

    Ok(count)
}

/// Products that have no generated review yet, oldest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_without_ai_review<'e>(
    db: impl PgExecutor<'e>,
    limit: i64,
) -> Result<Vec<Product>, RepositoryError> {
    let products = sqlx::query_as::<_, Product>(&format!(
        r"
        SELECT {PRODUCT_COLUMNS} FROM fydo.product p
        WHERE NOT EXISTS (
            SELECT 1 FROM fydo.review r WHERE r.product_id = p.id AND r.source = 'ai'
        )
        ORDER BY p.created_at ASC
        LIMIT $1
        "
    ))
    .bind(limit)
    .fetch_all(db)
    .await?;

    Ok(products)
}

/// Mark a product as favorite. Returns `false` if it already was.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the user or product doesn't exist.
pub async fn add_favorite<'e>(
    db: impl PgExecutor<'e>,
    user_id: UserId,
    product_id: ProductId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "INSERT INTO fydo.favorite (user_id, product_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(product_id)
    .execute(db)
    .await
    .map_err(|e| RepositoryError::from_constraint(e, "user or product does not exist"))?;

    Ok(result.rows_affected() == 1)
}

/// Remove a favorite. Returns `false` if there was none.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn remove_favorite<'e>(
    db: impl PgExecutor<'e>,
    user_id: UserId,
    product_id: ProductId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query("DELETE FROM fydo.favorite WHERE user_id = $1 AND product_id = $2")
        .bind(user_id)
        .bind(product_id)
        .execute(db)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Append a scan to the user's history.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn record_scan<'e>(
    db: impl PgExecutor<'e>,
    user_id: UserId,
    product_id: ProductId,
) -> Result<(), RepositoryError> {
    sqlx::query("INSERT INTO fydo.scan_history (user_id, product_id) VALUES ($1, $2)")
        .bind(user_id)
        .bind(product_id)
        .execute(db)
        .await?;

    Ok(())
}
