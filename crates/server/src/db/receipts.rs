//! Receipt repository.

use rust_decimal::Decimal;
use sqlx::PgExecutor;

use fydo_core::{ReceiptId, ReceiptItemId, UserId};

use super::RepositoryError;
use crate::models::{NewReceipt, NewReceiptItem, Receipt, ReceiptItem};

const RECEIPT_COLUMNS: &str = r"
    id, user_id, storage_path, store_name, total_amount, purchased_at, is_public, created_at
";

const ITEM_COLUMNS: &str = "id, receipt_id, designation, quantity, unit_price, total_price";

/// Insert a receipt header.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the user doesn't exist.
pub async fn insert<'e>(
    db: impl PgExecutor<'e>,
    user_id: UserId,
    receipt: &NewReceipt,
) -> Result<Receipt, RepositoryError> {
    sqlx::query_as::<_, Receipt>(&format!(
        r"
        INSERT INTO fydo.receipt (user_id, storage_path, store_name, total_amount, purchased_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {RECEIPT_COLUMNS}
        "
    ))
    .bind(user_id)
    .bind(&receipt.storage_path)
    .bind(receipt.store_name.as_deref())
    .bind(receipt.total_amount)
    .bind(receipt.purchased_at)
    .fetch_one(db)
    .await
    .map_err(|e| RepositoryError::from_constraint(e, "user does not exist"))
}

/// Insert the lines of a receipt.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn insert_items<'e>(
    db: impl PgExecutor<'e>,
    receipt_id: ReceiptId,
    items: &[NewReceiptItem],
) -> Result<Vec<ReceiptItem>, RepositoryError> {
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let designations: Vec<&str> = items.iter().map(|i| i.designation.as_str()).collect();
    let quantities: Vec<Decimal> = items.iter().map(|i| i.quantity).collect();
    let unit_prices: Vec<Option<Decimal>> = items.iter().map(|i| i.unit_price).collect();
    let total_prices: Vec<Option<Decimal>> = items.iter().map(|i| i.total_price).collect();

    let rows = sqlx::query_as::<_, ReceiptItem>(&format!(
        r"
        INSERT INTO fydo.receipt_item (receipt_id, designation, quantity, unit_price, total_price)
        SELECT $1, designation, quantity, unit_price, total_price
        FROM UNNEST($2::TEXT[], $3::NUMERIC[], $4::NUMERIC[], $5::NUMERIC[])
            WITH ORDINALITY AS t(designation, quantity, unit_price, total_price, ord)
        ORDER BY ord
        RETURNING {ITEM_COLUMNS}
        "
    ))
    .bind(receipt_id)
    .bind(&designations)
    .bind(&quantities)
    .bind(&unit_prices)
    .bind(&total_prices)
    .fetch_all(db)
    .await?;

    Ok(rows)
}

/// Get a receipt by ID.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_by_id<'e>(
    db: impl PgExecutor<'e>,
    id: ReceiptId,
) -> Result<Option<Receipt>, RepositoryError> {
    let receipt = sqlx::query_as::<_, Receipt>(&format!(
        "SELECT {RECEIPT_COLUMNS} FROM fydo.receipt WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;

    Ok(receipt)
}

/// Lines of a receipt in insertion order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn items<'e>(
    db: impl PgExecutor<'e>,
    receipt_id: ReceiptId,
) -> Result<Vec<ReceiptItem>, RepositoryError> {
    let items = sqlx::query_as::<_, ReceiptItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM fydo.receipt_item WHERE receipt_id = $1 ORDER BY id"
    ))
    .bind(receipt_id)
    .fetch_all(db)
    .await?;

    Ok(items)
}

/// Get one line, only if it belongs to `receipt_id`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_item<'e>(
    db: impl PgExecutor<'e>,
    receipt_id: ReceiptId,
    item_id: ReceiptItemId,
) -> Result<Option<ReceiptItem>, RepositoryError> {
    let item = sqlx::query_as::<_, ReceiptItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM fydo.receipt_item WHERE id = $1 AND receipt_id = $2"
    ))
    .bind(item_id)
    .bind(receipt_id)
    .fetch_optional(db)
    .await?;

    Ok(item)
}

/// Receipts of a user, newest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_for_user<'e>(
    db: impl PgExecutor<'e>,
    user_id: UserId,
) -> Result<Vec<Receipt>, RepositoryError> {
    let receipts = sqlx::query_as::<_, Receipt>(&format!(
        "SELECT {RECEIPT_COLUMNS} FROM fydo.receipt WHERE user_id = $1 ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(db)
    .await?;

    Ok(receipts)
}

/// Set whether the receipt image may be shown publicly.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the receipt doesn't exist.
pub async fn set_public<'e>(
    db: impl PgExecutor<'e>,
    id: ReceiptId,
    is_public: bool,
) -> Result<Receipt, RepositoryError> {
    sqlx::query_as::<_, Receipt>(&format!(
        "UPDATE fydo.receipt SET is_public = $2 WHERE id = $1 RETURNING {RECEIPT_COLUMNS}"
    ))
    .bind(id)
    .bind(is_public)
    .fetch_optional(db)
    .await?
    .ok_or(RepositoryError::NotFound)
}

/// Delete a receipt and its lines.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the receipt doesn't exist.
pub async fn delete<'e>(db: impl PgExecutor<'e>, id: ReceiptId) -> Result<(), RepositoryError> {
    let result = sqlx::query("DELETE FROM fydo.receipt WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}
