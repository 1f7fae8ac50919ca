//! The caller's receipts.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use serde::{Deserialize, Serialize};

use fydo_core::ReceiptId;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::models::{NewReceipt, Receipt, ReceiptWithItems};
use crate::state::AppState;

/// Build the receipts router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/receipts", get(list_receipts).post(create_receipt))
        .route("/api/receipts/{id}", get(get_receipt).delete(delete_receipt))
        .route("/api/receipts/{id}/visibility", put(set_visibility))
}

/// A receipt with its public image URL, when it has one.
#[derive(Debug, Serialize)]
pub struct ReceiptView<T> {
    #[serde(flatten)]
    pub receipt: T,
    pub public_url: Option<String>,
}

/// Visibility toggle body.
#[derive(Debug, Deserialize)]
pub struct VisibilityRequest {
    pub is_public: bool,
}

fn view<T>(state: &AppState, receipt: &Receipt, inner: T) -> ReceiptView<T> {
    ReceiptView {
        public_url: state.receipts().public_receipt_url(receipt),
        receipt: inner,
    }
}

async fn create_receipt(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<NewReceipt>,
) -> Result<(StatusCode, Json<ReceiptWithItems>), AppError> {
    let receipt = state.receipts().create_receipt(user.id, body).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn list_receipts(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ReceiptView<Receipt>>>, AppError> {
    let receipts = state.receipts().list_user_receipts(user.id).await?;
    let views = receipts
        .into_iter()
        .map(|r| {
            let public_url = state.receipts().public_receipt_url(&r);
            ReceiptView {
                receipt: r,
                public_url,
            }
        })
        .collect();
    Ok(Json(views))
}

async fn get_receipt(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<ReceiptId>,
) -> Result<Json<ReceiptView<ReceiptWithItems>>, AppError> {
    let receipt = state.receipts().get_receipt(user.id, id).await?;
    let header = receipt.receipt.clone();
    Ok(Json(view(&state, &header, receipt)))
}

async fn delete_receipt(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<ReceiptId>,
) -> Result<StatusCode, AppError> {
    state.receipts().delete_receipt(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_visibility(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<ReceiptId>,
    Json(body): Json<VisibilityRequest>,
) -> Result<Json<ReceiptView<Receipt>>, AppError> {
    let receipt = state
        .receipts()
        .set_receipt_visibility(user.id, id, body.is_public)
        .await?;
    Ok(Json(view(&state, &receipt, receipt.clone())))
}
