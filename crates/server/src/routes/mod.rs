//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                              - Liveness
//! GET    /health/ready                        - Readiness (database)
//!
//! # Profile (x-fydo-user required)
//! GET    /api/me                              - Profile, created on first call
//! PATCH  /api/me                              - Update profile
//! PUT    /api/me/subscription                 - Update subscription
//! GET    /api/me/reviews                      - Own reviews, any status
//! GET    /api/me/challenges                   - Running challenges with progress
//! POST   /api/scans                           - Record a barcode scan
//!
//! # Products
//! POST   /api/products/{id}/favorite          - Toggle favorite
//! GET    /api/products/{id}/reviews           - Published reviews
//!
//! # Reviews
//! POST   /api/reviews                         - Submit a review
//! DELETE /api/reviews/{id}                    - Delete own review
//! POST   /api/reviews/{id}/receipt            - Link a receipt
//!
//! # Receipts
//! POST   /api/receipts                        - Register a receipt
//! GET    /api/receipts                        - Own receipts
//! GET    /api/receipts/{id}                   - Receipt with lines
//! DELETE /api/receipts/{id}                   - Delete receipt
//! PUT    /api/receipts/{id}/visibility        - Toggle public image
//!
//! # Categories
//! GET    /api/categories                      - List
//! GET    /api/categories/{id}/criteria        - Criteria (global fallback)
//!
//! # Admin (is_admin required)
//! POST   /api/admin/categories                - Create category
//! PATCH  /api/admin/categories/{id}           - Update category
//! DELETE /api/admin/categories/{id}           - Delete category
//! POST   /api/admin/categories/{id}/criteria  - Add criterion
//! POST   /api/admin/criteria                  - Add global criterion
//! PATCH  /api/admin/criteria/{id}             - Update criterion
//! DELETE /api/admin/criteria/{id}             - Delete criterion
//! GET    /api/admin/reviews/pending           - Moderation queue
//! POST   /api/admin/reviews/{id}/moderate     - Approve or reject
//! POST   /api/admin/products/{id}/ai-review   - Generate AI review
//! POST   /api/admin/products/{id}/recalculate - Recompute ratings
//! POST   /api/admin/users/{id}/points         - Grant or remove points
//! POST   /api/admin/challenges                - Create challenge
//! DELETE /api/admin/challenges/{id}           - Deactivate challenge
//! ```

use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod categories;
pub mod me;
pub mod products;
pub mod receipts;
pub mod reviews;

/// All API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(me::router())
        .merge(products::router())
        .merge(reviews::router())
        .merge(receipts::router())
        .merge(categories::router())
        .merge(admin::router())
}
