//! User profiles, activity counters, loyalty points and subscriptions.

use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, instrument};

use fydo_core::{Barcode, ChallengeKind, ProductId, UserId, UserStatus};

use super::challenges::{ActivityOutcome, record_activity_in};
use crate::db::users::Counter;
use crate::db::{self, RepositoryError};
use crate::error::AppError;
use crate::models::user::validate_display_name;
use crate::models::{Product, ProfileUpdate, SubscriptionUpdate, User};

/// Display name given to profiles created without one.
pub const DEFAULT_DISPLAY_NAME: &str = "Fydo user";

/// Result of a barcode scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub product: Product,
    pub challenges: ActivityOutcome,
}

/// Result of toggling a favorite.
#[derive(Debug, Clone, Serialize)]
pub struct FavoriteToggle {
    pub product_id: ProductId,
    pub favorited: bool,
}

/// Points balance after a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PointsBalance {
    pub points: i32,
    pub status: UserStatus,
}

/// Profile workflows.
#[derive(Clone)]
pub struct ProfileService {
    pool: PgPool,
}

impl ProfileService {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The profile for an identity, created on first sight.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if the supplied display name is invalid.
    #[instrument(skip(self, display_name))]
    pub async fn get_or_create_profile(
        &self,
        external_id: &str,
        display_name: Option<&str>,
    ) -> Result<User, AppError> {
        if let Some(user) = db::users::get_by_external_id(&self.pool, external_id).await? {
            return Ok(user);
        }

        let display_name = match display_name {
            Some(name) => validate_display_name(name)?,
            None => DEFAULT_DISPLAY_NAME.to_string(),
        };
        let user = db::users::upsert_by_external_id(&self.pool, external_id, &display_name).await?;
        info!(user_id = %user.id, "Profile created");
        Ok(user)
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the user doesn't exist.
    pub async fn get_profile(&self, user_id: UserId) -> Result<User, AppError> {
        db::users::get_by_id(&self.pool, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))
    }

    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for invalid fields.
    #[instrument(skip(self, update))]
    pub async fn update_profile(
        &self,
        user_id: UserId,
        update: ProfileUpdate,
    ) -> Result<User, AppError> {
        let update = update.validate()?;
        Ok(db::users::update_profile(&self.pool, user_id, &update).await?)
    }

    /// Record a barcode scan and return the scanned product.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a malformed barcode or
    /// `AppError::NotFound` when no product carries it.
    #[instrument(skip(self))]
    pub async fn record_scan(&self, user_id: UserId, barcode: &str) -> Result<ScanResult, AppError> {
        let barcode =
            Barcode::parse(barcode).map_err(|e| AppError::BadRequest(e.to_string()))?;
        let product = db::products::get_by_barcode(&self.pool, &barcode)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("product with barcode {barcode}")))?;

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        db::products::record_scan(&mut *tx, user_id, product.id).await?;
        db::users::bump_counter(&mut *tx, user_id, Counter::Scans, 1).await?;
        let challenges =
            record_activity_in(&mut tx, user_id, ChallengeKind::Scan, Utc::now()).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        Ok(ScanResult {
            product,
            challenges,
        })
    }

    /// Add the product to favorites, or remove it if already there.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown product.
    #[instrument(skip(self))]
    pub async fn toggle_favorite(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<FavoriteToggle, AppError> {
        if db::products::get_by_id(&self.pool, product_id).await?.is_none() {
            return Err(AppError::NotFound(format!("product {product_id}")));
        }

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let favorited = if db::products::remove_favorite(&mut *tx, user_id, product_id).await? {
            db::users::bump_counter(&mut *tx, user_id, Counter::Favorites, -1).await?;
            db::products::bump_favorites(&mut *tx, product_id, -1).await?;
            false
        } else if db::products::add_favorite(&mut *tx, user_id, product_id).await? {
            db::users::bump_counter(&mut *tx, user_id, Counter::Favorites, 1).await?;
            db::products::bump_favorites(&mut *tx, product_id, 1).await?;
            record_activity_in(&mut tx, user_id, ChallengeKind::Favorite, Utc::now()).await?;
            true
        } else {
            // A concurrent toggle added it first.
            true
        };
        tx.commit().await.map_err(RepositoryError::from)?;

        Ok(FavoriteToggle {
            product_id,
            favorited,
        })
    }

    /// Add (or with a negative value, remove) points and refresh the tier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the user doesn't exist.
    #[instrument(skip(self))]
    pub async fn add_points(&self, user_id: UserId, points: i32) -> Result<PointsBalance, AppError> {
        let (points, status) = db::users::add_points(&self.pool, user_id, points).await?;
        Ok(PointsBalance { points, status })
    }

    /// Store the subscription state reported by billing.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the user doesn't exist.
    #[instrument(skip(self, update), fields(plan = ?update.plan, status = ?update.status))]
    pub async fn update_subscription(
        &self,
        user_id: UserId,
        update: SubscriptionUpdate,
    ) -> Result<User, AppError> {
        let user = db::users::update_subscription(
            &self.pool,
            user_id,
            update.plan,
            update.status,
            update.renews_at,
        )
        .await?;
        info!("Subscription updated");
        Ok(user)
    }
}
