use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::sea_query::{Condition, Expr};
use sea_orm::*;
use serde::Serialize;
use tracing::info;

use crate::error::{CouponRejection, ShopError};
use crate::models::coupon;
use crate::models::dto::CouponRequest;
use crate::models::enums::CouponType;

pub struct CouponService;

const COUPONS_PAGE_SIZE: u64 = 20;

/// Réponse de POST /coupons/validate
#[derive(Debug, Clone, Serialize)]
pub struct CouponQuote {
    pub valid: bool,
    pub discount_amount: Decimal,
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub coupon_type: CouponType,
    pub value: Decimal,
}

impl CouponService {
    /// Vérifie la fenêtre de validité, l'activation et la limite d'utilisation
    pub fn check(coupon: &coupon::Model, now: DateTime<Utc>) -> Result<(), CouponRejection> {
        if !coupon.is_active {
            return Err(CouponRejection::Inactive);
        }
        if coupon.starts_at.is_some_and(|starts_at| now < starts_at) {
            return Err(CouponRejection::NotStarted);
        }
        if coupon.expires_at.is_some_and(|expires_at| now > expires_at) {
            return Err(CouponRejection::Expired);
        }
        if coupon.usage_limit.is_some_and(|limit| coupon.used_count >= limit) {
            return Err(CouponRejection::UsageExhausted);
        }
        Ok(())
    }

    pub fn is_valid(coupon: &coupon::Model, now: DateTime<Utc>) -> bool {
        Self::check(coupon, now).is_ok()
    }

    /// Montant de la remise pour un montant de commande.
    /// Fonction pure : toujours entre 0 et `order_amount`.
    pub fn calculate_discount(coupon: &coupon::Model, order_amount: Decimal) -> Decimal {
        if order_amount <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        if coupon.minimum_amount.is_some_and(|minimum| order_amount < minimum) {
            return Decimal::ZERO;
        }

        let discount = match coupon.coupon_type {
            CouponType::Percentage => {
                let raw = (order_amount * coupon.value / Decimal::ONE_HUNDRED)
                    .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
                match coupon.maximum_discount {
                    Some(cap) => raw.min(cap),
                    None => raw,
                }
            }
            CouponType::Fixed => coupon.value.min(order_amount),
        };

        discount.max(Decimal::ZERO).min(order_amount)
    }

    pub async fn find_by_code<C: ConnectionTrait>(
        conn: &C,
        code: &str,
    ) -> Result<Option<coupon::Model>, DbErr> {
        coupon::Entity::find()
            .filter(coupon::Column::Code.eq(code))
            .one(conn)
            .await
    }

    /// Vérifie un code sans le consommer
    pub async fn validate_coupon(
        db: &DatabaseConnection,
        code: &str,
        order_amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<CouponQuote, ShopError> {
        let coupon = Self::find_by_code(db, code)
            .await?
            .ok_or(ShopError::InvalidCoupon(CouponRejection::NotFound))?;

        Self::check(&coupon, now).map_err(ShopError::InvalidCoupon)?;

        let discount_amount = Self::calculate_discount(&coupon, order_amount);
        if discount_amount <= Decimal::ZERO {
            return Err(ShopError::InvalidCoupon(CouponRejection::NotApplicable));
        }

        Ok(CouponQuote {
            valid: true,
            discount_amount,
            code: coupon.code,
            name: coupon.name,
            coupon_type: coupon.coupon_type,
            value: coupon.value,
        })
    }

    /// Liste admin, les plus récents d'abord. `page` est un index, 0 pour la première.
    pub async fn list_coupons(
        db: &DatabaseConnection,
        page: u64,
    ) -> Result<Vec<coupon::Model>, ShopError> {
        let coupons = coupon::Entity::find()
            .order_by_desc(coupon::Column::Id)
            .paginate(db, COUPONS_PAGE_SIZE)
            .fetch_page(page)
            .await?;
        Ok(coupons)
    }

    pub async fn get_coupon(db: &DatabaseConnection, id: i32) -> Result<coupon::Model, ShopError> {
        coupon::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(ShopError::NotFound("Coupon"))
    }

    pub async fn create_coupon(
        db: &DatabaseConnection,
        request: CouponRequest,
    ) -> Result<coupon::Model, ShopError> {
        Self::ensure_code_free(db, &request.code, None).await?;

        let mut active = coupon::ActiveModel {
            used_count: Set(0),
            ..Default::default()
        };
        Self::apply_request(&mut active, request);
        let coupon = active.insert(db).await?;

        info!(coupon_id = coupon.id, code = %coupon.code, "coupon created");
        Ok(coupon)
    }

    /// Remplace la définition du coupon ; `used_count` est conservé
    pub async fn update_coupon(
        db: &DatabaseConnection,
        id: i32,
        request: CouponRequest,
    ) -> Result<coupon::Model, ShopError> {
        let coupon = Self::get_coupon(db, id).await?;
        Self::ensure_code_free(db, &request.code, Some(id)).await?;

        let mut active: coupon::ActiveModel = coupon.into();
        Self::apply_request(&mut active, request);
        Ok(active.update(db).await?)
    }

    /// Les commandes gardent le code en texte, la suppression ne les touche pas
    pub async fn delete_coupon(db: &DatabaseConnection, id: i32) -> Result<(), ShopError> {
        let result = coupon::Entity::delete_by_id(id).exec(db).await?;
        if result.rows_affected == 0 {
            return Err(ShopError::NotFound("Coupon"));
        }
        info!(coupon_id = id, "coupon deleted");
        Ok(())
    }

    fn apply_request(active: &mut coupon::ActiveModel, request: CouponRequest) {
        active.code = Set(request.code);
        active.name = Set(request.name);
        active.coupon_type = Set(request.coupon_type);
        active.value = Set(request.value);
        active.minimum_amount = Set(request.minimum_amount);
        active.maximum_discount = Set(request.maximum_discount);
        active.usage_limit = Set(request.usage_limit);
        active.usage_limit_per_user = Set(request.usage_limit_per_user);
        active.is_active = Set(request.is_active.unwrap_or(true));
        active.starts_at = Set(request.starts_at);
        active.expires_at = Set(request.expires_at);
    }

    async fn ensure_code_free(
        db: &DatabaseConnection,
        code: &str,
        except_id: Option<i32>,
    ) -> Result<(), ShopError> {
        match Self::find_by_code(db, code).await? {
            Some(existing) if Some(existing.id) != except_id => {
                Err(ShopError::Conflict("Coupon code"))
            }
            _ => Ok(()),
        }
    }

    /// Incrémente used_count si la limite n'est pas atteinte.
    /// Retourne false si une autre commande a pris la dernière utilisation.
    pub async fn redeem<C: ConnectionTrait>(conn: &C, coupon: &coupon::Model) -> Result<bool, DbErr> {
        let result = coupon::Entity::update_many()
            .col_expr(coupon::Column::UsedCount, Expr::col(coupon::Column::UsedCount).add(1))
            .filter(coupon::Column::Id.eq(coupon.id))
            .filter(
                Condition::any()
                    .add(coupon::Column::UsageLimit.is_null())
                    .add(Expr::col(coupon::Column::UsedCount).lt(Expr::col(coupon::Column::UsageLimit))),
            )
            .exec(conn)
            .await?;

        Ok(result.rows_affected == 1)
    }
}
