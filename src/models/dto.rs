// DTOs des requêtes/réponses de l'API
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::enums::{CouponType, EntryDirection, OrderStatus, PaymentMethod, PaymentStatus, TopUpMethod};
use super::order::Address;
use super::{order, order_item};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    #[validate(nested)]
    pub shipping_address: Address,
    #[validate(nested)]
    pub billing_address: Address,
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<String>,
    pub notes: Option<String>,
}

/// PUT /admin/orders/{id} (shipping_cost négatif refusé par OrderService)
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub shipping_cost: Option<Decimal>,
}

/// PUT /admin/orders/{id}/payment-status
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePaymentStatusRequest {
    pub payment_status: PaymentStatus,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChargeWalletRequest {
    #[validate(custom(function = "top_up_amount"))]
    pub amount: Decimal,
    pub payment_method: TopUpMethod,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ValidateCouponRequest {
    #[validate(length(min = 1))]
    pub coupon_code: String,
    #[validate(custom(function = "non_negative"))]
    pub order_amount: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddCartItemRequest {
    pub product_id: i32,
    #[validate(range(min = 1, max = 100))]
    pub quantity: i32,
    pub selected_attributes: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateCartItemRequest {
    #[validate(range(min = 1, max = 100))]
    pub quantity: i32,
    pub selected_attributes: Option<serde_json::Value>,
}

/// PATCH /admin/products/{id}/stock
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateStockRequest {
    #[validate(range(min = 0))]
    pub stock_quantity: i32,
    /// Absent : suit la quantité (`stock_quantity > 0`)
    pub in_stock: Option<bool>,
}

/// POST /admin/coupons et PUT /admin/coupons/{id}
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "coupon_rules"))]
pub struct CouponRequest {
    #[validate(length(min = 1, max = 50))]
    pub code: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(rename = "type")]
    pub coupon_type: CouponType,
    pub value: Decimal,
    pub minimum_amount: Option<Decimal>,
    pub maximum_discount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub usage_limit_per_user: Option<i32>,
    pub is_active: Option<bool>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Filtres de liste des commandes
/// (?status=...&payment_status=...&search=...&date_from=2025-01-31&date_to=...&page=1)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    /// Recherche dans le numéro de commande
    pub search: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub page: Option<u64>,
}

/// ?page=... pour les listes simples (catalogue, coupons)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
}

/// Filtres de l'historique wallet (?type=debit&transaction_type=purchase&page=...)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionQuery {
    #[serde(rename = "type")]
    pub direction: Option<EntryDirection>,
    pub transaction_type: Option<String>,
    pub page: Option<u64>,
}

/// Commande avec ses lignes
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartSummary {
    pub total_items: i64,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
}

/// Les pages commencent à 1 ; 0 et l'absence de page donnent la première
pub fn page_index(page: Option<u64>) -> u64 {
    page.unwrap_or(1).saturating_sub(1)
}

fn coupon_rules(request: &CouponRequest) -> Result<(), ValidationError> {
    if request.value <= Decimal::ZERO {
        return Err(ValidationError::new("value_must_be_positive"));
    }
    if request.coupon_type == CouponType::Percentage && request.value > Decimal::ONE_HUNDRED {
        return Err(ValidationError::new("percentage_above_100"));
    }
    let negative = |amount: Option<Decimal>| amount.is_some_and(|a| a < Decimal::ZERO);
    if negative(request.minimum_amount) || negative(request.maximum_discount) {
        return Err(ValidationError::new("negative_amount"));
    }
    let below_one = |limit: Option<i32>| limit.is_some_and(|l| l < 1);
    if below_one(request.usage_limit) || below_one(request.usage_limit_per_user) {
        return Err(ValidationError::new("usage_limit_below_1"));
    }
    if let (Some(starts_at), Some(expires_at)) = (request.starts_at, request.expires_at) {
        if expires_at <= starts_at {
            return Err(ValidationError::new("expires_before_start"));
        }
    }
    Ok(())
}

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("negative"));
    }
    Ok(())
}

// Recharge entre 1 et 100000
fn top_up_amount(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ONE || *value > Decimal::from(100_000) {
        return Err(ValidationError::new("amount_out_of_range"));
    }
    Ok(())
}
