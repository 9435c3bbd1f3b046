use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use rust_decimal::Decimal;
use sea_orm::DbErr;
use serde_json::json;
use thiserror::Error;

use crate::models::enums::OrderStatus;

/// Raisons pour lesquelles un coupon est refusé
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouponRejection {
    NotFound,
    Inactive,
    NotStarted,
    Expired,
    UsageExhausted,
    /// Remise nulle pour ce montant (minimum non atteint)
    NotApplicable,
}

impl CouponRejection {
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotFound => "Coupon not found",
            Self::Inactive => "Coupon is not active",
            Self::NotStarted => "Coupon is not valid yet",
            Self::Expired => "Coupon has expired",
            Self::UsageExhausted => "Coupon usage limit reached",
            Self::NotApplicable => "Coupon does not apply to this order amount",
        }
    }
}

#[derive(Debug, Error)]
pub enum ShopError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Insufficient stock for product {product_id}")]
    InsufficientStock { product_id: i32, available: i32 },

    #[error("Insufficient wallet balance: {available} available, {required} required")]
    InsufficientFunds { available: Decimal, required: Decimal },

    #[error("{}", .0.message())]
    InvalidCoupon(CouponRejection),

    #[error("Order cannot go from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Admin access required")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} already exists")]
    Conflict(&'static str),

    #[error("Amount must be greater than 0")]
    InvalidAmount,

    #[error("Could not generate a unique order number")]
    OrderNumberExhausted,

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl ResponseError for ShopError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::InvalidCoupon(CouponRejection::NotFound) => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::EmptyCart
            | Self::InsufficientStock { .. }
            | Self::InsufficientFunds { .. }
            | Self::InvalidCoupon(_)
            | Self::InvalidTransition { .. }
            | Self::InvalidAmount => StatusCode::UNPROCESSABLE_ENTITY,
            Self::OrderNumberExhausted | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let Self::Database(e) = self {
            tracing::error!(error = %e, "database error");
        }

        let mut body = json!({
            "success": false,
            "message": self.to_string(),
        });

        // Données structurées pour que le client puisse corriger sa requête
        match self {
            Self::InsufficientStock { product_id, available } => {
                body["product_id"] = json!(product_id);
                body["available_stock"] = json!(available);
            }
            Self::InsufficientFunds { available, required } => {
                body["available"] = json!(available);
                body["required"] = json!(required);
            }
            Self::InvalidTransition { from, to } => {
                body["from"] = json!(from);
                body["to"] = json!(to);
            }
            _ => {}
        }

        HttpResponse::build(self.status_code()).json(body)
    }
}
