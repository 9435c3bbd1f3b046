use actix_web::{get, post, web, HttpResponse};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use validator::Validate;

use crate::error::ShopError;
use crate::middleware::AuthUser;
use crate::models::dto::{OrderQuery, PlaceOrderRequest, ValidateCouponRequest};
use crate::routes::validation_failed;
use crate::services::coupon_service::CouponService;
use crate::services::order_service::OrderService;

/// GET /api/v1/orders - Commandes de l'utilisateur
#[get("")]
pub async fn list_orders(
    auth_user: AuthUser,
    query: web::Query<OrderQuery>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ShopError> {
    let orders = OrderService::list_orders(db.get_ref(), Some(auth_user.user_id), &query).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": orders
    })))
}

/// POST /api/v1/orders - Passer commande à partir du panier
#[post("")]
pub async fn place_order(
    auth_user: AuthUser,
    body: web::Json<PlaceOrderRequest>,
    db: web::Data<DatabaseConnection>,
    orders: web::Data<OrderService>,
) -> Result<HttpResponse, ShopError> {
    if let Err(errors) = body.validate() {
        return Ok(validation_failed(errors));
    }

    let details = orders
        .place_order(db.get_ref(), auth_user.user_id, body.into_inner())
        .await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "message": "Order created successfully",
        "data": details
    })))
}

/// GET /api/v1/orders/{id}
#[get("/{id}")]
pub async fn show_order(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ShopError> {
    let details = OrderService::order_for_user(db.get_ref(), path.into_inner(), auth_user.user_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": details
    })))
}

/// POST /api/v1/orders/{id}/cancel
#[post("/{id}/cancel")]
pub async fn cancel_order(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
    orders: web::Data<OrderService>,
) -> Result<HttpResponse, ShopError> {
    let details = orders
        .cancel_order(db.get_ref(), path.into_inner(), auth_user.user_id)
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Order cancelled successfully",
        "data": details
    })))
}

/// POST /api/v1/coupons/validate - Aperçu de la remise, sans consommer le coupon
#[post("/validate")]
pub async fn validate_coupon(
    _auth_user: AuthUser,
    body: web::Json<ValidateCouponRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ShopError> {
    if let Err(errors) = body.validate() {
        return Ok(validation_failed(errors));
    }

    let quote = CouponService::validate_coupon(db.get_ref(), &body.coupon_code, body.order_amount, Utc::now()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Coupon is valid",
        "data": quote
    })))
}

pub fn orders_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/orders")
            .service(list_orders)
            .service(place_order)
            .service(show_order)
            .service(cancel_order)
    );
}

pub fn coupons_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/coupons")
            .service(validate_coupon)
    );
}
