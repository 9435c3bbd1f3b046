use actix_web::{delete, get, patch, post, put, web, HttpResponse};
use sea_orm::DatabaseConnection;
use validator::Validate;

use crate::error::ShopError;
use crate::middleware::AuthUser;
use crate::models::dto::{
    page_index, CouponRequest, OrderQuery, PageQuery, UpdateOrderStatusRequest,
    UpdatePaymentStatusRequest, UpdateStockRequest,
};
use crate::routes::validation_failed;
use crate::services::coupon_service::CouponService;
use crate::services::order_service::OrderService;
use crate::services::stock_service::StockService;

/// GET /api/admin/orders - Toutes les commandes (?status=...&payment_status=...&page=...)
#[get("")]
pub async fn list_orders(
    auth_user: AuthUser,
    query: web::Query<OrderQuery>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ShopError> {
    auth_user.require_admin()?;

    let orders = OrderService::list_orders(db.get_ref(), None, &query).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": orders
    })))
}

/// GET /api/admin/orders/{id}
#[get("/{id}")]
pub async fn show_order(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ShopError> {
    auth_user.require_admin()?;

    let details = OrderService::order_details(db.get_ref(), path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": details
    })))
}

/// PUT /api/admin/orders/{id} - Statut, notes, frais de port
#[put("/{id}")]
pub async fn update_order(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<UpdateOrderStatusRequest>,
    db: web::Data<DatabaseConnection>,
    orders: web::Data<OrderService>,
) -> Result<HttpResponse, ShopError> {
    auth_user.require_admin()?;

    let details = orders
        .update_order_status(db.get_ref(), path.into_inner(), body.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Order updated successfully",
        "data": details
    })))
}

/// PUT /api/admin/orders/{id}/payment-status
#[put("/{id}/payment-status")]
pub async fn update_payment_status(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<UpdatePaymentStatusRequest>,
    db: web::Data<DatabaseConnection>,
    orders: web::Data<OrderService>,
) -> Result<HttpResponse, ShopError> {
    auth_user.require_admin()?;

    let details = orders
        .update_payment_status(db.get_ref(), path.into_inner(), body.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Payment status updated successfully",
        "data": details
    })))
}

/// PATCH /api/admin/products/{id}/stock - Réassort
#[patch("/{id}/stock")]
pub async fn update_stock(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<UpdateStockRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ShopError> {
    auth_user.require_admin()?;
    if let Err(errors) = body.validate() {
        return Ok(validation_failed(errors));
    }

    let product = StockService::set_stock(
        db.get_ref(),
        path.into_inner(),
        body.stock_quantity,
        body.in_stock,
    )
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Stock updated successfully",
        "data": product
    })))
}

/// GET /api/admin/coupons
#[get("")]
pub async fn list_coupons(
    auth_user: AuthUser,
    query: web::Query<PageQuery>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ShopError> {
    auth_user.require_admin()?;

    let coupons = CouponService::list_coupons(db.get_ref(), page_index(query.page)).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": coupons
    })))
}

/// POST /api/admin/coupons
#[post("")]
pub async fn create_coupon(
    auth_user: AuthUser,
    body: web::Json<CouponRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ShopError> {
    auth_user.require_admin()?;
    if let Err(errors) = body.validate() {
        return Ok(validation_failed(errors));
    }

    let coupon = CouponService::create_coupon(db.get_ref(), body.into_inner()).await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "message": "Coupon created successfully",
        "data": coupon
    })))
}

/// GET /api/admin/coupons/{id}
#[get("/{id}")]
pub async fn show_coupon(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ShopError> {
    auth_user.require_admin()?;

    let coupon = CouponService::get_coupon(db.get_ref(), path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": coupon
    })))
}

/// PUT /api/admin/coupons/{id}
#[put("/{id}")]
pub async fn update_coupon(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<CouponRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ShopError> {
    auth_user.require_admin()?;
    if let Err(errors) = body.validate() {
        return Ok(validation_failed(errors));
    }

    let coupon =
        CouponService::update_coupon(db.get_ref(), path.into_inner(), body.into_inner()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Coupon updated successfully",
        "data": coupon
    })))
}

/// DELETE /api/admin/coupons/{id}
#[delete("/{id}")]
pub async fn delete_coupon(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ShopError> {
    auth_user.require_admin()?;

    CouponService::delete_coupon(db.get_ref(), path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Coupon deleted successfully"
    })))
}

pub fn admin_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin/orders")
            .service(list_orders)
            .service(show_order)
            .service(update_order)
            .service(update_payment_status)
    )
    .service(web::scope("/admin/products").service(update_stock))
    .service(
        web::scope("/admin/coupons")
            .service(list_coupons)
            .service(create_coupon)
            .service(show_coupon)
            .service(update_coupon)
            .service(delete_coupon)
    );
}
