use actix_web::{delete, get, post, put, web, HttpResponse};
use sea_orm::DatabaseConnection;
use validator::Validate;

use crate::error::ShopError;
use crate::middleware::AuthUser;
use crate::models::dto::{AddCartItemRequest, UpdateCartItemRequest};
use crate::routes::validation_failed;
use crate::services::cart_service::CartService;

/// GET /api/v1/cart - Lignes du panier et totaux
#[get("")]
pub async fn get_cart(
    auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ShopError> {
    let lines = CartService::lines(db.get_ref(), auth_user.user_id).await?;
    let summary = CartService::summary(&lines);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": {
            "items": lines,
            "summary": summary
        }
    })))
}

/// POST /api/v1/cart - Ajouter un produit
#[post("")]
pub async fn add_item(
    auth_user: AuthUser,
    body: web::Json<AddCartItemRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ShopError> {
    if let Err(errors) = body.validate() {
        return Ok(validation_failed(errors));
    }

    let item = CartService::add_item(db.get_ref(), auth_user.user_id, body.into_inner()).await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "message": "Item added to cart",
        "data": item
    })))
}

/// PUT /api/v1/cart/{id} - Modifier la quantité
#[put("/{id}")]
pub async fn update_item(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<UpdateCartItemRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ShopError> {
    if let Err(errors) = body.validate() {
        return Ok(validation_failed(errors));
    }

    let item = CartService::update_item(db.get_ref(), auth_user.user_id, path.into_inner(), body.into_inner()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Cart updated",
        "data": item
    })))
}

/// DELETE /api/v1/cart/{id}
#[delete("/{id}")]
pub async fn remove_item(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ShopError> {
    CartService::remove_item(db.get_ref(), auth_user.user_id, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Item removed from cart"
    })))
}

/// DELETE /api/v1/cart - Vider le panier
#[delete("")]
pub async fn clear_cart(
    auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ShopError> {
    CartService::clear(db.get_ref(), auth_user.user_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Cart cleared"
    })))
}

/// GET /api/v1/cart/count - Nombre d'articles (badge)
#[get("/count")]
pub async fn cart_count(
    auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ShopError> {
    let lines = CartService::lines(db.get_ref(), auth_user.user_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": { "count": CartService::summary(&lines).total_items }
    })))
}

pub fn cart_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/cart")
            .service(get_cart)
            .service(add_item)
            .service(clear_cart)
            .service(cart_count)
            .service(update_item)
            .service(remove_item)
    );
}
