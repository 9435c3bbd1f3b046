pub mod health;
pub mod products;
pub mod cart;
pub mod orders;
pub mod wallet;
pub mod admin;

use actix_web::{web, HttpResponse};
use validator::ValidationErrors;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(health::health_check)
            .configure(admin::admin_routes)
            .service(
                web::scope("/v1")
                    .configure(products::products_routes)
                    .configure(cart::cart_routes)
                    .configure(orders::orders_routes)
                    .configure(orders::coupons_routes)
                    .configure(wallet::wallet_routes)
            )
    );
}

/// Réponse 400 commune quand `validator` rejette le corps de la requête
pub(crate) fn validation_failed(errors: ValidationErrors) -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({
        "success": false,
        "message": "Validation failed",
        "errors": errors
    }))
}
