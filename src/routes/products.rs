use actix_web::{get, web, HttpResponse};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};

use crate::error::ShopError;
use crate::models::dto::{page_index, PageQuery};
use crate::models::enums::ProductStatus;
use crate::models::product::{self, Entity as Product};

const PRODUCTS_PAGE_SIZE: u64 = 20;

/// GET /api/v1/products - Catalogue actif
#[get("")]
pub async fn list_products(
    query: web::Query<PageQuery>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ShopError> {
    let products = Product::find()
        .filter(product::Column::Status.eq(ProductStatus::Active))
        .order_by_asc(product::Column::Name)
        .paginate(db.get_ref(), PRODUCTS_PAGE_SIZE)
        .fetch_page(page_index(query.page))
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": products
    })))
}

/// GET /api/v1/products/{id}
#[get("/{id}")]
pub async fn show_product(
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ShopError> {
    let product = Product::find_by_id(path.into_inner())
        .filter(product::Column::Status.eq(ProductStatus::Active))
        .one(db.get_ref())
        .await?
        .ok_or(ShopError::NotFound("Product"))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": {
            "product": product,
            "final_price": product.final_price()
        }
    })))
}

pub fn products_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/products")
            .service(list_products)
            .service(show_product)
    );
}
