// Jeux de données pour les tests (base SQLite en mémoire)

use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

use crate::models::dto::PlaceOrderRequest;
use crate::models::enums::{CouponType, PaymentMethod, ProductStatus};
use crate::models::order::Address;
use crate::models::{cart_item, coupon, product};

pub async fn insert_product(
    db: &DatabaseConnection,
    sku: &str,
    price: Decimal,
    stock: i32,
    manage_stock: bool,
) -> product::Model {
    product::ActiveModel {
        name: Set(format!("Product {}", sku)),
        sku: Set(sku.to_string()),
        price: Set(price),
        sale_price: Set(None),
        stock_quantity: Set(stock),
        manage_stock: Set(manage_stock),
        in_stock: Set(stock > 0 || !manage_stock),
        status: Set(ProductStatus::Active),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn add_to_cart(db: &DatabaseConnection, user_id: i32, product_id: i32, quantity: i32) -> cart_item::Model {
    cart_item::ActiveModel {
        user_id: Set(user_id),
        product_id: Set(product_id),
        quantity: Set(quantity),
        selected_attributes: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn insert_coupon(
    db: &DatabaseConnection,
    code: &str,
    coupon_type: CouponType,
    value: Decimal,
    minimum_amount: Option<Decimal>,
    maximum_discount: Option<Decimal>,
    usage_limit: Option<i32>,
) -> coupon::Model {
    coupon::ActiveModel {
        code: Set(code.to_string()),
        name: Set(format!("Coupon {}", code)),
        coupon_type: Set(coupon_type),
        value: Set(value),
        minimum_amount: Set(minimum_amount),
        maximum_discount: Set(maximum_discount),
        usage_limit: Set(usage_limit),
        usage_limit_per_user: Set(None),
        used_count: Set(0),
        is_active: Set(true),
        starts_at: Set(None),
        expires_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub fn address() -> Address {
    Address {
        name: "Ada Lovelace".to_string(),
        phone: "+33 1 23 45 67 89".to_string(),
        street: "12 rue de la Paix".to_string(),
        city: "Paris".to_string(),
        state: "IDF".to_string(),
        postal_code: "75002".to_string(),
        country: "FR".to_string(),
    }
}

pub fn place_order_request(payment_method: PaymentMethod, coupon_code: Option<&str>) -> PlaceOrderRequest {
    PlaceOrderRequest {
        shipping_address: address(),
        billing_address: address(),
        payment_method,
        coupon_code: coupon_code.map(str::to_string),
        notes: None,
    }
}
