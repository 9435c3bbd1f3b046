use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::*;

use crate::error::ShopError;
use crate::models::dto::{AddCartItemRequest, CartSummary, UpdateCartItemRequest};
use crate::models::enums::ProductStatus;
use crate::models::{cart_item, product};
use crate::services::pricing::line_total;
use crate::services::stock_service::StockService;

pub struct CartService;

/// Ligne du panier avec son produit
#[derive(Debug, Clone, serde::Serialize)]
pub struct CartLine {
    #[serde(flatten)]
    pub item: cart_item::Model,
    pub product: product::Model,
}

impl CartLine {
    pub fn unit_price(&self) -> Decimal {
        self.product.final_price()
    }

    pub fn total_price(&self) -> Decimal {
        line_total(self.unit_price(), self.item.quantity)
    }
}

impl CartService {
    pub async fn lines<C: ConnectionTrait>(conn: &C, user_id: i32) -> Result<Vec<CartLine>, DbErr> {
        let rows = cart_item::Entity::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .order_by_asc(cart_item::Column::Id)
            .find_also_related(product::Entity)
            .all(conn)
            .await?;

        // La FK est en cascade : une ligne sans produit ne devrait pas exister
        Ok(rows
            .into_iter()
            .filter_map(|(item, product)| product.map(|product| CartLine { item, product }))
            .collect())
    }

    pub fn summary(lines: &[CartLine]) -> CartSummary {
        let subtotal: Decimal = lines.iter().map(CartLine::total_price).sum();
        CartSummary {
            total_items: lines.iter().map(|line| i64::from(line.item.quantity)).sum(),
            subtotal,
            shipping_cost: Decimal::ZERO,
            total: subtotal,
        }
    }

    /// Ajoute un produit (ou augmente la quantité s'il est déjà dans le panier)
    pub async fn add_item(
        db: &DatabaseConnection,
        user_id: i32,
        request: AddCartItemRequest,
    ) -> Result<cart_item::Model, ShopError> {
        let product = product::Entity::find_by_id(request.product_id)
            .filter(product::Column::Status.eq(ProductStatus::Active))
            .filter(product::Column::InStock.eq(true))
            .one(db)
            .await?
            .ok_or(ShopError::NotFound("Product"))?;

        let existing = Self::find_line(db, user_id, product.id).await?;
        let already = existing.map_or(0, |item| item.quantity);
        StockService::ensure_available(&product, already + request.quantity)?;

        // Insertion ou cumul en une requête : l'index unique (user_id, product_id)
        // départage deux ajouts simultanés du même produit
        cart_item::Entity::insert(cart_item::ActiveModel {
            user_id: Set(user_id),
            product_id: Set(product.id),
            quantity: Set(request.quantity),
            selected_attributes: Set(request.selected_attributes),
            ..Default::default()
        })
        .on_conflict(
            OnConflict::columns([cart_item::Column::UserId, cart_item::Column::ProductId])
                .value(
                    cart_item::Column::Quantity,
                    Expr::col((cart_item::Entity, cart_item::Column::Quantity))
                        .add(Expr::cust("excluded.quantity")),
                )
                .update_column(cart_item::Column::SelectedAttributes)
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

        Self::find_line(db, user_id, product.id)
            .await?
            .ok_or(ShopError::NotFound("Cart item"))
    }

    pub async fn update_item(
        db: &DatabaseConnection,
        user_id: i32,
        item_id: i32,
        request: UpdateCartItemRequest,
    ) -> Result<cart_item::Model, ShopError> {
        let (item, product) = Self::owned_item(db, user_id, item_id).await?;
        StockService::ensure_available(&product, request.quantity)?;

        let mut active: cart_item::ActiveModel = item.into();
        active.quantity = Set(request.quantity);
        active.selected_attributes = Set(request.selected_attributes);

        Ok(active.update(db).await?)
    }

    pub async fn remove_item(db: &DatabaseConnection, user_id: i32, item_id: i32) -> Result<(), ShopError> {
        let (item, _) = Self::owned_item(db, user_id, item_id).await?;
        item.delete(db).await?;
        Ok(())
    }

    pub async fn clear<C: ConnectionTrait>(conn: &C, user_id: i32) -> Result<u64, DbErr> {
        let result = cart_item::Entity::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    async fn find_line(
        db: &DatabaseConnection,
        user_id: i32,
        product_id: i32,
    ) -> Result<Option<cart_item::Model>, DbErr> {
        cart_item::Entity::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(db)
            .await
    }

    async fn owned_item(
        db: &DatabaseConnection,
        user_id: i32,
        item_id: i32,
    ) -> Result<(cart_item::Model, product::Model), ShopError> {
        let (item, product) = cart_item::Entity::find_by_id(item_id)
            .find_also_related(product::Entity)
            .one(db)
            .await?
            .ok_or(ShopError::NotFound("Cart item"))?;

        if item.user_id != user_id {
            return Err(ShopError::Unauthorized);
        }
        let product = product.ok_or(ShopError::NotFound("Product"))?;

        Ok((item, product))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_for_tests;
    use crate::test_support;
    use rust_decimal_macros::dec;

    fn add(product_id: i32, quantity: i32) -> AddCartItemRequest {
        AddCartItemRequest {
            product_id,
            quantity,
            selected_attributes: None,
        }
    }

    #[tokio::test]
    async fn test_add_merges_quantities_and_checks_stock() {
        let db = connect_for_tests().await;
        let p = test_support::insert_product(&db, "SKU-1", dec!(20), 5, true).await;

        CartService::add_item(&db, 1, add(p.id, 2)).await.unwrap();
        let item = CartService::add_item(&db, 1, add(p.id, 3)).await.unwrap();
        assert_eq!(item.quantity, 5);

        let err = CartService::add_item(&db, 1, add(p.id, 1)).await.unwrap_err();
        assert!(matches!(err, ShopError::InsufficientStock { available: 5, .. }));

        let lines = CartService::lines(&db, 1).await.unwrap();
        assert_eq!(lines.len(), 1);
        let summary = CartService::summary(&lines);
        assert_eq!(summary.total_items, 5);
        assert_eq!(summary.subtotal, dec!(100));
    }

    #[tokio::test]
    async fn test_other_users_items_are_protected() {
        let db = connect_for_tests().await;
        let p = test_support::insert_product(&db, "SKU-1", dec!(20), 5, true).await;
        let item = CartService::add_item(&db, 1, add(p.id, 1)).await.unwrap();

        let err = CartService::remove_item(&db, 2, item.id).await.unwrap_err();
        assert!(matches!(err, ShopError::Unauthorized));

        CartService::remove_item(&db, 1, item.id).await.unwrap();
        assert!(CartService::lines(&db, 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_same_product_never_gets_two_lines() {
        let db = connect_for_tests().await;
        let p = test_support::insert_product(&db, "SKU-1", dec!(20), 10, true).await;
        test_support::add_to_cart(&db, 1, p.id, 1).await;

        // Une deuxième ligne brute pour le même produit est refusée par la BD
        let duplicate = cart_item::ActiveModel {
            user_id: Set(1),
            product_id: Set(p.id),
            quantity: Set(1),
            selected_attributes: Set(None),
            ..Default::default()
        }
        .insert(&db)
        .await;
        assert!(duplicate.is_err());

        let item = CartService::add_item(&db, 1, add(p.id, 2)).await.unwrap();
        assert_eq!(item.quantity, 3);
        assert_eq!(CartService::lines(&db, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_only_touches_one_user() {
        let db = connect_for_tests().await;
        let p = test_support::insert_product(&db, "SKU-1", dec!(20), 10, true).await;
        test_support::add_to_cart(&db, 1, p.id, 1).await;
        test_support::add_to_cart(&db, 2, p.id, 1).await;

        assert_eq!(CartService::clear(&db, 1).await.unwrap(), 1);
        assert_eq!(CartService::lines(&db, 2).await.unwrap().len(), 1);
    }
}
