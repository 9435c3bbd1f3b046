use sea_orm::sea_query::Expr;
use sea_orm::*;
use tracing::{info, warn};

use crate::error::ShopError;
use crate::models::product;

pub struct StockService;

impl StockService {
    /// Contrôle préalable, sans écriture. Ignoré si le produit ne gère pas de stock.
    pub fn ensure_available(product: &product::Model, quantity: i32) -> Result<(), ShopError> {
        if product.manage_stock && product.stock_quantity < quantity {
            return Err(ShopError::InsufficientStock {
                product_id: product.id,
                available: product.stock_quantity,
            });
        }
        Ok(())
    }

    /// Décrémente le stock. La condition `stock_quantity >= quantity` est
    /// évaluée par la BD au moment de l'écriture : deux commandes concurrentes
    /// ne peuvent pas vendre la même dernière unité.
    pub async fn reserve<C: ConnectionTrait>(
        conn: &C,
        product_id: i32,
        quantity: i32,
    ) -> Result<(), ShopError> {
        let product = Self::find(conn, product_id).await?;
        if !product.manage_stock {
            return Ok(());
        }

        let result = product::Entity::update_many()
            .col_expr(
                product::Column::StockQuantity,
                Expr::col(product::Column::StockQuantity).sub(quantity),
            )
            .filter(product::Column::Id.eq(product_id))
            .filter(product::Column::StockQuantity.gte(quantity))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            let current = Self::find(conn, product_id).await?;
            return Err(ShopError::InsufficientStock {
                product_id,
                available: current.stock_quantity,
            });
        }

        // in_stock suit la quantité restante
        product::Entity::update_many()
            .col_expr(
                product::Column::InStock,
                Expr::col(product::Column::StockQuantity).gt(0),
            )
            .filter(product::Column::Id.eq(product_id))
            .exec(conn)
            .await?;

        Ok(())
    }

    /// Remet en stock (annulation). Pas de plafond.
    pub async fn release<C: ConnectionTrait>(
        conn: &C,
        product_id: i32,
        quantity: i32,
    ) -> Result<(), ShopError> {
        let Some(product) = product::Entity::find_by_id(product_id).one(conn).await? else {
            warn!(product_id, "product deleted, stock not restored");
            return Ok(());
        };
        if !product.manage_stock {
            return Ok(());
        }

        product::Entity::update_many()
            .col_expr(
                product::Column::StockQuantity,
                Expr::col(product::Column::StockQuantity).add(quantity),
            )
            .col_expr(product::Column::InStock, Expr::value(true))
            .filter(product::Column::Id.eq(product_id))
            .exec(conn)
            .await?;

        Ok(())
    }

    /// Réassort par un admin : fixe la quantité. `in_stock` absent suit la quantité.
    pub async fn set_stock(
        db: &DatabaseConnection,
        product_id: i32,
        stock_quantity: i32,
        in_stock: Option<bool>,
    ) -> Result<product::Model, ShopError> {
        if stock_quantity < 0 {
            return Err(ShopError::InvalidAmount);
        }
        let product = Self::find(db, product_id).await?;

        let mut active: product::ActiveModel = product.into();
        active.stock_quantity = Set(stock_quantity);
        active.in_stock = Set(in_stock.unwrap_or(stock_quantity > 0));
        let product = active.update(db).await?;

        info!(product_id, stock_quantity, in_stock = product.in_stock, "stock updated");
        Ok(product)
    }

    async fn find<C: ConnectionTrait>(conn: &C, product_id: i32) -> Result<product::Model, ShopError> {
        product::Entity::find_by_id(product_id)
            .one(conn)
            .await?
            .ok_or(ShopError::NotFound("Product"))
    }
}
