use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::enums::ProductStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(unique)]
    pub sku: String,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    // Champs de stock : écrits uniquement par StockService
    pub stock_quantity: i32,
    pub manage_stock: bool, // false = pas de contrôle de stock
    pub in_stock: bool,
    pub status: ProductStatus,
}

impl Model {
    /// Prix de vente effectif : le prix soldé s'il est plus bas que le prix catalogue
    pub fn final_price(&self) -> Decimal {
        match self.sale_price {
            Some(sale) if sale < self.price => sale,
            _ => self.price,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItem,
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
