use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::enums::CouponType;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    #[sea_orm(column_name = "type")]
    pub coupon_type: CouponType,
    pub value: Decimal,                    // pourcentage (0-100) ou montant fixe
    pub minimum_amount: Option<Decimal>,
    pub maximum_discount: Option<Decimal>, // plafond des remises en pourcentage
    pub usage_limit: Option<i32>,          // NULL = illimité
    pub usage_limit_per_user: Option<i32>,
    pub used_count: i32,
    pub is_active: bool,
    pub starts_at: Option<DateTimeUtc>,
    pub expires_at: Option<DateTimeUtc>,
}

// Les commandes référencent le coupon par son code, pas par clé étrangère
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
