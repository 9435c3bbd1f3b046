// ============================================================================
// MODÈLE : WALLET TRANSACTIONS (ledger)
// ============================================================================
//
// Description:
//   Écriture immuable d'un mouvement de wallet. Chaque changement de solde
//   produit exactement une ligne, avec le solde avant/après figé au moment
//   de l'écriture.
//
// Points d'attention:
//   - balance_after = balance_before + amount (credit) ou - amount (debit)
//   - amount est toujours strictement positif, le sens est dans `type`
//   - ON DELETE CASCADE avec le wallet (qui n'est jamais supprimé en pratique)
//   - Aucune mise à jour après insertion
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::enums::EntryDirection;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "wallet_transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub wallet_id: i32,

    #[serde(rename = "type")]
    #[sea_orm(column_name = "type")]
    pub direction: EntryDirection,

    pub amount: Decimal,

    pub balance_before: Decimal,

    pub balance_after: Decimal,

    pub transaction_type: String, // 'purchase', 'refund', 'deposit', ...

    pub reference_id: Option<String>, // id de commande ou référence externe

    pub description: Option<String>,

    pub metadata: Option<Json>,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::wallet::Entity",
        from = "Column::WalletId",
        to = "super::wallet::Column::Id",
        on_delete = "Cascade"
    )]
    Wallet,
}

impl Related<super::wallet::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallet.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
