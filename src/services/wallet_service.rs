use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::*;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::ShopError;
use crate::models::enums::{EntryDirection, TopUpMethod};
use crate::models::{wallet, wallet_transaction};

pub struct WalletService;

/// Description d'une écriture du ledger (le montant et le sens sont passés à part)
#[derive(Debug, Clone, Default)]
pub struct LedgerEntry {
    pub transaction_type: String,
    pub description: Option<String>,
    pub reference_id: Option<String>,
    pub metadata: Option<Value>,
}

impl LedgerEntry {
    pub fn new(transaction_type: &str) -> Self {
        Self {
            transaction_type: transaction_type.to_string(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn reference(mut self, reference_id: impl ToString) -> Self {
        self.reference_id = Some(reference_id.to_string());
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Filtres de l'historique (GET /wallet/transactions)
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub direction: Option<EntryDirection>,
    pub transaction_type: Option<String>,
}

const HISTORY_PAGE_SIZE: u64 = 20;

impl WalletService {
    /// Vérifie si le solde couvre un montant donné (aucun effet de bord)
    pub fn can_afford(wallet: &wallet::Model, amount: Decimal) -> bool {
        wallet.balance >= amount
    }

    /// Récupère le wallet de l'utilisateur, le crée à solde zéro s'il n'existe pas
    pub async fn get_or_create<C: ConnectionTrait>(
        conn: &C,
        user_id: i32,
    ) -> Result<wallet::Model, DbErr> {
        if let Some(existing) = Self::find_for_user(conn, user_id).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let new_wallet = wallet::ActiveModel {
            user_id: Set(user_id),
            balance: Set(Decimal::ZERO),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        // Deux requêtes simultanées peuvent créer le même wallet : la contrainte
        // unique sur user_id tranche, on relit ensuite
        wallet::Entity::insert(new_wallet)
            .on_conflict(
                OnConflict::column(wallet::Column::UserId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;

        debug!(user_id, "wallet created");

        Self::find_for_user(conn, user_id)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("wallet for user {}", user_id)))
    }

    /// Ajoute `amount` au solde et écrit l'entrée de crédit correspondante.
    /// Doit être appelé dans une transaction ouverte par l'appelant.
    pub async fn credit<C: ConnectionTrait>(
        conn: &C,
        wallet_id: i32,
        amount: Decimal,
        entry: LedgerEntry,
    ) -> Result<wallet_transaction::Model, ShopError> {
        if amount <= Decimal::ZERO {
            return Err(ShopError::InvalidAmount);
        }

        let result = wallet::Entity::update_many()
            .col_expr(wallet::Column::Balance, Expr::col(wallet::Column::Balance).add(amount))
            .col_expr(wallet::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(wallet::Column::Id.eq(wallet_id))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ShopError::NotFound("Wallet"));
        }

        let wallet = Self::find_by_id(conn, wallet_id).await?;
        let balance_before = wallet.balance - amount;

        Self::append_entry(conn, &wallet, EntryDirection::Credit, amount, balance_before, entry).await
    }

    /// Retire `amount` du solde. Échoue avec InsufficientFunds si le solde est
    /// trop bas : la condition `balance >= amount` est dans l'UPDATE lui-même,
    /// deux débits concurrents ne peuvent donc pas rendre le solde négatif.
    pub async fn debit<C: ConnectionTrait>(
        conn: &C,
        wallet_id: i32,
        amount: Decimal,
        entry: LedgerEntry,
    ) -> Result<wallet_transaction::Model, ShopError> {
        if amount <= Decimal::ZERO {
            return Err(ShopError::InvalidAmount);
        }

        let result = wallet::Entity::update_many()
            .col_expr(wallet::Column::Balance, Expr::col(wallet::Column::Balance).sub(amount))
            .col_expr(wallet::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(wallet::Column::Id.eq(wallet_id))
            .filter(wallet::Column::Balance.gte(amount))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            let wallet = Self::find_by_id(conn, wallet_id).await?;
            return Err(ShopError::InsufficientFunds {
                available: wallet.balance,
                required: amount,
            });
        }

        let wallet = Self::find_by_id(conn, wallet_id).await?;
        let balance_before = wallet.balance + amount;

        Self::append_entry(conn, &wallet, EntryDirection::Debit, amount, balance_before, entry).await
    }

    /// Recharge du wallet par l'utilisateur (pas de vérification auprès d'une passerelle)
    pub async fn charge_wallet(
        db: &DatabaseConnection,
        user_id: i32,
        amount: Decimal,
        method: TopUpMethod,
        reference: Option<String>,
    ) -> Result<(wallet::Model, wallet_transaction::Model), ShopError> {
        let txn = db.begin().await?;

        match Self::charge_in(&txn, user_id, amount, method, reference).await {
            Ok(charged) => {
                txn.commit().await?;
                info!(user_id, %amount, method = method.as_str(), "wallet charged");
                Ok(charged)
            }
            Err(e) => {
                txn.rollback().await?;
                Err(e)
            }
        }
    }

    async fn charge_in(
        txn: &DatabaseTransaction,
        user_id: i32,
        amount: Decimal,
        method: TopUpMethod,
        reference: Option<String>,
    ) -> Result<(wallet::Model, wallet_transaction::Model), ShopError> {
        let wallet = Self::get_or_create(txn, user_id).await?;

        let mut entry = LedgerEntry::new("deposit")
            .description(format!("Wallet charge via {}", method.as_str()))
            .metadata(json!({
                "payment_method": method.as_str(),
                "reference": reference,
            }));
        entry.reference_id = reference;

        let transaction = Self::credit(txn, wallet.id, amount, entry).await?;
        let wallet = Self::find_by_id(txn, wallet.id).await?;

        Ok((wallet, transaction))
    }

    /// Historique paginé, du plus récent au plus ancien.
    /// `page` est un index, 0 pour la première.
    pub async fn transactions(
        db: &DatabaseConnection,
        user_id: i32,
        filter: &TransactionFilter,
        page: u64,
    ) -> Result<Vec<wallet_transaction::Model>, ShopError> {
        let wallet = Self::get_or_create(db, user_id).await?;

        let mut query = wallet_transaction::Entity::find()
            .filter(wallet_transaction::Column::WalletId.eq(wallet.id));

        if let Some(direction) = filter.direction {
            query = query.filter(wallet_transaction::Column::Direction.eq(direction));
        }
        if let Some(transaction_type) = &filter.transaction_type {
            query = query.filter(wallet_transaction::Column::TransactionType.eq(transaction_type.as_str()));
        }

        let transactions = query
            .order_by_desc(wallet_transaction::Column::CreatedAt)
            .order_by_desc(wallet_transaction::Column::Id)
            .paginate(db, HISTORY_PAGE_SIZE)
            .fetch_page(page)
            .await?;

        Ok(transactions)
    }

    /// Rejoue le ledger depuis un solde d'ouverture.
    /// Retourne None si une écriture ne s'enchaîne pas avec la précédente.
    #[cfg(test)]
    pub fn replay_balance(
        opening: Decimal,
        entries: &[wallet_transaction::Model],
    ) -> Option<Decimal> {
        entries.iter().try_fold(opening, |balance, entry| {
            if entry.balance_before != balance {
                return None;
            }
            let next = match entry.direction {
                EntryDirection::Credit => balance + entry.amount,
                EntryDirection::Debit => balance - entry.amount,
            };
            (next == entry.balance_after && next >= Decimal::ZERO).then_some(next)
        })
    }

    async fn find_for_user<C: ConnectionTrait>(
        conn: &C,
        user_id: i32,
    ) -> Result<Option<wallet::Model>, DbErr> {
        wallet::Entity::find()
            .filter(wallet::Column::UserId.eq(user_id))
            .one(conn)
            .await
    }

    async fn find_by_id<C: ConnectionTrait>(
        conn: &C,
        wallet_id: i32,
    ) -> Result<wallet::Model, ShopError> {
        wallet::Entity::find_by_id(wallet_id)
            .one(conn)
            .await?
            .ok_or(ShopError::NotFound("Wallet"))
    }

    async fn append_entry<C: ConnectionTrait>(
        conn: &C,
        wallet: &wallet::Model,
        direction: EntryDirection,
        amount: Decimal,
        balance_before: Decimal,
        entry: LedgerEntry,
    ) -> Result<wallet_transaction::Model, ShopError> {
        let row = wallet_transaction::ActiveModel {
            wallet_id: Set(wallet.id),
            direction: Set(direction),
            amount: Set(amount),
            balance_before: Set(balance_before),
            balance_after: Set(wallet.balance),
            transaction_type: Set(entry.transaction_type),
            reference_id: Set(entry.reference_id),
            description: Set(entry.description),
            metadata: Set(entry.metadata),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        Ok(row.insert(conn).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_for_tests;
    use rust_decimal_macros::dec;

    async fn ledger(db: &DatabaseConnection, wallet_id: i32) -> Vec<wallet_transaction::Model> {
        wallet_transaction::Entity::find()
            .filter(wallet_transaction::Column::WalletId.eq(wallet_id))
            .order_by_asc(wallet_transaction::Column::Id)
            .all(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let db = connect_for_tests().await;

        let first = WalletService::get_or_create(&db, 1).await.unwrap();
        let second = WalletService::get_or_create(&db, 1).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.balance, Decimal::ZERO);
        assert!(first.is_active);
    }

    #[tokio::test]
    async fn test_credit_and_debit_keep_ledger_consistent() {
        let db = connect_for_tests().await;
        let (wallet, _) = WalletService::charge_wallet(&db, 1, dec!(100), TopUpMethod::BankTransfer, None)
            .await
            .unwrap();
        assert_eq!(wallet.balance, dec!(100));

        let debit = WalletService::debit(&db, wallet.id, dec!(30), LedgerEntry::new("purchase"))
            .await
            .unwrap();
        assert_eq!(debit.direction, EntryDirection::Debit);
        assert_eq!(debit.balance_before, dec!(100));
        assert_eq!(debit.balance_after, dec!(70));

        WalletService::credit(&db, wallet.id, dec!(5), LedgerEntry::new("refund").reference(42))
            .await
            .unwrap();

        let wallet = WalletService::get_or_create(&db, 1).await.unwrap();
        assert_eq!(wallet.balance, dec!(75));

        let entries = ledger(&db, wallet.id).await;
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].reference_id.as_deref(), Some("42"));
        assert_eq!(WalletService::replay_balance(Decimal::ZERO, &entries), Some(dec!(75)));
    }

    #[tokio::test]
    async fn test_debit_beyond_balance_fails_without_side_effect() {
        let db = connect_for_tests().await;
        let (wallet, _) = WalletService::charge_wallet(&db, 1, dec!(150), TopUpMethod::Crypto, None)
            .await
            .unwrap();

        let err = WalletService::debit(&db, wallet.id, dec!(200), LedgerEntry::new("purchase"))
            .await
            .unwrap_err();

        match err {
            ShopError::InsufficientFunds { available, required } => {
                assert_eq!(available, dec!(150));
                assert_eq!(required, dec!(200));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let wallet = WalletService::get_or_create(&db, 1).await.unwrap();
        assert_eq!(wallet.balance, dec!(150));
        assert_eq!(ledger(&db, wallet.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_non_positive_amounts_are_rejected() {
        let db = connect_for_tests().await;
        let wallet = WalletService::get_or_create(&db, 1).await.unwrap();

        let err = WalletService::credit(&db, wallet.id, Decimal::ZERO, LedgerEntry::new("deposit"))
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::InvalidAmount));

        let err = WalletService::debit(&db, wallet.id, dec!(-1), LedgerEntry::new("purchase"))
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::InvalidAmount));
        assert!(ledger(&db, wallet.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_charge_records_method_in_metadata() {
        let db = connect_for_tests().await;
        let (_, transaction) = WalletService::charge_wallet(
            &db,
            3,
            dec!(50),
            TopUpMethod::GiftCard,
            Some("GC-001".to_string()),
        )
        .await
        .unwrap();

        assert_eq!(transaction.transaction_type, "deposit");
        assert_eq!(transaction.reference_id.as_deref(), Some("GC-001"));
        assert_eq!(transaction.description.as_deref(), Some("Wallet charge via gift_card"));
        let metadata = transaction.metadata.unwrap();
        assert_eq!(metadata["payment_method"], "gift_card");
    }

    #[tokio::test]
    async fn test_transactions_filter_by_direction() {
        let db = connect_for_tests().await;
        let (wallet, _) = WalletService::charge_wallet(&db, 1, dec!(100), TopUpMethod::BankTransfer, None)
            .await
            .unwrap();
        WalletService::debit(&db, wallet.id, dec!(10), LedgerEntry::new("purchase"))
            .await
            .unwrap();

        let filter = TransactionFilter {
            direction: Some(EntryDirection::Debit),
            transaction_type: None,
        };
        let debits = WalletService::transactions(&db, 1, &filter, 0).await.unwrap();
        assert_eq!(debits.len(), 1);
        assert_eq!(debits[0].amount, dec!(10));

        let all = WalletService::transactions(&db, 1, &TransactionFilter::default(), 0)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_can_afford() {
        let now = Utc::now();
        let wallet = wallet::Model {
            id: 1,
            user_id: 1,
            balance: dec!(150),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        assert!(WalletService::can_afford(&wallet, dec!(150)));
        assert!(!WalletService::can_afford(&wallet, dec!(200)));
    }

    #[test]
    fn test_replay_detects_broken_chain() {
        let now = Utc::now();
        let entry = |direction, amount, before, after| wallet_transaction::Model {
            id: 0,
            wallet_id: 1,
            direction,
            amount,
            balance_before: before,
            balance_after: after,
            transaction_type: "deposit".to_string(),
            reference_id: None,
            description: None,
            metadata: None,
            created_at: now,
        };

        let good = vec![
            entry(EntryDirection::Credit, dec!(10), dec!(0), dec!(10)),
            entry(EntryDirection::Debit, dec!(4), dec!(10), dec!(6)),
        ];
        assert_eq!(WalletService::replay_balance(Decimal::ZERO, &good), Some(dec!(6)));

        let broken = vec![
            entry(EntryDirection::Credit, dec!(10), dec!(0), dec!(10)),
            entry(EntryDirection::Debit, dec!(4), dec!(9), dec!(5)),
        ];
        assert_eq!(WalletService::replay_balance(Decimal::ZERO, &broken), None);
    }
}
