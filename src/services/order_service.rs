use std::sync::Arc;

use chrono::{DateTime, Days, NaiveTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::ShopError;
use crate::models::dto::{
    page_index, OrderDetails, OrderQuery, PlaceOrderRequest, UpdateOrderStatusRequest,
    UpdatePaymentStatusRequest,
};
use crate::models::enums::{OrderStatus, PaymentMethod, PaymentStatus};
use crate::models::{order, order_item};
use crate::services::cart_service::{CartLine, CartService};
use crate::services::coupon_service::CouponService;
use crate::services::pricing::{ChargePolicy, FlatCharges, OrderTotals};
use crate::services::stock_service::StockService;
use crate::services::wallet_service::{LedgerEntry, WalletService};

const ORDERS_PAGE_SIZE: u64 = 15;
const ADMIN_ORDERS_PAGE_SIZE: u64 = 20;

/// Placement, annulation et transitions administrateur des commandes.
///
/// Chaque opération qui écrit ouvre sa propre transaction et la valide
/// uniquement si toutes les étapes ont réussi ; sinon rien n'est persisté
/// (commande, lignes, stock, coupon, wallet).
pub struct OrderService {
    policy: Arc<dyn ChargePolicy>,
    order_number_prefix: String,
    order_number_attempts: u32,
}

impl OrderService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            policy: Arc::new(FlatCharges::from_config(config)),
            order_number_prefix: config.order_number_prefix.clone(),
            order_number_attempts: config.order_number_attempts.max(1),
        }
    }

    /// Transforme le panier de l'utilisateur en commande
    pub async fn place_order(
        &self,
        db: &DatabaseConnection,
        user_id: i32,
        request: PlaceOrderRequest,
    ) -> Result<OrderDetails, ShopError> {
        let txn = db.begin().await?;

        match self.assemble(&txn, user_id, request, Utc::now()).await {
            Ok(details) => {
                txn.commit().await?;
                info!(
                    user_id,
                    order_id = details.order.id,
                    order_number = %details.order.order_number,
                    total = %details.order.total_amount,
                    "order placed"
                );
                Ok(details)
            }
            Err(e) => {
                txn.rollback().await?;
                warn!(user_id, error = %e, "order placement rejected");
                Err(e)
            }
        }
    }

    async fn assemble(
        &self,
        txn: &DatabaseTransaction,
        user_id: i32,
        request: PlaceOrderRequest,
        now: DateTime<Utc>,
    ) -> Result<OrderDetails, ShopError> {
        let lines = CartService::lines(txn, user_id).await?;
        self.assemble_lines(txn, user_id, lines, request, now).await
    }

    /// Étapes de la commande à partir des lignes de panier déjà lues
    async fn assemble_lines(
        &self,
        txn: &DatabaseTransaction,
        user_id: i32,
        lines: Vec<CartLine>,
        request: PlaceOrderRequest,
        now: DateTime<Utc>,
    ) -> Result<OrderDetails, ShopError> {
        // 1. Panier
        if lines.is_empty() {
            return Err(ShopError::EmptyCart);
        }

        // 2. Contrôle du stock sur tout le panier avant la moindre écriture
        for line in &lines {
            StockService::ensure_available(&line.product, line.item.quantity)?;
        }

        // 3. Sous-total au prix effectif
        let subtotal: Decimal = lines.iter().map(CartLine::total_price).sum();

        // 4. Coupon : un code inconnu ou invalide est ignoré
        let mut discount = Decimal::ZERO;
        if let Some(code) = request.coupon_code.as_deref() {
            if let Some(coupon) = CouponService::find_by_code(txn, code).await? {
                if CouponService::is_valid(&coupon, now)
                    && CouponService::redeem(txn, &coupon).await?
                {
                    discount = CouponService::calculate_discount(&coupon, subtotal);
                }
            }
        }

        // 5-6. Frais et total
        let totals = OrderTotals::new(
            subtotal,
            discount,
            self.policy.shipping_cost(subtotal),
            self.policy.tax_amount(subtotal - discount),
        );

        // 7. Solde du wallet vérifié avant toute insertion
        let wallet = match request.payment_method {
            PaymentMethod::Wallet => {
                let wallet = WalletService::get_or_create(txn, user_id).await?;
                if !WalletService::can_afford(&wallet, totals.total_amount) {
                    return Err(ShopError::InsufficientFunds {
                        available: wallet.balance,
                        required: totals.total_amount,
                    });
                }
                Some(wallet)
            }
            PaymentMethod::BankTransfer | PaymentMethod::Crypto => None,
        };

        // 8. Commande + lignes figées
        let order_number = self.unique_order_number(txn, now).await?;
        let payment_status = if wallet.is_some() {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Pending
        };

        let order = order::ActiveModel {
            order_number: Set(order_number),
            user_id: Set(user_id),
            status: Set(OrderStatus::Pending),
            subtotal: Set(totals.subtotal),
            discount_amount: Set(totals.discount_amount),
            shipping_cost: Set(totals.shipping_cost),
            tax_amount: Set(totals.tax_amount),
            total_amount: Set(totals.total_amount),
            payment_method: Set(request.payment_method),
            payment_status: Set(payment_status),
            transaction_id: Set(None),
            shipping_address: Set(request.shipping_address),
            billing_address: Set(request.billing_address),
            coupon_code: Set(request.coupon_code),
            notes: Set(request.notes),
            shipped_at: Set(None),
            delivered_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(txn)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item = order_item::ActiveModel {
                order_id: Set(order.id),
                product_id: Set(line.product.id),
                product_name: Set(line.product.name.clone()),
                product_sku: Set(line.product.sku.clone()),
                unit_price: Set(line.unit_price()),
                quantity: Set(line.item.quantity),
                total_price: Set(line.total_price()),
                product_attributes: Set(line.item.selected_attributes.clone()),
                ..Default::default()
            }
            .insert(txn)
            .await?;
            items.push(item);
        }

        // 9. Décrément du stock (contrôle définitif, protégé contre la concurrence)
        for line in &lines {
            StockService::reserve(txn, line.product.id, line.item.quantity).await?;
        }

        // 10. Paiement par wallet (rien à débiter si la remise couvre tout)
        if let Some(wallet) = wallet {
            if totals.total_amount > Decimal::ZERO {
                let entry = LedgerEntry::new("purchase")
                    .description(format!("Payment for order #{}", order.order_number))
                    .reference(order.id);
                WalletService::debit(txn, wallet.id, totals.total_amount, entry).await?;
            }
        }

        // 11. Vider le panier
        CartService::clear(txn, user_id).await?;

        Ok(OrderDetails { order, items })
    }

    /// Annulation par le client : restaure le stock et rembourse le wallet
    pub async fn cancel_order(
        &self,
        db: &DatabaseConnection,
        order_id: i32,
        user_id: i32,
    ) -> Result<OrderDetails, ShopError> {
        let txn = db.begin().await?;

        match Self::cancel_in(&txn, order_id, user_id).await {
            Ok(details) => {
                txn.commit().await?;
                info!(user_id, order_id, "order cancelled");
                Ok(details)
            }
            Err(e) => {
                txn.rollback().await?;
                Err(e)
            }
        }
    }

    async fn cancel_in(
        txn: &DatabaseTransaction,
        order_id: i32,
        user_id: i32,
    ) -> Result<OrderDetails, ShopError> {
        let order = Self::find_order(txn, order_id).await?;
        if order.user_id != user_id {
            return Err(ShopError::Unauthorized);
        }
        if !order.status.is_cancellable() {
            return Err(ShopError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Cancelled,
            });
        }

        // Changement de statut conditionnel : une seule annulation peut gagner
        let result = order::Entity::update_many()
            .col_expr(order::Column::Status, Expr::value(OrderStatus::Cancelled))
            .col_expr(order::Column::PaymentStatus, Expr::value(PaymentStatus::Refunded))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order.id))
            .filter(order::Column::Status.is_in([OrderStatus::Pending, OrderStatus::Processing]))
            .exec(txn)
            .await?;

        if result.rows_affected == 0 {
            let current = Self::find_order(txn, order_id).await?;
            return Err(ShopError::InvalidTransition {
                from: current.status,
                to: OrderStatus::Cancelled,
            });
        }

        let items = Self::items(txn, order.id).await?;
        for item in &items {
            StockService::release(txn, item.product_id, item.quantity).await?;
        }

        if order.payment_status == PaymentStatus::Paid
            && order.payment_method == PaymentMethod::Wallet
        {
            Self::refund_to_wallet(
                txn,
                &order,
                format!("Refund for cancelled order #{}", order.order_number),
            )
            .await?;
        }

        let order = Self::find_order(txn, order.id).await?;
        Ok(OrderDetails { order, items })
    }

    /// Changement de statut par un admin (affectation directe)
    pub async fn update_order_status(
        &self,
        db: &DatabaseConnection,
        order_id: i32,
        request: UpdateOrderStatusRequest,
    ) -> Result<OrderDetails, ShopError> {
        let txn = db.begin().await?;

        match Self::update_status_in(&txn, order_id, request, Utc::now()).await {
            Ok(details) => {
                txn.commit().await?;
                info!(order_id, status = %details.order.status, "order status updated");
                Ok(details)
            }
            Err(e) => {
                txn.rollback().await?;
                Err(e)
            }
        }
    }

    async fn update_status_in(
        txn: &DatabaseTransaction,
        order_id: i32,
        request: UpdateOrderStatusRequest,
        now: DateTime<Utc>,
    ) -> Result<OrderDetails, ShopError> {
        let order = Self::find_order(txn, order_id).await?;
        Self::apply_status(txn, &order, request, now).await
    }

    /// Écrit le nouveau statut à condition que la commande soit toujours dans
    /// le statut lu : une annulation validée entre-temps n'est jamais écrasée.
    async fn apply_status(
        txn: &DatabaseTransaction,
        order: &order::Model,
        request: UpdateOrderStatusRequest,
        now: DateTime<Utc>,
    ) -> Result<OrderDetails, ShopError> {
        if order.status.is_terminal() && request.status != order.status {
            return Err(ShopError::InvalidTransition {
                from: order.status,
                to: request.status,
            });
        }

        let mut update = order::Entity::update_many()
            .col_expr(order::Column::Status, Expr::value(request.status))
            .col_expr(order::Column::UpdatedAt, Expr::value(now));

        // Horodatage posé une seule fois
        if request.status == OrderStatus::Shipped && order.shipped_at.is_none() {
            update = update.col_expr(order::Column::ShippedAt, Expr::value(Some(now)));
        }
        if request.status == OrderStatus::Delivered && order.delivered_at.is_none() {
            update = update.col_expr(order::Column::DeliveredAt, Expr::value(Some(now)));
        }

        if let Some(notes) = request.notes {
            update = update.col_expr(order::Column::Notes, Expr::value(notes));
        }

        if let Some(shipping_cost) = request.shipping_cost {
            if shipping_cost < Decimal::ZERO {
                return Err(ShopError::InvalidAmount);
            }
            let totals = OrderTotals::of(order).with_shipping(shipping_cost);
            update = update
                .col_expr(order::Column::ShippingCost, Expr::value(totals.shipping_cost))
                .col_expr(order::Column::TotalAmount, Expr::value(totals.total_amount));
        }

        let result = update
            .filter(order::Column::Id.eq(order.id))
            .filter(order::Column::Status.eq(order.status))
            .exec(txn)
            .await?;

        if result.rows_affected == 0 {
            let current = Self::find_order(txn, order.id).await?;
            return Err(ShopError::InvalidTransition {
                from: current.status,
                to: request.status,
            });
        }

        let order = Self::find_order(txn, order.id).await?;
        let items = Self::items(txn, order.id).await?;

        Ok(OrderDetails { order, items })
    }

    /// Changement du statut de paiement par un admin.
    /// `refunded` sur une commande wallet crédite le total, quel que soit le statut
    /// de la commande : combiné à une annulation déjà remboursée, cela rembourse deux fois.
    pub async fn update_payment_status(
        &self,
        db: &DatabaseConnection,
        order_id: i32,
        request: UpdatePaymentStatusRequest,
    ) -> Result<OrderDetails, ShopError> {
        let txn = db.begin().await?;

        match Self::update_payment_in(&txn, order_id, request).await {
            Ok(details) => {
                txn.commit().await?;
                info!(order_id, "payment status updated");
                Ok(details)
            }
            Err(e) => {
                txn.rollback().await?;
                Err(e)
            }
        }
    }

    async fn update_payment_in(
        txn: &DatabaseTransaction,
        order_id: i32,
        request: UpdatePaymentStatusRequest,
    ) -> Result<OrderDetails, ShopError> {
        let order = Self::find_order(txn, order_id).await?;

        let mut active: order::ActiveModel = order.into();
        active.payment_status = Set(request.payment_status);
        active.transaction_id = Set(request.transaction_id);
        active.updated_at = Set(Utc::now());
        let order = active.update(txn).await?;

        if order.payment_status == PaymentStatus::Refunded
            && order.payment_method == PaymentMethod::Wallet
        {
            let description = format!("Refund for order #{}", order.order_number);
            Self::refund_to_wallet(txn, &order, description).await?;
        }

        let items = Self::items(txn, order.id).await?;
        Ok(OrderDetails { order, items })
    }

    /// Commande d'un client (refusée si elle appartient à un autre utilisateur)
    pub async fn order_for_user(
        db: &DatabaseConnection,
        order_id: i32,
        user_id: i32,
    ) -> Result<OrderDetails, ShopError> {
        let details = Self::order_details(db, order_id).await?;
        if details.order.user_id != user_id {
            return Err(ShopError::Unauthorized);
        }
        Ok(details)
    }

    pub async fn order_details(
        db: &DatabaseConnection,
        order_id: i32,
    ) -> Result<OrderDetails, ShopError> {
        let order = Self::find_order(db, order_id).await?;
        let items = Self::items(db, order.id).await?;
        Ok(OrderDetails { order, items })
    }

    /// Liste paginée (pages à partir de 1), du plus récent au plus ancien.
    /// `user_id = None` pour l'admin.
    pub async fn list_orders(
        db: &DatabaseConnection,
        user_id: Option<i32>,
        query: &OrderQuery,
    ) -> Result<Vec<OrderDetails>, ShopError> {
        let mut select = order::Entity::find();

        if let Some(user_id) = user_id {
            select = select.filter(order::Column::UserId.eq(user_id));
        }
        if let Some(status) = query.status {
            select = select.filter(order::Column::Status.eq(status));
        }
        if let Some(payment_status) = query.payment_status {
            select = select.filter(order::Column::PaymentStatus.eq(payment_status));
        }
        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            select = select.filter(order::Column::OrderNumber.contains(search));
        }
        // Bornes de dates inclusives, en UTC
        if let Some(date_from) = query.date_from {
            let from = date_from.and_time(NaiveTime::MIN).and_utc();
            select = select.filter(order::Column::CreatedAt.gte(from));
        }
        if let Some(day_after) = query.date_to.and_then(|d| d.checked_add_days(Days::new(1))) {
            let until = day_after.and_time(NaiveTime::MIN).and_utc();
            select = select.filter(order::Column::CreatedAt.lt(until));
        }

        let page_size = if user_id.is_some() {
            ORDERS_PAGE_SIZE
        } else {
            ADMIN_ORDERS_PAGE_SIZE
        };

        let orders = select
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::Id)
            .paginate(db, page_size)
            .fetch_page(page_index(query.page))
            .await?;
        let items = orders.load_many(order_item::Entity, db).await?;

        Ok(orders
            .into_iter()
            .zip(items)
            .map(|(order, items)| OrderDetails { order, items })
            .collect())
    }

    async fn refund_to_wallet(
        txn: &DatabaseTransaction,
        order: &order::Model,
        description: String,
    ) -> Result<(), ShopError> {
        if order.total_amount <= Decimal::ZERO {
            return Ok(());
        }

        let wallet = WalletService::get_or_create(txn, order.user_id).await?;
        let entry = LedgerEntry::new("refund").description(description).reference(order.id);
        WalletService::credit(txn, wallet.id, order.total_amount, entry).await?;

        info!(order_id = order.id, amount = %order.total_amount, "order refunded to wallet");
        Ok(())
    }

    /// Génère un numéro de commande libre, avec quelques tentatives en cas de collision
    async fn unique_order_number(
        &self,
        txn: &DatabaseTransaction,
        now: DateTime<Utc>,
    ) -> Result<String, ShopError> {
        for attempt in 1..=self.order_number_attempts {
            let candidate =
                generate_order_number(&self.order_number_prefix, now, &mut rand::thread_rng());

            let taken = order::Entity::find()
                .filter(order::Column::OrderNumber.eq(candidate.as_str()))
                .count(txn)
                .await?;

            if taken == 0 {
                return Ok(candidate);
            }
            warn!(attempt, order_number = %candidate, "order number collision");
        }

        Err(ShopError::OrderNumberExhausted)
    }

    async fn find_order<C: ConnectionTrait>(
        conn: &C,
        order_id: i32,
    ) -> Result<order::Model, ShopError> {
        order::Entity::find_by_id(order_id)
            .one(conn)
            .await?
            .ok_or(ShopError::NotFound("Order"))
    }

    async fn items<C: ConnectionTrait>(
        conn: &C,
        order_id: i32,
    ) -> Result<Vec<order_item::Model>, DbErr> {
        order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::Id)
            .all(conn)
            .await
    }
}

/// Format : PREFIX-<timestamp unix>-<4 chiffres>
pub fn generate_order_number<R: Rng>(prefix: &str, now: DateTime<Utc>, rng: &mut R) -> String {
    format!("{}-{}-{}", prefix, now.timestamp(), rng.gen_range(1000..=9999))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{CouponType, TopUpMethod};
    use crate::models::{product, wallet_transaction};
    use crate::db::connect_for_tests;
    use crate::test_support;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rust_decimal_macros::dec;

    fn service() -> OrderService {
        OrderService::new(&AppConfig::for_tests())
    }

    async fn stock_of(db: &DatabaseConnection, product_id: i32) -> i32 {
        product::Entity::find_by_id(product_id)
            .one(db)
            .await
            .unwrap()
            .unwrap()
            .stock_quantity
    }

    async fn balance_of(db: &DatabaseConnection, user_id: i32) -> Decimal {
        WalletService::get_or_create(db, user_id).await.unwrap().balance
    }

    async fn order_count(db: &DatabaseConnection) -> u64 {
        order::Entity::find().count(db).await.unwrap()
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() {
        let db = connect_for_tests().await;
        let err = service()
            .place_order(&db, 1, test_support::place_order_request(PaymentMethod::Crypto, None))
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::EmptyCart));
    }

    #[tokio::test]
    async fn test_capped_percentage_coupon_order() {
        let db = connect_for_tests().await;
        let p = test_support::insert_product(&db, "SKU-1", dec!(500), 10, true).await;
        test_support::add_to_cart(&db, 1, p.id, 2).await;
        test_support::insert_coupon(
            &db,
            "TEN",
            CouponType::Percentage,
            dec!(10),
            Some(dec!(100)),
            Some(dec!(50)),
            None,
        )
        .await;
        WalletService::charge_wallet(&db, 1, dec!(1000), TopUpMethod::BankTransfer, None)
            .await
            .unwrap();

        let details = service()
            .place_order(
                &db,
                1,
                test_support::place_order_request(PaymentMethod::Wallet, Some("TEN")),
            )
            .await
            .unwrap();

        let order = &details.order;
        assert_eq!(order.subtotal, dec!(1000));
        assert_eq!(order.discount_amount, dec!(50));
        assert_eq!(order.shipping_cost, Decimal::ZERO);
        assert_eq!(order.tax_amount, Decimal::ZERO);
        assert_eq!(order.total_amount, dec!(950));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.coupon_code.as_deref(), Some("TEN"));
        assert!(order.order_number.starts_with("ORD-"));

        // Lignes figées, stock décrémenté, wallet débité, coupon consommé, panier vidé
        assert_eq!(details.items.len(), 1);
        assert_eq!(details.items[0].product_sku, "SKU-1");
        assert_eq!(details.items[0].unit_price, dec!(500));
        assert_eq!(details.items[0].total_price, dec!(1000));
        assert_eq!(stock_of(&db, p.id).await, 8);
        assert_eq!(balance_of(&db, 1).await, dec!(50));
        let coupon = CouponService::find_by_code(&db, "TEN").await.unwrap().unwrap();
        assert_eq!(coupon.used_count, 1);
        assert!(CartService::lines(&db, 1).await.unwrap().is_empty());

        let purchase = wallet_transaction::Entity::find()
            .filter(wallet_transaction::Column::TransactionType.eq("purchase"))
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(purchase.amount, dec!(950));
        assert_eq!(purchase.reference_id, Some(order.id.to_string()));
    }

    #[tokio::test]
    async fn test_unknown_coupon_is_ignored() {
        let db = connect_for_tests().await;
        let p = test_support::insert_product(&db, "SKU-1", dec!(40), 10, true).await;
        test_support::add_to_cart(&db, 1, p.id, 1).await;

        let details = service()
            .place_order(
                &db,
                1,
                test_support::place_order_request(PaymentMethod::BankTransfer, Some("GHOST")),
            )
            .await
            .unwrap();

        assert_eq!(details.order.discount_amount, Decimal::ZERO);
        assert_eq!(details.order.total_amount, dec!(40));
        assert_eq!(details.order.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_everything_untouched() {
        let db = connect_for_tests().await;
        let p = test_support::insert_product(&db, "SKU-1", dec!(10), 5, true).await;
        test_support::add_to_cart(&db, 1, p.id, 6).await;

        let err = service()
            .place_order(&db, 1, test_support::place_order_request(PaymentMethod::Crypto, None))
            .await
            .unwrap_err();

        match err {
            ShopError::InsufficientStock { product_id, available } => {
                assert_eq!(product_id, p.id);
                assert_eq!(available, 5);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(stock_of(&db, p.id).await, 5);
        assert_eq!(order_count(&db).await, 0);
        assert_eq!(CartService::lines(&db, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_funds_rolls_back_everything() {
        let db = connect_for_tests().await;
        let p = test_support::insert_product(&db, "SKU-1", dec!(200), 3, true).await;
        test_support::add_to_cart(&db, 1, p.id, 1).await;
        test_support::insert_coupon(
            &db,
            "FIVE",
            CouponType::Fixed,
            dec!(0.5),
            None,
            None,
            None,
        )
        .await;
        WalletService::charge_wallet(&db, 1, dec!(150), TopUpMethod::Crypto, None)
            .await
            .unwrap();

        let err = service()
            .place_order(
                &db,
                1,
                test_support::place_order_request(PaymentMethod::Wallet, Some("FIVE")),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ShopError::InsufficientFunds { .. }));
        assert_eq!(balance_of(&db, 1).await, dec!(150));
        assert_eq!(order_count(&db).await, 0);
        assert_eq!(stock_of(&db, p.id).await, 3);
        // La consommation du coupon est annulée avec le reste
        let coupon = CouponService::find_by_code(&db, "FIVE").await.unwrap().unwrap();
        assert_eq!(coupon.used_count, 0);
    }

    #[tokio::test]
    async fn test_cancel_restores_stock_and_refunds_wallet() {
        let db = connect_for_tests().await;
        let a = test_support::insert_product(&db, "SKU-A", dec!(30), 4, true).await;
        let b = test_support::insert_product(&db, "SKU-B", dec!(20), 2, true).await;
        test_support::add_to_cart(&db, 1, a.id, 2).await;
        test_support::add_to_cart(&db, 1, b.id, 1).await;
        WalletService::charge_wallet(&db, 1, dec!(100), TopUpMethod::BankTransfer, None)
            .await
            .unwrap();

        let placed = service()
            .place_order(&db, 1, test_support::place_order_request(PaymentMethod::Wallet, None))
            .await
            .unwrap();
        assert_eq!(placed.order.total_amount, dec!(80));
        assert_eq!(balance_of(&db, 1).await, dec!(20));

        let err = service().cancel_order(&db, placed.order.id, 2).await.unwrap_err();
        assert!(matches!(err, ShopError::Unauthorized));

        let cancelled = service().cancel_order(&db, placed.order.id, 1).await.unwrap();
        assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.order.payment_status, PaymentStatus::Refunded);
        assert_eq!(stock_of(&db, a.id).await, 4);
        assert_eq!(stock_of(&db, b.id).await, 2);
        assert_eq!(balance_of(&db, 1).await, dec!(100));

        // Une deuxième annulation est refusée et ne rembourse pas
        let err = service().cancel_order(&db, placed.order.id, 1).await.unwrap_err();
        assert!(matches!(
            err,
            ShopError::InvalidTransition {
                from: OrderStatus::Cancelled,
                to: OrderStatus::Cancelled
            }
        ));
        assert_eq!(balance_of(&db, 1).await, dec!(100));
    }

    #[tokio::test]
    async fn test_cannot_cancel_shipped_order() {
        let db = connect_for_tests().await;
        let p = test_support::insert_product(&db, "SKU-1", dec!(10), 5, true).await;
        test_support::add_to_cart(&db, 1, p.id, 1).await;
        let placed = service()
            .place_order(&db, 1, test_support::place_order_request(PaymentMethod::Crypto, None))
            .await
            .unwrap();

        let shipped = service()
            .update_order_status(
                &db,
                placed.order.id,
                UpdateOrderStatusRequest {
                    status: OrderStatus::Shipped,
                    notes: None,
                    shipping_cost: None,
                },
            )
            .await
            .unwrap();
        assert!(shipped.order.shipped_at.is_some());

        let err = service().cancel_order(&db, placed.order.id, 1).await.unwrap_err();
        assert!(matches!(
            err,
            ShopError::InvalidTransition { from: OrderStatus::Shipped, to: OrderStatus::Cancelled }
        ));
        assert_eq!(stock_of(&db, p.id).await, 4);
    }

    #[tokio::test]
    async fn test_admin_status_update_stamps_once_and_recomputes_total() {
        let db = connect_for_tests().await;
        let p = test_support::insert_product(&db, "SKU-1", dec!(100), 5, true).await;
        test_support::add_to_cart(&db, 1, p.id, 1).await;
        let placed = service()
            .place_order(
                &db,
                1,
                test_support::place_order_request(PaymentMethod::BankTransfer, None),
            )
            .await
            .unwrap();

        let update = |status, shipping_cost| UpdateOrderStatusRequest {
            status,
            notes: None,
            shipping_cost,
        };

        let shipped = service()
            .update_order_status(&db, placed.order.id, update(OrderStatus::Shipped, Some(dec!(15))))
            .await
            .unwrap();
        assert_eq!(shipped.order.shipping_cost, dec!(15));
        assert_eq!(shipped.order.total_amount, dec!(115));
        let first_stamp = shipped.order.shipped_at;

        let again = service()
            .update_order_status(&db, placed.order.id, update(OrderStatus::Shipped, None))
            .await
            .unwrap();
        assert_eq!(again.order.shipped_at, first_stamp);
        assert_eq!(again.order.total_amount, dec!(115));

        let delivered = service()
            .update_order_status(&db, placed.order.id, update(OrderStatus::Delivered, None))
            .await
            .unwrap();
        assert!(delivered.order.delivered_at.is_some());

        let err = service()
            .update_order_status(
                &db,
                placed.order.id,
                update(OrderStatus::Delivered, Some(dec!(-1))),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::InvalidAmount));
    }

    #[tokio::test]
    async fn test_terminal_status_cannot_be_left() {
        let db = connect_for_tests().await;
        let p = test_support::insert_product(&db, "SKU-1", dec!(10), 5, true).await;
        test_support::add_to_cart(&db, 1, p.id, 1).await;
        let placed = service()
            .place_order(&db, 1, test_support::place_order_request(PaymentMethod::Crypto, None))
            .await
            .unwrap();
        service().cancel_order(&db, placed.order.id, 1).await.unwrap();

        let err = service()
            .update_order_status(
                &db,
                placed.order.id,
                UpdateOrderStatusRequest {
                    status: OrderStatus::Processing,
                    notes: None,
                    shipping_cost: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::InvalidTransition { from: OrderStatus::Cancelled, .. }));
    }

    #[tokio::test]
    async fn test_payment_refund_credits_wallet() {
        let db = connect_for_tests().await;
        let p = test_support::insert_product(&db, "SKU-1", dec!(60), 5, true).await;
        test_support::add_to_cart(&db, 1, p.id, 1).await;
        WalletService::charge_wallet(&db, 1, dec!(60), TopUpMethod::Crypto, None)
            .await
            .unwrap();
        let placed = service()
            .place_order(&db, 1, test_support::place_order_request(PaymentMethod::Wallet, None))
            .await
            .unwrap();
        assert_eq!(balance_of(&db, 1).await, Decimal::ZERO);

        let updated = service()
            .update_payment_status(
                &db,
                placed.order.id,
                UpdatePaymentStatusRequest {
                    payment_status: PaymentStatus::Refunded,
                    transaction_id: Some("TX-9".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.order.payment_status, PaymentStatus::Refunded);
        assert_eq!(updated.order.transaction_id.as_deref(), Some("TX-9"));
        assert_eq!(updated.order.status, OrderStatus::Pending);
        assert_eq!(balance_of(&db, 1).await, dec!(60));
    }

    #[tokio::test]
    async fn test_concurrent_orders_for_last_unit() {
        let db = connect_for_tests().await;
        let p = test_support::insert_product(&db, "SKU-LAST", dec!(10), 1, true).await;
        test_support::add_to_cart(&db, 1, p.id, 1).await;
        test_support::add_to_cart(&db, 2, p.id, 1).await;

        let service = service();
        let (first, second) = tokio::join!(
            service.place_order(
                &db,
                1,
                test_support::place_order_request(PaymentMethod::Crypto, None),
            ),
            service.place_order(
                &db,
                2,
                test_support::place_order_request(PaymentMethod::Crypto, None),
            ),
        );

        let results = [first, second];
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        let out_of_stock = results
            .iter()
            .filter(|r| matches!(r, Err(ShopError::InsufficientStock { available: 0, .. })))
            .count();

        assert_eq!(succeeded, 1);
        assert_eq!(out_of_stock, 1);
        assert_eq!(stock_of(&db, p.id).await, 0);
        assert_eq!(order_count(&db).await, 1);
    }

    #[tokio::test]
    async fn test_orders_are_private() {
        let db = connect_for_tests().await;
        let p = test_support::insert_product(&db, "SKU-1", dec!(10), 5, true).await;
        test_support::add_to_cart(&db, 1, p.id, 1).await;
        let placed = service()
            .place_order(&db, 1, test_support::place_order_request(PaymentMethod::Crypto, None))
            .await
            .unwrap();

        assert!(OrderService::order_for_user(&db, placed.order.id, 1).await.is_ok());
        let err = OrderService::order_for_user(&db, placed.order.id, 2).await.unwrap_err();
        assert!(matches!(err, ShopError::Unauthorized));

        let mine = OrderService::list_orders(&db, Some(1), &OrderQuery::default()).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].items.len(), 1);
        let theirs = OrderService::list_orders(&db, Some(2), &OrderQuery::default()).await.unwrap();
        assert!(theirs.is_empty());
    }

    #[tokio::test]
    async fn test_last_unit_lost_at_decrement_time() {
        let db = connect_for_tests().await;
        let p = test_support::insert_product(&db, "SKU-LAST", dec!(10), 1, true).await;
        test_support::add_to_cart(&db, 1, p.id, 1).await;
        test_support::add_to_cart(&db, 2, p.id, 1).await;
        let service = service();

        // Le panier du deuxième client est lu alors qu'il reste une unité
        let stale_lines = CartService::lines(&db, 2).await.unwrap();
        assert_eq!(stale_lines[0].product.stock_quantity, 1);

        service
            .place_order(&db, 1, test_support::place_order_request(PaymentMethod::Crypto, None))
            .await
            .unwrap();

        // Le contrôle préalable passe sur la lecture périmée,
        // le décrément conditionnel échoue
        let txn = db.begin().await.unwrap();
        let err = service
            .assemble_lines(
                &txn,
                2,
                stale_lines,
                test_support::place_order_request(PaymentMethod::Crypto, None),
                Utc::now(),
            )
            .await
            .unwrap_err();
        txn.rollback().await.unwrap();

        match err {
            ShopError::InsufficientStock { product_id, available } => {
                assert_eq!(product_id, p.id);
                assert_eq!(available, 0);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(stock_of(&db, p.id).await, 0);
        assert_eq!(order_count(&db).await, 1);
        assert_eq!(CartService::lines(&db, 2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_admin_status_does_not_overwrite_a_cancellation() {
        let db = connect_for_tests().await;
        let p = test_support::insert_product(&db, "SKU-1", dec!(40), 3, true).await;
        test_support::add_to_cart(&db, 1, p.id, 1).await;
        WalletService::charge_wallet(&db, 1, dec!(40), TopUpMethod::Crypto, None)
            .await
            .unwrap();
        let placed = service()
            .place_order(&db, 1, test_support::place_order_request(PaymentMethod::Wallet, None))
            .await
            .unwrap();

        // L'admin a lu la commande encore en attente, le client annule avant l'écriture
        let seen_by_admin = placed.order.clone();
        service().cancel_order(&db, placed.order.id, 1).await.unwrap();

        let txn = db.begin().await.unwrap();
        let err = OrderService::apply_status(
            &txn,
            &seen_by_admin,
            UpdateOrderStatusRequest {
                status: OrderStatus::Shipped,
                notes: None,
                shipping_cost: None,
            },
            Utc::now(),
        )
        .await
        .unwrap_err();
        txn.rollback().await.unwrap();

        assert!(matches!(
            err,
            ShopError::InvalidTransition { from: OrderStatus::Cancelled, to: OrderStatus::Shipped }
        ));
        let stored = OrderService::order_details(&db, placed.order.id).await.unwrap().order;
        assert_eq!(stored.status, OrderStatus::Cancelled);
        assert!(stored.shipped_at.is_none());
        assert_eq!(stock_of(&db, p.id).await, 3);
        assert_eq!(balance_of(&db, 1).await, dec!(40));
    }

    #[tokio::test]
    async fn test_items_keep_sale_price_and_product_snapshot() {
        let db = connect_for_tests().await;
        let p = test_support::insert_product(&db, "SKU-1", dec!(100), 5, true).await;
        let mut on_sale: product::ActiveModel = p.into();
        on_sale.sale_price = Set(Some(dec!(80)));
        let p = on_sale.update(&db).await.unwrap();
        test_support::add_to_cart(&db, 1, p.id, 2).await;

        let placed = service()
            .place_order(
                &db,
                1,
                test_support::place_order_request(PaymentMethod::BankTransfer, None),
            )
            .await
            .unwrap();
        assert_eq!(placed.order.subtotal, dec!(160));
        assert_eq!(placed.items[0].unit_price, dec!(80));

        // Le produit change après coup : la commande ne bouge pas
        let mut edited: product::ActiveModel = p.into();
        edited.name = Set("Renamed".to_string());
        edited.sku = Set("SKU-NEW".to_string());
        edited.price = Set(dec!(300));
        edited.sale_price = Set(None);
        edited.update(&db).await.unwrap();

        let reloaded = OrderService::order_details(&db, placed.order.id).await.unwrap();
        let item = &reloaded.items[0];
        assert_eq!(item.product_name, "Product SKU-1");
        assert_eq!(item.product_sku, "SKU-1");
        assert_eq!(item.unit_price, dec!(80));
        assert_eq!(item.total_price, dec!(160));
        assert_eq!(reloaded.order.subtotal, dec!(160));
        assert_eq!(reloaded.order.total_amount, dec!(160));
    }

    #[tokio::test]
    async fn test_configured_charges_enter_the_total() {
        let db = connect_for_tests().await;
        let p = test_support::insert_product(&db, "SKU-1", dec!(50), 5, true).await;
        test_support::add_to_cart(&db, 1, p.id, 2).await;
        test_support::insert_coupon(
            &db,
            "TWENTY",
            CouponType::Fixed,
            dec!(20),
            None,
            None,
            None,
        )
        .await;

        let config = AppConfig {
            shipping_cost: dec!(10),
            tax_rate: dec!(10),
            ..AppConfig::for_tests()
        };
        let placed = OrderService::new(&config)
            .place_order(
                &db,
                1,
                test_support::place_order_request(PaymentMethod::Crypto, Some("TWENTY")),
            )
            .await
            .unwrap();

        // taxe sur le sous-total remisé : (100 - 20) * 10 % = 8
        let order = &placed.order;
        assert_eq!(order.subtotal, dec!(100));
        assert_eq!(order.discount_amount, dec!(20));
        assert_eq!(order.shipping_cost, dec!(10));
        assert_eq!(order.tax_amount, dec!(8));
        assert_eq!(order.total_amount, dec!(98));
        assert_eq!(OrderTotals::of(order).total_amount, order.total_amount);
    }

    #[tokio::test]
    async fn test_admin_list_filters_and_pages() {
        let db = connect_for_tests().await;
        let p = test_support::insert_product(&db, "SKU-1", dec!(10), 10, true).await;
        let mut placed = Vec::new();
        for user_id in [1, 2] {
            test_support::add_to_cart(&db, user_id, p.id, 1).await;
            let details = service()
                .place_order(
                    &db,
                    user_id,
                    test_support::place_order_request(PaymentMethod::Crypto, None),
                )
                .await
                .unwrap();
            placed.push(details.order);
        }

        let all = |query: OrderQuery| {
            let db = db.clone();
            async move { OrderService::list_orders(&db, None, &query).await.unwrap() }
        };

        assert_eq!(all(OrderQuery::default()).await.len(), 2);
        assert_eq!(all(OrderQuery { page: Some(1), ..Default::default() }).await.len(), 2);
        assert!(all(OrderQuery { page: Some(2), ..Default::default() }).await.is_empty());

        let found = all(OrderQuery {
            search: Some(placed[0].order_number.clone()),
            ..Default::default()
        })
        .await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].order.id, placed[0].id);

        let today = Utc::now().date_naive();
        let yesterday = today.pred_opt().unwrap();
        let since_today = all(OrderQuery {
            date_from: Some(today),
            date_to: Some(today),
            ..Default::default()
        })
        .await;
        assert_eq!(since_today.len(), 2);
        let before_today = all(OrderQuery { date_to: Some(yesterday), ..Default::default() }).await;
        assert!(before_today.is_empty());
    }

    #[test]
    fn test_order_number_format() {
        let mut rng = StdRng::seed_from_u64(7);
        let now = DateTime::from_timestamp(1_720_000_000, 0).unwrap();
        let number = generate_order_number("ORD", now, &mut rng);

        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[1], "1720000000");
        let suffix: u32 = parts[2].parse().unwrap();
        assert!((1000..=9999).contains(&suffix));
    }
}
