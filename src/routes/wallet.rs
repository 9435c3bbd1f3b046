use actix_web::{get, post, web, HttpResponse};
use sea_orm::DatabaseConnection;
use validator::Validate;

use crate::error::ShopError;
use crate::middleware::AuthUser;
use crate::models::dto::{page_index, ChargeWalletRequest, TransactionQuery};
use crate::routes::validation_failed;
use crate::services::wallet_service::{TransactionFilter, WalletService};

/// GET /api/v1/wallet - Solde (le wallet est créé au premier accès)
#[get("")]
pub async fn get_wallet(
    auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ShopError> {
    let wallet = WalletService::get_or_create(db.get_ref(), auth_user.user_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": wallet
    })))
}

/// GET /api/v1/wallet/transactions - Historique paginé (?type=credit|debit&transaction_type=...)
#[get("/transactions")]
pub async fn get_transactions(
    auth_user: AuthUser,
    query: web::Query<TransactionQuery>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ShopError> {
    let query = query.into_inner();
    let filter = TransactionFilter {
        direction: query.direction,
        transaction_type: query.transaction_type,
    };

    let transactions = WalletService::transactions(
        db.get_ref(),
        auth_user.user_id,
        &filter,
        page_index(query.page),
    )
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": transactions
    })))
}

/// POST /api/v1/wallet/charge - Recharger le wallet
#[post("/charge")]
pub async fn charge_wallet(
    auth_user: AuthUser,
    body: web::Json<ChargeWalletRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ShopError> {
    if let Err(errors) = body.validate() {
        return Ok(validation_failed(errors));
    }

    let body = body.into_inner();
    let (wallet, transaction) = WalletService::charge_wallet(
        db.get_ref(),
        auth_user.user_id,
        body.amount,
        body.payment_method,
        body.reference,
    )
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Wallet charged successfully",
        "data": {
            "wallet": wallet,
            "transaction": transaction
        }
    })))
}

pub fn wallet_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/wallet")
            .service(get_wallet)
            .service(get_transactions)
            .service(charge_wallet)
    );
}
