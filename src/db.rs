// connexion BD + création du schéma à partir des entités

use sea_orm::sea_query::Index;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema};

use crate::config::AppConfig;
use crate::models::{cart_item, coupon, order, order_item, product, wallet, wallet_transaction};

pub async fn establish_connection(config: &AppConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.database_url.clone());
    options.sqlx_logging(false);

    Database::connect(options).await
}

/// Crée les tables manquantes (parents avant enfants à cause des clés étrangères)
pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut statements = vec![
        schema.create_table_from_entity(product::Entity),
        schema.create_table_from_entity(cart_item::Entity),
        schema.create_table_from_entity(coupon::Entity),
        schema.create_table_from_entity(wallet::Entity),
        schema.create_table_from_entity(wallet_transaction::Entity),
        schema.create_table_from_entity(order::Entity),
        schema.create_table_from_entity(order_item::Entity),
    ];

    for statement in statements.iter_mut() {
        statement.if_not_exists();
        db.execute(backend.build(&*statement)).await?;
    }

    // Une seule ligne de panier par (utilisateur, produit)
    let cart_line_index = Index::create()
        .name("idx_cart_items_user_product")
        .table(cart_item::Entity)
        .col(cart_item::Column::UserId)
        .col(cart_item::Column::ProductId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&cart_line_index)).await?;

    Ok(())
}

/// Base SQLite en mémoire avec une seule connexion : les transactions
/// concurrentes sont sérialisées comme le ferait un verrou de ligne
#[cfg(test)]
pub async fn connect_for_tests() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options.max_connections(1).min_connections(1).sqlx_logging(false);

    let db = Database::connect(options).await.expect("sqlite in memory");
    create_schema(&db).await.expect("schema");
    db
}
