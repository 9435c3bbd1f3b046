// Configuration lue depuis l'environnement (.env chargé par dotenv dans main)

use rust_decimal::Decimal;
use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in .env file")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Préfixe des numéros de commande (ex: "ORD" → ORD-1719999999-4821)
    pub order_number_prefix: String,
    /// Nombre de tentatives de génération d'un numéro de commande unique
    pub order_number_attempts: u32,
    /// Frais de port fixes par commande
    pub shipping_cost: Decimal,
    /// Taxe en pourcentage du sous-total remisé (ex: 20 → 20 %)
    pub tax_rate: Decimal,
    /// Crée les tables au démarrage à partir des entités SeaORM
    pub auto_migrate: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parsed("PORT", 8080)?,
            jwt_secret: required("JWT_SECRET")?,
            order_number_prefix: env::var("ORDER_NUMBER_PREFIX").unwrap_or_else(|_| "ORD".to_string()),
            order_number_attempts: parsed("ORDER_NUMBER_ATTEMPTS", 5)?,
            shipping_cost: non_negative("SHIPPING_COST")?,
            tax_rate: non_negative("TAX_RATE")?,
            auto_migrate: parsed("AUTO_MIGRATE", false)?,
        })
    }

    /// Configuration utilisée par les tests (SQLite en mémoire)
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            jwt_secret: "test-secret".to_string(),
            order_number_prefix: "ORD".to_string(),
            order_number_attempts: 5,
            shipping_cost: Decimal::ZERO,
            tax_rate: Decimal::ZERO,
            auto_migrate: true,
        }
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

fn non_negative(name: &'static str) -> Result<Decimal, ConfigError> {
    let value: Decimal = parsed(name, Decimal::ZERO)?;
    if value < Decimal::ZERO {
        return Err(ConfigError::Invalid { name, value: value.to_string() });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsed_falls_back_to_default() {
        let port: u16 = parsed("SHOP_TEST_UNSET_PORT", 8080).unwrap();
        assert_eq!(port, 8080);
    }

    #[test]
    fn test_charges_default_to_zero() {
        assert_eq!(non_negative("SHOP_TEST_UNSET_TAX").unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_missing_required_variable() {
        let err = required("SHOP_TEST_UNSET_SECRET").unwrap_err();
        assert_eq!(err.to_string(), "SHOP_TEST_UNSET_SECRET must be set in .env file");
    }
}
