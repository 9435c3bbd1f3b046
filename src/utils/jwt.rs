use jsonwebtoken::{decode, Validation, DecodingKey, Algorithm};
use serde::{Deserialize, Serialize};

/// Rôle porté par le token (émis par le service d'identité)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Customer,
    Admin,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,        // user_id
    pub username: String,
    #[serde(default)]
    pub role: Role,
    pub exp: i64,        // expiration timestamp
}

/// Génère un JWT token pour un utilisateur.
/// Les tokens réels sont émis par le service d'identité.
#[cfg(test)]
pub fn generate_token(user_id: i32, username: &str, role: Role, secret: &str) -> Result<String, String> {
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(24))
        .ok_or("Failed to calculate expiration")?
        .timestamp();

    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        role,
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
        .map_err(|e| format!("Failed to generate token: {}", e))
}

/// Vérifie et décode un JWT token
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::new(Algorithm::HS256),
    )
        .map(|data| data.claims)
        .map_err(|e| format!("Invalid token: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_verify_token() {
        let token = generate_token(123, "testuser", Role::Admin, "secret").unwrap();
        let claims = verify_token(&token, "secret").unwrap();

        assert_eq!(claims.sub, 123);
        assert_eq!(claims.username, "testuser");
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = generate_token(1, "testuser", Role::Customer, "secret").unwrap();
        assert!(verify_token(&token, "other").is_err());
    }

    #[test]
    fn test_invalid_token() {
        let result = verify_token("invalid.token.here", "secret");
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_role_defaults_to_customer() {
        let claims: Claims = serde_json::from_str(r#"{"sub":5,"username":"bob","exp":0}"#).unwrap();
        assert_eq!(claims.role, Role::Customer);
    }
}
