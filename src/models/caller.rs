//! Caller identity supplied by the upstream identity provider

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

/// Who is performing an engine operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub email: String,
    pub role: Role,
}

impl Caller {
    pub fn admin(email: impl Into<String>) -> Self {
        Self { email: email.into(), role: Role::Admin }
    }

    pub fn member(email: impl Into<String>) -> Self {
        Self { email: email.into(), role: Role::Member }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::NotAuthorized("Admin privileges required".to_string()))
        }
    }
}

/// JWT claims issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// Email of the authenticated identity
    pub sub: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn into_caller(self) -> Caller {
        Caller { email: self.sub, role: self.role }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_token_round_trip_yields_caller() {
        let now = Utc::now();
        let claims = UserClaims {
            sub: "jane@example.org".into(),
            role: Role::Member,
            exp: (now + Duration::hours(1)).timestamp(),
            iat: now.timestamp(),
        };
        let token = claims.create_token("secret").unwrap();
        let caller = UserClaims::from_token(&token, "secret").unwrap().into_caller();
        assert_eq!(caller, Caller::member("jane@example.org"));
        assert!(caller.require_admin().is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let now = Utc::now();
        let claims = UserClaims {
            sub: "admin@example.org".into(),
            role: Role::Admin,
            exp: (now + Duration::hours(1)).timestamp(),
            iat: now.timestamp(),
        };
        let token = claims.create_token("secret").unwrap();
        assert!(UserClaims::from_token(&token, "other").is_err());
    }
}
