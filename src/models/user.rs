//! User account, roles and authenticated caller

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::error::AppError;

/// Capability level of an authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patron,
    Librarian,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patron => "patron",
            Role::Librarian => "librarian",
            Role::Admin => "admin",
        }
    }

    /// Librarian capability (admins hold it too)
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Librarian | Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Authenticated identity handed to the engine by the session layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i32,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: i32, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn librarian(user_id: i32) -> Self {
        Self::new(user_id, Role::Librarian)
    }

    pub fn patron(user_id: i32) -> Self {
        Self::new(user_id, Role::Patron)
    }

    pub fn require_librarian(&self) -> Result<(), AppError> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(AppError::NotAuthenticated(
                "Librarian privileges required".to_string(),
            ))
        }
    }

    /// Staff may act for anyone; patrons only for themselves
    pub fn require_acting_for(&self, user_id: i32) -> Result<(), AppError> {
        if self.role.is_staff() || self.user_id == user_id {
            Ok(())
        } else {
            Err(AppError::NotAuthenticated(format!(
                "Not allowed to act on behalf of user {}",
                user_id
            )))
        }
    }
}

/// User account with its running fine balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserAccount {
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
    /// Sum of the user's unpaid fine amounts
    pub balance: Decimal,
}

/// Balance read model
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BalanceResponse {
    pub user_id: i32,
    pub balance: Decimal,
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i32,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    pub fn new(user_id: i32, login: &str, role: Role, expiration_hours: u64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: login.to_string(),
            user_id,
            role,
            iat: now,
            exp: now + (expiration_hours as i64) * 3600,
        }
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn caller(&self) -> Caller {
        Caller::new(self.user_id, self.role)
    }
}
