//! User model, roles and JWT claims

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Student,
    Guest,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Student => "student",
            Role::Guest => "guest",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User account. Guests additionally carry a speaker profile.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    /// Fields of expertise (guests)
    pub expertise: Vec<String>,
    pub bio: Option<String>,
    pub organization: Option<String>,
    /// Whether a guest may be invited to new events
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Only available guests may be attached to an event
    pub fn is_eligible_guest(&self) -> bool {
        self.role == Role::Guest && self.is_available
    }

    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.id,
            role: self.role,
        }
    }
}

/// Insertable user record
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub expertise: Vec<String>,
    pub bio: Option<String>,
    pub organization: Option<String>,
}

/// Public self-registration request (always creates a student)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterUser {
    #[validate(length(min = 1, max = 100))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
}

/// Administrative account creation request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUser {
    #[validate(length(min = 1, max = 100))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub expertise: Vec<String>,
    pub bio: Option<String>,
    pub organization: Option<String>,
}

/// Guest profile update
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGuestProfile {
    pub expertise: Option<Vec<String>>,
    pub bio: Option<String>,
    pub organization: Option<String>,
    pub is_available: Option<bool>,
}

/// Login request
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// The identity an engine operation acts on behalf of
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// The actor owns the record or holds administrative capability
    pub fn may_act_for(&self, owner: Uuid) -> bool {
        self.user_id == owner || self.is_admin()
    }
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    pub fn new(user: &User, expiration_hours: u64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user.id,
            role: user.role,
            iat: now,
            exp: now + expiration_hours as i64 * 3600,
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

    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.sub,
            role: self.role,
        }
    }

    /// Check if user is admin
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Require admin privileges
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::NotAuthorized("Administrator privileges required".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            username: "ada".into(),
            email: "ada@campus.edu".into(),
            password_hash: String::new(),
            role,
            expertise: vec![],
            bio: None,
            organization: None,
            is_available: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_token_round_trip() {
        let claims = UserClaims::new(&user(Role::Student), 1);
        let token = claims.create_token("secret").unwrap();
        let decoded = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.role, Role::Student);
        assert!(UserClaims::from_token(&token, "other").is_err());
    }

    #[test]
    fn test_guest_eligibility() {
        assert!(user(Role::Guest).is_eligible_guest());
        assert!(!user(Role::Student).is_eligible_guest());
        let mut busy = user(Role::Guest);
        busy.is_available = false;
        assert!(!busy.is_eligible_guest());
    }

    #[test]
    fn test_actor_ownership() {
        let owner = Uuid::new_v4();
        let student = Actor { user_id: Uuid::new_v4(), role: Role::Student };
        let admin = Actor { user_id: Uuid::new_v4(), role: Role::Admin };
        assert!(!student.may_act_for(owner));
        assert!(admin.may_act_for(owner));
        assert!(Actor { user_id: owner, role: Role::Student }.may_act_for(owner));
    }
}
