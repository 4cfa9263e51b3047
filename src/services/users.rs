//! Accounts, authentication and guest profiles

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{CreateUser, LoginRequest, NewUser, RegisterUser, Role, UpdateGuestProfile, User, UserClaims},
    repository::Repository,
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: AuthConfig,
}

impl UsersService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Public self-registration. Always creates a student account.
    pub async fn register(&self, request: RegisterUser) -> AppResult<User> {
        request.validate()?;
        let user = self
            .repository
            .users
            .create(NewUser {
                username: request.username,
                email: request.email,
                password_hash: self.hash_password(&request.password)?,
                role: Role::Student,
                expertise: Vec::new(),
                bio: None,
                organization: None,
            })
            .await?;
        tracing::info!(user_id = %user.id, "Registered student account");
        Ok(user)
    }

    /// Administrative account creation, any role
    pub async fn create_user(&self, request: CreateUser) -> AppResult<User> {
        request.validate()?;
        let user = self
            .repository
            .users
            .create(NewUser {
                username: request.username,
                email: request.email,
                password_hash: self.hash_password(&request.password)?,
                role: request.role,
                expertise: request.expertise,
                bio: request.bio,
                organization: request.organization,
            })
            .await?;
        tracing::info!(user_id = %user.id, role = %user.role, "Created account");
        Ok(user)
    }

    /// Authenticate by email and password and issue a JWT
    pub async fn login(&self, request: LoginRequest) -> AppResult<(String, User)> {
        let user = self
            .repository
            .users
            .find_by_email(&request.email)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid email or password".to_string()))?;

        if !self.verify_password(&user, &request.password)? {
            return Err(AppError::Authentication("Invalid email or password".to_string()));
        }

        let token = self.create_token(&user)?;
        tracing::info!(user_id = %user.id, "User logged in");
        Ok((token, user))
    }

    pub fn create_token(&self, user: &User) -> AppResult<String> {
        UserClaims::new(user, self.config.jwt_expiration_hours)
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<User> {
        self.repository.users.get(id).await
    }

    pub async fn list_guests(&self) -> AppResult<Vec<User>> {
        self.repository.users.list_by_role(Role::Guest).await
    }

    pub async fn update_guest_profile(&self, id: Uuid, profile: UpdateGuestProfile) -> AppResult<User> {
        // Distinguish a missing account from a non-guest one
        self.repository.users.get(id).await?;
        let guest = self.repository.users.update_guest_profile(id, &profile).await?;
        tracing::info!(guest_id = %id, is_available = guest.is_available, "Updated guest profile");
        Ok(guest)
    }

    /// Create the configured administrator account if it does not exist yet
    pub async fn bootstrap_admin(&self) -> AppResult<Option<User>> {
        let (Some(email), Some(password)) = (
            self.config.bootstrap_admin_email.as_deref(),
            self.config.bootstrap_admin_password.as_deref(),
        ) else {
            return Ok(None);
        };

        if self.repository.users.find_by_email(email).await?.is_some() {
            tracing::debug!("Bootstrap admin {} already exists", email);
            return Ok(None);
        }

        let admin = self
            .repository
            .users
            .create(NewUser {
                username: "admin".to_string(),
                email: email.to_string(),
                password_hash: self.hash_password(password)?,
                role: Role::Admin,
                expertise: Vec::new(),
                bio: None,
                organization: None,
            })
            .await?;
        tracing::info!(user_id = %admin.id, "Created bootstrap administrator {}", email);
        Ok(Some(admin))
    }

    fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.password_hash)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }
}
