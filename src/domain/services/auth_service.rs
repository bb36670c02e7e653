use std::sync::Arc;
use crate::domain::{
    models::{
        Validate,
        auth::{Claims, ResetToken},
        user::{normalize_email, validate_password, SignupRequest, User},
    },
    ports::{ResourceRepository, UserRepository},
};
use crate::error::AppError;
use crate::config::Config;
use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use sha2::{Sha256, Digest};
use tracing::{error, info};

pub const RESET_TOKEN_TTL_MINUTES: i64 = 10;
const INCORRECT_CREDENTIALS: &str = "Incorrect email or password";

pub struct AuthService {
    users: Arc<dyn ResourceRepository<User>>,
    credentials: Arc<dyn UserRepository>,
    config: Config,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn ResourceRepository<User>>,
        credentials: Arc<dyn UserRepository>,
        config: Config,
    ) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

        Self { users, credentials, config, encoding_key, decoding_key }
    }

    /// validate -> hash -> persist. The confirmation never leaves this call.
    pub async fn signup(&self, request: SignupRequest) -> Result<User, AppError> {
        request.validate()?;

        let password_hash = self.hash_password(&request.password)?;
        let user = User::new(request.name, request.email, password_hash);
        let user = self.users.create(&user).await?;

        info!("User signed up: {}", user.id);
        Ok(user)
    }

    /// Unknown email, inactive account and wrong password all fail the same way.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AppError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::Validation("Please provide email and password!".into()));
        }

        let user = self.credentials.find_by_email(&normalize_email(email)).await?
            .ok_or_else(|| AppError::Unauthorized(INCORRECT_CREDENTIALS.into()))?;

        if !self.verify_password(password, &user.password_hash) {
            return Err(AppError::Unauthorized(INCORRECT_CREDENTIALS.into()));
        }

        Ok(user)
    }

    /// Resolves a bearer token to the user it still speaks for.
    pub async fn authenticate(&self, token: &str) -> Result<User, AppError> {
        let claims = self.verify_token(token)?;

        let user = self.users.find_by_id(&claims.sub).await?
            .ok_or_else(|| AppError::Unauthorized("The user belonging to this token does no longer exist.".into()))?;

        if user.changed_password_after(claims.iat) {
            return Err(AppError::Unauthorized("User recently changed password! Please log in again.".into()));
        }

        Ok(user)
    }

    pub async fn start_password_reset(&self, email: &str) -> Result<(User, ResetToken), AppError> {
        let mut user = self.credentials.find_by_email(&normalize_email(email)).await?
            .ok_or_else(|| AppError::NotFound("There is no user with that email address.".into()))?;

        let reset = self.create_reset_token();
        user.password_reset_token = Some(reset.hash.clone());
        user.password_reset_expires = Some(reset.expires_at);
        self.credentials.save_credentials(&user).await?;

        Ok((user, reset))
    }

    /// Rolls back a reset whose mail could not be delivered.
    pub async fn cancel_password_reset(&self, user: &mut User) -> Result<(), AppError> {
        user.password_reset_token = None;
        user.password_reset_expires = None;
        self.credentials.save_credentials(user).await
    }

    pub async fn reset_password(&self, raw_token: &str, password: &str, confirm: &str) -> Result<User, AppError> {
        let token_hash = self.hash_token(raw_token);

        let mut user = self.credentials.find_by_reset_token(&token_hash, Utc::now()).await?
            .ok_or_else(|| AppError::Validation("Token is invalid or has expired".into()))?;

        validate_password(password, confirm)?;
        user.set_password(self.hash_password(password)?);
        self.credentials.save_credentials(&user).await?;

        info!("Password reset for user: {}", user.id);
        Ok(user)
    }

    pub async fn change_password(
        &self,
        user_id: &str,
        current: &str,
        password: &str,
        confirm: &str,
    ) -> Result<User, AppError> {
        let mut user = self.users.find_by_id(user_id).await?
            .ok_or_else(|| AppError::Unauthorized("The user belonging to this token does no longer exist.".into()))?;

        if !self.verify_password(current, &user.password_hash) {
            return Err(AppError::Unauthorized("Your current password is wrong.".into()));
        }

        validate_password(password, confirm)?;
        user.set_password(self.hash_password(password)?);
        self.credentials.save_credentials(&user).await?;

        info!("Password changed for user: {}", user.id);
        Ok(user)
    }

    pub fn issue_token(&self, user_id: &str) -> Result<String, AppError> {
        self.issue_token_at(user_id, Utc::now())
    }

    pub fn issue_token_at(&self, user_id: &str, issued_at: DateTime<Utc>) -> Result<String, AppError> {
        let claims = Claims {
            sub: user_id.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.config.jwt_expires_in).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| {
                error!("JWT encoding failed: {}", e);
                AppError::Internal
            })
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, AppError> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))?;
        Ok(data.claims)
    }

    pub fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::InternalWithMsg(format!("Password hashing failed: {}", e)))
    }

    pub fn verify_password(&self, password: &str, password_hash: &str) -> bool {
        PasswordHash::new(password_hash)
            .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
            .unwrap_or(false)
    }

    pub fn create_reset_token(&self) -> ResetToken {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        ResetToken {
            hash: self.hash_token(&token),
            token,
            expires_at: Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
        }
    }

    pub fn hash_token(&self, token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }
}
