use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use crate::domain::models::{Document, Patch, Validate};
use crate::domain::services::api_features::{FieldKind, FieldSpec};
use crate::error::AppError;

pub const DEFAULT_PHOTO: &str = "default.jpg";
pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Guide,
    LeadGuide,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Guide => "guide",
            Role::LeadGuide => "lead-guide",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "guide" => Ok(Role::Guide),
            "lead-guide" => Ok(Role::LeadGuide),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::Validation(format!("'{}' is not a valid role", other))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, FromRow, Clone)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub role: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub password_changed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            email: normalize_email(&email),
            photo: DEFAULT_PHOTO.to_string(),
            role: Role::User.as_str().to_string(),
            password_hash,
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    /// Unknown roles in storage never match a role gate.
    pub fn role(&self) -> Option<Role> {
        self.role.parse().ok()
    }

    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }

    /// Records a new password hash. The change time is backdated by one
    /// second so a token issued right after the write still validates.
    pub fn set_password(&mut self, password_hash: String) {
        self.password_hash = password_hash;
        self.password_changed_at = Some(Utc::now() - Duration::seconds(1));
        self.password_reset_token = None;
        self.password_reset_expires = None;
    }

    /// True when the password changed after a token issued at `issued_at`
    /// (unix seconds).
    pub fn changed_password_after(&self, issued_at: i64) -> bool {
        match self.password_changed_at {
            Some(changed) => changed.timestamp() > issued_at,
            None => false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, alias = "passwordConfirm")]
    pub password_confirm: String,
}

impl Validate for SignupRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("Please tell us your name!".into()));
        }
        validate_email(&self.email)?;
        validate_password(&self.password, &self.password_confirm)
    }
}

/// Admin-side and self-service profile update.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub photo: Option<String>,
    pub role: Option<String>,
}

impl Patch<User> for UserPatch {
    fn apply(self, target: &mut User) -> Result<(), AppError> {
        let mut user = target.clone();
        if let Some(name) = self.name {
            if name.trim().is_empty() {
                return Err(AppError::Validation("Please tell us your name!".into()));
            }
            user.name = name.trim().to_string();
        }
        if let Some(email) = self.email {
            validate_email(&email)?;
            user.email = normalize_email(&email);
        }
        if let Some(photo) = self.photo {
            user.photo = photo;
        }
        if let Some(role) = self.role {
            user.role = role.parse::<Role>()?.as_str().to_string();
        }
        *target = user;
        Ok(())
    }
}

impl Document for User {
    const NAME: &'static str = "user";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("id", "id", FieldKind::Text),
        FieldSpec::new("name", "name", FieldKind::Text),
        FieldSpec::new("email", "email", FieldKind::Text),
        FieldSpec::new("role", "role", FieldKind::Text).repeatable(),
        FieldSpec::new("created_at", "created_at", FieldKind::Timestamp),
    ];

    type Record = User;
    type Create = User;
    type Update = UserPatch;
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(AppError::Validation("Please provide a valid email".into()))
    }
}

pub fn validate_password(password: &str, confirm: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "Password must have at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    if password != confirm {
        return Err(AppError::Validation("Passwords are not the same!".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_change_is_backdated() {
        let mut user = User::new("Jonas".into(), "Jonas@Example.com".into(), "hash".into());
        assert_eq!(user.email, "jonas@example.com");
        assert!(!user.changed_password_after(0));

        let before = Utc::now().timestamp();
        user.set_password("new-hash".into());

        assert!(user.changed_password_after(before - 10));
        assert!(!user.changed_password_after(before));
    }

    #[test]
    fn signup_requires_matching_passwords() {
        let mut req = SignupRequest {
            name: "Jonas".into(),
            email: "jonas@example.com".into(),
            password: "pass1234".into(),
            password_confirm: "pass1235".into(),
        };
        assert!(req.validate().is_err());

        req.password_confirm = "pass1234".into();
        assert!(req.validate().is_ok());

        req.password = "short".into();
        req.password_confirm = "short".into();
        assert!(req.validate().is_err());
    }

    #[test]
    fn email_validation() {
        assert!(validate_email("a@b.io").is_ok());
        assert!(validate_email("nope").is_err());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("a b@c.io").is_err());
    }

    #[test]
    fn patch_rejects_unknown_roles() {
        let mut user = User::new("Jonas".into(), "jonas@example.com".into(), "hash".into());
        let patch = UserPatch {
            name: Some("Someone Else".into()),
            role: Some("owner".into()),
            ..Default::default()
        };
        assert!(patch.apply(&mut user).is_err());
        assert_eq!(user.name, "Jonas");

        let patch = UserPatch { role: Some("lead-guide".into()), ..Default::default() };
        patch.apply(&mut user).unwrap();
        assert_eq!(user.role(), Some(Role::LeadGuide));
    }
}
