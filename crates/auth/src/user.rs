//! Staff accounts.

use serde::{Deserialize, Serialize};

use tillpoint_core::error::{require_email, require_text};
use tillpoint_core::{DomainError, DomainResult, Entity, UserId};

use crate::{OtpChallenge, Role};

/// A staff account as stored. `password_hash` never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub password_hash: String,
    pub otp: Option<OtpChallenge>,
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> UserId {
        self.id
    }
}

impl User {
    pub fn create(id: UserId, new: NewUser, password_hash: String) -> Self {
        Self {
            id,
            name: new.name,
            email: new.email,
            role: new.role,
            password_hash,
            otp: None,
        }
    }

    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// Public projection of a [`User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Raw account input from registration or the admin screens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDraft {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub password: Option<String>,
    pub role: String,
}

/// Validated account fields. `password` is still plain text here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub password: Option<String>,
}

impl UserDraft {
    /// Validation for new accounts: a password is mandatory.
    pub fn validate_new(self) -> DomainResult<NewUser> {
        let user = self.validate_profile()?;
        match user.password.as_deref() {
            Some(p) if !p.is_empty() => Ok(user),
            _ => Err(DomainError::validation("password cannot be empty")),
        }
    }

    /// Validation for profile edits: the password is optional.
    pub fn validate_profile(self) -> DomainResult<NewUser> {
        Ok(NewUser {
            name: require_text("name", &self.name)?,
            email: require_email(&self.email)?,
            role: self.role.parse()?,
            password: self.password.filter(|p| !p.is_empty()),
        })
    }
}
