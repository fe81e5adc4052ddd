use crate::{store::UserProfile, Error};
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const NAME_MIN: usize = 3;
const NAME_MAX: usize = 50;
const PASSWORD_MIN: usize = 8;
const PASSWORD_MAX: usize = 128;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        validate_name(&self.name)?;
        validate_email(&self.email)?;
        validate_password(&self.password)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err(Error::InvalidInput("password is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccessTokenResponse {
    pub access_token: String,
}

/// Body of every operation that targets one account.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UserIdRequest {
    pub user_id: String,
}

impl UserIdRequest {
    pub(crate) fn validate(&self) -> Result<&str, Error> {
        non_empty("user_id", &self.user_id)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmEmailRequest {
    pub user_id: String,
    pub token: String,
}

impl ConfirmEmailRequest {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        non_empty("user_id", &self.user_id)?;
        non_empty("token", &self.token)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SearchUsersRequest {
    pub email_prefix: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UsersResponse {
    pub users: Vec<UserProfile>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub new_password: String,
}

impl ChangePasswordRequest {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        validate_password(&self.new_password)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoleCheckResponse {
    pub user_id: String,
    pub granted: bool,
}

fn non_empty<'a>(field: &str, value: &'a str) -> Result<&'a str, Error> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::InvalidInput(format!("{field} is required")));
    }
    Ok(value)
}

fn validate_name(name: &str) -> Result<(), Error> {
    let len = name.trim().chars().count();
    if !(NAME_MIN..=NAME_MAX).contains(&len) {
        return Err(Error::InvalidInput(format!(
            "name must be between {NAME_MIN} and {NAME_MAX} characters"
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), Error> {
    if valid_email(&email.trim().to_lowercase()) {
        Ok(())
    } else {
        Err(Error::InvalidInput("invalid email address".to_string()))
    }
}

fn validate_password(password: &str) -> Result<(), Error> {
    let len = password.chars().count();
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
        return Err(Error::InvalidInput(format!(
            "password must be between {PASSWORD_MIN} and {PASSWORD_MAX} characters"
        )));
    }
    Ok(())
}

pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}
