//! Login boundary: obtains a credential and hands it to the session store.

use std::fmt;
use std::ops::RangeInclusive;

use log::info;

use crate::backend::{ApiError, Backend, Credentials};
use crate::core::session::SessionStore;

pub const PASSWORD_CHARS: RangeInclusive<usize> = 6..=64;

#[derive(Debug)]
pub enum AuthError {
    /// Rejected locally; nothing was sent.
    Validation(String),
    Api(ApiError),
    Store(std::io::Error),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Validation(msg) => write!(f, "{msg}"),
            AuthError::Api(ApiError::Unauthorized) => write!(f, "invalid username or password"),
            AuthError::Api(e) => write!(f, "{e}"),
            AuthError::Store(e) => write!(f, "could not save session: {e}"),
        }
    }
}

impl std::error::Error for AuthError {}

fn require(field: &str, value: &str) -> Result<(), AuthError> {
    if value.trim().is_empty() {
        return Err(AuthError::Validation(format!("{field} is required")));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if !PASSWORD_CHARS.contains(&len) {
        return Err(AuthError::Validation(format!(
            "password must be between {} and {} characters",
            PASSWORD_CHARS.start(),
            PASSWORD_CHARS.end()
        )));
    }
    Ok(())
}

fn remember(store: &mut SessionStore, credentials: &Credentials) -> Result<(), AuthError> {
    store
        .set_credential(&credentials.token, &credentials.display_name)
        .map_err(AuthError::Store)
}

pub async fn login(
    backend: &dyn Backend,
    store: &mut SessionStore,
    username: &str,
    password: &str,
) -> Result<Credentials, AuthError> {
    require("username", username)?;
    require("password", password)?;
    let credentials = backend
        .login(username.trim(), password)
        .await
        .map_err(AuthError::Api)?;
    remember(store, &credentials)?;
    info!("Logged in as {}", credentials.display_name);
    Ok(credentials)
}

pub async fn register(
    backend: &dyn Backend,
    store: &mut SessionStore,
    username: &str,
    email: Option<&str>,
    password: &str,
) -> Result<Credentials, AuthError> {
    require("username", username)?;
    validate_password(password)?;
    let email = email.map(str::trim).filter(|e| !e.is_empty());
    let credentials = backend
        .register(username.trim(), email, password)
        .await
        .map_err(AuthError::Api)?;
    remember(store, &credentials)?;
    info!("Registered {}", credentials.display_name);
    Ok(credentials)
}

pub fn logout(store: &mut SessionStore) -> Result<(), AuthError> {
    store.clear().map_err(AuthError::Store)
}
