//! Input rules for the auth endpoints.
//!
//! Each `validate_*` function returns the normalized input on success, or every
//! failed rule as a [`FieldError`] list.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::FieldError;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_]+([.-]?[A-Za-z0-9_]+)*@[A-Za-z0-9_]+([.-]?[A-Za-z0-9_]+)*(\.[A-Za-z0-9_]{2,3})+$")
        .expect("static regex")
});

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("static regex"));

const NAME_LEN: std::ops::RangeInclusive<usize> = 2..=50;
const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=20;
const MIN_PASSWORD_LEN: usize = 6;

pub fn is_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

/// Username shape: 3–20 characters of letters, digits and underscore.
pub fn is_username(value: &str) -> bool {
    USERNAME_LEN.contains(&value.chars().count()) && USERNAME_RE.is_match(value)
}

/// Validated and normalized registration input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Validated login input. `identifier` is either an e-mail or a username, lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub identifier: String,
    pub password: String,
}

fn check_username(raw: Option<&str>, errors: &mut Vec<FieldError>) -> String {
    let username = raw.unwrap_or_default().trim();
    if !USERNAME_LEN.contains(&username.chars().count()) {
        errors.push(FieldError::new(
            "username",
            "Username must be between 3 and 20 characters",
        ));
    }
    if !USERNAME_RE.is_match(username) {
        errors.push(FieldError::new(
            "username",
            "Username can only contain letters, numbers, and underscores",
        ));
    }
    username.to_lowercase()
}

pub fn validate_registration(
    name: Option<&str>,
    username: Option<&str>,
    email: Option<&str>,
    password: Option<&str>,
) -> Result<Registration, Vec<FieldError>> {
    let mut errors = Vec::new();

    let name = name.unwrap_or_default().trim();
    if !NAME_LEN.contains(&name.chars().count()) {
        errors.push(FieldError::new(
            "name",
            "Name must be between 2 and 50 characters",
        ));
    }

    let username = check_username(username, &mut errors);

    let email = email.unwrap_or_default().trim().to_lowercase();
    if !is_email(&email) {
        errors.push(FieldError::new("email", "Please provide a valid email"));
    }

    let password = password.unwrap_or_default();
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new(
            "password",
            "Password must be at least 6 characters long",
        ));
    }
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_lower && has_upper && has_digit) {
        errors.push(FieldError::new(
            "password",
            "Password must contain at least one lowercase letter, one uppercase letter, and one number",
        ));
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(Registration {
        name: name.to_string(),
        username,
        email,
        password: password.to_string(),
    })
}

pub fn validate_username(username: Option<&str>) -> Result<String, Vec<FieldError>> {
    let mut errors = Vec::new();
    let username = check_username(username, &mut errors);
    if errors.is_empty() {
        Ok(username)
    } else {
        Err(errors)
    }
}

pub fn validate_login(
    identifier: Option<&str>,
    password: Option<&str>,
) -> Result<Login, Vec<FieldError>> {
    let mut errors = Vec::new();

    let identifier = identifier.unwrap_or_default().trim();
    if identifier.is_empty() {
        errors.push(FieldError::new("email", "Please provide email or username"));
    } else if !is_email(identifier) && !is_username(identifier) {
        errors.push(FieldError::new(
            "email",
            "Please provide a valid email or username",
        ));
    }

    let password = password.unwrap_or_default();
    if password.is_empty() {
        errors.push(FieldError::new("password", "Password is required"));
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(Login {
        identifier: identifier.to_lowercase(),
        password: password.to_string(),
    })
}
