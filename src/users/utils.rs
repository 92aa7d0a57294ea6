use lazy_static::lazy_static;
use regex::Regex;

use crate::db::Store;
use crate::types::{ApiError, ValidationError};

lazy_static! {
    static ref EMAIL_RE: Regex = {
        let pattern = r"\A[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\z";
        Regex::new(pattern).expect("email pattern compiles")
    };
}

pub fn validate_email_re(email: &str) -> Result<(), ValidationError> {
    if !EMAIL_RE.is_match(email) {
        Err(ValidationError::from("email", format!("Invalid email: {}", email)))
    } else {
        Ok(())
    }
}

pub fn validate_username_re(username: &str) -> Result<(), ValidationError> {
    if username.trim().len() < 3 {
        Err(ValidationError::from("username", format!("username too short: {}", username)))
    } else {
        Ok(())
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.len() < 5 {
        Err(ValidationError::from("password", "Password too short"))
    } else {
        Ok(())
    }
}

/// Shape and uniqueness of an email; `except` is the user allowed to hold it.
pub fn validate_email(store: &dyn Store, email: &str, except: Option<i32>) -> Result<ValidationError, ApiError> {
    let mut errors = ValidationError::default();
    if let Err(e) = validate_email_re(email) {
        errors.merge(e);
    }
    if store.email_taken(email, except)? {
        errors.add_error("email", "Email already exists");
    }
    Ok(errors)
}

pub fn validate_username(store: &dyn Store, username: &str, except: Option<i32>) -> Result<ValidationError, ApiError> {
    let mut errors = ValidationError::default();
    if let Err(e) = validate_username_re(username) {
        errors.merge(e);
    }
    if store.username_taken(username, except)? {
        errors.add_error("username", "Username already exists");
    }
    Ok(errors)
}
