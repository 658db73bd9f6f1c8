//! Local input checks run before any backend call.

use regex::Regex;

use crate::error::AuthError;

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    let email_regex = Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .map_err(|_| AuthError::InvalidInput("Invalid email regex".to_string()))?;

    if email.len() > 255 || !email_regex.is_match(email) {
        return Err(AuthError::InvalidInput(
            "Please enter a valid email address".to_string(),
        ));
    }

    Ok(())
}

/// Password length is counted in characters, not bytes.
pub fn validate_password_length(password: &str, min: usize) -> Result<(), AuthError> {
    if password.chars().count() < min {
        return Err(AuthError::WeakPassword { min });
    }
    Ok(())
}

pub fn validate_display_name(display_name: &str) -> Result<(), AuthError> {
    if display_name.trim().is_empty() {
        return Err(AuthError::InvalidInput(
            "Display name cannot be empty".to_string(),
        ));
    }

    if display_name.chars().count() > 50 {
        return Err(AuthError::InvalidInput(
            "Display name must be less than 50 characters long".to_string(),
        ));
    }

    let disallowed_chars = ['\n', '\r', '\t', '\0'];
    if display_name.chars().any(|c| disallowed_chars.contains(&c)) {
        return Err(AuthError::InvalidInput(
            "Display name contains invalid characters".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_mobile_number(mobile_number: &str) -> Result<(), AuthError> {
    let mobile_regex = Regex::new(r"^\+?[0-9 ()-]{3,20}$")
        .map_err(|_| AuthError::InvalidInput("Invalid mobile number regex".to_string()))?;

    if !mobile_number.is_empty() && !mobile_regex.is_match(mobile_number) {
        return Err(AuthError::InvalidInput(
            "Please enter a valid mobile number".to_string(),
        ));
    }

    Ok(())
}
