//! Profile completion helpers
//!
//! Turns what a user typed into a `ProfileUpdate` the backend accepts.

use crate::{AuthError, AuthResult};
use domus_core::{DomusError, ProfileUpdate};

const MIN_PHONE_DIGITS: usize = 9;
const MAX_PHONE_DIGITS: usize = 15;

/// Normalize a phone number to `+<country><subscriber>`
///
/// Separators are dropped and an international `00` prefix becomes `+`.
/// Numbers without a country code get `default_country_code`. A bare number
/// that already starts with the country code and is long enough to carry a
/// full subscriber number is only prefixed with `+`.
pub fn normalize_phone(raw: &str, default_country_code: &str) -> AuthResult<String> {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    if compact.is_empty() {
        return Err(AuthError::invalid_profile(
            "phone",
            "Please enter a phone number",
        ));
    }

    let international = if let Some(rest) = compact.strip_prefix('+') {
        rest.to_string()
    } else if let Some(rest) = compact.strip_prefix("00") {
        rest.to_string()
    } else if compact.starts_with(default_country_code)
        && compact.len() >= default_country_code.len() + MIN_PHONE_DIGITS
    {
        compact
    } else {
        format!("{}{}", default_country_code, compact)
    };

    if !international.chars().all(|c| c.is_ascii_digit()) {
        return Err(AuthError::invalid_profile(
            "phone",
            "Phone number may only contain digits",
        ));
    }

    let digits = international.len();
    if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits) {
        return Err(AuthError::invalid_profile(
            "phone",
            "Please enter a valid phone number",
        ));
    }

    Ok(format!("+{}", international))
}

/// Validate an update and bring it into wire form
///
/// Names are trimmed and phone numbers normalized. Every rejection is an
/// `InvalidProfile` naming the offending field.
pub fn prepare_update(
    update: ProfileUpdate,
    default_country_code: &str,
) -> AuthResult<ProfileUpdate> {
    update.validate().map_err(|e| match e {
        DomusError::Validation { message, field, .. } => AuthError::InvalidProfile {
            field: field.unwrap_or_else(|| "update".to_string()),
            message,
        },
        other => AuthError::invalid_profile("update", other.to_string()),
    })?;

    let phone = update
        .phone
        .as_deref()
        .map(|raw| normalize_phone(raw, default_country_code))
        .transpose()?;

    Ok(ProfileUpdate {
        name: update.name.map(|name| name.trim().to_string()),
        role: update.role,
        phone,
    })
}
