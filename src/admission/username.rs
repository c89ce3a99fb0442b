use regex::Regex;

use super::AdmissionError;

pub const USERNAME_MAX_LEN: usize = 15;

/// Checks the username format used by `register` and by the target of `rename`:
/// 1 to 15 characters and no whitespace.
///
/// # Errors
/// Returns `AdmissionError::InvalidInput` describing the first rule that failed.
pub fn validate_username(username: &str) -> Result<(), AdmissionError> {
    if username.is_empty() {
        return Err(AdmissionError::InvalidInput(
            "username must not be empty".to_string(),
        ));
    }

    if username.chars().count() > USERNAME_MAX_LEN {
        return Err(AdmissionError::InvalidInput(format!(
            "username must be at most {USERNAME_MAX_LEN} characters"
        )));
    }

    if !Regex::new(r"^\S+$").is_ok_and(|re| re.is_match(username)) {
        return Err(AdmissionError::InvalidInput(
            "username must not contain whitespace".to_string(),
        ));
    }

    Ok(())
}
