use crate::error::AppError;

pub const USER_GENDERS: [&str; 3] = ["male", "female", "other"];
pub const VARIANT_GENDERS: [&str; 3] = ["Male", "Female", "Unisex"];
pub const ADDRESS_TYPES: [&str; 3] = ["home", "work", "other"];

pub fn require(value: &str, field: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::bad_request(format!("{field} is required.")));
    }
    Ok(trimmed.to_string())
}

pub fn phone(value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::bad_request(
            "Phone number should contain only digits.",
        ));
    }
    if value.len() > 15 {
        return Err(AppError::bad_request("Phone number is too long."));
    }
    Ok(value.to_string())
}

pub fn email(value: &str) -> Result<String, AppError> {
    let value = value.trim().to_lowercase();
    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(AppError::bad_request("Enter a valid email address."));
    }
    Ok(value)
}

pub fn one_of(value: &str, allowed: &[&str], field: &str) -> Result<String, AppError> {
    if allowed.contains(&value) {
        Ok(value.to_string())
    } else {
        Err(AppError::bad_request(format!(
            "Invalid {field}. Allowed: {}.",
            allowed.join(", ")
        )))
    }
}

pub fn passwords_match(password: &str, confirm: &str) -> Result<(), AppError> {
    if password != confirm {
        return Err(AppError::bad_request("Passwords do not match."));
    }
    if password.len() < 8 {
        return Err(AppError::bad_request(
            "Password must be at least 8 characters long.",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_must_be_digits() {
        assert_eq!(phone(" 9876543210 ").unwrap(), "9876543210");
        assert!(phone("98765-43210").is_err());
        assert!(phone("").is_err());
    }

    #[test]
    fn email_is_normalised() {
        assert_eq!(email(" Asha@Example.COM ").unwrap(), "asha@example.com");
        assert!(email("asha@example").is_err());
        assert!(email("@example.com").is_err());
    }

    #[test]
    fn choices_are_enforced() {
        assert!(one_of("Unisex", &VARIANT_GENDERS, "gender").is_ok());
        assert!(one_of("unisex", &VARIANT_GENDERS, "gender").is_err());
        assert!(one_of("work", &ADDRESS_TYPES, "address type").is_ok());
    }

    #[test]
    fn passwords_must_match_and_be_long_enough() {
        assert!(passwords_match("secret123", "secret123").is_ok());
        assert!(passwords_match("secret123", "secret124").is_err());
        assert!(passwords_match("short", "short").is_err());
    }
}
