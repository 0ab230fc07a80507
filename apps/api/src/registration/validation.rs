use crate::errors::AppError;
use crate::models::tier::Tier;

pub const EMAIL_REQUIRED: &str = "EMAIL_REQUIRED";
pub const EMAIL_INVALID: &str = "EMAIL_INVALID";
pub const PASSWORD_REQUIRED: &str = "PASSWORD_REQUIRED";
pub const PASSWORD_TOO_SHORT: &str = "PASSWORD_TOO_SHORT";
pub const PASSWORD_TOO_LONG: &str = "PASSWORD_TOO_LONG";
pub const PASSWORD_WEAK: &str = "PASSWORD_WEAK";
pub const NAME_REQUIRED: &str = "NAME_REQUIRED";
pub const NAME_TOO_SHORT: &str = "NAME_TOO_SHORT";
pub const NAME_TOO_LONG: &str = "NAME_TOO_LONG";
pub const NAME_INVALID: &str = "NAME_INVALID";
pub const TIER_REQUIRED: &str = "TIER_REQUIRED";
pub const TIER_INVALID: &str = "TIER_INVALID";

fn invalid(code: &'static str, message: &str) -> AppError {
    AppError::Validation {
        code,
        message: message.to_string(),
    }
}

/// Validates an email address and returns its normalized (trimmed,
/// lowercased) form. All lookups and storage use the normalized form, which
/// is what makes email uniqueness case-insensitive.
pub fn validate_email(email: &str) -> Result<String, AppError> {
    let trimmed = email.trim().to_lowercase();
    if trimmed.is_empty() {
        return Err(invalid(EMAIL_REQUIRED, "Please enter your email address"));
    }

    // local@domain.tld shape, no whitespace anywhere.
    let mut parts = trimmed.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    let shape_ok = !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !trimmed.chars().any(char::is_whitespace);

    if !shape_ok {
        return Err(invalid(EMAIL_INVALID, "Please enter a valid email address"));
    }

    Ok(trimmed)
}

/// Validates password strength: 8..=128 chars with at least 2 of the 4
/// character classes (lowercase, uppercase, digit, symbol).
pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.is_empty() {
        return Err(invalid(PASSWORD_REQUIRED, "Please enter a password"));
    }
    if password.len() < 8 {
        return Err(invalid(
            PASSWORD_TOO_SHORT,
            "Password must be at least 8 characters long",
        ));
    }
    if password.len() > 128 {
        return Err(invalid(PASSWORD_TOO_LONG, "Password is too long"));
    }

    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password.chars().any(|c| !c.is_ascii_alphanumeric());
    let strength = [has_lower, has_upper, has_digit, has_symbol]
        .iter()
        .filter(|&&b| b)
        .count();

    if strength < 2 {
        return Err(invalid(
            PASSWORD_WEAK,
            "Password must contain at least 2 of: uppercase, lowercase, numbers, or special characters",
        ));
    }

    Ok(())
}

/// Validates a full name and returns its trimmed form.
pub fn validate_name(name: &str) -> Result<String, AppError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(invalid(NAME_REQUIRED, "Please enter your full name"));
    }
    if trimmed.chars().count() < 2 {
        return Err(invalid(
            NAME_TOO_SHORT,
            "Name must be at least 2 characters long",
        ));
    }
    if trimmed.chars().count() > 100 {
        return Err(invalid(NAME_TOO_LONG, "Name is too long"));
    }

    let allowed = |c: char| c.is_ascii_alphabetic() || matches!(c, ' ' | '-' | '\'' | '.');
    if !trimmed.chars().all(allowed) {
        return Err(invalid(
            NAME_INVALID,
            "Name can only contain letters, spaces, hyphens, and periods",
        ));
    }

    Ok(trimmed.to_string())
}

/// Resolves the requested tier. Unknown tiers are rejected here and never
/// reach the allocator.
pub fn validate_tier(tier: Option<&str>) -> Result<Tier, AppError> {
    let raw = tier
        .filter(|t| !t.is_empty())
        .ok_or_else(|| invalid(TIER_REQUIRED, "Please select a tier"))?;
    raw.parse::<Tier>()
        .map_err(|_| invalid(TIER_INVALID, "Invalid tier selected"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(err: AppError) -> &'static str {
        match err {
            AppError::Validation { code, .. } => code,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_email_valid() {
        assert_eq!(validate_email("user@example.com").unwrap(), "user@example.com");
    }

    #[test]
    fn test_email_normalized_lowercase_trimmed() {
        assert_eq!(
            validate_email("  User@Example.COM  ").unwrap(),
            "user@example.com"
        );
    }

    #[test]
    fn test_email_required() {
        assert_eq!(code(validate_email("").unwrap_err()), EMAIL_REQUIRED);
        assert_eq!(code(validate_email("   ").unwrap_err()), EMAIL_REQUIRED);
    }

    #[test]
    fn test_email_missing_at() {
        assert_eq!(code(validate_email("userexample.com").unwrap_err()), EMAIL_INVALID);
    }

    #[test]
    fn test_email_missing_tld() {
        assert_eq!(code(validate_email("user@example").unwrap_err()), EMAIL_INVALID);
    }

    #[test]
    fn test_email_empty_local_part() {
        assert_eq!(code(validate_email("@example.com").unwrap_err()), EMAIL_INVALID);
    }

    #[test]
    fn test_email_inner_whitespace() {
        assert_eq!(code(validate_email("us er@example.com").unwrap_err()), EMAIL_INVALID);
    }

    #[test]
    fn test_email_trailing_dot_domain() {
        assert_eq!(code(validate_email("user@example.").unwrap_err()), EMAIL_INVALID);
    }

    #[test]
    fn test_password_required() {
        assert_eq!(code(validate_password("").unwrap_err()), PASSWORD_REQUIRED);
    }

    #[test]
    fn test_password_too_short() {
        assert_eq!(code(validate_password("Ab1!x").unwrap_err()), PASSWORD_TOO_SHORT);
    }

    #[test]
    fn test_password_too_long() {
        let long = "Aa1!".repeat(40);
        assert_eq!(code(validate_password(&long).unwrap_err()), PASSWORD_TOO_LONG);
    }

    #[test]
    fn test_password_single_class_rejected() {
        assert_eq!(code(validate_password("abcdefgh").unwrap_err()), PASSWORD_WEAK);
        assert_eq!(code(validate_password("12345678").unwrap_err()), PASSWORD_WEAK);
    }

    #[test]
    fn test_password_two_classes_pass() {
        assert!(validate_password("abcdefg1").is_ok());
        assert!(validate_password("ABCdefgh").is_ok());
        assert!(validate_password("abcdefg!").is_ok());
    }

    #[test]
    fn test_password_all_classes_pass() {
        assert!(validate_password("Str0ng!Pass").is_ok());
    }

    #[test]
    fn test_name_valid() {
        assert_eq!(validate_name("Alice Johnson").unwrap(), "Alice Johnson");
    }

    #[test]
    fn test_name_trimmed() {
        assert_eq!(validate_name("  Bob Smith  ").unwrap(), "Bob Smith");
    }

    #[test]
    fn test_name_allows_hyphen_apostrophe_period() {
        assert!(validate_name("Mary-Jane O'Neil Jr.").is_ok());
    }

    #[test]
    fn test_name_required() {
        assert_eq!(code(validate_name("").unwrap_err()), NAME_REQUIRED);
        assert_eq!(code(validate_name("   ").unwrap_err()), NAME_REQUIRED);
    }

    #[test]
    fn test_name_too_short() {
        assert_eq!(code(validate_name("A").unwrap_err()), NAME_TOO_SHORT);
    }

    #[test]
    fn test_name_too_long() {
        let long = "a".repeat(101);
        assert_eq!(code(validate_name(&long).unwrap_err()), NAME_TOO_LONG);
    }

    #[test]
    fn test_name_rejects_digits_and_symbols() {
        assert_eq!(code(validate_name("Alice2").unwrap_err()), NAME_INVALID);
        assert_eq!(code(validate_name("Bob<script>").unwrap_err()), NAME_INVALID);
    }

    #[test]
    fn test_tier_valid() {
        assert_eq!(validate_tier(Some("EARLY_BIRD")).unwrap(), Tier::EarlyBird);
        assert_eq!(validate_tier(Some("regular")).unwrap(), Tier::Regular);
    }

    #[test]
    fn test_tier_required() {
        assert_eq!(code(validate_tier(None).unwrap_err()), TIER_REQUIRED);
        assert_eq!(code(validate_tier(Some("")).unwrap_err()), TIER_REQUIRED);
    }

    #[test]
    fn test_tier_unknown_rejected() {
        assert_eq!(code(validate_tier(Some("PLATINUM")).unwrap_err()), TIER_INVALID);
    }
}
