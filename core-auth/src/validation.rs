//! Local schema validation for authentication forms.
//!
//! Every form is checked here before any request leaves the controller.
//! Forms derive `Validate` from the custom rule functions below, and
//! failures become a field-scoped [`AuthError::Validation`] that names the
//! first failing field in form order.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{AuthError, Result};

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
    )
    .expect("EMAIL_REGEX should be a valid regex pattern")
});

pub const OTP_CODE_LENGTH: usize = 6;

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub const MAX_NAME_LENGTH: usize = 100;

/// Characters that satisfy the special-character rule.
pub const PASSWORD_SPECIAL_CHARS: &str = r#"!@#$%^&*(),.?":{}|<>"#;

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

pub fn validate_email(email: &str) -> std::result::Result<(), ValidationError> {
    if email.trim().is_empty() {
        return Err(rule("email_required", "Email is required"));
    }
    if EMAIL_REGEX.is_match(email.trim()) {
        Ok(())
    } else {
        Err(rule("invalid_email", "Please enter a valid email address"))
    }
}

/// Exactly six ASCII digits.
pub fn validate_otp_code(code: &str) -> std::result::Result<(), ValidationError> {
    if code.len() == OTP_CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(rule("invalid_code", "Enter the 6-digit code from your email"))
    }
}

/// Length and all four character classes must pass.
pub fn validate_password_strength(password: &str) -> std::result::Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(rule(
            "password_too_short",
            "Password must be at least 8 characters",
        ));
    }

    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(rule(
            "password_missing_lowercase",
            "Password must contain a lowercase letter",
        ));
    }

    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(rule(
            "password_missing_uppercase",
            "Password must contain an uppercase letter",
        ));
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(rule("password_missing_digit", "Password must contain a number"));
    }

    if !password.chars().any(|c| PASSWORD_SPECIAL_CHARS.contains(c)) {
        return Err(rule(
            "password_missing_special",
            "Password must contain a special character (!@#$%^&*(),.?\":{}|<>)",
        ));
    }

    Ok(())
}

pub fn validate_name(name: &str) -> std::result::Result<(), ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(rule("name_required", "Name is required"));
    }

    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(rule("name_too_long", "Name must be at most 100 characters"));
    }

    Ok(())
}

// ============================================================================
// Forms
// ============================================================================

#[derive(Debug, Clone, Copy, Validate)]
pub struct EmailForm<'a> {
    #[validate(custom(function = "validate_email"))]
    pub email: &'a str,
}

#[derive(Clone, Copy, Validate)]
pub struct PasswordLoginForm<'a> {
    #[validate(custom(function = "validate_email"))]
    pub email: &'a str,
    #[validate(length(min = 1, code = "required", message = "Password is required"))]
    pub password: &'a str,
}

#[derive(Debug, Clone, Copy, Validate)]
pub struct OtpForm<'a> {
    #[validate(custom(function = "validate_email"))]
    pub email: &'a str,
    #[validate(custom(function = "validate_otp_code"))]
    pub code: &'a str,
}

#[derive(Clone, Copy, Validate)]
pub struct PasswordResetForm<'a> {
    #[validate(custom(function = "validate_email"))]
    pub email: &'a str,
    #[validate(custom(function = "validate_otp_code"))]
    pub code: &'a str,
    #[validate(custom(function = "validate_password_strength"))]
    pub new_password: &'a str,
}

#[derive(Clone, Copy, Validate)]
pub struct EmailChangeForm<'a> {
    #[validate(custom(function = "validate_email"))]
    pub new_email: &'a str,
    #[validate(length(
        min = 1,
        code = "required",
        message = "Current password is required"
    ))]
    pub current_password: &'a str,
}

/// Form fields in display order; the first failing one is reported.
const FIELD_ORDER: &[&str] = &[
    "name",
    "email",
    "new_email",
    "password",
    "current_password",
    "code",
    "new_password",
    "confirm_password",
];

/// Validates `form` and reports the first failing field.
pub fn validate_form<T: Validate>(form: &T) -> Result<()> {
    form.validate().map_err(into_auth_error)
}

fn into_auth_error(errors: ValidationErrors) -> AuthError {
    let fields = errors.field_errors();

    let first = FIELD_ORDER
        .iter()
        .find_map(|name| fields.get(*name).map(|errs| (*name, *errs)))
        .or_else(|| {
            fields
                .iter()
                .next()
                .map(|(name, errs)| (name.as_ref(), *errs))
        });

    match first.and_then(|(field, errs)| errs.first().map(|err| (field, err))) {
        Some((field, err)) => {
            let message = err
                .message
                .as_ref()
                .map_or("Invalid value".to_string(), |m| m.to_string());
            AuthError::validation(field, message)
        }
        None => AuthError::validation("form", "Please check the form and try again"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignupDetails;

    #[test]
    fn test_password_strength_examples() {
        assert!(validate_password_strength("short1!").is_err());
        assert!(validate_password_strength("longenough1").is_err());
        assert!(validate_password_strength("LongEnough1!").is_ok());
    }

    #[test]
    fn test_each_strength_rule() {
        let code = |pw: &str| validate_password_strength(pw).unwrap_err().code.to_string();

        assert_eq!(code("Ab1!"), "password_too_short");
        assert_eq!(code("LONGENOUGH1!"), "password_missing_lowercase");
        assert_eq!(code("longenough1!"), "password_missing_uppercase");
        assert_eq!(code("LongEnough!!"), "password_missing_digit");
        assert_eq!(code("LongEnough12"), "password_missing_special");
        // Only the fixed set counts as special.
        assert_eq!(code("LongEnough1_"), "password_missing_special");
    }

    #[test]
    fn test_otp_code_shape() {
        assert!(validate_otp_code("123456").is_ok());
        assert!(validate_otp_code("12345").is_err());
        assert!(validate_otp_code("1234567").is_err());
        assert!(validate_otp_code("12a456").is_err());
        assert!(validate_otp_code("１２３４５６").is_err());
    }

    #[test]
    fn test_email_shape() {
        assert!(validate_email("a@b.com").is_ok());
        assert!(validate_email("first.last+tag@mail.example.org").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("a@b").is_err());
    }

    #[test]
    fn test_name_rules() {
        assert!(validate_name("Ada Lovelace").is_ok());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(101)).is_err());
        assert!(validate_name(&"x".repeat(100)).is_ok());
    }

    #[test]
    fn test_signup_reports_first_field_in_order() {
        let details = SignupDetails::new("", "bad", "weak", "other");
        match validate_form(&details) {
            Err(AuthError::Validation { field, message }) => {
                assert_eq!(field, "name");
                assert_eq!(message, "Name is required");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_signup_confirmation_mismatch() {
        let details = SignupDetails::new("Ada", "ada@example.com", "LongEnough1!", "LongEnough2!");
        let err = validate_form(&details).unwrap_err();
        assert_eq!(err.field(), Some("confirm_password"));
        assert_eq!(err.user_message(), "Passwords do not match");
    }

    #[test]
    fn test_valid_forms_pass() {
        let details = SignupDetails::new("Ada", "ada@example.com", "LongEnough1!", "LongEnough1!");
        assert!(validate_form(&details).is_ok());
        assert!(validate_form(&OtpForm {
            email: "a@b.com",
            code: "123456"
        })
        .is_ok());
        assert!(validate_form(&PasswordResetForm {
            email: "a@b.com",
            code: "123456",
            new_password: "LongEnough1!",
        })
        .is_ok());
    }

    #[test]
    fn test_password_login_requires_password() {
        let err = validate_form(&PasswordLoginForm {
            email: "a@b.com",
            password: "",
        })
        .unwrap_err();
        assert_eq!(err.field(), Some("password"));
        assert_eq!(err.user_message(), "Password is required");
    }

    #[test]
    fn test_email_is_reported_before_code() {
        let err = validate_form(&OtpForm {
            email: "nope",
            code: "12",
        })
        .unwrap_err();
        assert_eq!(err.field(), Some("email"));
    }

    #[test]
    fn test_email_change_requires_current_password() {
        let err = validate_form(&EmailChangeForm {
            new_email: "new@example.com",
            current_password: "",
        })
        .unwrap_err();
        assert_eq!(err.field(), Some("current_password"));
    }
}
