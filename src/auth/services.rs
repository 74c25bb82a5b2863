use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    auth::{
        dto::{AuthResponse, PublicUser, TokenKind},
        jwt::JwtKeys,
        password::MIN_PASSWORD_LEN,
        repo_types::User,
    },
    error::AppError,
};

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn check_password_strength(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest("Password too short".into()));
    }
    Ok(())
}

/// Signs a fresh access/refresh pair for `user`.
pub(crate) fn issue_tokens(keys: &JwtKeys, user: User) -> anyhow::Result<AuthResponse> {
    let access_token = keys.issue(user.id, TokenKind::Access)?;
    let refresh_token = keys.issue(user.id, TokenKind::Refresh)?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(user),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@b.io"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.io"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(check_password_strength("1234567").is_err());
        assert!(check_password_strength("12345678").is_ok());
    }
}
