// User accounts: request validation plus the CRUD handlers.

pub mod handlers;

use serde::Deserialize;

use crate::errors::AppError;
use crate::models::user::{NewUser, SubscriptionTier, UserChanges, UserRole};

const MAX_USERNAME_LEN: usize = 80;
const MAX_EMAIL_LEN: usize = 120;

/// Body of POST /api/users and PUT /api/users/:id.
/// Every field is optional on the wire so missing fields surface as
/// validation errors rather than extractor rejections.
#[derive(Debug, Default, Deserialize)]
pub struct UserPayload {
    pub username: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Option<String>,
    pub subscription: Option<String>,
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).map(str::to_string)
}

fn validate_username(username: &str) -> Result<(), AppError> {
    if username.is_empty() {
        return Err(AppError::Validation("username cannot be empty".to_string()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::Validation(format!(
            "username must be at most {MAX_USERNAME_LEN} characters"
        )));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(AppError::Validation(
            "username cannot contain whitespace".to_string(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AppError> {
    if email.is_empty() {
        return Err(AppError::Validation("email cannot be empty".to_string()));
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err(AppError::Validation(format!(
            "email must be at most {MAX_EMAIL_LEN} characters"
        )));
    }
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(AppError::Validation(format!("'{email}' is not a valid email")));
    }
    Ok(())
}

fn parse_role(value: &str) -> Result<UserRole, AppError> {
    UserRole::parse(value).ok_or_else(|| {
        AppError::Validation(format!(
            "role must be one of user, moderator, admin (got '{value}')"
        ))
    })
}

fn parse_subscription(value: &str) -> Result<SubscriptionTier, AppError> {
    SubscriptionTier::parse(value).ok_or_else(|| {
        AppError::Validation(format!(
            "subscription must be one of free, pro, enterprise (got '{value}')"
        ))
    })
}

impl UserPayload {
    /// Validates a signup. `username` and `email` are required.
    pub fn into_new_user(self) -> Result<NewUser, AppError> {
        let username = trimmed(&self.username)
            .ok_or_else(|| AppError::Validation("username is required".to_string()))?;
        let email = trimmed(&self.email)
            .ok_or_else(|| AppError::Validation("email is required".to_string()))?;
        validate_username(&username)?;
        validate_email(&email)?;

        Ok(NewUser {
            username,
            email: email.to_lowercase(),
            display_name: trimmed(&self.display_name),
            bio: self.bio,
            avatar_url: trimmed(&self.avatar_url),
            role: self.role.as_deref().map(parse_role).transpose()?.unwrap_or_default(),
            subscription: self
                .subscription
                .as_deref()
                .map(parse_subscription)
                .transpose()?
                .unwrap_or_default(),
        })
    }

    /// Validates a partial update. Absent fields are left unchanged.
    pub fn into_changes(self) -> Result<UserChanges, AppError> {
        let username = trimmed(&self.username);
        if let Some(username) = &username {
            validate_username(username)?;
        }
        let email = trimmed(&self.email);
        if let Some(email) = &email {
            validate_email(email)?;
        }

        Ok(UserChanges {
            username,
            email: email.map(|e| e.to_lowercase()),
            display_name: trimmed(&self.display_name),
            bio: self.bio,
            avatar_url: trimmed(&self.avatar_url),
            role: self.role.as_deref().map(parse_role).transpose()?,
            subscription: self
                .subscription
                .as_deref()
                .map(parse_subscription)
                .transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(username: Option<&str>, email: Option<&str>) -> UserPayload {
        UserPayload {
            username: username.map(str::to_string),
            email: email.map(str::to_string),
            ..UserPayload::default()
        }
    }

    #[test]
    fn test_new_user_defaults_role_and_tier() {
        let user = payload(Some(" alice "), Some("A@X.com")).into_new_user().unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.role, UserRole::User);
        assert_eq!(user.subscription, SubscriptionTier::Free);
    }

    #[test]
    fn test_new_user_requires_username_and_email() {
        assert!(matches!(
            payload(None, Some("a@x.com")).into_new_user(),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            payload(Some("alice"), None).into_new_user(),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            payload(Some("   "), Some("a@x.com")).into_new_user(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_rejects_malformed_emails() {
        for email in ["plain", "@x.com", "a@", "a@nodot", "a@x.com@y.com", "a b@x.com", "a@.com"] {
            assert!(
                validate_email(email).is_err(),
                "{email} should have been rejected"
            );
        }
        assert!(validate_email("first.last@sub.example.org").is_ok());
    }

    #[test]
    fn test_rejects_unknown_role() {
        let mut p = payload(Some("alice"), Some("a@x.com"));
        p.role = Some("superuser".to_string());
        assert!(matches!(p.into_new_user(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_changes_leave_absent_fields_untouched() {
        let changes = UserPayload {
            bio: Some("hi".to_string()),
            subscription: Some("PRO".to_string()),
            ..UserPayload::default()
        }
        .into_changes()
        .unwrap();
        assert!(changes.username.is_none());
        assert!(changes.email.is_none());
        assert_eq!(changes.bio.as_deref(), Some("hi"));
        assert_eq!(changes.subscription, Some(SubscriptionTier::Pro));
    }
}
