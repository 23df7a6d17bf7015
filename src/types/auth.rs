//! Wire shapes for the `/api/auth/*` endpoints.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::Result;
use crate::types::{User, UserRole};
use crate::validation::check;

/// Body of `POST /api/auth/login`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(
        custom(function = "crate::validation::not_blank", message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,
    #[validate(
        custom(function = "crate::validation::present", message = "Password is required"),
        length(min = 6, message = "Password must be at least 6 characters")
    )]
    pub password: String,
    pub user_type: UserRole,
}

impl LoginRequest {
    pub fn new(email: &str, password: &str, user_type: UserRole) -> Self {
        Self {
            email: email.trim().to_string(),
            password: password.to_string(),
            user_type,
        }
    }

    /// Checks the email and then the password.
    pub fn validate_fields(&self) -> Result<()> {
        check(self, &["email", "password"])
    }
}

/// Token pair plus profile returned by login and registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    pub user: User,
}

/// Body of `POST /api/auth/refresh`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// A freshly minted access token; the refresh token may or may not rotate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_request_wire_format() {
        let req = LoginRequest {
            email: "a@b.com".to_string(),
            password: "secret1".to_string(),
            user_type: UserRole::Donor,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"email": "a@b.com", "password": "secret1", "user_type": "donor"})
        );
    }

    #[test]
    fn refresh_response_without_rotation() {
        let resp: RefreshResponse = serde_json::from_str(r#"{"access_token":"T2"}"#).unwrap();
        assert_eq!(resp.access_token, "T2");
        assert!(resp.refresh_token.is_none());
    }

    #[test]
    fn auth_response_with_user() {
        let resp: AuthResponse = serde_json::from_str(
            r#"{
                "access_token": "T1",
                "refresh_token": "R1",
                "token_type": "bearer",
                "user": {"id": 1, "email": "a@b.com", "name": "A", "userType": "donor", "bloodGroup": "A+"}
            }"#,
        )
        .unwrap();
        assert_eq!(resp.access_token, "T1");
        assert_eq!(resp.refresh_token.as_deref(), Some("R1"));
        assert_eq!(resp.user.email, "a@b.com");
    }
}
