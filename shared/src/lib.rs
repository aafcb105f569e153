use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shortest password the registration endpoint accepts.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Per-user profile as it travels over the wire. The `canvas` field holds the
/// serialized drawing surface and is absent until the user first draws; the
/// server never looks inside it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canvas: Option<String>,
}

/// One canvas snapshot shared into a user's inbox: the sender's email plus
/// the payload as it looked at share time. Records are append-only.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SharedCanvas {
    pub user: String,
    pub canvas: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SaveCanvasRequest {
    pub canvas: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ShareRequest {
    pub email: String,
    pub canvas: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UploadResponse {
    pub url: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SharedCanvasList {
    pub canvases: Vec<SharedCanvas>,
}

/// Error body every failing endpoint responds with.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ApiFailure {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignupError {
    #[error("Passwords don't match!")]
    PasswordMismatch,
    #[error("Password should be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,
    #[error("The email address is badly formatted")]
    InvalidEmail,
}

/// Canonical form used for every stored email and every lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Minimal shape check: something before and after a single-enough `@`.
pub fn validate_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

/// Registration-time validation shared by the client form and the server
/// endpoint. The email is expected to be normalized already.
pub fn validate_signup(email: &str, password: &str, confirm: &str) -> Result<(), SignupError> {
    if password != confirm {
        return Err(SignupError::PasswordMismatch);
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(SignupError::WeakPassword);
    }
    if !validate_email(email) {
        return Err(SignupError::InvalidEmail);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn email_shape() {
        assert!(validate_email("ada@example.com"));
        assert!(!validate_email("ada"));
        assert!(!validate_email("@example.com"));
        assert!(!validate_email("ada@com"));
        assert!(!validate_email("ada@.com"));
    }

    #[test]
    fn signup_rejects_mismatched_confirmation() {
        let result = validate_signup("ada@example.com", "hunter22", "hunter23");
        assert_eq!(result, Err(SignupError::PasswordMismatch));
    }

    #[test]
    fn signup_rejects_short_password() {
        let result = validate_signup("ada@example.com", "abc", "abc");
        assert_eq!(result, Err(SignupError::WeakPassword));
    }

    #[test]
    fn signup_accepts_valid_input() {
        assert!(validate_signup("ada@example.com", "hunter22", "hunter22").is_ok());
    }

    #[test]
    fn profile_canvas_field_is_omitted_when_absent() {
        let profile = UserProfile {
            uid: "u1".into(),
            email: "ada@example.com".into(),
            canvas: None,
        };
        let json = serde_json::to_string(&profile).unwrap();
        assert!(!json.contains("canvas"));
    }
}
