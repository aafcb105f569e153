use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hkdf::Hkdf;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::ApiError;

const PASSWORD_SCHEME: &str = "hkdf-sha256";
const PASSWORD_SALT_LEN: usize = 16;
const PASSWORD_DIGEST_LEN: usize = 32;
const PASSWORD_INFO: &[u8] = b"inkpad password digest";

/// Produce a `hkdf-sha256$<salt>$<digest>` credential string with a fresh
/// random salt.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let mut salt = [0u8; PASSWORD_SALT_LEN];
    getrandom::getrandom(&mut salt)
        .map_err(|error| ApiError::BadRequest(format!("Random generation failed: {error}")))?;
    let digest = derive_digest(password, &salt);
    Ok(format!(
        "{PASSWORD_SCHEME}${}${}",
        URL_SAFE_NO_PAD.encode(salt),
        URL_SAFE_NO_PAD.encode(digest)
    ))
}

/// Re-derive with the stored salt and compare. Malformed or foreign-scheme
/// strings simply fail verification.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    if parts.next() != Some(PASSWORD_SCHEME) {
        return false;
    }
    let (Some(salt), Some(digest), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    let Ok(salt) = URL_SAFE_NO_PAD.decode(salt) else {
        return false;
    };
    let Ok(expected) = URL_SAFE_NO_PAD.decode(digest) else {
        return false;
    };
    derive_digest(password, &salt)[..] == expected[..]
}

fn derive_digest(password: &str, salt: &[u8]) -> [u8; PASSWORD_DIGEST_LEN] {
    let hk = Hkdf::<Sha256>::new(Some(salt), password.as_bytes());
    let mut okm = [0u8; PASSWORD_DIGEST_LEN];
    // Expanding 32 bytes from SHA-256 output cannot fail.
    hk.expand(PASSWORD_INFO, &mut okm)
        .unwrap_or_else(|_| unreachable!("HKDF-SHA256 expand of 32 bytes"));
    okm
}

/// Random code verifier for PKCE: 32 bytes as base64url, 43 characters.
pub fn generate_code_verifier() -> Result<String, ApiError> {
    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes)
        .map_err(|error| ApiError::Federated(format!("Random generation failed: {error}")))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// S256 challenge: `base64url(SHA-256(verifier))`.
pub fn compute_code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Random state parameter: 16 bytes as base64url, 22 characters.
pub fn generate_state() -> Result<String, ApiError> {
    let mut bytes = [0u8; 16];
    getrandom::getrandom(&mut bytes)
        .map_err(|error| ApiError::Federated(format!("Random generation failed: {error}")))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Endpoints of the configured federated identity provider. The flow is a
/// standard authorization code exchange with PKCE, run inside a popup.
#[derive(Clone, Debug)]
pub struct FederatedConfig {
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_url: String,
}

/// Verifier stashed between the redirect and the callback, keyed by state.
pub struct PendingLogin {
    pub verifier: String,
}

pub fn authorize_redirect(
    config: &FederatedConfig,
    state: &str,
    challenge: &str,
) -> Result<String, ApiError> {
    let url = Url::parse_with_params(
        &config.authorize_url,
        &[
            ("response_type", "code"),
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.redirect_url.as_str()),
            ("scope", "openid email"),
            ("state", state),
            ("code_challenge", challenge),
            ("code_challenge_method", "S256"),
        ],
    )
    .map_err(|error| ApiError::Federated(format!("Invalid authorize URL: {error}")))?;
    Ok(url.into())
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserinfoResponse {
    email: String,
}

/// Exchange the authorization code for an access token, then ask the
/// userinfo endpoint for the account email.
pub async fn fetch_federated_email(
    http: &reqwest::Client,
    config: &FederatedConfig,
    code: &str,
    verifier: &str,
) -> Result<String, ApiError> {
    let mut form = vec![
        ("grant_type", "authorization_code".to_string()),
        ("code", code.to_string()),
        ("redirect_uri", config.redirect_url.clone()),
        ("client_id", config.client_id.clone()),
        ("code_verifier", verifier.to_string()),
    ];
    if let Some(secret) = &config.client_secret {
        form.push(("client_secret", secret.clone()));
    }

    let response = http
        .post(&config.token_url)
        .form(&form)
        .send()
        .await
        .map_err(|error| ApiError::Federated(format!("Token request failed: {error}")))?;
    if !response.status().is_success() {
        return Err(ApiError::Federated(format!(
            "Token endpoint returned {}",
            response.status()
        )));
    }
    let token: TokenResponse = response
        .json()
        .await
        .map_err(|error| ApiError::Federated(format!("Invalid token response: {error}")))?;

    let response = http
        .get(&config.userinfo_url)
        .bearer_auth(&token.access_token)
        .send()
        .await
        .map_err(|error| ApiError::Federated(format!("Userinfo request failed: {error}")))?;
    if !response.status().is_success() {
        return Err(ApiError::Federated(format!(
            "Userinfo endpoint returned {}",
            response.status()
        )));
    }
    let userinfo: UserinfoResponse = response
        .json()
        .await
        .map_err(|error| ApiError::Federated(format!("Invalid userinfo response: {error}")))?;
    Ok(userinfo.email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_roundtrip() {
        let stored = hash_password("hunter22").unwrap();
        assert!(stored.starts_with("hkdf-sha256$"));
        assert!(verify_password("hunter22", &stored));
        assert!(!verify_password("hunter23", &stored));
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("hunter22").unwrap();
        let b = hash_password("hunter22").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn verify_rejects_malformed_credentials() {
        assert!(!verify_password("hunter22", ""));
        assert!(!verify_password("hunter22", "plain$abc"));
        assert!(!verify_password("hunter22", "hkdf-sha256$not-base64!$x"));
        assert!(!verify_password("hunter22", "hkdf-sha256$YWJj$YWJj$extra"));
    }

    #[test]
    fn code_verifier_is_43_base64url_chars() {
        let verifier = generate_code_verifier().unwrap();
        assert_eq!(verifier.len(), 43);
        assert!(verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn code_challenge_is_deterministic() {
        let a = compute_code_challenge("some-verifier");
        let b = compute_code_challenge("some-verifier");
        assert_eq!(a, b);
        assert_ne!(a, compute_code_challenge("other-verifier"));
    }

    #[test]
    fn state_values_are_unique() {
        assert_ne!(generate_state().unwrap(), generate_state().unwrap());
    }

    #[test]
    fn authorize_redirect_carries_pkce_params() {
        let config = FederatedConfig {
            authorize_url: "https://id.example.com/authorize".into(),
            token_url: "https://id.example.com/token".into(),
            userinfo_url: "https://id.example.com/userinfo".into(),
            client_id: "inkpad".into(),
            client_secret: None,
            redirect_url: "https://draw.example.com/api/auth/callback".into(),
        };
        let url = authorize_redirect(&config, "the-state", "the-challenge").unwrap();
        assert!(url.starts_with("https://id.example.com/authorize?"));
        assert!(url.contains("state=the-state"));
        assert!(url.contains("code_challenge=the-challenge"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fdraw.example.com%2Fapi%2Fauth%2Fcallback"));
    }
}
