use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{header, HeaderMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::ApiError;

pub const SESSION_COOKIE: &str = "inkpad_session";

/// Who a session token belongs to.
#[derive(Clone, Debug)]
pub struct SessionUser {
    pub uid: String,
    pub email: String,
}

/// In-memory token registry. Sessions do not survive a restart.
pub type SessionMap = Arc<RwLock<HashMap<String, SessionUser>>>;

pub fn new_session_token() -> String {
    Uuid::new_v4().to_string()
}

pub fn session_cookie(token: &str) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax")
}

pub fn expired_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    for value in headers.get_all(header::COOKIE) {
        let Ok(value) = value.to_str() else { continue };
        for pair in value.split(';') {
            let Some((name, token)) = pair.split_once('=') else {
                continue;
            };
            if name.trim() == SESSION_COOKIE && !token.trim().is_empty() {
                return Some(token.trim().to_string());
            }
        }
    }
    None
}

pub async fn authenticate(
    sessions: &SessionMap,
    headers: &HeaderMap,
) -> Result<SessionUser, ApiError> {
    let token = token_from_headers(headers).ok_or(ApiError::Unauthorized)?;
    sessions
        .read()
        .await
        .get(&token)
        .cloned()
        .ok_or(ApiError::Unauthorized)
}

pub async fn open_session(sessions: &SessionMap, user: SessionUser) -> String {
    let token = new_session_token();
    sessions.write().await.insert(token.clone(), user);
    token
}

pub async fn close_session(sessions: &SessionMap, headers: &HeaderMap) {
    if let Some(token) = token_from_headers(headers) {
        sessions.write().await.remove(&token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn token_is_found_among_other_cookies() {
        let headers = headers_with_cookie("theme=dark; inkpad_session=abc-123; lang=en");
        assert_eq!(token_from_headers(&headers), Some("abc-123".to_string()));
    }

    #[test]
    fn missing_or_empty_cookie_yields_none() {
        assert_eq!(token_from_headers(&HeaderMap::new()), None);
        let headers = headers_with_cookie("inkpad_session=");
        assert_eq!(token_from_headers(&headers), None);
    }

    #[tokio::test]
    async fn open_then_authenticate_then_close() {
        let sessions: SessionMap = Arc::new(RwLock::new(HashMap::new()));
        let token = open_session(
            &sessions,
            SessionUser {
                uid: "user-1".into(),
                email: "ada@example.com".into(),
            },
        )
        .await;

        let headers = headers_with_cookie(&format!("inkpad_session={token}"));
        let user = authenticate(&sessions, &headers).await.unwrap();
        assert_eq!(user.uid, "user-1");

        close_session(&sessions, &headers).await;
        assert!(matches!(
            authenticate(&sessions, &headers).await,
            Err(ApiError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn unknown_token_is_unauthorized() {
        let sessions: SessionMap = Arc::new(RwLock::new(HashMap::new()));
        let headers = headers_with_cookie("inkpad_session=not-a-session");
        assert!(matches!(
            authenticate(&sessions, &headers).await,
            Err(ApiError::Unauthorized)
        ));
    }
}
