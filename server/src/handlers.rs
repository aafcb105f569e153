use axum::extract::{Multipart, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{AppendHeaders, Html, IntoResponse, Redirect};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use inkpad_shared::{
    normalize_email, validate_signup, LoginRequest, SaveCanvasRequest, ShareRequest,
    SharedCanvas, SharedCanvasList, SignupRequest,
};

use crate::auth::{
    authorize_redirect, compute_code_challenge, fetch_federated_email, generate_code_verifier,
    generate_state, hash_password, verify_password, PendingLogin,
};
use crate::documents::UserDocument;
use crate::error::ApiError;
use crate::sessions::{
    authenticate, close_session, expired_session_cookie, open_session, session_cookie, SessionUser,
};
use crate::state::AppState;

/// Page returned to the popup once federated login completed. It pings the
/// opener window and closes itself.
const FEDERATED_DONE_PAGE: &str = "<!doctype html><html><body><script>\
if (window.opener) { window.opener.postMessage('inkpad:login', window.location.origin); }\
window.close();\
</script>Signed in. You can close this window.</body></html>";

pub async fn signup_handler(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&request.email);
    validate_signup(&email, &request.password, &request.confirm_password)?;
    if !state.documents.find_by_email(&email).await?.is_empty() {
        return Err(ApiError::EmailTaken);
    }

    let uid = Uuid::new_v4().to_string();
    let password = hash_password(&request.password)?;
    let document = UserDocument::new(uid.clone(), email.clone(), Some(password));
    state.documents.store_user(&document).await?;
    tracing::info!(%uid, %email, "user registered");

    let token = open_session(&state.sessions, SessionUser { uid, email }).await;
    Ok((
        AppendHeaders([(header::SET_COOKIE, session_cookie(&token))]),
        Json(document.profile()),
    ))
}

pub async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&request.email);
    for uid in state.documents.find_by_email(&email).await? {
        let document = state.documents.load_user(&uid).await?;
        let verified = document
            .password
            .as_deref()
            .is_some_and(|stored| verify_password(&request.password, stored));
        if verified {
            tracing::info!(%uid, %email, "user logged in");
            let token = open_session(
                &state.sessions,
                SessionUser {
                    uid,
                    email: document.email.clone(),
                },
            )
            .await;
            return Ok((
                AppendHeaders([(header::SET_COOKIE, session_cookie(&token))]),
                Json(document.profile()),
            ));
        }
    }
    Err(ApiError::InvalidCredentials)
}

pub async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    close_session(&state.sessions, &headers).await;
    (
        AppendHeaders([(header::SET_COOKIE, expired_session_cookie())]),
        StatusCode::NO_CONTENT,
    )
}

pub async fn me_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let session = authenticate(&state.sessions, &headers).await?;
    let document = state.documents.load_user(&session.uid).await?;
    Ok(Json(document.profile()))
}

/// Autosave target: blind overwrite of the caller's canvas field on every
/// mutation event. No sequencing, the last write wins.
pub async fn save_canvas_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SaveCanvasRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = authenticate(&state.sessions, &headers).await?;
    let mut document = state.documents.load_user(&session.uid).await?;
    document.canvas = Some(request.canvas);
    state.documents.store_user(&document).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn upload_image_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let session = authenticate(&state.sessions, &headers).await?;
    let field = multipart
        .next_field()
        .await
        .map_err(|error| ApiError::BadRequest(format!("Invalid upload: {error}")))?
        .ok_or_else(|| ApiError::BadRequest("Missing file field".into()))?;
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = field
        .bytes()
        .await
        .map_err(|error| ApiError::BadRequest(format!("Invalid upload: {error}")))?;

    let image_id = Uuid::new_v4().simple().to_string();
    let url = state
        .blobs
        .put_image(&session.uid, &image_id, &content_type, bytes.to_vec())
        .await
        .map_err(|error| ApiError::Upload(error.to_string()))?;
    tracing::info!(uid = %session.uid, %image_id, "image uploaded");
    Ok(Json(inkpad_shared::UploadResponse { url }))
}

/// Share the posted snapshot with another registered user: look the
/// recipient up by email and append to their records. Succeeds only when the
/// lookup matches exactly one profile; nothing prevents sharing the same
/// snapshot twice.
pub async fn share_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ShareRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = authenticate(&state.sessions, &headers).await?;
    let email = normalize_email(&request.email);
    let matches = state.documents.find_by_email(&email).await?;
    let [recipient_uid] = matches.as_slice() else {
        return Err(ApiError::RecipientNotFound(email));
    };

    let mut recipient = state.documents.load_user(recipient_uid).await?;
    recipient.shared.push(SharedCanvas {
        user: session.email.clone(),
        canvas: request.canvas,
    });
    state.documents.store_user(&recipient).await?;
    tracing::info!(from = %session.email, to = %email, "canvas shared");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn shared_list_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let session = authenticate(&state.sessions, &headers).await?;
    let document = state.documents.load_user(&session.uid).await?;
    Ok(Json(SharedCanvasList {
        canvases: document.shared,
    }))
}

pub async fn federated_start_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let config = state.federated.clone().ok_or(ApiError::FederatedDisabled)?;
    let login_state = generate_state()?;
    let verifier = generate_code_verifier()?;
    let challenge = compute_code_challenge(&verifier);
    let url = authorize_redirect(&config, &login_state, &challenge)?;
    state
        .pending_logins
        .write()
        .await
        .insert(login_state, PendingLogin { verifier });
    Ok(Redirect::to(&url))
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub state: String,
}

pub async fn federated_callback_handler(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let config = state.federated.clone().ok_or(ApiError::FederatedDisabled)?;
    let pending = state
        .pending_logins
        .write()
        .await
        .remove(&query.state)
        .ok_or_else(|| ApiError::Federated("Unknown or expired login state".into()))?;

    let email = fetch_federated_email(&state.http, &config, &query.code, &pending.verifier).await?;
    let email = normalize_email(&email);

    let matches = state.documents.find_by_email(&email).await?;
    let document = match matches.first() {
        Some(uid) => state.documents.load_user(uid).await?,
        None => {
            let uid = Uuid::new_v4().to_string();
            let document = UserDocument::new(uid, email.clone(), None);
            state.documents.store_user(&document).await?;
            tracing::info!(uid = %document.uid, %email, "federated user registered");
            document
        }
    };

    let token = open_session(
        &state.sessions,
        SessionUser {
            uid: document.uid.clone(),
            email: document.email.clone(),
        },
    )
    .await;
    Ok((
        AppendHeaders([(header::SET_COOKIE, session_cookie(&token))]),
        Html(FEDERATED_DONE_PAGE),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blobs::FileBlobStore;
    use crate::documents::FileDocumentStore;
    use std::sync::Arc;

    fn file_backed_state(dir: &std::path::Path) -> AppState {
        AppState::new(
            Arc::new(FileDocumentStore::new(dir.join("users"))),
            Arc::new(FileBlobStore::new(dir.join("uploads"))),
            None,
        )
    }

    async fn signed_up(state: &AppState, email: &str) -> (String, HeaderMap) {
        let document = UserDocument::new(
            Uuid::new_v4().to_string(),
            email.to_string(),
            Some(hash_password("hunter22").unwrap()),
        );
        state.documents.store_user(&document).await.unwrap();
        let token = open_session(
            &state.sessions,
            SessionUser {
                uid: document.uid.clone(),
                email: email.to_string(),
            },
        )
        .await;
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            format!("inkpad_session={token}").parse().unwrap(),
        );
        (document.uid, headers)
    }

    #[tokio::test]
    async fn save_canvas_overwrites_previous_payload() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("users"))
            .await
            .unwrap();
        let state = file_backed_state(dir.path());
        let (uid, headers) = signed_up(&state, "ada@example.com").await;

        for payload in ["<svg>a</svg>", "<svg>b</svg>"] {
            save_canvas_handler(
                State(state.clone()),
                headers.clone(),
                Json(SaveCanvasRequest {
                    canvas: payload.into(),
                }),
            )
            .await
            .unwrap();
        }

        let document = state.documents.load_user(&uid).await.unwrap();
        assert_eq!(document.canvas.as_deref(), Some("<svg>b</svg>"));
    }

    #[tokio::test]
    async fn share_appends_to_recipient_records() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("users"))
            .await
            .unwrap();
        let state = file_backed_state(dir.path());
        let (_, sender_headers) = signed_up(&state, "ada@example.com").await;
        let (recipient_uid, _) = signed_up(&state, "grace@example.com").await;

        share_handler(
            State(state.clone()),
            sender_headers.clone(),
            Json(ShareRequest {
                email: "Grace@Example.com".into(),
                canvas: "<svg>snapshot</svg>".into(),
            }),
        )
        .await
        .unwrap();

        let recipient = state.documents.load_user(&recipient_uid).await.unwrap();
        assert_eq!(recipient.shared.len(), 1);
        assert_eq!(recipient.shared[0].user, "ada@example.com");
    }

    #[tokio::test]
    async fn share_to_unknown_email_fails() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("users"))
            .await
            .unwrap();
        let state = file_backed_state(dir.path());
        let (_, headers) = signed_up(&state, "ada@example.com").await;

        let result = share_handler(
            State(state.clone()),
            headers,
            Json(ShareRequest {
                email: "nobody@example.com".into(),
                canvas: "<svg/>".into(),
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::RecipientNotFound(_))));
    }

    #[tokio::test]
    async fn requests_without_session_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("users"))
            .await
            .unwrap();
        let state = file_backed_state(dir.path());

        let result = save_canvas_handler(
            State(state),
            HeaderMap::new(),
            Json(SaveCanvasRequest {
                canvas: "<svg/>".into(),
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }
}
