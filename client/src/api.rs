//! Thin fetch wrappers over the server API. Every helper resolves to the
//! response body or the server's error message, ready for an alert.

use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{File, FormData, Request, RequestCredentials, RequestInit, Response, Window};

use inkpad_shared::{
    ApiFailure, LoginRequest, SaveCanvasRequest, ShareRequest, SharedCanvas, SharedCanvasList,
    SignupRequest, UploadResponse, UserProfile,
};

fn describe(error: JsValue) -> String {
    error
        .as_string()
        .unwrap_or_else(|| format!("{error:?}"))
}

fn failure_message(status: u16, body: &str) -> String {
    serde_json::from_str::<ApiFailure>(body)
        .map(|failure| failure.error)
        .unwrap_or_else(|_| format!("Request failed with status {status}"))
}

async fn send(window: &Window, request: Request) -> Result<(u16, String), String> {
    let response = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(describe)?;
    let response: Response = response
        .dyn_into()
        .map_err(|_| "Unexpected fetch result".to_string())?;
    let status = response.status();
    let text = JsFuture::from(response.text().map_err(describe)?)
        .await
        .map_err(describe)?;
    Ok((status, text.as_string().unwrap_or_default()))
}

fn json_request(method: &str, path: &str, body: Option<&str>) -> Result<Request, String> {
    let init = RequestInit::new();
    init.set_method(method);
    init.set_credentials(RequestCredentials::SameOrigin);
    if let Some(body) = body {
        init.set_body(&JsValue::from_str(body));
    }
    let request = Request::new_with_str_and_init(path, &init).map_err(describe)?;
    if body.is_some() {
        request
            .headers()
            .set("content-type", "application/json")
            .map_err(describe)?;
    }
    Ok(request)
}

async fn call(
    window: &Window,
    method: &str,
    path: &str,
    body: Option<String>,
) -> Result<String, String> {
    let request = json_request(method, path, body.as_deref())?;
    let (status, text) = send(window, request).await?;
    if (200..300).contains(&status) {
        Ok(text)
    } else {
        Err(failure_message(status, &text))
    }
}

fn encode<T: serde::Serialize>(body: &T) -> Result<String, String> {
    serde_json::to_string(body).map_err(|error| error.to_string())
}

fn decode<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, String> {
    serde_json::from_str(body).map_err(|error| format!("Invalid server response: {error}"))
}

/// `None` when the session cookie is missing or stale.
pub async fn fetch_profile(window: &Window) -> Result<Option<UserProfile>, String> {
    let request = json_request("GET", "/api/me", None)?;
    let (status, text) = send(window, request).await?;
    match status {
        200 => decode(&text).map(Some),
        401 => Ok(None),
        _ => Err(failure_message(status, &text)),
    }
}

pub async fn signup(window: &Window, request: &SignupRequest) -> Result<UserProfile, String> {
    let body = call(window, "POST", "/api/signup", Some(encode(request)?)).await?;
    decode(&body)
}

pub async fn login(window: &Window, request: &LoginRequest) -> Result<UserProfile, String> {
    let body = call(window, "POST", "/api/login", Some(encode(request)?)).await?;
    decode(&body)
}

pub async fn logout(window: &Window) -> Result<(), String> {
    call(window, "POST", "/api/logout", None).await.map(|_| ())
}

pub async fn save_canvas(window: &Window, canvas: String) -> Result<(), String> {
    let body = encode(&SaveCanvasRequest { canvas })?;
    call(window, "PUT", "/api/canvas", Some(body)).await.map(|_| ())
}

pub async fn share_canvas(window: &Window, email: String, canvas: String) -> Result<(), String> {
    let body = encode(&ShareRequest { email, canvas })?;
    call(window, "POST", "/api/share", Some(body)).await.map(|_| ())
}

pub async fn fetch_shared(window: &Window) -> Result<Vec<SharedCanvas>, String> {
    let body = call(window, "GET", "/api/shared", None).await?;
    decode::<SharedCanvasList>(&body).map(|list| list.canvases)
}

pub async fn upload_image(window: &Window, file: &File) -> Result<String, String> {
    let form = FormData::new().map_err(describe)?;
    form.append_with_blob("file", file).map_err(describe)?;

    let init = RequestInit::new();
    init.set_method("POST");
    init.set_credentials(RequestCredentials::SameOrigin);
    init.set_body(form.as_ref());
    let request = Request::new_with_str_and_init("/api/images", &init).map_err(describe)?;

    let (status, text) = send(window, request).await?;
    if (200..300).contains(&status) {
        decode::<UploadResponse>(&text).map(|response| response.url)
    } else {
        Err(failure_message(status, &text))
    }
}

/// Open the federated login popup; the server redirects it to the provider
/// and the callback page messages the opener when done.
pub fn open_federated_popup(window: &Window) -> Result<(), String> {
    window
        .open_with_url_and_target_and_features(
            "/api/auth/federated",
            "inkpad-login",
            "popup,width=480,height=640",
        )
        .map_err(describe)?
        .ok_or_else(|| "Popup blocked".to_string())?;
    Ok(())
}
