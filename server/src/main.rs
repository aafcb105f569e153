use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::http::{header, HeaderValue};
use axum::routing::{get, post, put};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing_subscriber::EnvFilter;

mod auth;
mod blobs;
mod documents;
mod error;
mod handlers;
mod sessions;
mod state;

use crate::auth::FederatedConfig;
use crate::blobs::{BlobStore, FileBlobStore, S3BlobStore};
use crate::documents::{DocumentStore, FileDocumentStore, S3Config, S3DocumentStore};
use crate::handlers::{
    federated_callback_handler, federated_start_handler, login_handler, logout_handler,
    me_handler, save_canvas_handler, share_handler, shared_list_handler, signup_handler,
    upload_image_handler,
};
use crate::state::AppState;

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Directory for user documents (file-backed mode).
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Directory with the built client bundle.
    #[arg(long)]
    public_dir: Option<PathBuf>,
    /// Directory for uploaded images (file-backed mode).
    #[arg(long)]
    upload_dir: Option<PathBuf>,

    /// Store documents and uploads in this S3 bucket instead of local files.
    #[arg(long)]
    s3_bucket: Option<String>,
    #[arg(long)]
    s3_prefix: Option<String>,
    #[arg(long)]
    s3_region: Option<String>,
    #[arg(long)]
    s3_endpoint_url: Option<String>,
    #[arg(long)]
    s3_force_path_style: bool,
    /// Base URL for upload links when the bucket sits behind a CDN or an
    /// S3-compatible endpoint.
    #[arg(long)]
    blob_public_base_url: Option<String>,

    /// Federated login provider endpoints. All four plus the client id must
    /// be present for the popup login button to work; the client secret
    /// comes from INKPAD_FEDERATED_CLIENT_SECRET.
    #[arg(long)]
    federated_authorize_url: Option<String>,
    #[arg(long)]
    federated_token_url: Option<String>,
    #[arg(long)]
    federated_userinfo_url: Option<String>,
    #[arg(long)]
    federated_client_id: Option<String>,
    #[arg(long)]
    federated_redirect_url: Option<String>,

    #[arg(long)]
    tls_cert: Option<PathBuf>,
    #[arg(long)]
    tls_key: Option<PathBuf>,
}

impl Args {
    fn s3_config(&self, bucket: &str) -> S3Config {
        let mut config = S3Config::new(bucket);
        config.prefix = self.s3_prefix.clone();
        config.region = self.s3_region.clone();
        config.endpoint_url = self.s3_endpoint_url.clone();
        config.force_path_style = self.s3_force_path_style;
        config.access_key_id = std::env::var("INKPAD_S3_ACCESS_KEY_ID").ok();
        config.secret_access_key = std::env::var("INKPAD_S3_SECRET_ACCESS_KEY").ok();
        config
    }

    fn federated_config(&self) -> Option<FederatedConfig> {
        Some(FederatedConfig {
            authorize_url: self.federated_authorize_url.clone()?,
            token_url: self.federated_token_url.clone()?,
            userinfo_url: self.federated_userinfo_url.clone()?,
            client_id: self.federated_client_id.clone()?,
            client_secret: std::env::var("INKPAD_FEDERATED_CLIENT_SECRET").ok(),
            redirect_url: self.federated_redirect_url.clone()?,
        })
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../data"));
    let upload_dir = args
        .upload_dir
        .clone()
        .unwrap_or_else(|| data_dir.join("uploads"));
    let public_dir = args
        .public_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../public"));

    let federated = args.federated_config();
    if federated.is_none() {
        tracing::info!("federated login disabled (provider not configured)");
    }

    let mut serve_uploads = None;
    let (documents, blobs): (Arc<dyn DocumentStore>, Arc<dyn BlobStore>) =
        if let Some(bucket) = args.s3_bucket.clone() {
            tracing::info!(%bucket, "using s3-backed storage");
            let documents =
                S3DocumentStore::new(args.s3_config(&bucket)).await;
            let blobs =
                S3BlobStore::new(args.s3_config(&bucket), args.blob_public_base_url.clone()).await;
            (Arc::new(documents), Arc::new(blobs))
        } else {
            let users_dir = data_dir.join("users");
            if let Err(error) = tokio::fs::create_dir_all(&users_dir).await {
                tracing::error!(%error, "failed to create data dir");
            }
            if let Err(error) = tokio::fs::create_dir_all(&upload_dir).await {
                tracing::error!(%error, "failed to create upload dir");
            }
            tracing::info!(data_dir = %data_dir.display(), "using file-backed storage");
            serve_uploads = Some(upload_dir.clone());
            (
                Arc::new(FileDocumentStore::new(users_dir)),
                Arc::new(FileBlobStore::new(upload_dir)),
            )
        };

    let state = AppState::new(documents, blobs, federated);

    let mut app = Router::new()
        .route("/api/signup", post(signup_handler))
        .route("/api/login", post(login_handler))
        .route("/api/logout", post(logout_handler))
        .route("/api/me", get(me_handler))
        .route("/api/canvas", put(save_canvas_handler))
        .route("/api/images", post(upload_image_handler))
        .route("/api/share", post(share_handler))
        .route("/api/shared", get(shared_list_handler))
        .route("/api/auth/federated", get(federated_start_handler))
        .route("/api/auth/callback", get(federated_callback_handler));
    if let Some(upload_dir) = serve_uploads {
        // Upload ids are random and never rewritten, so cache hard.
        let uploads = ServeDir::new(upload_dir);
        app = app.nest_service(
            "/uploads",
            tower::ServiceBuilder::new()
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("public, max-age=31536000, immutable"),
                ))
                .service(uploads),
        );
    }
    let app = app
        .fallback_service(ServeDir::new(public_dir).append_index_html_on_directories(true))
        .with_state(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Inkpad running at http://localhost:{port}");

    match (args.tls_cert, args.tls_key) {
        (Some(cert), Some(key)) => {
            let tls = RustlsConfig::from_pem_file(cert, key)
                .await
                .expect("Failed to read TLS cert/key");
            axum_server::bind_rustls(addr, tls)
                .serve(app.into_make_service())
                .await
                .expect("Server crashed");
        }
        _ => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .expect("Failed to bind server");
            axum::serve(listener, app).await.expect("Server crashed");
        }
    }
}
