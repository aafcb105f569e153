use std::path::PathBuf;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use inkpad_shared::{SharedCanvas, UserProfile};

const DOCUMENT_FILE_MAGIC: [u8; 4] = *b"IPUD";
const DOCUMENT_FILE_VERSION: u32 = 1;
const DOCUMENT_HEADER_LEN: usize = DOCUMENT_FILE_MAGIC.len() + std::mem::size_of::<u32>();

/// Stored superset of the wire profile: the password digest (absent for
/// federated-only accounts) and the append-only shared-canvas records live
/// next to the profile fields in a single per-user document.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UserDocument {
    pub uid: String,
    pub email: String,
    pub password: Option<String>,
    pub canvas: Option<String>,
    pub shared: Vec<SharedCanvas>,
}

impl UserDocument {
    pub fn new(uid: String, email: String, password: Option<String>) -> Self {
        Self {
            uid,
            email,
            password,
            canvas: None,
            shared: Vec::new(),
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            uid: self.uid.clone(),
            email: self.email.clone(),
            canvas: self.canvas.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("No document for user {0}")]
    NotFound(String),
    #[error("Invalid document file format")]
    InvalidData,
    #[error("Unsupported document file version: {0}")]
    UnsupportedVersion(u32),
    #[error("Document store error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn load_user(&self, uid: &str) -> Result<UserDocument, DocumentError>;

    /// Whole-document overwrite. There is no versioning and no concurrency
    /// check; the last writer wins.
    async fn store_user(&self, document: &UserDocument) -> Result<(), DocumentError>;

    /// Linear scan over every stored document. Returns all matching uids so
    /// callers can detect ambiguous emails.
    async fn find_by_email(&self, email: &str) -> Result<Vec<String>, DocumentError>;
}

pub fn encode_document(document: &UserDocument) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&DOCUMENT_FILE_MAGIC);
    payload.extend_from_slice(&DOCUMENT_FILE_VERSION.to_le_bytes());
    let body =
        bincode::serde::encode_to_vec(document, bincode::config::standard()).unwrap_or_default();
    payload.extend_from_slice(&body);
    payload
}

pub fn decode_document(payload: &[u8]) -> Result<UserDocument, DocumentError> {
    if !(payload.len() >= DOCUMENT_HEADER_LEN && payload.starts_with(&DOCUMENT_FILE_MAGIC)) {
        return Err(DocumentError::InvalidData);
    }
    let version = u32::from_le_bytes(
        payload[DOCUMENT_FILE_MAGIC.len()..DOCUMENT_HEADER_LEN]
            .try_into()
            .map_err(|_| DocumentError::InvalidData)?,
    );
    let body = &payload[DOCUMENT_HEADER_LEN..];
    match version {
        1 => bincode::serde::decode_from_slice(body, bincode::config::standard())
            .map(|(document, _)| document)
            .map_err(|_| DocumentError::InvalidData),
        _ => Err(DocumentError::UnsupportedVersion(version)),
    }
}

pub struct FileDocumentStore {
    data_dir: PathBuf,
}

impl FileDocumentStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    fn document_path(&self, uid: &str) -> PathBuf {
        self.data_dir.join(format!("{uid}.bin"))
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn load_user(&self, uid: &str) -> Result<UserDocument, DocumentError> {
        let path = self.document_path(uid);
        let payload = match tokio::fs::read(path).await {
            Ok(payload) => payload,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(DocumentError::NotFound(uid.to_string()));
            }
            Err(error) => {
                return Err(DocumentError::Backend(format!(
                    "Failed to read document for {uid}: {error}"
                )));
            }
        };
        decode_document(&payload)
    }

    async fn store_user(&self, document: &UserDocument) -> Result<(), DocumentError> {
        let path = self.document_path(&document.uid);
        let payload = encode_document(document);
        tokio::fs::write(path, payload).await.map_err(|error| {
            DocumentError::Backend(format!(
                "Failed to write document for {}: {error}",
                document.uid
            ))
        })
    }

    async fn find_by_email(&self, email: &str) -> Result<Vec<String>, DocumentError> {
        let mut entries = tokio::fs::read_dir(&self.data_dir)
            .await
            .map_err(|error| DocumentError::Backend(format!("Failed to list documents: {error}")))?;
        let mut matches = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|error| DocumentError::Backend(format!("Failed to list documents: {error}")))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("bin") {
                continue;
            }
            let Ok(payload) = tokio::fs::read(&path).await else {
                continue;
            };
            let Ok(document) = decode_document(&payload) else {
                tracing::warn!(path = %path.display(), "skipping undecodable document");
                continue;
            };
            if document.email == email {
                matches.push(document.uid);
            }
        }
        Ok(matches)
    }
}

#[derive(Clone, Debug)]
pub struct S3Config {
    pub bucket: String,
    pub prefix: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl S3Config {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: None,
            region: None,
            endpoint_url: None,
            force_path_style: false,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

pub async fn s3_client(config: &S3Config) -> Client {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let (Some(access_key_id), Some(secret_access_key)) = (
        config.access_key_id.clone(),
        config.secret_access_key.clone(),
    ) {
        let creds = Credentials::new(access_key_id, secret_access_key, None, None, "static");
        loader = loader.credentials_provider(creds);
    }
    if let Some(region) = config.region.clone() {
        loader = loader.region(aws_config::Region::new(region));
    }
    let shared = loader.load().await;
    let mut builder = aws_sdk_s3::config::Builder::from(&shared);
    if let Some(endpoint_url) = config.endpoint_url.as_ref() {
        builder = builder.endpoint_url(endpoint_url);
    }
    if config.force_path_style {
        builder = builder.force_path_style(true);
    }
    Client::from_conf(builder.build())
}

pub struct S3DocumentStore {
    bucket: String,
    prefix: String,
    client: Client,
}

impl S3DocumentStore {
    pub async fn new(config: S3Config) -> Self {
        let client = s3_client(&config).await;
        let prefix = config
            .prefix
            .unwrap_or_default()
            .trim_matches('/')
            .to_string();
        Self {
            bucket: config.bucket,
            prefix,
            client,
        }
    }

    fn object_key(&self, uid: &str) -> String {
        if self.prefix.is_empty() {
            format!("{uid}.bin")
        } else {
            format!("{}/{uid}.bin", self.prefix)
        }
    }
}

#[async_trait]
impl DocumentStore for S3DocumentStore {
    async fn load_user(&self, uid: &str) -> Result<UserDocument, DocumentError> {
        let key = self.object_key(uid);
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;
        let output = match response {
            Ok(output) => output,
            Err(error) => {
                if let Some(service_error) = error.as_service_error() {
                    if service_error.is_no_such_key() {
                        return Err(DocumentError::NotFound(uid.to_string()));
                    }
                }
                return Err(DocumentError::Backend(format!(
                    "Failed to load document for {uid} from s3: {error:?}"
                )));
            }
        };
        let bytes = output.body.collect().await.map_err(|error| {
            DocumentError::Backend(format!(
                "Failed to read document for {uid} from s3 response: {error:?}"
            ))
        })?;
        decode_document(&bytes.into_bytes())
    }

    async fn store_user(&self, document: &UserDocument) -> Result<(), DocumentError> {
        let key = self.object_key(&document.uid);
        let payload = encode_document(document);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(payload))
            .send()
            .await
            .map_err(|error| {
                DocumentError::Backend(format!(
                    "Failed to store document for {} to s3: {error:?}",
                    document.uid
                ))
            })?;
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Vec<String>, DocumentError> {
        let mut matches = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket);
            if !self.prefix.is_empty() {
                request = request.prefix(format!("{}/", self.prefix));
            }
            if let Some(token) = continuation.take() {
                request = request.continuation_token(token);
            }
            let page = request.send().await.map_err(|error| {
                DocumentError::Backend(format!("Failed to list documents in s3: {error:?}"))
            })?;
            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                if !key.ends_with(".bin") {
                    continue;
                }
                let uid = key
                    .rsplit('/')
                    .next()
                    .unwrap_or(key)
                    .trim_end_matches(".bin");
                match self.load_user(uid).await {
                    Ok(document) if document.email == email => matches.push(document.uid),
                    Ok(_) => {}
                    Err(error) => {
                        tracing::warn!(key, %error, "skipping undecodable document");
                    }
                }
            }
            match page.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_document() -> UserDocument {
        let mut document = UserDocument::new(
            "user-1".into(),
            "ada@example.com".into(),
            Some("hkdf-sha256$abc$def".into()),
        );
        document.canvas = Some("<svg></svg>".into());
        document.shared.push(SharedCanvas {
            user: "grace@example.com".into(),
            canvas: "<svg><path/></svg>".into(),
        });
        document
    }

    #[test]
    fn decode_rejects_bad_magic() {
        let mut payload = encode_document(&sample_document());
        payload[0] = b'X';
        assert!(matches!(
            decode_document(&payload),
            Err(DocumentError::InvalidData)
        ));
    }

    #[test]
    fn decode_rejects_unknown_version() {
        let mut payload = encode_document(&sample_document());
        payload[4..8].copy_from_slice(&9u32.to_le_bytes());
        assert!(matches!(
            decode_document(&payload),
            Err(DocumentError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn decode_rejects_truncated_payload() {
        assert!(matches!(
            decode_document(b"IP"),
            Err(DocumentError::InvalidData)
        ));
    }

    #[tokio::test]
    async fn file_store_loads_what_it_stored() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path().to_path_buf());
        let document = sample_document();
        store.store_user(&document).await.unwrap();

        let loaded = store.load_user("user-1").await.unwrap();
        assert_eq!(loaded.email, "ada@example.com");
        assert_eq!(loaded.canvas.as_deref(), Some("<svg></svg>"));
        assert_eq!(loaded.shared.len(), 1);
    }

    #[tokio::test]
    async fn file_store_missing_user_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path().to_path_buf());
        assert!(matches!(
            store.load_user("nobody").await,
            Err(DocumentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn file_store_overwrites_canvas() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path().to_path_buf());
        let mut document = sample_document();
        store.store_user(&document).await.unwrap();

        document.canvas = Some("<svg><circle/></svg>".into());
        store.store_user(&document).await.unwrap();

        let loaded = store.load_user("user-1").await.unwrap();
        assert_eq!(loaded.canvas.as_deref(), Some("<svg><circle/></svg>"));
    }

    #[tokio::test]
    async fn find_by_email_scans_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path().to_path_buf());
        store.store_user(&sample_document()).await.unwrap();
        store
            .store_user(&UserDocument::new(
                "user-2".into(),
                "grace@example.com".into(),
                None,
            ))
            .await
            .unwrap();

        let matches = store.find_by_email("grace@example.com").await.unwrap();
        assert_eq!(matches, vec!["user-2".to_string()]);
        assert!(store
            .find_by_email("nobody@example.com")
            .await
            .unwrap()
            .is_empty());
    }
}
