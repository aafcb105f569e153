use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::auth::{FederatedConfig, PendingLogin};
use crate::blobs::BlobStore;
use crate::documents::DocumentStore;
use crate::sessions::SessionMap;

#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub sessions: SessionMap,
    /// PKCE verifiers for federated logins in flight, keyed by state.
    pub pending_logins: Arc<RwLock<HashMap<String, PendingLogin>>>,
    pub federated: Option<Arc<FederatedConfig>>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        federated: Option<FederatedConfig>,
    ) -> Self {
        Self {
            documents,
            blobs,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            pending_logins: Arc::new(RwLock::new(HashMap::new())),
            federated: federated.map(Arc::new),
            http: reqwest::Client::new(),
        }
    }
}
