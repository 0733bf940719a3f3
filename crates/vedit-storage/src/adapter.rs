//! Hosting service adapters.
//!
//! An adapter knows the wire shape of one hosting service's three upload
//! requests: session creation, offset-addressed chunk send and resource
//! lookup. Sequencing, retries and offset bookkeeping live in
//! [`ResumableUploader`](crate::ResumableUploader).

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::UploadConfig;
use crate::error::{ChunkFailure, UploadError, UploadResult};

/// Remote upload target returned by session creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTarget {
    /// Where chunks are sent
    pub upload_url: String,
    /// Identifier of the created resource, used for the final lookup
    pub resource_id: String,
}

#[async_trait]
pub trait HostingAdapter: Send + Sync {
    /// Declare an upload of `size` bytes.
    async fn create_session(&self, size: u64) -> UploadResult<SessionTarget>;

    /// Send `chunk` at `offset`; on success returns the remote's offset.
    async fn send_chunk(
        &self,
        target: &SessionTarget,
        offset: u64,
        chunk: Bytes,
    ) -> Result<u64, ChunkFailure>;

    /// Public link of a finished upload.
    async fn lookup_link(&self, target: &SessionTarget) -> UploadResult<String>;
}

const VIMEO_ACCEPT: &str = "application/vnd.vimeo.*+json;version=3.4";
const TUS_VERSION: &str = "1.0.0";
const UPLOAD_OFFSET: &str = "Upload-Offset";

#[derive(Debug, Deserialize)]
struct CreateResponse {
    uri: Option<String>,
    upload: Option<CreateUpload>,
}

#[derive(Debug, Deserialize)]
struct CreateUpload {
    upload_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    link: Option<String>,
}

/// Vimeo API with the tus approach.
#[derive(Debug, Clone)]
pub struct VimeoAdapter {
    http: Client,
    api_base: String,
    access_token: String,
}

impl VimeoAdapter {
    pub fn new(config: &UploadConfig) -> UploadResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("vedit-storage/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UploadError::Config(e.to_string()))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(&self.access_token)
            .header(reqwest::header::ACCEPT, VIMEO_ACCEPT)
    }
}

#[async_trait]
impl HostingAdapter for VimeoAdapter {
    async fn create_session(&self, size: u64) -> UploadResult<SessionTarget> {
        let url = format!("{}/me/videos", self.api_base);
        let body = json!({
            "upload": {
                "approach": "tus",
                "size": size.to_string(),
            }
        });

        let response = self
            .authorized(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| UploadError::session_init(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(UploadError::session_init(format!(
                "remote responded {}: {}",
                status, text
            )));
        }

        let created: CreateResponse = response
            .json()
            .await
            .map_err(|e| UploadError::session_init(format!("malformed response: {}", e)))?;

        let upload_url = created
            .upload
            .and_then(|u| u.upload_link)
            .filter(|link| !link.is_empty())
            .ok_or_else(|| UploadError::session_init("response has no upload link"))?;
        let resource_id = created
            .uri
            .ok_or_else(|| UploadError::session_init("response has no resource uri"))?;

        debug!("Created upload session {} -> {}", resource_id, upload_url);
        Ok(SessionTarget {
            upload_url,
            resource_id,
        })
    }

    async fn send_chunk(
        &self,
        target: &SessionTarget,
        offset: u64,
        chunk: Bytes,
    ) -> Result<u64, ChunkFailure> {
        let response = self
            .http
            .patch(&target.upload_url)
            .bearer_auth(&self.access_token)
            .header("Tus-Resumable", TUS_VERSION)
            .header(UPLOAD_OFFSET, offset.to_string())
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/offset+octet-stream",
            )
            .body(chunk)
            .send()
            .await
            .map_err(|e| ChunkFailure::Transient(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(ChunkFailure::Gone {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(ChunkFailure::Transient(format!("remote responded {}", status)));
        }

        response
            .headers()
            .get(UPLOAD_OFFSET)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .ok_or_else(|| ChunkFailure::Transient("response has no valid Upload-Offset".into()))
    }

    async fn lookup_link(&self, target: &SessionTarget) -> UploadResult<String> {
        let url = format!("{}{}", self.api_base, target.resource_id);
        let response = self
            .authorized(self.http.get(&url))
            .send()
            .await
            .map_err(|e| UploadError::lookup(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::lookup(format!("remote responded {}", status)));
        }

        let found: LookupResponse = response
            .json()
            .await
            .map_err(|e| UploadError::lookup(format!("malformed response: {}", e)))?;

        found
            .link
            .filter(|l| !l.is_empty())
            .ok_or_else(|| UploadError::lookup("response has no link"))
    }
}
