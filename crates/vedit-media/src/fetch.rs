//! Remote asset retrieval.
//!
//! Bodies are streamed to disk chunk by chunk into `<dest>.part` and renamed
//! into place once complete, so a failed fetch never leaves a truncated file
//! under the final name. No retries happen here.

use futures_util::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use crate::error::{MediaError, MediaResult};

/// Fetcher configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl FetchConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            timeout: std::env::var("FETCH_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            connect_timeout: std::env::var("FETCH_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
        }
    }
}

/// Streams remote resources to local files.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> MediaResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("vedit-media/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Share an existing HTTP client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Fetch `url` into `dest`, returning the number of bytes written.
    ///
    /// `file://` URLs are copied from the local filesystem.
    pub async fn fetch(&self, url: &str, dest: &Path) -> MediaResult<u64> {
        let parsed = Url::parse(url)
            .map_err(|e| MediaError::fetch_failed(url, None, format!("invalid URL: {}", e)))?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        let written = match parsed.scheme() {
            "file" => self.copy_local(&parsed, url, dest).await?,
            "http" | "https" => self.download(url, dest).await?,
            other => {
                return Err(MediaError::fetch_failed(
                    url,
                    None,
                    format!("unsupported scheme '{}'", other),
                ))
            }
        };

        info!("Fetched {} ({} bytes) to {}", url, written, dest.display());
        Ok(written)
    }

    async fn download(&self, url: &str, dest: &Path) -> MediaResult<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MediaError::fetch_failed(url, None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::fetch_failed(
                url,
                Some(status.as_u16()),
                format!("remote responded {}", status),
            ));
        }

        let part = part_path(dest);
        let result = async {
            let mut file = fs::File::create(&part).await?;
            let mut stream = response.bytes_stream();
            let mut written: u64 = 0;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| {
                    MediaError::fetch_failed(url, Some(status.as_u16()), e.to_string())
                })?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok::<u64, MediaError>(written)
        }
        .await;

        match result {
            Ok(written) => {
                fs::rename(&part, dest).await?;
                Ok(written)
            }
            Err(e) => {
                debug!("Removing partial download {}", part.display());
                let _ = fs::remove_file(&part).await;
                Err(e)
            }
        }
    }

    async fn copy_local(&self, parsed: &Url, url: &str, dest: &Path) -> MediaResult<u64> {
        let source = parsed
            .to_file_path()
            .map_err(|_| MediaError::fetch_failed(url, None, "invalid file URL"))?;
        fs::copy(&source, dest)
            .await
            .map_err(|e| MediaError::fetch_failed(url, None, e.to_string()))
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}
