//! Per-job scratch directories.

use std::path::{Path, PathBuf};
use tracing::warn;
use vedit_models::JobId;

use crate::error::WorkerResult;

const INPUT_FILE: &str = "input.mp4";
const OUTPUT_FILE: &str = "processed_video.mp4";

/// `{work_dir}/{job_id}/`, holding the source, fetched assets and the
/// rendered output of one job.
#[derive(Debug)]
pub struct JobWorkspace {
    dir: PathBuf,
}

impl JobWorkspace {
    pub async fn create(work_dir: &Path, job_id: &JobId) -> WorkerResult<Self> {
        let dir = work_dir.join(job_id.as_str());
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn input_path(&self) -> PathBuf {
        self.dir.join(INPUT_FILE)
    }

    pub fn output_path(&self) -> PathBuf {
        self.dir.join(OUTPUT_FILE)
    }

    /// Remove the directory. Failures are logged, never propagated.
    pub async fn cleanup(self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.dir).await {
            warn!("Failed to remove workspace {}: {}", self.dir.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_cleanup() {
        let root = tempfile::tempdir().unwrap();
        let job_id = JobId::from_string("abc");
        let workspace = JobWorkspace::create(root.path(), &job_id).await.unwrap();

        assert_eq!(workspace.dir(), root.path().join("abc"));
        assert!(workspace.dir().is_dir());
        assert_eq!(workspace.output_path(), root.path().join("abc/processed_video.mp4"));

        let dir = workspace.dir().to_path_buf();
        workspace.cleanup().await;
        assert!(!dir.exists());
    }
}
