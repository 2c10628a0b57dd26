use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod cookies;
pub mod http;

pub use cookies::SessionCookies;
pub use http::HttpClipApi;

use crate::job::{Caption, CaptionEdit, ClipDescriptor, ClipRequest, JobId, JobStatus};
use crate::upload::{TiktokUpload, YoutubeUpload};
use crate::Result;

/// Response to `POST /api/generate_clip`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateJobResponse {
    pub job_id: JobId,
    #[serde(default)]
    pub is_anonymous: bool,
}

/// Response to `GET /api/job_status/{job_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    #[serde(default)]
    pub job_id: Option<JobId>,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub clip_data: Option<ClipDescriptor>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaptionUpdateBody<'a> {
    pub job_id: &'a JobId,
    pub captions: &'a [CaptionEdit],
}

/// Response to `POST /api/update_captions`
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct CaptionUpdateResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub regeneration_job_id: Option<String>,
}

/// Response to `GET /api/refresh_video/{job_id}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RefreshedVideo {
    pub video_url: String,
    pub clip_data: ClipDescriptor,
    #[serde(default)]
    pub captions: Option<Vec<Caption>>,
}

impl RefreshedVideo {
    /// The refreshed clip, pointing at the cache-busted video URL.
    pub fn into_clip(self) -> ClipDescriptor {
        let mut clip = self.clip_data;
        clip.video_url = Some(self.video_url);
        if let Some(captions) = self.captions {
            clip.captions = captions;
        }
        clip
    }
}

/// Response to `POST /api/upload_to_youtube`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct YoutubeUploadResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub url: String,
    #[serde(default)]
    pub video_id: Option<String>,
}

/// Response to `POST /api/upload_to_tiktok`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TiktokUploadResponse {
    pub upload_job_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// The clip service as seen from the client
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClipApi: Send + Sync {
    /// Start a generation job
    async fn generate_clip(&self, request: &ClipRequest) -> Result<CreateJobResponse>;

    /// Fetch the current state of a job
    async fn job_status(&self, job_id: &JobId) -> Result<JobSnapshot>;

    /// Submit edited captions and start a background re-render
    async fn update_captions(&self, job_id: &JobId, captions: &[CaptionEdit]) -> Result<CaptionUpdateResponse>;

    /// Fetch the clip again after a re-render
    async fn refresh_video(&self, job_id: &JobId) -> Result<RefreshedVideo>;

    /// Tell the server the user left the job
    async fn back_to_input(&self, job_id: &JobId) -> Result<()>;

    async fn upload_to_youtube(&self, job_id: &JobId, upload: &YoutubeUpload) -> Result<YoutubeUploadResponse>;

    async fn upload_to_tiktok(&self, job_id: &JobId, upload: &TiktokUpload) -> Result<TiktokUploadResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_tolerates_missing_fields() {
        let snapshot: JobSnapshot = serde_json::from_str(r#"{"status":"pending"}"#).unwrap();
        assert_eq!(snapshot.status, JobStatus::Pending);
        assert_eq!(snapshot.progress, 0.0);
        assert!(snapshot.clip_data.is_none());
    }

    #[test]
    fn refreshed_video_points_clip_at_new_url() {
        let json = r#"{"status":"success","video_url":"/clips/a.mp4?v=17","clip_data":{"path":"/srv/a.mp4","captions":[]},
            "captions":[{"text":"edited","speaker":"Speaker 2"}]}"#;
        let refreshed: RefreshedVideo = serde_json::from_str(json).unwrap();
        let clip = refreshed.into_clip();
        assert_eq!(clip.playback_url().as_deref(), Some("/clips/a.mp4?v=17"));
        assert_eq!(clip.captions[0].text, "edited");
    }
}
