use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::SET_COOKIE;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use super::cookies::SessionCookies;
use super::{
    CaptionUpdateBody, CaptionUpdateResponse, ClipApi, CreateJobResponse, JobSnapshot,
    RefreshedVideo, TiktokUploadResponse, YoutubeUploadResponse,
};
use crate::config::ServerConfig;
use crate::job::{CaptionEdit, ClipRequest, JobId};
use crate::upload::{TiktokUpload, YoutubeUpload};
use crate::{ClipperError, Result};

/// Error body the service returns alongside non-2xx statuses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// reqwest-backed client for the clip service's JSON API
pub struct HttpClipApi {
    client: Client,
    base_url: String,
    cookies: SessionCookies,
}

impl HttpClipApi {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        Self::with_cookies(config, SessionCookies::new(&config.base_url)?)
    }

    /// Client that sends and collects cookies through `cookies`
    pub fn with_cookies(config: &ServerConfig, cookies: SessionCookies) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .cookie_provider(cookies.jar())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cookies,
        })
    }

    pub fn cookies(&self) -> &SessionCookies {
        &self.cookies
    }

    /// Persist the session as soon as the server hands out a new cookie
    fn remember(&self, response: &Response) {
        if !response.headers().contains_key(SET_COOKIE) {
            return;
        }
        if let Err(e) = self.cookies.save() {
            tracing::warn!("Failed to save session cookies: {:#}", e);
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    fn job_endpoint(&self, path: &str, job_id: &JobId) -> String {
        self.endpoint(&format!("{}/{}", path, urlencoding::encode(job_id.as_str())))
    }

    async fn get<T: DeserializeOwned>(&self, url: String) -> Result<T> {
        tracing::debug!("GET {}", url);
        let response = self.client.get(&url).send().await.map_err(transport)?;
        self.remember(&response);
        decode(response).await
    }

    async fn post<B: serde::Serialize + ?Sized, T: DeserializeOwned>(&self, url: String, body: &B) -> Result<T> {
        tracing::debug!("POST {}", url);
        let response = self.client.post(&url).json(body).send().await.map_err(transport)?;
        self.remember(&response);
        decode(response).await
    }
}

fn transport(e: reqwest::Error) -> anyhow::Error {
    ClipperError::Transport(e.to_string()).into()
}

/// Turn a response into `T`, or into [`ClipperError::Server`] carrying the
/// service's own error text when the status is not a success.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();

    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or_else(|_| format!("HTTP {}", status));
        return Err(ClipperError::Server {
            status: status.as_u16(),
            message,
        }
        .into());
    }

    let bytes = response.bytes().await.map_err(transport)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ClipperError::Protocol(format!("Unexpected response body: {e}")).into())
}

#[async_trait]
impl ClipApi for HttpClipApi {
    async fn generate_clip(&self, request: &ClipRequest) -> Result<CreateJobResponse> {
        self.post(self.endpoint("generate_clip"), request).await
    }

    async fn job_status(&self, job_id: &JobId) -> Result<JobSnapshot> {
        self.get(self.job_endpoint("job_status", job_id)).await
    }

    async fn update_captions(&self, job_id: &JobId, captions: &[CaptionEdit]) -> Result<CaptionUpdateResponse> {
        let body = CaptionUpdateBody { job_id, captions };
        self.post(self.endpoint("update_captions"), &body).await
    }

    async fn refresh_video(&self, job_id: &JobId) -> Result<RefreshedVideo> {
        self.get(self.job_endpoint("refresh_video", job_id)).await
    }

    async fn back_to_input(&self, job_id: &JobId) -> Result<()> {
        let url = self.endpoint("back_to_input");
        tracing::debug!("POST {}", url);
        let body = serde_json::json!({ "job_id": job_id });
        let response = self.client.post(&url).json(&body).send().await.map_err(transport)?;
        self.remember(&response);
        if response.status().is_success() {
            return Ok(());
        }
        // The body is only of interest when it explains a failure
        decode::<serde_json::Value>(response).await.map(|_| ())
    }

    async fn upload_to_youtube(&self, job_id: &JobId, upload: &YoutubeUpload) -> Result<YoutubeUploadResponse> {
        let body = upload.body(job_id);
        self.post(self.endpoint("upload_to_youtube"), &body).await
    }

    async fn upload_to_tiktok(&self, job_id: &JobId, upload: &TiktokUpload) -> Result<TiktokUploadResponse> {
        let body = upload.body(job_id);
        self.post(self.endpoint("upload_to_tiktok"), &body).await
    }
}
