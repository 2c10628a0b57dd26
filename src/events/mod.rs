//! Push events delivered by the clip service.
//!
//! The service is a Socket.IO server: each event arrives as a packet such as
//! `42["progress_update",{...}]` (see [`socketio`]). Rooms are per browser
//! session rather than per job, so events for other jobs of the same session
//! arrive too and are filtered downstream by job id. This module turns an
//! event name and payload into a strongly-typed [`PushEvent`].

use serde::Deserialize;
use serde_json::Value;

use crate::job::{Caption, ClipDescriptor, JobId, JobStatus};

pub mod socket;
pub mod socketio;

pub use socket::{PushChannel, ReconnectConfig, WsPushChannel};

/// All push events the client understands.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum PushEvent {
    /// Acknowledgement that the connection joined a room.
    Connected(ConnectedData),

    /// Generation progress for a job.
    ProgressUpdate(ProgressData),

    /// Generation finished and the clip is ready.
    ClipCompleted(ClipCompletedData),

    /// Background re-render after a caption edit is progressing.
    RegenerationUpdate(RegenerationProgressData),

    /// Background re-render finished.
    RegenerationComplete(RegenerationDoneData),

    /// Background re-render failed.
    RegenerationError(RegenerationErrorData),

    /// YouTube upload byte progress.
    UploadProgress(UploadProgressData),

    /// TikTok upload progress, keyed by upload job.
    TiktokUploadProgress(TiktokProgressData),

    TiktokUploadComplete(TiktokCompleteData),

    TiktokUploadError(TiktokErrorData),
}

impl PushEvent {
    /// Generation job the event belongs to, when it names one.
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            PushEvent::Connected(_) => None,
            PushEvent::ProgressUpdate(data) => Some(&data.job_id),
            PushEvent::ClipCompleted(data) => Some(&data.job_id),
            PushEvent::RegenerationUpdate(data) => Some(&data.job_id),
            PushEvent::RegenerationComplete(data) => Some(&data.job_id),
            PushEvent::RegenerationError(data) => Some(&data.job_id),
            PushEvent::UploadProgress(data) => data.job_id.as_ref(),
            PushEvent::TiktokUploadProgress(_)
            | PushEvent::TiktokUploadComplete(_)
            | PushEvent::TiktokUploadError(_) => None,
        }
    }

    /// Build an event from its Socket.IO name and payload.
    ///
    /// Returns `Err` for unknown names or payloads that do not fit; callers
    /// should log and continue.
    pub fn from_event(name: &str, data: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::json!({ "type": name, "data": data }))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PushEvent::Connected(_) => "connected",
            PushEvent::ProgressUpdate(_) => "progress_update",
            PushEvent::ClipCompleted(_) => "clip_completed",
            PushEvent::RegenerationUpdate(_) => "regeneration_update",
            PushEvent::RegenerationComplete(_) => "regeneration_complete",
            PushEvent::RegenerationError(_) => "regeneration_error",
            PushEvent::UploadProgress(_) => "upload_progress",
            PushEvent::TiktokUploadProgress(_) => "tiktok_upload_progress",
            PushEvent::TiktokUploadComplete(_) => "tiktok_upload_complete",
            PushEvent::TiktokUploadError(_) => "tiktok_upload_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConnectedData {
    #[serde(default)]
    pub room: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProgressData {
    pub job_id: JobId,
    pub progress: f64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<JobStatus>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClipCompletedData {
    pub job_id: JobId,
    pub clip_data: ClipDescriptor,
    /// Editable captions; take precedence over `clip_data.captions`.
    #[serde(default)]
    pub captions: Option<Vec<Caption>>,
}

impl ClipCompletedData {
    /// The clip with the event-level captions folded in.
    pub fn into_clip(self) -> ClipDescriptor {
        let mut clip = self.clip_data;
        if let Some(captions) = self.captions {
            clip.captions = captions;
        }
        clip
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegenerationProgressData {
    pub job_id: JobId,
    #[serde(default)]
    pub regeneration_job_id: Option<String>,
    pub progress: f64,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegenerationDoneData {
    pub job_id: JobId,
    #[serde(default)]
    pub regeneration_job_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegenerationErrorData {
    pub job_id: JobId,
    #[serde(default)]
    pub regeneration_job_id: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadProgressData {
    #[serde(default)]
    pub job_id: Option<JobId>,
    pub progress: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TiktokProgressData {
    pub upload_job_id: String,
    pub progress: f64,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TiktokCompleteData {
    pub upload_job_id: String,
    #[serde(default)]
    pub share_url: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TiktokErrorData {
    pub upload_job_id: String,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use socketio::{decode, Packet};

    fn parse_message(frame: &str) -> Result<PushEvent, serde_json::Error> {
        match decode(frame).expect("valid frame") {
            Packet::Event { name, data } => PushEvent::from_event(&name, data),
            other => panic!("Expected an event packet, got {other:?}"),
        }
    }

    #[test]
    fn parse_progress_update() {
        let json = r#"42["progress_update",{"job_id":"j1","status":"processing","progress":45,"message":"Analyzing"}]"#;
        match parse_message(json).unwrap() {
            PushEvent::ProgressUpdate(data) => {
                assert_eq!(data.job_id.as_str(), "j1");
                assert_eq!(data.progress, 45.0);
                assert_eq!(data.status, Some(JobStatus::Processing));
                assert_eq!(data.message.as_deref(), Some("Analyzing"));
            }
            other => panic!("Expected ProgressUpdate, got {other:?}"),
        }
    }

    #[test]
    fn parse_progress_update_without_status() {
        let json = r#"42["progress_update",{"job_id":"j1","progress":10}]"#;
        match parse_message(json).unwrap() {
            PushEvent::ProgressUpdate(data) => {
                assert!(data.status.is_none());
                assert!(data.message.is_none());
            }
            other => panic!("Expected ProgressUpdate, got {other:?}"),
        }
    }

    #[test]
    fn clip_completed_prefers_event_captions() {
        let json = r#"42["clip_completed",{
            "job_id":"j1",
            "clip_data":{"path":"/clips/a.mp4","duration":30,"captions":[{"text":"stale"}]},
            "captions":[{"text":"fresh","speaker":"Speaker 2"}]
        }]"#;
        let event = parse_message(json).unwrap();
        assert_eq!(event.job_id().map(JobId::as_str), Some("j1"));
        match event {
            PushEvent::ClipCompleted(data) => {
                let clip = data.into_clip();
                assert_eq!(clip.captions.len(), 1);
                assert_eq!(clip.captions[0].text, "fresh");
            }
            other => panic!("Expected ClipCompleted, got {other:?}"),
        }
    }

    #[test]
    fn parse_regeneration_events() {
        let update = r#"42["regeneration_update",{"job_id":"j1","regeneration_job_id":"regen_1","status":"processing","progress":30,"message":"Syncing"}]"#;
        let error = r#"42["regeneration_error",{"job_id":"j1","regeneration_job_id":"regen_1","status":"failed","error":"ffmpeg died"}]"#;

        assert!(matches!(
            parse_message(update).unwrap(),
            PushEvent::RegenerationUpdate(RegenerationProgressData { progress, .. }) if progress == 30.0
        ));
        match parse_message(error).unwrap() {
            PushEvent::RegenerationError(data) => {
                assert_eq!(data.regeneration_job_id.as_deref(), Some("regen_1"));
                assert_eq!(data.error, "ffmpeg died");
            }
            other => panic!("Expected RegenerationError, got {other:?}"),
        }
    }

    #[test]
    fn tiktok_events_carry_no_job_id() {
        let json = r#"42["tiktok_upload_complete",{"upload_job_id":"up_1","status":"success","share_url":"https://tiktok.com/x","message":"done"}]"#;
        let event = parse_message(json).unwrap();
        assert_eq!(event.kind(), "tiktok_upload_complete");
        assert!(event.job_id().is_none());
    }

    #[test]
    fn parse_connected() {
        let json = r#"42["connected",{"room":"session_4f2a","type":"session"}]"#;
        assert!(matches!(parse_message(json).unwrap(), PushEvent::Connected(_)));
    }

    #[test]
    fn unknown_type_returns_error() {
        let json = r#"42["something_else",{}]"#;
        assert!(parse_message(json).is_err());
    }

    #[test]
    fn payload_missing_fields_returns_error() {
        let json = r#"42["progress_update",{"job_id":"j1"}]"#;
        assert!(parse_message(json).is_err());
    }
}
