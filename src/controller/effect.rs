use crate::job::{CaptionEdit, ClipRequest, JobId};
use crate::upload::UploadRequest;

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Call `generate_clip`; answer with `JobCreated`/`SubmitFailed` tagged `submission`.
    CreateJob { submission: u64, request: ClipRequest },
    StartPolling { job_id: JobId },
    StopPolling,
    Subscribe { job_id: JobId },
    Unsubscribe,
    /// One-off `job_status` call, answered like a poll tick.
    FetchStatus { job_id: JobId },
    SubmitCaptions { job_id: JobId, captions: Vec<CaptionEdit> },
    RefreshVideo { job_id: JobId },
    /// Tell the server the user left the job.
    ReleaseJob { job_id: JobId },
    Upload { job_id: JobId, request: UploadRequest },
    Notify(Notice),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A user-visible message (modal or transient notification)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, message: message.into() }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, message: message.into() }
    }
}

impl Effect {
    pub fn notify_error(message: impl Into<String>) -> Self {
        Effect::Notify(Notice::error(message))
    }

    pub fn notify_success(message: impl Into<String>) -> Self {
        Effect::Notify(Notice::success(message))
    }
}
