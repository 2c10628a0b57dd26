use serde::Serialize;

use crate::job::{ClipDescriptor, Job, JobId, JobStatus, PhaseMarker};
use crate::upload::Platform;

/// Which screen the user is looking at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Screen {
    #[default]
    Input,
    Progress,
    Edit,
    Upload,
}

/// A caption re-render running in the background
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Regeneration {
    pub id: Option<String>,
    pub progress: u8,
    pub message: String,
}

/// What the service answered to an upload request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadReceipt {
    /// Published synchronously (YouTube).
    Published { url: String, message: Option<String> },
    /// Accepted as a background upload job (TikTok).
    Queued { upload_job_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum UploadOutcome {
    Published { url: Option<String> },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadState {
    pub platform: Platform,
    pub upload_job_id: Option<String>,
    pub progress: u8,
    pub message: String,
    /// `None` while the upload is still running
    pub outcome: Option<UploadOutcome>,
}

impl UploadState {
    pub fn in_flight(&self) -> bool {
        self.outcome.is_none()
    }
}

/// Everything the controller knows about the user's session.
///
/// Only [`crate::controller::update`] mutates it.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub(super) screen: Screen,
    /// Sequence number of the latest submission
    pub(super) submission: u64,
    /// Submission still waiting for its job id
    pub(super) pending_submission: Option<u64>,
    pub(super) job: Option<Job>,
    pub(super) clip: Option<ClipDescriptor>,
    pub(super) regeneration: Option<Regeneration>,
    pub(super) upload: Option<UploadState>,
    pub(super) polling: bool,
    pub(super) subscribed: bool,
    /// A one-off status fetch was requested for a completed job without clip data
    pub(super) awaiting_clip: bool,
    pub(super) dirty: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    pub fn job_id(&self) -> Option<&JobId> {
        self.job.as_ref().map(|job| &job.id)
    }

    pub fn clip(&self) -> Option<&ClipDescriptor> {
        self.clip.as_ref()
    }

    pub fn regeneration(&self) -> Option<&Regeneration> {
        self.regeneration.as_ref()
    }

    pub fn upload(&self) -> Option<&UploadState> {
        self.upload.as_ref()
    }

    pub fn is_polling(&self) -> bool {
        self.polling
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub fn is_submitting(&self) -> bool {
        self.pending_submission.is_some()
    }

    /// True once since the last call if anything visible changed.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            screen: self.screen,
            job: self.job.as_ref().map(JobView::from),
            clip: self.clip.clone(),
            regeneration: self.regeneration.clone(),
            upload: self.upload.clone(),
        }
    }

    /// The job is being generated and `job_id` names it.
    pub(super) fn tracking(&self, job_id: &JobId) -> bool {
        self.screen == Screen::Progress && self.job_id() == Some(job_id)
    }

    /// A finished clip for `job_id` is open in the editor or upload form.
    pub(super) fn editing(&self, job_id: &JobId) -> bool {
        matches!(self.screen, Screen::Edit | Screen::Upload)
            && self.clip.is_some()
            && self.job_id() == Some(job_id)
    }

    pub(super) fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

/// Render-ready snapshot of the session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub screen: Screen,
    pub job: Option<JobView>,
    pub clip: Option<ClipDescriptor>,
    pub regeneration: Option<Regeneration>,
    pub upload: Option<UploadState>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobView {
    pub id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub error: Option<String>,
    pub phases: [PhaseMarker; 5],
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            status: job.status,
            progress: job.progress,
            message: job.message.clone(),
            error: job.error.clone(),
            phases: job.phases(),
        }
    }
}
