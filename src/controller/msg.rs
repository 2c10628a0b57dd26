use crate::api::JobSnapshot;
use crate::events::PushEvent;
use crate::job::{CaptionEdit, ClipDescriptor, ClipRequest, JobId};
use crate::upload::UploadRequest;

use super::UploadReceipt;

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User submitted the generation form.
    SubmitRequested(ClipRequest),
    /// The service accepted submission `submission` as job `job_id`.
    JobCreated { submission: u64, job_id: JobId },
    /// The create call for `submission` failed (transport or server error).
    SubmitFailed { submission: u64, error: String },
    /// Start watching a job that already exists on the server.
    Attach(JobId),
    /// Reopen a completed job straight in the editor.
    Restore { job_id: JobId, clip: ClipDescriptor },
    /// Anything that arrived on the push channel.
    Push(PushEvent),
    /// One poll of `/job_status` returned.
    PollResult { job_id: JobId, snapshot: JobSnapshot },
    /// One poll of `/job_status` failed; the next tick retries.
    PollFailed { job_id: JobId, error: String },
    /// User saved caption edits.
    RegenerationRequested(Vec<CaptionEdit>),
    /// The service accepted the caption edits.
    RegenerationStarted {
        job_id: JobId,
        regeneration_job_id: Option<String>,
    },
    /// The service refused the caption edits.
    RegenerationRejected { job_id: JobId, error: String },
    /// The re-rendered clip was fetched.
    VideoRefreshed { job_id: JobId, clip: ClipDescriptor },
    RefreshFailed { job_id: JobId, error: String },
    /// User moved from the editor to the upload form.
    ContinueToUpload,
    /// User went back from the upload form to the editor.
    BackToEdit,
    /// User abandoned the current job.
    BackToInput,
    /// User submitted the upload form.
    UploadRequested(UploadRequest),
    /// The upload call returned successfully.
    UploadAccepted { job_id: JobId, receipt: UploadReceipt },
    /// The upload call failed; `auth_required` when the service wants a sign-in first.
    UploadFailed {
        job_id: JobId,
        error: String,
        auth_required: bool,
    },
}
