use crate::api::JobSnapshot;
use crate::events::{PushEvent, TiktokCompleteData, TiktokErrorData, TiktokProgressData};
use crate::job::{clamp_percent, CaptionEdit, ClipDescriptor, Job, JobId, JobStatus};
use crate::upload::{Platform, UploadRequest};

use super::{
    Effect, Msg, Notice, Regeneration, Screen, SessionState, UploadOutcome, UploadReceipt,
    UploadState,
};

const COMPLETED_MESSAGE: &str = "Clip generated successfully!";
const FAILED_MESSAGE: &str = "Processing failed";
const SIGN_IN_NOTICE: &str = "Sign in with your account before uploading";

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: SessionState, msg: Msg) -> (SessionState, Vec<Effect>) {
    let effects = match msg {
        Msg::SubmitRequested(request) => {
            if let Err(e) = request.validate() {
                return (state, vec![Effect::notify_error(e.to_string())]);
            }
            let mut effects = state.leave_job();
            state.submission += 1;
            state.pending_submission = Some(state.submission);
            state.screen = Screen::Progress;
            effects.push(Effect::CreateJob {
                submission: state.submission,
                request,
            });
            effects
        }
        Msg::JobCreated { submission, job_id } => {
            if state.pending_submission != Some(submission) {
                tracing::debug!(job_id = %job_id, submission, "Discarding job for superseded submission");
                return (state, Vec::new());
            }
            state.pending_submission = None;
            state.watch(job_id)
        }
        Msg::SubmitFailed { submission, error } => {
            if state.pending_submission != Some(submission) {
                tracing::debug!(submission, "Discarding failure for superseded submission");
                return (state, Vec::new());
            }
            state.pending_submission = None;
            state.screen = Screen::Input;
            state.mark_dirty();
            vec![Effect::notify_error(error)]
        }
        Msg::Attach(job_id) => {
            let mut effects = state.leave_job();
            effects.extend(state.watch(job_id.clone()));
            effects.push(Effect::FetchStatus { job_id });
            effects
        }
        Msg::Restore { job_id, clip } => {
            let effects = state.leave_job();
            let mut job = Job::new(job_id);
            job.apply_report(100.0, Some(COMPLETED_MESSAGE), Some(JobStatus::Completed));
            state.job = Some(job);
            state.clip = Some(clip);
            state.screen = Screen::Edit;
            effects
        }
        Msg::Push(event) => state.apply_push(event),
        Msg::PollResult { job_id, snapshot } => state.apply_snapshot(&job_id, snapshot),
        Msg::PollFailed { job_id, error } => {
            if state.tracking(&job_id) {
                tracing::debug!(job_id = %job_id, %error, "Status poll failed, next tick retries");
            }
            Vec::new()
        }
        Msg::RegenerationRequested(edits) => state.request_regeneration(edits),
        Msg::RegenerationStarted {
            job_id,
            regeneration_job_id,
        } => {
            if !state.editing(&job_id) {
                return (state, Vec::new());
            }
            match state.regeneration.as_mut() {
                Some(regeneration) => {
                    if regeneration.id.is_none() {
                        regeneration.id = regeneration_job_id;
                    }
                    state.mark_dirty();
                    vec![Effect::Notify(Notice::info("Captions update started"))]
                }
                None => Vec::new(),
            }
        }
        Msg::RegenerationRejected { job_id, error } => {
            if !state.editing(&job_id) || state.regeneration.take().is_none() {
                return (state, Vec::new());
            }
            state.mark_dirty();
            vec![Effect::notify_error(format!("Failed to update captions: {}", error))]
        }
        Msg::VideoRefreshed { job_id, clip } => {
            if state.editing(&job_id) {
                state.clip = Some(clip);
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::RefreshFailed { job_id, error } => {
            if !state.editing(&job_id) {
                return (state, Vec::new());
            }
            vec![Effect::notify_error(format!("Failed to refresh video: {}", error))]
        }
        Msg::ContinueToUpload => {
            if state.screen == Screen::Edit && state.clip.is_some() {
                state.screen = Screen::Upload;
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::BackToEdit => {
            if state.screen == Screen::Upload {
                state.screen = Screen::Edit;
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::BackToInput => {
            let released = state.job_id().cloned();
            let mut effects = state.leave_job();
            if let Some(job_id) = released {
                effects.push(Effect::ReleaseJob { job_id });
            }
            effects
        }
        Msg::UploadRequested(request) => state.request_upload(request),
        Msg::UploadAccepted { job_id, receipt } => {
            if !state.editing(&job_id) {
                return (state, Vec::new());
            }
            state.accept_upload(receipt)
        }
        Msg::UploadFailed {
            job_id,
            error,
            auth_required,
        } => {
            if !state.editing(&job_id) {
                return (state, Vec::new());
            }
            let mut effects = state.fail_upload(error);
            if auth_required && !effects.is_empty() {
                effects.push(Effect::Notify(Notice::info(SIGN_IN_NOTICE)));
            }
            effects
        }
    };

    (state, effects)
}

impl SessionState {
    /// Drop the current job and everything hanging off it.
    fn leave_job(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if std::mem::take(&mut self.polling) {
            effects.push(Effect::StopPolling);
        }
        if std::mem::take(&mut self.subscribed) {
            effects.push(Effect::Unsubscribe);
        }
        self.pending_submission = None;
        self.job = None;
        self.clip = None;
        self.regeneration = None;
        self.upload = None;
        self.awaiting_clip = false;
        self.screen = Screen::Input;
        self.mark_dirty();
        effects
    }

    fn watch(&mut self, job_id: JobId) -> Vec<Effect> {
        self.job = Some(Job::new(job_id.clone()));
        self.screen = Screen::Progress;
        self.polling = true;
        self.subscribed = true;
        self.mark_dirty();
        vec![
            Effect::StartPolling {
                job_id: job_id.clone(),
            },
            Effect::Subscribe { job_id },
        ]
    }

    fn ensure_subscribed(&mut self, job_id: &JobId, effects: &mut Vec<Effect>) {
        if !self.subscribed {
            self.subscribed = true;
            effects.push(Effect::Subscribe {
                job_id: job_id.clone(),
            });
        }
    }

    fn apply_push(&mut self, event: PushEvent) -> Vec<Effect> {
        match event {
            PushEvent::Connected(_) => Vec::new(),
            PushEvent::ProgressUpdate(data) => {
                if !self.tracking(&data.job_id) {
                    tracing::debug!(job_id = %data.job_id, "Discarding stale progress update");
                    return Vec::new();
                }
                let changed = self.job.as_mut().map_or(false, |job| {
                    job.apply_report(data.progress, data.message.as_deref(), data.status)
                });
                if changed {
                    self.mark_dirty();
                }
                match data.status {
                    Some(JobStatus::Error) => {
                        let message = data.message.unwrap_or_else(|| FAILED_MESSAGE.to_string());
                        self.fail(message)
                    }
                    Some(JobStatus::Completed) if !self.awaiting_clip => {
                        self.awaiting_clip = true;
                        vec![Effect::FetchStatus { job_id: data.job_id }]
                    }
                    _ => Vec::new(),
                }
            }
            PushEvent::ClipCompleted(data) => {
                if !self.tracking(&data.job_id) {
                    tracing::debug!(job_id = %data.job_id, "Discarding stale completion");
                    return Vec::new();
                }
                self.complete(data.into_clip())
            }
            PushEvent::RegenerationUpdate(data) => {
                if !self.regeneration_matches(&data.job_id, data.regeneration_job_id.as_deref()) {
                    return Vec::new();
                }
                if let Some(regeneration) = self.regeneration.as_mut() {
                    let reported = clamp_percent(data.progress);
                    if reported >= regeneration.progress {
                        regeneration.progress = reported;
                        if let Some(message) = data.message.filter(|m| !m.is_empty()) {
                            regeneration.message = message;
                        }
                    }
                    if regeneration.id.is_none() {
                        regeneration.id = data.regeneration_job_id;
                    }
                }
                self.mark_dirty();
                Vec::new()
            }
            PushEvent::RegenerationComplete(data) => {
                if !self.regeneration_matches(&data.job_id, data.regeneration_job_id.as_deref()) {
                    return Vec::new();
                }
                self.regeneration = None;
                self.mark_dirty();
                let message = data
                    .message
                    .unwrap_or_else(|| "Video regenerated successfully!".to_string());
                vec![
                    Effect::notify_success(message),
                    Effect::RefreshVideo { job_id: data.job_id },
                ]
            }
            PushEvent::RegenerationError(data) => {
                if !self.regeneration_matches(&data.job_id, data.regeneration_job_id.as_deref()) {
                    return Vec::new();
                }
                self.regeneration = None;
                self.mark_dirty();
                vec![Effect::notify_error(format!("Regeneration failed: {}", data.error))]
            }
            PushEvent::UploadProgress(data) => {
                let for_us = match (&data.job_id, self.job_id()) {
                    (Some(event_job), Some(active)) => event_job == active,
                    (None, Some(_)) => true,
                    _ => false,
                };
                if for_us {
                    self.advance_upload(Platform::Youtube, None, data.progress, None);
                }
                Vec::new()
            }
            PushEvent::TiktokUploadProgress(TiktokProgressData {
                upload_job_id,
                progress,
                message,
            }) => {
                self.advance_upload(Platform::Tiktok, Some(&upload_job_id), progress, message);
                Vec::new()
            }
            PushEvent::TiktokUploadComplete(TiktokCompleteData {
                upload_job_id,
                share_url,
                message,
            }) => {
                if !self.tiktok_upload_matches(&upload_job_id) {
                    return Vec::new();
                }
                self.finish_upload(UploadOutcome::Published { url: share_url });
                let message = message.unwrap_or_else(|| "Uploaded to TikTok".to_string());
                vec![Effect::notify_success(message)]
            }
            PushEvent::TiktokUploadError(TiktokErrorData {
                upload_job_id,
                error,
            }) => {
                if !self.tiktok_upload_matches(&upload_job_id) {
                    return Vec::new();
                }
                self.fail_upload(error)
            }
        }
    }

    fn apply_snapshot(&mut self, job_id: &JobId, snapshot: JobSnapshot) -> Vec<Effect> {
        if !self.tracking(job_id) {
            tracing::debug!(job_id = %job_id, "Discarding stale status snapshot");
            return Vec::new();
        }
        let changed = self.job.as_mut().map_or(false, |job| {
            job.apply_report(snapshot.progress, snapshot.message.as_deref(), Some(snapshot.status))
        });
        if changed {
            self.mark_dirty();
        }

        match snapshot.status {
            JobStatus::Error => {
                let error = snapshot
                    .error
                    .or(snapshot.message)
                    .unwrap_or_else(|| FAILED_MESSAGE.to_string());
                self.fail(error)
            }
            JobStatus::Completed => match snapshot.clip_data {
                Some(clip) => self.complete(clip),
                // Polling continues until the clip data shows up
                None => Vec::new(),
            },
            JobStatus::Pending | JobStatus::Processing => Vec::new(),
        }
    }

    /// Success finalize: Progress -> Edit, once.
    fn complete(&mut self, clip: ClipDescriptor) -> Vec<Effect> {
        let mut effects = self.stop_watching();
        if let Some(job) = self.job.as_mut() {
            job.apply_report(100.0, Some(COMPLETED_MESSAGE), Some(JobStatus::Completed));
        }
        self.clip = Some(clip);
        self.screen = Screen::Edit;
        self.mark_dirty();
        effects.push(Effect::notify_success(COMPLETED_MESSAGE));
        effects
    }

    /// Error finalize: back to Input with the server's message.
    fn fail(&mut self, error: String) -> Vec<Effect> {
        let mut effects = self.stop_watching();
        if let Some(job) = self.job.as_mut() {
            job.status = JobStatus::Error;
            job.error = Some(error.clone());
        }
        self.screen = Screen::Input;
        self.mark_dirty();
        effects.push(Effect::notify_error(error));
        effects
    }

    fn stop_watching(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if std::mem::take(&mut self.polling) {
            effects.push(Effect::StopPolling);
        }
        if std::mem::take(&mut self.subscribed) {
            effects.push(Effect::Unsubscribe);
        }
        self.awaiting_clip = false;
        effects
    }

    fn request_regeneration(&mut self, edits: Vec<CaptionEdit>) -> Vec<Effect> {
        let job_id = match (self.screen, self.job_id(), self.clip.is_some()) {
            (Screen::Edit, Some(job_id), true) => job_id.clone(),
            _ => return vec![Effect::notify_error("No clip data available")],
        };
        if self.regeneration.is_some() {
            return vec![Effect::notify_error("A caption update is already in progress")];
        }
        if edits.is_empty() {
            return vec![Effect::notify_error("No caption changes to submit")];
        }

        // The server rebuilds the caption track from whatever it receives
        let captions = match self.clip.as_mut() {
            Some(clip) => {
                clip.apply_edits(&edits);
                clip.caption_edits()
            }
            None => return vec![Effect::notify_error("No clip data available")],
        };
        self.regeneration = Some(Regeneration {
            id: None,
            progress: 0,
            message: "Regenerating video...".to_string(),
        });
        self.mark_dirty();

        let mut effects = Vec::with_capacity(2);
        self.ensure_subscribed(&job_id, &mut effects);
        effects.push(Effect::SubmitCaptions { job_id, captions });
        effects
    }

    fn regeneration_matches(&self, job_id: &JobId, regeneration_id: Option<&str>) -> bool {
        let Some(regeneration) = self.regeneration.as_ref() else {
            return false;
        };
        if !self.editing(job_id) {
            tracing::debug!(job_id = %job_id, "Discarding regeneration event for another job");
            return false;
        }
        match (regeneration.id.as_deref(), regeneration_id) {
            (Some(ours), Some(theirs)) => ours == theirs,
            _ => true,
        }
    }

    fn request_upload(&mut self, request: UploadRequest) -> Vec<Effect> {
        let job_id = match (self.screen, self.job_id(), self.clip.is_some()) {
            (Screen::Upload, Some(job_id), true) => job_id.clone(),
            _ => return vec![Effect::notify_error("No clip ready for upload")],
        };
        if self.upload.as_ref().map_or(false, UploadState::in_flight) {
            return vec![Effect::notify_error("An upload is already in progress")];
        }
        if request.title().trim().is_empty() {
            return vec![Effect::notify_error("Title is required")];
        }

        let platform = request.platform();
        self.upload = Some(UploadState {
            platform,
            upload_job_id: None,
            progress: 0,
            message: format!("Uploading to {}...", platform),
            outcome: None,
        });
        self.mark_dirty();

        let mut effects = Vec::with_capacity(2);
        if platform == Platform::Tiktok {
            self.ensure_subscribed(&job_id, &mut effects);
        }
        effects.push(Effect::Upload { job_id, request });
        effects
    }

    fn accept_upload(&mut self, receipt: UploadReceipt) -> Vec<Effect> {
        let Some(upload) = self.upload.as_mut().filter(|upload| upload.in_flight()) else {
            return Vec::new();
        };
        match receipt {
            UploadReceipt::Published { url, message } => {
                let message = message.unwrap_or_else(|| format!("Uploaded to {}", upload.platform));
                self.finish_upload(UploadOutcome::Published { url: Some(url) });
                vec![Effect::notify_success(message)]
            }
            UploadReceipt::Queued { upload_job_id } => {
                upload.upload_job_id = Some(upload_job_id);
                self.mark_dirty();
                Vec::new()
            }
        }
    }

    fn advance_upload(
        &mut self,
        platform: Platform,
        upload_job_id: Option<&str>,
        progress: f64,
        message: Option<String>,
    ) {
        let Some(upload) = self.upload.as_mut() else {
            return;
        };
        if !upload.in_flight() || upload.platform != platform {
            return;
        }
        if let Some(theirs) = upload_job_id {
            match upload.upload_job_id.as_deref() {
                Some(ours) if ours != theirs => return,
                Some(_) => {}
                // Progress can beat the HTTP response that names the upload job
                None => upload.upload_job_id = Some(theirs.to_string()),
            }
        }
        let reported = clamp_percent(progress);
        if reported >= upload.progress {
            upload.progress = reported;
            if let Some(message) = message.filter(|m| !m.is_empty()) {
                upload.message = message;
            }
            self.mark_dirty();
        }
    }

    fn tiktok_upload_matches(&self, upload_job_id: &str) -> bool {
        self.upload.as_ref().map_or(false, |upload| {
            upload.in_flight()
                && upload.platform == Platform::Tiktok
                && upload.upload_job_id.as_deref().map_or(true, |ours| ours == upload_job_id)
        })
    }

    fn finish_upload(&mut self, outcome: UploadOutcome) {
        if let Some(upload) = self.upload.as_mut() {
            if matches!(outcome, UploadOutcome::Published { .. }) {
                upload.progress = 100;
            }
            upload.outcome = Some(outcome);
            self.mark_dirty();
        }
    }

    fn fail_upload(&mut self, error: String) -> Vec<Effect> {
        if !self.upload.as_ref().map_or(false, UploadState::in_flight) {
            return Vec::new();
        }
        self.finish_upload(UploadOutcome::Failed {
            error: error.clone(),
        });
        vec![Effect::notify_error(format!("Upload failed: {}", error))]
    }
}
