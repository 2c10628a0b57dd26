//! Session driver: owns the controller state and performs its effects.
//!
//! Messages are processed one at a time. Every effect that needs I/O runs in
//! a spawned tokio task which reports back by sending a [`Msg`] on the
//! session's channel; the poll loop and the push subscription each hold a
//! [`CancellationToken`] so `StopPolling`/`Unsubscribe` end them promptly.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::api::{ClipApi, JobSnapshot};
use crate::controller::{
    update, Effect, Msg, Notice, NoticeLevel, SessionState, SessionView, UploadReceipt,
};
use crate::events::PushChannel;
use crate::job::{JobId, JobStatus};
use crate::upload::UploadRequest;
use crate::{describe_error, ClipperError, Result};

/// Receives what the user should see
pub trait Observer: Send {
    /// Called after any message that changed visible state.
    fn render(&mut self, view: &SessionView);

    fn notify(&mut self, notice: &Notice);
}

/// Observer that only logs; for scripted or headless use
#[derive(Debug, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn render(&mut self, view: &SessionView) {
        if let Some(job) = &view.job {
            tracing::debug!(job_id = %job.id, progress = job.progress, "{}", job.message);
        }
    }

    fn notify(&mut self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Error => tracing::warn!("{}", notice.message),
            NoticeLevel::Success | NoticeLevel::Info => tracing::info!("{}", notice.message),
        }
    }
}

pub struct Session {
    api: Arc<dyn ClipApi>,
    push: Arc<dyn PushChannel>,
    poll_interval: Duration,
    state: SessionState,
    tx: mpsc::UnboundedSender<Msg>,
    rx: mpsc::UnboundedReceiver<Msg>,
    poll: Option<CancellationToken>,
    subscription: Option<CancellationToken>,
}

impl Session {
    pub fn new(api: Arc<dyn ClipApi>, push: Arc<dyn PushChannel>, poll_interval: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            api,
            push,
            poll_interval,
            state: SessionState::new(),
            tx,
            rx,
            poll: None,
            subscription: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Handle for feeding messages from outside the session loop
    pub fn sender(&self) -> mpsc::UnboundedSender<Msg> {
        self.tx.clone()
    }

    /// Apply one message and start whatever it asks for.
    pub fn dispatch(&mut self, msg: Msg, observer: &mut dyn Observer) {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;

        for effect in effects {
            self.execute(effect, observer);
        }

        if self.state.consume_dirty() {
            observer.render(&self.state.view());
        }
    }

    /// Wait for the next message and apply it.
    pub async fn step(&mut self, observer: &mut dyn Observer) -> Result<()> {
        let msg = self
            .rx
            .recv()
            .await
            .ok_or_else(|| anyhow::anyhow!("Session channel closed"))?;
        self.dispatch(msg, observer);
        Ok(())
    }

    /// Process incoming messages until `done` holds for the state.
    pub async fn run_until<F>(&mut self, observer: &mut dyn Observer, mut done: F) -> Result<()>
    where
        F: FnMut(&SessionState) -> bool,
    {
        while !done(&self.state) {
            self.step(observer).await?;
        }
        Ok(())
    }

    fn execute(&mut self, effect: Effect, observer: &mut dyn Observer) {
        match effect {
            Effect::CreateJob { submission, request } => {
                let api = Arc::clone(&self.api);
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let msg = match api.generate_clip(&request).await {
                        Ok(created) => {
                            tracing::info!(job_id = %created.job_id, "Job created");
                            Msg::JobCreated {
                                submission,
                                job_id: created.job_id,
                            }
                        }
                        Err(e) => Msg::SubmitFailed {
                            submission,
                            error: describe_error(&e),
                        },
                    };
                    let _ = tx.send(msg);
                });
            }
            Effect::StartPolling { job_id } => {
                cancel(&mut self.poll);
                let token = CancellationToken::new();
                self.poll = Some(token.clone());
                tokio::spawn(poll_loop(
                    Arc::clone(&self.api),
                    job_id,
                    self.poll_interval,
                    self.tx.clone(),
                    token,
                ));
            }
            Effect::StopPolling => cancel(&mut self.poll),
            Effect::Subscribe { job_id } => {
                cancel(&mut self.subscription);
                let token = CancellationToken::new();
                self.subscription = Some(token.clone());
                self.subscribe(job_id, token);
            }
            Effect::Unsubscribe => cancel(&mut self.subscription),
            Effect::FetchStatus { job_id } => {
                let api = Arc::clone(&self.api);
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(status_msg(job_id.clone(), api.job_status(&job_id).await));
                });
            }
            Effect::SubmitCaptions { job_id, captions } => {
                let api = Arc::clone(&self.api);
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let msg = match api.update_captions(&job_id, &captions).await {
                        Ok(response) => Msg::RegenerationStarted {
                            job_id,
                            regeneration_job_id: response.regeneration_job_id,
                        },
                        Err(e) => Msg::RegenerationRejected {
                            job_id,
                            error: describe_error(&e),
                        },
                    };
                    let _ = tx.send(msg);
                });
            }
            Effect::RefreshVideo { job_id } => {
                let api = Arc::clone(&self.api);
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let msg = match api.refresh_video(&job_id).await {
                        Ok(refreshed) => Msg::VideoRefreshed {
                            job_id,
                            clip: refreshed.into_clip(),
                        },
                        Err(e) => Msg::RefreshFailed {
                            job_id,
                            error: describe_error(&e),
                        },
                    };
                    let _ = tx.send(msg);
                });
            }
            Effect::ReleaseJob { job_id } => {
                let api = Arc::clone(&self.api);
                tokio::spawn(async move {
                    if let Err(e) = api.back_to_input(&job_id).await {
                        tracing::warn!(job_id = %job_id, "Failed to release job: {}", describe_error(&e));
                    }
                });
            }
            Effect::Upload { job_id, request } => {
                let api = Arc::clone(&self.api);
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(upload(api.as_ref(), job_id, request).await);
                });
            }
            Effect::Notify(notice) => observer.notify(&notice),
        }
    }

    /// Run the push subscription and forward its events as messages.
    fn subscribe(&self, job_id: JobId, token: CancellationToken) {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let push = Arc::clone(&self.push);
        tokio::spawn(async move {
            push.subscribe(job_id, event_tx, token).await;
        });

        let tx = self.tx.clone();
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                if tx.send(Msg::Push(event)).is_err() {
                    break;
                }
            }
        });
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        cancel(&mut self.poll);
        cancel(&mut self.subscription);
    }
}

fn cancel(token: &mut Option<CancellationToken>) {
    if let Some(token) = token.take() {
        token.cancel();
    }
}

fn status_msg(job_id: JobId, result: Result<JobSnapshot>) -> Msg {
    match result {
        Ok(snapshot) => Msg::PollResult { job_id, snapshot },
        Err(e) => Msg::PollFailed {
            job_id,
            error: describe_error(&e),
        },
    }
}

/// A snapshot after which polling has nothing left to learn.
fn finalizes(snapshot: &JobSnapshot) -> bool {
    match snapshot.status {
        JobStatus::Error => true,
        JobStatus::Completed => snapshot.clip_data.is_some(),
        JobStatus::Pending | JobStatus::Processing => false,
    }
}

async fn poll_loop(
    api: Arc<dyn ClipApi>,
    job_id: JobId,
    period: Duration,
    tx: mpsc::UnboundedSender<Msg>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::debug!(job_id = %job_id, "Polling every {:?}", period);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = api.job_status(&job_id) => result,
        };

        let finished = match &result {
            Ok(snapshot) => finalizes(snapshot),
            Err(e) => {
                tracing::warn!(job_id = %job_id, "Status poll failed: {}", describe_error(e));
                false
            }
        };

        if tx.send(status_msg(job_id.clone(), result)).is_err() || finished {
            break;
        }
    }

    tracing::debug!(job_id = %job_id, "Polling stopped");
}

async fn upload(api: &dyn ClipApi, job_id: JobId, request: UploadRequest) -> Msg {
    let result = match &request {
        UploadRequest::Youtube(youtube) => api
            .upload_to_youtube(&job_id, youtube)
            .await
            .map(|response| UploadReceipt::Published {
                url: response.url,
                message: response.message,
            }),
        UploadRequest::Tiktok(tiktok) => api
            .upload_to_tiktok(&job_id, tiktok)
            .await
            .map(|response| UploadReceipt::Queued {
                upload_job_id: response.upload_job_id,
            }),
    };

    match result {
        Ok(receipt) => Msg::UploadAccepted { job_id, receipt },
        Err(e) => {
            let auth_required = e
                .downcast_ref::<ClipperError>()
                .map_or(false, ClipperError::is_auth_required);
            Msg::UploadFailed {
                job_id,
                error: describe_error(&e),
                auth_required,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{CaptionUpdateResponse, CreateJobResponse, MockClipApi, RefreshedVideo};
    use crate::controller::Screen;
    use crate::events::{ClipCompletedData, ProgressData, PushEvent, RegenerationDoneData};
    use crate::job::{Caption, CaptionEdit, ClipDescriptor, ClipRequest};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const URL: &str = "https://youtu.be/dQw4w9WgXcQ";
    const WAIT: Duration = Duration::from_secs(5);

    /// Push channel that replays a fixed script, then idles until cancelled.
    #[derive(Default)]
    struct ScriptedPush {
        events: Mutex<Vec<PushEvent>>,
        subscriptions: AtomicUsize,
    }

    impl ScriptedPush {
        fn with(events: Vec<PushEvent>) -> Self {
            Self {
                events: Mutex::new(events),
                subscriptions: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PushChannel for ScriptedPush {
        async fn subscribe(
            &self,
            _job_id: JobId,
            sink: mpsc::UnboundedSender<PushEvent>,
            cancel: CancellationToken,
        ) {
            self.subscriptions.fetch_add(1, Ordering::SeqCst);
            let events = std::mem::take(&mut *self.events.lock().unwrap());
            for event in events {
                let _ = sink.send(event);
            }
            cancel.cancelled().await;
        }
    }

    #[derive(Default)]
    struct Recorder {
        notices: Vec<Notice>,
        progress: Vec<u8>,
    }

    impl Observer for Recorder {
        fn render(&mut self, view: &SessionView) {
            if let Some(job) = &view.job {
                self.progress.push(job.progress);
            }
        }

        fn notify(&mut self, notice: &Notice) {
            self.notices.push(notice.clone());
        }
    }

    fn clip() -> ClipDescriptor {
        ClipDescriptor {
            path: Some("/srv/clips/clip_1.mp4".into()),
            optimal_timestamp: 12.0,
            duration: 30.0,
            captions: vec![Caption {
                text: "hello".into(),
                speaker: "Speaker 1".into(),
                start_time: None,
                end_time: None,
                index: None,
            }],
            ..Default::default()
        }
    }

    fn snapshot(status: JobStatus, progress: f64, clip_data: Option<ClipDescriptor>) -> JobSnapshot {
        JobSnapshot {
            job_id: None,
            status,
            progress,
            message: None,
            clip_data,
            error: None,
        }
    }

    fn session(api: MockClipApi, push: ScriptedPush) -> Session {
        Session::new(Arc::new(api), Arc::new(push), Duration::from_millis(10))
    }

    fn created(job_id: &str) -> CreateJobResponse {
        CreateJobResponse {
            job_id: JobId::new(job_id),
            is_anonymous: false,
        }
    }

    async fn run_to(session: &mut Session, observer: &mut Recorder, screen: Screen) {
        tokio::time::timeout(WAIT, session.run_until(observer, |s| s.screen() == screen))
            .await
            .expect("session did not reach the expected screen")
            .unwrap();
    }

    #[tokio::test]
    async fn push_completion_reaches_edit() {
        let mut api = MockClipApi::new();
        api.expect_generate_clip().returning(|_| Ok(created("j1")));
        api.expect_job_status()
            .returning(|_| Ok(snapshot(JobStatus::Processing, 10.0, None)));

        let push = ScriptedPush::with(vec![
            PushEvent::ProgressUpdate(ProgressData {
                job_id: JobId::new("j1"),
                progress: 45.0,
                message: Some("Analyzing".into()),
                status: Some(JobStatus::Processing),
            }),
            PushEvent::ClipCompleted(ClipCompletedData {
                job_id: JobId::new("j1"),
                clip_data: clip(),
                captions: None,
            }),
        ]);

        let mut session = session(api, push);
        let mut recorder = Recorder::default();
        session.dispatch(Msg::SubmitRequested(ClipRequest::new(URL, 30)), &mut recorder);
        run_to(&mut session, &mut recorder, Screen::Edit).await;

        assert_eq!(session.state().clip(), Some(&clip()));
        assert!(!session.state().is_polling());
        assert!(recorder.progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(recorder.progress.last(), Some(&100));
    }

    #[tokio::test]
    async fn polling_alone_reaches_edit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut api = MockClipApi::new();
        api.expect_generate_clip().returning(|_| Ok(created("j1")));
        api.expect_job_status().returning(move |_| {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 => Err(ClipperError::Transport("connection refused".into()).into()),
                1 => Ok(snapshot(JobStatus::Processing, 50.0, None)),
                _ => Ok(snapshot(JobStatus::Completed, 100.0, Some(clip()))),
            }
        });

        let mut session = session(api, ScriptedPush::default());
        let mut recorder = Recorder::default();
        session.dispatch(Msg::SubmitRequested(ClipRequest::new(URL, 30)), &mut recorder);
        run_to(&mut session, &mut recorder, Screen::Edit).await;

        assert!(calls.load(Ordering::SeqCst) >= 3);
        assert!(recorder.notices.iter().all(|n| n.level != NoticeLevel::Error));
    }

    #[tokio::test]
    async fn server_rejection_returns_to_input() {
        let mut api = MockClipApi::new();
        api.expect_generate_clip().returning(|_| {
            Err(ClipperError::Server {
                status: 400,
                message: "Invalid YouTube URL".into(),
            }
            .into())
        });

        let mut session = session(api, ScriptedPush::default());
        let mut recorder = Recorder::default();
        session.dispatch(Msg::SubmitRequested(ClipRequest::new(URL, 30)), &mut recorder);
        tokio::time::timeout(WAIT, session.run_until(&mut recorder, |s| !s.is_submitting()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(session.state().screen(), Screen::Input);
        assert_eq!(recorder.notices.last().unwrap().message, "Invalid YouTube URL");
    }

    #[tokio::test]
    async fn failed_job_surfaces_server_message() {
        let mut api = MockClipApi::new();
        api.expect_generate_clip().returning(|_| Ok(created("j1")));
        api.expect_job_status().returning(|_| {
            Ok(JobSnapshot {
                error: Some("Video unavailable".into()),
                ..snapshot(JobStatus::Error, 20.0, None)
            })
        });

        let mut session = session(api, ScriptedPush::default());
        let mut recorder = Recorder::default();
        session.dispatch(Msg::SubmitRequested(ClipRequest::new(URL, 30)), &mut recorder);
        tokio::time::timeout(
            WAIT,
            session.run_until(&mut recorder, |s| {
                s.job().map_or(false, |job| job.status == JobStatus::Error)
            }),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(session.state().screen(), Screen::Input);
        assert_eq!(recorder.notices.last().unwrap().message, "Video unavailable");
    }

    #[tokio::test]
    async fn regeneration_refreshes_clip() {
        let mut api = MockClipApi::new();
        api.expect_update_captions().times(1).returning(|_, captions| {
            assert_eq!(captions.len(), 1);
            assert_eq!(captions[0].text, "hello world");
            Ok(CaptionUpdateResponse {
                message: None,
                regeneration_job_id: Some("r1".into()),
            })
        });
        api.expect_refresh_video().times(1).returning(|_| {
            Ok(RefreshedVideo {
                video_url: "/clips/clip_1.mp4?v=2".into(),
                clip_data: clip(),
                captions: None,
            })
        });

        let push = ScriptedPush::with(vec![PushEvent::RegenerationComplete(RegenerationDoneData {
            job_id: JobId::new("j1"),
            regeneration_job_id: Some("r1".into()),
            message: None,
        })]);

        let mut session = session(api, push);
        let mut recorder = Recorder::default();
        session.dispatch(
            Msg::Restore {
                job_id: JobId::new("j1"),
                clip: clip(),
            },
            &mut recorder,
        );
        session.dispatch(
            Msg::RegenerationRequested(vec![CaptionEdit {
                index: 0,
                text: "hello world".into(),
                speaker: "Speaker 2".into(),
            }]),
            &mut recorder,
        );

        tokio::time::timeout(
            WAIT,
            session.run_until(&mut recorder, |s| {
                s.clip().and_then(|c| c.video_url.as_deref()) == Some("/clips/clip_1.mp4?v=2")
            }),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(session.state().regeneration().is_none());
        assert_eq!(session.state().screen(), Screen::Edit);
    }

    #[test]
    fn only_finalizing_snapshots_stop_polling() {
        assert!(finalizes(&snapshot(JobStatus::Error, 10.0, None)));
        assert!(finalizes(&snapshot(JobStatus::Completed, 100.0, Some(clip()))));
        assert!(!finalizes(&snapshot(JobStatus::Completed, 100.0, None)));
        assert!(!finalizes(&snapshot(JobStatus::Processing, 90.0, None)));
    }
}
