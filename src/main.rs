use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clipper::api::{ClipApi, HttpClipApi, SessionCookies};
use clipper::cli::{upload_mode, Cli, Commands, OutputFormat, UploadTarget};
use clipper::controller::{Msg, Screen, UploadOutcome};
use clipper::events::WsPushChannel;
use clipper::job::{ClipDescriptor, ClipRequest, JobId, JobStatus};
use clipper::output::{self, TerminalObserver};
use clipper::session::Session;
use clipper::upload::{suggested_description, suggested_title, TiktokUpload, UploadRequest, YoutubeUpload};
use clipper::{utils, ClipperError, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "clipper=debug"
    } else if cli.quiet {
        "clipper=warn"
    } else {
        "clipper=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_file = match cli.config.clone() {
        Some(path) => path,
        None => Config::config_path()?,
    };
    let config = Config::load(Some(config_file.as_path()))?.with_server(cli.server.clone())?;
    let cookies = SessionCookies::load(&config.server.base_url, &Config::cookie_path(&config_file))?;

    match cli.command {
        Commands::Generate {
            url,
            duration,
            start,
            end,
            format,
        } => {
            let request = ClipRequest::new(url, duration.unwrap_or(config.app.default_duration))
                .with_window(start, end);
            request.validate().map_err(ClipperError::from)?;

            if let Some(domain) = utils::extract_domain(&request.url) {
                tracing::info!("Generating a {}s clip from {}", request.duration, domain);
            }

            let mut session = new_session(&config, &cookies)?;
            let mut observer = TerminalObserver::new(cli.quiet);
            session.dispatch(Msg::SubmitRequested(request), &mut observer);
            follow_job(&mut session, &mut observer).await?;
            print_finished(&session, &format)?;
        }
        Commands::Resume { job_id, format } => {
            let mut session = new_session(&config, &cookies)?;
            let mut observer = TerminalObserver::new(cli.quiet);
            session.dispatch(Msg::Attach(JobId::new(job_id)), &mut observer);
            follow_job(&mut session, &mut observer).await?;
            print_finished(&session, &format)?;
        }
        Commands::Status { job_id, format } => {
            let api = HttpClipApi::with_cookies(&config.server, cookies.clone())?;
            let job_id = JobId::new(job_id);
            let snapshot = api.job_status(&job_id).await?;
            output::print_snapshot(&job_id, &snapshot, &format)?;
        }
        Commands::Captions {
            job_id,
            file,
            format,
        } => {
            let edits = utils::read_caption_edits(&file)?;
            let job_id = JobId::new(job_id);
            let clip = finished_clip(&config, &cookies, &job_id).await?;

            let mut session = new_session(&config, &cookies)?;
            let mut observer = TerminalObserver::new(cli.quiet);
            session.dispatch(Msg::Restore { job_id, clip }, &mut observer);

            let errors_before = observer.error_count();
            session.dispatch(Msg::RegenerationRequested(edits), &mut observer);
            loop {
                if observer.error_count() > errors_before {
                    let error = observer.last_error().unwrap_or("Caption update failed");
                    return Err(ClipperError::JobFailed(error.to_string()).into());
                }
                let state = session.state();
                let refreshed = state.clip().map_or(false, |clip| clip.video_url.is_some());
                if state.regeneration().is_none() && refreshed {
                    break;
                }
                step(&mut session, &mut observer).await?;
            }

            print_finished(&session, &format)?;
        }
        Commands::Upload { job_id, target } => {
            let job_id = JobId::new(job_id);
            let clip = finished_clip(&config, &cookies, &job_id).await?;
            let request = upload_request(&config, &clip, target);
            let platform = request.platform();

            let mut session = new_session(&config, &cookies)?;
            let mut observer = TerminalObserver::new(cli.quiet);
            session.dispatch(Msg::Restore { job_id, clip }, &mut observer);
            session.dispatch(Msg::ContinueToUpload, &mut observer);

            let errors_before = observer.error_count();
            session.dispatch(Msg::UploadRequested(request), &mut observer);
            let outcome = loop {
                if let Some(outcome) = session.state().upload().and_then(|u| u.outcome.clone()) {
                    break outcome;
                }
                if observer.error_count() > errors_before {
                    let error = observer.last_error().unwrap_or("Upload failed");
                    return Err(ClipperError::JobFailed(error.to_string()).into());
                }
                step(&mut session, &mut observer).await?;
            };

            match outcome {
                UploadOutcome::Published { url } => match url {
                    Some(url) => println!("{}", url),
                    None => println!("Uploaded to {}", platform),
                },
                UploadOutcome::Failed { error } => {
                    return Err(ClipperError::JobFailed(error).into());
                }
            }
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                println!("Configuration file: {}", config_file.display());
                println!("Edit it to change the server or timing; use --show to print it.");
            }
        }
    }

    Ok(())
}

fn new_session(config: &Config, cookies: &SessionCookies) -> Result<Session> {
    let api = Arc::new(HttpClipApi::with_cookies(&config.server, cookies.clone())?);
    let push = Arc::new(
        WsPushChannel::new(config.server.push_url(), config.progress.reconnect())
            .with_cookies(api.cookies().clone()),
    );
    Ok(Session::new(api, push, config.progress.poll_interval()))
}

/// Next session message, or an error when the user interrupts.
async fn step(session: &mut Session, observer: &mut TerminalObserver) -> Result<()> {
    let job_id = session.state().job_id().cloned();
    tokio::select! {
        result = session.step(observer) => result,
        _ = tokio::signal::ctrl_c() => match job_id {
            Some(job_id) => anyhow::bail!("Interrupted; follow the job again with `clipper resume {}`", job_id),
            None => anyhow::bail!("Interrupted"),
        },
    }
}

/// Drive a submitted or attached job until it reaches the editor or fails.
async fn follow_job(session: &mut Session, observer: &mut TerminalObserver) -> Result<()> {
    loop {
        let state = session.state();
        match state.screen() {
            Screen::Edit => return Ok(()),
            Screen::Input if !state.is_submitting() => {
                let error = state
                    .job()
                    .and_then(|job| job.error.clone())
                    .or_else(|| observer.last_error().map(str::to_string))
                    .unwrap_or_else(|| "Clip generation failed".to_string());
                return Err(ClipperError::JobFailed(error).into());
            }
            _ => step(session, observer).await?,
        }
    }
}

fn print_finished(session: &Session, format: &OutputFormat) -> Result<()> {
    let clip = session
        .state()
        .clip()
        .context("Session ended without a clip")?;
    if let Some(job_id) = session.state().job_id() {
        tracing::info!(job_id = %job_id, "Clip ready");
    }
    output::print_clip(clip, format)
}

/// Clip of a completed job, fetched once over HTTP.
async fn finished_clip(config: &Config, cookies: &SessionCookies, job_id: &JobId) -> Result<ClipDescriptor> {
    let api = HttpClipApi::with_cookies(&config.server, cookies.clone())?;
    let snapshot = api.job_status(job_id).await?;
    match (snapshot.status, snapshot.clip_data) {
        (JobStatus::Completed, Some(mut clip)) => {
            // Only a refresh after regeneration sets this
            clip.video_url = None;
            Ok(clip)
        }
        (JobStatus::Error, _) => Err(ClipperError::JobFailed(
            snapshot.error.unwrap_or_else(|| format!("Job {} failed", job_id)),
        )
        .into()),
        (status, _) => anyhow::bail!("Job {} has no finished clip yet (status: {})", job_id, status),
    }
}

fn upload_request(config: &Config, clip: &ClipDescriptor, target: UploadTarget) -> UploadRequest {
    match target {
        UploadTarget::Youtube {
            title,
            description,
            privacy,
        } => UploadRequest::Youtube(YoutubeUpload {
            title: title.unwrap_or_else(|| suggested_title(clip)),
            description: description.unwrap_or_else(|| suggested_description(clip)),
            privacy: privacy.map_or(config.app.default_privacy, Into::into),
        }),
        UploadTarget::Tiktok {
            title,
            description,
            privacy,
            direct,
            no_comments,
            no_duet,
            no_stitch,
        } => UploadRequest::Tiktok(TiktokUpload {
            title: title.unwrap_or_else(|| suggested_title(clip)),
            description: description.unwrap_or_else(|| suggested_description(clip)),
            privacy_level: privacy.into(),
            allow_comments: !no_comments,
            allow_duet: !no_duet,
            allow_stitch: !no_stitch,
            mode: upload_mode(direct),
        }),
    }
}
