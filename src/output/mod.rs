//! Terminal rendering for sessions, clips and job snapshots.

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::api::JobSnapshot;
use crate::cli::OutputFormat;
use crate::controller::{Notice, NoticeLevel, Screen, SessionView};
use crate::job::{clamp_percent, phase_markers, ClipDescriptor, JobId, PhaseState};
use crate::session::Observer;
use crate::utils::{format_duration, format_mmss};

const BAR_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}";

fn percent_bar(message: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    bar.set_message(message.to_string());
    bar
}

/// Draws the session on the terminal with indicatif progress bars
pub struct TerminalObserver {
    quiet: bool,
    job_bar: Option<ProgressBar>,
    regeneration_bar: Option<ProgressBar>,
    upload_bar: Option<ProgressBar>,
    notices: Vec<Notice>,
}

impl TerminalObserver {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            job_bar: None,
            regeneration_bar: None,
            upload_bar: None,
            notices: Vec::new(),
        }
    }

    /// Every notice shown so far
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn error_count(&self) -> usize {
        self.notices.iter().filter(|n| n.level == NoticeLevel::Error).count()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.notices
            .iter()
            .rev()
            .find(|n| n.level == NoticeLevel::Error)
            .map(|n| n.message.as_str())
    }

    fn clear(bar: &mut Option<ProgressBar>) {
        if let Some(bar) = bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl Observer for TerminalObserver {
    fn render(&mut self, view: &SessionView) {
        match (view.screen, &view.job) {
            (Screen::Progress, Some(job)) => {
                let quiet = self.quiet;
                let bar = self
                    .job_bar
                    .get_or_insert_with(|| percent_bar(&job.message, quiet));
                if u64::from(job.progress) > bar.position() {
                    if let Some(phase) = crate::job::phase::active_phase(job.progress) {
                        bar.println(format!("{} {}", style("▶").cyan(), phase.label()));
                    }
                }
                bar.set_position(u64::from(job.progress));
                bar.set_message(job.message.clone());
            }
            _ => Self::clear(&mut self.job_bar),
        }

        match &view.regeneration {
            Some(regeneration) => {
                let quiet = self.quiet;
                let bar = self
                    .regeneration_bar
                    .get_or_insert_with(|| percent_bar(&regeneration.message, quiet));
                bar.set_position(u64::from(regeneration.progress));
                bar.set_message(regeneration.message.clone());
            }
            None => Self::clear(&mut self.regeneration_bar),
        }

        match view.upload.as_ref().filter(|upload| upload.in_flight()) {
            Some(upload) => {
                let quiet = self.quiet;
                let bar = self
                    .upload_bar
                    .get_or_insert_with(|| percent_bar(&upload.message, quiet));
                bar.set_position(u64::from(upload.progress));
                bar.set_message(upload.message.clone());
            }
            None => Self::clear(&mut self.upload_bar),
        }
    }

    fn notify(&mut self, notice: &Notice) {
        tracing::debug!(level = ?notice.level, "{}", notice.message);
        let line = match notice.level {
            NoticeLevel::Error => format!("{} {}", style("✗").red().bold(), notice.message),
            NoticeLevel::Success => format!("{} {}", style("✓").green().bold(), notice.message),
            NoticeLevel::Info => format!("{} {}", style("ℹ").blue(), notice.message),
        };
        match self.job_bar.as_ref().or(self.regeneration_bar.as_ref()) {
            Some(bar) => bar.suspend(|| eprintln!("{}", line)),
            None if !self.quiet || notice.level == NoticeLevel::Error => eprintln!("{}", line),
            None => {}
        }
        self.notices.push(notice.clone());
    }
}

impl Drop for TerminalObserver {
    fn drop(&mut self) {
        Self::clear(&mut self.job_bar);
        Self::clear(&mut self.regeneration_bar);
        Self::clear(&mut self.upload_bar);
    }
}

/// Step list for a progress percent, one phase per line
pub fn format_phase_list(progress: u8) -> String {
    phase_markers(progress)
        .iter()
        .map(|marker| {
            let (mark, label) = match marker.state {
                PhaseState::Completed => (style("✓").green(), style(marker.phase.label())),
                PhaseState::Active => (style("▶").cyan(), style(marker.phase.label()).bold()),
                PhaseState::Pending => (style("·").dim(), style(marker.phase.label()).dim()),
            };
            format!("  {} {}", mark, label)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Human-readable summary of a finished clip
pub fn format_clip_summary(clip: &ClipDescriptor) -> String {
    let mut lines = vec![
        format!("{}", style("Clip ready").green().bold()),
        format!(
            "  Timing: {} - {}",
            format_mmss(clip.start_seconds()),
            format_mmss(clip.end_seconds())
        ),
        format!("  Duration: {}", format_duration(clip.duration)),
        format!("  Confidence: {:.2}", clip.detection_confidence),
        format!("  Auto-detected: {}", if clip.auto_detected { "Yes" } else { "No" }),
    ];
    if let Some(speakers) = clip.video_speakers {
        lines.push(format!("  Speakers: {}", speakers));
    }
    if let Some(title) = &clip.original_title {
        lines.push(format!("  Source: {}", title));
    }
    if let Some(url) = clip.playback_url() {
        lines.push(format!("  Video: {}", url));
    }

    if !clip.captions.is_empty() {
        lines.push(String::new());
        lines.push(format!("{}", style("Captions").bold()));
        for (index, caption) in clip.captions.iter().enumerate() {
            let at = caption
                .start_time
                .as_ref()
                .and_then(|t| t.as_seconds())
                .map(|secs| format!(" {}", format_mmss(secs)))
                .unwrap_or_default();
            lines.push(format!(
                "  [{}] {}{}: {}",
                index,
                style(&caption.speaker).cyan(),
                at,
                caption.text
            ));
        }
    }

    lines.join("\n")
}

/// One-shot status line plus step list
pub fn format_snapshot(job_id: &JobId, snapshot: &JobSnapshot) -> String {
    let percent = clamp_percent(snapshot.progress);
    let mut text = format!("Job {}: {} {}%", job_id, snapshot.status, percent);
    if let Some(message) = snapshot.message.as_deref().filter(|m| !m.is_empty()) {
        text.push_str(&format!(" - {}", message));
    }
    if let Some(error) = &snapshot.error {
        text.push_str(&format!("\n  Error: {}", error));
    }
    text.push('\n');
    text.push_str(&format_phase_list(percent));
    text
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Print a finished clip to stdout
pub fn print_clip(clip: &ClipDescriptor, format: &OutputFormat) -> Result<()> {
    let content = match format {
        OutputFormat::Text => format_clip_summary(clip),
        OutputFormat::Json => to_json(clip)?,
    };
    println!("{}", content);
    Ok(())
}

/// Print a status snapshot to stdout
pub fn print_snapshot(job_id: &JobId, snapshot: &JobSnapshot, format: &OutputFormat) -> Result<()> {
    let content = match format {
        OutputFormat::Text => format_snapshot(job_id, snapshot),
        OutputFormat::Json => to_json(snapshot)?,
    };
    println!("{}", content);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Caption, CaptionTime, JobStatus};

    fn plain(text: &str) -> String {
        console::strip_ansi_codes(text).into_owned()
    }

    #[test]
    fn clip_summary_shows_timing_and_detection() {
        let clip = ClipDescriptor {
            path: Some("/srv/clips/clip_7.mp4".into()),
            optimal_timestamp: 83.0,
            duration: 30.0,
            detection_confidence: 0.8666,
            auto_detected: true,
            video_speakers: Some(2),
            captions: vec![Caption {
                text: "hello".into(),
                speaker: "Speaker 2".into(),
                start_time: Some(CaptionTime::Stamp("00:00:03,250".into())),
                end_time: None,
                index: None,
            }],
            ..Default::default()
        };

        let summary = plain(&format_clip_summary(&clip));
        assert!(summary.contains("Timing: 1:23 - 1:53"));
        assert!(summary.contains("Duration: 30s"));
        assert!(summary.contains("Confidence: 0.87"));
        assert!(summary.contains("Auto-detected: Yes"));
        assert!(summary.contains("Speakers: 2"));
        assert!(summary.contains("Video: /clips/clip_7.mp4"));
        assert!(summary.contains("[0] Speaker 2 0:03: hello"));
    }

    #[test]
    fn manual_clip_omits_speakers() {
        let summary = plain(&format_clip_summary(&ClipDescriptor::default()));
        assert!(summary.contains("Auto-detected: No"));
        assert!(!summary.contains("Speakers"));
    }

    #[test]
    fn phase_list_marks_states() {
        let list = plain(&format_phase_list(45));
        let lines: Vec<&str> = list.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].contains("✓ Downloading video"));
        assert!(lines[1].contains("▶ Analyzing content"));
        assert!(lines[2].contains("· Identifying speakers"));
    }

    #[test]
    fn snapshot_includes_error() {
        let snapshot = JobSnapshot {
            job_id: None,
            status: JobStatus::Error,
            progress: 20.0,
            message: Some("Downloading".into()),
            clip_data: None,
            error: Some("Video unavailable".into()),
        };
        let text = plain(&format_snapshot(&JobId::new("j1"), &snapshot));
        assert!(text.starts_with("Job j1: error 20% - Downloading"));
        assert!(text.contains("Error: Video unavailable"));
    }
}
