use serde::{Deserialize, Serialize};
use std::fmt;

pub mod phase;
pub mod request;

pub use phase::{phase_markers, Phase, PhaseMarker, PhaseState};
pub use request::{parse_time_to_seconds, ClipRequest, ValidationError};

/// Opaque identifier handed out by the clip service for one generation job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Lifecycle status reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    #[serde(alias = "failed")]
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-side view of one generation job
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,

    /// Highest progress percent seen so far, 0..=100
    pub progress: u8,

    pub message: String,
    pub error: Option<String>,
}

impl Job {
    pub fn new(id: JobId) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            progress: 0,
            message: "Initializing...".to_string(),
            error: None,
        }
    }

    /// Fold one progress report into the job.
    ///
    /// The displayed percent only ever moves forward; a report that arrives
    /// late with a lower percent cannot pull it (or its message) back.
    /// Returns `true` when anything visible changed.
    pub fn apply_report(&mut self, progress: f64, message: Option<&str>, status: Option<JobStatus>) -> bool {
        let reported = clamp_percent(progress);
        let mut changed = false;

        if reported >= self.progress {
            if reported > self.progress {
                self.progress = reported;
                changed = true;
            }
            if let Some(message) = message.filter(|m| !m.is_empty()) {
                if self.message != message {
                    self.message = message.to_string();
                    changed = true;
                }
            }
        }

        if let Some(status) = status {
            // A terminal status is sticky for the lifetime of the job
            if !self.status.is_terminal() && self.status != status {
                self.status = status;
                changed = true;
            }
        }

        changed
    }

    pub fn phases(&self) -> [PhaseMarker; 5] {
        phase_markers(self.progress)
    }
}

/// Server percents may be fractional or out of range; NaN maps to 0.
pub fn clamp_percent(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 100.0).floor() as u8
}

/// Descriptor of a finished clip as returned by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ClipDescriptor {
    /// Server-side path of the rendered clip
    #[serde(default)]
    pub path: Option<String>,

    /// Start of the clip within the source video, in seconds
    #[serde(default)]
    pub optimal_timestamp: f64,

    /// Clip length in seconds
    #[serde(default)]
    pub duration: f64,

    #[serde(default)]
    pub detection_confidence: f64,

    #[serde(default)]
    pub auto_detected: bool,

    #[serde(default)]
    pub video_speakers: Option<u32>,

    #[serde(default)]
    pub original_title: Option<String>,

    /// Playable URL, set once the video has been refreshed after regeneration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    #[serde(default)]
    pub captions: Vec<Caption>,

    /// Fields this client does not interpret but must not drop
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ClipDescriptor {
    pub fn start_seconds(&self) -> f64 {
        self.optimal_timestamp
    }

    pub fn end_seconds(&self) -> f64 {
        self.optimal_timestamp + self.duration
    }

    /// URL under which the server publishes the rendered file.
    pub fn playback_url(&self) -> Option<String> {
        if let Some(url) = &self.video_url {
            return Some(url.clone());
        }
        let filename = self.path.as_deref()?.rsplit('/').next()?;
        if filename.is_empty() {
            return None;
        }
        Some(format!("/clips/{}", filename))
    }

    /// Apply caption edits in place. Edits pointing past the caption list are ignored.
    pub fn apply_edits(&mut self, edits: &[CaptionEdit]) -> usize {
        let mut applied = 0;
        for edit in edits {
            if let Some(caption) = self.captions.get_mut(edit.index) {
                caption.text = edit.text.clone();
                caption.speaker = edit.speaker.clone();
                applied += 1;
            }
        }
        applied
    }

    /// Full caption list in submission form, positions as indices
    pub fn caption_edits(&self) -> Vec<CaptionEdit> {
        self.captions
            .iter()
            .enumerate()
            .map(|(index, caption)| CaptionEdit {
                index,
                text: caption.text.clone(),
                speaker: caption.speaker.clone(),
            })
            .collect()
    }
}

/// One caption line of a clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    pub text: String,

    #[serde(default = "default_speaker")]
    pub speaker: String,

    #[serde(default)]
    pub start_time: Option<CaptionTime>,

    #[serde(default)]
    pub end_time: Option<CaptionTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

fn default_speaker() -> String {
    "Speaker 1".to_string()
}

/// Caption offsets arrive either as seconds or as subtitle timestamps
/// (`00:00:01,500` from SRT, `0:00:01.50` from ASS).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CaptionTime {
    Seconds(f64),
    Stamp(String),
}

impl CaptionTime {
    pub fn as_seconds(&self) -> Option<f64> {
        match self {
            CaptionTime::Seconds(secs) => Some(*secs),
            CaptionTime::Stamp(stamp) => parse_subtitle_timestamp(stamp),
        }
    }
}

fn parse_subtitle_timestamp(stamp: &str) -> Option<f64> {
    let normalized = stamp.trim().replace(',', ".");
    let mut total = 0.0;
    for part in normalized.split(':') {
        let value: f64 = part.parse().ok()?;
        if value < 0.0 {
            return None;
        }
        total = total * 60.0 + value;
    }
    Some(total)
}

/// One caption line as submitted for regeneration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionEdit {
    pub index: usize,
    pub text: String,
    pub speaker: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_report_does_not_regress_progress_or_message() {
        let mut job = Job::new(JobId::new("j1"));
        assert!(job.apply_report(45.0, Some("Analyzing"), Some(JobStatus::Processing)));
        assert!(!job.apply_report(40.0, Some("Downloading"), Some(JobStatus::Processing)));
        assert_eq!(job.progress, 45);
        assert_eq!(job.message, "Analyzing");
    }

    #[test]
    fn report_is_clamped_to_percent_range() {
        let mut job = Job::new(JobId::new("j1"));
        job.apply_report(250.0, None, None);
        assert_eq!(job.progress, 100);
        job.apply_report(-5.0, None, None);
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn terminal_status_is_sticky() {
        let mut job = Job::new(JobId::new("j1"));
        job.apply_report(100.0, None, Some(JobStatus::Completed));
        job.apply_report(100.0, None, Some(JobStatus::Processing));
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn status_accepts_failed_alias() {
        let status: JobStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(status, JobStatus::Error);
    }

    #[test]
    fn caption_times_parse_from_numbers_and_stamps() {
        let json = r#"[
            {"text":"hi","speaker":"Speaker 2","start_time":1.5,"end_time":"00:00:03,250"},
            {"text":"there","start_time":"0:01:02.50","end_time":"bogus"}
        ]"#;
        let captions: Vec<Caption> = serde_json::from_str(json).unwrap();
        assert_eq!(captions[0].start_time.as_ref().unwrap().as_seconds(), Some(1.5));
        assert_eq!(captions[0].end_time.as_ref().unwrap().as_seconds(), Some(3.25));
        assert_eq!(captions[1].speaker, "Speaker 1");
        assert_eq!(captions[1].start_time.as_ref().unwrap().as_seconds(), Some(62.5));
        assert_eq!(captions[1].end_time.as_ref().unwrap().as_seconds(), None);
    }

    #[test]
    fn clip_descriptor_keeps_unknown_fields() {
        let json = r#"{"path":"/srv/clips/abc.mp4","optimal_timestamp":75.0,"duration":30.0,
            "detection_confidence":0.82,"auto_detected":true,"subtitle_file":"/srv/abc.ass"}"#;
        let clip: ClipDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(clip.end_seconds(), 105.0);
        assert_eq!(clip.playback_url().as_deref(), Some("/clips/abc.mp4"));
        assert_eq!(clip.extra["subtitle_file"], "/srv/abc.ass");

        let back = serde_json::to_value(&clip).unwrap();
        assert_eq!(back["subtitle_file"], "/srv/abc.ass");
    }

    #[test]
    fn edits_outside_caption_list_are_skipped() {
        let mut clip = ClipDescriptor {
            captions: vec![Caption {
                text: "old".into(),
                speaker: "Speaker 1".into(),
                start_time: None,
                end_time: None,
                index: Some(0),
            }],
            ..Default::default()
        };
        let edits = vec![
            CaptionEdit { index: 0, text: "new".into(), speaker: "Speaker 2".into() },
            CaptionEdit { index: 7, text: "ghost".into(), speaker: "Speaker 1".into() },
        ];
        assert_eq!(clip.apply_edits(&edits), 1);
        assert_eq!(clip.captions[0].text, "new");
        assert_eq!(clip.captions[0].speaker, "Speaker 2");

        let submitted = clip.caption_edits();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0], CaptionEdit { index: 0, text: "new".into(), speaker: "Speaker 2".into() });
    }
}
