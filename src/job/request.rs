use serde::{Deserialize, Serialize};
use url::Url;

/// Allowed clip length in seconds, inclusive
pub const MIN_DURATION: u32 = 10;
pub const MAX_DURATION: u32 = 60;

const YOUTUBE_HOSTS: &[&str] = &["youtube.com", "www.youtube.com", "m.youtube.com", "youtu.be"];

/// A clip generation request as sent to `/api/generate_clip`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipRequest {
    pub url: String,

    /// Clip length in seconds
    pub duration: u32,

    /// Manual start offset, `MM:SS` or seconds
    #[serde(default)]
    pub start_time: Option<String>,

    /// Manual end offset, `MM:SS` or seconds
    #[serde(default)]
    pub end_time: Option<String>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Please enter a valid YouTube URL")]
    InvalidUrl,

    #[error("Duration must be between 10 and 60 seconds (got {0})")]
    DurationOutOfRange(u32),

    #[error("Invalid time format '{0}'. Use MM:SS or seconds")]
    InvalidTimeFormat(String),

    #[error("End time must be after start time")]
    EndNotAfterStart,
}

impl ClipRequest {
    pub fn new(url: impl Into<String>, duration: u32) -> Self {
        Self {
            url: url.into(),
            duration,
            start_time: None,
            end_time: None,
        }
    }

    pub fn with_window(mut self, start: Option<String>, end: Option<String>) -> Self {
        self.start_time = start.filter(|s| !s.trim().is_empty());
        self.end_time = end.filter(|s| !s.trim().is_empty());
        self
    }

    /// Check the request before anything goes on the wire
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !is_youtube_url(&self.url) {
            return Err(ValidationError::InvalidUrl);
        }

        if !(MIN_DURATION..=MAX_DURATION).contains(&self.duration) {
            return Err(ValidationError::DurationOutOfRange(self.duration));
        }

        let start = self.start_time.as_deref().map(parse_offset).transpose()?;
        let end = self.end_time.as_deref().map(parse_offset).transpose()?;

        if let (Some(start), Some(end)) = (start, end) {
            if start >= end {
                return Err(ValidationError::EndNotAfterStart);
            }
        }

        Ok(())
    }
}

fn parse_offset(raw: &str) -> Result<f64, ValidationError> {
    parse_time_to_seconds(raw).ok_or_else(|| ValidationError::InvalidTimeFormat(raw.to_string()))
}

/// Parse `MM:SS` or a plain (possibly fractional) number of seconds.
pub fn parse_time_to_seconds(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some((minutes, seconds)) = raw.split_once(':') {
        let minutes: u32 = minutes.trim().parse().ok()?;
        let seconds: u32 = seconds.trim().parse().ok()?;
        return Some(f64::from(minutes) * 60.0 + f64::from(seconds));
    }

    raw.parse::<f64>().ok().filter(|secs| secs.is_finite() && *secs >= 0.0)
}

fn is_youtube_url(raw: &str) -> bool {
    let Ok(parsed) = Url::parse(raw.trim()) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    parsed
        .host_str()
        .map(|host| YOUTUBE_HOSTS.contains(&host.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_request() {
        assert_eq!(ClipRequest::new("https://youtu.be/abc", 30).validate(), Ok(()));
        assert_eq!(
            ClipRequest::new("https://www.youtube.com/watch?v=abc", 10).validate(),
            Ok(())
        );
    }

    #[test]
    fn rejects_duration_outside_range() {
        assert_eq!(
            ClipRequest::new("https://youtu.be/abc", 5).validate(),
            Err(ValidationError::DurationOutOfRange(5))
        );
        assert_eq!(
            ClipRequest::new("https://youtu.be/abc", 61).validate(),
            Err(ValidationError::DurationOutOfRange(61))
        );
        assert!(ClipRequest::new("https://youtu.be/abc", 60).validate().is_ok());
    }

    #[test]
    fn rejects_non_youtube_urls() {
        for url in ["", "not a url", "ftp://youtube.com/x", "https://vimeo.com/1", "https://notyoutube.com/watch"] {
            assert_eq!(
                ClipRequest::new(url, 30).validate(),
                Err(ValidationError::InvalidUrl),
                "{url}"
            );
        }
    }

    #[test]
    fn end_must_follow_start() {
        let request = ClipRequest::new("https://youtu.be/abc", 30)
            .with_window(Some("1:30".into()), Some("90".into()));
        assert_eq!(request.validate(), Err(ValidationError::EndNotAfterStart));

        let request = ClipRequest::new("https://youtu.be/abc", 30)
            .with_window(Some("1:30".into()), Some("2:00".into()));
        assert_eq!(request.validate(), Ok(()));
    }

    #[test]
    fn malformed_offsets_are_rejected() {
        let request = ClipRequest::new("https://youtu.be/abc", 30)
            .with_window(Some("1:2:3".into()), None);
        assert_eq!(
            request.validate(),
            Err(ValidationError::InvalidTimeFormat("1:2:3".into()))
        );
    }

    #[test]
    fn blank_offsets_are_dropped() {
        let request = ClipRequest::new("https://youtu.be/abc", 30)
            .with_window(Some("  ".into()), Some(String::new()));
        assert_eq!(request.start_time, None);
        assert_eq!(request.end_time, None);
    }

    #[test]
    fn parses_time_formats() {
        assert_eq!(parse_time_to_seconds("2:05"), Some(125.0));
        assert_eq!(parse_time_to_seconds(" 42.5 "), Some(42.5));
        assert_eq!(parse_time_to_seconds("abc"), None);
        assert_eq!(parse_time_to_seconds("-3"), None);
    }
}
