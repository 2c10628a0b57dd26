use anyhow::{Context, Result};
use std::path::Path;

use crate::job::CaptionEdit;

/// Format seconds as `m:ss`, the way clip timings are shown
pub fn format_mmss(seconds: f64) -> String {
    let total_seconds = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Speaker number from a `Speaker N` label; anything unparseable is speaker 1
pub fn speaker_number(label: &str) -> u32 {
    label
        .trim()
        .strip_prefix("Speaker")
        .and_then(|rest| rest.trim().parse().ok())
        .filter(|n| *n > 0)
        .unwrap_or(1)
}

pub fn speaker_label(number: u32) -> String {
    format!("Speaker {}", number.max(1))
}

/// Read caption edits from a JSON file: `[{"index": 0, "text": "...", "speaker": "Speaker 1"}]`
pub fn read_caption_edits(path: &Path) -> Result<Vec<CaptionEdit>> {
    let content = fs_err::read_to_string(path)
        .context("Failed to read caption edits")?;

    let mut edits: Vec<CaptionEdit> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid caption edits in {}", path.display()))?;

    for edit in &mut edits {
        edit.text = edit.text.trim().to_string();
        edit.speaker = speaker_label(speaker_number(&edit.speaker));
    }

    Ok(edits)
}

/// Extract domain from URL for display purposes
pub fn extract_domain(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()?
        .host_str()
        .map(|host| host.strip_prefix("www.").unwrap_or(host).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_format_mmss() {
        assert_eq!(format_mmss(0.0), "0:00");
        assert_eq!(format_mmss(83.4), "1:23");
        assert_eq!(format_mmss(600.0), "10:00");
        assert_eq!(format_mmss(-3.0), "0:00");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30.0), "30s");
        assert_eq!(format_duration(90.0), "1m 30s");
        assert_eq!(format_duration(3661.0), "1h 1m 1s");
    }

    #[test]
    fn test_speaker_number() {
        assert_eq!(speaker_number("Speaker 3"), 3);
        assert_eq!(speaker_number(" Speaker 12 "), 12);
        assert_eq!(speaker_number("Narrator"), 1);
        assert_eq!(speaker_number("Speaker 0"), 1);
    }

    #[test]
    fn test_read_caption_edits_normalizes() {
        let file = NamedTempFile::new().unwrap();
        fs_err::write(
            file.path(),
            r#"[{"index": 2, "text": "  fixed line ", "speaker": "host"}]"#,
        )
        .unwrap();

        let edits = read_caption_edits(file.path()).unwrap();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].index, 2);
        assert_eq!(edits[0].text, "fixed line");
        assert_eq!(edits[0].speaker, "Speaker 1");
    }

    #[test]
    fn test_read_caption_edits_rejects_garbage() {
        let file = NamedTempFile::new().unwrap();
        fs_err::write(file.path(), "not json").unwrap();
        assert!(read_caption_edits(file.path()).is_err());
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("https://www.youtube.com/watch?v=123"), Some("youtube.com".to_string()));
        assert_eq!(extract_domain("invalid-url"), None);
    }
}
