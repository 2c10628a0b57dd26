//! Upload requests for finished clips and the metadata suggested for them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::job::{ClipDescriptor, JobId};

const TITLE_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Tiktok,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Youtube => write!(f, "YouTube"),
            Platform::Tiktok => write!(f, "TikTok"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YoutubePrivacy {
    Public,
    Unlisted,
    #[default]
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TiktokPrivacy {
    PublicToEveryone,
    MutualFollowFriends,
    #[default]
    SelfOnly,
}

/// Whether TikTok publishes directly or leaves the post as a draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TiktokUploadMode {
    Direct,
    #[default]
    Draft,
}

#[derive(Debug, Clone, PartialEq)]
pub struct YoutubeUpload {
    pub title: String,
    pub description: String,
    pub privacy: YoutubePrivacy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TiktokUpload {
    pub title: String,
    pub description: String,
    pub privacy_level: TiktokPrivacy,
    pub allow_comments: bool,
    pub allow_duet: bool,
    pub allow_stitch: bool,
    pub mode: TiktokUploadMode,
}

#[derive(Debug, Serialize)]
pub struct YoutubeUploadBody<'a> {
    job_id: &'a JobId,
    title: &'a str,
    description: &'a str,
    privacy_status: YoutubePrivacy,
}

#[derive(Debug, Serialize)]
pub struct TiktokUploadBody<'a> {
    job_id: &'a JobId,
    title: &'a str,
    description: &'a str,
    privacy_level: TiktokPrivacy,
    allow_comments: bool,
    allow_duet: bool,
    allow_stitch: bool,
    upload_mode: TiktokUploadMode,
}

impl YoutubeUpload {
    pub fn body<'a>(&'a self, job_id: &'a JobId) -> YoutubeUploadBody<'a> {
        YoutubeUploadBody {
            job_id,
            title: self.title.trim(),
            description: self.description.trim(),
            privacy_status: self.privacy,
        }
    }
}

impl TiktokUpload {
    pub fn body<'a>(&'a self, job_id: &'a JobId) -> TiktokUploadBody<'a> {
        TiktokUploadBody {
            job_id,
            title: self.title.trim(),
            description: self.description.trim(),
            privacy_level: self.privacy_level,
            allow_comments: self.allow_comments,
            allow_duet: self.allow_duet,
            allow_stitch: self.allow_stitch,
            upload_mode: self.mode,
        }
    }
}

/// One upload of the current clip to a platform
#[derive(Debug, Clone, PartialEq)]
pub enum UploadRequest {
    Youtube(YoutubeUpload),
    Tiktok(TiktokUpload),
}

impl UploadRequest {
    pub fn platform(&self) -> Platform {
        match self {
            UploadRequest::Youtube(_) => Platform::Youtube,
            UploadRequest::Tiktok(_) => Platform::Tiktok,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            UploadRequest::Youtube(upload) => &upload.title,
            UploadRequest::Tiktok(upload) => &upload.title,
        }
    }
}

/// Title offered for a clip when the user gives none.
pub fn suggested_title(clip: &ClipDescriptor) -> String {
    let original = clip.original_title.as_deref().unwrap_or("Viral Clip");
    let short = if original.chars().count() > TITLE_LIMIT {
        let head: String = original.chars().take(TITLE_LIMIT - 3).collect();
        format!("{}...", head)
    } else {
        original.to_string()
    };
    format!("{} - Viral Moment", short)
}

/// Description offered for a clip when the user gives none.
pub fn suggested_description(clip: &ClipDescriptor) -> String {
    let mut description = format!(
        "Viral clip generated from: {}\n\n",
        clip.original_title.as_deref().unwrap_or("Original Video")
    );
    if clip.auto_detected {
        description.push_str(&format!(
            "Auto-detected at {:.1} min\n",
            clip.optimal_timestamp / 60.0
        ));
    }
    description.push_str("\n#Shorts #Viral #Clips");
    description
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_titles_are_shortened() {
        let clip = ClipDescriptor {
            original_title: Some("x".repeat(80)),
            ..Default::default()
        };
        let title = suggested_title(&clip);
        assert_eq!(title, format!("{}... - Viral Moment", "x".repeat(47)));
    }

    #[test]
    fn missing_title_falls_back() {
        assert_eq!(suggested_title(&ClipDescriptor::default()), "Viral Clip - Viral Moment");
    }

    #[test]
    fn description_mentions_auto_detection() {
        let clip = ClipDescriptor {
            original_title: Some("Podcast #12".into()),
            auto_detected: true,
            optimal_timestamp: 90.0,
            ..Default::default()
        };
        let description = suggested_description(&clip);
        assert!(description.starts_with("Viral clip generated from: Podcast #12\n\n"));
        assert!(description.contains("Auto-detected at 1.5 min\n"));
        assert!(description.ends_with("#Shorts #Viral #Clips"));
    }

    #[test]
    fn tiktok_body_uses_wire_names() {
        let upload = TiktokUpload {
            title: " Clip ".into(),
            description: String::new(),
            privacy_level: TiktokPrivacy::PublicToEveryone,
            allow_comments: true,
            allow_duet: false,
            allow_stitch: false,
            mode: TiktokUploadMode::Direct,
        };
        let job_id = JobId::new("j1");
        let body = serde_json::to_value(upload.body(&job_id)).unwrap();
        assert_eq!(body["job_id"], "j1");
        assert_eq!(body["title"], "Clip");
        assert_eq!(body["privacy_level"], "PUBLIC_TO_EVERYONE");
        assert_eq!(body["upload_mode"], "direct");
    }

    #[test]
    fn youtube_body_uses_privacy_status() {
        let upload = YoutubeUpload {
            title: "Clip".into(),
            description: "desc".into(),
            privacy: YoutubePrivacy::Unlisted,
        };
        let job_id = JobId::new("j1");
        let body = serde_json::to_value(upload.body(&job_id)).unwrap();
        assert_eq!(body["privacy_status"], "unlisted");
    }
}
