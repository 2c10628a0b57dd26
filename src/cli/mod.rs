use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::upload::{TiktokPrivacy, TiktokUploadMode, YoutubePrivacy};

#[derive(Parser, Debug)]
#[command(
    name = "clipper",
    about = "Clipper - Generate viral clips from YouTube videos and follow them to publication",
    version,
    long_about = "A command-line client for the viral clip service. Submits a YouTube video, follows the generation job live (push events with a polling fallback), lets you correct captions and re-render, and uploads the finished clip to YouTube or TikTok."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (defaults to ./clipper.yaml or the user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Clip service base URL, overriding the configuration file
    #[arg(long, global = true, env = "CLIPPER_SERVER", value_name = "URL")]
    pub server: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a clip from a YouTube video and wait for it
    Generate {
        /// YouTube video URL
        #[arg(value_name = "URL")]
        url: String,

        /// Clip length in seconds (10-60, default from configuration)
        #[arg(short, long, value_name = "SECONDS")]
        duration: Option<u32>,

        /// Manual start time (MM:SS or seconds); auto-detected when omitted
        #[arg(long, value_name = "TIME")]
        start: Option<String>,

        /// Manual end time (MM:SS or seconds)
        #[arg(long, value_name = "TIME")]
        end: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Follow a job that is already running
    Resume {
        /// Job id printed by `generate`
        job_id: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the current state of a job once
    Status {
        job_id: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Submit caption corrections and wait for the clip to re-render
    Captions {
        job_id: String,

        /// JSON file with edits: [{"index": 0, "text": "...", "speaker": "Speaker 1"}]
        #[arg(long, value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Upload a finished clip
    Upload {
        job_id: String,

        #[command(subcommand)]
        target: UploadTarget,
    },

    /// Show or initialise configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum UploadTarget {
    /// Upload to YouTube (Shorts)
    Youtube {
        /// Video title (suggested from the source video when omitted)
        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Privacy status (default from configuration)
        #[arg(long, value_enum)]
        privacy: Option<YoutubePrivacyArg>,
    },

    /// Upload to TikTok
    Tiktok {
        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long, value_enum, default_value = "self-only")]
        privacy: TiktokPrivacyArg,

        /// Publish directly instead of saving a draft
        #[arg(long)]
        direct: bool,

        #[arg(long)]
        no_comments: bool,

        #[arg(long)]
        no_duet: bool,

        #[arg(long)]
        no_stitch: bool,
    },
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum YoutubePrivacyArg {
    Public,
    Unlisted,
    Private,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum TiktokPrivacyArg {
    Public,
    Friends,
    SelfOnly,
}

impl From<YoutubePrivacyArg> for YoutubePrivacy {
    fn from(arg: YoutubePrivacyArg) -> Self {
        match arg {
            YoutubePrivacyArg::Public => YoutubePrivacy::Public,
            YoutubePrivacyArg::Unlisted => YoutubePrivacy::Unlisted,
            YoutubePrivacyArg::Private => YoutubePrivacy::Private,
        }
    }
}

impl From<TiktokPrivacyArg> for TiktokPrivacy {
    fn from(arg: TiktokPrivacyArg) -> Self {
        match arg {
            TiktokPrivacyArg::Public => TiktokPrivacy::PublicToEveryone,
            TiktokPrivacyArg::Friends => TiktokPrivacy::MutualFollowFriends,
            TiktokPrivacyArg::SelfOnly => TiktokPrivacy::SelfOnly,
        }
    }
}

pub fn upload_mode(direct: bool) -> TiktokUploadMode {
    if direct {
        TiktokUploadMode::Direct
    } else {
        TiktokUploadMode::Draft
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn generate_accepts_window() {
        let cli = Cli::try_parse_from([
            "clipper", "generate", "https://youtu.be/x", "-d", "20", "--start", "1:00", "--end", "1:20",
        ])
        .unwrap();
        match cli.command {
            Commands::Generate { duration, start, end, .. } => {
                assert_eq!(duration, Some(20));
                assert_eq!(start.as_deref(), Some("1:00"));
                assert_eq!(end.as_deref(), Some("1:20"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn tiktok_privacy_maps_to_wire_values() {
        let cli = Cli::try_parse_from(["clipper", "upload", "j1", "tiktok", "--privacy", "friends", "--direct"]).unwrap();
        match cli.command {
            Commands::Upload {
                target: UploadTarget::Tiktok { privacy, direct, .. },
                ..
            } => {
                assert_eq!(TiktokPrivacy::from(privacy), TiktokPrivacy::MutualFollowFriends);
                assert_eq!(upload_mode(direct), TiktokUploadMode::Direct);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
