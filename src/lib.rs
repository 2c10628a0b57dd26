//! Clipper - a command-line client for the viral clip service
//!
//! The library drives one clip job through the Input → Progress → Edit → Upload
//! flow: it submits the request, follows server push events with an HTTP
//! polling fallback, keeps progress monotonic, and handles caption
//! regeneration and uploads once the clip exists.

pub mod api;
pub mod cli;
pub mod config;
pub mod controller;
pub mod events;
pub mod job;
pub mod output;
pub mod session;
pub mod upload;
pub mod utils;

pub use api::{ClipApi, HttpClipApi};
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use controller::{update, Effect, Msg, Screen, SessionState};
pub use job::{ClipDescriptor, ClipRequest, Job, JobId, JobStatus, ValidationError};
pub use session::Session;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the clip client
#[derive(thiserror::Error, Debug)]
pub enum ClipperError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Server rejected the request ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Could not reach the server: {0}")]
    Transport(String),

    #[error("Unexpected server response: {0}")]
    Protocol(String),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClipperError {
    /// The service wants the user signed in before it will do this.
    pub fn is_auth_required(&self) -> bool {
        matches!(self, ClipperError::Server { status: 401 | 403, .. })
    }

    /// Text suitable for showing to the user as-is.
    pub fn user_message(&self) -> String {
        match self {
            ClipperError::Server { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// User-facing text for any error, preferring the server's own words.
pub fn describe_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ClipperError>() {
        Some(e) => e.user_message(),
        None => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_surface_message_verbatim() {
        let err: anyhow::Error = ClipperError::Server {
            status: 400,
            message: "Invalid YouTube URL".into(),
        }
        .into();
        assert_eq!(describe_error(&err), "Invalid YouTube URL");
    }

    #[test]
    fn auth_statuses_are_recognised() {
        let unauthorized = ClipperError::Server { status: 401, message: String::new() };
        let missing = ClipperError::Server { status: 404, message: String::new() };
        assert!(unauthorized.is_auth_required());
        assert!(!missing.is_auth_required());
    }
}
