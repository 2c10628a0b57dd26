//! Session cookies shared by the HTTP client and the push channel.
//!
//! The service ties every job to the session cookie it sets on
//! `generate_clip`; status, caption and upload calls are rejected without it,
//! and the push channel uses it to pick the room to join. With a backing file
//! the session outlives a single `clipper` invocation.

use anyhow::{Context, Result};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::Url;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Saved `Cookie` headers, keyed by server origin
type SavedCookies = BTreeMap<String, String>;

#[derive(Clone)]
pub struct SessionCookies {
    jar: Arc<Jar>,
    origin: Url,
    file: Option<PathBuf>,
}

impl SessionCookies {
    /// In-memory cookies for the server at `base_url`
    pub fn new(base_url: &str) -> Result<Self> {
        let origin = Url::parse(base_url)
            .with_context(|| format!("Invalid server URL: {}", base_url))?;
        Ok(Self {
            jar: Arc::new(Jar::default()),
            origin,
            file: None,
        })
    }

    /// Cookies backed by `file`, restoring whatever was saved for this server
    pub fn load(base_url: &str, file: &Path) -> Result<Self> {
        let mut cookies = Self::new(base_url)?;
        if let Some(header) = read_saved(file)?.get(&cookies.key()) {
            for pair in header.split(';').map(str::trim).filter(|p| p.contains('=')) {
                cookies.insert(pair);
            }
            tracing::debug!("Restored session cookies from {}", file.display());
        }
        cookies.file = Some(file.to_path_buf());
        Ok(cookies)
    }

    fn key(&self) -> String {
        self.origin.origin().ascii_serialization()
    }

    /// Add a cookie as the server would set it, e.g. `session=abc`
    pub fn insert(&self, cookie: &str) {
        let cookie = if cookie.to_ascii_lowercase().contains("path=") {
            cookie.to_string()
        } else {
            format!("{}; Path=/", cookie)
        };
        self.jar.add_cookie_str(&cookie, &self.origin);
    }

    pub fn jar(&self) -> Arc<Jar> {
        Arc::clone(&self.jar)
    }

    /// `Cookie` header value the server should receive
    pub fn header(&self) -> Option<String> {
        self.jar
            .cookies(&self.origin)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }

    /// Write the current cookies to the backing file, if there is one
    pub fn save(&self) -> Result<()> {
        let (Some(file), Some(header)) = (self.file.as_deref(), self.header()) else {
            return Ok(());
        };

        let mut saved = read_saved(file)?;
        if saved.get(&self.key()) == Some(&header) {
            return Ok(());
        }
        saved.insert(self.key(), header);

        if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs_err::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(&saved).context("Failed to serialize cookies")?;
        fs_err::write(file, content).context("Failed to write cookie file")?;
        tracing::debug!("Saved session cookies to {}", file.display());
        Ok(())
    }
}

fn read_saved(file: &Path) -> Result<SavedCookies> {
    if !file.exists() {
        return Ok(SavedCookies::new());
    }
    let content = fs_err::read_to_string(file).context("Failed to read cookie file")?;
    if content.trim().is_empty() {
        return Ok(SavedCookies::new());
    }
    serde_yaml::from_str(&content).context("Failed to parse cookie file")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn header_lists_inserted_cookies() {
        let cookies = SessionCookies::new("http://localhost:5000").unwrap();
        assert!(cookies.header().is_none());

        cookies.insert("session=abc");
        assert_eq!(cookies.header().as_deref(), Some("session=abc"));
    }

    #[test]
    fn saved_cookies_survive_a_restart() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("cookies.yaml");

        let cookies = SessionCookies::load("http://localhost:5000", &file).unwrap();
        cookies.insert("session=abc");
        cookies.save().unwrap();

        let restored = SessionCookies::load("http://localhost:5000", &file).unwrap();
        assert_eq!(restored.header().as_deref(), Some("session=abc"));

        // Another server keeps its own session
        let other = SessionCookies::load("https://clips.example.com", &file).unwrap();
        assert!(other.header().is_none());
    }

    #[test]
    fn nothing_is_written_without_cookies() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("cookies.yaml");

        SessionCookies::load("http://localhost:5000", &file)
            .unwrap()
            .save()
            .unwrap();
        assert!(!file.exists());
    }
}
