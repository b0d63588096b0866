//! Cookie persistence between runs.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::DateTime;
use log::{error, info, warn};

use crate::error::Result;
use crate::models::CookieRecord;

pub struct CookieStore {
    path: PathBuf,
}

impl CookieStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored cookie set. A missing, empty or corrupt file is not an
    /// error: the caller falls back to interactive login.
    pub fn load(&self) -> Option<Vec<CookieRecord>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("Cookie file {} not readable: {}", self.path.display(), err);
                return None;
            }
        };
        match serde_json::from_str::<Vec<CookieRecord>>(&raw) {
            Ok(cookies) => {
                info!("Loaded {} cookies from {}", cookies.len(), self.path.display());
                Some(cookies)
            }
            Err(err) => {
                error!("Cookie file {} is corrupt: {}", self.path.display(), err);
                None
            }
        }
    }

    /// Serialize the cookie set, replacing any previous content.
    pub fn save(&self, cookies: &[CookieRecord]) -> Result<()> {
        let serialized = serde_json::to_string_pretty(cookies)
            .context("failed to serialize cookies")?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("failed to write cookie file {}", self.path.display()))?;
        info!("Saved {} cookies to {}", cookies.len(), self.path.display());
        Ok(())
    }
}

impl CookieRecord {
    /// Render as a `Set-Cookie` style string suitable for a reqwest jar.
    pub(crate) fn to_set_cookie(&self) -> String {
        let mut cookie = format!(
            "{}={}; Domain={}; Path={}",
            self.name, self.value, self.domain, self.path
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        if let Some(expiry) = self.expiry {
            if let Some(at) = DateTime::from_timestamp(expiry, 0) {
                cookie.push_str(&format!(
                    "; Expires={}",
                    at.format("%a, %d %b %Y %H:%M:%S GMT")
                ));
            }
        }
        cookie
    }

    /// Origin URL the cookie should be registered under.
    pub(crate) fn origin(&self) -> Option<url::Url> {
        let host = self.domain.trim_start_matches('.');
        format!("https://{}/", host).parse().ok()
    }
}
