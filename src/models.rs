use serde::{Deserialize, Serialize};

use crate::error::ResolveFailure;

/// One entry scraped from the favorites page.
#[derive(Debug, Clone)]
pub struct Favorite {
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct AudiobookInfo {
    pub id: String,
    pub title: String,
}

/// RSA material embedded in a title page. The site issues a fresh pair per
/// page load, so a pair must never outlive the page it was scraped from.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub public_key: String,
    pub private_key: String,
}

/// Chapter metadata from the player list, before URL resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub number: u32,
    pub title: String,
    pub duration: String,
}

/// Outcome of resolving one chapter's media URL.
#[derive(Debug)]
pub enum ChapterUrl {
    Resolved(String),
    Failed(ResolveFailure),
}

impl ChapterUrl {
    pub fn url(&self) -> Option<&str> {
        match self {
            ChapterUrl::Resolved(url) => Some(url),
            ChapterUrl::Failed(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct ResolvedChapter {
    pub chapter: Chapter,
    pub url: ChapterUrl,
}

/// Decrypted body of a URL-resolution response.
#[derive(Deserialize, Debug)]
pub(crate) struct UrlPayload {
    pub success: bool,
    pub data: Option<UrlPayloadData>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct UrlPayloadData {
    pub file_url: String,
}

/// One persisted session cookie. Round-trips exactly the fields needed to
/// rebuild a valid session on the next run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "CookieRecord::default_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    /// Unix seconds; session cookies carry no expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<i64>,
}

impl CookieRecord {
    fn default_path() -> String {
        "/".to_string()
    }
}
