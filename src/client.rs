use std::sync::Arc;

use anyhow::Context;
use log::{debug, error, info, warn};
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Url};

use crate::crypto;
use crate::error::{ResolveFailure, Result, UbookError};
use crate::html;
use crate::models::{
    AudiobookInfo, ChapterUrl, CookieRecord, Favorite, KeyPair, ResolvedChapter, UrlPayload,
};

const BASE_URL: &str = "https://www.ubook.com";
const FAVORITES_ENDPOINT: &str = "minhaConta/favoritos";
const RESOLVE_ENDPOINT: &str = "playerExternal/GetUrlFile";
/// Appears on the favorites page only when the session is authenticated.
const LOGGED_IN_MARKER: &str = "Minha Lista";

pub struct UbookClient {
    client: Client,
    jar: Arc<Jar>,
    base_url: Url,
}

impl UbookClient {
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"));
        headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/90.0.4430.212 Safari/537.36"));
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .default_headers(headers)
            .cookie_provider(Arc::clone(&jar))
            .build()
            .context("failed to build the http client")?;
        Ok(Self {
            client,
            jar,
            base_url: BASE_URL.parse().expect("correct base url"),
        })
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    pub fn make_url(&self, endpoint: &str) -> Result<Url> {
        Ok(self
            .base_url
            .join(endpoint)
            .with_context(|| format!("invalid endpoint: {}", endpoint))?)
    }

    pub fn login_url(&self) -> Result<Url> {
        self.make_url("login")
    }

    /// Play a stored cookie set into the live session.
    pub fn install_cookies(&self, cookies: &[CookieRecord]) {
        for cookie in cookies {
            match cookie.origin() {
                Some(origin) => self.jar.add_cookie_str(&cookie.to_set_cookie(), &origin),
                None => warn!("Discarding cookie {:?} with bad domain {:?}", cookie.name, cookie.domain),
            }
        }
    }

    /// Probe the favorites page to decide whether the session is live.
    ///
    /// Both conditions must hold: the request must not have been redirected
    /// away from the favorites path, and the page must carry the account
    /// navigation marker. Transport errors read as "not logged in".
    pub async fn is_logged_in(&self) -> bool {
        let url = match self.make_url(FAVORITES_ENDPOINT) {
            Ok(url) => url,
            Err(_) => return false,
        };
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!("Failed to reach favorites page to verify login: {}", err);
                return false;
            }
        };
        let on_favorites = response.url().path().contains(FAVORITES_ENDPOINT);
        match response.text().await {
            Ok(body) => on_favorites && body.contains(LOGGED_IN_MARKER),
            Err(err) => {
                warn!("Failed to read favorites page body: {}", err);
                false
            }
        }
    }

    /// Fetch and parse the favorites list. A transport failure is logged and
    /// yields an empty list: the caller treats it as "nothing to do".
    pub async fn get_favorites(&self) -> Vec<Favorite> {
        info!("Fetching the favorites list");
        let body = match self.fetch_page(FAVORITES_ENDPOINT).await {
            Ok(body) => body,
            Err(err) => {
                error!("Failed to fetch favorites: {}", err);
                return Vec::new();
            }
        };
        let favorites = html::parse_favorites(&body, &self.base_url);
        info!("Found {} favorites", favorites.len());
        favorites
    }

    pub async fn fetch_audiobook_info(&self, book_url: &str) -> Result<AudiobookInfo> {
        info!("Fetching audiobook info: {}", book_url);
        let url: Url = book_url
            .parse()
            .with_context(|| format!("invalid audiobook url: {}", book_url))?;
        let id = audiobook_id(&url)?;
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.text().await?;
        let title = html::parse_page_title(&body).unwrap_or_else(|| "No title".to_string());
        Ok(AudiobookInfo { id, title })
    }

    /// Resolve every chapter of a title to a media URL, or a typed failure.
    ///
    /// Chapters are resolved strictly in enumeration order, one request at a
    /// time; the endpoint's behavior under concurrent requests is unverified.
    /// A failed chapter never aborts the remaining ones, so the returned list
    /// always covers the full enumeration and callers check per entry.
    pub async fn resolve_chapters(&self, book_id: &str) -> Result<Vec<ResolvedChapter>> {
        let endpoint = format!("audiobook/{}", book_id);
        info!("Fetching chapter list for audiobook {}", book_id);
        let body = self.fetch_page(&endpoint).await?;

        let keys = html::extract_keys(&body)?;
        debug!(
            "Recovered page key pair (public {} chars, private {} chars)",
            keys.public_key.len(),
            keys.private_key.len()
        );

        let chapters = html::parse_chapters(&body);
        info!("Found {} chapters", chapters.len());

        let resolve_url = self.make_url(RESOLVE_ENDPOINT)?;
        let mut resolved = Vec::with_capacity(chapters.len());
        for chapter in chapters {
            let outcome = self
                .resolve_chapter_url(&resolve_url, book_id, chapter.number, &keys)
                .await;
            match &outcome {
                ChapterUrl::Resolved(url) => {
                    info!("Chapter {} ({}): {}", chapter.number, chapter.title, url)
                }
                ChapterUrl::Failed(reason) => {
                    warn!("Chapter {} ({}): {}", chapter.number, chapter.title, reason)
                }
            }
            resolved.push(ResolvedChapter {
                chapter,
                url: outcome,
            });
        }
        Ok(resolved)
    }

    async fn resolve_chapter_url(
        &self,
        resolve_url: &Url,
        book_id: &str,
        chapter_number: u32,
        keys: &KeyPair,
    ) -> ChapterUrl {
        match self
            .request_ciphertext(resolve_url, book_id, chapter_number, &keys.public_key)
            .await
        {
            Ok(ciphertext) => resolve_payload(&ciphertext, &keys.private_key),
            Err(err) => ChapterUrl::Failed(ResolveFailure::Transport(err)),
        }
    }

    async fn request_ciphertext(
        &self,
        url: &Url,
        book_id: &str,
        chapter_number: u32,
        public_key: &str,
    ) -> std::result::Result<String, reqwest::Error> {
        let chapter_id = chapter_number.to_string();
        let form = [
            ("catalog_id", book_id),
            ("chapter_id", chapter_id.as_str()),
            ("publicKey", public_key),
        ];
        self.client
            .post(url.clone())
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }

    async fn fetch_page(&self, endpoint: &str) -> Result<String> {
        let url = self.make_url(endpoint)?;
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Turn one resolution response into a chapter outcome.
///
/// Pure in (response, key): feeding the same response through twice yields
/// the same outcome, no state accumulates anywhere else.
pub fn resolve_payload(ciphertext: &str, private_key: &str) -> ChapterUrl {
    let plaintext = match crypto::decrypt_chapter_payload(ciphertext, private_key) {
        Ok(plaintext) => plaintext,
        Err(err) => return ChapterUrl::Failed(ResolveFailure::Decrypt(err)),
    };
    let payload: UrlPayload = match serde_json::from_str(&plaintext) {
        Ok(payload) => payload,
        Err(err) => return ChapterUrl::Failed(ResolveFailure::MalformedPayload(err)),
    };
    match payload {
        UrlPayload {
            success: true,
            data: Some(data),
        } => ChapterUrl::Resolved(data.file_url),
        _ => ChapterUrl::Failed(ResolveFailure::Rejected),
    }
}

/// The catalog id is the path segment following `audiobook`.
fn audiobook_id(url: &Url) -> Result<String> {
    url.path_segments()
        .and_then(|mut segments| {
            segments
                .find(|segment| *segment == "audiobook")
                .and_then(|_| segments.next())
        })
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| UbookError::PageStructure(format!("no audiobook id in url: {}", url)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use rsa::pkcs8::EncodePrivateKey;
    use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

    fn test_key() -> (RsaPrivateKey, String) {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 2048).expect("keygen");
        let der = key.to_pkcs8_der().expect("pkcs8 der");
        let encoded = BASE64.encode(der.as_bytes());
        (key, encoded)
    }

    fn encrypt(key: &RsaPrivateKey, plaintext: &str) -> String {
        let mut rng = rand::thread_rng();
        let ciphertext = RsaPublicKey::from(key)
            .encrypt(&mut rng, Pkcs1v15Encrypt, plaintext.as_bytes())
            .expect("encrypt");
        BASE64.encode(ciphertext)
    }

    #[test]
    fn successful_payload_resolves_to_file_url() {
        let (key, key_b64) = test_key();
        let ciphertext = encrypt(
            &key,
            r#"{"success":true,"data":{"file_url":"https://example/x.mp3"}}"#,
        );
        let outcome = resolve_payload(&ciphertext, &key_b64);
        assert_eq!(outcome.url(), Some("https://example/x.mp3"));
    }

    #[test]
    fn rejected_payload_stays_unresolved() {
        let (key, key_b64) = test_key();
        let ciphertext = encrypt(&key, r#"{"success":false}"#);
        let outcome = resolve_payload(&ciphertext, &key_b64);
        assert!(matches!(
            outcome,
            ChapterUrl::Failed(ResolveFailure::Rejected)
        ));
    }

    #[test]
    fn invalid_json_payload_stays_unresolved() {
        let (key, key_b64) = test_key();
        let ciphertext = encrypt(&key, "this is not json");
        let outcome = resolve_payload(&ciphertext, &key_b64);
        assert!(matches!(
            outcome,
            ChapterUrl::Failed(ResolveFailure::MalformedPayload(_))
        ));
    }

    #[test]
    fn undecryptable_response_stays_unresolved() {
        let (_, key_b64) = test_key();
        let outcome = resolve_payload("@@not-base64@@", &key_b64);
        assert!(matches!(
            outcome,
            ChapterUrl::Failed(ResolveFailure::Decrypt(_))
        ));
    }

    #[test]
    fn resolution_is_idempotent() {
        let (key, key_b64) = test_key();
        let ciphertext = encrypt(
            &key,
            r#"{"success":true,"data":{"file_url":"https://example/x.mp3"}}"#,
        );
        let first = resolve_payload(&ciphertext, &key_b64);
        let second = resolve_payload(&ciphertext, &key_b64);
        assert_eq!(first.url(), second.url());
    }

    #[test]
    fn audiobook_id_from_url() {
        let url: Url = "https://www.ubook.com/audiobook/4242/dom-casmurro"
            .parse()
            .unwrap();
        assert_eq!(audiobook_id(&url).unwrap(), "4242");

        let url: Url = "https://www.ubook.com/audiobook/4242".parse().unwrap();
        assert_eq!(audiobook_id(&url).unwrap(), "4242");

        let url: Url = "https://www.ubook.com/ebook/9/memorias".parse().unwrap();
        assert!(audiobook_id(&url).is_err());

        let url: Url = "https://www.ubook.com/audiobook/".parse().unwrap();
        assert!(audiobook_id(&url).is_err());
    }
}
