//! Interactive login through a real Chrome window.
//!
//! Only used when stored cookies are absent or stale. The user completes the
//! login themselves (email/password, Google or Facebook); the run resumes as
//! soon as the favorites page is observed in the tab.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use headless_chrome::protocol::cdp::Network::Cookie as BrowserCookie;
use headless_chrome::{Browser, LaunchOptions, Tab};
use log::info;
use url::Url;

use crate::client::UbookClient;
use crate::cookies::CookieStore;
use crate::error::{Result, UbookError};
use crate::models::CookieRecord;

const LOGIN_TIMEOUT: Duration = Duration::from_secs(3600);
const POLL_INTERVAL: Duration = Duration::from_secs(2);
const FAVORITES_URL_FRAGMENT: &str = "minhaConta/favoritos";
const FAVORITES_NAV_SELECTOR: &str = "a[href*='/minhaConta/favoritos']";

/// Make sure the client carries an authenticated session, interactively if
/// the stored cookies don't cut it. Fresh cookies are persisted on success.
pub async fn ensure_login(client: &UbookClient, store: &CookieStore) -> Result<()> {
    info!("Starting login");
    if let Some(cookies) = store.load() {
        client.install_cookies(&cookies);
        if client.is_logged_in().await {
            info!("Logged in with stored cookies");
            return Ok(());
        }
    }

    info!("Stored cookies are missing or stale, starting interactive login");
    let login_url = client.login_url()?;
    // The poll loop blocks for up to an hour; keep it off the async runtime.
    let cookies = tokio::task::spawn_blocking(move || interactive_login(&login_url))
        .await
        .map_err(|err| UbookError::Other(anyhow!("login task failed: {}", err)))??;

    client.install_cookies(&cookies);
    store.save(&cookies)?;
    Ok(())
}

/// Drive the browser until the user lands on the favorites page, then lift
/// the session cookies out of it.
///
/// The `Browser` value owns the Chrome child process and tears it down when
/// dropped, which covers every exit path out of this function: success,
/// timeout and error alike.
fn interactive_login(login_url: &Url) -> Result<Vec<CookieRecord>> {
    let options = LaunchOptions::default_builder()
        .headless(false)
        .window_size(Some((1920, 1080)))
        .idle_browser_timeout(LOGIN_TIMEOUT + POLL_INTERVAL)
        .build()
        .map_err(|err| UbookError::Other(anyhow!("failed to configure browser: {}", err)))?;
    let browser = Browser::new(options)?;
    let tab = browser.new_tab()?;
    tab.navigate_to(login_url.as_str())?;

    info!("Log into ubook in the browser window (email/password, Google or Facebook).");
    info!("The run continues automatically once you reach the 'Minha Lista' page.");

    let deadline = Instant::now() + LOGIN_TIMEOUT;
    loop {
        if on_favorites_page(&tab) {
            break;
        }
        if Instant::now() >= deadline {
            return Err(UbookError::LoginTimeout(LOGIN_TIMEOUT.as_secs()));
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    info!("Login OK");
    let cookies = tab.get_cookies()?;
    if cookies.is_empty() {
        return Err(UbookError::AuthenticationFailed(
            "browser session carries no cookies".to_string(),
        ));
    }
    Ok(cookies.into_iter().map(to_record).collect())
}

fn on_favorites_page(tab: &Arc<Tab>) -> bool {
    tab.get_url().contains(FAVORITES_URL_FRAGMENT)
        && tab.find_element(FAVORITES_NAV_SELECTOR).is_ok()
}

fn to_record(cookie: BrowserCookie) -> CookieRecord {
    CookieRecord {
        name: cookie.name,
        value: cookie.value,
        domain: cookie.domain,
        path: cookie.path,
        secure: cookie.secure,
        // Chrome reports -1 for session cookies.
        expiry: (cookie.expires > 0.0).then_some(cookie.expires as i64),
    }
}
