//! Markup parsing for the favorites page and the audiobook title page.

use log::warn;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{Result, UbookError};
use crate::models::{Chapter, Favorite, KeyPair};

lazy_static! {
    static ref FAVORITE_ITEM: Selector = Selector::parse(".ProductList > div").unwrap();
    static ref FAVORITE_LINK: Selector = Selector::parse("a.title").unwrap();
    static ref PAGE_TITLE: Selector = Selector::parse("h1.title").unwrap();
    static ref SCRIPT: Selector = Selector::parse("script").unwrap();
    static ref CHAPTER_ITEM: Selector = Selector::parse("#ubook_player_chapters_list li").unwrap();
    static ref CHAPTER_TITLE: Selector =
        Selector::parse("p.ubook_player_default_li_title a").unwrap();
    static ref CHAPTER_DESC: Selector =
        Selector::parse("p.ubook_player_default_li_desc a").unwrap();
    static ref PUBLIC_KEY: Regex = Regex::new(r#"publicKey:\s*"([^"]+)""#).unwrap();
    static ref PRIVATE_KEY: Regex = Regex::new(r#"privateKey:\s*"([^"]+)""#).unwrap();
    static ref HANDLER_ARG: Regex = Regex::new(r"\((\d+)\)").unwrap();
}

/// Parse the favorites page into title/URL pairs. Items without the expected
/// title anchor are skipped, they are not an error.
pub fn parse_favorites(html: &str, base_url: &Url) -> Vec<Favorite> {
    let document = Html::parse_document(html);
    let mut favorites = Vec::new();
    for item in document.select(&FAVORITE_ITEM) {
        let link = match item.select(&FAVORITE_LINK).next() {
            Some(link) => link,
            None => continue,
        };
        let href = match link.value().attr("href") {
            Some(href) => href,
            None => continue,
        };
        let url = match base_url.join(href) {
            Ok(url) => url,
            Err(err) => {
                warn!("Skipping favorite with unparseable href {:?}: {}", href, err);
                continue;
            }
        };
        favorites.push(Favorite {
            url: url.into(),
            title: text_of(link),
        });
    }
    favorites
}

pub fn parse_page_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document.select(&PAGE_TITLE).next().map(text_of)
}

/// Recover the session-scoped key pair embedded in a title page.
///
/// Script blocks are scanned in document order; the first one matching both
/// the `publicKey:"..."` and `privateKey:"..."` patterns wins. Without both
/// keys no chapter of this title can be resolved, so absence is fatal.
pub fn extract_keys(html: &str) -> Result<KeyPair> {
    let document = Html::parse_document(html);
    for script in document.select(&SCRIPT) {
        let code = script.text().collect::<String>();
        if !code.contains("publicKey") {
            continue;
        }
        let public = PUBLIC_KEY.captures(&code).map(|c| c[1].to_string());
        let private = PRIVATE_KEY.captures(&code).map(|c| c[1].to_string());
        if let (Some(public_key), Some(private_key)) = (public, private) {
            return Ok(KeyPair {
                public_key,
                private_key,
            });
        }
    }
    Err(UbookError::KeysNotFound)
}

/// Enumerate the chapter list in page order.
///
/// Policy for malformed entries (missing title anchor, missing `onclick`, or
/// a handler argument that is not an integer): skip that single chapter with
/// a warning and keep going. The rest of the title stays downloadable.
pub fn parse_chapters(html: &str) -> Vec<Chapter> {
    let document = Html::parse_document(html);
    let mut chapters = Vec::new();
    for (index, item) in document.select(&CHAPTER_ITEM).enumerate() {
        match parse_chapter_entry(item) {
            Ok(chapter) => chapters.push(chapter),
            Err(reason) => warn!("Skipping malformed chapter entry {}: {}", index + 1, reason),
        }
    }
    chapters
}

fn parse_chapter_entry(item: ElementRef) -> std::result::Result<Chapter, String> {
    let title_link = item
        .select(&CHAPTER_TITLE)
        .next()
        .ok_or("no title anchor")?;
    let onclick = title_link
        .value()
        .attr("onclick")
        .ok_or("title anchor has no onclick handler")?;
    let number = HANDLER_ARG
        .captures(onclick)
        .and_then(|c| c[1].parse::<u32>().ok())
        .ok_or_else(|| format!("handler argument is not an integer: {:?}", onclick))?;
    let duration = item
        .select(&CHAPTER_DESC)
        .next()
        .map(|el| text_of(el).replace("duração", "").trim().to_string())
        .unwrap_or_default();
    Ok(Chapter {
        number,
        title: text_of(title_link),
        duration,
    })
}

fn text_of(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}
