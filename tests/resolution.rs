//! Fixture-driven walk through the whole resolution pipeline: favorites
//! page -> title page (keys + chapters) -> per-chapter payload outcomes.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rsa::pkcs8::EncodePrivateKey;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use url::Url;

use ubook_dl::client::resolve_payload;
use ubook_dl::html;
use ubook_dl::models::ChapterUrl;

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

fn title_page(private_key_b64: &str) -> String {
    format!(
        r#"<html>
        <head>
            <script>var tracking = true;</script>
            <script>
                player.setup({{
                    publicKey: "opaque-server-token",
                    privateKey: "{private_key_b64}"
                }});
            </script>
        </head>
        <body>
            <h1 class="title">Dom Casmurro</h1>
            <ul id="ubook_player_chapters_list">
                <li>
                    <p class="ubook_player_default_li_title"><a onclick="playChapter(1)">Capítulo 1</a></p>
                    <p class="ubook_player_default_li_desc"><a>duração 12:01</a></p>
                </li>
                <li>
                    <p class="ubook_player_default_li_title"><a onclick="playChapter(2)">Capítulo 2</a></p>
                    <p class="ubook_player_default_li_desc"><a>duração 9:44</a></p>
                </li>
                <li>
                    <p class="ubook_player_default_li_title"><a onclick="playChapter(3)">Capítulo 3</a></p>
                    <p class="ubook_player_default_li_desc"><a>duração 15:30</a></p>
                </li>
            </ul>
        </body>
        </html>"#
    )
}

#[test]
fn favorites_then_chapters_with_partial_resolution() {
    let base: Url = "https://www.ubook.com".parse().unwrap();
    let favorites_page = r#"
        <div class="ProductList">
            <div><a class="title" href="/audiobook/4242/dom-casmurro">Dom Casmurro</a></div>
        </div>"#;
    let favorites = html::parse_favorites(favorites_page, &base);
    assert_eq!(favorites.len(), 1);
    assert!(favorites[0].url.contains("/audiobook/"));

    let (key, key_b64) = test_key();
    let page = title_page(&key_b64);

    let keys = html::extract_keys(&page).unwrap();
    assert_eq!(keys.public_key, "opaque-server-token");

    let chapters = html::parse_chapters(&page);
    assert_eq!(chapters.len(), 3);
    assert_eq!(
        chapters.iter().map(|c| c.number).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    // Per-chapter server responses: two resolvable, one rejected.
    let responses = [
        encrypt(
            &key,
            r#"{"success":true,"data":{"file_url":"https://cdn.example/1.mp3"}}"#,
        ),
        encrypt(&key, r#"{"success":false}"#),
        encrypt(
            &key,
            r#"{"success":true,"data":{"file_url":"https://cdn.example/3.mp3"}}"#,
        ),
    ];

    let outcomes: Vec<ChapterUrl> = responses
        .iter()
        .map(|response| resolve_payload(response, &keys.private_key))
        .collect();

    let resolved: Vec<&str> = outcomes.iter().filter_map(|o| o.url()).collect();
    assert_eq!(resolved, vec!["https://cdn.example/1.mp3", "https://cdn.example/3.mp3"]);
    assert!(outcomes[1].url().is_none());
}
