use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use fern::colors::{Color, ColoredLevelConfig};
use log::{error, info, warn, LevelFilter};

use ubook_dl::client::UbookClient;
use ubook_dl::cookies::CookieStore;
use ubook_dl::error::Result;
use ubook_dl::models::{ChapterUrl, Favorite};
use ubook_dl::{auth, download};

#[derive(Parser, Debug)]
#[command(name = "ubook-dl", version, about = "Download your favorited ubook audio titles")]
struct Cli {
    /// Cookie file used to persist the session between runs
    #[arg(long, default_value = "ubook_cookies.json")]
    cookies: PathBuf,

    /// Directory downloaded chapters are written to
    #[arg(short, long, default_value = "downloads")]
    output: PathBuf,

    /// How many favorited titles to process per run
    #[arg(long, default_value_t = 1)]
    limit: usize,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn setup_logger(verbosity: u8) -> std::result::Result<(), fern::InitError> {
    let level = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let colors = ColoredLevelConfig::new()
        .info(Color::Green)
        .warn(Color::Yellow)
        .error(Color::Red)
        .debug(Color::Magenta);
    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                colors.color(record.level()),
                message
            ))
        })
        .level(LevelFilter::Warn)
        .level_for("ubook_dl", level)
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let store = CookieStore::new(&cli.cookies);
    let client = UbookClient::new()?;
    auth::ensure_login(&client, &store).await?;

    let favorites = client.get_favorites().await;
    if favorites.is_empty() {
        info!("No favorites found.");
        return Ok(());
    }

    let mut processed = 0;
    for favorite in &favorites {
        if processed >= cli.limit {
            break;
        }
        if !favorite.url.contains("/audiobook/") {
            continue;
        }
        if let Err(err) = download_audiobook(&client, favorite, &cli.output).await {
            error!("Failed to process '{}': {}", favorite.title, err);
        }
        processed += 1;
    }
    if processed == 0 {
        info!("No audio titles among the favorites.");
    }
    Ok(())
}

async fn download_audiobook(
    client: &UbookClient,
    favorite: &Favorite,
    output: &std::path::Path,
) -> Result<()> {
    info!("Processing '{}' ({})", favorite.title, favorite.url);
    let book = client.fetch_audiobook_info(&favorite.url).await?;
    let chapters = client.resolve_chapters(&book.id).await?;
    let resolved = chapters.iter().filter(|c| c.url.url().is_some()).count();
    info!("Resolved {}/{} chapter urls", resolved, chapters.len());

    let title_dir = output.join(sanitize_filename::sanitize(&book.title));
    for entry in &chapters {
        match &entry.url {
            ChapterUrl::Resolved(url) => {
                if let Err(err) =
                    download::download_chapter(client, &title_dir, &entry.chapter, url).await
                {
                    error!(
                        "Chapter {} ({}) download failed: {}",
                        entry.chapter.number, entry.chapter.title, err
                    );
                }
            }
            ChapterUrl::Failed(reason) => warn!(
                "Skipping chapter {} ({}): {}",
                entry.chapter.number, entry.chapter.title, reason
            ),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logger(cli.verbose).context("failed to initialize logging")?;

    if let Err(err) = run(cli).await {
        error!("{}", err);
        std::process::exit(1);
    }

    Ok(())
}
