//! Streaming transfer of resolved chapters to disk.

use std::path::{Path, PathBuf};

use anyhow::Context;
use futures::StreamExt;
use log::info;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::client::UbookClient;
use crate::error::Result;
use crate::models::Chapter;

/// Stream one chapter's media into `dir`, named after its number and title.
/// Single-shot: a failed transfer is reported, never resumed or retried.
pub async fn download_chapter(
    client: &UbookClient,
    dir: &Path,
    chapter: &Chapter,
    url: &str,
) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    let filename =
        sanitize_filename::sanitize(format!("{:02} - {}.mp3", chapter.number, chapter.title));
    let path = dir.join(filename);

    info!("Downloading chapter {} to {}", chapter.number, path.display());
    let response = client.http().get(url).send().await?.error_for_status()?;

    let mut file = fs::File::create(&path)
        .await
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    file.flush()
        .await
        .with_context(|| format!("failed to flush {}", path.display()))?;

    Ok(path)
}
