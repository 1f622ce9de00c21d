//! Line-delimited JSON files used by the problem dataset and the
//! enrichment checkpoints.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};

/// Reads every record. Blank and malformed lines (a torn tail after a
/// crash mid-append) are skipped with a warning. A missing file reads as
/// empty.
pub async fn read_jsonl<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    read_jsonl_while(path, |_: &T| true, usize::MAX).await
}

/// Streams the file and stops once `limit` records accepted by `keep`
/// have been read.
pub async fn read_jsonl_while<T, F>(path: impl AsRef<Path>, mut keep: F, limit: usize) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    F: FnMut(&T) -> bool,
{
    let path = path.as_ref();
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to open {}", path.display())),
    };

    let mut lines = BufReader::new(file).lines();
    let mut records = Vec::new();
    let mut line_no = 0usize;
    while records.len() < limit {
        let Some(line) = lines
            .next_line()
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?
        else {
            break;
        };
        line_no += 1;

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(line) {
            Ok(record) if keep(&record) => records.push(record),
            Ok(_) => {}
            Err(e) => tracing::warn!(
                "Skipping malformed record at {}:{}: {}",
                path.display(),
                line_no,
                e
            ),
        }
    }

    Ok(records)
}

/// Appends records, one JSON document per line. A file left without a
/// trailing newline gets one first so the torn record stays on its own line.
pub async fn append_jsonl<T: Serialize>(path: impl AsRef<Path>, records: &[T]) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut buffer = String::new();
    if !ends_with_newline(path).await? {
        buffer.push('\n');
    }
    for record in records {
        buffer.push_str(&serde_json::to_string(record)?);
        buffer.push('\n');
    }

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to open {} for append", path.display()))?;
    file.write_all(buffer.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

/// True for a missing or empty file.
async fn ends_with_newline(path: &Path) -> Result<bool> {
    let mut file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e).with_context(|| format!("Failed to open {}", path.display())),
    };
    if file.metadata().await?.len() == 0 {
        return Ok(true);
    }
    file.seek(std::io::SeekFrom::End(-1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] == b'\n')
}
