use chrono::{DateTime, Local};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

const STAGED_NAME_FORMAT: &str = "%Y-%m-%d-%H-%M-%S-%3f";

pub async fn file_size(path: &Path) -> io::Result<u64> {
    Ok(fs::metadata(path).await?.len())
}

/// Buffered copy from `reader` to `writer`, flushing at the end.
pub async fn copy_file<R, W>(reader: R, writer: W) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut writer = BufWriter::new(writer);
    let mut buffer = [0u8; 8192];
    let mut copied = 0u64;

    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buffer[..n]).await?;
        copied += n as u64;
    }
    writer.flush().await?;
    Ok(copied)
}

/// `<yyyy-MM-dd-HH-mm-ss-SSS>.<extension>`
pub fn staged_file_name(extension: &str, at: DateTime<Local>) -> String {
    format!("{}.{}", at.format(STAGED_NAME_FORMAT), extension)
}

/// Copies `source` into `cache_dir` under a timestamped name so the upload
/// reads a snapshot that nothing else writes to. A partial copy is removed.
pub async fn stage_copy(source: &Path, cache_dir: &Path, extension: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(cache_dir).await?;
    let staged = cache_dir.join(staged_file_name(extension, Local::now()));

    let input = File::open(source).await?;
    let output = File::create(&staged).await?;

    match copy_file(input, output).await {
        Ok(copied) => {
            tracing::debug!(
                "Staged {} as {} ({} bytes)",
                source.display(),
                staged.display(),
                copied
            );
            Ok(staged)
        }
        Err(e) => {
            let _ = fs::remove_file(&staged).await;
            Err(e)
        }
    }
}
