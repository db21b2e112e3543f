use anyhow::bail;
use std::path::{Path, PathBuf};
use tokio::fs::{create_dir_all, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use uuid::Uuid;

pub async fn prepare_io(upload_dir: &Path) -> anyhow::Result<()> {
    create_dir_all(upload_dir).await?;
    log::info!("Serving uploads from {}", upload_dir.display());
    Ok(())
}

/// Random file name keeping a short alphanumeric extension from `original`.
pub fn upload_name(original: Option<&str>) -> String {
    let extension = original
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase());
    match extension {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
        None => Uuid::new_v4().to_string(),
    }
}

/// Joins a stored file name onto the upload directory. Names that could
/// escape the directory resolve to `None`.
pub fn stored_path(upload_dir: &Path, name: &str) -> Option<PathBuf> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_');
    if valid {
        Some(upload_dir.join(name))
    } else {
        None
    }
}

pub async fn create_io_file(path: &Path) -> anyhow::Result<File> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent).await?;
    }
    if path.exists() {
        bail!("File already exists!")
    }
    File::create(path).await.map_err(anyhow::Error::from)
}

pub async fn write_io_file(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let mut writer = BufWriter::new(create_io_file(path).await?);
    writer.write_all(bytes).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_io_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    if !path.exists() {
        bail!("Tried to read nonexistent file!")
    }
    let mut bytes = Vec::new();
    BufReader::new(File::open(path).await?)
        .read_to_end(&mut bytes)
        .await?;
    Ok(bytes)
}
