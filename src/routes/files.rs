use std::path::Path as FsPath;
use std::sync::Arc;

use axum::extract::{Multipart, Path};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Extension;
use serde::Serialize;
use serde_json::{json, Value};

use crate::auth::AdminSession;
use crate::config::Config;
use crate::io::{read_io_file, stored_path, upload_name, write_io_file};
use crate::store::SharedStore;
use crate::{created, proceeds, Created, Error, Payload};

pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Clone, Serialize)]
pub struct Uploaded {
    pub filename: String,
    pub url: String,
}

fn content_type(name: &str) -> &'static str {
    let extension = FsPath::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    match extension {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// Stores the multipart field `file` under a fresh random name.
pub async fn upload(
    admin: AdminSession,
    Extension(config): Extension<Arc<Config>>,
    mut multipart: Multipart,
) -> Created<Uploaded> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::invalid(e.to_string()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = upload_name(field.file_name());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| Error::invalid(e.to_string()))?;
        write_io_file(&config.upload_dir.join(&filename), &bytes).await?;
        log::info!(
            "User `{}` uploaded {} ({} bytes)",
            admin.user.username,
            filename,
            bytes.len()
        );
        return created(Uploaded {
            url: format!("/uploads/{}", filename),
            filename,
        });
    }
    Err(Error::invalid(format!(
        "Multipart field `{}` is missing",
        UPLOAD_FIELD
    )))
}

pub async fn serve(
    Path(name): Path<String>,
    Extension(config): Extension<Arc<Config>>,
) -> Result<impl IntoResponse, Error> {
    let missing = || Error::NotFound {
        message: format!("File `{}` does not exist!", name),
    };
    let path = stored_path(&config.upload_dir, &name).ok_or_else(missing)?;
    if !path.is_file() {
        return Err(missing());
    }
    let bytes = read_io_file(&path).await?;
    Ok(([(header::CONTENT_TYPE, content_type(&name))], bytes))
}

pub async fn health(Extension(store): Extension<SharedStore>) -> Payload<Value> {
    store.ping().await?;
    proceeds(json!({"status": "ok"}))
}
