use std::path::Path;

use crate::error::{FeedClientError, FeedClientResult};
use crate::models::MediaKind;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "webm"];
const IMAGE_MAX_BYTES: u64 = 5 * 1024 * 1024;
const VIDEO_MAX_BYTES: u64 = 20 * 1024 * 1024;

/// Вложение поста, прочитанное с диска и проверенное до отправки.
#[derive(Debug)]
pub(crate) struct MediaFile {
    pub(crate) file_name: String,
    pub(crate) bytes: Vec<u8>,
}

/// Тип вложения по расширению; сервер принимает только эти форматы.
pub(crate) fn classify(file_name: &str) -> FeedClientResult<MediaKind> {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Ok(MediaKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Ok(MediaKind::Video)
    } else {
        Err(FeedClientError::InvalidRequest(format!(
            "unsupported media type '{file_name}'"
        )))
    }
}

pub(crate) fn check_size(kind: MediaKind, len: u64) -> FeedClientResult<()> {
    let (limit, label) = match kind {
        MediaKind::Image => (IMAGE_MAX_BYTES, "image file too large (max 5MB)"),
        MediaKind::Video => (VIDEO_MAX_BYTES, "video file too large (max 20MB)"),
    };
    if len > limit {
        return Err(FeedClientError::InvalidRequest(label.to_string()));
    }
    Ok(())
}

pub(crate) async fn read_media(path: &Path) -> FeedClientResult<MediaFile> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            FeedClientError::InvalidRequest(format!("invalid media path '{}'", path.display()))
        })?
        .to_string();
    let kind = classify(&file_name)?;

    let unreadable = |err: std::io::Error| {
        FeedClientError::InvalidRequest(format!("cannot read '{}': {err}", path.display()))
    };
    let metadata = tokio::fs::metadata(path).await.map_err(unreadable)?;
    check_size(kind, metadata.len())?;
    let bytes = tokio::fs::read(path).await.map_err(unreadable)?;

    Ok(MediaFile { file_name, bytes })
}
