use crate::error::{ConsoleError, Result};
use postdisaster_common::SelectedImage;
use std::path::Path;

/// 拡張子とMIMEタイプの対応
const IMAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("bmp", "image/bmp"),
    ("webp", "image/webp"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
];

/// 拡張子からMIMEタイプを判定（大文字小文字は区別しない）
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    IMAGE_EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
}

/// 画像ファイルを読み込んで選択可能な形にする
///
/// 対応拡張子以外と `max_bytes` を超えるファイルは拒否する。
pub fn load_image(path: &Path, max_bytes: u64) -> Result<SelectedImage> {
    if !path.is_file() {
        return Err(ConsoleError::FileNotFound(path.display().to_string()));
    }

    let mime = mime_for_path(path).ok_or_else(|| {
        ConsoleError::InvalidImage(format!(
            "{} (supported: jpg, jpeg, png, gif, bmp, webp, tif, tiff)",
            path.display()
        ))
    })?;

    let size = std::fs::metadata(path)?.len();
    if size > max_bytes {
        return Err(ConsoleError::InvalidImage(format!(
            "{} is {:.1} MB (limit {:.1} MB)",
            path.display(),
            size as f64 / (1024.0 * 1024.0),
            max_bytes as f64 / (1024.0 * 1024.0)
        )));
    }

    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    Ok(SelectedImage::new(name, mime, bytes))
}
