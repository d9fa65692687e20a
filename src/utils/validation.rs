use crate::error::UploadError;
use mime::Mime;
use std::path::Path;

/// Fallback for files whose extension is not in [`EXTENSIONS`]
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Content types the upload client knows an extension for.
/// The first entry for a content type is its canonical extension.
const EXTENSIONS: &[(&str, &str)] = &[
    // Video
    ("video/mp4", "mp4"),
    ("video/mpeg", "mpeg"),
    ("video/webm", "webm"),
    ("video/ogg", "ogv"),
    ("video/quicktime", "mov"),
    ("video/x-msvideo", "avi"),
    ("video/x-matroska", "mkv"),
    ("video/3gpp", "3gp"),
    ("video/mp2t", "ts"),
    // Images
    ("image/jpeg", "jpg"),
    ("image/jpeg", "jpeg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("image/bmp", "bmp"),
    ("image/heic", "heic"),
    // Audio
    ("audio/mpeg", "mp3"),
    ("audio/mp4", "m4a"),
    ("audio/aac", "aac"),
    ("audio/ogg", "ogg"),
    ("audio/wav", "wav"),
    ("audio/flac", "flac"),
    // Documents
    ("application/pdf", "pdf"),
    ("text/plain", "txt"),
    ("application/zip", "zip"),
    ("application/octet-stream", "bin"),
];

/// Parses a content type string such as `video/mp4` or `text/plain; charset=utf-8`.
pub fn parse_content_type(content_type: &str) -> Result<Mime, UploadError> {
    content_type
        .trim()
        .parse::<Mime>()
        .map_err(|_| UploadError::InvalidContentType(content_type.to_string()))
}

/// Canonical file extension for a content type, ignoring parameters.
pub fn extension_for(content_type: &Mime) -> Result<&'static str, UploadError> {
    let essence = content_type.essence_str().to_lowercase();

    EXTENSIONS
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, ext)| *ext)
        .ok_or(UploadError::UnknownExtension(essence))
}

/// Guesses a content type from a file name's extension.
pub fn guess_content_type(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return DEFAULT_CONTENT_TYPE;
    };
    let ext = ext.to_lowercase();

    EXTENSIONS
        .iter()
        .find(|(_, known)| *known == ext)
        .map(|(mime, _)| *mime)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}

/// Name sent in the multipart part: `<stem>.<extension>`.
pub fn upload_file_name(stem: &str, content_type: &Mime) -> Result<String, UploadError> {
    Ok(format!("{}.{}", stem, extension_for(content_type)?))
}
