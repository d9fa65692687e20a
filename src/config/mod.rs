use crate::services::progress::ProgressMode;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Chunk size used when reading a payload (default: 2 KB)
pub const DEFAULT_CHUNK_SIZE: usize = 2048;

/// Largest file the client will send (200 MB)
pub const MAX_FILE_SIZE: u64 = 200 * 1024 * 1024;

/// Upload client configuration
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Base URL of the upload API (default: "http://127.0.0.1:3000/user_details/")
    pub base_url: String,

    /// Upload endpoint, relative to `base_url` (default: "uploader.php")
    pub upload_path: String,

    /// Multipart field carrying the file (default: "fileToUpload")
    pub field_name: String,

    /// File name stem sent with the part; the extension comes from the content type
    /// (default: "openFile")
    pub file_stem: String,

    /// Bytes read per chunk (default: 2048)
    pub chunk_size: usize,

    /// When progress is reported relative to each chunk (default: complete)
    pub progress_mode: ProgressMode,

    /// Minimum gap between notifications for stream payloads (default: 150 ms)
    pub progress_interval: Duration,

    /// Where staged copies are written before upload
    pub cache_dir: PathBuf,

    /// Maximum file size in bytes (default: 200 MB)
    pub max_file_size: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000/user_details/".to_string(),
            upload_path: "uploader.php".to_string(),
            field_name: "fileToUpload".to_string(),
            file_stem: "openFile".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress_mode: ProgressMode::Complete,
            progress_interval: Duration::from_millis(150),
            cache_dir: env::temp_dir().join("upload-progress"),
            max_file_size: MAX_FILE_SIZE,
        }
    }
}

impl UploadConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source, falling back to defaults
    /// for missing or unparsable entries.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        let progress_mode = lookup("UPLOAD_PROGRESS_MODE")
            .and_then(|v| v.parse().ok())
            .unwrap_or(default.progress_mode);

        // legacy reporting posts every chunk unless an interval is asked for
        let default_interval = match progress_mode {
            ProgressMode::Legacy => Duration::ZERO,
            ProgressMode::Complete => default.progress_interval,
        };

        Self {
            base_url: lookup("UPLOAD_BASE_URL").unwrap_or(default.base_url),

            upload_path: lookup("UPLOAD_PATH").unwrap_or(default.upload_path),

            field_name: lookup("UPLOAD_FIELD_NAME").unwrap_or(default.field_name),

            file_stem: lookup("UPLOAD_FILE_STEM").unwrap_or(default.file_stem),

            chunk_size: lookup("UPLOAD_CHUNK_SIZE")
                .and_then(|v| v.parse().ok())
                .filter(|&size: &usize| size > 0)
                .unwrap_or(default.chunk_size),

            progress_mode,

            progress_interval: lookup("UPLOAD_PROGRESS_INTERVAL_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(default_interval),

            cache_dir: lookup("UPLOAD_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.cache_dir),

            max_file_size: lookup("UPLOAD_MAX_FILE_SIZE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),
        }
    }

    /// Create config for development (local endpoint, no throttling)
    pub fn development() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000/user_details/".to_string(),
            progress_interval: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Create config that reports progress exactly like the mobile client did:
    /// each notification lags one chunk behind and 100% is never posted.
    pub fn legacy() -> Self {
        Self {
            progress_mode: ProgressMode::Legacy,
            progress_interval: Duration::ZERO,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = UploadConfig::default();
        assert_eq!(config.chunk_size, 2048);
        assert_eq!(config.field_name, "fileToUpload");
        assert_eq!(config.file_stem, "openFile");
        assert_eq!(config.progress_mode, ProgressMode::Complete);
        assert_eq!(config.progress_interval, Duration::from_millis(150));
        assert_eq!(config.max_file_size, 200 * 1024 * 1024);
    }

    #[test]
    fn test_legacy_config() {
        let config = UploadConfig::legacy();
        assert_eq!(config.progress_mode, ProgressMode::Legacy);
        assert_eq!(config.progress_interval, Duration::ZERO);
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("UPLOAD_BASE_URL", "https://uploads.example.test/api/"),
            ("UPLOAD_CHUNK_SIZE", "4096"),
            ("UPLOAD_PROGRESS_MODE", "legacy"),
            ("UPLOAD_PROGRESS_INTERVAL_MS", "0"),
        ]
        .into_iter()
        .collect();

        let config = UploadConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.base_url, "https://uploads.example.test/api/");
        assert_eq!(config.upload_path, "uploader.php");
        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.progress_mode, ProgressMode::Legacy);
        assert_eq!(config.progress_interval, Duration::ZERO);
    }

    #[test]
    fn test_from_lookup_legacy_reports_every_chunk() {
        let config = UploadConfig::from_lookup(|key| match key {
            "UPLOAD_PROGRESS_MODE" => Some("legacy".to_string()),
            _ => None,
        });
        assert_eq!(config.progress_mode, ProgressMode::Legacy);
        assert_eq!(config.progress_interval, Duration::ZERO);

        let config = UploadConfig::from_lookup(|key| match key {
            "UPLOAD_PROGRESS_MODE" => Some("legacy".to_string()),
            "UPLOAD_PROGRESS_INTERVAL_MS" => Some("250".to_string()),
            _ => None,
        });
        assert_eq!(config.progress_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_from_lookup_max_file_size() {
        let config = UploadConfig::from_lookup(|key| match key {
            "UPLOAD_MAX_FILE_SIZE" => Some("1048576".to_string()),
            _ => None,
        });
        assert_eq!(config.max_file_size, 1024 * 1024);

        let config = UploadConfig::from_lookup(|key| match key {
            "UPLOAD_MAX_FILE_SIZE" => Some("lots".to_string()),
            _ => None,
        });
        assert_eq!(config.max_file_size, MAX_FILE_SIZE);
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        let config = UploadConfig::from_lookup(|key| match key {
            "UPLOAD_CHUNK_SIZE" => Some("0".to_string()),
            "UPLOAD_PROGRESS_MODE" => Some("sometimes".to_string()),
            _ => None,
        });
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.progress_mode, ProgressMode::Complete);
    }
}
