use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    #[error("No file extension known for content type: {0}")]
    UnknownExtension(String),

    #[error("File size {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("Invalid upload URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upload failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Upload rejected ({status_code}): {message}")]
    Rejected { status_code: i32, message: String },

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl UploadError {
    /// The I/O error kind behind this failure, `Other` for non-I/O failures.
    pub fn io_kind(&self) -> std::io::ErrorKind {
        match self {
            UploadError::Io(e) => e.kind(),
            _ => std::io::ErrorKind::Other,
        }
    }
}
