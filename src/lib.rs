pub mod config;
pub mod error;
pub mod services;
pub mod utils;

pub use crate::config::UploadConfig;
pub use crate::error::UploadError;
pub use crate::services::dispatcher::{Dispatcher, MainLoop, MainLoopHandle, Task};
pub use crate::services::payload::{FilePayload, StreamPayload};
pub use crate::services::progress::{ProgressError, ProgressListener, ProgressMode, Reporter};
pub use crate::services::uploader::{UploadedItem, Uploader, UploaderResponse};
