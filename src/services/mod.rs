pub mod dispatcher;
pub mod payload;
pub mod progress;
pub mod uploader;
