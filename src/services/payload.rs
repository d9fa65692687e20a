use crate::config::{DEFAULT_CHUNK_SIZE, UploadConfig};
use crate::error::UploadError;
use crate::services::progress::{ProgressMode, ProgressTracker, Reporter};
use crate::utils::validation::parse_content_type;
use async_stream::try_stream;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use mime::Mime;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// A file exposed as a request body that reports how much of it has been sent.
///
/// A payload serves exactly one write pass: [`FilePayload::write_to`],
/// [`FilePayload::into_stream`] and [`FilePayload::into_body`] all consume it.
#[derive(Debug)]
pub struct FilePayload {
    path: PathBuf,
    content_type: Mime,
    chunk_size: usize,
    mode: ProgressMode,
    reporter: Option<Reporter>,
}

impl FilePayload {
    pub fn new(path: impl Into<PathBuf>, content_type: &str) -> Result<Self, UploadError> {
        Ok(Self {
            path: path.into(),
            content_type: parse_content_type(content_type)?,
            chunk_size: DEFAULT_CHUNK_SIZE,
            mode: ProgressMode::default(),
            reporter: None,
        })
    }

    pub fn from_config(
        path: impl Into<PathBuf>,
        content_type: &str,
        config: &UploadConfig,
    ) -> Result<Self, UploadError> {
        Ok(Self::new(path, content_type)?
            .chunk_size(config.chunk_size)
            .progress_mode(config.progress_mode))
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Bytes per read. Zero is ignored.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        if chunk_size > 0 {
            self.chunk_size = chunk_size;
        }
        self
    }

    pub fn progress_mode(mut self, mode: ProgressMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content_type(&self) -> &Mime {
        &self.content_type
    }

    /// Current size of the file on disk. Not cached; every call stats the file.
    pub async fn content_length(&self) -> Result<u64, UploadError> {
        Ok(tokio::fs::metadata(&self.path).await?.len())
    }

    /// Streams the file in chunks, posting a notification per chunk.
    ///
    /// The file is opened on first poll and closed when the stream finishes,
    /// fails, or is dropped. Failures are posted to the listener before they
    /// are yielded.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, UploadError>> + Send + 'static {
        let FilePayload {
            path,
            chunk_size,
            mode,
            reporter,
            ..
        } = self;
        let on_error = reporter.clone();
        report_errors(open_chunks(path, chunk_size, mode, reporter), on_error)
    }

    /// The payload as a streaming `reqwest` body.
    pub fn into_body(self) -> reqwest::Body {
        reqwest::Body::wrap_stream(self.into_stream())
    }

    /// Copies the whole file into `sink` and flushes it. Returns the number of
    /// bytes written.
    pub async fn write_to<W>(self, sink: &mut W) -> Result<u64, UploadError>
    where
        W: AsyncWrite + Unpin,
    {
        let reporter = self.reporter.clone();
        write_stream(self.into_stream(), sink, reporter.as_ref()).await
    }
}

/// Any reader with a declared length, exposed as a progress-reporting body.
///
/// Unlike [`FilePayload`] the length cannot be discovered, so the caller
/// supplies it, and notifications can be rate limited.
pub struct StreamPayload<R> {
    reader: R,
    content_type: Mime,
    content_length: u64,
    chunk_size: usize,
    mode: ProgressMode,
    interval: Duration,
    reporter: Option<Reporter>,
}

impl<R> StreamPayload<R>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    pub fn new(reader: R, content_type: &str, content_length: u64) -> Result<Self, UploadError> {
        Ok(Self {
            reader,
            content_type: parse_content_type(content_type)?,
            content_length,
            chunk_size: DEFAULT_CHUNK_SIZE,
            mode: ProgressMode::default(),
            interval: Duration::ZERO,
            reporter: None,
        })
    }

    pub fn from_config(
        reader: R,
        content_type: &str,
        content_length: u64,
        config: &UploadConfig,
    ) -> Result<Self, UploadError> {
        Ok(Self::new(reader, content_type, content_length)?
            .chunk_size(config.chunk_size)
            .progress_mode(config.progress_mode)
            .min_interval(config.progress_interval))
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        if chunk_size > 0 {
            self.chunk_size = chunk_size;
        }
        self
    }

    pub fn progress_mode(mut self, mode: ProgressMode) -> Self {
        self.mode = mode;
        self
    }

    /// Minimum time between two progress notifications. `Duration::ZERO`
    /// reports every chunk.
    pub fn min_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn content_type(&self) -> &Mime {
        &self.content_type
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, UploadError>> + Send + 'static {
        let on_error = self.reporter.clone();
        let tracker = ProgressTracker::new(self.reporter, self.mode, self.content_length)
            .throttled(self.interval);
        report_errors(read_chunks(self.reader, self.chunk_size, tracker), on_error)
    }

    pub fn into_body(self) -> reqwest::Body {
        reqwest::Body::wrap_stream(self.into_stream())
    }

    pub async fn write_to<W>(self, sink: &mut W) -> Result<u64, UploadError>
    where
        W: AsyncWrite + Unpin,
    {
        let reporter = self.reporter.clone();
        write_stream(self.into_stream(), sink, reporter.as_ref()).await
    }
}

impl<R> fmt::Debug for StreamPayload<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamPayload")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("chunk_size", &self.chunk_size)
            .field("mode", &self.mode)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

fn open_chunks(
    path: PathBuf,
    chunk_size: usize,
    mode: ProgressMode,
    reporter: Option<Reporter>,
) -> impl Stream<Item = Result<Bytes, UploadError>> + Send + 'static {
    try_stream! {
        let file = File::open(&path).await?;
        let total = file.metadata().await?.len();
        tracing::debug!("Streaming {} ({} bytes, {} mode)", path.display(), total, mode);

        let chunks = read_chunks(file, chunk_size, ProgressTracker::new(reporter, mode, total));
        futures::pin_mut!(chunks);
        while let Some(chunk) = chunks.try_next().await? {
            yield chunk;
        }
    }
}

fn read_chunks<R>(
    mut reader: R,
    chunk_size: usize,
    mut tracker: ProgressTracker,
) -> impl Stream<Item = Result<Bytes, UploadError>> + Send + 'static
where
    R: AsyncRead + Send + Unpin + 'static,
{
    try_stream! {
        let mut buffer = vec![0u8; chunk_size];
        loop {
            let read = reader.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            tracker.advance(read as u64);
            yield Bytes::copy_from_slice(&buffer[..read]);
        }
        tracing::debug!("Payload pass finished after {} bytes", tracker.uploaded());
    }
}

fn report_errors<S>(
    stream: S,
    reporter: Option<Reporter>,
) -> impl Stream<Item = Result<Bytes, UploadError>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, UploadError>> + Send + 'static,
{
    stream.inspect_err(move |e| {
        tracing::warn!("Payload read failed: {}", e);
        if let Some(reporter) = &reporter {
            reporter.error(e);
        }
    })
}

async fn write_stream<S, W>(
    stream: S,
    sink: &mut W,
    reporter: Option<&Reporter>,
) -> Result<u64, UploadError>
where
    S: Stream<Item = Result<Bytes, UploadError>>,
    W: AsyncWrite + Unpin,
{
    let fail = |e: std::io::Error| {
        let err = UploadError::Io(e);
        tracing::warn!("Payload write failed: {}", err);
        if let Some(reporter) = reporter {
            reporter.error(&err);
        }
        err
    };

    futures::pin_mut!(stream);
    let mut written = 0u64;
    while let Some(chunk) = stream.try_next().await? {
        sink.write_all(&chunk).await.map_err(fail)?;
        written += chunk.len() as u64;
    }
    sink.flush().await.map_err(fail)?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::dispatcher::MainLoop;
    use crate::services::progress::{ProgressError, ProgressListener};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        updates: Mutex<Vec<u8>>,
        errors: Mutex<Vec<ProgressError>>,
    }

    impl ProgressListener for Recorder {
        fn on_progress_update(&self, percentage: u8) {
            self.updates.lock().unwrap().push(percentage);
        }

        fn on_error(&self, error: &ProgressError) {
            self.errors.lock().unwrap().push(error.clone());
        }
    }

    #[test]
    fn test_new_rejects_bad_content_type() {
        let err = FilePayload::new("video.mp4", "not a mime").unwrap_err();
        assert!(matches!(err, UploadError::InvalidContentType(_)));
    }

    #[test]
    fn test_chunk_size_ignores_zero() {
        let payload = FilePayload::new("video.mp4", "video/mp4").unwrap().chunk_size(0);
        assert_eq!(payload.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(payload.content_type().essence_str(), "video/mp4");
    }

    #[tokio::test]
    async fn test_stream_payload_legacy_sequence() {
        let data = vec![7u8; 5000];
        let recorder = Arc::new(Recorder::default());
        let (handle, main_loop) = MainLoop::new();

        let payload = StreamPayload::new(std::io::Cursor::new(data.clone()), "video/mp4", 5000)
            .unwrap()
            .progress_mode(ProgressMode::Legacy)
            .with_reporter(Reporter::new(recorder.clone(), Arc::new(handle)));

        let mut sink = Vec::new();
        let written = payload.write_to(&mut sink).await.unwrap();
        main_loop.run().await;

        assert_eq!(written, 5000);
        assert_eq!(sink, data);
        assert_eq!(*recorder.updates.lock().unwrap(), vec![0, 40, 81]);
        assert!(recorder.errors.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stream_payload_throttled() {
        let recorder = Arc::new(Recorder::default());
        let (handle, main_loop) = MainLoop::new();

        let payload = StreamPayload::new(std::io::Cursor::new(vec![1u8; 10_000]), "image/png", 10_000)
            .unwrap()
            .chunk_size(1000)
            .min_interval(Duration::from_secs(3600))
            .with_reporter(Reporter::new(recorder.clone(), Arc::new(handle)));

        let mut sink = Vec::new();
        payload.write_to(&mut sink).await.unwrap();
        main_loop.run().await;

        assert_eq!(sink.len(), 10_000);
        assert_eq!(*recorder.updates.lock().unwrap(), vec![10, 100]);
    }

    async fn legacy_stream_updates(config: &UploadConfig, interval: Option<Duration>) -> Vec<u8> {
        let recorder = Arc::new(Recorder::default());
        let (handle, main_loop) = MainLoop::new();

        let mut payload =
            StreamPayload::from_config(std::io::Cursor::new(vec![3u8; 5000]), "video/mp4", 5000, config)
                .unwrap()
                .with_reporter(Reporter::new(recorder.clone(), Arc::new(handle)));
        if let Some(interval) = interval {
            payload = payload.min_interval(interval);
        }

        let mut sink = Vec::new();
        assert_eq!(payload.write_to(&mut sink).await.unwrap(), 5000);
        main_loop.run().await;

        recorder.updates.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_stream_payload_legacy_config_reports_every_chunk() {
        let config = UploadConfig::from_lookup(|key| match key {
            "UPLOAD_PROGRESS_MODE" => Some("legacy".to_string()),
            _ => None,
        });
        assert_eq!(legacy_stream_updates(&config, None).await, vec![0, 40, 81]);
    }

    #[tokio::test]
    async fn test_stream_payload_legacy_throttled_keeps_last_chunk() {
        let config = UploadConfig::legacy();
        let updates = legacy_stream_updates(&config, Some(Duration::from_secs(3600))).await;
        assert_eq!(updates, vec![0, 81]);

        let updates = legacy_stream_updates(&config, Some(Duration::from_millis(150))).await;
        assert_eq!(updates.first(), Some(&0));
        assert_eq!(updates.last(), Some(&81));
    }

    #[test]
    fn test_stream_payload_debug() {
        let payload = StreamPayload::new(std::io::Cursor::new(Vec::<u8>::new()), "image/png", 0)
            .unwrap()
            .min_interval(Duration::from_millis(150));
        let debug = format!("{:?}", payload);
        assert!(debug.starts_with("StreamPayload"));
        assert!(debug.contains("content_length: 0"));
        assert!(debug.contains("150ms"));
    }

    #[tokio::test]
    async fn test_missing_file_reports_and_propagates() {
        let recorder = Arc::new(Recorder::default());
        let (handle, main_loop) = MainLoop::new();

        let payload = FilePayload::new("/definitely/not/here.mp4", "video/mp4")
            .unwrap()
            .with_reporter(Reporter::new(recorder.clone(), Arc::new(handle)));

        assert!(payload.content_length().await.is_err());

        let mut sink = Vec::new();
        let err = payload.write_to(&mut sink).await.unwrap_err();
        main_loop.run().await;

        assert_eq!(err.io_kind(), std::io::ErrorKind::NotFound);
        let errors = recorder.errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, std::io::ErrorKind::NotFound);
        assert!(recorder.updates.lock().unwrap().is_empty());
        assert!(sink.is_empty());
    }
}
