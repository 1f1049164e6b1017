//! Range streaming engine.
//!
//! Turns a resolved [`MediaFile`] and an optional `Range` header into
//! response metadata plus a lazily read body. The body is a pull-driven
//! [`ChunkStream`]: each chunk is read from disk only when the transport
//! asks for the next one, so memory use stays at one chunk per request
//! regardless of file size.

use std::io::{self, SeekFrom};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::Json;
use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};
use tracing::{debug, error, info, warn};

use crate::config::{StreamingConfig, VidserveConfig};
use crate::media::{MediaFile, MediaLibrary, ResolveError};
use crate::range::{ByteRange, RangeError, RangeSpec, extract_range_header};

/// One bounded piece of a streamed body.
pub type StreamChunk = Bytes;

/// Finite, non-restartable sequence of chunks covering one byte range.
///
/// Owns the file handle it reads from. Dropping the stream, whether after
/// completion or because the client went away, closes the handle.
pub struct ChunkStream {
    inner: BoxStream<'static, io::Result<StreamChunk>>,
    len: u64,
}

impl ChunkStream {
    /// Opens `path` and positions it at the start of `range`.
    ///
    /// # Errors
    ///
    /// - `std::io::Error` - File could not be opened or seeked
    pub async fn open(
        path: &Path,
        range: ByteRange,
        chunk_size: usize,
        idle_read_timeout: Option<Duration>,
    ) -> io::Result<Self> {
        let mut file = File::open(path).await?;
        file.seek(SeekFrom::Start(range.start)).await?;

        Ok(Self::from_reader(
            file,
            range.len(),
            chunk_size,
            idle_read_timeout,
            path.display().to_string(),
        ))
    }

    /// Streams the next `len` bytes of an already positioned reader.
    ///
    /// `source` names the reader in log lines.
    pub fn from_reader<R>(
        reader: R,
        len: u64,
        chunk_size: usize,
        idle_read_timeout: Option<Duration>,
        source: impl Into<Arc<str>>,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let state = ReadState {
            reader,
            source: source.into(),
            remaining: len,
            chunk_size: chunk_size.max(1),
            idle_read_timeout,
        };

        Self {
            inner: stream::unfold(state, ReadState::next_chunk).boxed(),
            len,
        }
    }

    /// A stream that yields nothing, used for empty files.
    pub fn empty() -> Self {
        Self {
            inner: stream::empty().boxed(),
            len: 0,
        }
    }

    /// Number of bytes the stream is expected to yield.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.len
    }
}

impl Stream for ChunkStream {
    type Item = io::Result<StreamChunk>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStream").field("len", &self.len).finish()
    }
}

struct ReadState<R> {
    reader: R,
    source: Arc<str>,
    remaining: u64,
    chunk_size: usize,
    idle_read_timeout: Option<Duration>,
}

impl<R: AsyncRead + Unpin> ReadState<R> {
    async fn next_chunk(mut self) -> Option<(io::Result<StreamChunk>, Self)> {
        if self.remaining == 0 {
            return None;
        }

        let want = (self.chunk_size as u64).min(self.remaining) as usize;
        let mut buffer = vec![0u8; want];

        let read = match self.idle_read_timeout {
            Some(limit) => tokio::time::timeout(limit, self.reader.read(&mut buffer))
                .await
                .unwrap_or_else(|_| {
                    Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("read stalled for more than {limit:?}"),
                    ))
                }),
            None => self.reader.read(&mut buffer).await,
        };

        match read {
            // A zero-byte read ends the stream; the client receives fewer
            // bytes than Content-Length announced.
            Ok(0) => {
                warn!(
                    "Short read on {}: {} bytes never delivered",
                    self.source,
                    self.remaining
                );
                self.remaining = 0;
                None
            }
            Ok(n) => {
                buffer.truncate(n);
                self.remaining -= n as u64;
                Some((Ok(Bytes::from(buffer)), self))
            }
            Err(e) => {
                error!("Read failed on {}: {}", self.source, e);
                self.remaining = 0;
                Some((Err(e), self))
            }
        }
    }
}

impl<R> Drop for ReadState<R> {
    fn drop(&mut self) {
        if self.remaining > 0 {
            info!(
                "Stream of {} interrupted with {} bytes unsent",
                self.source,
                self.remaining
            );
        }
    }
}

/// Response metadata plus the body stream for a media request.
#[derive(Debug)]
pub struct MediaResponse {
    /// 200 for full content, 206 for a satisfied range
    pub status: StatusCode,
    pub content_type: String,
    /// Exact number of body bytes
    pub content_length: u64,
    /// `Content-Range` value for partial responses
    pub content_range: Option<String>,
    pub body: ChunkStream,
}

impl IntoResponse for MediaResponse {
    fn into_response(self) -> Response {
        let mut response = Response::builder()
            .status(self.status)
            .header(header::CONTENT_TYPE, &self.content_type)
            .header(header::CONTENT_LENGTH, self.content_length.to_string())
            .header(header::ACCEPT_RANGES, "bytes");

        if let Some(content_range) = &self.content_range {
            response = response.header(header::CONTENT_RANGE, content_range);
        }

        response
            .body(Body::from_stream(self.body))
            .unwrap_or_else(|e| {
                error!("Failed to build media response: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            })
    }
}

/// Interprets range headers and produces chunked media responses.
#[derive(Debug, Clone)]
pub struct RangeStreamingEngine {
    chunk_size: usize,
    idle_read_timeout: Option<Duration>,
}

impl RangeStreamingEngine {
    /// Creates an engine with the configured chunk size and read timeout.
    pub fn new(config: &StreamingConfig) -> Self {
        Self {
            chunk_size: config.chunk_size.max(1),
            idle_read_timeout: config.idle_read_timeout,
        }
    }

    /// Builds the response for `file`, honoring `range_header` if given.
    ///
    /// Every error is reported before any byte of the body is produced.
    ///
    /// # Errors
    ///
    /// - `StreamingError::Range` - Header malformed or range not satisfiable
    /// - `StreamingError::Io` - File could not be opened or positioned
    pub async fn handle(
        &self,
        file: &MediaFile,
        range_header: Option<&str>,
    ) -> Result<MediaResponse, StreamingError> {
        let size = file.size;

        let (status, range, content_range) = match range_header {
            Some(raw) => {
                let range = RangeSpec::parse(raw)?.resolve(size)?;
                let content_range = range.content_range(size);
                (StatusCode::PARTIAL_CONTENT, Some(range), Some(content_range))
            }
            None => (StatusCode::OK, ByteRange::full(size), None),
        };

        let body = match range {
            Some(range) => {
                ChunkStream::open(&file.path, range, self.chunk_size, self.idle_read_timeout)
                    .await?
            }
            None => ChunkStream::empty(),
        };

        debug!(
            "Serving {}/{}: status={}, range={:?}, size={}",
            file.category, file.filename, status, range, size
        );

        Ok(MediaResponse {
            status,
            content_type: file.content_type.clone(),
            content_length: body.len(),
            content_range,
            body,
        })
    }
}

/// Resolver and engine wired together for the `/video/{category}/{filename}` route.
#[derive(Debug, Clone)]
pub struct MediaService {
    library: Arc<MediaLibrary>,
    engine: RangeStreamingEngine,
}

impl MediaService {
    /// Builds the service from an explicit configuration value.
    pub fn new(config: &VidserveConfig) -> Self {
        Self {
            library: Arc::new(MediaLibrary::new(&config.media)),
            engine: RangeStreamingEngine::new(&config.streaming),
        }
    }

    /// The category registry used for resolution.
    pub fn library(&self) -> &MediaLibrary {
        &self.library
    }

    /// Resolves `category/filename` and streams it according to the request headers.
    ///
    /// Resolution runs first, so an unknown category or file is reported
    /// as not found whatever the `Range` header says.
    ///
    /// # Errors
    ///
    /// - `StreamingError::Resolve` - Category or file not found
    /// - `StreamingError::Range` - Header malformed or range not satisfiable
    /// - `StreamingError::Io` - File vanished or became unreadable after resolution
    pub async fn stream(
        &self,
        category: &str,
        filename: &str,
        headers: &HeaderMap,
    ) -> Result<MediaResponse, StreamingError> {
        let file = self.library.resolve(category, filename).await?;
        let range_header = extract_range_header(headers)?;

        let response = self.engine.handle(&file, range_header).await;
        match &response {
            Ok(media) => info!(
                "{}/{} -> {} ({} of {} bytes)",
                category, filename, media.status, media.content_length, file.size
            ),
            Err(e) => warn!("{}/{} rejected: {}", category, filename, e),
        }
        response
    }
}

/// Errors surfaced before a media response starts streaming.
#[derive(Debug, thiserror::Error)]
pub enum StreamingError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StreamingError {
    /// HTTP status the error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            StreamingError::Resolve(ResolveError::Io { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            StreamingError::Resolve(_) => StatusCode::NOT_FOUND,
            StreamingError::Range(RangeError::Malformed { .. }) => StatusCode::BAD_REQUEST,
            StreamingError::Range(RangeError::NotSatisfiable { .. }) => {
                StatusCode::RANGE_NOT_SATISFIABLE
            }
            StreamingError::Io(e) if e.kind() == io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
            StreamingError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short message safe to show to clients.
    pub fn client_message(&self) -> &'static str {
        match self {
            StreamingError::Resolve(ResolveError::CategoryNotFound { .. }) => "Category not found",
            StreamingError::Resolve(ResolveError::FileNotFound { .. }) => "File not found",
            StreamingError::Resolve(ResolveError::DirectoryNotFound { .. }) => {
                "Directory not found"
            }
            StreamingError::Resolve(ResolveError::Io { .. }) => "Error listing directory",
            StreamingError::Range(RangeError::Malformed { .. }) => "Invalid Range header",
            StreamingError::Range(RangeError::NotSatisfiable { .. }) => {
                "Requested Range Not Satisfiable"
            }
            StreamingError::Io(e) if e.kind() == io::ErrorKind::NotFound => "File not found",
            StreamingError::Io(_) => "Error reading file",
        }
    }
}

impl IntoResponse for StreamingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(serde_json::json!({ "error": self.client_message() }));

        match &self {
            StreamingError::Range(RangeError::NotSatisfiable { size, .. }) => {
                let content_range = HeaderValue::from_str(&format!("bytes */{size}"))
                    .unwrap_or_else(|_| HeaderValue::from_static("bytes */0"));
                (
                    status,
                    [
                        (header::CONTENT_RANGE, content_range),
                        (header::ACCEPT_RANGES, HeaderValue::from_static("bytes")),
                    ],
                    body,
                )
                    .into_response()
            }
            _ => (status, body).into_response(),
        }
    }
}
