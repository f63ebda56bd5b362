//! Upload sources and the file handles backing them.
//!
//! An [`UploadSource`] is created by the caller and owns its handle; the
//! request pipeline only borrows the handle for the duration of one call and,
//! when `auto_close` is set, closes it exactly once afterwards.

use bytes::Bytes;
use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Content type used when an upload does not specify one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A readable handle that can be released explicitly.
pub trait FileHandle: Read + Send {
    /// Release the underlying resource. Called at most once by [`SharedHandle`].
    fn close(&mut self) -> io::Result<()>;
}

/// Filesystem-backed handle.
pub struct FsFile {
    file: Option<File>,
}

impl FsFile {
    pub fn new(file: File) -> Self {
        Self { file: Some(file) }
    }
}

impl Read for FsFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.file.as_mut() {
            Some(file) => file.read(buf),
            None => Err(io::Error::new(io::ErrorKind::Other, "file handle is closed")),
        }
    }
}

impl FileHandle for FsFile {
    fn close(&mut self) -> io::Result<()> {
        // Dropping the std handle closes the descriptor.
        self.file.take();
        Ok(())
    }
}

/// In-memory handle over a byte buffer.
pub struct MemoryFile {
    cursor: Cursor<Bytes>,
}

impl MemoryFile {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            cursor: Cursor::new(bytes.into()),
        }
    }
}

impl Read for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl FileHandle for MemoryFile {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct HandleState {
    inner: Box<dyn FileHandle>,
    closed: bool,
}

/// Shared, idempotently closable handle.
///
/// Clones refer to the same underlying handle, so the caller can keep one clone
/// and observe [`SharedHandle::is_closed`] after a request finished with it.
#[derive(Clone)]
pub struct SharedHandle(Arc<Mutex<HandleState>>);

impl SharedHandle {
    pub fn new(handle: impl FileHandle + 'static) -> Self {
        Self(Arc::new(Mutex::new(HandleState {
            inner: Box::new(handle),
            closed: false,
        })))
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, HandleState>> {
        self.0
            .lock()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("handle lock poisoned: {e}")))
    }

    /// Read the remaining contents of the handle.
    pub fn read_to_end(&self) -> io::Result<Vec<u8>> {
        let mut state = self.lock()?;
        if state.closed {
            return Err(io::Error::new(io::ErrorKind::Other, "file handle is closed"));
        }
        let mut buf = Vec::new();
        state.inner.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Close the handle. A second call is a no-op.
    pub fn close(&self) -> io::Result<()> {
        let mut state = self.lock()?;
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        state.inner.close()
    }

    pub fn is_closed(&self) -> bool {
        self.0.lock().map(|s| s.closed).unwrap_or(true)
    }

    pub fn ptr_eq(&self, other: &SharedHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for SharedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Strategy for opening path-backed uploads.
///
/// Injected per client so tests can observe or fake file access.
pub trait FileOpener: Send + Sync {
    fn open(&self, path: &Path) -> io::Result<SharedHandle>;

    /// Whether a plain string argument names a file this opener can read.
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Opens files from the local filesystem in read-only mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsOpener;

impl FileOpener for FsOpener {
    fn open(&self, path: &Path) -> io::Result<SharedHandle> {
        let file = File::open(path)?;
        Ok(SharedHandle::new(FsFile::new(file)))
    }
}

/// What an upload reads from.
#[derive(Debug, Clone)]
pub enum UploadBacking {
    Path(PathBuf),
    Stream(SharedHandle),
    Bytes(Bytes),
}

/// Upload helper carrying filename, content type and ownership metadata.
#[derive(Debug, Clone)]
pub struct UploadSource {
    backing: UploadBacking,
    filename: Option<String>,
    content_type: String,
    auto_close: bool,
}

impl UploadSource {
    /// Upload a file from disk. The pipeline opens it and closes it afterwards.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Self {
            backing: UploadBacking::Path(path),
            filename,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            auto_close: true,
        }
    }

    /// Upload from a stream the caller opened. Left open unless `auto_close` is set.
    pub fn from_stream(handle: SharedHandle) -> Self {
        Self {
            backing: UploadBacking::Stream(handle),
            filename: None,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            auto_close: false,
        }
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            backing: UploadBacking::Bytes(bytes.into()),
            filename: None,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            auto_close: true,
        }
    }

    pub fn from_string(text: impl Into<String>) -> Self {
        Self {
            backing: UploadBacking::Bytes(Bytes::from(text.into())),
            filename: None,
            content_type: "text/plain".to_string(),
            auto_close: true,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_auto_close(mut self, auto_close: bool) -> Self {
        self.auto_close = auto_close;
        self
    }

    pub fn backing(&self) -> &UploadBacking {
        &self.backing
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn auto_close(&self) -> bool {
        self.auto_close
    }

    pub fn is_path(&self) -> bool {
        matches!(self.backing, UploadBacking::Path(_))
    }

    /// Resolve the backing into a readable handle.
    ///
    /// Path-backed sources go through `opener`; byte buffers get a fresh
    /// in-memory handle; streams are returned as-is.
    pub fn open(&self, opener: &dyn FileOpener) -> io::Result<SharedHandle> {
        match &self.backing {
            UploadBacking::Path(path) => opener.open(path),
            UploadBacking::Stream(handle) => Ok(handle.clone()),
            UploadBacking::Bytes(bytes) => Ok(SharedHandle::new(MemoryFile::new(bytes.clone()))),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Handle that counts `close` calls on the inner resource.
    pub(crate) struct CountingHandle {
        data: Cursor<Vec<u8>>,
        closes: Arc<AtomicUsize>,
    }

    impl CountingHandle {
        pub(crate) fn new(data: &[u8]) -> (Self, Arc<AtomicUsize>) {
            let closes = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    data: Cursor::new(data.to_vec()),
                    closes: closes.clone(),
                },
                closes,
            )
        }
    }

    impl Read for CountingHandle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.data.read(buf)
        }
    }

    impl FileHandle for CountingHandle {
        fn close(&mut self) -> io::Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn from_path_defaults() {
        let upload = UploadSource::from_path("/tmp/audio/sample.wav");
        assert_eq!(upload.filename(), Some("sample.wav"));
        assert_eq!(upload.content_type(), DEFAULT_CONTENT_TYPE);
        assert!(upload.auto_close());
        assert!(upload.is_path());
    }

    #[test]
    fn from_path_overrides() {
        let upload = UploadSource::from_path("/tmp/a.bin")
            .with_filename("custom.txt")
            .with_content_type("text/plain");
        assert_eq!(upload.filename(), Some("custom.txt"));
        assert_eq!(upload.content_type(), "text/plain");
    }

    #[test]
    fn from_stream_does_not_auto_close_by_default() {
        let (handle, _) = CountingHandle::new(b"data");
        let upload = UploadSource::from_stream(SharedHandle::new(handle)).with_filename("test.txt");
        assert!(!upload.auto_close());
        assert!(!upload.is_path());
        assert_eq!(upload.filename(), Some("test.txt"));
        assert!(upload.with_auto_close(true).auto_close());
    }

    #[test]
    fn from_bytes_and_string_defaults() {
        let bytes = UploadSource::from_bytes(Bytes::from_static(b"binary")).with_filename("data.bin");
        assert_eq!(bytes.content_type(), DEFAULT_CONTENT_TYPE);
        assert!(bytes.auto_close());

        let text = UploadSource::from_string("hello world").with_filename("message.txt");
        assert_eq!(text.content_type(), "text/plain");
        assert!(text.auto_close());
        let handle = text.open(&FsOpener).unwrap();
        assert_eq!(handle.read_to_end().unwrap(), b"hello world");
    }

    #[test]
    fn shared_handle_closes_once() {
        let (handle, closes) = CountingHandle::new(b"abc");
        let shared = SharedHandle::new(handle);
        let clone = shared.clone();

        assert_eq!(shared.read_to_end().unwrap(), b"abc");
        shared.close().unwrap();
        clone.close().unwrap();

        assert!(clone.is_closed());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(shared.read_to_end().is_err());
    }

    #[test]
    fn fs_opener_reads_file() {
        let path = std::env::temp_dir().join(format!("elevenlabs-upload-{}", uuid::Uuid::new_v4()));
        std::fs::write(&path, b"hello").unwrap();

        let upload = UploadSource::from_path(&path);
        let handle = upload.open(&FsOpener).unwrap();
        assert_eq!(handle.read_to_end().unwrap(), b"hello");
        handle.close().unwrap();
        assert!(handle.is_closed());

        std::fs::remove_file(&path).unwrap();
    }
}
