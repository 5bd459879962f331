// ============================================================================
// ASSET LOADER: raw bytes / files / URLs into renderable bitmaps
// ============================================================================
//
// Decoding happens off the UI thread: `AssetLoader::request` hands the work to
// a worker thread and the result comes back through a channel that the UI
// drains once per frame with `poll`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use image::RgbaImage;
use thiserror::Error;

/// Shared, immutable decoded bitmap.
pub type Bitmap = Arc<RgbaImage>;

/// Upper bound for a single URL fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image has no pixels")]
    Empty,
    #[error("unsupported URL scheme in {0:?}")]
    UnsupportedUrl(String),
    #[error("fetching {url} failed: {message}")]
    Fetch { url: String, message: String },
}

/// Where an asset comes from.
#[derive(Clone, Debug)]
pub enum AssetSource {
    Bytes(Arc<[u8]>),
    Path(PathBuf),
    Url(String),
}

impl AssetSource {
    pub fn describe(&self) -> String {
        match self {
            AssetSource::Bytes(b) => format!("<{} bytes>", b.len()),
            AssetSource::Path(p) => p.display().to_string(),
            AssetSource::Url(u) => u.clone(),
        }
    }
}

/// Decode an encoded image (PNG, JPEG, WEBP, ...) into RGBA.
pub fn decode_bitmap(bytes: &[u8]) -> Result<Bitmap, AssetError> {
    let img = image::load_from_memory(bytes)?.into_rgba8();
    if img.width() == 0 || img.height() == 0 {
        return Err(AssetError::Empty);
    }
    Ok(Arc::new(img))
}

pub fn load_path(path: &Path) -> Result<Bitmap, AssetError> {
    let bytes = std::fs::read(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_bitmap(&bytes)
}

/// Download raw bytes over http(s).
pub fn fetch_url(url: &str) -> Result<Vec<u8>, AssetError> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(AssetError::UnsupportedUrl(url.to_string()));
    }
    let fetch_err = |message: String| AssetError::Fetch {
        url: url.to_string(),
        message,
    };
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| fetch_err(e.to_string()))?;
    let response = client
        .get(url)
        .send()
        .map_err(|e| fetch_err(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(fetch_err(format!("HTTP {status}")));
    }
    let bytes = response.bytes().map_err(|e| fetch_err(e.to_string()))?;
    Ok(bytes.to_vec())
}

/// Resolve any source synchronously.
pub fn load(source: &AssetSource) -> Result<Bitmap, AssetError> {
    match source {
        AssetSource::Bytes(bytes) => decode_bitmap(bytes),
        AssetSource::Path(path) => load_path(path),
        AssetSource::Url(url) => decode_bitmap(&fetch_url(url)?),
    }
}

/// Completion of one background load.
pub struct LoadEvent<T> {
    pub tag: T,
    pub result: Result<Bitmap, AssetError>,
}

/// Background loader. `T` is whatever the caller needs to route the result.
pub struct AssetLoader<T> {
    sender: mpsc::Sender<LoadEvent<T>>,
    receiver: mpsc::Receiver<LoadEvent<T>>,
    pending: usize,
}

impl<T: Send + 'static> AssetLoader<T> {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            pending: 0,
        }
    }

    /// Start decoding `source` on a worker thread.
    pub fn request(&mut self, tag: T, source: AssetSource) {
        let tx = self.sender.clone();
        self.pending += 1;
        std::thread::spawn(move || {
            let result = load(&source);
            if let Err(e) = &result {
                tracing::warn!("asset load failed for {}: {e}", source.describe());
            }
            // Receiver gone means the app is shutting down.
            let _ = tx.send(LoadEvent { tag, result });
        });
    }

    /// Drain every load that finished since the last call.
    pub fn poll(&mut self) -> Vec<LoadEvent<T>> {
        let mut done = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            self.pending = self.pending.saturating_sub(1);
            done.push(event);
        }
        done
    }

    /// Block until the next load completes.
    pub fn wait(&mut self) -> Option<LoadEvent<T>> {
        if self.pending == 0 {
            return None;
        }
        let event = self.receiver.recv().ok()?;
        self.pending = self.pending.saturating_sub(1);
        Some(event)
    }

    pub fn is_busy(&self) -> bool {
        self.pending > 0
    }
}

impl<T: Send + 'static> Default for AssetLoader<T> {
    fn default() -> Self {
        Self::new()
    }
}
