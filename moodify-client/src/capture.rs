use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("No camera is available")]
    Unavailable,

    #[error("Failed to read frame: {0}")]
    Io(#[from] std::io::Error),

    #[error("Captured frame is empty")]
    Empty,
}

/// A single still image.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl Frame {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    /// Encodes the frame as a base64 data URL, which is what the analyzer accepts.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

/// Represents a camera, or anything else that can produce frames on demand.
#[async_trait]
pub trait FrameSource
where
    Self: Send + Sync + 'static,
{
    async fn capture(&self) -> Result<Frame, CaptureError>;
}

/// Reads the latest frame from an image file.
///
/// Anything that keeps overwriting the file with a fresh snapshot works as a camera this way.
pub struct StillImageSource {
    path: PathBuf,
}

impl StillImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FrameSource for StillImageSource {
    async fn capture(&self) -> Result<Frame, CaptureError> {
        let bytes = tokio::fs::read(&self.path).await?;

        if bytes.is_empty() {
            return Err(CaptureError::Empty);
        }

        Ok(Frame::new(mime_for(&self.path), bytes))
    }
}

/// A frame source for when there is no camera. Every capture fails.
pub struct NoCamera;

#[async_trait]
impl FrameSource for NoCamera {
    async fn capture(&self) -> Result<Frame, CaptureError> {
        Err(CaptureError::Unavailable)
    }
}

fn mime_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}
