//! Camera and microphone capture.
//!
//! A room acquires one capture stream when it is created and keeps it in a
//! `CaptureLease`. The lease hands the stream back to its device exactly once,
//! either through `release()` or when it is dropped, so every way of leaving a
//! room frees the device.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum MediaError {
    #[error("Could not access camera or microphone: {0}")]
    Unavailable(String),
}

/// Opaque handle to an acquired capture stream
#[derive(Debug, PartialEq, Eq)]
pub struct CaptureHandle {
    pub id: u64,
    pub owner: String,
}

#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Request audio and video for `owner`
    async fn acquire(&self, owner: &str) -> Result<CaptureHandle, MediaError>;

    /// Stop every track of the stream
    fn release(&self, handle: CaptureHandle);
}

/// An acquired stream plus the device it must be returned to
pub struct CaptureLease {
    handle: Option<CaptureHandle>,
    device: Arc<dyn CaptureDevice>,
    audio_enabled: bool,
    video_enabled: bool,
}

impl CaptureLease {
    pub async fn acquire(device: Arc<dyn CaptureDevice>, owner: &str) -> Result<Self, MediaError> {
        let handle = device.acquire(owner).await?;
        tracing::info!("Capture stream {} acquired for {}", handle.id, owner);
        Ok(Self {
            handle: Some(handle),
            device,
            audio_enabled: true,
            video_enabled: true,
        })
    }

    pub fn is_live(&self) -> bool {
        self.handle.is_some()
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled
    }

    pub fn video_enabled(&self) -> bool {
        self.video_enabled
    }

    /// Flip the microphone track, returning the new state
    pub fn toggle_audio(&mut self) -> bool {
        self.audio_enabled = !self.audio_enabled;
        self.audio_enabled
    }

    /// Flip the camera track, returning the new state
    pub fn toggle_video(&mut self) -> bool {
        self.video_enabled = !self.video_enabled;
        self.video_enabled
    }

    /// Return the stream to its device. Later calls (and the drop) do nothing.
    pub fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            tracing::info!("Releasing capture stream {} of {}", handle.id, handle.owner);
            self.device.release(handle);
        }
    }
}

impl Drop for CaptureLease {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for CaptureLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureLease")
            .field("handle", &self.handle)
            .field("audio_enabled", &self.audio_enabled)
            .field("video_enabled", &self.video_enabled)
            .finish()
    }
}

/// In-process device used when no real capture hardware is attached.
/// Counts acquisitions and releases so leaks show up in tests and logs.
#[derive(Debug, Default)]
pub struct LoopbackCaptureDevice {
    unavailable: bool,
    next_id: AtomicU64,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl LoopbackCaptureDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device whose every acquisition fails
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Build the device described by `MEDIA_AVAILABLE` (defaults to available)
    pub fn from_env() -> Self {
        let available = std::env::var("MEDIA_AVAILABLE")
            .map(|v| v != "0" && v.to_lowercase() != "false")
            .unwrap_or(true);
        if available {
            Self::new()
        } else {
            tracing::warn!("Capture device disabled by MEDIA_AVAILABLE");
            Self::unavailable()
        }
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.acquired() - self.released()
    }
}

#[async_trait]
impl CaptureDevice for LoopbackCaptureDevice {
    async fn acquire(&self, owner: &str) -> Result<CaptureHandle, MediaError> {
        if self.unavailable {
            return Err(MediaError::Unavailable("no capture device present".to_string()));
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(CaptureHandle {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            owner: owner.to_string(),
        })
    }

    fn release(&self, _handle: CaptureHandle) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
