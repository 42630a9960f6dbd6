// src/capture.rs
//
// Capture source: owns the live video feed and exposes the current frame
// on demand. The source is a camera index, a video file, or an RTSP URL;
// the loop's continuation condition is this source's liveness.

use crate::types::{CaptureConfig, Frame};
use anyhow::Result;
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureTraitConst},
};
use tracing::{info, warn};

pub struct CaptureSource {
    cap: VideoCapture,
    pub width: i32,
    pub height: i32,
    pub fps: f64,
    frames_read: u64,
    active: bool,
}

impl CaptureSource {
    /// Acquire the capture device. Failure here is fatal to starting a
    /// session — surfaced to the caller, never retried automatically.
    pub fn open(config: &CaptureConfig) -> Result<Self> {
        info!("Opening capture source: {}", config.source);

        let cap = match config.source.parse::<i32>() {
            Ok(index) => VideoCapture::new(index, videoio::CAP_ANY)?,
            Err(_) => VideoCapture::from_file(&config.source, videoio::CAP_ANY)?,
        };

        if !cap.is_opened()? {
            anyhow::bail!("Failed to open capture source '{}'", config.source);
        }

        let fps = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FPS)?;
        let width = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_WIDTH)? as i32;
        let height = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_HEIGHT)? as i32;

        // Live devices often report 0 fps
        let fps = if fps > 0.0 { fps } else { 30.0 };

        info!("✓ Capture ready: {}x{} @ {:.1} FPS", width, height, fps);

        Ok(Self {
            cap,
            width,
            height,
            fps,
            frames_read: 0,
            active: true,
        })
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The current frame, RGB. Returns None when the feed ends; the source
    /// goes inactive at that point and stays inactive.
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        use opencv::videoio::VideoCaptureTrait;

        if !self.active {
            return Ok(None);
        }

        let mut mat = Mat::default();

        if !VideoCaptureTrait::read(&mut self.cap, &mut mat)? || mat.empty() {
            self.active = false;
            return Ok(None);
        }

        self.frames_read += 1;
        let timestamp_ms = (self.frames_read as f64 / self.fps) * 1000.0;

        let mut rgb_mat = Mat::default();
        imgproc::cvt_color(&mat, &mut rgb_mat, imgproc::COLOR_BGR2RGB, 0)?;

        let data = rgb_mat.data_bytes()?.to_vec();

        Ok(Some(Frame {
            data,
            width: self.width as usize,
            height: self.height as usize,
            timestamp_ms,
        }))
    }

    /// Release the underlying device. Part of the joint teardown: loop
    /// halt, device release, and session close happen together.
    pub fn release(&mut self) {
        use opencv::videoio::VideoCaptureTrait;

        self.active = false;
        if let Err(e) = VideoCaptureTrait::release(&mut self.cap) {
            warn!("Capture release failed: {}", e);
        }
    }
}
