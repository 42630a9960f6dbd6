// src/sampling.rs
//
// The display loop: once per tick, pull the current frame, redraw the live
// view, submit a throttled encoded copy while the session is open, and
// overlay the latest detection set. The loop's liveness is tied only to
// the capture source — per-tick failures are logged and contained.
//
// Received results are not correlated back to the frame that produced
// them; "most recent received" is the set shown, an accepted imprecision
// of live monitoring.

use crate::alerts::AlertPolicy;
use crate::buffer::DetectionBuffer;
use crate::capture::CaptureSource;
use crate::encoder::FrameEncoder;
use crate::overlay;
use crate::session::TransportSession;
use crate::types::Config;
use anyhow::Result;
use opencv::highgui;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Gates outbound sends on elapsed time: frames are throttled, not sent
/// every tick. A frame that arrives inside the interval is dropped, never
/// queued.
pub struct SendThrottle {
    interval: Duration,
    last_send: Option<Instant>,
}

impl SendThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_send: None,
        }
    }

    /// True when the interval has elapsed since the last accepted send.
    /// Accepting advances the window.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last_send {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_send = Some(now);
                true
            }
        }
    }
}

/// Run the sampling loop until the capture source stops. Teardown is
/// joint: no further ticks, device released, session closed — all before
/// returning.
pub async fn run(
    capture: &mut CaptureSource,
    session: &mut TransportSession,
    buffer: &Arc<Mutex<DetectionBuffer>>,
    policy: &AlertPolicy,
    config: &Config,
) -> Result<()> {
    let encoder = FrameEncoder::new(config.stream.jpeg_quality);
    let mut throttle = SendThrottle::new(Duration::from_millis(config.stream.send_interval_ms));
    let window = config.capture.window_title.as_str();

    highgui::named_window(window, highgui::WINDOW_AUTOSIZE)?;
    let mut ticks: u64 = 0;

    while capture.is_active() {
        let frame = match capture.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                warn!("Frame read failed: {}", e);
                break;
            }
        };
        ticks += 1;

        // 1. Redraw the live frame every tick, network or not.
        let mut canvas = match overlay::frame_to_canvas(&frame) {
            Ok(mat) => mat,
            Err(e) => {
                warn!("Canvas rebuild failed: {}", e);
                continue;
            }
        };

        // 2. Throttled encode + submit while the session is open. The
        //    short-circuit keeps the throttle window untouched when the
        //    session is down.
        if session.is_open() && throttle.ready(Instant::now()) {
            match encoder.encode_data_url(&frame) {
                Ok(payload) => session.send(payload).await,
                Err(e) => warn!("Frame encode failed: {}", e),
            }
        }

        // 3. Overlay the most recent detection set on the fresh redraw.
        let latest = buffer.lock().unwrap().latest().cloned();
        if let Some(result) = latest {
            if let Err(e) = overlay::render_detections(&mut canvas, &result.detections, policy) {
                warn!("Overlay render failed: {}", e);
            }
        }

        if let Err(e) = highgui::imshow(window, &canvas) {
            warn!("Display failed: {}", e);
            break;
        }

        let key = highgui::wait_key(1).unwrap_or(-1);
        if key == 'q' as i32 {
            info!("Stop requested");
            break;
        }
    }

    capture.release();
    session.close().await;
    let _ = highgui::destroy_window(window);

    info!("Sampling loop stopped after {} ticks", ticks);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_first_tick_sends() {
        let mut throttle = SendThrottle::new(Duration::from_millis(200));
        assert!(throttle.ready(Instant::now()));
    }

    #[test]
    fn test_throttle_blocks_inside_interval() {
        let mut throttle = SendThrottle::new(Duration::from_millis(200));
        let start = Instant::now();

        assert!(throttle.ready(start));
        assert!(!throttle.ready(start + Duration::from_millis(50)));
        assert!(!throttle.ready(start + Duration::from_millis(199)));
        assert!(throttle.ready(start + Duration::from_millis(200)));
    }

    #[test]
    fn test_throttle_bounds_sends_per_duration() {
        // 100 ticks at 10ms spacing with a 200ms interval: sends land at
        // t=0, 200, 400, 600, 800 — five, never one per tick.
        let mut throttle = SendThrottle::new(Duration::from_millis(200));
        let start = Instant::now();

        let sends = (0..100u64)
            .filter(|i| throttle.ready(start + Duration::from_millis(i * 10)))
            .count();

        assert_eq!(sends, 5);
    }
}
