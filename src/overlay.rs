// src/overlay.rs
//
// Overlay renderer: redraws the live frame and annotates it with the
// latest detection set. Denormalization from detector coordinates to
// surface pixels happens here and nowhere else.
//
// Pure with respect to its inputs except for mutating the canvas; no
// network or buffer I/O.

use crate::alerts::AlertPolicy;
use crate::types::{Detection, Frame};
use anyhow::Result;
use opencv::{
    core::{self, Mat},
    imgproc,
    prelude::*,
};

/// Colors for box/label rendering (BGR format for OpenCV). Alert mirrors
/// the UI's #e74c3c, normal its #2ecc71.
pub mod colors {
    use opencv::core::Scalar;

    pub const ALERT_BOX: Scalar = Scalar::new(60.0, 76.0, 231.0, 0.0);
    pub const NORMAL_BOX: Scalar = Scalar::new(113.0, 204.0, 46.0, 0.0);
    pub const LABEL_TEXT: Scalar = Scalar::new(255.0, 255.0, 255.0, 0.0);
}

const BOX_THICKNESS: i32 = 2;
const LABEL_HEIGHT: i32 = 20;
const LABEL_PAD: i32 = 10;
const FONT_SCALE: f64 = 0.5;

/// Rebuild the display canvas from the current frame (RGB → BGR).
/// Runs every tick regardless of network activity.
pub fn frame_to_canvas(frame: &Frame) -> Result<Mat> {
    let mat = Mat::from_slice(&frame.data)?;
    let mat = mat.reshape(3, frame.height as i32)?;

    let mut bgr = Mat::default();
    imgproc::cvt_color(&mat, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;
    Ok(bgr)
}

/// Map a normalized box to surface pixels: pixel_x1 = x1 × W, etc.
/// Exact multiplication — no rounding or clamping before this stage, and
/// an inverted box (x1 ≥ x2) passes through with its negative extent.
pub fn denormalize_box(bbox: [f32; 4], surface_w: i32, surface_h: i32) -> core::Rect {
    let [x1, y1, x2, y2] = bbox;
    let x = x1 * surface_w as f32;
    let y = y1 * surface_h as f32;
    let w = (x2 - x1) * surface_w as f32;
    let h = (y2 - y1) * surface_h as f32;
    core::Rect::new(x as i32, y as i32, w as i32, h as i32)
}

pub fn label_text(det: &Detection) -> String {
    format!("{} {}%", det.class, (det.confidence * 100.0).round() as i32)
}

/// Draw the detection set onto the canvas in buffer order. An empty set
/// draws nothing, which clears the overlay for this tick.
pub fn render_detections(
    canvas: &mut Mat,
    detections: &[Detection],
    policy: &AlertPolicy,
) -> Result<()> {
    let surface_w = canvas.cols();
    let surface_h = canvas.rows();

    for det in detections {
        let rect = denormalize_box(det.bbox, surface_w, surface_h);
        let color = if policy.is_alert(&det.class) {
            colors::ALERT_BOX
        } else {
            colors::NORMAL_BOX
        };

        imgproc::rectangle(canvas, rect, color, BOX_THICKNESS, imgproc::LINE_8, 0)?;

        let text = label_text(det);
        let mut baseline = 0;
        let text_size = imgproc::get_text_size(
            &text,
            imgproc::FONT_HERSHEY_SIMPLEX,
            FONT_SCALE,
            1,
            &mut baseline,
        )?;

        // Filled label background directly above the box
        imgproc::rectangle(
            canvas,
            core::Rect::new(
                rect.x,
                rect.y - LABEL_HEIGHT,
                text_size.width + LABEL_PAD,
                LABEL_HEIGHT,
            ),
            color,
            -1,
            imgproc::LINE_8,
            0,
        )?;

        imgproc::put_text(
            canvas,
            &text,
            core::Point::new(rect.x + 5, rect.y - 5),
            imgproc::FONT_HERSHEY_SIMPLEX,
            FONT_SCALE,
            colors::LABEL_TEXT,
            1,
            imgproc::LINE_8,
            false,
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denormalize_box_exact() {
        // The streaming scenario: [0.1, 0.1, 0.3, 0.4] on a 640x480 surface
        let rect = denormalize_box([0.1, 0.1, 0.3, 0.4], 640, 480);

        assert_eq!(rect.x, 64);
        assert_eq!(rect.y, 48);
        assert_eq!(rect.width, 128);
        assert_eq!(rect.height, 144);
        // Bottom-right corner lands at (192, 192)
        assert_eq!(rect.x + rect.width, 192);
        assert_eq!(rect.y + rect.height, 192);
    }

    #[test]
    fn test_denormalize_full_surface() {
        let rect = denormalize_box([0.0, 0.0, 1.0, 1.0], 640, 480);
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (0, 0, 640, 480));
    }

    #[test]
    fn test_inverted_box_passes_through() {
        // x1 >= x2: no clamping or skipping, the negative extent is kept
        let rect = denormalize_box([0.5, 0.5, 0.2, 0.2], 100, 100);

        assert_eq!(rect.x, 50);
        assert_eq!(rect.width, -30);
        assert_eq!(rect.height, -30);
    }

    #[test]
    fn test_label_text_rounds_confidence() {
        let det = |confidence| Detection {
            class: "No-Hardhat".to_string(),
            confidence,
            bbox: [0.0, 0.0, 1.0, 1.0],
        };

        assert_eq!(label_text(&det(0.92)), "No-Hardhat 92%");
        assert_eq!(label_text(&det(0.925)), "No-Hardhat 93%");
        assert_eq!(label_text(&det(1.0)), "No-Hardhat 100%");
        assert_eq!(label_text(&det(0.004)), "No-Hardhat 0%");
    }
}
