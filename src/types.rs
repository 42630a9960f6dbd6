use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub capture: CaptureConfig,
    pub stream: StreamConfig,
    pub buffer: BufferConfig,
    pub alerts: AlertConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub stream_path: String,
    pub detect_path: String,
}

impl ServerConfig {
    pub fn stream_url(&self) -> String {
        format!("ws://{}{}", self.host, self.stream_path)
    }

    pub fn detect_url(&self) -> String {
        format!("http://{}{}", self.host, self.detect_path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Camera index ("0", "1", ...), video file path, or RTSP URL
    pub source: String,
    pub window_title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    pub send_interval_ms: u64,
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    pub retention: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// One RGB frame pulled from the capture source. Lives for a single tick.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub timestamp_ms: f64,
}

/// One recognized object instance from the detector.
///
/// Box coordinates are normalized (x1, y1, x2, y2), each in [0, 1] relative
/// to frame width/height. They stay normalized until the overlay renderer
/// maps them to the display surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: String,
    pub confidence: f32,
    #[serde(rename = "box")]
    pub bbox: [f32; 4],
}

/// Wire shape of one inbound message on the streaming channel.
#[derive(Debug, Deserialize)]
pub struct DetectionMessage {
    pub detections: Vec<Detection>,
}

/// One parsed inbound message, stamped at receipt. The detections list may
/// be empty — that is a valid result that clears the overlay.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub detections: Vec<Detection>,
    pub received_at: DateTime<Utc>,
}

impl DetectionResult {
    pub fn from_message(message: DetectionMessage) -> Self {
        Self {
            detections: message.detections,
            received_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_detection_message() {
        let text = r#"{"detections":[{"class":"No-Hardhat","confidence":0.92,"box":[0.1,0.1,0.3,0.4]}]}"#;
        let message: DetectionMessage = serde_json::from_str(text).unwrap();

        assert_eq!(message.detections.len(), 1);
        let det = &message.detections[0];
        assert_eq!(det.class, "No-Hardhat");
        assert!((det.confidence - 0.92).abs() < 1e-6);
        assert_eq!(det.bbox, [0.1, 0.1, 0.3, 0.4]);
    }

    #[test]
    fn test_parse_empty_detections() {
        let message: DetectionMessage = serde_json::from_str(r#"{"detections":[]}"#).unwrap();
        assert!(message.detections.is_empty());

        let result = DetectionResult::from_message(message);
        assert!(result.is_empty());
    }

    #[test]
    fn test_malformed_message_is_an_error() {
        assert!(serde_json::from_str::<DetectionMessage>("not json").is_err());
        assert!(serde_json::from_str::<DetectionMessage>(r#"{"boxes":[]}"#).is_err());
        assert!(
            serde_json::from_str::<DetectionMessage>(r#"{"detections":[{"class":"x"}]}"#).is_err()
        );
    }

    #[test]
    fn test_endpoint_urls() {
        let server = ServerConfig {
            host: "127.0.0.1:8000".to_string(),
            stream_path: "/ws/video".to_string(),
            detect_path: "/detect/".to_string(),
        };

        assert_eq!(server.stream_url(), "ws://127.0.0.1:8000/ws/video");
        assert_eq!(server.detect_url(), "http://127.0.0.1:8000/detect/");
    }
}
