// src/detect_client.rs
//
// One-shot detection path: upload a user-supplied image or video file to
// the request/response detect endpoint and report the results. Separate
// from the streaming pipeline — no session, no buffer.

use crate::alerts::AlertPolicy;
use crate::types::{Detection, ServerConfig};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct DetectResponse {
    pub detections: Vec<Detection>,
    /// Server-side reference to the rendered/annotated result image
    pub image_path: String,
}

pub struct DetectClient {
    http_client: reqwest::Client,
    host: String,
    detect_url: String,
}

impl DetectClient {
    pub fn new(server: &ServerConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            host: server.host.clone(),
            detect_url: server.detect_url(),
        })
    }

    /// Submit one file as a multipart upload and parse the JSON response.
    pub async fn detect_file(&self, path: &Path) -> Result<DetectResponse> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime_for(path))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        info!("Submitting {} for one-shot detection", path.display());

        let resp = self
            .http_client
            .post(&self.detect_url)
            .multipart(form)
            .send()
            .await
            .context("Detection request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Detection server error {}: {}", status, body);
        }

        resp.json::<DetectResponse>()
            .await
            .context("Failed to parse detection response")
    }

    /// Fetch the annotated result image and save it next to the input.
    pub async fn fetch_annotated(&self, image_path: &str, out_dir: &Path) -> Result<PathBuf> {
        let url = if image_path.starts_with("http") {
            image_path.to_string()
        } else {
            format!("http://{}/{}", self.host, image_path.trim_start_matches('/'))
        };

        let resp = self
            .http_client
            .get(&url)
            .send()
            .await
            .context("Annotated image request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("Annotated image fetch failed: HTTP {}", resp.status());
        }

        let bytes = resp.bytes().await?;
        let file_name = image_path.rsplit('/').next().unwrap_or("annotated.jpg");
        let out_path = out_dir.join(file_name);
        tokio::fs::write(&out_path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", out_path.display()))?;

        Ok(out_path)
    }
}

/// Log the result set the way the UI's results panel lists it.
pub fn report_results(response: &DetectResponse, policy: &AlertPolicy) {
    if response.detections.is_empty() {
        info!("No PPE detections in this file");
        return;
    }

    for det in &response.detections {
        let pct = (det.confidence * 100.0).round() as i32;
        let boxed: Vec<i32> = det.bbox.iter().map(|v| v.round() as i32).collect();
        if policy.is_alert(&det.class) {
            warn!("⚠ {} {}% box={:?}", det.class, pct, boxed);
        } else {
            info!("✓ {} {}% box={:?}", det.class, pct, boxed);
        }
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("mp4") => "video/mp4",
        Some("avi") => "video/x-msvideo",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_detect_response() {
        let body = r#"{
            "detections": [
                {"class": "No-Hardhat", "confidence": 0.87, "box": [0.2, 0.1, 0.5, 0.6]},
                {"class": "Safety Vest", "confidence": 0.95, "box": [0.1, 0.4, 0.3, 0.9]}
            ],
            "image_path": "uploads/annotated_0001.jpg"
        }"#;

        let response: DetectResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.detections.len(), 2);
        assert_eq!(response.detections[0].class, "No-Hardhat");
        assert_eq!(response.image_path, "uploads/annotated_0001.jpg");
    }

    #[test]
    fn test_mime_for_extension() {
        assert_eq!(mime_for(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(mime_for(Path::new("a.png")), "image/png");
        assert_eq!(mime_for(Path::new("clip.mp4")), "video/mp4");
        assert_eq!(mime_for(Path::new("noext")), "application/octet-stream");
    }
}
