//! Gender detection from profile pictures via the PicPurify API.

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Default PicPurify analysis endpoint.
pub const DEFAULT_PICPURIFY_ENDPOINT: &str = "https://www.picpurify.com/analyse/1.1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Gender label of the first face found in an image.
#[derive(Debug, Clone, PartialEq)]
pub struct GenderPrediction {
    /// Capitalized label, `Male` or `Female`.
    pub label: String,
    pub confidence: Option<f64>,
}

/// Result of analysing one image.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    Face(GenderPrediction),
    /// No face found, or the service rejected the image.
    NoFace,
}

/// Client for PicPurify's `face_gender_detection` task.
#[derive(Clone)]
pub struct PicPurifyClient {
    http: Client,
    api_key: String,
    endpoint: String,
}

impl PicPurifyClient {
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build PicPurify HTTP client")?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        })
    }

    /// Analyse the image at `image_url`.
    ///
    /// Transport and HTTP errors are returned as errors; an answer the
    /// service marks as failed is [`Detection::NoFace`].
    pub async fn detect(&self, image_url: &str) -> Result<Detection> {
        let form = [
            ("API_KEY", self.api_key.as_str()),
            ("url_image", image_url),
            ("task", "face_gender_detection"),
        ];
        let response = self
            .http
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await
            .with_context(|| format!("Failed to call PicPurify at {}", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("PicPurify request failed with status {status}");
        }
        let body: Value = response
            .json()
            .await
            .context("Failed to parse PicPurify response")?;
        Ok(parse_detection(&body))
    }
}

/// Interpret a PicPurify response body.
pub fn parse_detection(body: &Value) -> Detection {
    if body.get("status").and_then(Value::as_str) != Some("success") {
        let reason = body
            .pointer("/error/errorMsg")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error");
        tracing::warn!("PicPurify error: {}", reason);
        return Detection::NoFace;
    }

    let first_face = body
        .pointer("/face_detection/results")
        .and_then(Value::as_array)
        .and_then(|faces| faces.first());
    let Some(face) = first_face else {
        return Detection::NoFace;
    };

    let decision = face
        .pointer("/gender/decision")
        .and_then(Value::as_str)
        .unwrap_or_default();
    Detection::Face(GenderPrediction {
        label: capitalize(decision),
        confidence: face.pointer("/gender/confidence_score").and_then(Value::as_f64),
    })
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
