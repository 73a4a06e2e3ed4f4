//! Amazon Rekognition image labeling.
//!
//! Calls the `DetectLabels` action of the Rekognition JSON API directly over
//! `reqwest`, signed with [`sigv4`](crate::sigv4). The image is sent inline
//! as base64 bytes; no S3 staging is involved.
//!
//! # Configuration
//!
//! - `AWS_REGION` selects `https://rekognition.<region>.amazonaws.com/`.
//! - `REKOGNITION_ENDPOINT` overrides the endpoint (LocalStack etc.).
//! - Credentials come from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`
//!   and optionally `AWS_SESSION_TOKEN`.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use serde::Deserialize;

use crate::config::AwsConfig;
use crate::models::{LabelParent, RawLabel};
use crate::sigv4::{sign_request, AwsCredentials, SignableRequest};
use crate::traits::ImageLabeler;

const SERVICE: &str = "rekognition";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const DETECT_LABELS_TARGET: &str = "RekognitionService.DetectLabels";

/// A Rekognition client implementing [`ImageLabeler`].
pub struct RekognitionClient {
    http: reqwest::Client,
    /// Full request URL, e.g. `https://rekognition.us-east-1.amazonaws.com/`.
    url: String,
    /// Host header value that is signed.
    host: String,
    region: String,
    credentials: AwsCredentials,
}

impl RekognitionClient {
    pub fn new(http: reqwest::Client, aws: &AwsConfig) -> Self {
        let (url, host) = match aws.rekognition_endpoint {
            Some(ref endpoint) => {
                let trimmed = endpoint.trim_end_matches('/');
                let host = trimmed
                    .trim_start_matches("https://")
                    .trim_start_matches("http://")
                    .to_string();
                (format!("{}/", trimmed), host)
            }
            None => {
                let host = format!("rekognition.{}.amazonaws.com", aws.region);
                (format!("https://{}/", host), host)
            }
        };

        Self {
            http,
            url,
            host,
            region: aws.region.clone(),
            credentials: aws.credentials.clone(),
        }
    }
}

#[async_trait]
impl ImageLabeler for RekognitionClient {
    async fn detect_labels(
        &self,
        image: &[u8],
        max_labels: u32,
        min_confidence: f32,
    ) -> Result<Vec<RawLabel>> {
        let body = serde_json::to_vec(&serde_json::json!({
            "Image": { "Bytes": base64::engine::general_purpose::STANDARD.encode(image) },
            "MaxLabels": max_labels,
            "MinConfidence": min_confidence,
        }))?;

        let signable = SignableRequest {
            method: "POST",
            host: &self.host,
            path: "/",
            query: &[],
            headers: &[
                ("Content-Type", CONTENT_TYPE),
                ("X-Amz-Target", DETECT_LABELS_TARGET),
            ],
            payload: &body,
        };
        let signed = sign_request(&signable, &self.credentials, &self.region, SERVICE, Utc::now());

        let resp = signed
            .apply(self.http.post(&self.url))
            .header("Content-Type", CONTENT_TYPE)
            .header("X-Amz-Target", DETECT_LABELS_TARGET)
            .body(body)
            .send()
            .await
            .with_context(|| format!("Failed to call Rekognition DetectLabels at {}", self.url))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!(
                "Rekognition DetectLabels failed (HTTP {}): {}",
                status,
                text.chars().take(500).collect::<String>()
            );
        }

        let text = resp.text().await?;
        parse_detect_labels_response(&text)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DetectLabelsResponse {
    #[serde(default)]
    labels: Vec<AwsLabel>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwsLabel {
    name: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    parents: Vec<AwsParent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwsParent {
    name: String,
}

/// Parse a `DetectLabels` JSON response body.
fn parse_detect_labels_response(body: &str) -> Result<Vec<RawLabel>> {
    let parsed: DetectLabelsResponse =
        serde_json::from_str(body).context("Invalid Rekognition DetectLabels response")?;

    Ok(parsed
        .labels
        .into_iter()
        .map(|label| RawLabel {
            name: label.name,
            confidence: label.confidence,
            parents: label
                .parents
                .into_iter()
                .map(|p| LabelParent { name: p.name })
                .collect(),
        })
        .collect())
}
