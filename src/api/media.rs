//! Uploads images to the hosted image service and builds transformed delivery URLs for them.

use crate::{Config, Result};
use anyhow::{bail, Context};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, trace};
use url::Url;

/// The stored image as the host reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedImage {
    /// The HTTPS delivery URL.
    #[serde(rename = "secure_url")]
    pub url: String,
    pub public_id: String,
}

/// The hosted upload API; the account name fills the placeholder.
const UPLOAD_ENDPOINT: &str = "https://api.cloudinary.com/v1_1/{cloud_name}/image/upload";

/// Uploads images with an unsigned upload preset.
///
/// The account is named twice: in the endpoint path and as the `cloud_name` field of the form.
pub struct MediaHost {
    client: Client,
    endpoint: String,
    cloud_name: String,
    upload_preset: String,
}

impl MediaHost {
    pub fn new(config: &Config) -> Result<Self> {
        let endpoint = UPLOAD_ENDPOINT.replace("{cloud_name}", config.cloud_name());
        Self::with_endpoint(config, endpoint)
    }

    /// Uploads to `endpoint` instead of the hosted API.
    pub fn with_endpoint(config: &Config, endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Unable to create the HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            cloud_name: config.cloud_name().to_string(),
            upload_preset: config.upload_preset().to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends `bytes` as a single multipart upload. The upload is attempted once.
    pub async fn upload(&self, bytes: Vec<u8>, file_name: &str) -> Result<UploadedImage> {
        debug!("Uploading {file_name} ({} bytes)", bytes.len());
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_type(file_name))
            .context("Invalid mime type")?;
        let form = Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone())
            .text("cloud_name", self.cloud_name.clone());

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("Failed to send the upload request for {file_name}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            bail!("The upload of {file_name} failed with status {status}: {body}");
        }

        let image: UploadedImage = response
            .json()
            .await
            .context("Failed to parse the upload response")?;
        trace!("Uploaded {file_name} as {}", image.public_id);
        Ok(image)
    }

    /// Reads `path` and uploads it under its file name.
    pub async fn upload_file(&self, path: &Path) -> Result<UploadedImage> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Unable to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());
        self.upload(bytes, &file_name).await
    }
}

/// The mime type for an image file name, by extension.
fn mime_type(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "avif" => "image/avif",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}

/// How an image is fitted to the requested width and height.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Crop {
    Fill,
    Fit,
    Scale,
    Thumb,
    Limit,
    Pad,
}

serde_plain::derive_display_from_serialize!(Crop);
serde_plain::derive_fromstr_from_deserialize!(Crop);

/// Delivery options for an uploaded image. Unset options are left to the host's defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    pub format: Option<String>,
    pub quality: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub crop: Option<Crop>,
    pub blur: Option<u32>,
    pub dpr: Option<f32>,
}

impl Transformation {
    /// A small square preview for lists.
    pub fn thumbnail() -> Self {
        Self {
            format: Some("auto".into()),
            quality: Some("auto".into()),
            width: Some(150),
            height: Some(150),
            crop: Some(Crop::Thumb),
            ..Default::default()
        }
    }

    /// A tiny blurred stand-in shown while the real image loads.
    pub fn placeholder() -> Self {
        Self {
            format: Some("auto".into()),
            quality: Some("10".into()),
            width: Some(40),
            blur: Some(400),
            ..Default::default()
        }
    }

    /// A cropped banner of exactly `width` by `height`.
    pub fn cover(width: u32, height: u32) -> Self {
        Self {
            format: Some("auto".into()),
            quality: Some("auto".into()),
            width: Some(width),
            height: Some(height),
            crop: Some(Crop::Fill),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.directives().is_empty()
    }

    /// Renders the set options as a directive segment such as `f_auto,q_auto,w_300,c_fill`.
    pub fn directives(&self) -> String {
        let mut parts = Vec::new();
        if let Some(format) = &self.format {
            parts.push(format!("f_{format}"));
        }
        if let Some(quality) = &self.quality {
            parts.push(format!("q_{quality}"));
        }
        if let Some(width) = self.width {
            parts.push(format!("w_{width}"));
        }
        if let Some(height) = self.height {
            parts.push(format!("h_{height}"));
        }
        if let Some(crop) = self.crop {
            parts.push(format!("c_{crop}"));
        }
        if let Some(blur) = self.blur {
            parts.push(format!("e_blur:{blur}"));
        }
        if let Some(dpr) = self.dpr {
            parts.push(format!("dpr_{dpr:.1}"));
        }
        parts.join(",")
    }
}

/// Rewrites a delivery URL so that the host applies `transformation`. The directives are inserted
/// as the path segment right after `upload`. An empty transformation returns the URL unchanged.
pub fn variant_url(url: &str, transformation: &Transformation) -> Result<String> {
    let mut parsed = Url::parse(url).with_context(|| format!("Invalid image URL '{url}'"))?;
    let directives = transformation.directives();
    if directives.is_empty() {
        return Ok(parsed.to_string());
    }
    let mut segments: Vec<String> = parsed
        .path_segments()
        .with_context(|| format!("The image URL '{url}' has no path"))?
        .map(str::to_string)
        .collect();
    let upload = segments
        .iter()
        .position(|s| s == "upload")
        .with_context(|| format!("The image URL '{url}' is not an upload URL"))?;
    segments.insert(upload + 1, directives);
    parsed.set_path(&segments.join("/"));
    Ok(parsed.to_string())
}
