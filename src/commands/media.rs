use crate::api::{variant_url, MediaHost, Transformation, UploadedImage};
use crate::args::{ImagePreset, ImageUrlArgs};
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::session::{require_session, SessionStore};
use crate::{Config, Result};
use anyhow::{anyhow, Context};
use std::path::Path;

const COVER_WIDTH: u32 = 1200;
const COVER_HEIGHT: u32 = 400;

/// Uploads the image at `path`. Requires a session and a configured image host account.
pub async fn upload(
    config: &Config,
    store: &dyn SessionStore,
    path: &Path,
) -> Result<Out<UploadedImage>> {
    require_session(store).await?;
    if config.cloud_name().is_empty() || config.upload_preset().is_empty() {
        return Err(anyhow!(
            "No image host account is configured, set cloud_name and upload_preset in '{}'",
            config.config_path().display()
        ))
        .pub_result(ErrorType::Config);
    }
    let host = MediaHost::new(config).pub_result(ErrorType::Config)?;
    upload_to(&host, path).await
}

async fn upload_to(host: &MediaHost, path: &Path) -> Result<Out<UploadedImage>> {
    let image = host
        .upload_file(path)
        .await
        .with_context(|| format!("Unable to upload {}", path.display()))
        .pub_result(ErrorType::Upload)?;
    Ok(Out::new(
        format!("Uploaded {} to {}", path.display(), image.url),
        image,
    ))
}

/// Builds the delivery URL for a variant of an uploaded image.
pub fn image_url(args: &ImageUrlArgs) -> Result<Out<String>> {
    let transformation = transformation_of(args);
    let url = variant_url(args.url(), &transformation).pub_result(ErrorType::Request)?;
    Ok(Out::new(url.clone(), url))
}

/// Starts from the preset, if any, and lets each given flag override it.
fn transformation_of(args: &ImageUrlArgs) -> Transformation {
    let mut t = match args.preset() {
        Some(ImagePreset::Thumbnail) => Transformation::thumbnail(),
        Some(ImagePreset::Placeholder) => Transformation::placeholder(),
        Some(ImagePreset::Cover) => Transformation::cover(
            args.width().unwrap_or(COVER_WIDTH),
            args.height().unwrap_or(COVER_HEIGHT),
        ),
        None => Transformation::default(),
    };
    if let Some(format) = args.format() {
        t.format = Some(format.to_string());
    }
    if let Some(quality) = args.quality() {
        t.quality = Some(quality.to_string());
    }
    t.width = args.width().or(t.width);
    t.height = args.height().or(t.height);
    t.crop = args.crop().or(t.crop);
    t.blur = args.blur().or(t.blur);
    t.dpr = args.dpr().or(t.dpr);
    t
}
