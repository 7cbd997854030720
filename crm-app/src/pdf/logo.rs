use std::path::Path;

use base64::Engine as _;
use printpdf::image_crate::{self, DynamicImage};
use tracing::warn;

use crate::error::{Error, Result};

fn mime_from_extension(path: &str) -> &'static str {
    let lower = path.to_ascii_lowercase();
    let ext = Path::new(&lower).extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        _ => "image/png",
    }
}

pub fn to_data_url(mime: &str, bytes: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime};base64,{encoded}")
}

/// Resolves a logo reference into a base64 data URL. Accepts a data URL as
/// is, fetches `http(s)` URLs and otherwise reads a local file.
pub async fn fetch_logo_data_url(source: &str) -> Result<String> {
    let source = source.trim();
    if source.to_ascii_lowercase().starts_with("data:") {
        return Ok(source.to_string());
    }

    if source.starts_with("http://") || source.starts_with("https://") {
        let response = reqwest::get(source).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Backend {
                status: status.as_u16(),
                message: format!("logo fetch failed for {source}"),
            });
        }
        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_string())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or_else(|| mime_from_extension(source).to_string());
        let bytes = response.bytes().await?;
        return Ok(to_data_url(&mime, &bytes));
    }

    let bytes = tokio::fs::read(source).await?;
    Ok(to_data_url(mime_from_extension(source), &bytes))
}

/// Decodes `data:image/*;base64,...` into an image. Anything else is `None`.
pub fn decode_data_url(data_url: &str) -> Option<DynamicImage> {
    let s = data_url.trim();
    if !s.to_ascii_lowercase().starts_with("data:") {
        return None;
    }
    let comma = s.find(',')?;
    let (meta, data) = s.split_at(comma);
    if !meta.to_ascii_lowercase().contains(";base64") {
        return None;
    }
    let bytes = base64::engine::general_purpose::STANDARD.decode(&data[1..]).ok()?;
    image_crate::load_from_memory(&bytes).ok()
}

/// A missing or broken logo is not an error; the company name is printed
/// instead.
pub async fn load_logo(source: Option<&str>) -> Option<DynamicImage> {
    let source = source.map(str::trim).filter(|s| !s.is_empty())?;
    match fetch_logo_data_url(source).await {
        Ok(data_url) => {
            let image = decode_data_url(&data_url);
            if image.is_none() {
                warn!(source, "logo is not a decodable image");
            }
            image
        }
        Err(e) => {
            warn!(source, error = %e, "logo unavailable");
            None
        }
    }
}
