//! Image generation and editing gateway calls
//!
//! Both calls are single-shot: one request, one base64-encoded image
//! result. A transport-successful response carrying no image payload is a
//! `Generation` error, not a success with an empty result.

use crate::error::{PolymodeError, Result};
use crate::gateway::{upstream_failure, GatewayContext, InlineMedia};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    aspect_ratio: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    images: Vec<ImagePayload>,
}

#[derive(Debug, Deserialize)]
struct ImagePayload {
    data: String,
}

#[derive(Debug, Serialize)]
struct EditRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    source: &'a InlineMedia,
}

#[derive(Debug, Deserialize)]
struct EditResponse {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponsePart {
    Text {
        #[allow(dead_code)]
        text: String,
    },
    InlineData {
        #[allow(dead_code)]
        mime_type: String,
        data: String,
    },
}

/// Generate an image from a prompt
///
/// # Arguments
///
/// * `ctx` - Gateway context
/// * `prompt` - What to draw
/// * `aspect_ratio` - e.g. "1:1", "16:9"
///
/// # Returns
///
/// The base64-encoded image payload.
///
/// # Errors
///
/// Returns `PolymodeError::Generation` if the backend returns zero images,
/// `PolymodeError::Upstream` for backend failures.
pub async fn generate_image(
    ctx: &GatewayContext,
    prompt: &str,
    aspect_ratio: &str,
) -> Result<String> {
    let credential = ctx.credential()?;
    let request = GenerateRequest {
        model: &ctx.config().image_model,
        prompt,
        aspect_ratio,
    };

    let response = ctx
        .client()
        .post(ctx.endpoint("/v1/images/generate"))
        .bearer_auth(&credential)
        .json(&request)
        .send()
        .await
        .map_err(|e| PolymodeError::Upstream(format!("Image request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(upstream_failure(response).await.into());
    }

    let body: GenerateResponse = response
        .json()
        .await
        .map_err(|e| PolymodeError::Upstream(format!("Invalid image response: {}", e)))?;

    body.images
        .into_iter()
        .next()
        .map(|img| img.data)
        .ok_or_else(|| {
            PolymodeError::Generation("backend returned zero images".to_string()).into()
        })
}

/// Edit an image according to a prompt
///
/// # Arguments
///
/// * `ctx` - Gateway context
/// * `prompt` - The edit instruction
/// * `source` - The inlined source image
///
/// # Returns
///
/// The base64-encoded edited image, taken from the first inline-data part
/// of the response.
///
/// # Errors
///
/// Returns `PolymodeError::Generation` if no image part is found in the
/// response.
pub async fn edit_image(
    ctx: &GatewayContext,
    prompt: &str,
    source: &InlineMedia,
) -> Result<String> {
    let credential = ctx.credential()?;
    let request = EditRequest {
        model: &ctx.config().image_model,
        prompt,
        source,
    };

    let response = ctx
        .client()
        .post(ctx.endpoint("/v1/images/edit"))
        .bearer_auth(&credential)
        .json(&request)
        .send()
        .await
        .map_err(|e| PolymodeError::Upstream(format!("Image edit request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(upstream_failure(response).await.into());
    }

    let body: EditResponse = response
        .json()
        .await
        .map_err(|e| PolymodeError::Upstream(format!("Invalid edit response: {}", e)))?;

    body.parts
        .into_iter()
        .find_map(|part| match part {
            ResponsePart::InlineData { data, .. } => Some(data),
            ResponsePart::Text { .. } => None,
        })
        .ok_or_else(|| {
            PolymodeError::Generation("no image part found in edit response".to_string()).into()
        })
}

/// Read a media file and prepare it for inlining
///
/// Image files are format-sniffed from their bytes; other media falls back
/// to an extension-based MIME type.
///
/// # Errors
///
/// Returns `PolymodeError::Io` if the file cannot be read.
pub fn inline_media_from_path(path: impl AsRef<Path>) -> Result<InlineMedia> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(PolymodeError::Io)?;
    let mime = sniff_mime(path, &bytes);
    Ok(InlineMedia {
        mime,
        data: BASE64.encode(&bytes),
    })
}

/// Best-effort MIME detection: image sniffing first, extension fallback
fn sniff_mime(path: &Path, bytes: &[u8]) -> String {
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type().to_string();
    }
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp4") => "video/mp4".to_string(),
        Some("mov") => "video/quicktime".to_string(),
        Some("webm") => "video/webm".to_string(),
        Some("wav") => "audio/wav".to_string(),
        Some("mp3") => "audio/mpeg".to_string(),
        Some("ogg") => "audio/ogg".to_string(),
        _ => "application/octet-stream".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Smallest valid PNG header bytes; enough for format sniffing.
    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_sniff_mime_detects_png_bytes() {
        let mime = sniff_mime(Path::new("whatever.bin"), PNG_MAGIC);
        assert_eq!(mime, "image/png");
    }

    #[test]
    fn test_sniff_mime_falls_back_to_extension() {
        assert_eq!(sniff_mime(Path::new("clip.mp4"), b"notanimage"), "video/mp4");
        assert_eq!(sniff_mime(Path::new("take.WAV"), b"RIFFdata"), "audio/wav");
        assert_eq!(
            sniff_mime(Path::new("mystery"), b"????"),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_inline_media_from_path_encodes_base64() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("img.png");
        std::fs::write(&path, PNG_MAGIC).unwrap();

        let media = inline_media_from_path(&path).unwrap();
        assert_eq!(media.mime, "image/png");
        assert_eq!(BASE64.decode(&media.data).unwrap(), PNG_MAGIC);
    }

    #[test]
    fn test_inline_media_missing_file_errors() {
        assert!(inline_media_from_path("/nonexistent/file.png").is_err());
    }

    #[test]
    fn test_edit_response_part_parsing() {
        let json = r#"{"parts":[{"type":"text","text":"sure"},{"type":"inline_data","mime_type":"image/png","data":"aGk="}]}"#;
        let body: EditResponse = serde_json::from_str(json).unwrap();
        let data = body
            .parts
            .into_iter()
            .find_map(|p| match p {
                ResponsePart::InlineData { data, .. } => Some(data),
                _ => None,
            })
            .unwrap();
        assert_eq!(data, "aGk=");
    }
}
