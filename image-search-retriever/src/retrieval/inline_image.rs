//! Inline image encoding: data URLs in and out
//!
//! Images leave the service as `data:image/<fmt>;base64,<payload>` strings
//! holding the original file bytes unchanged. Uploads arrive either as a full
//! data URL or as bare base64.

use crate::error::{Result, SearchError};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::Path;

/// Wraps already-encoded image bytes in a data URL.
///
/// The MIME type comes from sniffing the bytes, so the result is only
/// produced for something an image codec recognizes.
pub fn to_data_url(bytes: &[u8]) -> Result<String> {
    let format = image::guess_format(bytes).map_err(|e| SearchError::decode(e.to_string()))?;
    Ok(format!(
        "data:{};base64,{}",
        format.to_mime_type(),
        STANDARD.encode(bytes)
    ))
}

/// Reads an image file and encodes it as a data URL.
pub async fn encode_file(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SearchError::FileMissing {
            path: path.to_path_buf(),
        },
        _ => SearchError::decode(format!("Cannot read {}: {e}", path.display())),
    })?;
    to_data_url(&bytes)
}

/// Decodes an uploaded image: raw base64 or a `data:<mime>;base64,` URL.
pub fn decode_upload(encoded: &str) -> Result<Vec<u8>> {
    let encoded = encoded.trim();
    let payload = match encoded.strip_prefix("data:") {
        Some(rest) => match rest.split_once(',') {
            Some((header, payload)) if header.ends_with(";base64") => payload,
            _ => return Err(SearchError::decode("Malformed data URL, expected base64 payload")),
        },
        None => encoded,
    };

    // MIME-style line wrapping is accepted
    let payload: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| SearchError::decode(format!("Invalid base64 image data: {e}")))?;
    if bytes.is_empty() {
        return Err(SearchError::decode("Empty image payload"));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        RgbImage::from_pixel(4, 4, Rgb([200, 10, 10]))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_data_url_keeps_original_bytes() {
        let bytes = png_bytes();
        let url = to_data_url(&bytes).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(decode_upload(&url).unwrap(), bytes);
    }

    #[test]
    fn test_decode_upload_accepts_bare_base64() {
        let bytes = png_bytes();
        let bare = STANDARD.encode(&bytes);
        assert_eq!(decode_upload(&format!("  {bare}\n")).unwrap(), bytes);
    }

    #[test]
    fn test_decode_upload_accepts_line_wrapped_base64() {
        let bytes = png_bytes();
        let encoded = STANDARD.encode(&bytes);
        let wrapped = encoded
            .as_bytes()
            .chunks(76)
            .map(|line| std::str::from_utf8(line).unwrap())
            .collect::<Vec<_>>()
            .join("\r\n");
        assert!(wrapped.contains('\n'));

        assert_eq!(decode_upload(&wrapped).unwrap(), bytes);
        let url = format!("data:image/png;base64,\n{wrapped}\n");
        assert_eq!(decode_upload(&url).unwrap(), bytes);
    }

    #[test]
    fn test_decode_upload_rejects_garbage() {
        for input in ["not base64 at all!!", "", "data:image/png,plain", "data:nothing"] {
            let err = decode_upload(input).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::DecodeError, "input {input:?}");
        }
    }

    #[test]
    fn test_non_image_bytes_have_no_data_url() {
        let err = to_data_url(b"plain text").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeError);
    }

    #[tokio::test]
    async fn test_encode_missing_file() {
        let err = encode_file(Path::new("/definitely/not/here.png"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileMissing);
    }
}
