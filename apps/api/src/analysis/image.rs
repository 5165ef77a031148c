//! Decoding of the base64 screenshot payload.
//!
//! Accepts either a bare base64 string or a `data:<mime>;base64,<payload>`
//! URI. Whitespace inside the payload is ignored and padding is optional.
//! The MIME type always comes from sniffing the decoded bytes; the data-URI
//! header is not trusted.

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use thiserror::Error;

const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Malformed data URI: missing ',' before the payload")]
    MalformedDataUri,

    #[error("Image payload is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Image payload is empty")]
    Empty,

    #[error("Decoded payload is not a recognized image format")]
    NotAnImage,
}

#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

/// Removes a `data:...,` prefix if present.
fn strip_data_uri(raw: &str) -> Result<&str, ImageError> {
    let raw = raw.trim();
    if !raw.starts_with("data:") {
        return Ok(raw);
    }
    raw.split_once(',')
        .map(|(_, payload)| payload)
        .ok_or(ImageError::MalformedDataUri)
}

pub fn decode_image_payload(raw: &str) -> Result<DecodedImage, ImageError> {
    let payload: String = strip_data_uri(raw)?
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if payload.is_empty() {
        return Err(ImageError::Empty);
    }

    let bytes = LENIENT_STANDARD.decode(payload.as_bytes())?;
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }

    let kind = infer::get(&bytes)
        .filter(|t| t.matcher_type() == infer::MatcherType::Image)
        .ok_or(ImageError::NotAnImage)?;

    Ok(DecodedImage {
        bytes,
        mime_type: kind.mime_type(),
    })
}
