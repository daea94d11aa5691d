//! Reading a single file out of a `multipart/form-data` request body.

use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;
use bytes::{Bytes, BytesMut};

use crate::errors::AppError;

const MAX_FILE_NAME_CHARS: usize = 255;

#[derive(Debug)]
pub struct Upload {
    pub bytes: Bytes,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

fn multipart_error(e: MultipartError, max_bytes: usize) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!("uploads are limited to {max_bytes} bytes"))
    } else {
        AppError::Validation(format!("malformed multipart body: {}", e.body_text()))
    }
}

/// Streams the field called `field_name`, failing with 413 once it exceeds
/// `max_bytes`. Other fields are skipped.
pub async fn read_file_field(
    multipart: &mut Multipart,
    field_name: &str,
    max_bytes: usize,
) -> Result<Upload, AppError> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if field.name() != Some(field_name) {
            continue;
        }
        let file_name = field.file_name().and_then(sanitize_file_name);
        let content_type = field.content_type().map(str::to_string);

        let mut buf = BytesMut::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| multipart_error(e, max_bytes))?
        {
            if buf.len() + chunk.len() > max_bytes {
                return Err(AppError::PayloadTooLarge(format!(
                    "uploads are limited to {max_bytes} bytes"
                )));
            }
            buf.extend_from_slice(&chunk);
        }
        return Ok(Upload {
            bytes: buf.freeze(),
            file_name,
            content_type,
        });
    }
    Err(AppError::Validation(format!(
        "multipart field '{field_name}' is required"
    )))
}

/// Base name only, control characters removed, bounded length.
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_FILE_NAME_CHARS)
        .collect();
    let cleaned = cleaned.trim();
    (!cleaned.is_empty() && cleaned != "." && cleaned != "..").then(|| cleaned.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("C:\\Users\\jane\\cv.pdf").as_deref(), Some("cv.pdf"));
        assert_eq!(sanitize_file_name("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_file_name("cv\u{0}.pdf").as_deref(), Some("cv.pdf"));
        assert_eq!(sanitize_file_name("  "), None);
        assert_eq!(sanitize_file_name("dir/.."), None);
    }
}
