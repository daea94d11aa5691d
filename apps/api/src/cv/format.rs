//! Document format sniffing. Magic bytes win over the declared content type,
//! which wins over the file extension.

use crate::cv::CvError;
use crate::models::text_enum;

text_enum! {
    pub enum DocumentFormat {
        Pdf => "pdf",
        Docx => "docx",
        Odt => "odt",
        Rtf => "rtf",
        Text => "text",
        Png => "png",
        Jpeg => "jpeg",
        Tiff => "tiff",
        Bmp => "bmp",
        Gif => "gif",
        Webp => "webp",
    }
}

impl DocumentFormat {
    pub fn is_image(&self) -> bool {
        matches!(
            self,
            DocumentFormat::Png
                | DocumentFormat::Jpeg
                | DocumentFormat::Tiff
                | DocumentFormat::Bmp
                | DocumentFormat::Gif
                | DocumentFormat::Webp
        )
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Odt => "odt",
            DocumentFormat::Rtf => "rtf",
            DocumentFormat::Text => "txt",
            DocumentFormat::Png => "png",
            DocumentFormat::Jpeg => "jpg",
            DocumentFormat::Tiff => "tiff",
            DocumentFormat::Bmp => "bmp",
            DocumentFormat::Gif => "gif",
            DocumentFormat::Webp => "webp",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DocumentFormat::Odt => "application/vnd.oasis.opendocument.text",
            DocumentFormat::Rtf => "application/rtf",
            DocumentFormat::Text => "text/plain; charset=utf-8",
            DocumentFormat::Png => "image/png",
            DocumentFormat::Jpeg => "image/jpeg",
            DocumentFormat::Tiff => "image/tiff",
            DocumentFormat::Bmp => "image/bmp",
            DocumentFormat::Gif => "image/gif",
            DocumentFormat::Webp => "image/webp",
        }
    }
}

const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn sniff(bytes: &[u8]) -> Option<DocumentFormat> {
    if bytes.starts_with(b"%PDF-") {
        return Some(DocumentFormat::Pdf);
    }
    if bytes.starts_with(b"PK\x03\x04") {
        // Entry names sit uncompressed in the local headers; ODF stores its
        // mimetype entry first and uncompressed.
        if contains(bytes, b"application/vnd.oasis.opendocument.text") {
            return Some(DocumentFormat::Odt);
        }
        if contains(bytes, b"word/") {
            return Some(DocumentFormat::Docx);
        }
        return None;
    }
    if bytes.starts_with(b"{\\rtf") {
        return Some(DocumentFormat::Rtf);
    }
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some(DocumentFormat::Png);
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(DocumentFormat::Jpeg);
    }
    if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
        return Some(DocumentFormat::Tiff);
    }
    if bytes.starts_with(b"BM") && bytes.len() > 14 {
        return Some(DocumentFormat::Bmp);
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some(DocumentFormat::Gif);
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some(DocumentFormat::Webp);
    }
    None
}

fn from_content_type(content_type: &str) -> Option<DocumentFormat> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    Some(match mime.as_str() {
        "application/pdf" => DocumentFormat::Pdf,
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
            DocumentFormat::Docx
        }
        "application/vnd.oasis.opendocument.text" => DocumentFormat::Odt,
        "application/rtf" | "text/rtf" => DocumentFormat::Rtf,
        "text/plain" | "text/markdown" => DocumentFormat::Text,
        "image/png" => DocumentFormat::Png,
        "image/jpeg" | "image/jpg" => DocumentFormat::Jpeg,
        "image/tiff" => DocumentFormat::Tiff,
        "image/bmp" => DocumentFormat::Bmp,
        "image/gif" => DocumentFormat::Gif,
        "image/webp" => DocumentFormat::Webp,
        _ => return None,
    })
}

/// Format implied by a file name's extension, if any.
pub fn from_extension(file_name: &str) -> Option<DocumentFormat> {
    let (_, ext) = file_name.rsplit_once('.')?;
    Some(match ext.to_ascii_lowercase().as_str() {
        "pdf" => DocumentFormat::Pdf,
        "docx" => DocumentFormat::Docx,
        "odt" => DocumentFormat::Odt,
        "rtf" => DocumentFormat::Rtf,
        "txt" | "text" | "md" => DocumentFormat::Text,
        "png" => DocumentFormat::Png,
        "jpg" | "jpeg" => DocumentFormat::Jpeg,
        "tif" | "tiff" => DocumentFormat::Tiff,
        "bmp" => DocumentFormat::Bmp,
        "gif" => DocumentFormat::Gif,
        "webp" => DocumentFormat::Webp,
        _ => return None,
    })
}

/// Decides the document format of an upload.
///
/// Binary containers are only trusted when their magic bytes agree, so a
/// renamed executable cannot pass as a PDF. Plain text is accepted on the
/// declared type or extension when the bytes decode as text.
pub fn detect_format(
    bytes: &[u8],
    content_type: Option<&str>,
    file_name: Option<&str>,
) -> Result<DocumentFormat, CvError> {
    if bytes.is_empty() {
        return Err(CvError::Empty);
    }
    if bytes.starts_with(OLE_MAGIC) {
        return Err(CvError::UnsupportedFormat(
            "legacy Word (.doc) files are not supported; please upload PDF or DOCX".to_string(),
        ));
    }
    if let Some(format) = sniff(bytes) {
        return Ok(format);
    }

    let declared = content_type
        .and_then(from_content_type)
        .or_else(|| file_name.and_then(from_extension));

    match declared {
        Some(DocumentFormat::Text) | None if looks_like_text(bytes) => Ok(DocumentFormat::Text),
        Some(other) => Err(CvError::UnsupportedFormat(format!(
            "file claims to be {other} but its contents do not match"
        ))),
        None => Err(CvError::UnsupportedFormat(
            "unrecognised file type; supported: PDF, DOCX, ODT, RTF, TXT, PNG, JPEG, TIFF, BMP, GIF, WEBP"
                .to_string(),
        )),
    }
}

/// UTF-8 (or BOM-marked UTF-16) without binary control bytes in the first 4 KiB.
fn looks_like_text(bytes: &[u8]) -> bool {
    if bytes.starts_with(&[0xFF, 0xFE]) || bytes.starts_with(&[0xFE, 0xFF]) {
        return true;
    }
    let head = &bytes[..bytes.len().min(4096)];
    let decoded = match std::str::from_utf8(head) {
        Ok(s) => s,
        // A multi-byte char may straddle the cut.
        Err(e) if e.valid_up_to() + 4 >= head.len() => {
            match std::str::from_utf8(&head[..e.valid_up_to()]) {
                Ok(s) => s,
                Err(_) => return false,
            }
        }
        Err(_) => return false,
    };
    !decoded
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t' | '\u{feff}' | '\u{c}'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_bytes_win_over_declared_type() {
        let pdf = b"%PDF-1.7\n...";
        assert_eq!(
            detect_format(pdf, Some("text/plain"), Some("cv.txt")).unwrap(),
            DocumentFormat::Pdf
        );
    }

    #[test]
    fn test_zip_containers() {
        let mut docx = b"PK\x03\x04".to_vec();
        docx.extend_from_slice(b"....[Content_Types].xml....word/document.xml");
        assert_eq!(detect_format(&docx, None, None).unwrap(), DocumentFormat::Docx);

        let mut odt = b"PK\x03\x04".to_vec();
        odt.extend_from_slice(b"mimetypeapplication/vnd.oasis.opendocument.text");
        assert_eq!(detect_format(&odt, None, None).unwrap(), DocumentFormat::Odt);

        let mut other_zip = b"PK\x03\x04".to_vec();
        other_zip.extend_from_slice(b"random.bin");
        assert!(detect_format(&other_zip, None, Some("cv.docx")).is_err());
    }

    #[test]
    fn test_images_and_rtf() {
        assert_eq!(
            detect_format(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0], None, None).unwrap(),
            DocumentFormat::Jpeg
        );
        assert_eq!(
            detect_format(b"RIFF\x10\0\0\0WEBPVP8 ", None, None).unwrap(),
            DocumentFormat::Webp
        );
        assert_eq!(
            detect_format(b"{\\rtf1\\ansi hello}", None, None).unwrap(),
            DocumentFormat::Rtf
        );
    }

    #[test]
    fn test_legacy_doc_rejected() {
        let mut doc = OLE_MAGIC.to_vec();
        doc.extend_from_slice(&[0; 32]);
        assert!(matches!(
            detect_format(&doc, Some("application/msword"), Some("cv.doc")),
            Err(CvError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_plain_text_fallback() {
        assert_eq!(
            detect_format("Jane Doe\nRust engineer".as_bytes(), None, Some("cv")).unwrap(),
            DocumentFormat::Text
        );
        assert!(detect_format(&[0, 1, 2, 3, 4, 5], None, None).is_err());
        assert!(matches!(detect_format(&[], None, None), Err(CvError::Empty)));
    }

    #[test]
    fn test_declared_binary_type_with_text_body_is_rejected() {
        assert!(detect_format(b"hello world", Some("application/pdf"), None).is_err());
    }

    #[test]
    fn test_extension_and_content_type_helpers() {
        assert_eq!(DocumentFormat::Jpeg.extension(), "jpg");
        assert!(DocumentFormat::Tiff.is_image());
        assert!(!DocumentFormat::Pdf.is_image());
        assert_eq!(from_content_type("Text/Plain; charset=utf-8"), Some(DocumentFormat::Text));
        assert_eq!(from_extension("resume.final.PDF"), Some(DocumentFormat::Pdf));
    }
}
