//! Raw text recovery per document format, with the OCR fallback for scanned PDFs.

use std::io::{Cursor, Read};

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::cv::format::DocumentFormat;
use crate::cv::markup::{rtf_to_text, xml_to_text, XmlDialect};
use crate::cv::ocr::OcrEngine;
use crate::cv::text::{clean_text, decode_text, meaningful_chars};
use crate::cv::{CvError, ExtractionMethod, MIN_TEXT_CHARS};

/// Below this many meaningful characters a PDF is treated as scanned.
pub const MIN_DIRECT_TEXT_CHARS: usize = 100;

/// Zip entries larger than this are refused (decompression bombs).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug)]
pub struct ExtractedText {
    pub text: String,
    pub method: ExtractionMethod,
    pub warnings: Vec<String>,
}

pub async fn extract_text(
    format: DocumentFormat,
    bytes: Bytes,
    ocr: &dyn OcrEngine,
) -> Result<ExtractedText, CvError> {
    if format.is_image() {
        let text = clean_text(&ocr.image_to_text(&bytes, format).await?);
        return Ok(ExtractedText {
            text,
            method: ExtractionMethod::Ocr,
            warnings: Vec::new(),
        });
    }

    if format == DocumentFormat::Pdf {
        return extract_pdf(bytes, ocr).await;
    }

    let text = run_blocking(move || direct_text(format, &bytes)).await?;
    Ok(ExtractedText {
        text: clean_text(&text),
        method: ExtractionMethod::Direct,
        warnings: Vec::new(),
    })
}

async fn extract_pdf(bytes: Bytes, ocr: &dyn OcrEngine) -> Result<ExtractedText, CvError> {
    let mut warnings = Vec::new();

    let pdf = bytes.clone();
    let direct = match run_blocking(move || direct_text(DocumentFormat::Pdf, &pdf)).await {
        Ok(text) => clean_text(&text),
        Err(e) => {
            warn!("Direct PDF extraction failed: {e}");
            warnings.push("The PDF text layer could not be read".to_string());
            String::new()
        }
    };
    let direct_chars = meaningful_chars(&direct);
    if direct_chars >= MIN_DIRECT_TEXT_CHARS {
        return Ok(ExtractedText {
            text: direct,
            method: ExtractionMethod::Direct,
            warnings,
        });
    }

    debug!("PDF has {direct_chars} meaningful chars of direct text, trying OCR");
    match ocr.pdf_to_text(&bytes).await {
        Ok(raw) => {
            let ocr_text = clean_text(&raw);
            if meaningful_chars(&ocr_text) > direct_chars {
                info!("Using OCR text for scanned PDF");
                warnings.push("Text was recognised with OCR and may contain errors".to_string());
                Ok(ExtractedText {
                    text: ocr_text,
                    method: ExtractionMethod::Ocr,
                    warnings,
                })
            } else {
                Ok(ExtractedText {
                    text: direct,
                    method: ExtractionMethod::Direct,
                    warnings,
                })
            }
        }
        Err(e) if direct_chars < MIN_TEXT_CHARS => Err(e),
        Err(e) => {
            warn!("OCR fallback failed, keeping sparse direct text: {e}");
            warnings.push(format!("OCR fallback failed: {e}"));
            Ok(ExtractedText {
                text: direct,
                method: ExtractionMethod::Direct,
                warnings,
            })
        }
    }
}

/// Text straight from the file, without OCR. CPU-bound.
fn direct_text(format: DocumentFormat, bytes: &[u8]) -> Result<String, CvError> {
    match format {
        DocumentFormat::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| CvError::Extraction(format!("PDF text extraction failed: {e}"))),
        DocumentFormat::Docx => {
            let xml = zip_entry(bytes, "word/document.xml")?;
            Ok(xml_to_text(&xml, XmlDialect::WordprocessingMl))
        }
        DocumentFormat::Odt => {
            let xml = zip_entry(bytes, "content.xml")?;
            Ok(xml_to_text(&xml, XmlDialect::OpenDocument))
        }
        DocumentFormat::Rtf => Ok(rtf_to_text(&String::from_utf8_lossy(bytes))),
        DocumentFormat::Text => Ok(decode_text(bytes)),
        image => Err(CvError::Extraction(format!(
            "{image} has no text layer and needs OCR"
        ))),
    }
}

fn zip_entry(bytes: &[u8], name: &str) -> Result<String, CvError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| CvError::Extraction(format!("corrupt document archive: {e}")))?;
    let entry = archive
        .by_name(name)
        .map_err(|_| CvError::Extraction(format!("document archive has no {name}")))?;
    if entry.size() > MAX_XML_ENTRY_BYTES {
        return Err(CvError::Extraction(format!("{name} is too large")));
    }
    let mut xml = String::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_string(&mut xml)
        .map_err(|e| CvError::Extraction(format!("cannot read {name}: {e}")))?;
    Ok(xml)
}

/// pdf-extract can panic on malformed input; a panic surfaces as an extraction error.
async fn run_blocking<F>(work: F) -> Result<String, CvError>
where
    F: FnOnce() -> Result<String, CvError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| CvError::Extraction(format!("text extraction aborted: {e}")))?
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;

    use async_trait::async_trait;

    use super::*;

    /// OCR double returning canned text, or `OcrUnavailable` when `None`.
    pub(crate) struct StubOcr(pub Option<String>);

    #[async_trait]
    impl OcrEngine for StubOcr {
        async fn pdf_to_text(&self, _pdf: &[u8]) -> Result<String, CvError> {
            self.0
                .clone()
                .ok_or_else(|| CvError::OcrUnavailable("OCR is disabled".to_string()))
        }

        async fn image_to_text(&self, _image: &[u8], _format: DocumentFormat) -> Result<String, CvError> {
            self.pdf_to_text(&[]).await
        }
    }

    pub(crate) fn zip_document(entry: &str, xml: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(entry, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[tokio::test]
    async fn test_docx_paragraphs() {
        let docx = zip_document(
            "word/document.xml",
            "<w:document><w:body><w:p><w:r><w:t>Jane Doe</w:t></w:r></w:p>\
             <w:p><w:r><w:t>Rust &amp; Go</w:t></w:r></w:p></w:body></w:document>",
        );
        let out = extract_text(DocumentFormat::Docx, docx.into(), &StubOcr(None))
            .await
            .unwrap();
        assert_eq!(out.text, "Jane Doe\nRust & Go");
        assert_eq!(out.method, ExtractionMethod::Direct);
    }

    #[tokio::test]
    async fn test_odt_requires_content_xml() {
        let odt = zip_document("meta.xml", "<x/>");
        let err = extract_text(DocumentFormat::Odt, odt.into(), &StubOcr(None))
            .await
            .unwrap_err();
        assert!(matches!(err, CvError::Extraction(_)));
    }

    #[tokio::test]
    async fn test_image_goes_through_ocr() {
        let out = extract_text(
            DocumentFormat::Png,
            Bytes::from_static(b"\x89PNG"),
            &StubOcr(Some("  Jane   Doe \n\n\n Engineer ".to_string())),
        )
        .await
        .unwrap();
        assert_eq!(out.text, "Jane Doe\n\nEngineer");
        assert_eq!(out.method, ExtractionMethod::Ocr);
    }

    #[tokio::test]
    async fn test_unreadable_pdf_falls_back_to_ocr() {
        let ocr_text = "Jane Doe, senior engineer with ten years of Rust and PostgreSQL. ".repeat(3);
        let out = extract_text(
            DocumentFormat::Pdf,
            Bytes::from_static(b"%PDF-1.4 not really a pdf"),
            &StubOcr(Some(ocr_text)),
        )
        .await
        .unwrap();
        assert_eq!(out.method, ExtractionMethod::Ocr);
        assert!(out.text.starts_with("Jane Doe"));
        assert!(!out.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_pdf_without_ocr_names_ocr() {
        let err = extract_text(
            DocumentFormat::Pdf,
            Bytes::from_static(b"%PDF-1.4 not really a pdf"),
            &StubOcr(None),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CvError::OcrUnavailable(_)));
    }
}
